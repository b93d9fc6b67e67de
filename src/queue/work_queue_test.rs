use std::sync::Arc;
use std::time::Duration;

use super::WorkQueue;

#[tokio::test]
async fn keys_come_out_in_fifo_order() {
    let queue = WorkQueue::new("fifo");
    queue.add("a");
    queue.add("b");
    queue.add("c");

    assert_eq!(queue.get().await, Some("a"));
    assert_eq!(queue.get().await, Some("b"));
    assert_eq!(queue.get().await, Some("c"));
}

#[tokio::test]
async fn pending_duplicates_collapse() {
    let queue = WorkQueue::new("dedup");
    queue.add("ns/foo");
    queue.add("ns/foo");
    queue.add("ns/foo");

    assert_eq!(queue.len(), 1);
    assert_eq!(queue.get().await, Some("ns/foo"));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn in_flight_key_resurfaces_once_after_done() {
    let queue = WorkQueue::new("in-flight");
    queue.add("ns/foo");
    let key = queue.get().await.unwrap();

    queue.add("ns/foo");
    queue.add("ns/foo");
    // not handed out a second time while in flight
    assert!(queue.is_empty());
    assert_eq!(queue.in_flight(), 1);

    queue.done(&key);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.get().await, Some("ns/foo"));
    queue.done(&"ns/foo");
    assert!(queue.is_empty());
    assert_eq!(queue.in_flight(), 0);
}

#[tokio::test]
async fn done_without_readd_does_not_requeue() {
    let queue = WorkQueue::new("plain-done");
    queue.add(1);
    let key = queue.get().await.unwrap();
    queue.done(&key);

    assert!(queue.is_empty());
}

#[tokio::test]
async fn get_blocks_until_add() {
    let queue = Arc::new(WorkQueue::new("blocking"));
    let getter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.get().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!getter.is_finished());

    queue.add("late");
    assert_eq!(getter.await.unwrap(), Some("late"));
}

#[tokio::test]
async fn shut_down_wakes_every_blocked_getter() {
    let queue: Arc<WorkQueue<&str>> = Arc::new(WorkQueue::new("wake"));
    let getters: Vec<_> = (0..3)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    queue.shut_down();

    for getter in getters {
        let result = tokio::time::timeout(Duration::from_secs(1), getter).await;
        assert_eq!(result.unwrap().unwrap(), None);
    }
}

#[tokio::test]
async fn shut_down_discards_pending_and_ignores_adds() {
    let queue = WorkQueue::new("closed");
    queue.add("a");
    queue.shut_down();
    queue.add("b");

    assert!(queue.is_shutting_down());
    assert!(queue.is_empty());
    assert_eq!(queue.get().await, None);
}

#[tokio::test]
async fn dirty_in_flight_key_is_not_requeued_after_shut_down() {
    let queue = WorkQueue::new("closed-in-flight");
    queue.add("a");
    let key = queue.get().await.unwrap();
    queue.add("a");

    queue.shut_down();
    queue.done(&key);

    assert!(queue.is_empty());
}

#[tokio::test]
async fn shut_down_with_drain_waits_for_in_flight_keys() {
    let queue = Arc::new(WorkQueue::new("drain"));
    queue.add("a");
    let key = queue.get().await.unwrap();

    let drain = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.shut_down_with_drain().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!drain.is_finished());

    queue.done(&key);
    tokio::time::timeout(Duration::from_secs(1), drain)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_key_is_never_held_by_two_consumers() {
    let queue = Arc::new(WorkQueue::new("exclusive"));
    let holders = Arc::new(parking_lot::Mutex::new(std::collections::HashSet::new()));

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            let holders = holders.clone();
            tokio::spawn(async move {
                while let Some(key) = queue.get().await {
                    assert!(holders.lock().insert(key), "{key} handed out twice");
                    tokio::task::yield_now().await;
                    holders.lock().remove(&key);
                    queue.done(&key);
                }
            })
        })
        .collect();

    for round in 0..200 {
        queue.add(round % 5);
        if round % 10 == 0 {
            tokio::task::yield_now().await;
        }
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.shut_down();

    for consumer in consumers {
        consumer.await.unwrap();
    }
}
