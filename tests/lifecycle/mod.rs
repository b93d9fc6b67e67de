use std::time::Duration;

use crate::commons::cm;
use crate::commons::fast_config;
use crate::commons::payload;
use crate::commons::start;
use crate::commons::Recorder;
use crate::enable_logger;

#[tokio::test]
async fn test_add_update_delete_lifecycle() {
    enable_logger();
    let running = start(fast_config(3), vec![], Recorder::default());
    let wait = Duration::from_secs(2);

    running.handle.apply(cm("ns", "foo", "P1")).unwrap();
    assert!(running.recorder.wait_for(1, wait).await);

    // same payload: cache refresh only
    running.handle.apply(cm("ns", "foo", "P1")).unwrap();
    running.handle.apply(cm("ns", "foo", "P2")).unwrap();
    assert!(running.recorder.wait_for(2, wait).await);

    running.handle.remove("ns/foo").unwrap();
    assert!(running.recorder.wait_for(3, wait).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        running.recorder.seen(),
        vec![
            ("ns/foo".to_string(), payload("P1")),
            ("ns/foo".to_string(), payload("P2")),
            ("ns/foo".to_string(), None),
        ]
    );

    running.stop_tx.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_initial_listing_and_relist_tombstones() {
    enable_logger();
    let mut config = fast_config(3);
    config.controller.workers = 3;
    let running = start(
        config,
        vec![cm("ns", "a", "1"), cm("ns", "b", "1"), cm("", "cluster-wide", "1")],
        Recorder::default(),
    );
    let wait = Duration::from_secs(2);
    assert!(running.recorder.wait_for(3, wait).await);

    running.handle.relist(vec![cm("ns", "a", "1")]).unwrap();
    assert!(running.recorder.wait_for(5, wait).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let seen = running.recorder.seen();
    assert_eq!(seen.len(), 5);
    assert!(seen.contains(&("cluster-wide".to_string(), payload("1"))));
    assert!(seen.contains(&("ns/b".to_string(), None)));
    assert!(seen.contains(&("cluster-wide".to_string(), None)));
    assert_eq!(running.recorder.count("ns/a"), 1);

    running.stop_tx.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dropping_the_stop_sender_stops_the_controller() {
    enable_logger();
    let running = start(fast_config(3), vec![cm("ns", "a", "1")], Recorder::default());
    assert!(running.recorder.wait_for(1, Duration::from_secs(2)).await);

    drop(running.stop_tx);
    let result = tokio::time::timeout(Duration::from_secs(2), running.task).await;
    assert!(result.unwrap().unwrap().is_ok());
}
