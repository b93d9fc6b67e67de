use std::time::Duration;

use crate::commons::cm;
use crate::commons::fast_config;
use crate::commons::start;
use crate::commons::Recorder;
use crate::enable_logger;

#[tokio::test]
async fn test_failing_key_is_abandoned_after_retries() {
    enable_logger();
    let recorder = Recorder::default();
    recorder.failing.lock().push("ns/bad".to_string());
    let running = start(fast_config(4), vec![], recorder);

    running.handle.apply(cm("ns", "bad", "1")).unwrap();
    running.handle.apply(cm("ns", "good", "1")).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(running.recorder.count("ns/bad"), 5);
    assert_eq!(running.recorder.count("ns/good"), 1);

    running.stop_tx.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_abandoned_key_recovers_on_next_change() {
    enable_logger();
    let recorder = Recorder::default();
    recorder.failing.lock().push("ns/flaky".to_string());
    let running = start(fast_config(1), vec![], recorder);

    running.handle.apply(cm("ns", "flaky", "1")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(running.recorder.count("ns/flaky"), 2);

    running.recorder.failing.lock().clear();
    running.handle.apply(cm("ns", "flaky", "2")).unwrap();
    assert!(running.recorder.wait_for(3, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(running.recorder.count("ns/flaky"), 3);

    running.stop_tx.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}
