use super::*;

#[test]
fn empty_windows_report_no_averages() {
    let monitor = PerformanceMonitor::new();
    let snapshot = monitor.snapshot();

    assert_eq!(snapshot.search_avg, None);
    assert_eq!(snapshot.embedding_avg, None);
}

#[test]
fn mean_of_recorded_samples() {
    let monitor = PerformanceMonitor::new();
    monitor.record_search_time(Duration::from_millis(100));
    monitor.record_search_time(Duration::from_millis(200));

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.search_avg, Some(Duration::from_millis(150)));
    assert_eq!(snapshot.embedding_avg, None);
}

#[test]
fn windows_are_independent() {
    let monitor = PerformanceMonitor::new();
    monitor.record_search_time(Duration::from_millis(10));
    monitor.record_embedding_time(Duration::from_millis(500));

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.search_avg, Some(Duration::from_millis(10)));
    assert_eq!(snapshot.embedding_avg, Some(Duration::from_millis(500)));
}

#[test]
fn overflowing_window_evicts_oldest_sample() {
    let monitor = PerformanceMonitor::new();

    // An outlier first, then enough samples to push it out.
    monitor.record_embedding_time(Duration::from_secs(10));
    for _ in 0..MAX_SAMPLES {
        monitor.record_embedding_time(Duration::from_millis(100));
    }

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.embedding_avg, Some(Duration::from_millis(100)));

    let windows = monitor.windows.read().expect("lock not poisoned");
    assert_eq!(windows.embedding_times.len(), MAX_SAMPLES);
}

#[test]
fn clones_share_the_same_windows() {
    let monitor = PerformanceMonitor::new();
    let clone = monitor.clone();

    clone.record_search_time(Duration::from_millis(40));

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.search_avg, Some(Duration::from_millis(40)));
}

#[tokio::test]
async fn reporter_stops_on_shutdown_signal() {
    let monitor = PerformanceMonitor::new();
    let (tx, rx) = watch::channel(false);

    let handle = monitor.spawn_reporter(Duration::from_secs(3600), rx);

    tx.send(true).expect("receiver is alive");

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("reporter shuts down promptly")
        .expect("reporter task does not panic");
}

#[tokio::test]
async fn reporter_stops_when_sender_is_dropped() {
    let monitor = PerformanceMonitor::new();
    let (tx, rx) = watch::channel(false);

    let handle = monitor.spawn_reporter(Duration::from_secs(3600), rx);
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("reporter shuts down promptly")
        .expect("reporter task does not panic");
}

#[test]
fn byte_formatting_tiers() {
    assert_eq!(format_bytes(512), "< 1 KB");
    assert_eq!(format_bytes(2048), "2.0 KB");
    assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
}
