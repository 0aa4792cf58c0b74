#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use sysinfo::System;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Rolling window capacity per operation class; oldest samples are evicted
/// first once the window is full.
const MAX_SAMPLES: usize = 100;

/// How often the background reporter logs a snapshot.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct Windows {
    search_times: VecDeque<Duration>,
    embedding_times: VecDeque<Duration>,
}

/// Rolling latency tracker shared by search and ingestion tasks.
///
/// An explicitly constructed component, cheap to clone; all clones share the
/// same windows behind a read-write lock.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMonitor {
    windows: Arc<RwLock<Windows>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSnapshot {
    pub search_avg: Option<Duration>,
    pub embedding_avg: Option<Duration>,
    pub memory_bytes: Option<u64>,
}

impl PerformanceMonitor {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_search_time(&self, duration: Duration) {
        let mut windows = self
            .windows
            .write()
            .expect("performance window lock poisoned");
        push_sample(&mut windows.search_times, duration);
    }

    #[inline]
    pub fn record_embedding_time(&self, duration: Duration) {
        let mut windows = self
            .windows
            .write()
            .expect("performance window lock poisoned");
        push_sample(&mut windows.embedding_times, duration);
    }

    /// Window means plus current process memory, read at call time.
    #[inline]
    pub fn snapshot(&self) -> PerfSnapshot {
        let (search_avg, embedding_avg) = {
            let windows = self
                .windows
                .read()
                .expect("performance window lock poisoned");
            (
                window_mean(&windows.search_times),
                window_mean(&windows.embedding_times),
            )
        };

        PerfSnapshot {
            search_avg,
            embedding_avg,
            memory_bytes: process_memory_bytes(),
        }
    }

    /// Spawn the periodic reporter. Runs until the shutdown channel flips to
    /// true or its sender is dropped.
    #[inline]
    pub fn spawn_reporter(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let monitor = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // report lands a full interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => monitor.log_snapshot(),
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    #[inline]
    pub fn log_snapshot(&self) {
        let snapshot = self.snapshot();
        info!(
            "Performance stats: search avg {:?}, embedding avg {:?}, memory {}",
            snapshot.search_avg,
            snapshot.embedding_avg,
            snapshot
                .memory_bytes
                .map_or_else(|| "unknown".to_string(), format_bytes),
        );
    }
}

fn push_sample(window: &mut VecDeque<Duration>, duration: Duration) {
    window.push_back(duration);
    if window.len() > MAX_SAMPLES {
        window.pop_front();
    }
}

fn window_mean(window: &VecDeque<Duration>) -> Option<Duration> {
    if window.is_empty() {
        return None;
    }

    let total: Duration = window.iter().sum();
    Some(total / window.len() as u32)
}

fn process_memory_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).map(sysinfo::Process::memory)
}

/// Render a byte count for humans, e.g. `3.2 MB`.
#[inline]
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;

    if bytes < UNIT {
        return "< 1 KB".to_string();
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let units = ["KB", "MB", "GB", "TB", "PB", "EB"];
    format!("{:.1} {}", bytes as f64 / div as f64, units[exp])
}
