// Run metrics
//
// Lightweight counters for what the pipeline did, logged after each run

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Pipeline counters
///
/// Uses atomics so the runner, the cleaner and the front end can share one
/// instance through an `Arc` without locking.
#[derive(Debug)]
pub struct RunMetrics {
    /// Commands that were spawned
    pub commands_launched: AtomicUsize,

    /// Commands that exited with status 0
    pub commands_succeeded: AtomicUsize,

    /// Commands that exited non-zero or were killed by a signal
    pub non_zero_exits: AtomicUsize,

    /// Commands that could not be spawned
    pub launch_failures: AtomicUsize,

    /// Commands killed after exceeding the step timeout
    pub timeouts: AtomicUsize,

    /// Intermediate files deleted after a drained run
    pub artifacts_removed: AtomicUsize,

    /// Intermediate files that could not be deleted
    pub cleanup_errors: AtomicUsize,

    /// Wall time spent in external processes, in milliseconds
    pub total_process_time_ms: AtomicU64,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            commands_launched: AtomicUsize::new(0),
            commands_succeeded: AtomicUsize::new(0),
            non_zero_exits: AtomicUsize::new(0),
            launch_failures: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
            artifacts_removed: AtomicUsize::new(0),
            cleanup_errors: AtomicUsize::new(0),
            total_process_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_launch(&self) {
        self.commands_launched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exit(&self, success: bool, elapsed: Duration) {
        if success {
            self.commands_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.non_zero_exits.fetch_add(1, Ordering::Relaxed);
        }
        self.total_process_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_launch_failure(&self) {
        self.launch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_artifact_removed(&self) {
        self.artifacts_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleanup_error(&self) {
        self.cleanup_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average wall time per finished command in milliseconds
    pub fn avg_process_time_ms(&self) -> f64 {
        let total = self.total_process_time_ms.load(Ordering::Relaxed);
        let count = self.commands_succeeded.load(Ordering::Relaxed)
            + self.non_zero_exits.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Run Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Commands: {} launched, {} succeeded, {} failed, {} failed to launch, {} timed out",
            self.commands_launched.load(Ordering::Relaxed),
            self.commands_succeeded.load(Ordering::Relaxed),
            self.non_zero_exits.load(Ordering::Relaxed),
            self.launch_failures.load(Ordering::Relaxed),
            self.timeouts.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Process time: {:.2}s (avg: {:.2}ms per command)",
            self.total_process_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_process_time_ms()
        );
        tracing::info!(
            "Cleanup: {} removed, {} errors",
            self.artifacts_removed.load(Ordering::Relaxed),
            self.cleanup_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
