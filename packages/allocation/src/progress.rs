//! Progress reporting for pipeline stages.
//!
//! The pipeline only knows about [`ProgressCallback`]; whether that ends
//! up as an `indicatif` bar, log lines, or nothing is the caller's choice.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives progress from a running stage.
///
/// Implementations must be `Send + Sync`: the per-precinct and per-zone
/// work reports from `rayon` worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark the stage complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Reports stage messages through the `log` facade.
///
/// For headless runs where a progress bar would only garble the output.
/// Counts are kept so the final message can say how far the stage got.
#[derive(Default)]
pub struct LogProgress {
    total: AtomicU64,
    position: AtomicU64,
}

impl ProgressCallback for LogProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
    }

    fn inc(&self, delta: u64) {
        self.position.fetch_add(delta, Ordering::Relaxed);
    }

    fn set_message(&self, msg: String) {
        log::info!(
            "[{}/{}] {msg}",
            self.position.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed)
        );
    }

    fn finish(&self, msg: String) {
        log::info!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_progress_counts_increments() {
        let progress = LogProgress::default();
        progress.set_total(4);
        progress.inc(1);
        progress.inc(2);
        assert_eq!(progress.position.load(Ordering::Relaxed), 3);
        progress.set_total(2);
        assert_eq!(progress.position.load(Ordering::Relaxed), 0);
    }
}
