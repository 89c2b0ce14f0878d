//! Progress-callback trait for crawl events.
//!
//! Pass a `&dyn CrawlProgressCallback` to [`crate::schedule::run_crawl`] to
//! receive events as each code × category attempt runs. The CLI forwards them
//! to an `indicatif` progress bar; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use fda_label_harvest::{CrawlProgressCallback, CrawlSummary};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct SavedCounter(AtomicUsize);
//!
//! impl CrawlProgressCallback for SavedCounter {
//!     fn on_artifact_saved(&self, _code: &str, _category: &str, _filename: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = SavedCounter(AtomicUsize::new(0));
//! counter.on_artifact_saved("000001", "衛部藥製", "000001-測試.md");
//! assert_eq!(counter.0.load(Ordering::SeqCst), 1);
//! ```

use crate::error::AttemptError;
use crate::output::CrawlSummary;

/// Called by the scheduler as a crawl progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Codes arrive zero-padded to six digits and
/// categories as their registry labels.
pub trait CrawlProgressCallback: Send + Sync {
    /// Called once before the first code is attempted.
    fn on_crawl_start(&self, total_codes: usize) {
        let _ = total_codes;
    }

    /// Called before each code × category attempt.
    fn on_attempt_start(&self, code: &str, category: &str) {
        let _ = (code, category);
    }

    /// Called after an artifact has been written under its final name.
    fn on_artifact_saved(&self, code: &str, category: &str, filename: &str) {
        let _ = (code, category, filename);
    }

    /// Called when an attempt ends without an artifact.
    fn on_attempt_failed(&self, code: &str, category: &str, error: &AttemptError) {
        let _ = (code, category, error);
    }

    /// Called after the fallback chain for one code has finished.
    fn on_code_complete(&self, code: &str, saved: bool) {
        let _ = (code, saved);
    }

    /// Called once at the end of the crawl.
    fn on_crawl_complete(&self, summary: &CrawlSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CrawlProgressCallback for NoopProgressCallback {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct TrackingCallback {
        attempts: AtomicUsize,
        saved: AtomicUsize,
        failed: AtomicUsize,
    }

    impl CrawlProgressCallback for TrackingCallback {
        fn on_attempt_start(&self, _code: &str, _category: &str) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_artifact_saved(&self, _code: &str, _category: &str, _filename: &str) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_failed(&self, _code: &str, _category: &str, _error: &AttemptError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_crawl_start(5);
        cb.on_attempt_start("000001", "衛署藥製");
        cb.on_artifact_saved("000001", "衛署藥製", "000001-測試.md");
        cb.on_code_complete("000001", true);
        cb.on_crawl_complete(&CrawlSummary::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_attempt_start("000001", "衛署藥製");
        tracker.on_attempt_failed(
            "000001",
            "衛署藥製",
            &AttemptError::RecordNotFound {
                label: "衛署藥製第000001號".into(),
            },
        );
        tracker.on_attempt_start("000001", "衛署藥輸");
        tracker.on_artifact_saved("000001", "衛署藥輸", "000001-測試.md");

        assert_eq!(tracker.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.failed.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.saved.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn CrawlProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_crawl_start(10);
    }
}
