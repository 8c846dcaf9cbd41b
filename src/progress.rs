//! Progress-callback trait for per-unit extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each page or slide.
//!
//! # Example
//!
//! ```rust
//! use scribeme::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, index: usize, total_units: usize, enrichment_count: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Unit {}/{} done ({} described)", index, total_units, enrichment_count);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each unit.
///
/// Units run concurrently, so `on_unit_*` may be called from several tasks
/// at once and in any order. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any unit is dispatched.
    fn on_run_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called when a worker picks up a unit.
    ///
    /// # Arguments
    /// * `index`      : 1-indexed unit number
    /// * `total_units`: units in the document
    fn on_unit_start(&self, index: usize, total_units: usize) {
        let _ = (index, total_units);
    }

    /// Called when a unit finishes without any error marker.
    ///
    /// # Arguments
    /// * `enrichment_count`: budget units this unit spent
    fn on_unit_complete(&self, index: usize, total_units: usize, enrichment_count: usize) {
        let _ = (index, total_units, enrichment_count);
    }

    /// Called when a unit finishes carrying at least one error marker.
    ///
    /// The unit is still part of the result; `error` describes the first marker.
    fn on_unit_error(&self, index: usize, total_units: usize, error: &str) {
        let _ = (index, total_units, error);
    }

    /// Called once after every unit has completed, failed, or been cancelled.
    fn on_run_complete(&self, total_units: usize, total_enrichment_count: usize) {
        let _ = (total_units, total_enrichment_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        enriched: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_unit_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_complete(&self, _index: usize, _total: usize, enrichment_count: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.enriched.fetch_add(enrichment_count, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5);
        cb.on_unit_start(1, 5);
        cb.on_unit_complete(1, 5, 2);
        cb.on_unit_error(2, 5, "some error");
        cb.on_run_complete(5, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_unit_start(1, 3);
        tracker.on_unit_complete(1, 3, 2);
        tracker.on_unit_start(2, 3);
        tracker.on_unit_complete(2, 3, 1);
        tracker.on_unit_start(3, 3);
        tracker.on_unit_error(3, 3, "OCR failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.enriched.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_unit_start(1, 10);
    }
}
