//! Pipeline stages for unit extraction and budgeted enrichment.
//!
//! Each submodule implements one step. Keeping them separate makes each
//! independently testable and keeps the single shared resource, the budget,
//! in one small place.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ (source) ──▶ scheduler ──▶ unit ──▶ extract
//! (path/URL)  (open)     (fan-out)     │
//!                                      └──▶ enrich ──▶ budget
//!                                           (OCR / VLM)
//! ```
//!
//! 1. [`input`]: read a path or download a URL, sniff the format
//! 2. [`scheduler`]: run every unit on a bounded worker pool, reassemble
//!    results by index
//! 3. [`unit`]: extract one unit, then enrich its images in order
//! 4. [`extract`]: text runs and image blobs of one unit, independently
//! 5. [`enrich`]: OCR (never gated) and description (gated by [`budget`])
//! 6. [`budget`]: the run's shared, atomic enrichment counter
//! 7. [`encode`]: image bytes → base64 payload for the vision API
//! 8. [`postprocess`]: deterministic text cleanup

pub mod budget;
pub mod encode;
pub mod enrich;
pub mod extract;
pub mod input;
pub mod postprocess;
pub mod scheduler;
pub mod unit;
