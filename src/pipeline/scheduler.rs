//! Pipeline scheduler: fan units out to a bounded worker pool, gather them
//! back in order.
//!
//! ## Concurrency model
//!
//! Every unit becomes one future; `buffer_unordered(concurrency)` keeps at
//! most `concurrency` of them in flight. Each future hands its unit to
//! `tokio::spawn`, so a panic inside one unit surfaces as a `JoinError` on
//! that unit alone. Results arrive in completion order and are sorted by
//! index afterwards.
//!
//! The only state shared between workers is the run's [`EnrichmentBudget`].

use crate::capability::{ImageDescriber, TextRecognizer};
use crate::document::Document;
use crate::error::{ScribeError, UnitError};
use crate::output::{AggregateResult, UnitResult};
use crate::pipeline::budget::EnrichmentBudget;
use crate::pipeline::enrich::{Enricher, EnrichmentOptions};
use crate::pipeline::unit::process_unit;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs documents through extraction and enrichment.
///
/// A `Pipeline` holds no per-run state and can be reused; every call to
/// [`Pipeline::run`] gets a fresh budget.
#[derive(Clone)]
pub struct Pipeline {
    enricher: Arc<Enricher>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Process every unit of `document` with a budget of `initial_budget`
    /// descriptions.
    ///
    /// Always returns one [`UnitResult`] per unit, sorted by index. Units that
    /// fail, panic, or are cancelled before starting carry error markers.
    pub async fn run(&self, document: &Document, initial_budget: usize) -> AggregateResult {
        let start = Instant::now();
        let total = document.len();
        let kind = document.kind();
        let budget = Arc::new(EnrichmentBudget::new(initial_budget));

        info!(
            "Processing {} {}s with {} workers, budget {}",
            total,
            kind,
            self.concurrency.min(total.max(1)),
            initial_budget
        );
        if let Some(ref cb) = self.progress {
            cb.on_run_start(total);
        }

        let units: Vec<UnitResult> = stream::iter(document.units().iter().map(|unit| {
            let unit = Arc::clone(unit);
            let enricher = Arc::clone(&self.enricher);
            let budget = Arc::clone(&budget);
            let progress = self.progress.clone();
            let cancel = self.cancel.clone();
            async move {
                let index = unit.index();

                // Futures are created lazily by the pool, so this check runs
                // when a worker slot frees up, not at submission time.
                if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                    debug!("{} {} cancelled before start", kind.title(), index);
                    let marker = UnitError::Cancelled { unit: index };
                    if let Some(ref cb) = progress {
                        cb.on_unit_error(index, total, &marker.to_string());
                    }
                    return UnitResult::failed(index, marker);
                }

                if let Some(ref cb) = progress {
                    cb.on_unit_start(index, total);
                }

                let handle = tokio::spawn(async move {
                    process_unit(unit.as_ref(), kind, &enricher, &budget).await
                });

                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        let detail = join_error_detail(e);
                        warn!("{} {} task failed: {}", kind.title(), index, detail);
                        UnitResult::failed(index, UnitError::Panicked { unit: index, detail })
                    }
                };

                if let Some(ref cb) = progress {
                    match result.first_error() {
                        None => cb.on_unit_complete(index, total, result.enrichment_count),
                        Some(e) => cb.on_unit_error(index, total, &e.to_string()),
                    }
                }
                result
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut aggregate =
            AggregateResult::assemble(kind, units, start.elapsed().as_millis() as u64);
        aggregate.stats.budget_spent = budget.spent();
        if aggregate.stats.budget_spent != aggregate.total_enrichment_count {
            warn!(
                "{} description calls were made but only {} are attributed to units",
                aggregate.stats.budget_spent, aggregate.total_enrichment_count
            );
        }

        info!(
            "Run complete: {} {}s, {} described, {} with errors, {}ms",
            aggregate.stats.total_units,
            kind,
            aggregate.total_enrichment_count,
            aggregate.stats.units_with_errors,
            aggregate.stats.duration_ms
        );
        if let Some(ref cb) = self.progress {
            cb.on_run_complete(total, aggregate.total_enrichment_count);
        }

        aggregate
    }
}

fn join_error_detail(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    options: EnrichmentOptions,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    describer: Option<Arc<dyn ImageDescriber>>,
    prompt: Option<String>,
    concurrency: Option<usize>,
    progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
}

impl PipelineBuilder {
    pub fn options(mut self, options: EnrichmentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = Some(n);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<Pipeline, ScribeError> {
        let concurrency = self.concurrency.unwrap_or(10);
        if concurrency == 0 {
            return Err(ScribeError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        let enricher = Enricher::new(self.options, self.recognizer, self.describer, self.prompt)?;
        Ok(Pipeline {
            enricher: Arc::new(enricher),
            concurrency,
            progress: self.progress,
            cancel: self.cancel,
        })
    }
}
