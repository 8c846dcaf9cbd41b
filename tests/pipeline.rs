//! Scheduler behaviour with in-memory collaborators.
//!
//! No network, no pdfium, no tesseract: every document is built from
//! `MemoryUnit`s and every backend is a fake defined below.

use async_trait::async_trait;
use scribeme::prompts::{ENGLISH_PROMPT, SPANISH_PROMPT};
use scribeme::{
    DescriptionError, Document, EnrichmentOptions, ExtractionError, ExtractionProgressCallback,
    ImageBytes, ImageDescriber, ImageOutcome, Language, MemoryUnit, Pipeline, RecognitionError,
    TextRecognizer, UnitError, UnitKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Describes images by echoing their bytes. `b"slow"` sleeps first,
/// `b"broken"` fails.
#[derive(Default)]
struct FakeDescriber {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    cancel_after_first: Option<CancellationToken>,
}

#[async_trait]
impl ImageDescriber for FakeDescriber {
    async fn describe(&self, image: &[u8], prompt: &str) -> Result<String, DescriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(ref token) = self.cancel_after_first {
            token.cancel();
        }
        match image {
            b"slow" => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok("slow image".into())
            }
            b"broken" => Err(DescriptionError::Backend("HTTP 500 from vision API".into())),
            other => Ok(format!("image {}", String::from_utf8_lossy(other))),
        }
    }
}

#[derive(Default)]
struct FakeRecognizer {
    calls: AtomicUsize,
    codes: Mutex<Vec<String>>,
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize(&self, image: &[u8], code: &str) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.codes.lock().unwrap().push(code.to_string());
        Ok(format!("ocr {}", String::from_utf8_lossy(image)))
    }
}

#[derive(Default)]
struct CompletionOrder {
    order: Mutex<Vec<usize>>,
}

impl ExtractionProgressCallback for CompletionOrder {
    fn on_unit_complete(&self, index: usize, _total: usize, _enrichment_count: usize) {
        self.order.lock().unwrap().push(index);
    }
    fn on_unit_error(&self, index: usize, _total: usize, _error: &str) {
        self.order.lock().unwrap().push(index);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn images(names: &[&str]) -> Vec<ImageBytes> {
    names.iter().map(|n| ImageBytes::from(n.as_bytes())).collect()
}

/// `units` slides with `per_unit` images each.
fn deck(units: usize, per_unit: usize) -> Document {
    Document::from_memory(
        UnitKind::Slide,
        (1..=units)
            .map(|i| {
                let imgs = (0..per_unit)
                    .map(|j| ImageBytes::from(format!("{i}-{j}").into_bytes()))
                    .collect();
                MemoryUnit::new(i, vec![format!("Slide {i}")], imgs)
            })
            .collect(),
    )
}

fn describe_pipeline(describer: Arc<FakeDescriber>, concurrency: usize) -> Pipeline {
    Pipeline::builder()
        .options(EnrichmentOptions {
            ocr: false,
            describe: true,
            language: Language::English,
        })
        .describer(describer)
        .concurrency(concurrency)
        .build()
        .unwrap()
}

// ── Budget ───────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn budget_caps_descriptions_across_fifty_workers() {
    let describer = Arc::new(FakeDescriber::default());
    let pipeline = describe_pipeline(describer.clone(), 50);

    let result = pipeline.run(&deck(100, 10), 5).await;

    assert_eq!(result.stats.total_images, 1000);
    assert_eq!(result.total_enrichment_count, 5);
    assert_eq!(describer.calls.load(Ordering::SeqCst), 5);
    let slots: usize = result.units.iter().map(|u| u.enriched_images.len()).sum();
    assert_eq!(slots, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn budget_larger_than_images_describes_everything() {
    let describer = Arc::new(FakeDescriber::default());
    let pipeline = describe_pipeline(describer.clone(), 4);

    let result = pipeline.run(&deck(3, 2), 25).await;
    assert_eq!(result.total_enrichment_count, 6);
    assert!(result.units.iter().all(|u| u.enriched_images.len() == 2));
}

#[tokio::test]
async fn zero_budget_skips_without_errors() {
    let describer = Arc::new(FakeDescriber::default());
    let pipeline = describe_pipeline(describer.clone(), 4);

    let result = pipeline.run(&deck(4, 3), 0).await;
    assert_eq!(result.total_enrichment_count, 0);
    assert_eq!(describer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.stats.units_with_errors, 0);
    assert_eq!(result.errors().count(), 0);
    assert!(result.units.iter().all(|u| u.image_count == 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_have_independent_budgets() {
    let describer = Arc::new(FakeDescriber::default());
    let pipeline = describe_pipeline(describer.clone(), 8);
    let a = deck(20, 5);
    let b = deck(20, 5);

    let (ra, rb) = tokio::join!(pipeline.run(&a, 3), pipeline.run(&b, 3));
    assert_eq!(ra.total_enrichment_count, 3);
    assert_eq!(rb.total_enrichment_count, 3);
    assert_eq!(describer.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn ocr_is_not_budget_gated() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let pipeline = Pipeline::builder()
        .options(EnrichmentOptions {
            ocr: true,
            describe: false,
            language: Language::English,
        })
        .recognizer(recognizer.clone())
        .build()
        .unwrap();

    let result = pipeline.run(&deck(3, 4), 0).await;
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 12);
    assert_eq!(result.total_enrichment_count, 0);
    assert!(result.units[0]
        .text
        .contains("OCR text from image 4 on slide 1: ocr 1-3"));
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn result_order_ignores_completion_order() {
    let describer = Arc::new(FakeDescriber::default());
    let progress = Arc::new(CompletionOrder::default());
    let pipeline = Pipeline::builder()
        .options(EnrichmentOptions {
            ocr: false,
            describe: true,
            language: Language::English,
        })
        .describer(describer)
        .concurrency(3)
        .progress_callback(progress.clone())
        .build()
        .unwrap();

    let document = Document::from_memory(
        UnitKind::Page,
        vec![
            MemoryUnit::new(1, vec!["one".into()], images(&["a"])),
            MemoryUnit::new(2, vec!["two".into()], images(&["slow"])),
            MemoryUnit::new(3, vec!["three".into()], images(&["c"])),
        ],
    );

    let result = pipeline.run(&document, 25).await;

    let order: Vec<usize> = result.units.iter().map(|u| u.index).collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert_eq!(progress.order.lock().unwrap().last(), Some(&2));
    assert_eq!(result.units[1].enriched_images[0].description(), Some("slow image"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_unit_is_returned_in_index_order() {
    let describer = Arc::new(FakeDescriber::default());
    for (units, workers) in [(1, 1), (7, 3), (64, 10), (250, 50)] {
        let pipeline = describe_pipeline(describer.clone(), workers);
        let result = pipeline.run(&deck(units, 1), 10).await;

        assert_eq!(result.units.len(), units);
        assert!(result.units.windows(2).all(|w| w[0].index < w[1].index));
        assert!(result.total_enrichment_count <= 10);
    }
}

// ── Error containment ────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_description_keeps_slide_text() {
    let pipeline = describe_pipeline(Arc::new(FakeDescriber::default()), 2);
    let document = Document::from_memory(
        UnitKind::Slide,
        vec![MemoryUnit::new(1, vec!["Slide 1".into()], images(&["broken"]))],
    );

    let result = pipeline.run(&document, 25).await;
    let unit = &result.units[0];

    assert_eq!(unit.text, "Slide 1");
    assert_eq!(unit.enriched_images.len(), 1);
    match &unit.enriched_images[0].outcome {
        ImageOutcome::Failed { error } => {
            assert_eq!(
                error,
                &UnitError::Description {
                    unit: 1,
                    image: 1,
                    detail: "description backend failed: HTTP 500 from vision API".into(),
                }
            );
        }
        other => panic!("expected a failed slot, got {other:?}"),
    }
    assert_eq!(result.stats.failed_descriptions, 1);
}

#[tokio::test]
async fn extraction_failure_does_not_abort_siblings() {
    let pipeline = describe_pipeline(Arc::new(FakeDescriber::default()), 2);
    let document = Document::from_memory(
        UnitKind::Page,
        vec![
            MemoryUnit::new(1, vec!["first".into()], vec![]),
            MemoryUnit::from_parts(
                2,
                Err(ExtractionError::text("broken content stream")),
                Err(ExtractionError::images("broken xobject")),
            ),
            MemoryUnit::new(3, vec!["third".into()], images(&["x"])),
        ],
    );

    let result = pipeline.run(&document, 25).await;
    assert_eq!(result.units.len(), 3);
    assert_eq!(result.units[0].text, "first");
    assert_eq!(result.units[1].errors.len(), 2);
    assert_eq!(result.units[2].enrichment_count, 1);
    assert_eq!(result.stats.units_with_errors, 1);
}

// ── Language ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_language_falls_back_to_english() {
    let describer = Arc::new(FakeDescriber::default());
    let recognizer = Arc::new(FakeRecognizer::default());
    let pipeline = Pipeline::builder()
        .options(EnrichmentOptions {
            ocr: true,
            describe: true,
            language: Language::parse("French"),
        })
        .describer(describer.clone())
        .recognizer(recognizer.clone())
        .build()
        .unwrap();

    let result = pipeline.run(&deck(1, 1), 25).await;
    assert!(result.errors().next().is_none());
    assert_eq!(describer.prompts.lock().unwrap().as_slice(), [ENGLISH_PROMPT]);
    assert_eq!(recognizer.codes.lock().unwrap().as_slice(), ["eng"]);
}

#[tokio::test]
async fn spanish_selects_spanish_prompt_and_code() {
    let describer = Arc::new(FakeDescriber::default());
    let recognizer = Arc::new(FakeRecognizer::default());
    let pipeline = Pipeline::builder()
        .options(EnrichmentOptions {
            ocr: true,
            describe: true,
            language: Language::parse("es"),
        })
        .describer(describer.clone())
        .recognizer(recognizer.clone())
        .build()
        .unwrap();

    pipeline.run(&deck(1, 1), 25).await;
    assert_eq!(describer.prompts.lock().unwrap().as_slice(), [SPANISH_PROMPT]);
    assert_eq!(recognizer.codes.lock().unwrap().as_slice(), ["spa"]);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_stops_units_not_yet_started() {
    let token = CancellationToken::new();
    let describer = Arc::new(FakeDescriber {
        cancel_after_first: Some(token.clone()),
        ..Default::default()
    });
    let pipeline = Pipeline::builder()
        .options(EnrichmentOptions {
            ocr: false,
            describe: true,
            language: Language::English,
        })
        .describer(describer.clone())
        .concurrency(1)
        .cancel_token(token)
        .build()
        .unwrap();

    let result = pipeline.run(&deck(5, 1), 25).await;

    assert_eq!(result.units.len(), 5);
    // The unit already in flight finishes.
    assert_eq!(result.units[0].enrichment_count, 1);
    assert_eq!(result.stats.cancelled_units, 4);
    assert_eq!(result.total_enrichment_count, 1);
    assert_eq!(describer.calls.load(Ordering::SeqCst), 1);
    for unit in &result.units[1..] {
        assert_eq!(unit.errors, vec![UnitError::Cancelled { unit: unit.index }]);
    }
}
