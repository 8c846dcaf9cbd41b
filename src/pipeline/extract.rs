//! Unit extraction: one page or slide → plain text + image blobs.
//!
//! Text and images are read independently. When one half fails the other is
//! still returned, and the failure travels alongside as an [`ExtractionError`].

use crate::document::{DocumentUnit, ImageBytes};
use crate::error::ExtractionError;
use crate::pipeline::postprocess::clean_text;
use tracing::{debug, warn};

/// What extraction produced for one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitExtraction {
    pub text: String,
    pub images: Vec<ImageBytes>,
    pub errors: Vec<ExtractionError>,
}

/// Extract a unit's text and images.
///
/// Pure: no shared state, safe to call concurrently for different units, and
/// calling it twice on the same unit gives the same answer.
pub fn extract(unit: &dyn DocumentUnit) -> UnitExtraction {
    let index = unit.index();
    let mut out = UnitExtraction::default();

    match unit.text_runs() {
        Ok(runs) => out.text = join_runs(&runs),
        Err(e) => {
            warn!("Unit {}: {}", index, e);
            out.errors.push(e);
        }
    }

    match unit.images() {
        Ok(images) => out.images = images,
        Err(e) => {
            warn!("Unit {}: {}", index, e);
            out.errors.push(e);
        }
    }

    for e in unit.image_errors() {
        warn!("Unit {}: {}", index, e);
        out.errors.push(e);
    }

    debug!(
        "Unit {}: {} chars, {} images",
        index,
        out.text.len(),
        out.images.len()
    );
    out
}

/// Join text fragments one per line, dropping empty ones, then normalise.
fn join_runs(runs: &[String]) -> String {
    let joined = runs
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    clean_text(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryUnit;
    use std::sync::Arc;

    #[test]
    fn joins_trimmed_runs() {
        let unit = MemoryUnit::new(
            1,
            vec!["  Slide 1 ".into(), "".into(), "Body text".into()],
            vec![],
        );
        let out = extract(&unit);
        assert_eq!(out.text, "Slide 1\nBody text");
        assert!(out.errors.is_empty());
    }

    #[test]
    fn text_failure_keeps_images() {
        let image: ImageBytes = Arc::from(&b"\x89PNG"[..]);
        let unit = MemoryUnit::from_parts(
            2,
            Err(ExtractionError::text("content stream truncated")),
            Ok(vec![image.clone()]),
        );
        let out = extract(&unit);
        assert_eq!(out.text, "");
        assert_eq!(out.images, vec![image]);
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn image_failure_keeps_text() {
        let unit = MemoryUnit::from_parts(
            3,
            Ok(vec!["Caption".into()]),
            Err(ExtractionError::images("bad xobject")),
        );
        let out = extract(&unit);
        assert_eq!(out.text, "Caption");
        assert!(out.images.is_empty());
        assert_eq!(out.errors, vec![ExtractionError::images("bad xobject")]);
    }

    #[test]
    fn one_unreadable_image_keeps_its_siblings() {
        let kept: ImageBytes = Arc::from(&b"ok"[..]);
        let unit = MemoryUnit::from_parts(5, Ok(vec!["Slide 5".into()]), Ok(vec![kept.clone()]))
            .with_image_errors(vec![ExtractionError::images("ppt/media/missing.png: not found")]);
        let out = extract(&unit);
        assert_eq!(out.text, "Slide 5");
        assert_eq!(out.images, vec![kept]);
        assert_eq!(
            out.errors,
            vec![ExtractionError::images("ppt/media/missing.png: not found")]
        );
    }

    #[test]
    fn extraction_is_idempotent() {
        let unit = MemoryUnit::new(
            4,
            vec!["alpha".into(), "beta".into()],
            vec![Arc::from(&b"one"[..]), Arc::from(&b"two"[..])],
        );
        assert_eq!(extract(&unit), extract(&unit));
    }
}
