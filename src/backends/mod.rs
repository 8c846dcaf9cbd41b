//! Default OCR, description and conversion backends.

pub mod libreoffice;
pub mod tesseract;
pub mod vision;

pub use libreoffice::LibreOfficeConverter;
pub use tesseract::TesseractRecognizer;
pub use vision::{resolve_provider, VisionDescriber, DEFAULT_VISION_MODEL};
