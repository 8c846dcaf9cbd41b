//! Built-in [`DocumentSource`](crate::capability::DocumentSource)
//! implementations.
//!
//! Both sources materialise the whole document into
//! [`MemoryUnit`](crate::document::MemoryUnit)s before returning, so the
//! scheduler never touches a parser handle from a worker.

pub mod pdf;
pub mod pptx;

pub use pdf::PdfiumSource;
pub use pptx::PptxSource;
