//! pdfcompose: Merge PDF documents and list the images their pages draw.
//!
//! This is the public API facade crate for pdfcompose-rs. It re-exports types
//! from pdfcompose-core and uses pdfcompose-parse for PDF reading.
//!
//! # Architecture
//!
//! - **pdfcompose-core**: Backend-independent resource reconciliation, form
//!   merging, and the content stream image walker
//! - **pdfcompose-parse**: lopdf backend, content stream tokenizer, AcroForm I/O
//! - **pdfcompose** (this crate): [`compose`] and [`Pdf`], tying both together
//!
//! # Example
//!
//! ```ignore
//! let result = pdfcompose::compose(&["a.pdf", "b.pdf"], "out.pdf")?;
//! for warning in &result.warnings {
//!     eprintln!("{warning}");
//! }
//!
//! let pdf = pdfcompose::Pdf::open_file("out.pdf")?;
//! for image in pdf.page_images(0)?.images {
//!     println!("{}x{}", image.info.width, image.info.height);
//! }
//! ```

mod compose;
mod pdf;

pub use compose::{compose, compose_advanced, compose_bytes, compose_with_options};
pub use pdf::Pdf;

pub use pdfcompose_core;
pub use pdfcompose_core::{
    ComposeOptions, ComposeResult, ComposeWarning, DiscoveredImage, ImageInfo, ImageKind,
    ImageSink, PdfError, UsageStats, WalkOptions, WalkReport, WalkSummary, WarningCode,
};
pub use pdfcompose_parse;
