//! pdfcompose-parse: lopdf backend for pdfcompose.
//!
//! This crate connects the backend-independent algorithms of
//! [`pdfcompose_core`] to real PDF files:
//!
//! - [`tokenizer`]: content stream bytes to [`Operation`](pdfcompose_core::Operation)s
//! - [`LopdfBackend`]: page enumeration, content and resources via [`PdfBackend`]
//! - [`LopdfDocument`]: [`XObjectResolver`](pdfcompose_core::XObjectResolver) over lopdf objects
//! - [`namespace_from_dict`] / [`namespace_to_dict`]: resource dictionaries
//! - [`load_form`] / [`store_form`]: `/AcroForm` in and out

pub mod backend;
pub mod error;
pub mod form;
pub mod lopdf_backend;
pub mod resources;
pub mod tokenizer;

pub use backend::PdfBackend;
pub use error::BackendError;
pub use form::{decode_pdf_string, load_form, store_form};
pub use lopdf_backend::{
    EMPTY_PASSWORD, LopdfBackend, LopdfDocument, LopdfPage, catalog, decode_stream, load_document,
    object_type_name, resolve_inherited, resolve_ref, string_bytes,
};
pub use resources::{namespace_from_dict, namespace_to_dict};
pub use tokenizer::tokenize;

/// Re-export of the lopdf version this backend is built against.
pub use lopdf;
