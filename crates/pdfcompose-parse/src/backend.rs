//! PDF parsing backend trait.
//!
//! Defines the [`PdfBackend`] trait that abstracts the read side of a PDF
//! object model: opening documents, enumerating pages, and handing out page
//! content and resources in a form the image walker can consume.

use pdfcompose_core::{Operation, PdfError, XObjectResolver};

/// Trait abstracting PDF reading operations.
///
/// # Associated Types
///
/// - `Document`: The parsed document. It resolves XObject names itself, so a
///   page can be walked with [`pdfcompose_core::walk`] directly.
/// - `Page`: A reference to a single page within a document.
/// - `Resources`: The backend's resource dictionary representation.
/// - `Error`: Backend-specific error type, convertible to [`PdfError`].
///
/// # Usage
///
/// ```ignore
/// let doc = MyBackend::open(pdf_bytes)?;
/// let page = MyBackend::get_page(&doc, 0)?;
/// let ops = MyBackend::page_operations(&doc, &page)?;
/// let resources = MyBackend::page_resources(&doc, &page)?;
/// let summary = walk(&doc, &ops, &resources, &WalkOptions::default(), &mut sink);
/// ```
pub trait PdfBackend {
    /// The parsed PDF document type.
    type Document: XObjectResolver<Resources = Self::Resources>;

    /// A reference to a single page within a document.
    type Page;

    /// A resource dictionary.
    type Resources;

    /// Backend-specific error type, convertible to [`PdfError`].
    type Error: std::error::Error + Into<PdfError>;

    /// Parse PDF bytes into a document.
    ///
    /// Encrypted documents are opened with the empty user password.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid PDF, or if the document
    /// is encrypted and the empty password is not accepted.
    fn open(bytes: &[u8]) -> Result<Self::Document, Self::Error>;

    /// Parse PDF bytes, decrypting with the given password if encrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid PDF or the password is
    /// incorrect.
    fn open_with_password(bytes: &[u8], password: &[u8]) -> Result<Self::Document, Self::Error>;

    /// Return the number of pages in the document.
    fn page_count(doc: &Self::Document) -> usize;

    /// Access a page by 0-based index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range.
    fn get_page(doc: &Self::Document, index: usize) -> Result<Self::Page, Self::Error>;

    /// Tokenize the page's concatenated content streams.
    ///
    /// # Errors
    ///
    /// Returns an error if a content stream cannot be decoded or tokenized.
    fn page_operations(
        doc: &Self::Document,
        page: &Self::Page,
    ) -> Result<Vec<Operation>, Self::Error>;

    /// The page's effective resources, inherited from the page tree if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `/Resources` exists but is not a dictionary.
    fn page_resources(
        doc: &Self::Document,
        page: &Self::Page,
    ) -> Result<Self::Resources, Self::Error>;
}
