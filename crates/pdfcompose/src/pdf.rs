//! Read-only inspection handle for listing the images a PDF draws.

use pdfcompose_core::{
    ComposeOptions, ComposeWarning, DiscoveredImage, ImageSink, PdfError, UsageStats,
    WalkOptions, WalkReport, WalkSummary, walk,
};
use pdfcompose_parse::{LopdfBackend, LopdfDocument, PdfBackend, load_form};

/// A PDF document opened for inspection.
///
/// # Example
///
/// ```ignore
/// let pdf = Pdf::open(&bytes)?;
/// for index in 0..pdf.page_count() {
///     let report = pdf.page_images(index)?;
///     println!("page {}: {} images", index + 1, report.images.len());
/// }
/// ```
#[derive(Debug)]
pub struct Pdf {
    doc: LopdfDocument,
    walk_options: WalkOptions,
}

impl Pdf {
    /// Open a PDF from bytes.
    ///
    /// Encrypted documents are tried with the empty password.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::PasswordRequired`] if the document is encrypted
    /// and the empty password does not open it, or [`PdfError::Parse`] if
    /// the bytes are not a PDF.
    pub fn open(bytes: &[u8]) -> Result<Self, PdfError> {
        let doc = LopdfBackend::open(bytes).map_err(PdfError::from)?;
        Ok(Self::from_doc(doc))
    }

    /// Open an encrypted PDF from bytes with a password.
    ///
    /// If the PDF is not encrypted, the password is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::InvalidPassword`] if the password is wrong.
    pub fn open_with_password(bytes: &[u8], password: &[u8]) -> Result<Self, PdfError> {
        let doc = LopdfBackend::open_with_password(bytes, password).map_err(PdfError::from)?;
        Ok(Self::from_doc(doc))
    }

    /// Open a PDF from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::Io`] if the file cannot be read, otherwise as
    /// [`Pdf::open`].
    pub fn open_file(path: impl AsRef<std::path::Path>) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| PdfError::Io(e.to_string()))?;
        Self::open(&bytes)
    }

    fn from_doc(doc: LopdfDocument) -> Self {
        tracing::debug!(pages = LopdfBackend::page_count(&doc), "opened document");
        Self {
            doc,
            walk_options: WalkOptions::default(),
        }
    }

    /// Builder: use `options` for every subsequent walk.
    pub fn with_walk_options(mut self, options: WalkOptions) -> Self {
        self.walk_options = options;
        self
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        LopdfBackend::page_count(&self.doc)
    }

    /// Walk page `index` (0-based), feeding every image to `sink`.
    ///
    /// Warnings passed to `sink` carry the page index.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::PageOutOfRange`] for a bad index, or a parse
    /// error if the page's content cannot be decoded.
    pub fn walk_page(&self, index: usize, sink: &mut dyn ImageSink) -> Result<WalkSummary, PdfError> {
        let page = LopdfBackend::get_page(&self.doc, index).map_err(PdfError::from)?;
        let operations = LopdfBackend::page_operations(&self.doc, &page).map_err(PdfError::from)?;
        let resources = LopdfBackend::page_resources(&self.doc, &page).map_err(PdfError::from)?;

        let mut sink = PageSink { page: index, inner: sink };
        let summary = walk(&self.doc, &operations, &resources, &self.walk_options, &mut sink);
        tracing::debug!(
            page = index,
            images = summary.images,
            skipped = summary.skipped,
            forms = summary.forms_entered,
            "walked page"
        );
        Ok(summary)
    }

    /// All images drawn by page `index` (0-based), in content order.
    ///
    /// # Errors
    ///
    /// Same as [`Pdf::walk_page`].
    pub fn page_images(&self, index: usize) -> Result<WalkReport, PdfError> {
        let mut report = WalkReport::default();
        self.walk_page(index, &mut report)?;
        Ok(report)
    }

    /// One report per page, in page order.
    ///
    /// # Errors
    ///
    /// Stops at the first page that cannot be walked.
    pub fn images(&self) -> Result<Vec<WalkReport>, PdfError> {
        (0..self.page_count())
            .map(|index| self.page_images(index))
            .collect()
    }

    /// Filter and colorspace histograms over every page.
    ///
    /// # Errors
    ///
    /// Same as [`Pdf::images`].
    pub fn usage_stats(&self) -> Result<UsageStats, PdfError> {
        let mut stats = UsageStats::default();
        for index in 0..self.page_count() {
            self.walk_page(index, &mut stats)?;
        }
        Ok(stats)
    }

    /// Fully qualified names of the form's fields, in tree order.
    ///
    /// Nodes without a partial name (widgets) are not listed.
    pub fn form_field_names(&self) -> Vec<String> {
        let (form, _) = load_form(self.doc.inner(), ComposeOptions::default().max_field_depth);
        let Some(form) = form else {
            return Vec::new();
        };
        form.fields
            .iter()
            .filter(|(_, node)| node.name.is_some())
            .map(|(id, _)| form.fields.qualified_name(id))
            .collect()
    }

    /// Access the backend document.
    pub fn backend(&self) -> &LopdfDocument {
        &self.doc
    }
}

/// Tags warnings with the page they came from.
struct PageSink<'a> {
    page: usize,
    inner: &'a mut dyn ImageSink,
}

impl ImageSink for PageSink<'_> {
    fn on_image(&mut self, image: DiscoveredImage) {
        self.inner.on_image(image);
    }

    fn on_skip(&mut self, name: &str, depth: usize) {
        self.inner.on_skip(name, depth);
    }

    fn on_warning(&mut self, warning: ComposeWarning) {
        self.inner.on_warning(warning.on_page(self.page));
    }
}
