//! Error and warning types for pdfcompose.
//!
//! Provides [`PdfError`] for fatal errors that abort a composition or an
//! inspection, [`ComposeWarning`] for localized problems that degrade the
//! result without stopping it, and [`ComposeResult`] for pairing a value with
//! the warnings collected while producing it.

use std::fmt;

use thiserror::Error;

/// Fatal error types for composition and inspection.
///
/// Anything that would leave the output document inconsistent is fatal:
/// unreadable input, failed decryption, or a failure while serializing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PdfError {
    /// Error parsing PDF structure or syntax.
    #[error("parse error: {0}")]
    Parse(String),
    /// I/O error reading input or writing output.
    #[error("I/O error: {0}")]
    Io(String),
    /// An encrypted input could not be opened with the empty credential.
    ///
    /// `document` is the 1-based position of the input in the compose list.
    #[error("document {document} could not be decrypted: {reason}")]
    Decryption {
        /// 1-based index of the offending input document.
        document: usize,
        /// Human-readable reason reported by the backend.
        reason: String,
    },
    /// The PDF is encrypted and requires a non-empty password to open.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,
    /// The supplied password is incorrect for this encrypted PDF.
    #[error("the supplied password is incorrect")]
    InvalidPassword,
    /// `compose` was called with no inputs.
    #[error("no input documents to compose")]
    EmptyInput,
    /// A page index outside `0..page_count` was requested.
    #[error("page index {index} out of range (0..{page_count})")]
    PageOutOfRange {
        /// The requested 0-based index.
        index: usize,
        /// Number of pages in the document.
        page_count: usize,
    },
    /// The output document could not be serialized or finalized.
    #[error("failed to write output: {0}")]
    Write(String),
    /// Any other error not covered by specific variants.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for PdfError {
    fn from(err: std::io::Error) -> Self {
        PdfError::Io(err.to_string())
    }
}

/// Machine-readable code categorizing a [`ComposeWarning`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", content = "detail")
)]
pub enum WarningCode {
    /// An object expected to be a dictionary (or array) had another type.
    TypeMismatch,
    /// A resource key present in both namespaces was overwritten by the later document.
    ResourceOverride,
    /// A name could not be resolved in the current resources.
    UnresolvedReference,
    /// A name resolved to something other than an Image or Form XObject.
    WrongVariant,
    /// An operator carried operands of an unexpected shape.
    MalformedOperator,
    /// The Form XObject depth or visit budget was exhausted.
    RecursionLimit,
    /// A second XFA stream was dropped in favor of the first one seen.
    XfaNotMerged,
    /// Optional-content properties of a later document were ignored.
    OptionalContentIgnored,
    /// A form field dictionary was missing or malformed.
    MalformedField,
    /// Any other warning not covered by specific variants.
    Other(String),
}

impl WarningCode {
    /// Returns the string tag for this warning code.
    pub fn as_str(&self) -> &str {
        match self {
            WarningCode::TypeMismatch => "TYPE_MISMATCH",
            WarningCode::ResourceOverride => "RESOURCE_OVERRIDE",
            WarningCode::UnresolvedReference => "UNRESOLVED_REFERENCE",
            WarningCode::WrongVariant => "WRONG_VARIANT",
            WarningCode::MalformedOperator => "MALFORMED_OPERATOR",
            WarningCode::RecursionLimit => "RECURSION_LIMIT",
            WarningCode::XfaNotMerged => "XFA_NOT_MERGED",
            WarningCode::OptionalContentIgnored => "OPTIONAL_CONTENT_IGNORED",
            WarningCode::MalformedField => "MALFORMED_FIELD",
            WarningCode::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem encountered while composing or walking.
///
/// Carries a structured [`code`](ComposeWarning::code), a description, and
/// optional location context: the 1-based input document, the 0-based page,
/// the operator index within a content stream, and a free-form element label
/// such as a resource key or XObject name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComposeWarning {
    /// Machine-readable warning code.
    pub code: WarningCode,
    /// Human-readable description.
    pub description: String,
    /// 1-based index of the input document, if applicable.
    pub document: Option<usize>,
    /// 0-based page index, if applicable.
    pub page: Option<usize>,
    /// Index of the operator in its content stream, if applicable.
    pub operator_index: Option<usize>,
    /// Element context (e.g. `"XObject /Im1"`).
    pub element: Option<String>,
}

impl ComposeWarning {
    /// Create a warning with a code and description and no location context.
    pub fn new(code: WarningCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            document: None,
            page: None,
            operator_index: None,
            element: None,
        }
    }

    /// Attach the 1-based input document index.
    pub fn in_document(mut self, document: usize) -> Self {
        self.document = Some(document);
        self
    }

    /// Attach the 0-based page index.
    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Attach the operator index within the content stream.
    pub fn at_operator(mut self, operator_index: usize) -> Self {
        self.operator_index = Some(operator_index);
        self
    }

    /// Attach an element label.
    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// Log the warning and append it to `warnings`.
    pub fn record(self, warnings: &mut Vec<ComposeWarning>) {
        tracing::warn!(code = %self.code, "{}", self);
        warnings.push(self);
    }

    /// Convert this warning into a [`PdfError`].
    pub fn to_error(&self) -> PdfError {
        PdfError::Other(self.to_string())
    }
}

impl fmt::Display for ComposeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)?;
        if let Some(document) = self.document {
            write!(f, " (document {document})")?;
        }
        if let Some(page) = self.page {
            write!(f, " (page {page})")?;
        }
        if let Some(index) = self.operator_index {
            write!(f, " [operator #{index}]")?;
        }
        if let Some(ref element) = self.element {
            write!(f, " [{element}]")?;
        }
        Ok(())
    }
}

/// Result wrapper that pairs a value with collected warnings.
#[derive(Debug, Clone)]
pub struct ComposeResult<T> {
    /// The produced value.
    pub value: T,
    /// Warnings collected while producing it.
    pub warnings: Vec<ComposeWarning>,
}

impl<T> ComposeResult<T> {
    /// Create a result with no warnings.
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Create a result with warnings.
    pub fn with_warnings(value: T, warnings: Vec<ComposeWarning>) -> Self {
        Self { value, warnings }
    }

    /// Returns true if there are no warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Transform the value while preserving warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ComposeResult<U> {
        ComposeResult {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_error_decryption_names_document() {
        let err = PdfError::Decryption {
            document: 2,
            reason: "incorrect password".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "document 2 could not be decrypted: incorrect password"
        );
    }

    #[test]
    fn pdf_error_page_out_of_range() {
        let err = PdfError::PageOutOfRange {
            index: 4,
            page_count: 3,
        };
        assert_eq!(err.to_string(), "page index 4 out of range (0..3)");
    }

    #[test]
    fn pdf_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let pdf_err: PdfError = io_err.into();
        assert!(matches!(pdf_err, PdfError::Io(_)));
        assert!(pdf_err.to_string().contains("missing file"));
    }

    #[test]
    fn pdf_error_implements_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(PdfError::EmptyInput);
        assert_eq!(err.to_string(), "no input documents to compose");
    }

    #[test]
    fn warning_code_tags() {
        assert_eq!(WarningCode::TypeMismatch.as_str(), "TYPE_MISMATCH");
        assert_eq!(WarningCode::XfaNotMerged.as_str(), "XFA_NOT_MERGED");
        assert_eq!(WarningCode::Other("x".into()).as_str(), "OTHER");
    }

    #[test]
    fn warning_display_without_context() {
        let w = ComposeWarning::new(WarningCode::RecursionLimit, "too deep");
        assert_eq!(w.to_string(), "[RECURSION_LIMIT] too deep");
    }

    #[test]
    fn warning_display_with_full_context() {
        let w = ComposeWarning::new(WarningCode::UnresolvedReference, "XObject not found")
            .in_document(2)
            .on_page(0)
            .at_operator(7)
            .with_element("XObject /Im9");
        assert_eq!(
            w.to_string(),
            "[UNRESOLVED_REFERENCE] XObject not found (document 2) (page 0) [operator #7] [XObject /Im9]"
        );
    }

    #[test]
    fn warning_record_appends() {
        let mut warnings = Vec::new();
        ComposeWarning::new(WarningCode::XfaNotMerged, "second XFA dropped").record(&mut warnings);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::XfaNotMerged);
    }

    #[test]
    fn warning_to_error() {
        let w = ComposeWarning::new(WarningCode::TypeMismatch, "not a dictionary");
        assert_eq!(
            w.to_error(),
            PdfError::Other("[TYPE_MISMATCH] not a dictionary".to_string())
        );
    }

    #[test]
    fn compose_result_map_keeps_warnings() {
        let result = ComposeResult::with_warnings(
            2,
            vec![ComposeWarning::new(WarningCode::Other("x".into()), "x")],
        );
        let mapped = result.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.warnings.len(), 1);
        assert!(!mapped.is_clean());
        assert!(ComposeResult::ok(()).is_clean());
    }
}
