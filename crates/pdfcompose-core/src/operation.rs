//! Content-stream operations as produced by a tokenizer.
//!
//! The walker only reads these values; producing them is the job of a
//! backend (see `pdfcompose-parse`).

/// A content-stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Integer number (e.g., `42`, `-7`).
    Integer(i64),
    /// Real number (e.g., `3.14`, `.5`).
    Real(f64),
    /// Name, stored without the leading `/`.
    Name(String),
    /// Literal or hexadecimal string, as decoded bytes.
    String(Vec<u8>),
    /// Array of operands.
    Array(Vec<Operand>),
    /// Dictionary (`<< /Key value >>`), in source order.
    Dictionary(Vec<(String, Operand)>),
    /// `true` or `false`.
    Boolean(bool),
    /// The null object.
    Null,
    /// A complete `BI ... ID ... EI` sequence.
    InlineImage(InlineImage),
}

impl Operand {
    /// The name, if this operand is one.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// The numeric value truncated to an integer, for Integer and Real operands.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Operand::Integer(i) => Some(*i),
            Operand::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    /// Short type label used in warnings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Operand::Integer(_) => "integer",
            Operand::Real(_) => "real",
            Operand::Name(_) => "name",
            Operand::String(_) => "string",
            Operand::Array(_) => "array",
            Operand::Dictionary(_) => "dictionary",
            Operand::Boolean(_) => "boolean",
            Operand::Null => "null",
            Operand::InlineImage(_) => "inline image",
        }
    }
}

/// Inline image captured from a `BI`/`ID`/`EI` sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InlineImage {
    /// Entries between `BI` and `ID`, keys as written (possibly abbreviated).
    pub dict: Vec<(String, Operand)>,
    /// Raw bytes between `ID` and `EI`.
    pub data: Vec<u8>,
}

impl InlineImage {
    /// Look up an entry by its full name or its inline abbreviation.
    ///
    /// ```
    /// use pdfcompose_core::{InlineImage, Operand};
    ///
    /// let image = InlineImage {
    ///     dict: vec![("W".into(), Operand::Integer(8))],
    ///     data: Vec::new(),
    /// };
    /// assert_eq!(image.get("Width", "W"), Some(&Operand::Integer(8)));
    /// ```
    pub fn get(&self, full: &str, abbreviation: &str) -> Option<&Operand> {
        self.dict
            .iter()
            .find(|(key, _)| key == full || key == abbreviation)
            .map(|(_, value)| value)
    }
}

/// One content-stream instruction with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operator keyword (e.g., `"Do"`, `"BI"`, `"Tf"`).
    pub operator: String,
    /// Operands in source order.
    pub operands: Vec<Operand>,
}

impl Operation {
    /// Create an operation.
    pub fn new(operator: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            operator: operator.into(),
            operands,
        }
    }
}
