use std::path::Path;

use pdfcompose::Pdf;

use crate::page_range::parse_page_range;

/// Open a PDF for inspection with user-friendly error messages.
///
/// Returns `Err(1)` with a message printed to stderr if the file is missing
/// or cannot be opened.
pub fn open_pdf(file: &Path, password: Option<&str>) -> Result<Pdf, i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }

    let bytes = std::fs::read(file).map_err(|e| {
        eprintln!("Error: failed to read {}: {e}", file.display());
        1
    })?;
    let opened = match password {
        Some(password) => Pdf::open_with_password(&bytes, password.as_bytes()),
        None => Pdf::open(&bytes),
    };
    opened.map_err(|e| {
        eprintln!("Error: failed to open PDF: {e}");
        1
    })
}

/// Resolve an optional page range string into 0-based page indices.
///
/// `None` selects every page.
pub fn resolve_pages(pages: Option<&str>, page_count: usize) -> Result<Vec<usize>, i32> {
    match pages {
        Some(range) => parse_page_range(range, page_count).map_err(|e| {
            eprintln!("Error: {e}");
            1
        }),
        None => Ok((0..page_count).collect()),
    }
}

/// Serialize `value` as pretty JSON on stdout.
pub fn print_json(value: &serde_json::Value) -> Result<(), i32> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        eprintln!("Error: failed to serialize JSON: {e}");
        1
    })?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_pdf_file_not_found() {
        let result = open_pdf(Path::new("/nonexistent/file.pdf"), None);
        assert!(matches!(result, Err(1)));
    }

    #[test]
    fn resolve_pages_none_returns_all() {
        assert_eq!(resolve_pages(None, 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn resolve_pages_invalid_range() {
        assert_eq!(resolve_pages(Some("0"), 5).unwrap_err(), 1);
    }
}
