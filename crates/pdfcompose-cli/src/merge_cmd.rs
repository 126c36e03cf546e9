use std::path::{Path, PathBuf};

use pdfcompose::{ComposeOptions, compose_with_options};

use crate::cli::OutputFormat;
use crate::shared::print_json;

pub fn run(
    files: &[PathBuf],
    output: &Path,
    advanced: bool,
    no_forms: bool,
    format: &OutputFormat,
) -> Result<(), i32> {
    if let Some(missing) = files.iter().find(|f| !f.exists()) {
        eprintln!("Error: file not found: {}", missing.display());
        return Err(1);
    }

    let mut options = if advanced {
        ComposeOptions::advanced()
    } else {
        ComposeOptions::default()
    };
    options.merge_forms = !no_forms;

    let result = compose_with_options(files, output, &options).map_err(|e| {
        eprintln!("Error: merge failed: {e}");
        1
    })?;

    match format {
        OutputFormat::Text => {
            // Each warning has already been logged to stderr.
            println!(
                "Merged {} file(s) into {} ({} warning(s))",
                files.len(),
                output.display(),
                result.warnings.len()
            );
            Ok(())
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "inputs": files,
            "output": output,
            "warnings": result.warnings,
        })),
    }
}
