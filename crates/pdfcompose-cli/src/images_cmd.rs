use std::path::Path;

use pdfcompose::{DiscoveredImage, ImageKind, Pdf, UsageStats, WalkOptions, WalkReport};

use crate::cli::OutputFormat;
use crate::shared::{open_pdf, print_json, resolve_pages};

pub fn run(
    file: &Path,
    pages: Option<&str>,
    format: &OutputFormat,
    max_depth: usize,
    stats: bool,
    password: Option<&str>,
) -> Result<(), i32> {
    let pdf = open_pdf(file, password)?.with_walk_options(WalkOptions {
        max_recursion_depth: max_depth,
        ..WalkOptions::default()
    });
    let page_indices = resolve_pages(pages, pdf.page_count())?;

    let mut reports = Vec::with_capacity(page_indices.len());
    let mut usage = UsageStats::default();
    for &idx in &page_indices {
        let report = pdf.page_images(idx).map_err(|e| {
            eprintln!("Error reading page {}: {e}", idx + 1);
            1
        })?;
        for image in &report.images {
            usage.record(&image.info);
        }
        reports.push((idx, report));
    }

    match format {
        OutputFormat::Text => {
            write_text(&reports);
            if stats {
                write_stats_text(&usage);
            }
            Ok(())
        }
        OutputFormat::Json => write_json(&pdf, &reports, stats.then_some(&usage)),
    }
}

fn describe(image: &DiscoveredImage) -> String {
    let name = match (&image.kind, &image.name) {
        (ImageKind::XObject, Some(name)) => format!("/{name}"),
        _ => "(inline)".to_string(),
    };
    let info = &image.info;
    format!(
        "  {name}\t{}x{}\tbpc={}\tcs={}\tcomps={}\tfilter={}\tdepth={}",
        info.width,
        info.height,
        info.bits_per_component
            .map_or("-".to_string(), |b| b.to_string()),
        info.colorspace.as_deref().unwrap_or("-"),
        info.color_components
            .map_or("-".to_string(), |c| c.to_string()),
        info.filter.as_deref().unwrap_or("-"),
        image.depth,
    )
}

fn write_text(reports: &[(usize, WalkReport)]) {
    for (idx, report) in reports {
        println!("--- Page {} ---", idx + 1);
        for image in &report.images {
            println!("{}", describe(image));
        }
        if report.skipped > 0 {
            println!("  ({} repeated XObject(s) skipped)", report.skipped);
        }
        if !report.warnings.is_empty() {
            println!("  ({} warning(s))", report.warnings.len());
        }
    }
}

fn write_stats_text(usage: &UsageStats) {
    println!("--- Usage ---");
    println!("images: {}", usage.images);
    for (filter, count) in &usage.filters {
        println!("filter {filter}: {count}");
    }
    for (colorspace, count) in &usage.colorspaces {
        println!("colorspace {colorspace}: {count}");
    }
}

fn write_json(
    pdf: &Pdf,
    reports: &[(usize, WalkReport)],
    usage: Option<&UsageStats>,
) -> Result<(), i32> {
    let pages: Vec<serde_json::Value> = reports
        .iter()
        .map(|(idx, report)| {
            serde_json::json!({
                "page": idx + 1,
                "images": report.images,
                "skipped": report.skipped,
                "warnings": report.warnings,
            })
        })
        .collect();

    let mut output = serde_json::json!({
        "page_count": pdf.page_count(),
        "pages": pages,
    });
    if let Some(usage) = usage {
        output["stats"] = serde_json::json!(usage);
    }
    print_json(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfcompose::ImageInfo;

    fn image(kind: ImageKind, name: Option<&str>) -> DiscoveredImage {
        DiscoveredImage {
            kind,
            name: name.map(str::to_string),
            info: ImageInfo {
                width: 4,
                height: 2,
                bits_per_component: Some(8),
                colorspace: Some("DeviceRGB".to_string()),
                color_components: Some(3),
                filter: None,
            },
            depth: 1,
            operator_index: 0,
        }
    }

    #[test]
    fn describe_xobject() {
        let line = describe(&image(ImageKind::XObject, Some("Im1")));
        assert_eq!(line, "  /Im1\t4x2\tbpc=8\tcs=DeviceRGB\tcomps=3\tfilter=-\tdepth=1");
    }

    #[test]
    fn describe_inline() {
        let line = describe(&image(ImageKind::Inline, None));
        assert!(line.starts_with("  (inline)\t4x2"));
    }
}
