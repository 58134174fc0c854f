//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Single-image commands
//!
//! ```text
//! photo.jpg (jpeg 1000x625)
//!     resize crop → 200x200
//!     Saved: thumb.jpg
//! ```
//!
//! ## Batch
//!
//! ```text
//! Processed
//! 001 wide.jpg → 200x200
//!     Output: out/wide.jpg
//! 002 deep/tall.png → 200x200
//!     Output: out/deep/tall.png
//!
//! Failed
//! 001 small.jpg
//!     Error: The cropping dimensions must be smaller than the original ones (...)
//!
//! Processed 2 images, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::batch::BatchReport;
use crate::imaging::{Dimensions, ImageFormat};
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn size(dims: Dimensions) -> String {
    format!("{}x{}", dims.width, dims.height)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Path relative to `root` when it lives under it.
fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

// ============================================================================
// Single-image commands
// ============================================================================

/// What a single-image command did, for display.
#[derive(Debug, Clone)]
pub struct TransformSummary {
    pub source: PathBuf,
    pub format: ImageFormat,
    pub before: Dimensions,
    pub after: Dimensions,
    /// Short description of the operation, e.g. `resize crop`.
    pub operation: String,
    pub output: PathBuf,
}

pub fn format_transform_output(summary: &TransformSummary) -> Vec<String> {
    vec![
        format!(
            "{} ({} {})",
            summary.source.display(),
            summary.format,
            size(summary.before)
        ),
        format!("{}{} → {}", indent(1), summary.operation, size(summary.after)),
        format!("{}Saved: {}", indent(1), summary.output.display()),
    ]
}

pub fn print_transform_output(summary: &TransformSummary) {
    for line in format_transform_output(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format a batch report. Paths are shown relative to `source_root`.
pub fn format_batch_output(report: &BatchReport, source_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.processed.is_empty() {
        lines.push("Processed".to_string());
        for (i, image) in report.processed.iter().enumerate() {
            lines.push(format!(
                "{} {} → {}x{}",
                format_index(i + 1),
                relative(&image.source, source_root).display(),
                image.width,
                image.height
            ));
            lines.push(format!("{}Output: {}", indent(1), image.output.display()));
        }
    }

    if !report.failed.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Failed".to_string());
        for (i, image) in report.failed.iter().enumerate() {
            lines.push(format!(
                "{} {}",
                format_index(i + 1),
                relative(&image.source, source_root).display()
            ));
            lines.push(format!("{}Error: {}", indent(1), image.error));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let mut summary = format!("Processed {}", plural(report.processed.len(), "image"));
    if !report.failed.is_empty() {
        summary.push_str(&format!(", {} failed", report.failed.len()));
    }
    lines.push(summary);
    lines
}

pub fn print_batch_output(report: &BatchReport, source_root: &Path) {
    for line in format_batch_output(report, source_root) {
        println!("{}", line);
    }
}
