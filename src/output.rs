//! CLI output formatting.
//!
//! Output is **information-centric**: each file leads with its positional
//! index and name, with paths, attempts and the outcome as indented context.
//!
//! ```text
//! 001 beach.jpg
//!     Source: photos/beach.jpg
//!     Resized: 4032x3024 → 1920x1440
//!     q0.80: 12.40 MB
//!     q0.70: 9.80 MB
//!     Output: shrunk/photos/beach.jpg (9.80 MB, within budget)
//! 002 map.png
//!     Source: photos/trip/map.png
//!     Passthrough: 300.0 KB
//!
//! 2 files: 1 re-encoded, 1 passed through, 0 over budget, 0 failed
//! Total: 14.70 MB → 10.09 MB
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` for testability and a
//! `print_*` wrapper writes to stdout. Format functions are pure — no I/O,
//! no side effects.

use crate::batch::{BatchEvent, BatchReport};
use crate::imaging::CompressionReport;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 0-based position as a 1-based, 3-digit zero-padded index.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index + 1)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Human-readable byte count in binary units.
///
/// ```text
/// 999        → 999 B
/// 2048       → 2.0 KB
/// 10485760   → 10.00 MB
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

fn report_lines(report: &CompressionReport, output: &str) -> Vec<String> {
    let ctx = indent(1);
    if report.is_passthrough() {
        return vec![format!(
            "{ctx}Passthrough: {}",
            format_size(report.original_bytes as u64)
        )];
    }

    let mut lines = Vec::new();
    if let (true, Some(src), Some(out)) = (report.was_resized(), report.source, report.output) {
        lines.push(format!(
            "{ctx}Resized: {}x{} \u{2192} {}x{}",
            src.width, src.height, out.width, out.height
        ));
    }
    for attempt in &report.attempts {
        lines.push(format!(
            "{ctx}q{}: {}",
            attempt.quality,
            format_size(attempt.bytes as u64)
        ));
    }
    let verdict = if report.within_budget {
        "within budget"
    } else {
        "over budget at quality floor"
    };
    lines.push(format!(
        "{ctx}Output: {output} ({}, {verdict})",
        format_size(report.output_bytes as u64)
    ));
    lines
}

// ============================================================================
// Batch output
// ============================================================================

/// Format a single batch event as it arrives.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Compressed {
            index,
            source,
            output,
            report,
        } => {
            let mut lines = vec![
                format!("{} {}", format_index(*index), file_name(source)),
                format!("{}Source: {}", indent(1), source),
            ];
            lines.extend(report_lines(report, output));
            lines
        }
        BatchEvent::Failed {
            index,
            source,
            error,
        } => vec![
            format!("{} {}", format_index(*index), file_name(source)),
            format!("{}Source: {}", indent(1), source),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

/// Format the closing summary of a batch.
pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    let t = &report.totals;
    let mut lines = vec![format!(
        "{} files: {} re-encoded, {} passed through, {} over budget, {} failed",
        t.files, t.reencoded, t.passthrough, t.over_budget, t.failed
    )];
    if t.input_bytes > 0 {
        lines.push(format!(
            "Total: {} \u{2192} {}",
            format_size(t.input_bytes),
            format_size(t.output_bytes)
        ));
    }
    lines
}

pub fn print_batch_event(event: &BatchEvent) {
    for line in format_batch_event(event) {
        println!("{}", line);
    }
}

pub fn print_batch_summary(report: &BatchReport) {
    println!();
    for line in format_batch_summary(report) {
        println!("{}", line);
    }
}
