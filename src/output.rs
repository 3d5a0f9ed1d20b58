//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Resolve
//!
//! ```text
//! obadiah 1 resources
//!     Document: obadiah-1-resources-idols.html
//!     Path: /books/old-testament/obadiah/001/obadiah-1-resources-idols.html
//!     URL: https://example.org/view.html?doc=...&tab=resources&book=obadiah&chapter=1
//! ```
//!
//! ## Render
//!
//! ```text
//! Loaded titus-1-chapter-explanation.html (generation 1)
//!     Path: /books/new-testament/titus/001/titus-1-chapter-explanation.html
//!     Repaired text: 2
//!     Word studies: 3 (3 bound)
//!     Column controls: no
//!     Dwell groups: 1
//! ```
//!
//! ## Check
//!
//! ```text
//! Misplaced /books/new-testament/obadiah/001/obadiah-1-resources-idols.html
//!     Expected: /books/old-testament/obadiah/001/obadiah-1-resources-idols.html
//! Unrecognized /books/new-testament/titus/001/notes.html
//!
//! Checked 12 files: 10 ok, 2 problems
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes it out. Format functions
//! are pure: no I/O, no side effects. Render summaries go to stderr so stdout
//! carries only the HTML.

use crate::audit::{AuditReport, AuditStatus};
use crate::loader::{LoadOutcome, RenderEvent, RenderStatus};
use crate::navigation::Resolution;
use url::Url;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

// ============================================================================
// resolve
// ============================================================================

pub fn format_resolve_output(resolution: &Resolution, url: &Url) -> Vec<String> {
    let state = &resolution.state;
    let mut lines = vec![format!("{} {} {}", state.book, state.chapter, state.tab)];
    match (&resolution.document, resolution.path()) {
        (Some(document), Some(path)) => {
            lines.push(format!("{}Document: {}", indent(1), document));
            lines.push(format!("{}Path: {}", indent(1), path));
        }
        _ => lines.push(format!("{}Document: none (hero)", indent(1))),
    }
    if let Some(doc) = &state.doc {
        lines.push(format!("{}Pinned doc: {}", indent(1), doc));
    }
    lines.push(format!("{}URL: {}", indent(1), url));
    lines
}

pub fn print_resolve_output(resolution: &Resolution, url: &Url) {
    for line in format_resolve_output(resolution, url) {
        println!("{}", line);
    }
}

// ============================================================================
// render
// ============================================================================

pub fn format_render_event(event: &RenderEvent) -> Vec<String> {
    let document = event.document.as_deref().unwrap_or("-");
    let mut lines = Vec::new();
    match &event.status {
        RenderStatus::Cleared => {
            lines.push(format!("Cleared mount (generation {})", event.generation));
            return lines;
        }
        RenderStatus::Loaded => {
            lines.push(format!("Loaded {} (generation {})", document, event.generation));
        }
        RenderStatus::Failed(_) => {
            lines.push(format!("Failed {} (generation {})", document, event.generation));
        }
    }
    if let Some(path) = &event.path {
        lines.push(format!("{}Path: {}", indent(1), path));
    }
    match &event.status {
        RenderStatus::Failed(message) => {
            lines.push(format!("{}Error: {}", indent(1), message));
        }
        _ => {
            let r = &event.report;
            lines.push(format!("{}Repaired text: {}", indent(1), r.repaired_text_nodes));
            lines.push(format!(
                "{}Word studies: {} ({} bound)",
                indent(1),
                r.word_studies,
                event.bound
            ));
            lines.push(format!("{}Column controls: {}", indent(1), yes_no(r.column_controls)));
            lines.push(format!("{}Dwell groups: {}", indent(1), r.dwell_groups));
        }
    }
    lines
}

pub fn format_load_outcome(outcome: &LoadOutcome) -> Vec<String> {
    match outcome {
        LoadOutcome::Rendered(event) => format_render_event(event),
        LoadOutcome::Superseded { generation, latest } => vec![format!(
            "Discarded generation {} (latest is {})",
            generation, latest
        )],
    }
}

pub fn print_load_outcome(outcome: &LoadOutcome) {
    for line in format_load_outcome(outcome) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// check
// ============================================================================

pub fn format_check_output(report: &AuditReport) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in report.problems() {
        match &entry.status {
            AuditStatus::Misplaced { expected } => {
                lines.push(format!("Misplaced {}", entry.path));
                lines.push(format!("{}Expected: {}", indent(1), expected));
            }
            AuditStatus::Unrecognized => lines.push(format!("Unrecognized {}", entry.path)),
            AuditStatus::Ok => {}
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    let problems = report.entries.len() - report.ok_count();
    lines.push(format!(
        "Checked {}: {} ok, {}",
        plural(report.entries.len(), "file", "files"),
        report.ok_count(),
        plural(problems, "problem", "problems")
    ));
    lines
}

pub fn print_check_output(report: &AuditReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}
