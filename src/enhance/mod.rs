//! Post-injection enhancer pipeline.
//!
//! After a fragment is mounted the loader runs these passes, always in this
//! order, over the mount point:
//!
//! | Pass | Module | Effect |
//! |------|--------|--------|
//! | 1 | [`text_repair`] | Fix mis-decoded UTF-8 punctuation in every text node |
//! | 2 | [`word_study`] | `word (G96)` → `<span class="ws" data-ws="g96">word</span>` |
//! | 3 | [`columns`] | Column-view toggle bar for 3-column verse tables |
//! | 4 | [`dwell`] | Wrap runs of `.dwell` blocks in one `div.dwell-group` |
//!
//! followed by [`bind`], which marks interactive `.ws` elements.
//!
//! Every pass is idempotent. Passes that restructure the tree leave a marker
//! attribute on what they touched so a second run is a no-op; the loader
//! relies on this because the mutation fallback can re-run binding at any
//! time.
//!
//! Passes read document context only from [`EnhancementContext`], never from
//! attributes on the shell.

pub mod bind;
pub mod columns;
pub mod dwell;
pub mod text_repair;
pub mod word_study;

use crate::dom::{Document, NodeId};
use crate::naming::{DocumentDescriptor, parse_filename, word_study_filename};
use crate::paths::directory_of;
use columns::ColumnMode;
use tracing::debug;

/// Per-fetch context threaded through every pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnhancementContext {
    /// Parsed name of the fetched document, when the name is canonical.
    pub descriptor: Option<DocumentDescriptor>,
    /// Directory of the fetched path, with trailing `/`.
    pub base_directory: String,
}

impl EnhancementContext {
    pub fn for_fetch(document: &str, path: &str) -> Self {
        Self {
            descriptor: parse_filename(document),
            base_directory: directory_of(path).to_string(),
        }
    }

    /// URL of the word-study document for a normalized reference.
    ///
    /// `None` without a book, or for book-level documents (chapter 0).
    pub fn word_study_doc(&self, reference: &str) -> Option<String> {
        let d = self.descriptor.as_ref()?;
        if d.book.is_empty() || d.chapter == 0 {
            return None;
        }
        Some(format!(
            "{}{}",
            self.base_directory,
            word_study_filename(&d.book, d.chapter, reference)
        ))
    }
}

/// What one pipeline run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub repaired_text_nodes: usize,
    pub word_studies: usize,
    pub column_controls: bool,
    pub dwell_groups: usize,
}

/// Run passes 1-4 over `mount`.
pub fn run_pipeline(
    doc: &mut Document,
    mount: NodeId,
    ctx: &EnhancementContext,
    column_mode: ColumnMode,
) -> PipelineReport {
    let report = PipelineReport {
        repaired_text_nodes: text_repair::run(doc, mount),
        word_studies: word_study::run(doc, mount, ctx),
        column_controls: columns::install(doc, mount, column_mode),
        dwell_groups: dwell::group(doc, mount),
    };
    debug!(?report, "enhancer pipeline finished");
    report
}

/// Remove state the previous fragment left around the mount point:
/// column toggle bars and hiding, open dropdowns, pass markers on the mount.
pub fn teardown(doc: &mut Document, mount: NodeId) {
    columns::remove_controls(doc, mount);
    for n in doc.descendants(mount) {
        if doc.is_element(n, "details") {
            doc.remove_attr(n, "open");
        }
        if doc.has_class(n, "is-open") {
            doc.remove_class(n, "is-open");
            doc.set_attr(n, "aria-expanded", "false");
        }
    }
    doc.remove_attr(mount, dwell::GROUPED_MARKER);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_from_fetch() {
        let ctx = EnhancementContext::for_fetch(
            "titus-1-chapter-explanation.html",
            "/books/new-testament/titus/001/titus-1-chapter-explanation.html",
        );
        assert_eq!(ctx.base_directory, "/books/new-testament/titus/001/");
        assert_eq!(
            ctx.word_study_doc("g96").as_deref(),
            Some("/books/new-testament/titus/001/titus-1-g96.html")
        );
    }

    #[test]
    fn no_word_study_doc_for_book_level_or_unknown() {
        let ctx = EnhancementContext::for_fetch(
            "titus-0-book-introduction.html",
            "/books/new-testament/titus/000-book/titus-0-book-introduction.html",
        );
        assert_eq!(ctx.word_study_doc("g96"), None);
        let ctx = EnhancementContext::for_fetch("about.html", "/about.html");
        assert_eq!(ctx.word_study_doc("g96"), None);
    }

    #[test]
    fn pipeline_runs_all_passes() {
        let mut doc = Document::parse(
            r#"<main><div id="doc-target"><p>The ΓÇ£elderΓÇ¥ not disqualified (G96).</p><div class="dwell">a</div><div class="dwell">b</div></div></main>"#,
        )
        .unwrap();
        let mount = doc.element_by_id(doc.root(), "doc-target").unwrap();
        let ctx = EnhancementContext::for_fetch(
            "titus-1-chapter-explanation.html",
            "/books/new-testament/titus/001/titus-1-chapter-explanation.html",
        );
        let report = run_pipeline(&mut doc, mount, &ctx, ColumnMode::Both);
        assert_eq!(report.repaired_text_nodes, 1);
        assert_eq!(report.word_studies, 1);
        assert!(!report.column_controls);
        assert_eq!(report.dwell_groups, 1);
        let html = doc.inner_html(mount);
        assert!(html.starts_with("<p>The \u{201c}elder\u{201d} not <span class=\"ws\""));
        assert!(html.contains("<div class=\"dwell-group\">"));
    }

    #[test]
    fn teardown_clears_transient_state() {
        let mut doc = Document::parse(
            r#"<main><div class="scripture-controls"></div><div id="doc-target" data-dwell-grouped="1"><details open=""><summary>x</summary></details><div class="menu is-open"></div></div></main>"#,
        )
        .unwrap();
        let mount = doc.element_by_id(doc.root(), "doc-target").unwrap();
        teardown(&mut doc, mount);
        let html = doc.inner_html(doc.root());
        assert!(!html.contains("scripture-controls"));
        assert!(!html.contains("open=\"\""));
        assert!(!html.contains("is-open"));
        assert!(!html.contains("data-dwell-grouped"));
    }
}
