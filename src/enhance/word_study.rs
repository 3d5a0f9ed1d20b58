//! Inline Strong's markers and word-study documents.
//!
//! Chapter notes mark studied words inline: `disqualified (G96)` or
//! `pride (H1347)`. [`run`] turns each marker into
//!
//! ```html
//! <span class="ws" data-ws="g96" data-ws-doc="/books/.../titus-1-g96.html">disqualified</span>
//! ```
//!
//! dropping the parenthetical from the visible text. Text already inside a
//! `.ws` element is skipped, so running the pass twice is harmless.
//!
//! The word-study documents themselves are full HTML pages with an
//! `h2#summary` heading; [`summary_from_html`] pulls the hover summary and
//! [`WordStudyView`] carries what the expanded view shows.

use super::EnhancementContext;
use crate::dom::{Document, NodeId};
use crate::naming::normalize_strongs_ref;
use once_cell::sync::Lazy;
use regex::Regex;

/// Class marking an interactive word-study element.
pub const WS_CLASS: &str = "ws";

/// Tooltip text when a study has no summary or could not be fetched.
pub const FALLBACK_SUMMARY: &str = "Click for word study";

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([\w’'-]+)\b\s*\(([GHgh]\d{1,5})\)").unwrap());

/// Whether `node` sits inside an element we should not rewrite.
fn in_protected_element(doc: &Document, node: NodeId) -> bool {
    doc.ancestors(node).any(|a| {
        doc.has_class(a, WS_CLASS)
            || matches!(doc.tag_name(a), Some("script" | "style" | "textarea" | "a"))
    })
}

/// Convert every marker below `root`. Returns the number of spans created.
pub fn run(doc: &mut Document, root: NodeId, ctx: &EnhancementContext) -> usize {
    let candidates: Vec<NodeId> = doc
        .descendants(root)
        .into_iter()
        .filter(|n| doc.text(*n).is_some_and(|t| MARKER_RE.is_match(t)))
        .filter(|n| !in_protected_element(doc, *n))
        .collect();

    let mut created = 0;
    for node in candidates {
        let Some(text) = doc.text(node).map(str::to_string) else {
            continue;
        };
        let mut replacements = Vec::new();
        let mut last = 0;
        for caps in MARKER_RE.captures_iter(&text) {
            let (Some(whole), Some(word), Some(marker)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let Some(reference) = normalize_strongs_ref(marker.as_str()) else {
                continue;
            };
            if whole.start() > last {
                replacements.push(doc.create_text(&text[last..whole.start()]));
            }
            replacements.push(word_study_span(doc, word.as_str(), &reference, ctx));
            last = whole.end();
            created += 1;
        }
        if replacements.is_empty() {
            continue;
        }
        if last < text.len() {
            replacements.push(doc.create_text(&text[last..]));
        }
        doc.replace_with(node, &replacements);
    }
    created
}

fn word_study_span(
    doc: &mut Document,
    word: &str,
    reference: &str,
    ctx: &EnhancementContext,
) -> NodeId {
    let span = doc.create_element("span");
    doc.set_attr(span, "class", WS_CLASS);
    doc.set_attr(span, "data-ws", reference);
    if let Some(href) = ctx.word_study_doc(reference) {
        doc.set_attr(span, "data-ws-doc", &href);
    }
    let t = doc.create_text(word);
    doc.append_child(span, t);
    span
}

/// The hover summary of a word-study page: the first non-empty paragraph
/// after `<h2 id="summary">`, either a direct sibling `<p>` or the first `<p>`
/// inside a wrapper. Scanning stops at the first sibling with other text.
pub fn summary_from_html(html: &str) -> Option<String> {
    let doc = Document::parse(html).ok()?;
    let heading = doc
        .elements_by_tag(doc.root(), "h2")
        .into_iter()
        .find(|h| doc.attr(*h, "id") == Some("summary"))?;
    let parent = doc.parent(heading)?;
    let siblings = doc.element_children(parent);
    let start = siblings.iter().position(|s| *s == heading)? + 1;
    for &sibling in &siblings[start..] {
        let paragraph = if doc.is_element(sibling, "p") {
            Some(sibling)
        } else {
            doc.elements_by_tag(sibling, "p").into_iter().next()
        };
        if let Some(p) = paragraph {
            let text = collapse_whitespace(&doc.text_content(p));
            if !text.is_empty() {
                return Some(text);
            }
        }
        if !doc.text_content(sibling).trim().is_empty() {
            break;
        }
    }
    None
}

/// Markup of the `<body>` of a full page, or the whole input when it has none.
pub fn body_html(html: &str) -> String {
    match Document::parse(html) {
        Ok(doc) => match doc.elements_by_tag(doc.root(), "body").first() {
            Some(&body) => doc.inner_html(body),
            None => doc.inner_html(doc.root()),
        },
        Err(_) => html.to_string(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hover summary and expanded body for one word study.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordStudyView {
    pub reference: Option<String>,
    pub url: Option<String>,
    pub summary: String,
    pub body_html: String,
}

impl WordStudyView {
    pub fn from_page(reference: Option<String>, url: String, html: &str) -> Self {
        Self {
            reference,
            summary: summary_from_html(html).unwrap_or_else(|| FALLBACK_SUMMARY.to_string()),
            body_html: body_html(html),
            url: Some(url),
        }
    }

    pub fn unavailable(reference: Option<String>, url: Option<String>) -> Self {
        let body_html = maud::html! {
            p.muted { "Could not load word study." }
            @if let Some(u) = &url {
                p.muted { (u) }
            }
        }
        .into_string();
        Self {
            reference,
            url,
            summary: FALLBACK_SUMMARY.to_string(),
            body_html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{ContentType, DocumentDescriptor};

    fn chapter_ctx() -> EnhancementContext {
        EnhancementContext {
            descriptor: Some(DocumentDescriptor {
                book: "titus".into(),
                chapter: 1,
                content_type: ContentType::ChapterExplanation,
            }),
            base_directory: "/books/new-testament/titus/001/".into(),
        }
    }

    fn mount(html: &str) -> (Document, NodeId) {
        let doc = Document::parse(&format!("<div id=\"m\">{html}</div>")).unwrap();
        let m = doc.element_by_id(doc.root(), "m").unwrap();
        (doc, m)
    }

    #[test]
    fn marker_becomes_span() {
        let (mut doc, m) = mount("<p>disqualified (G96)</p>");
        assert_eq!(run(&mut doc, m, &chapter_ctx()), 1);
        assert_eq!(
            doc.inner_html(m),
            r#"<p><span class="ws" data-ws="g96" data-ws-doc="/books/new-testament/titus/001/titus-1-g96.html">disqualified</span></p>"#
        );
    }

    #[test]
    fn several_markers_keep_surrounding_text() {
        let (mut doc, m) = mount("<p>not a novice (G3504), nor proud (H01347)!</p>");
        assert_eq!(run(&mut doc, m, &chapter_ctx()), 2);
        let spans = doc.elements_by_class(m, WS_CLASS);
        assert_eq!(doc.attr(spans[1], "data-ws"), Some("h1347"));
        assert_eq!(doc.text_content(m), "not a novice, nor proud!");
    }

    #[test]
    fn no_doc_link_for_book_level_context() {
        let (mut doc, m) = mount("<p>grace (G5485)</p>");
        let ctx = EnhancementContext {
            descriptor: Some(DocumentDescriptor {
                book: "titus".into(),
                chapter: 0,
                content_type: ContentType::BookIntroduction,
            }),
            base_directory: "/x/".into(),
        };
        run(&mut doc, m, &ctx);
        let span = doc.elements_by_class(m, WS_CLASS)[0];
        assert_eq!(doc.attr(span, "data-ws"), Some("g5485"));
        assert_eq!(doc.attr(span, "data-ws-doc"), None);
    }

    #[test]
    fn existing_spans_are_not_rewrapped() {
        let (mut doc, m) = mount(r#"<p><span class="ws" data-ws="g96">word (G96)</span></p>"#);
        assert_eq!(run(&mut doc, m, &chapter_ctx()), 0);
    }

    #[test]
    fn second_run_is_noop() {
        let (mut doc, m) = mount("<p>pride (H1347) here</p>");
        run(&mut doc, m, &chapter_ctx());
        let first = doc.inner_html(m);
        assert_eq!(run(&mut doc, m, &chapter_ctx()), 0);
        assert_eq!(doc.inner_html(m), first);
    }

    #[test]
    fn six_digits_is_not_a_marker() {
        let (mut doc, m) = mount("<p>word (G123456)</p>");
        assert_eq!(run(&mut doc, m, &chapter_ctx()), 0);
    }

    #[test]
    fn summary_from_direct_paragraph() {
        let html = r#"<html><body><h1>G96</h1><h2 id="summary">Summary</h2><p>  Not standing
            the test.</p><h2>Usage</h2></body></html>"#;
        assert_eq!(summary_from_html(html).as_deref(), Some("Not standing the test."));
    }

    #[test]
    fn summary_from_wrapper_paragraph() {
        let html = r#"<h2 id="summary">Summary</h2><div class="card"><p>Rejected.</p></div>"#;
        assert_eq!(summary_from_html(html).as_deref(), Some("Rejected."));
    }

    #[test]
    fn summary_stops_at_other_content() {
        let html = r#"<h2 id="summary">Summary</h2><ul><li>list</li></ul><p>late</p>"#;
        assert_eq!(summary_from_html(html), None);
        assert_eq!(summary_from_html("<p>no heading</p>"), None);
    }

    #[test]
    fn view_falls_back_without_summary() {
        let view = WordStudyView::from_page(
            Some("g96".into()),
            "/x/titus-1-g96.html".into(),
            "<body><p>x</p></body>",
        );
        assert_eq!(view.summary, FALLBACK_SUMMARY);
        assert_eq!(view.body_html, "<p>x</p>");
        let missing = WordStudyView::unavailable(None, Some("/x/y.html".into()));
        assert!(missing.body_html.contains("Could not load word study."));
        assert!(missing.body_html.contains("/x/y.html"));
    }
}
