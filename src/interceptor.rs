//! Click interception.
//!
//! Decides what a click inside the shell means. Three outcomes:
//!
//! - a column button (`.sc-btn[data-sc-mode]`) switches the verse-table view;
//! - an element with `data-doc`, or a same-origin link whose URL carries a
//!   `doc` parameter, becomes an in-place navigation;
//! - everything else keeps the browser's default behaviour.
//!
//! A navigation query always carries `doc`, `tab`, `book` and `chapter`, so
//! the resolver sees a consistent set of signals:
//!
//! | Field | Source, first match wins |
//! |-------|--------------------------|
//! | `tab` | `resources` for resource topics, target's `tab`, tab implied by `doc`, current tab |
//! | `book` | target's `book`, book in `doc`, current book |
//! | `chapter` | target's `chapter`, chapter in `doc`, current chapter |
//!
//! For links the "target" is the link URL's own query; for `data-doc`
//! elements it is their `data-tab`, `data-book` and `data-chapter`
//! attributes, layered over the current URL's query.

use crate::dom::{Document, NodeId};
use crate::enhance::columns::{BUTTON_CLASS, ColumnMode, MODE_ATTR};
use crate::naming::{
    Tab, is_valid_book_slug, normalize_book_slug, parse_filename, validate_filename,
};
use crate::navigation::{NavigationState, QueryParams};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Navigate in place to `url`, whose query is `query`.
    Navigate { url: Url, query: QueryParams },
    ColumnMode(ColumnMode),
    /// Not ours; let the default action happen.
    Default,
}

/// Explicit navigation fields carried by the clicked target.
#[derive(Debug, Default)]
struct TargetHints {
    book: Option<String>,
    chapter: Option<u32>,
    tab: Option<Tab>,
}

impl TargetHints {
    fn from_query(query: &QueryParams) -> Self {
        Self::from_raw(
            query.get_trimmed("book"),
            query.get_trimmed("chapter"),
            query.get_trimmed("tab"),
        )
    }

    fn from_element(doc: &Document, el: NodeId) -> Self {
        let get = |name| doc.attr(el, name).map(str::trim).filter(|v| !v.is_empty());
        Self::from_raw(get("data-book"), get("data-chapter"), get("data-tab"))
    }

    fn from_raw(book: Option<&str>, chapter: Option<&str>, tab: Option<&str>) -> Self {
        Self {
            book: book.map(normalize_book_slug).filter(|b| is_valid_book_slug(b)),
            chapter: chapter.and_then(|c| c.parse().ok()),
            tab: tab.and_then(Tab::from_key),
        }
    }
}

fn is_column_button(doc: &Document, node: NodeId) -> bool {
    doc.has_class(node, BUTTON_CLASS) && doc.attr(node, MODE_ATTR).is_some()
}

fn is_nav_target(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "data-doc").is_some()
        || (doc.is_element(node, "a") && doc.attr(node, "href").is_some())
}

/// Classify a click on `node`.
pub fn intercept(
    doc: &Document,
    node: NodeId,
    current_url: &Url,
    current: &NavigationState,
) -> Interception {
    if let Some(button) = doc.closest(node, is_column_button) {
        return doc
            .attr(button, MODE_ATTR)
            .and_then(ColumnMode::from_key)
            .map_or(Interception::Default, Interception::ColumnMode);
    }

    let Some(target) = doc.closest(node, is_nav_target) else {
        return Interception::Default;
    };

    let (raw_doc, hints, base_url, mut query) = match doc.attr(target, "data-doc") {
        Some(data_doc) => (
            data_doc.trim().to_string(),
            TargetHints::from_element(doc, target),
            current_url.clone(),
            QueryParams::from_url(current_url),
        ),
        None => {
            let Some(href) = doc.attr(target, "href").map(str::trim) else {
                return Interception::Default;
            };
            let Some(link) = same_origin_link(href, current_url) else {
                return Interception::Default;
            };
            let query = QueryParams::from_url(&link);
            let Some(raw_doc) = query.get_trimmed("doc").map(str::to_string) else {
                return Interception::Default;
            };
            (raw_doc, TargetHints::from_query(&query), link, query)
        }
    };

    let Some(valid) = validate_filename(&raw_doc) else {
        debug!(doc = %raw_doc, "ignoring click on invalid doc");
        return Interception::Default;
    };
    let descriptor = parse_filename(valid);

    let pinned = descriptor
        .as_ref()
        .is_some_and(|d| d.content_type.is_resource_topic());
    let tab = if pinned {
        Tab::Resources
    } else {
        hints
            .tab
            .or_else(|| descriptor.as_ref().and_then(|d| d.content_type.tab()))
            .unwrap_or(current.tab)
    };
    let book = hints
        .book
        .or_else(|| descriptor.as_ref().map(|d| d.book.clone()))
        .unwrap_or_else(|| current.book.clone());
    let chapter = hints
        .chapter
        .or_else(|| descriptor.as_ref().map(|d| d.chapter))
        .unwrap_or(current.chapter);

    query.set("doc", valid);
    query.set("tab", tab.key());
    query.set("book", &book);
    query.set("chapter", &chapter.to_string());

    let url = query.apply_to(&base_url);
    debug!(%url, "intercepted navigation");
    Interception::Navigate { url, query }
}

/// Resolve `href` against the current page; `None` for fragment-only links,
/// non-HTTP schemes and other origins.
fn same_origin_link(href: &str, current_url: &Url) -> Option<Url> {
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let link = current_url.join(href).ok()?;
    if !matches!(link.scheme(), "http" | "https") {
        return None;
    }
    (link.origin() == current_url.origin()).then_some(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_url() -> Url {
        Url::parse("https://example.org/view.html?book=titus&chapter=2&tab=chapter_insights&lang=en")
            .unwrap()
    }

    fn current_state() -> NavigationState {
        NavigationState {
            book: "titus".into(),
            chapter: 2,
            tab: Tab::ChapterInsights,
            doc: None,
        }
    }

    /// Parse `html` and return the innermost node with id `hit`.
    fn click(html: &str) -> Interception {
        let doc = Document::parse(html).unwrap();
        let node = doc.element_by_id(doc.root(), "hit").unwrap();
        intercept(&doc, node, &current_url(), &current_state())
    }

    fn navigate_query(i: Interception) -> QueryParams {
        match i {
            Interception::Navigate { query, .. } => query,
            other => panic!("expected navigation, got {other:?}"),
        }
    }

    #[test]
    fn data_doc_resource_topic_pins_resources() {
        let q = navigate_query(click(
            r#"<div data-doc="obadiah-1-resources-idols.html"><span id="hit">Idols</span></div>"#,
        ));
        assert_eq!(q.get("doc"), Some("obadiah-1-resources-idols.html"));
        assert_eq!(q.get("tab"), Some("resources"));
        assert_eq!(q.get("book"), Some("obadiah"));
        assert_eq!(q.get("chapter"), Some("1"));
        // unrelated params of the current page survive
        assert_eq!(q.get("lang"), Some("en"));
    }

    #[test]
    fn data_doc_attributes_override_inferred_values() {
        let q = navigate_query(click(
            r#"<button id="hit" data-doc="titus-3-chapter-orientation.html" data-tab="key_words" data-chapter="1">x</button>"#,
        ));
        assert_eq!(q.get("tab"), Some("key_words"));
        assert_eq!(q.get("chapter"), Some("1"));
        assert_eq!(q.get("book"), Some("titus"));
    }

    #[test]
    fn anchor_with_doc_navigates() {
        let i = click(
            r#"<p><a href="?doc=jude-1-deeper-dive.html&amp;x=1"><em id="hit">more</em></a></p>"#,
        );
        let Interception::Navigate { url, query } = i else {
            panic!("expected navigation");
        };
        assert_eq!(query.get("x"), Some("1"));
        assert_eq!(query.get("tab"), Some("deeper_dive"));
        assert_eq!(query.get("book"), Some("jude"));
        assert_eq!(url.path(), "/view.html");
        // the link's query replaces the current one
        assert_eq!(query.get("lang"), None);
    }

    #[test]
    fn anchor_query_fields_win() {
        let q = navigate_query(click(
            r#"<a id="hit" href="/view.html?doc=jude-1-resources.html&amp;book=jude&amp;chapter=1&amp;tab=resources">r</a>"#,
        ));
        assert_eq!(q.get("tab"), Some("resources"));
        assert_eq!(q.get("chapter"), Some("1"));
    }

    #[test]
    fn unparsed_doc_falls_back_to_current_state() {
        let q = navigate_query(click(r#"<span id="hit" data-doc="notes-0-misc.html">n</span>"#));
        assert_eq!(q.get("book"), Some("titus"));
        assert_eq!(q.get("chapter"), Some("2"));
        assert_eq!(q.get("tab"), Some("chapter_insights"));
    }

    #[test]
    fn doc_location_beats_current_state() {
        // the page is on titus 2; the target names only its document
        let q = navigate_query(click(
            r#"<span id="hit" data-doc="jude-1-key-words.html">Jude</span>"#,
        ));
        assert_eq!(q.get("book"), Some("jude"));
        assert_eq!(q.get("chapter"), Some("1"));
        assert_eq!(q.get("tab"), Some("key_words"));

        let q = navigate_query(click(
            r#"<span id="hit" data-doc="jude-1-key-words.html" data-book="titus">Jude</span>"#,
        ));
        assert_eq!(q.get("book"), Some("titus"));
        assert_eq!(q.get("chapter"), Some("1"));
    }

    #[test]
    fn column_button_switches_mode() {
        assert_eq!(
            click(
                r#"<div class="scripture-controls"><button class="sc-btn" data-sc-mode="left-only"><b id="hit">NKJV</b> Only</button></div>"#
            ),
            Interception::ColumnMode(ColumnMode::LeftOnly)
        );
    }

    #[test]
    fn unknown_column_mode_is_default() {
        assert_eq!(
            click(r#"<button id="hit" class="sc-btn" data-sc-mode="sideways">x</button>"#),
            Interception::Default
        );
    }

    #[test]
    fn default_cases() {
        for html in [
            r##"<a id="hit" href="#top">top</a>"##,
            r#"<a id="hit" href="mailto:someone@example.org">mail</a>"#,
            r#"<a id="hit" href="tel:+15551234">call</a>"#,
            r#"<a id="hit" href="https://other.example/view.html?doc=titus-1-resources.html">x</a>"#,
            r#"<a id="hit" href="/about.html">about</a>"#,
            r#"<a id="hit" href="?doc=../secret.html">bad</a>"#,
            r#"<span id="hit" data-doc="Titus-1-resources.html">bad</span>"#,
            r#"<p id="hit">plain text</p>"#,
        ] {
            assert_eq!(click(html), Interception::Default, "{html}");
        }
    }
}
