//! The single-page viewer.
//!
//! A [`Viewer`] owns everything a browser tab would: the shell document with
//! its mount point, the session history, the fragment [`Loader`], the
//! preference store and a cache of fetched word studies. It is driven by the
//! same events a page receives:
//!
//! ```text
//! open(url) / back() / forward() / pop_state()
//!        │
//!        ▼
//!   resolve query ─► replace history entry with canonical URL
//!        │
//!        ├─ hero state ─► clear mount, no fetch
//!        └─ document   ─► begin ─► fetch ─► complete ─► render event
//! ```
//!
//! Clicks go through [`intercept`] first; only in-place navigations and
//! column toggles are handled here, everything else is left to the default
//! action.

use crate::config::ViewerConfig;
use crate::dom::{Document, NodeId};
use crate::enhance::columns::{self, ColumnMode};
use crate::enhance::word_study::{WS_CLASS, WordStudyView};
use crate::interceptor::{Interception, intercept};
use crate::loader::{
    CacheMode, FetchError, FetchRequest, FetchResponse, Fetcher, LoadOutcome, Loader, PendingLoad,
    RenderEvent,
};
use crate::naming::{is_valid_book_slug, normalize_strongs_ref};
use crate::navigation::{NavigationState, QueryParams, Resolution, resolve_with_default};
use crate::prefs::{PreferenceStore, Preferences, ScripturePreference};
use crate::verses;
use maud::{DOCTYPE, PreEscaped, html};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::Url;

// ============================================================================
// History
// ============================================================================

/// Session history: a list of URLs and a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<Url>,
    index: usize,
}

impl History {
    pub fn new(start: Url) -> Self {
        Self {
            entries: vec![start],
            index: 0,
        }
    }

    pub fn current(&self) -> &Url {
        &self.entries[self.index]
    }

    /// Add an entry after the current one, dropping any forward entries.
    pub fn push(&mut self, url: Url) {
        self.entries.truncate(self.index + 1);
        self.entries.push(url);
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, url: Url) {
        self.entries[self.index] = url;
    }

    pub fn back(&mut self) -> Option<&Url> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&Url> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Viewer
// ============================================================================

/// First half of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Hero state; already rendered, nothing to fetch.
    Hero(RenderEvent),
    Pending(PendingLoad),
}

pub struct Viewer {
    config: ViewerConfig,
    doc: Document,
    mount: NodeId,
    history: History,
    loader: Loader,
    fetcher: Box<dyn Fetcher>,
    prefs: Preferences,
    state: Option<NavigationState>,
    word_studies: HashMap<String, WordStudyView>,
}

impl Viewer {
    /// Build a viewer whose history starts at `start_url`. Nothing is loaded
    /// until [`navigate`](Self::navigate) is called.
    pub fn new(
        config: &ViewerConfig,
        start_url: Url,
        fetcher: Box<dyn Fetcher>,
        store: Box<dyn PreferenceStore>,
    ) -> Self {
        let mut doc = Document::new();
        let main = doc.create_element("main");
        let article = doc.create_element("article");
        let mount = doc.create_element("div");
        doc.set_attr(mount, "id", &config.shell.mount_id);
        let root = doc.root();
        doc.append_child(root, main);
        doc.append_child(main, article);
        doc.append_child(article, mount);

        Self {
            config: config.clone(),
            doc,
            mount,
            history: History::new(start_url),
            loader: Loader::new(config.loader_settings()),
            fetcher,
            prefs: Preferences::new(store, config.default_preference()),
            state: None,
            word_studies: HashMap::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access for scripts that change the page outside a render;
    /// follow such changes with [`on_mutation`](Self::on_mutation).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn mount(&self) -> NodeId {
        self.mount
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn current_url(&self) -> &Url {
        self.history.current()
    }

    /// State of the last resolved navigation.
    pub fn state(&self) -> Option<&NavigationState> {
        self.state.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.loader.generation()
    }

    /// Mounted content as HTML.
    pub fn mount_html(&self) -> String {
        self.doc.inner_html(self.mount)
    }

    pub fn add_render_listener(&mut self, listener: impl FnMut(&RenderEvent) + 'static) {
        self.loader.add_render_listener(listener);
    }

    /// Resolve the current URL without touching history or the mount.
    pub fn resolution(&self) -> Resolution {
        resolve_with_default(
            &QueryParams::from_url(self.history.current()),
            &self.config.default_book,
        )
    }

    /// Push `url` and navigate to it.
    pub fn open(&mut self, url: Url) -> LoadOutcome {
        info!(%url, "open");
        self.history.push(url);
        self.navigate()
    }

    /// Re-run navigation for the current history entry, as on `popstate`.
    pub fn pop_state(&mut self) -> LoadOutcome {
        self.navigate()
    }

    pub fn back(&mut self) -> Option<LoadOutcome> {
        self.history.back()?;
        Some(self.navigate())
    }

    pub fn forward(&mut self) -> Option<LoadOutcome> {
        self.history.forward()?;
        Some(self.navigate())
    }

    /// Resolve, canonicalize the address, then clear or load synchronously.
    pub fn navigate(&mut self) -> LoadOutcome {
        match self.begin_navigation() {
            Navigation::Hero(event) => LoadOutcome::Rendered(event),
            Navigation::Pending(pending) => self.finish(pending),
        }
    }

    /// Resolve the current entry and start its load. The hero state renders
    /// immediately; otherwise the returned load must be finished with
    /// [`finish`](Self::finish) or [`complete`](Self::complete).
    pub fn begin_navigation(&mut self) -> Navigation {
        let resolution = self.resolution();
        let canonical = resolution.canonical_query.apply_to(self.history.current());
        self.history.replace(canonical);
        self.state = Some(resolution.state.clone());

        match (resolution.document.as_deref(), resolution.path()) {
            (Some(document), Some(path)) => {
                Navigation::Pending(self.loader.begin(document, &path))
            }
            _ => Navigation::Hero(self.loader.clear(&mut self.doc, self.mount)),
        }
    }

    /// Fetch a started load and apply the result.
    pub fn finish(&mut self, pending: PendingLoad) -> LoadOutcome {
        let result = self.fetcher.fetch(&pending.request());
        self.complete(pending, result)
    }

    /// Apply an already fetched result. Stale loads are discarded.
    pub fn complete(
        &mut self,
        pending: PendingLoad,
        result: Result<FetchResponse, FetchError>,
    ) -> LoadOutcome {
        let preference = if self.loader.is_current(pending.generation) {
            self.current_preference()
        } else {
            ScripturePreference::default()
        };
        self.loader.complete(
            &mut self.doc,
            self.mount,
            pending,
            result,
            self.fetcher.as_mut(),
            &preference,
        )
    }

    fn current_preference(&mut self) -> ScripturePreference {
        match &self.state {
            Some(state) => {
                let book = state.book.clone();
                self.prefs.for_book(&book)
            }
            None => self.config.default_preference(),
        }
    }

    /// Handle a click on `node`. Returns `true` when the default action was
    /// prevented.
    pub fn handle_click(&mut self, node: NodeId) -> bool {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => self.resolution().state,
        };
        match intercept(&self.doc, node, self.history.current(), &state) {
            Interception::Navigate { url, .. } => {
                self.open(url);
                true
            }
            Interception::ColumnMode(mode) => {
                self.set_column_mode(mode);
                true
            }
            Interception::Default => false,
        }
    }

    /// Switch the mounted verse table to `mode` and remember it for the
    /// current book. Returns `false` when no verse table is mounted.
    pub fn set_column_mode(&mut self, mode: ColumnMode) -> bool {
        let Some(table) = columns::find_verse_table(&self.doc, self.mount) else {
            debug!(%mode, "no verse table mounted");
            return false;
        };
        columns::apply_mode(&mut self.doc, table, mode);
        if let Some(bar) = columns::find_controls(&self.doc) {
            columns::set_active(&mut self.doc, bar, mode);
        }
        if let Some(book) = self.state.as_ref().map(|s| s.book.clone()) {
            self.prefs.set_mode(&book, mode);
        }
        true
    }

    /// Show `left` and `right` in the mounted verse tables and remember the
    /// pair for the current book. Returns how many tables were refilled.
    ///
    /// Keys that are not lowercase slugs are rejected without saving.
    pub fn set_translations(&mut self, left: &str, right: &str) -> usize {
        let left = left.trim().to_ascii_lowercase();
        let right = right.trim().to_ascii_lowercase();
        if !is_valid_book_slug(&left) || !is_valid_book_slug(&right) {
            warn!(%left, %right, "ignoring invalid translation keys");
            return 0;
        }
        let Some(book) = self.state.as_ref().map(|s| s.book.clone()) else {
            return 0;
        };
        self.prefs.set_translations(&book, &left, &right);
        let preference = self.prefs.for_book(&book);

        columns::remove_controls(&mut self.doc, self.mount);
        verses::reset(&mut self.doc, self.mount);
        let filled = verses::hydrate(
            &mut self.doc,
            self.mount,
            self.fetcher.as_mut(),
            &self.config.loader_settings().bibles_root,
            &preference,
        );
        columns::install(&mut self.doc, self.mount, preference.mode);
        debug!(%left, %right, filled, "translations changed");
        filled
    }

    /// Mutation fallback: bind interactive elements that appeared outside a
    /// render. Returns how many were newly bound.
    pub fn on_mutation(&mut self) -> usize {
        self.loader.rebind(&mut self.doc, self.mount)
    }

    /// Word study behind the `.ws` element containing `node`.
    ///
    /// Successful fetches are cached per URL for the life of the viewer.
    /// Returns `None` when `node` is not inside a word-study element.
    pub fn word_study(&mut self, node: NodeId) -> Option<WordStudyView> {
        let el = self.doc.closest(node, |d, n| d.has_class(n, WS_CLASS))?;
        let reference = self.doc.attr(el, "data-ws").and_then(normalize_strongs_ref);
        let Some(url) = self.doc.attr(el, "data-ws-doc").map(str::to_string) else {
            return Some(WordStudyView::unavailable(reference, None));
        };
        if let Some(cached) = self.word_studies.get(&url) {
            return Some(cached.clone());
        }

        let request = FetchRequest {
            path: url.clone(),
            cache: CacheMode::Default,
        };
        match self.fetcher.fetch(&request) {
            Ok(response) if response.is_success() => {
                let view = WordStudyView::from_page(reference, url.clone(), &response.body);
                self.word_studies.insert(url, view.clone());
                Some(view)
            }
            Ok(response) => {
                warn!(%url, status = response.status, "word study not available");
                Some(WordStudyView::unavailable(reference, Some(url)))
            }
            Err(e) => {
                warn!(%url, error = %e, "word study fetch failed");
                Some(WordStudyView::unavailable(reference, Some(url)))
            }
        }
    }

    /// The whole shell as a standalone HTML page.
    pub fn page_html(&self) -> String {
        let title = match &self.state {
            Some(s) if s.chapter > 0 => format!("{} {} - {}", s.book, s.chapter, s.tab),
            Some(s) => format!("{} - {}", s.book, s.tab),
            None => "Scripture Viewer".to_string(),
        };
        let body = self.doc.inner_html(self.doc.root());
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    meta name="viewport" content="width=device-width, initial-scale=1";
                    title { (title) }
                }
                body {
                    (PreEscaped(body))
                }
            }
        }
        .into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryFetcher;
    use crate::prefs::MemoryStore;
    use crate::test_helpers::*;

    fn viewer(query: &str, fetcher: &MemoryFetcher) -> Viewer {
        let url = Url::parse(&format!("https://example.org/view.html{query}")).unwrap();
        Viewer::new(
            &ViewerConfig::default(),
            url,
            Box::new(fetcher.clone()),
            Box::new(MemoryStore::new()),
        )
    }

    #[test]
    fn history_push_truncates_forward_entries() {
        let u = |p: &str| Url::parse(&format!("https://example.org/{p}")).unwrap();
        let mut h = History::new(u("a"));
        h.push(u("b"));
        h.push(u("c"));
        assert_eq!(h.back().map(Url::path), Some("/b"));
        h.push(u("d"));
        assert_eq!(h.len(), 3);
        assert!(h.forward().is_none());
        assert_eq!(h.current().path(), "/d");
        h.back();
        h.back();
        assert!(h.back().is_none());
        assert_eq!(h.current().path(), "/a");
    }

    #[test]
    fn shell_has_mount_point() {
        let v = viewer("", &MemoryFetcher::new());
        assert_eq!(v.document().attr(v.mount(), "id"), Some("doc-target"));
        assert_eq!(
            v.document().inner_html(v.document().root()),
            r#"<main><article><div id="doc-target"></div></article></main>"#
        );
    }

    #[test]
    fn navigate_rewrites_address_to_canonical_query() {
        let fetcher = MemoryFetcher::new();
        let mut v = viewer("?book=Titus&lang=en", &fetcher);
        v.navigate();
        assert_eq!(
            v.current_url().query(),
            Some("book=titus&lang=en&chapter=1&tab=chapter_scripture")
        );
        assert_eq!(v.history().len(), 1);
    }

    #[test]
    fn stale_load_is_discarded() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert(
            "/books/new-testament/titus/001/titus-1-chapter-scripture.html",
            "<p>one</p>",
        );
        let mut v = viewer("?book=titus&chapter=1", &fetcher);
        let Navigation::Pending(first) = v.begin_navigation() else {
            panic!("expected load");
        };
        let Navigation::Pending(second) = v.begin_navigation() else {
            panic!("expected load");
        };
        assert!(matches!(v.finish(second), LoadOutcome::Rendered(_)));
        let outcome = v.complete(first, Ok(FetchResponse::ok("<p>stale</p>")));
        assert!(matches!(outcome, LoadOutcome::Superseded { .. }));
        assert_eq!(v.mount_html(), "<p>one</p>");
    }

    #[test]
    fn page_html_wraps_shell() {
        let mut v = viewer("?book=titus&chapter=0&tab=book_home", &MemoryFetcher::new());
        v.navigate();
        let page = v.page_html();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(r#"<div id="doc-target"></div>"#));
        assert!(page.contains("<title>titus - book_home</title>"));
    }

    // =========================================================================
    // Fixture site
    // =========================================================================

    #[test]
    fn fixture_scripture_toggle_persists_per_book() {
        let tmp = setup_site();
        let (mut v, store) = site_viewer(tmp.path(), "book=titus&chapter=1");
        v.navigate();
        let table = find_by_tag(v.document(), v.mount(), "table");
        assert!(v.document().text_content(table).contains("bondservant"));

        let bar = columns::find_controls(v.document()).unwrap();
        let left_only = v
            .document()
            .elements_by_class(bar, columns::BUTTON_CLASS)
            .into_iter()
            .find(|b| v.document().attr(*b, columns::MODE_ATTR) == Some("left-only"))
            .unwrap();
        assert!(v.handle_click(left_only));

        let right_cell = v.document().elements_by_class(table, "mtb-col-v2")[0];
        assert_eq!(v.document().style(right_cell, "display").as_deref(), Some("none"));
        assert_eq!(store.saves(), 1);
        assert_eq!(store.record().unwrap().books["titus"].mode, ColumnMode::LeftOnly);
        // a column toggle is not a navigation
        assert_eq!(v.history().len(), 1);
    }

    #[test]
    fn fixture_explanation_is_enhanced() {
        let tmp = setup_site();
        let (mut v, _) = site_viewer(tmp.path(), "book=titus&chapter=1&tab=chapter_explanation");
        v.navigate();
        let doc = v.document();
        let h1 = find_by_tag(doc, v.mount(), "h1");
        assert_eq!(doc.text_content(h1), "Titus 1 \u{2014} Explanation");
        let ws = find_by_class(doc, v.mount(), WS_CLASS);
        assert_eq!(doc.text_content(ws), "disqualified");
        assert_eq!(
            doc.attr(ws, "data-ws-doc"),
            Some("/books/new-testament/titus/001/titus-1-g96.html")
        );
        assert_eq!(doc.elements_by_class(v.mount(), "dwell-group").len(), 1);
    }

    #[test]
    fn fixture_word_study_is_fetched_and_cached() {
        let tmp = setup_site();
        let (mut v, _) = site_viewer(tmp.path(), "book=titus&chapter=1&tab=chapter_explanation");
        v.navigate();
        let ws = find_by_class(v.document(), v.mount(), WS_CLASS);
        let view = v.word_study(ws).unwrap();
        assert_eq!(view.reference.as_deref(), Some("g96"));
        assert_eq!(view.summary, "Not standing the test; rejected after examination.");

        std::fs::remove_file(tmp.path().join("books/new-testament/titus/001/titus-1-g96.html"))
            .unwrap();
        assert_eq!(v.word_study(ws), Some(view));
    }

    #[test]
    fn fixture_data_doc_click_navigates_and_back_returns() {
        let tmp = setup_site();
        let (mut v, _) = site_viewer(tmp.path(), "book=titus&chapter=1&tab=chapter_explanation");
        v.navigate();
        let link = find_by_attr(v.document(), v.mount(), "data-doc");
        assert!(v.handle_click(link));

        let state = v.state().unwrap();
        assert_eq!(state.book, "obadiah");
        assert_eq!(state.tab, crate::naming::Tab::Resources);
        assert!(v.mount_html().contains("Idols in the Ancient Near East"));
        assert_eq!(v.history().len(), 2);

        v.back().unwrap();
        assert_eq!(v.state().unwrap().book, "titus");
        assert!(v.mount_html().contains("disqualified"));
    }

    #[test]
    fn word_study_outside_marker_is_none() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("/books/new-testament/titus/001/titus-1-chapter-scripture.html", "<p>x</p>");
        let mut v = viewer("?book=titus&chapter=1", &fetcher);
        v.navigate();
        let p = v.document().elements_by_tag(v.mount(), "p")[0];
        assert_eq!(v.word_study(p), None);
    }
}
