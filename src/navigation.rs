//! Navigation state resolution.
//!
//! Turns the four URL query parameters (`book`, `chapter`, `tab`, `doc`) into
//! a [`NavigationState`], the document to load, and the canonical query the
//! address bar should be rewritten to. Conflicting signals are reconciled in
//! a fixed order:
//!
//! 1. A valid `doc` naming a resource topic pins the tab to `resources`.
//! 2. Book: the `book` parameter, else the book encoded in `doc`. With
//!    neither, the default book's introduction loads whatever `chapter` and
//!    `tab` say.
//! 3. Chapter: an explicit non-zero `chapter`, else the chapter encoded in
//!    `doc`, else an explicit `0`, else `1`.
//! 4. Tab: the pin, else `tab`, else the tab implied by `doc`, else
//!    chapter scripture. Chapter 0 turns chapter-content tabs into the book
//!    introduction.
//! 5. `chapter=0&tab=book_home` is the hero state: no document at all.
//! 6. The document is `doc` when it is authoritative (pinned, or the tab is
//!    resources), otherwise it is built from `(book, chapter, tab)`.
//!
//! Resolution is a pure function. Nothing is cached between calls.

use crate::naming::{
    self, DocumentDescriptor, Tab, build_filename, is_valid_book_slug, normalize_book_slug,
    parse_filename, validate_filename,
};
use crate::paths::resolve_path;
use tracing::debug;
use url::{Url, form_urlencoded};

/// Ordered query parameters, preserving keys this module does not own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a query string, with or without the leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes()).into_owned().collect(),
        }
    }

    pub fn from_url(url: &Url) -> Self {
        Self {
            pairs: url.query_pairs().into_owned().collect(),
        }
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// First value for `key`, trimmed; empty counts as absent.
    pub fn get_trimmed(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Replace the first `key` in place (dropping duplicates) or append it.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.pairs[pos].1 = value.to_string();
                let mut seen = 0usize;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// `application/x-www-form-urlencoded` serialization, without `?`.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// `url` with its query replaced by these parameters.
    pub fn apply_to(&self, url: &Url) -> Url {
        let mut out = url.clone();
        if self.is_empty() {
            out.set_query(None);
        } else {
            out.set_query(Some(&self.to_query_string()));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub book: String,
    pub chapter: u32,
    pub tab: Tab,
    /// The validated `doc` parameter, kept only when it is authoritative.
    pub doc: Option<String>,
}

impl NavigationState {
    pub fn is_hero(&self) -> bool {
        self.chapter == 0 && self.tab == Tab::BookHome
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: NavigationState,
    /// Filename to load; `None` in the hero state.
    pub document: Option<String>,
    pub canonical_query: QueryParams,
}

impl Resolution {
    /// Fetch path for the resolved document.
    ///
    /// The book encoded in the filename wins over the navigation book, so an
    /// authoritative `doc` from another book still resolves to its own folder.
    pub fn path(&self) -> Option<String> {
        let document = self.document.as_deref()?;
        let book = parse_filename(document)
            .map(|d| d.book)
            .unwrap_or_else(|| self.state.book.clone());
        Some(resolve_path(&book, document))
    }

    pub fn descriptor(&self) -> Option<DocumentDescriptor> {
        self.document.as_deref().and_then(parse_filename)
    }
}

/// Resolve with [`naming::DEFAULT_BOOK`] as the fallback book.
pub fn resolve(params: &QueryParams) -> Resolution {
    resolve_with_default(params, naming::DEFAULT_BOOK)
}

/// Resolve navigation parameters. `default_book` is used when neither `book`
/// nor `doc` supplies one.
pub fn resolve_with_default(params: &QueryParams, default_book: &str) -> Resolution {
    let raw_chapter = params
        .get_trimmed("chapter")
        .and_then(|c| c.parse::<u32>().ok());
    let raw_tab = params.get_trimmed("tab").and_then(Tab::from_key);
    let valid_doc = params.get_trimmed("doc").and_then(validate_filename);
    let descriptor = valid_doc.and_then(parse_filename);
    let pinned = descriptor
        .as_ref()
        .is_some_and(|d| d.content_type.is_resource_topic());

    let explicit_book = params
        .get_trimmed("book")
        .map(normalize_book_slug)
        .filter(|b| is_valid_book_slug(b));
    let book_context = explicit_book.or_else(|| descriptor.as_ref().map(|d| d.book.clone()));
    let has_book = book_context.is_some();
    let book = book_context.unwrap_or_else(|| default_book.to_string());

    let doc_chapter = descriptor.as_ref().map(|d| d.chapter).filter(|c| *c > 0);
    let chapter = match raw_chapter {
        // nobody named a book: only its introduction may load
        _ if !has_book => 0,
        Some(c) if c > 0 => c,
        _ => doc_chapter.or(raw_chapter).unwrap_or(1),
    };

    let mut tab = if pinned {
        Tab::Resources
    } else if !has_book {
        Tab::BookIntroduction
    } else {
        raw_tab
            .or_else(|| descriptor.as_ref().and_then(|d| d.content_type.tab()))
            .unwrap_or(Tab::ChapterScripture)
    };
    if chapter == 0 && tab.is_chapter_content() && !pinned {
        tab = Tab::BookIntroduction;
    }

    let authoritative_doc = valid_doc.filter(|_| pinned || tab == Tab::Resources);

    let document = if chapter == 0 && tab == Tab::BookHome {
        None
    } else {
        Some(match authoritative_doc {
            Some(doc) => doc.to_string(),
            None => build_filename(&book, chapter, Some(tab)),
        })
    };

    let mut canonical_query = params.clone();
    canonical_query.set("book", &book);
    canonical_query.set("chapter", &chapter.to_string());
    canonical_query.set("tab", tab.key());
    match authoritative_doc {
        Some(doc) => canonical_query.set("doc", doc),
        None => canonical_query.remove("doc"),
    }

    let state = NavigationState {
        book,
        chapter,
        tab,
        doc: authoritative_doc.map(str::to_string),
    };
    debug!(
        book = %state.book,
        chapter = state.chapter,
        tab = %state.tab,
        document = ?document,
        "resolved navigation"
    );
    Resolution {
        state,
        document,
        canonical_query,
    }
}
