//! Verse data and the side-by-side chapter table.
//!
//! Each translation of each book is one JSON file at
//! `{bibles_root}/{translation}/{book}.json`:
//!
//! ```json
//! {
//!   "translationKey": "nkjv",
//!   "translation": "NKJV",
//!   "bookSlug": "titus",
//!   "chapters": { "1": { "1": "Paul, a bondservant of God...", "2": "..." } }
//! }
//! ```
//!
//! This is the only accepted shape. Unknown fields, non-numeric or zero
//! chapter/verse keys, and non-string verse text are rejected with
//! [`VerseError::Schema`] at load time.
//!
//! Fragments ask for a table with a placeholder:
//!
//! ```html
//! <div class="mtb-scripture-root" data-book="titus" data-chapter="1"></div>
//! ```
//!
//! which [`hydrate`] fills with a table of the two preferred translations.

use crate::dom::{Document, NodeId};
use crate::loader::{FetchError, FetchRequest, Fetcher};
use crate::naming::{is_valid_book_slug, normalize_book_slug};
use crate::prefs::ScripturePreference;
use maud::{Markup, html};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

pub const SCRIPTURE_ROOT_CLASS: &str = "mtb-scripture-root";
const HYDRATED_ATTR: &str = "data-hydrated";

#[derive(Error, Debug)]
pub enum VerseError {
    #[error("failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        source: FetchError,
    },
    #[error("failed to fetch {path}: HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("invalid verse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("verse data schema violation: {0}")]
    Schema(String),
    #[error("{translation} has no chapter {chapter}")]
    MissingChapter { translation: String, chapter: u32 },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawBookText {
    translation_key: String,
    translation: String,
    book_slug: String,
    chapters: BTreeMap<String, BTreeMap<String, String>>,
}

/// Chapter number → verse number → text.
pub type Chapter = BTreeMap<u32, String>;

/// One translation of one book, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookText {
    pub translation_key: String,
    pub translation: String,
    pub book_slug: String,
    pub chapters: BTreeMap<u32, Chapter>,
}

fn positive_key(kind: &str, key: &str) -> Result<u32, VerseError> {
    key.parse::<u32>()
        .ok()
        .filter(|n| *n > 0 && !key.starts_with('+'))
        .ok_or_else(|| VerseError::Schema(format!("{kind} key {key:?} is not a positive integer")))
}

impl BookText {
    pub fn from_json(json: &str) -> Result<Self, VerseError> {
        let raw: RawBookText = serde_json::from_str(json)?;
        if raw.translation_key.trim().is_empty() {
            return Err(VerseError::Schema("empty translationKey".into()));
        }
        let mut chapters = BTreeMap::new();
        for (chapter_key, verses) in raw.chapters {
            let chapter = positive_key("chapter", &chapter_key)?;
            let mut parsed = Chapter::new();
            for (verse_key, text) in verses {
                parsed.insert(positive_key("verse", &verse_key)?, text);
            }
            chapters.insert(chapter, parsed);
        }
        Ok(Self {
            translation_key: raw.translation_key,
            translation: raw.translation,
            book_slug: raw.book_slug,
            chapters,
        })
    }

    pub fn chapter(&self, n: u32) -> Option<&Chapter> {
        self.chapters.get(&n)
    }

    /// Column heading: the display name, else the upper-cased key.
    pub fn label(&self) -> String {
        if self.translation.trim().is_empty() {
            self.translation_key.to_uppercase()
        } else {
            self.translation.clone()
        }
    }
}

/// Verse | left | right table for one chapter.
///
/// Degrades to Verse | left when `right` is absent or lacks the chapter.
/// Verse numbers are the union of both sides, in numeric order.
pub fn chapter_table(
    left: &BookText,
    right: Option<&BookText>,
    chapter: u32,
) -> Result<Markup, VerseError> {
    let left_chapter = left.chapter(chapter).ok_or_else(|| VerseError::MissingChapter {
        translation: left.label(),
        chapter,
    })?;
    let right = right.and_then(|r| r.chapter(chapter).map(|c| (r, c)));
    let mut verses: Vec<u32> = left_chapter.keys().copied().collect();
    if let Some((_, rc)) = right {
        verses.extend(rc.keys().copied());
        verses.sort_unstable();
        verses.dedup();
    }
    let empty = String::new();

    Ok(html! {
        table.mtb-chapter-scripture {
            thead {
                tr {
                    th.mtb-verse-num { "Verse" }
                    th.mtb-col-v1 { (left.label()) }
                    @if let Some((r, _)) = right {
                        th.mtb-col-v2 { (r.label()) }
                    }
                }
            }
            tbody {
                @for v in &verses {
                    tr {
                        td.mtb-verse-num { (v) }
                        td.mtb-col-v1 { (left_chapter.get(v).unwrap_or(&empty)) }
                        @if let Some((_, rc)) = right {
                            td.mtb-col-v2 { (rc.get(v).unwrap_or(&empty)) }
                        }
                    }
                }
            }
        }
    })
}

fn load_book(
    fetcher: &mut dyn Fetcher,
    bibles_root: &str,
    translation: &str,
    book: &str,
) -> Result<BookText, VerseError> {
    let path = format!("{}/{}/{}.json", bibles_root.trim_end_matches('/'), translation, book);
    let response = fetcher
        .fetch(&FetchRequest::no_store(path.clone()))
        .map_err(|source| VerseError::Fetch {
            path: path.clone(),
            source,
        })?;
    if !response.is_success() {
        return Err(VerseError::Status {
            path,
            status: response.status,
        });
    }
    let text = BookText::from_json(&response.body)?;
    if text.book_slug != book {
        return Err(VerseError::Schema(format!(
            "{path} declares book {:?}",
            text.book_slug
        )));
    }
    Ok(text)
}

fn render_root(
    fetcher: &mut dyn Fetcher,
    bibles_root: &str,
    book: &str,
    chapter: u32,
    preference: &ScripturePreference,
) -> Result<Markup, VerseError> {
    let left = load_book(fetcher, bibles_root, &preference.left_translation, book)?;
    let right = match load_book(fetcher, bibles_root, &preference.right_translation, book) {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("showing one translation: {e}");
            None
        }
    };
    chapter_table(&left, right.as_ref(), chapter)
}

/// Mark every filled placeholder under `mount` for refilling by [`hydrate`].
pub fn reset(doc: &mut Document, mount: NodeId) {
    for root in doc.elements_by_class(mount, SCRIPTURE_ROOT_CLASS) {
        doc.remove_attr(root, HYDRATED_ATTR);
    }
}

/// Fill every unhydrated scripture placeholder under `mount`. Returns how many were filled.
///
/// Placeholders without a valid `data-book` or a chapter ≥ 1 are left alone.
/// A failure on the left translation renders an inline message in place of
/// the table.
pub fn hydrate(
    doc: &mut Document,
    mount: NodeId,
    fetcher: &mut dyn Fetcher,
    bibles_root: &str,
    preference: &ScripturePreference,
) -> usize {
    let mut filled = 0;
    for root in doc.elements_by_class(mount, SCRIPTURE_ROOT_CLASS) {
        if doc.attr(root, HYDRATED_ATTR).is_some() {
            continue;
        }
        let book = doc.attr(root, "data-book").map(normalize_book_slug);
        let chapter = doc
            .attr(root, "data-chapter")
            .and_then(|c| c.trim().parse::<u32>().ok())
            .filter(|c| *c >= 1);
        let (Some(book), Some(chapter)) = (book.filter(|b| is_valid_book_slug(b)), chapter) else {
            continue;
        };
        debug!(book = %book, chapter, "hydrating scripture table");

        let markup = match render_root(fetcher, bibles_root, &book, chapter, preference) {
            Ok(table) => table.into_string(),
            Err(e) => {
                warn!("scripture table unavailable: {e}");
                html! { p.muted.load-error { "Could not load scripture. " (e.to_string()) } }
                    .into_string()
            }
        };
        doc.clear_children(root);
        if let Err(e) = doc.append_html(root, &markup) {
            warn!("could not mount scripture table: {e}");
            continue;
        }
        doc.set_attr(root, HYDRATED_ATTR, "1");
        filled += 1;
    }
    filled
}
