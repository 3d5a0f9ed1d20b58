//! Centralized filename grammar for content documents.
//!
//! Every fragment the viewer can load follows one naming pattern:
//! `{book}-{chapter}-{content}.html`, where `book` is a lower-case slug
//! (`1-corinthians`, `song-of-solomon`), `chapter` is a plain integer, and
//! `content` names the kind of document. This module builds those names from
//! navigation parameters and parses them back into a [`DocumentDescriptor`].
//!
//! ## Recognized Names
//!
//! Checked in priority order:
//! - `titus-0-book-introduction.html` → book introduction (always chapter 0)
//! - `titus-2-chapter-explanation.html` → chapter content (scripture,
//!   orientation, explanation, insights, eg-culture, resources, key-words,
//!   deeper-dive)
//! - `obadiah-1-resources-idols.html` → resource topic `idols`
//! - `titus-1-g96.html`, `obadiah-1-h1347-pride.html` → word study
//!
//! Anything else parses to `None`.
//!
//! ## Untrusted Input
//!
//! Names arriving from a URL go through [`validate_filename`] first. A name
//! that fails validation is treated exactly like a missing parameter.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Book used when navigation carries no usable book slug.
pub const DEFAULT_BOOK: &str = "titus";

/// Tab keys as they appear in the `tab` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    ChapterScripture,
    BookIntroduction,
    /// Book landing view. At chapter 0 this is the hero state with no fragment.
    BookHome,
    ChapterOrientation,
    ChapterExplanation,
    ChapterInsights,
    EgCulture,
    Resources,
    KeyWords,
    DeeperDive,
}

impl Tab {
    pub const ALL: [Tab; 10] = [
        Tab::ChapterScripture,
        Tab::BookIntroduction,
        Tab::BookHome,
        Tab::ChapterOrientation,
        Tab::ChapterExplanation,
        Tab::ChapterInsights,
        Tab::EgCulture,
        Tab::Resources,
        Tab::KeyWords,
        Tab::DeeperDive,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Tab::ChapterScripture => "chapter_scripture",
            Tab::BookIntroduction => "book_introduction",
            Tab::BookHome => "book_home",
            Tab::ChapterOrientation => "chapter_orientation",
            Tab::ChapterExplanation => "chapter_explanation",
            Tab::ChapterInsights => "chapter_insights",
            Tab::EgCulture => "eg_culture",
            Tab::Resources => "resources",
            Tab::KeyWords => "key_words",
            Tab::DeeperDive => "deeper_dive",
        }
    }

    /// Parse a `tab` query value. Unknown keys are `None`, never an error.
    pub fn from_key(key: &str) -> Option<Tab> {
        Tab::ALL.into_iter().find(|t| t.key() == key.trim())
    }

    /// Whether this tab shows per-chapter content (as opposed to book-level views).
    pub fn is_chapter_content(self) -> bool {
        !matches!(self, Tab::BookIntroduction | Tab::BookHome)
    }

    /// Filename suffix for chapter-content tabs.
    fn suffix(self) -> &'static str {
        match self {
            Tab::ChapterScripture => "chapter-scripture",
            Tab::BookIntroduction | Tab::BookHome => "book-introduction",
            Tab::ChapterOrientation => "chapter-orientation",
            Tab::ChapterExplanation => "chapter-explanation",
            Tab::ChapterInsights => "chapter-insights",
            Tab::EgCulture => "eg-culture",
            Tab::Resources => "resources",
            Tab::KeyWords => "key-words",
            Tab::DeeperDive => "deeper-dive",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The kind of document a filename names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    BookIntroduction,
    ChapterScripture,
    ChapterOrientation,
    ChapterExplanation,
    ChapterInsights,
    EgCulture,
    Resources,
    KeyWords,
    DeeperDive,
    /// `{book}-{n}-resources-{topic}.html`
    ResourceTopic(String),
    /// `{book}-{n}-{ref}.html` where `ref` is a normalized Strong's id like `g96`.
    WordStudy(String),
}

impl ContentType {
    fn from_suffix(suffix: &str) -> Option<ContentType> {
        Some(match suffix {
            "chapter-scripture" => ContentType::ChapterScripture,
            "chapter-orientation" => ContentType::ChapterOrientation,
            "chapter-explanation" => ContentType::ChapterExplanation,
            "chapter-insights" => ContentType::ChapterInsights,
            "eg-culture" => ContentType::EgCulture,
            "resources" => ContentType::Resources,
            "key-words" => ContentType::KeyWords,
            "deeper-dive" => ContentType::DeeperDive,
            _ => return None,
        })
    }

    /// The tab that shows this kind of document, if any tab does.
    pub fn tab(&self) -> Option<Tab> {
        Some(match self {
            ContentType::BookIntroduction => Tab::BookIntroduction,
            ContentType::ChapterScripture => Tab::ChapterScripture,
            ContentType::ChapterOrientation => Tab::ChapterOrientation,
            ContentType::ChapterExplanation => Tab::ChapterExplanation,
            ContentType::ChapterInsights => Tab::ChapterInsights,
            ContentType::EgCulture => Tab::EgCulture,
            ContentType::Resources | ContentType::ResourceTopic(_) => Tab::Resources,
            ContentType::KeyWords => Tab::KeyWords,
            ContentType::DeeperDive => Tab::DeeperDive,
            ContentType::WordStudy(_) => return None,
        })
    }

    pub fn is_resource_topic(&self) -> bool {
        matches!(self, ContentType::ResourceTopic(_))
    }
}

/// Result of parsing a canonical document filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub book: String,
    pub chapter: u32,
    pub content_type: ContentType,
}

static INTRO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9-]+)-0-book-introduction\.html$").unwrap());
static CHAPTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([a-z0-9-]+)-(\d+)-(chapter-scripture|chapter-orientation|chapter-explanation|chapter-insights|eg-culture|resources|key-words|deeper-dive)\.html$",
    )
    .unwrap()
});
static TOPIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9-]+)-(\d+)-resources-([a-z0-9-]+)\.html$").unwrap());
static WORD_STUDY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9-]+)-(\d+)-([gh]\d{1,5})(?:-[a-z0-9-]+)?\.html$").unwrap());
static SAFE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+-(0|[1-9][0-9]*)-[a-z0-9-]+\.html$").unwrap());
static BOOK_SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

/// Normalize a user-supplied book name into slug form: `"Song of Solomon"` → `"song-of-solomon"`.
pub fn normalize_book_slug(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Whether `book` is a well-formed slug (`[a-z0-9]` words joined by single dashes).
pub fn is_valid_book_slug(book: &str) -> bool {
    BOOK_SLUG_RE.is_match(book)
}

/// Build the canonical filename for a navigation triple.
///
/// Total by construction:
/// - a missing or malformed `book` → [`DEFAULT_BOOK`]'s introduction
/// - `chapter == 0` → the book introduction, whatever the tab
/// - book-level tabs → the book introduction
/// - `None` tab → chapter scripture
pub fn build_filename(book: &str, chapter: u32, tab: Option<Tab>) -> String {
    if !is_valid_book_slug(book) {
        return book_introduction_filename(DEFAULT_BOOK);
    }
    let tab = tab.unwrap_or(Tab::ChapterScripture);
    if chapter == 0 || !tab.is_chapter_content() {
        return book_introduction_filename(book);
    }
    format!("{}-{}-{}.html", book, chapter, tab.suffix())
}

pub fn book_introduction_filename(book: &str) -> String {
    format!("{book}-0-book-introduction.html")
}

/// Filename of the word-study document for a normalized reference (`g96`).
pub fn word_study_filename(book: &str, chapter: u32, reference: &str) -> String {
    format!("{book}-{chapter}-{reference}.html")
}

/// Normalize a Strong's-style reference: `"G0096"` → `"g96"`, `"H2087"` → `"h2087"`.
///
/// Returns `None` unless the input is `G` or `H` followed by 1-5 digits.
pub fn normalize_strongs_ref(raw: &str) -> Option<String> {
    let mut chars = raw.chars();
    let letter = chars.next()?.to_ascii_lowercase();
    if letter != 'g' && letter != 'h' {
        return None;
    }
    let digits = chars.as_str();
    if digits.is_empty() || digits.len() > 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    let number = if trimmed.is_empty() { "0" } else { trimmed };
    Some(format!("{letter}{number}"))
}

/// Parse a canonical filename. See the module docs for the accepted shapes.
pub fn parse_filename(name: &str) -> Option<DocumentDescriptor> {
    if let Some(c) = INTRO_RE.captures(name) {
        return Some(DocumentDescriptor {
            book: c[1].to_string(),
            chapter: 0,
            content_type: ContentType::BookIntroduction,
        });
    }
    if let Some(c) = CHAPTER_RE.captures(name) {
        return Some(DocumentDescriptor {
            book: c[1].to_string(),
            chapter: c[2].parse().ok()?,
            content_type: ContentType::from_suffix(&c[3])?,
        });
    }
    if let Some(c) = TOPIC_RE.captures(name) {
        return Some(DocumentDescriptor {
            book: c[1].to_string(),
            chapter: c[2].parse().ok()?,
            content_type: ContentType::ResourceTopic(c[3].to_string()),
        });
    }
    if let Some(c) = WORD_STUDY_RE.captures(name) {
        return Some(DocumentDescriptor {
            book: c[1].to_string(),
            chapter: c[2].parse().ok()?,
            content_type: ContentType::WordStudy(normalize_strongs_ref(&c[3])?),
        });
    }
    None
}

/// Strict gate for filenames from untrusted input (the `doc` URL parameter).
///
/// Accepts only `[a-z0-9-]` book slugs and content names, a plain or zero
/// chapter number, and the `.html` suffix. Slashes, `..`, upper case and any
/// other characters are rejected.
pub fn validate_filename(raw: &str) -> Option<&str> {
    SAFE_NAME_RE.is_match(raw).then_some(raw)
}
