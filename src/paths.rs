//! Maps a document filename to its fetchable site path.
//!
//! ```text
//! /books/{testament}/{book}/{bucket}/{filename}
//!
//! /books/new-testament/titus/000-book/titus-0-book-introduction.html
//! /books/old-testament/obadiah/001/obadiah-1-resources-idols.html
//! /books/old-testament/psalms/119/psalms-119-chapter-scripture.html
//! ```
//!
//! The bucket is `000-book` for book-level documents (chapter 0) and the
//! chapter number zero-padded to three digits otherwise. A filename the
//! grammar cannot parse lands in `000-book`.
//!
//! Books missing from the 66-book table are filed under `new-testament`.

use crate::naming::parse_filename;
use std::fmt;

/// Site root for all book content.
pub const BOOKS_ROOT: &str = "/books";

/// Bucket directory for book-level documents.
pub const BOOK_BUCKET: &str = "000-book";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Testament {
    Old,
    New,
}

impl Testament {
    pub fn dir_name(self) -> &'static str {
        match self {
            Testament::Old => "old-testament",
            Testament::New => "new-testament",
        }
    }
}

impl fmt::Display for Testament {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

const OLD_TESTAMENT: [&str; 39] = [
    "genesis",
    "exodus",
    "leviticus",
    "numbers",
    "deuteronomy",
    "joshua",
    "judges",
    "ruth",
    "1-samuel",
    "2-samuel",
    "1-kings",
    "2-kings",
    "1-chronicles",
    "2-chronicles",
    "ezra",
    "nehemiah",
    "esther",
    "job",
    "psalms",
    "proverbs",
    "ecclesiastes",
    "song-of-solomon",
    "isaiah",
    "jeremiah",
    "lamentations",
    "ezekiel",
    "daniel",
    "hosea",
    "joel",
    "amos",
    "obadiah",
    "jonah",
    "micah",
    "nahum",
    "habakkuk",
    "zephaniah",
    "haggai",
    "zechariah",
    "malachi",
];

const NEW_TESTAMENT: [&str; 27] = [
    "matthew",
    "mark",
    "luke",
    "john",
    "acts",
    "romans",
    "1-corinthians",
    "2-corinthians",
    "galatians",
    "ephesians",
    "philippians",
    "colossians",
    "1-thessalonians",
    "2-thessalonians",
    "1-timothy",
    "2-timothy",
    "titus",
    "philemon",
    "hebrews",
    "james",
    "1-peter",
    "2-peter",
    "1-john",
    "2-john",
    "3-john",
    "jude",
    "revelation",
];

/// Whether `book` is one of the 66 canonical book slugs.
pub fn is_known_book(book: &str) -> bool {
    OLD_TESTAMENT.contains(&book) || NEW_TESTAMENT.contains(&book)
}

pub fn testament_of(book: &str) -> Testament {
    if OLD_TESTAMENT.contains(&book) {
        Testament::Old
    } else {
        Testament::New
    }
}

/// Bucket directory for a chapter: `000-book` for 0, else `{:03}`.
pub fn chapter_bucket(chapter: u32) -> String {
    if chapter == 0 {
        BOOK_BUCKET.to_string()
    } else {
        format!("{chapter:03}")
    }
}

/// Fetch path for `filename` under `book`. Pure.
pub fn resolve_path(book: &str, filename: &str) -> String {
    let chapter = parse_filename(filename).map_or(0, |d| d.chapter);
    format!(
        "{}/{}/{}/{}/{}",
        BOOKS_ROOT,
        testament_of(book),
        book,
        chapter_bucket(chapter),
        filename
    )
}

/// Everything up to and including the last `/`. Empty when there is none.
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_every_book() {
        assert_eq!(OLD_TESTAMENT.len() + NEW_TESTAMENT.len(), 66);
        assert!(is_known_book("song-of-solomon"));
        assert!(!is_known_book("enoch"));
    }

    #[test]
    fn introduction_goes_to_book_bucket() {
        assert_eq!(
            resolve_path("titus", "titus-0-book-introduction.html"),
            "/books/new-testament/titus/000-book/titus-0-book-introduction.html"
        );
    }

    #[test]
    fn chapters_are_zero_padded() {
        assert_eq!(
            resolve_path("obadiah", "obadiah-1-resources-idols.html"),
            "/books/old-testament/obadiah/001/obadiah-1-resources-idols.html"
        );
        assert_eq!(
            resolve_path("psalms", "psalms-119-chapter-scripture.html"),
            "/books/old-testament/psalms/119/psalms-119-chapter-scripture.html"
        );
    }

    #[test]
    fn word_studies_share_the_chapter_bucket() {
        assert_eq!(
            resolve_path("titus", "titus-1-g96.html"),
            "/books/new-testament/titus/001/titus-1-g96.html"
        );
    }

    #[test]
    fn unknown_book_defaults_to_new_testament() {
        assert_eq!(testament_of("enoch"), Testament::New);
        assert_eq!(
            resolve_path("enoch", "enoch-2-chapter-scripture.html"),
            "/books/new-testament/enoch/002/enoch-2-chapter-scripture.html"
        );
    }

    #[test]
    fn unparseable_name_uses_book_bucket() {
        assert_eq!(
            resolve_path("titus", "about.html"),
            "/books/new-testament/titus/000-book/about.html"
        );
    }

    #[test]
    fn directory_of_keeps_trailing_slash() {
        assert_eq!(
            directory_of("/books/new-testament/titus/001/x.html"),
            "/books/new-testament/titus/001/"
        );
        assert_eq!(directory_of("x.html"), "");
    }
}
