//! # Scripture Viewer
//!
//! A query-driven viewer for chapter-by-chapter Bible study sites. The URL
//! query is the whole navigation state: `book`, `chapter`, `tab` and `doc`
//! resolve to exactly one HTML fragment, which is fetched, mounted into a
//! single shell page and enhanced in place.
//!
//! # Architecture: Resolve, Load, Enhance
//!
//! ```text
//! 1. Resolve   ?book=titus&chapter=1&tab=…  →  titus-1-chapter-scripture.html
//!                                            →  /books/new-testament/titus/001/…
//! 2. Load      fetch (no-store) → content root → mount point
//! 3. Enhance   text repair → word-study markers → column controls → dwell groups → bind
//! ```
//!
//! Each step is a plain function over plain data. Resolution never touches
//! the document; loading never inspects the URL; enhancement reads its
//! context from an [`enhance::EnhancementContext`] argument, not from
//! attributes left on the shell. The browser surfaces (fetching, persisted
//! preferences) sit behind the [`loader::Fetcher`] and
//! [`prefs::PreferenceStore`] traits, so the whole flow runs in tests and in
//! the CLI against a site directory.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Filename grammar: build and parse `{book}-{chapter}-{content}.html` |
//! | [`paths`] | Filename → site path (`/books/{testament}/{book}/{bucket}/…`) |
//! | [`navigation`] | Query parameters → navigation state, document and canonical query |
//! | [`loader`] | Fetch, mount and render-event plumbing, with stale-load discarding |
//! | [`enhance`] | Post-mount passes over the injected fragment |
//! | [`verses`] | Verse JSON schema and side-by-side chapter tables |
//! | [`interceptor`] | Click classification: in-place navigation, column toggles, default |
//! | [`viewer`] | Shell document, history and the event entry points tying it together |
//! | [`prefs`] | Per-book scripture column preference and its stores |
//! | [`dom`] | Small arena HTML tree the viewer mutates |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`audit`] | Checks that published fragments sit at their resolved paths |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Canonical Path Scheme
//!
//! Every document lives at exactly one path, derived from its filename
//! alone: book-level documents in `000-book/`, chapter documents in a
//! zero-padded chapter folder. There is no probing of alternative layouts;
//! a fragment that is not where the resolver expects it is reported by
//! `check`, not silently found.
//!
//! ## Generations Instead of Cancellation
//!
//! Navigations are never queued or cancelled. Each load carries a
//! generation number and a completion is applied only while its generation
//! is the latest, so a slow response cannot overwrite a newer page.
//!
//! ## Maud for Generated Markup
//!
//! The few pieces of HTML the viewer creates itself (error notices, column
//! controls, verse tables, the standalone page) are written with
//! [Maud](https://maud.lambda.xyz/), so interpolated paths and verse text are
//! escaped by construction.

pub mod audit;
pub mod config;
pub mod dom;
pub mod enhance;
pub mod interceptor;
pub mod loader;
pub mod naming;
pub mod navigation;
pub mod output;
pub mod paths;
pub mod prefs;
pub mod verses;
pub mod viewer;

#[cfg(test)]
pub(crate) mod test_helpers;
