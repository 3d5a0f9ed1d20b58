//! Shared test utilities for the scripture-viewer test suite.
//!
//! Provides the fixture site, a viewer wired to it, and lookup helpers that
//! panic with a clear message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_site();
//! let (mut viewer, store) = site_viewer(tmp.path(), "book=titus&chapter=1");
//! viewer.navigate();
//!
//! let table = find_by_tag(viewer.document(), viewer.mount(), "table");
//! assert_eq!(store.saves(), 0);
//! ```

use std::path::Path;
use tempfile::TempDir;
use url::Url;

use crate::config::ViewerConfig;
use crate::dom::{Document, NodeId};
use crate::loader::FsFetcher;
use crate::prefs::MemoryStore;
use crate::viewer::Viewer;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Viewer over the site at `site` with an in-memory preference store. The
/// returned store shares state with the one the viewer owns.
pub fn site_viewer(site: &Path, query: &str) -> (Viewer, MemoryStore) {
    let store = MemoryStore::new();
    let url = Url::parse(&format!("https://example.org/view.html?{query}")).unwrap();
    let viewer = Viewer::new(
        &ViewerConfig::default(),
        url,
        Box::new(FsFetcher::new(site)),
        Box::new(store.clone()),
    );
    (viewer, store)
}

// =========================================================================
// Document lookups, panicking with a clear message on miss
// =========================================================================

/// First element under `scope` with `class`. Panics if not found.
pub fn find_by_class(doc: &Document, scope: NodeId, class: &str) -> NodeId {
    doc.elements_by_class(scope, class)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no .{class} in {}", doc.inner_html(scope)))
}

/// First element under `scope` named `tag`. Panics if not found.
pub fn find_by_tag(doc: &Document, scope: NodeId, tag: &str) -> NodeId {
    doc.elements_by_tag(scope, tag)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{tag}> in {}", doc.inner_html(scope)))
}

/// First element under `scope` carrying `attr`. Panics if not found.
pub fn find_by_attr(doc: &Document, scope: NodeId, attr: &str) -> NodeId {
    doc.descendants(scope)
        .into_iter()
        .find(|n| doc.attr(*n, attr).is_some())
        .unwrap_or_else(|| panic!("no [{attr}] in {}", doc.inner_html(scope)))
}
