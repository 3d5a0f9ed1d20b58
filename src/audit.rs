//! Site audit: checks that published fragments sit where the viewer will
//! look for them.
//!
//! Every `.html` file under `{site}/books` is classified:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `Ok` | Canonical name, stored at its resolved path |
//! | `Unrecognized` | The filename grammar rejects the name; the viewer can never request it |
//! | `Misplaced` | Canonical name, but the resolver expects it elsewhere |
//!
//! Non-HTML files (images, JSON) are ignored.

use crate::naming::parse_filename;
use crate::paths::{BOOKS_ROOT, resolve_path};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("no books directory at {0}")]
    MissingBooksDir(PathBuf),
    #[error("failed to walk site: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Unrecognized,
    Misplaced { expected: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Site-absolute path, `/`-separated.
    pub path: String,
    pub status: AuditStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    pub fn ok_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status == AuditStatus::Ok).count()
    }

    pub fn problems(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| e.status != AuditStatus::Ok)
    }

    pub fn is_clean(&self) -> bool {
        self.problems().next().is_none()
    }
}

/// Classify one site-absolute path.
pub fn classify(site_path: &str) -> AuditStatus {
    let name = site_path.rsplit('/').next().unwrap_or(site_path);
    let Some(descriptor) = parse_filename(name) else {
        return AuditStatus::Unrecognized;
    };
    let expected = resolve_path(&descriptor.book, name);
    if expected == site_path {
        AuditStatus::Ok
    } else {
        AuditStatus::Misplaced { expected }
    }
}

fn site_path(site_root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(site_root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("/{}", parts.join("/")))
}

/// Walk `{site_root}/books` and classify every HTML fragment, in path order.
pub fn audit_site(site_root: &Path) -> Result<AuditReport, AuditError> {
    let books = site_root.join(BOOKS_ROOT.trim_start_matches('/'));
    if !books.is_dir() {
        return Err(AuditError::MissingBooksDir(books));
    }
    info!(root = %books.display(), "auditing site");

    let mut report = AuditReport::default();
    for entry in WalkDir::new(&books).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_html = entry.path().extension().is_some_and(|ext| ext == "html");
        if !is_html {
            continue;
        }
        let Some(path) = site_path(site_root, entry.path()) else {
            continue;
        };
        let status = classify(&path);
        debug!(%path, ?status, "classified");
        report.entries.push(AuditEntry { path, status });
    }
    Ok(report)
}
