//! Column-view controls for side-by-side verse tables.
//!
//! A chapter scripture table has one row per verse with three cells:
//! verse number, left translation, right translation. When the mounted
//! fragment holds such a table, [`install`] puts a toggle bar directly
//! before the mount point:
//!
//! ```html
//! <div class="scripture-controls">
//!   <button type="button" class="sc-btn is-active" data-sc-mode="both">Both</button>
//!   <button type="button" class="sc-btn" data-sc-mode="left-only">NKJV Only</button>
//!   <button type="button" class="sc-btn" data-sc-mode="right-only">NLT Only</button>
//! </div>
//! ```
//!
//! Toggling only hides cells with `display: none`; nothing is re-fetched.
//! Rows with fewer than three cells (captions, section headings) are never
//! touched.

use crate::dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONTROLS_CLASS: &str = "scripture-controls";
pub const BUTTON_CLASS: &str = "sc-btn";
pub const ACTIVE_CLASS: &str = "is-active";
pub const MODE_ATTR: &str = "data-sc-mode";
pub const BOUND_ATTR: &str = "data-sc-bound";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnMode {
    #[default]
    Both,
    LeftOnly,
    RightOnly,
}

impl ColumnMode {
    pub const ALL: [ColumnMode; 3] = [
        ColumnMode::Both,
        ColumnMode::LeftOnly,
        ColumnMode::RightOnly,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ColumnMode::Both => "both",
            ColumnMode::LeftOnly => "left-only",
            ColumnMode::RightOnly => "right-only",
        }
    }

    pub fn from_key(key: &str) -> Option<ColumnMode> {
        ColumnMode::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl fmt::Display for ColumnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn cells(doc: &Document, row: NodeId) -> Vec<NodeId> {
    doc.element_children(row)
        .into_iter()
        .filter(|c| doc.is_element(*c, "td") || doc.is_element(*c, "th"))
        .collect()
}

fn three_cell_rows(doc: &Document, table: NodeId) -> Vec<NodeId> {
    doc.elements_by_tag(table, "tr")
        .into_iter()
        .filter(|r| cells(doc, *r).len() >= 3)
        .collect()
}

/// First table under `root` with at least one verse row.
pub fn find_verse_table(doc: &Document, root: NodeId) -> Option<NodeId> {
    doc.elements_by_tag(root, "table")
        .into_iter()
        .find(|t| !three_cell_rows(doc, *t).is_empty())
}

/// Show or hide translation cells for `mode`.
pub fn apply_mode(doc: &mut Document, table: NodeId, mode: ColumnMode) {
    for row in three_cell_rows(doc, table) {
        let c = cells(doc, row);
        doc.set_style(c[1], "display", None);
        doc.set_style(c[2], "display", None);
        match mode {
            ColumnMode::Both => {}
            ColumnMode::LeftOnly => doc.set_style(c[2], "display", Some("none")),
            ColumnMode::RightOnly => doc.set_style(c[1], "display", Some("none")),
        }
    }
}

/// Mark the button for `mode` active inside `bar`.
pub fn set_active(doc: &mut Document, bar: NodeId, mode: ColumnMode) {
    for button in doc.elements_by_class(bar, BUTTON_CLASS) {
        let is_mode = doc.attr(button, MODE_ATTR) == Some(mode.key());
        if is_mode {
            doc.add_class(button, ACTIVE_CLASS);
        } else {
            doc.remove_class(button, ACTIVE_CLASS);
        }
        doc.set_attr(button, "aria-pressed", if is_mode { "true" } else { "false" });
    }
}

/// The toggle bar currently in the document, if any.
pub fn find_controls(doc: &Document) -> Option<NodeId> {
    doc.elements_by_class(doc.root(), CONTROLS_CLASS).into_iter().next()
}

/// Header labels for the two translation columns, from the first verse row.
fn column_labels(doc: &Document, table: NodeId) -> (String, String) {
    let rows = three_cell_rows(doc, table);
    let label = |i: usize, fallback: &str| {
        rows.first()
            .map(|r| doc.text_content(cells(doc, *r)[i]).trim().to_string())
            .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or_else(|| fallback.to_string())
    };
    (label(1, "Left"), label(2, "Right"))
}

/// Install the toggle bar for the verse table under `mount`, applying `mode`.
///
/// Returns `false` when the fragment has no verse table. A table already
/// carrying [`BOUND_ATTR`] keeps its bar; only the mode is re-applied.
pub fn install(doc: &mut Document, mount: NodeId, mode: ColumnMode) -> bool {
    let Some(table) = find_verse_table(doc, mount) else {
        return false;
    };
    let existing = find_controls(doc);
    if doc.attr(table, BOUND_ATTR).is_some() {
        if let Some(bar) = existing {
            apply_mode(doc, table, mode);
            set_active(doc, bar, mode);
            return true;
        }
    }
    if let Some(bar) = existing {
        doc.detach(bar);
    }

    let (left, right) = column_labels(doc, table);
    let markup = maud::html! {
        div class=(CONTROLS_CLASS) role="group" aria-label="Scripture columns" {
            button type="button" class=(BUTTON_CLASS) data-sc-mode=(ColumnMode::Both.key()) { "Both" }
            button type="button" class=(BUTTON_CLASS) data-sc-mode=(ColumnMode::LeftOnly.key()) { (left) " Only" }
            button type="button" class=(BUTTON_CLASS) data-sc-mode=(ColumnMode::RightOnly.key()) { (right) " Only" }
        }
    };
    let holder = doc.create_element("div");
    let Ok(nodes) = doc.append_html(holder, &markup.into_string()) else {
        return false;
    };
    let Some(&bar) = nodes.first() else {
        return false;
    };
    match doc.parent(mount) {
        Some(parent) => doc.insert_before(parent, bar, mount),
        None => {
            let first = doc.children(mount).first().copied();
            match first {
                Some(first) => doc.insert_before(mount, bar, first),
                None => doc.append_child(mount, bar),
            }
        }
    }

    doc.set_attr(table, BOUND_ATTR, "1");
    apply_mode(doc, table, mode);
    set_active(doc, bar, mode);
    true
}

/// Remove every toggle bar and reset column hiding under `mount`.
pub fn remove_controls(doc: &mut Document, mount: NodeId) {
    for bar in doc.elements_by_class(doc.root(), CONTROLS_CLASS) {
        doc.detach(bar);
    }
    for table in doc.elements_by_tag(mount, "table") {
        apply_mode(doc, table, ColumnMode::Both);
        doc.remove_attr(table, BOUND_ATTR);
    }
}
