//! Repair of UTF-8 punctuation that was decoded with the wrong code page.
//!
//! Content files pass through editors that occasionally read UTF-8 as CP437
//! or Windows-1252, turning `’` into `ΓÇÖ` or `â€™`. The table below maps
//! those sequences back. A stray `Â` (from a mis-decoded no-break space) is
//! removed last.
//!
//! Rules are applied in table order, and the whole table is re-applied
//! until nothing changes (at least two passes, so double mis-decodings
//! surface in the first pass and are fixed in the second). Every rule
//! shortens the text, so the loop terminates, and the result is a fixed
//! point: repairing repaired text changes nothing.

use crate::dom::{Document, NodeId};

const RULES: &[(&str, &str)] = &[
    // CP437
    ("ΓÇ£", "\u{201c}"),
    ("ΓÇ¥", "\u{201d}"),
    ("ΓÇØ", "\u{201d}"),
    ("ΓÇÿ", "\u{2018}"),
    ("ΓÇÖ", "\u{2019}"),
    ("ΓÇª", "\u{2026}"),
    ("ΓÇô", "\u{2013}"),
    ("ΓÇö", "\u{2014}"),
    // Windows-1252
    ("â€œ", "\u{201c}"),
    ("â€\u{9d}", "\u{201d}"),
    ("â€˜", "\u{2018}"),
    ("â€™", "\u{2019}"),
    ("â€¦", "\u{2026}"),
    ("â€“", "\u{2013}"),
    ("â€”", "\u{2014}"),
    // mis-decoded no-break space
    ("Â\u{a0}", "\u{a0}"),
    ("Â ", " "),
    ("Â", ""),
];

fn apply_rules(s: &str) -> String {
    let mut out = s.to_string();
    for (bad, good) in RULES {
        if out.contains(bad) {
            out = out.replace(bad, good);
        }
    }
    out
}

/// Repair one string. Idempotent.
pub fn repair(s: &str) -> String {
    let mut current = apply_rules(s);
    loop {
        let next = apply_rules(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn needs_repair(s: &str) -> bool {
    s.contains('Γ') || s.contains('â') || s.contains('Â')
}

/// Repair every text node below `root`. Returns how many nodes changed.
pub fn run(doc: &mut Document, root: NodeId) -> usize {
    let mut changed = 0;
    for n in doc.descendants(root) {
        let Some(text) = doc.text(n) else {
            continue;
        };
        if !needs_repair(text) {
            continue;
        }
        let fixed = repair(text);
        if fixed != text {
            doc.set_text(n, fixed);
            changed += 1;
        }
    }
    changed
}
