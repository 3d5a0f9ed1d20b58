//! Grouping of consecutive "dwell" blocks.
//!
//! Devotional fragments mark reflective passages with `class="dwell"`, often
//! as several adjacent blocks (or lists whose items carry the class). Each
//! maximal run of such direct children of the mount is wrapped in a single
//! `<div class="dwell-group">` so it renders as one unit:
//!
//! ```text
//! p  .dwell  .dwell  ul>li.dwell  p  .dwell
//! p  [dwell-group: .dwell .dwell ul]  p  [dwell-group: .dwell]
//! ```
//!
//! Whitespace text and comments between two members travel with the run.
//! Anything else ends it. The root is marked with [`GROUPED_MARKER`] so the
//! pass runs once per injected fragment.

use crate::dom::{Document, NodeData, NodeId};

pub const DWELL_CLASS: &str = "dwell";
pub const GROUP_CLASS: &str = "dwell-group";
pub const GROUPED_MARKER: &str = "data-dwell-grouped";

fn is_member(doc: &Document, node: NodeId) -> bool {
    if doc.has_class(node, DWELL_CLASS) {
        return true;
    }
    let is_list = doc.is_element(node, "ul") || doc.is_element(node, "ol");
    is_list
        && doc
            .descendants(node)
            .into_iter()
            .any(|d| doc.has_class(d, DWELL_CLASS))
}

fn is_transparent(doc: &Document, node: NodeId) -> bool {
    match doc.data(node) {
        NodeData::Text(t) => t.trim().is_empty(),
        NodeData::Comment(_) => true,
        _ => false,
    }
}

/// Wrap dwell runs among the direct children of `root`. Returns the number
/// of groups created; `0` when `root` was already grouped.
pub fn group(doc: &mut Document, root: NodeId) -> usize {
    if doc.attr(root, GROUPED_MARKER).is_some() {
        return 0;
    }
    let children = doc.children(root).to_vec();
    let mut groups = 0;
    let mut i = 0;
    while i < children.len() {
        if !is_member(doc, children[i]) {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i;
        let mut j = i + 1;
        while j < children.len() {
            if is_member(doc, children[j]) {
                end = j;
            } else if !is_transparent(doc, children[j]) {
                break;
            }
            j += 1;
        }

        let wrapper = doc.create_element("div");
        doc.set_attr(wrapper, "class", GROUP_CLASS);
        doc.insert_before(root, wrapper, children[start]);
        for &n in &children[start..=end] {
            doc.append_child(wrapper, n);
        }
        groups += 1;
        i = end + 1;
    }
    doc.set_attr(root, GROUPED_MARKER, "1");
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mounted(html: &str) -> (Document, NodeId) {
        let doc = Document::parse(&format!("<div id=\"m\">{html}</div>")).unwrap();
        let m = doc.element_by_id(doc.root(), "m").unwrap();
        (doc, m)
    }

    #[test]
    fn wraps_consecutive_blocks_with_whitespace() {
        let (mut doc, m) = mounted(r#"<p>a</p><div class="dwell">1</div>
<div class="dwell">2</div><p>b</p>"#);
        assert_eq!(group(&mut doc, m), 1);
        assert_eq!(
            doc.inner_html(m),
            "<p>a</p><div class=\"dwell-group\"><div class=\"dwell\">1</div>\n<div class=\"dwell\">2</div></div><p>b</p>"
        );
    }

    #[test]
    fn lists_with_dwell_items_join_the_run() {
        let (mut doc, m) = mounted(
            r#"<div class="dwell">1</div><ul><li class="dwell">x</li></ul><ul><li>plain</li></ul>"#,
        );
        assert_eq!(group(&mut doc, m), 1);
        let group_el = doc.elements_by_class(m, GROUP_CLASS)[0];
        assert_eq!(doc.element_children(group_el).len(), 2);
        assert_eq!(doc.element_children(m).len(), 2);
    }

    #[test]
    fn trailing_whitespace_stays_outside() {
        let (mut doc, m) = mounted("<div class=\"dwell\">1</div>\n<p>x</p>");
        group(&mut doc, m);
        assert_eq!(
            doc.inner_html(m),
            "<div class=\"dwell-group\"><div class=\"dwell\">1</div></div>\n<p>x</p>"
        );
    }

    #[test]
    fn separate_runs_get_separate_groups() {
        let (mut doc, m) =
            mounted(r#"<div class="dwell">1</div><p>x</p><div class="dwell">2</div>"#);
        assert_eq!(group(&mut doc, m), 2);
    }

    #[test]
    fn second_run_is_noop() {
        let (mut doc, m) = mounted(r#"<div class="dwell">1</div>"#);
        group(&mut doc, m);
        let once = doc.inner_html(m);
        assert_eq!(group(&mut doc, m), 0);
        assert_eq!(doc.inner_html(m), once);
    }

    #[test]
    fn nested_dwell_blocks_are_not_grouped() {
        let (mut doc, m) = mounted(r#"<section><div class="dwell">1</div></section>"#);
        assert_eq!(group(&mut doc, m), 0);
    }

    #[derive(Debug, Clone, Copy)]
    enum Block {
        Plain,
        Dwell,
        Space,
    }

    fn block_strategy() -> impl Strategy<Value = Block> {
        prop_oneof![Just(Block::Plain), Just(Block::Dwell), Just(Block::Space)]
    }

    proptest! {
        #[test]
        fn grouping_preserves_order_and_never_leaves_adjacent_groups(
            blocks in prop::collection::vec(block_strategy(), 0..16)
        ) {
            let mut html = String::new();
            for (i, b) in blocks.iter().enumerate() {
                match b {
                    Block::Plain => html.push_str(&format!("<p>p{i}</p>")),
                    Block::Dwell => html.push_str(&format!("<div class=\"dwell\">d{i}</div>")),
                    Block::Space => html.push(' '),
                }
            }
            let (mut doc, m) = mounted(&html);
            let before = doc.text_content(m);
            group(&mut doc, m);
            prop_assert_eq!(doc.text_content(m), before);

            let kids = doc.children(m).to_vec();
            let significant: Vec<NodeId> = kids
                .into_iter()
                .filter(|k| !is_transparent(&doc, *k))
                .collect();
            for pair in significant.windows(2) {
                let both = doc.has_class(pair[0], GROUP_CLASS) && doc.has_class(pair[1], GROUP_CLASS);
                prop_assert!(!both);
            }
            for k in &significant {
                prop_assert!(!doc.has_class(*k, DWELL_CLASS));
            }
        }
    }
}
