//! Binding of interactive word-study elements.
//!
//! A bound `.ws` element carries `data-ws-bound="1"` and, when it can be
//! derived, a `data-ws-doc` pointing at its study. Binding is what makes an
//! element respond to hover and click; the marker keeps repeated binding
//! (render signal plus mutation fallback) from doing the work twice.

use super::EnhancementContext;
use super::word_study::WS_CLASS;
use crate::dom::{Document, NodeId};
use crate::naming::normalize_strongs_ref;

pub const BOUND_ATTR: &str = "data-ws-bound";

/// Bind every unbound `.ws` element below `root`. Returns how many were newly bound.
pub fn bind(doc: &mut Document, root: NodeId, ctx: &EnhancementContext) -> usize {
    let mut bound = 0;
    for el in doc.elements_by_class(root, WS_CLASS) {
        if doc.attr(el, BOUND_ATTR).is_some() {
            continue;
        }
        if doc.attr(el, "data-ws-doc").is_none() {
            let href = doc
                .attr(el, "data-ws")
                .and_then(normalize_strongs_ref)
                .and_then(|r| ctx.word_study_doc(&r));
            if let Some(href) = href {
                doc.set_attr(el, "data-ws-doc", &href);
            }
        }
        doc.set_attr(el, BOUND_ATTR, "1");
        bound += 1;
    }
    bound
}
