//! In-memory document tree for the shell page and fetched fragments.
//!
//! The viewer never talks to a real browser DOM. The shell page, every
//! fetched fragment, and every enhancement pass operate on a [`Document`]:
//! a flat arena of nodes addressed by [`NodeId`]. Detached nodes stay in the
//! arena until the document is dropped, which keeps ids stable while passes
//! rewrite the tree.
//!
//! ## Parsing
//!
//! [`Document::parse`] is a lenient HTML reader built on `quick-xml`:
//!
//! - void elements (`<br>`, `<img>`, `<col>`, ...) never open a scope
//! - an end tag closes the nearest open element with the same name; stray
//!   end tags are ignored
//! - named HTML5 entities and numeric references are resolved
//! - `<!DOCTYPE>`, processing instructions and XML declarations are dropped
//!
//! It is not a conforming HTML5 parser. Content fragments are generated
//! documents with well-formed structure; the leniency exists for the usual
//! hand-edited slips, not for tag soup.
//!
//! ## Serialization
//!
//! [`Document::inner_html`] and [`Document::outer_html`] write HTML back out
//! with attribute order preserved, so tests can assert on exact markup.

use once_cell::sync::Lazy;
use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use std::borrow::Cow;
use thiserror::Error;

static BARE_AMPERSAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+;|#[xX][0-9a-fA-F]+;|[A-Za-z][A-Za-z0-9]*;)?").unwrap()
});

#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("HTML parse error at byte {offset}: {message}")]
    Parse { offset: u64, message: String },
}

/// Handle to a node inside one [`Document`]. Ids are not portable between documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lower-cased tag name.
    pub name: String,
    /// Attributes in source order, names lower-cased.
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeData::Element(Element {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id) == Some(name)
    }

    /// Text of a text node; `None` for every other node kind.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: String) {
        if let NodeData::Text(t) = &mut self.nodes[id.0].data {
            *t = text;
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(k, _)| k != name);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.element(id).is_none() || self.has_class(id, class) {
            return;
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {}", existing.trim(), class)
            }
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &value);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.attr(id, "class") else {
            return;
        };
        let kept: Vec<&str> = existing
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        let value = kept.join(" ");
        if value.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", &value);
        }
    }

    /// Value of one declaration in the inline `style` attribute.
    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        parse_style(self.attr(id, "style")?)
            .into_iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    /// Set (`Some`) or clear (`None`) one inline style declaration.
    ///
    /// An empty declaration list removes the `style` attribute entirely, so
    /// clearing the last property restores the element's original markup.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: Option<&str>) {
        let mut decls = self.attr(id, "style").map(parse_style).unwrap_or_default();
        decls.retain(|(k, _)| k != property);
        if let Some(v) = value {
            decls.push((property.to_string(), v.to_string()));
        }
        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            let joined = decls
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attr(id, "style", &joined);
        }
    }

    // =========================================================================
    // Tree mutation
    // =========================================================================

    /// Remove a node from its parent. The node and its subtree stay usable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` before `reference`. Appends when `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        match siblings.iter().position(|c| *c == reference) {
            Some(pos) => siblings.insert(pos, child),
            None => siblings.push(child),
        }
        self.nodes[child.0].parent = Some(parent);
    }

    /// Replace `node` with `replacements`, in order, at the same position.
    pub fn replace_with(&mut self, node: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        for &r in replacements {
            self.insert_before(parent, r, node);
        }
        self.detach(node);
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for c in children {
            self.nodes[c.0].parent = None;
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All nodes below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |n| self.parent(*n))
    }

    /// Nearest element, starting at `id` itself, for which `pred` holds.
    pub fn closest(&self, id: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| self.element(*n).is_some() && pred(self, *n))
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    pub fn element_by_id(&self, scope: NodeId, id_value: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id_value))
    }

    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.is_element(*n, tag))
            .collect()
    }

    pub fn elements_by_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    // =========================================================================
    // Cross-document copy
    // =========================================================================

    /// Deep-copy `src_node` from another document into this one (detached).
    pub fn import(&mut self, src: &Document, src_node: NodeId) -> NodeId {
        let copy = self.push(src.data(src_node).clone());
        for &child in src.children(src_node) {
            let c = self.import(src, child);
            self.append_child(copy, c);
        }
        copy
    }

    /// Parse `html` and append the resulting nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, HtmlError> {
        let parsed = Document::parse(html)?;
        let mut added = Vec::new();
        for &child in parsed.children(parsed.root()) {
            let imported = self.import(&parsed, child);
            self.append_child(parent, imported);
            added.push(imported);
        }
        Ok(added)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .tag_name(id)
            .is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
        for &c in self.children(id) {
            self.write_node(c, raw, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match self.data(id) {
            NodeData::Document => out.push_str(&self.inner_html(id)),
            NodeData::Text(t) if raw_text => out.push_str(t),
            NodeData::Text(t) => out.push_str(&escape_text(t)),
            NodeData::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (k, v) in &el.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(v));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    return;
                }
                out.push_str(&self.inner_html(id));
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    pub fn parse(html: &str) -> Result<Document, HtmlError> {
        let html = escape_bare_ampersands(html);
        let html = escape_bare_less_than(&html);
        let mut doc = Document::new();
        let mut reader = Reader::from_str(&html);
        {
            let config = reader.config_mut();
            config.trim_text(false);
            config.check_end_names = false;
            config.allow_unmatched_ends = true;
        }
        let mut stack: Vec<NodeId> = vec![doc.root()];

        loop {
            let event = reader.read_event().map_err(|err| HtmlError::Parse {
                offset: reader.buffer_position() as u64,
                message: err.to_string(),
            })?;
            let parent = *stack.last().unwrap_or(&NodeId(0));
            match event {
                Event::Start(e) => {
                    let el = doc.element_from_start(&reader, &e);
                    doc.append_child(parent, el);
                    let is_void = doc
                        .tag_name(el)
                        .is_some_and(|t| VOID_ELEMENTS.contains(&t));
                    if !is_void {
                        stack.push(el);
                    }
                }
                Event::Empty(e) => {
                    let el = doc.element_from_start(&reader, &e);
                    doc.append_child(parent, el);
                }
                Event::End(e) => {
                    let name = decode_name(&reader, e.name().as_ref());
                    if let Some(pos) = stack
                        .iter()
                        .rposition(|n| doc.tag_name(*n) == Some(name.as_str()))
                    {
                        if pos > 0 {
                            stack.truncate(pos);
                        }
                    }
                }
                Event::Text(e) => {
                    let text = e.decode().map_err(|err| HtmlError::Parse {
                        offset: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    doc.push_text(parent, &text);
                }
                Event::CData(e) => {
                    let text = reader.decoder().decode(&e).map_err(|err| HtmlError::Parse {
                        offset: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    doc.push_text(parent, &text);
                }
                Event::GeneralRef(e) => {
                    let name = e.decode().map_err(|err| HtmlError::Parse {
                        offset: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    let reference = format!("&{name};");
                    let resolved = decode_entities(&reference);
                    doc.push_text(parent, &resolved);
                }
                Event::Comment(e) => {
                    let text = reader.decoder().decode(&e).unwrap_or_default();
                    let c = doc.push(NodeData::Comment(text.into_owned()));
                    doc.append_child(parent, c);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(doc)
    }

    fn element_from_start(&mut self, reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> NodeId {
        let name = decode_name(reader, e.name().as_ref());
        let id = self.create_element(&name);
        for attr in e.html_attributes().flatten() {
            let key = match reader.decoder().decode(attr.key.as_ref()) {
                Ok(k) => k.to_ascii_lowercase(),
                Err(_) => continue,
            };
            let raw = match reader.decoder().decode(&attr.value) {
                Ok(v) => v.into_owned(),
                Err(_) => continue,
            };
            self.set_attr(id, &key, &decode_entities(&raw));
        }
        id
    }

    /// Append text to `parent`, merging with a trailing text node.
    fn push_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.children(parent).last() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        let t = self.create_text(text);
        self.append_child(parent, t);
    }
}

fn decode_name(reader: &Reader<&[u8]>, raw: &[u8]) -> String {
    reader
        .decoder()
        .decode(raw)
        .map(|n| n.to_ascii_lowercase())
        .unwrap_or_default()
}

/// `a & b` is legal HTML but not XML; turn lone ampersands into `&amp;`.
fn escape_bare_ampersands(html: &str) -> Cow<'_, str> {
    BARE_AMPERSAND_RE.replace_all(html, |caps: &regex::Captures<'_>| match caps.get(1) {
        Some(reference) => format!("&{}", reference.as_str()),
        None => "&amp;".to_string(),
    })
}

/// `1 < 2` is text in HTML; a `<` that cannot start a tag, comment or
/// declaration becomes `&lt;`.
fn escape_bare_less_than(html: &str) -> Cow<'_, str> {
    let bytes = html.as_bytes();
    let is_bare = |i: usize| {
        bytes[i] == b'<'
            && !bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
    };
    if !(0..bytes.len()).any(is_bare) {
        return Cow::Borrowed(html);
    }
    let mut out = String::with_capacity(html.len() + 8);
    for (i, c) in html.char_indices() {
        if is_bare(i) {
            out.push_str("&lt;");
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Resolve HTML5 named entities and numeric references; unknown ones stay literal.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    unescape_with(raw, |name| {
        resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
    })
    .map(|s| s.into_owned())
    .unwrap_or_else(|_| raw.to_string())
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            let v = v.trim();
            (!k.is_empty()).then(|| (k.to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
