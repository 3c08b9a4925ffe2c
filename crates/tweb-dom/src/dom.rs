#![forbid(unsafe_code)]

//! Arena document tree.

use ahash::AHashMap;
use tracing::trace;

use crate::DomError;
use crate::parse::{escape_attr, escape_text, is_void_tag, parse_fragment};

/// Index of a node in the arena, tagged with the generation of its slot.
///
/// Slots of released subtrees are reused; an id minted before the release
/// no longer matches the slot's generation and resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    /// Raw arena slot.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

/// An element with ordered attributes and a live form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    value: String,
}

impl Element {
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attributes in source order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Live value of a form control (empty for other elements).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        self.attrs.len() != before
    }

    fn classes(&self) -> impl Iterator<Item = &str> + '_ {
        self.attr("class").unwrap_or_default().split_whitespace()
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    generation: u32,
}

/// The page model.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    /// Released slots, ready for reuse.
    free: Vec<usize>,
    root: NodeId,
    id_index: AHashMap<String, NodeId>,
    focused: Option<NodeId>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// An empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
                generation: 0,
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            id_index: AHashMap::new(),
            focused: None,
        }
    }

    /// Parse a full page body.
    pub fn parse(html: &str) -> Result<Self, DomError> {
        parse_fragment(html)
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn slot(&self, node: NodeId) -> Option<&Node> {
        self.nodes
            .get(node.index)
            .filter(|slot| slot.generation == node.generation)
    }

    fn slot_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(node.index)
            .filter(|slot| slot.generation == node.generation)
    }

    /// Arena slots in use, connected or not.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    #[must_use]
    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.slot(node).map(|n| &n.kind)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Element children only.
    #[must_use]
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|&child| self.element(child).is_some())
            .collect()
    }

    #[must_use]
    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.kind(node)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.slot_mut(node)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    #[must_use]
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(Element::tag)
    }

    /// Whether `node` has a path to the document root.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Whether `node` is `ancestor` or lies below it.
    #[must_use]
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Connected element carrying `id`.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    // --- attributes -------------------------------------------------------

    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(name)
    }

    #[must_use]
    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Attribute used as a boolean flag: present and not `"false"`.
    #[must_use]
    pub fn flag(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name)
            .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        element.set_attr(name, value);
        if name == "id" {
            self.rebuild_id_index();
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        let removed = self
            .element_mut(node)
            .is_some_and(|element| element.remove_attr(name));
        if removed && name == "id" {
            self.rebuild_id_index();
        }
    }

    // --- classes ----------------------------------------------------------

    #[must_use]
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .is_some_and(|element| element.classes().any(|c| c == class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        self.set_class(node, class, true);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        self.set_class(node, class, false);
    }

    /// Add or remove `class`. Other classes keep their order.
    pub fn set_class(&mut self, node: NodeId, class: &str, on: bool) {
        if class.is_empty() || self.has_class(node, class) == on {
            return;
        }
        let Some(element) = self.element_mut(node) else {
            return;
        };
        let mut tokens: Vec<String> = element.classes().map(str::to_string).collect();
        if on {
            tokens.push(class.to_string());
        } else {
            tokens.retain(|c| c != class);
        }
        if tokens.is_empty() {
            element.remove_attr("class");
        } else {
            element.set_attr("class", &tokens.join(" "));
        }
    }

    // --- form state -------------------------------------------------------

    /// Live value; empty for non-elements.
    #[must_use]
    pub fn value(&self, node: NodeId) -> &str {
        self.element(node).map(Element::value).unwrap_or_default()
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element.value = value.to_string();
        }
    }

    #[must_use]
    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.has_attr(node, "disabled")
    }

    pub fn set_disabled(&mut self, node: NodeId, disabled: bool) {
        if disabled {
            self.set_attr(node, "disabled", "");
        } else {
            self.remove_attr(node, "disabled");
        }
    }

    #[must_use]
    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.has_attr(node, "hidden")
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        if hidden {
            self.set_attr(node, "hidden", "");
        } else {
            self.remove_attr(node, "hidden");
        }
    }

    /// Whether the node or any ancestor is hidden.
    #[must_use]
    pub fn is_hidden_in_tree(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.is_hidden(current) {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub(crate) fn sync_initial_value(&mut self, node: NodeId) {
        let value = match self.tag_name(node) {
            Some("input") => self.attr(node, "value").unwrap_or_default().to_string(),
            Some("textarea") => self.text_content(node),
            Some("select") => {
                let options: Vec<NodeId> = self
                    .descendants(node)
                    .into_iter()
                    .filter(|&n| self.tag_name(n) == Some("option"))
                    .collect();
                let chosen = options
                    .iter()
                    .copied()
                    .find(|&n| self.has_attr(n, "selected"))
                    .or_else(|| options.first().copied());
                match chosen {
                    Some(option) => self
                        .attr(option, "value")
                        .map(str::to_string)
                        .unwrap_or_else(|| self.text_content(option)),
                    None => String::new(),
                }
            }
            _ => return,
        };
        self.set_value(node, &value);
    }

    // --- traversal --------------------------------------------------------

    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for current in std::iter::once(node).chain(self.descendants(node)) {
            if let Some(NodeKind::Text(text)) = self.kind(current) {
                out.push_str(text);
            }
        }
        out
    }

    /// Nodes below `node` in document order, excluding `node` itself.
    #[must_use]
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Elements carrying attribute `name` in `scope`'s subtree, `scope`
    /// included, in document order.
    #[must_use]
    pub fn elements_with_attr(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        std::iter::once(scope)
            .chain(self.descendants(scope))
            .filter(|&n| self.has_attr(n, name))
            .collect()
    }

    /// Nearest inclusive ancestor matching `pred`.
    pub fn closest(&self, node: NodeId, pred: impl Fn(&Dom, NodeId) -> bool) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if pred(self, current) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Nearest inclusive ancestor carrying attribute `name`.
    #[must_use]
    pub fn closest_with_attr(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.closest(node, |dom, n| dom.has_attr(n, name))
    }

    // --- mutation ---------------------------------------------------------

    fn create_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = if let Some(index) = self.free.pop()
            && let Some(slot) = self.nodes.get_mut(index)
        {
            slot.parent = parent;
            slot.children.clear();
            slot.kind = kind;
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.nodes.push(Node {
                parent,
                children: Vec::new(),
                kind,
                generation: 0,
            });
            NodeId {
                index: self.nodes.len() - 1,
                generation: 0,
            }
        };
        if let Some(parent) = parent
            && let Some(slot) = self.slot_mut(parent)
        {
            slot.children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        let element = Element {
            tag: tag.to_string(),
            attrs,
            value: String::new(),
        };
        let id = self.create_node(Some(parent), NodeKind::Element(element));
        if let Some(key) = self.attr(id, "id").filter(|v| !v.is_empty()) {
            let key = key.to_string();
            self.id_index.entry(key).or_insert(id);
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeKind::Text(text))
    }

    /// Deep-copy `node` of `src` into this arena, detached.
    fn import(&mut self, src: &Dom, node: NodeId) -> NodeId {
        let kind_of = |n: NodeId| {
            src.kind(n)
                .cloned()
                .unwrap_or_else(|| NodeKind::Text(String::new()))
        };
        let top = self.create_node(None, kind_of(node));
        let mut pending = vec![(node, top)];
        while let Some((original, copy)) = pending.pop() {
            for &child in src.children(original) {
                let child_copy = self.create_node(Some(copy), kind_of(child));
                pending.push((child, child_copy));
            }
        }
        top
    }

    /// Return a detached subtree's slots to the free list. Ids into it go
    /// stale.
    fn release(&mut self, node: NodeId) {
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if current == self.root {
                continue;
            }
            let Some(slot) = self.slot_mut(current) else {
                continue;
            };
            pending.append(&mut slot.children);
            slot.parent = None;
            slot.kind = NodeKind::Text(String::new());
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
        }
    }

    /// Replace the element carrying `target_id` with the top-level nodes of
    /// `html`.
    ///
    /// Returns `Ok(None)` when no connected element has that id. The markup
    /// is parsed before anything is touched, so a parse error leaves the page
    /// unchanged. On success returns the inserted top-level nodes.
    pub fn replace_with_html(
        &mut self,
        target_id: &str,
        html: &str,
    ) -> Result<Option<Vec<NodeId>>, DomError> {
        let fragment = parse_fragment(html)?;
        let Some(target) = self.by_id(target_id) else {
            return Ok(None);
        };
        let Some(parent) = self.parent(target) else {
            return Ok(None);
        };

        let inserted: Vec<NodeId> = fragment
            .children(fragment.root())
            .iter()
            .map(|&top| self.import(&fragment, top))
            .collect();
        for &node in &inserted {
            if let Some(slot) = self.slot_mut(node) {
                slot.parent = Some(parent);
            }
        }
        if let Some(slot) = self.slot_mut(parent)
            && let Some(pos) = slot.children.iter().position(|&c| c == target)
        {
            slot.children.splice(pos..=pos, inserted.iter().copied());
        }
        self.release(target);

        trace!(target_id, inserted = inserted.len(), "replaced subtree");
        self.after_structure_change();
        Ok(Some(inserted))
    }

    /// Append the top-level nodes of `html` to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, DomError> {
        let fragment = parse_fragment(html)?;
        let inserted: Vec<NodeId> = fragment
            .children(fragment.root())
            .iter()
            .map(|&top| self.import(&fragment, top))
            .collect();
        for &node in &inserted {
            if let Some(slot) = self.slot_mut(node) {
                slot.parent = Some(parent);
            }
        }
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.extend(inserted.iter().copied());
        }
        self.after_structure_change();
        Ok(inserted)
    }

    /// Detach `node` from its parent and release its subtree.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.retain(|&c| c != node);
        }
        self.release(node);
        self.after_structure_change();
    }

    fn after_structure_change(&mut self) {
        self.rebuild_id_index();
        if let Some(focused) = self.focused
            && !self.is_connected(focused)
        {
            self.focused = None;
        }
    }

    fn rebuild_id_index(&mut self) {
        let mut next = AHashMap::new();
        for node in self.descendants(self.root) {
            if let Some(id) = self.attr(node, "id").filter(|v| !v.is_empty()) {
                next.entry(id.to_string()).or_insert(node);
            }
        }
        self.id_index = next;
    }

    // --- focus ------------------------------------------------------------

    /// Move focus to a connected element. Returns whether focus moved.
    pub fn focus(&mut self, node: NodeId) -> bool {
        if self.element(node).is_none() || !self.is_connected(node) {
            return false;
        }
        self.focused = Some(node);
        true
    }

    #[must_use]
    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    /// Whether the element can take keyboard focus.
    #[must_use]
    pub fn is_focusable(&self, node: NodeId) -> bool {
        let Some(tag) = self.tag_name(node) else {
            return false;
        };
        let natively = match tag {
            "input" => self.attr(node, "type") != Some("hidden"),
            "select" | "textarea" | "button" => true,
            "a" => self.has_attr(node, "href"),
            _ => false,
        };
        let tabbable = self.attr(node, "tabindex").is_some_and(|t| t.trim() != "-1");
        (natively || tabbable) && !self.is_disabled(node) && !self.is_hidden_in_tree(node)
    }

    /// First focusable element below `scope`, in document order.
    #[must_use]
    pub fn first_focusable_in(&self, scope: NodeId) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&n| self.is_focusable(n))
    }

    // --- serialization ----------------------------------------------------

    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, false, &mut out);
        out
    }

    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let raw = matches!(self.tag_name(node), Some("script" | "style"));
        let mut out = String::new();
        for &child in self.children(node) {
            self.write_node(child, raw, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, raw_text: bool, out: &mut String) {
        let mut pending = vec![Emit::Node(node, raw_text)];
        while let Some(step) = pending.pop() {
            let (node, raw_text) = match step {
                Emit::Node(node, raw_text) => (node, raw_text),
                Emit::Close(tag) => {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    continue;
                }
            };
            match self.kind(node) {
                Some(NodeKind::Document) => {
                    pending.extend(self.children(node).iter().rev().map(|&c| Emit::Node(c, false)));
                }
                Some(NodeKind::Text(text)) => {
                    if raw_text {
                        out.push_str(text);
                    } else {
                        out.push_str(&escape_text(text));
                    }
                }
                Some(NodeKind::Element(element)) => {
                    out.push('<');
                    out.push_str(&element.tag);
                    for (name, value) in &element.attrs {
                        out.push(' ');
                        out.push_str(name);
                        if !value.is_empty() {
                            out.push_str("=\"");
                            out.push_str(&escape_attr(value));
                            out.push('"');
                        }
                    }
                    out.push('>');
                    if is_void_tag(&element.tag) {
                        continue;
                    }
                    let raw = matches!(element.tag.as_str(), "script" | "style");
                    pending.push(Emit::Close(&element.tag));
                    pending.extend(self.children(node).iter().rev().map(|&c| Emit::Node(c, raw)));
                }
                None => {}
            }
        }
    }
}

/// Serialization work list entry.
enum Emit<'a> {
    Node(NodeId, bool),
    Close(&'a str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn page() -> Dom {
        Dom::parse(
            r#"<main id="page"><div id="a">A</div><div id="b"><input id="bi" value="x"></div><div id="c">C</div></main>"#,
        )
        .unwrap()
    }

    #[test]
    fn replace_keeps_position_and_detaches_old() {
        let mut dom = page();
        let old_b = dom.by_id("b").unwrap();
        let inserted = dom
            .replace_with_html("b", r#"<section id="b">new</section>"#)
            .unwrap()
            .unwrap();
        assert_eq!(inserted.len(), 1);
        let main = dom.by_id("page").unwrap();
        let ids: Vec<_> = dom
            .element_children(main)
            .into_iter()
            .map(|n| dom.attr(n, "id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(dom.tag_name(dom.by_id("b").unwrap()), Some("section"));
        assert!(!dom.is_connected(old_b));
        assert!(dom.by_id("bi").is_none());
    }

    #[test]
    fn replace_missing_target_is_none_and_unchanged() {
        let mut dom = page();
        let before = dom.outer_html(dom.root());
        assert_eq!(dom.replace_with_html("zzz", "<p>x</p>").unwrap(), None);
        assert_eq!(dom.outer_html(dom.root()), before);
    }

    #[test]
    fn parse_error_leaves_page_untouched() {
        let mut dom = page();
        let before = dom.outer_html(dom.root());
        assert!(dom.replace_with_html("a", "<div id=\"a").is_err());
        assert_eq!(dom.outer_html(dom.root()), before);
    }

    #[test]
    fn replace_with_several_nodes_and_empty_markup() {
        let mut dom = page();
        dom.replace_with_html("a", r#"<p id="p1"></p>text<p id="p2"></p>"#)
            .unwrap();
        let main = dom.by_id("page").unwrap();
        assert_eq!(dom.children(main).len(), 5);
        dom.replace_with_html("c", "").unwrap();
        assert!(dom.by_id("c").is_none());
        assert_eq!(dom.children(main).len(), 4);
    }

    #[test]
    fn focus_is_cleared_when_node_detaches() {
        let mut dom = page();
        let input = dom.by_id("bi").unwrap();
        assert!(dom.focus(input));
        dom.replace_with_html("b", r#"<div id="b"></div>"#).unwrap();
        assert_eq!(dom.focused(), None);
        assert!(!dom.focus(input));
    }

    #[test]
    fn first_id_in_document_order_wins() {
        let dom = Dom::parse(r#"<i id="d" class="one"></i><i id="d" class="two"></i>"#).unwrap();
        assert!(dom.has_class(dom.by_id("d").unwrap(), "one"));
    }

    #[test]
    fn set_attr_id_reindexes() {
        let mut dom = page();
        let a = dom.by_id("a").unwrap();
        dom.set_attr(a, "id", "renamed");
        assert_eq!(dom.by_id("renamed"), Some(a));
        assert!(dom.by_id("a").is_none());
    }

    #[test]
    fn class_helpers_keep_other_classes() {
        let mut dom = Dom::parse(r#"<tr id="r" class="x y"></tr>"#).unwrap();
        let r = dom.by_id("r").unwrap();
        dom.add_class(r, "sel");
        dom.add_class(r, "sel");
        assert_eq!(dom.attr(r, "class"), Some("x y sel"));
        dom.remove_class(r, "x");
        assert_eq!(dom.attr(r, "class"), Some("y sel"));
        dom.set_class(r, "y", false);
        dom.set_class(r, "sel", false);
        assert_eq!(dom.attr(r, "class"), None);
    }

    #[test]
    fn first_focusable_skips_hidden_and_disabled() {
        let dom = Dom::parse(
            r#"<div id="pop"><input type="hidden" name="h"><input id="d" disabled><div hidden><input id="h2"></div><span>x</span><select id="s"><option value="1">one</option></select></div>"#,
        )
        .unwrap();
        let pop = dom.by_id("pop").unwrap();
        assert_eq!(dom.first_focusable_in(pop), dom.by_id("s"));
        assert_eq!(dom.value(dom.by_id("s").unwrap()), "1");
    }

    #[test]
    fn select_value_prefers_selected_option() {
        let dom = Dom::parse(
            r#"<select id="s"><option value="a">A</option><option selected>B</option></select>"#,
        )
        .unwrap();
        assert_eq!(dom.value(dom.by_id("s").unwrap()), "B");
    }

    #[test]
    fn closest_and_attr_queries() {
        let dom = Dom::parse(
            r#"<div data-widget="grid" id="g"><table><tr data-row-key="k1"><td id="cell">1</td></tr></table></div>"#,
        )
        .unwrap();
        let cell = dom.by_id("cell").unwrap();
        let row = dom.closest_with_attr(cell, "data-row-key").unwrap();
        assert_eq!(dom.attr(row, "data-row-key"), Some("k1"));
        let grid = dom.by_id("g").unwrap();
        assert_eq!(dom.elements_with_attr(grid, "data-widget"), vec![grid]);
        assert!(dom.is_within(cell, grid));
    }

    #[test]
    fn outer_html_reproduces_markup() {
        let html = r#"<div id="x" class="a b" hidden><br><p title="&quot;q&quot;">1 &lt; 2</p></div>"#;
        let dom = Dom::parse(html).unwrap();
        assert_eq!(dom.outer_html(dom.root()), html);
    }

    #[test]
    fn append_and_remove() {
        let mut dom = page();
        let main = dom.by_id("page").unwrap();
        dom.append_html(main, r#"<b id="tail"></b>"#).unwrap();
        let tail = dom.by_id("tail").unwrap();
        assert_eq!(dom.children(main).last(), Some(&tail));
        dom.remove(tail);
        assert!(dom.by_id("tail").is_none());
        assert!(!dom.is_connected(tail));
    }

    #[test]
    fn repeated_patches_reuse_released_slots() {
        let mut dom = page();
        let baseline = dom.nodes.len();
        let first = dom.by_id("b").unwrap();
        for round in 0..2000 {
            let html = format!(r#"<div id="b"><input id="bi" value="{round}"><span>{round}</span></div>"#);
            dom.replace_with_html("b", &html).unwrap().unwrap();
        }
        assert!(dom.nodes.len() <= baseline + 8, "arena grew to {}", dom.nodes.len());
        assert_eq!(dom.allocated() + dom.free.len(), dom.nodes.len());
        assert_eq!(dom.value(dom.by_id("bi").unwrap()), "1999");

        // The first id's slot has been reused; the old handle must not see it.
        assert!(!dom.is_connected(first));
        assert_eq!(dom.kind(first), None);
        assert!(!dom.focus(first));
        assert!(dom.by_id("b").is_some());
    }

    #[test]
    fn removed_subtree_slots_are_released() {
        let mut dom = page();
        let before = dom.allocated();
        let b = dom.by_id("b").unwrap();
        let bi = dom.by_id("bi").unwrap();
        dom.remove(b);
        assert_eq!(dom.allocated(), before - 2);
        assert!(dom.children(b).is_empty());
        assert_eq!(dom.parent(bi), None);
    }

    #[test]
    fn deep_nesting_is_walked_without_recursion() {
        let depth = 20_000;
        let mut dom = page();
        let html = format!(r#"<div id="b">{}x</div>"#, "<div>".repeat(depth));
        dom.replace_with_html("b", &html).unwrap().unwrap();
        let b = dom.by_id("b").unwrap();
        assert_eq!(dom.text_content(b), "x");
        assert_eq!(dom.descendants(b).len(), depth + 1);
        let markup = dom.outer_html(b);
        assert!(markup.starts_with(r#"<div id="b"><div><div>"#));
        assert!(markup.ends_with("</div></div>"));
        assert_eq!(markup.matches("</div>").count(), depth + 1);

        dom.remove(b);
        assert!(dom.by_id("b").is_none());
    }

    proptest! {
        #[test]
        fn class_membership_follows_last_toggle(ops in proptest::collection::vec((0usize..3, any::<bool>()), 0..24)) {
            let names = ["stripe-even", "selected", "hover"];
            let mut dom = Dom::parse(r#"<tr id="r" class="keep"></tr>"#).unwrap();
            let r = dom.by_id("r").unwrap();
            let mut expected = [false; 3];
            for (idx, on) in ops {
                dom.set_class(r, names[idx], on);
                expected[idx] = on;
            }
            for (idx, name) in names.iter().enumerate() {
                prop_assert_eq!(dom.has_class(r, name), expected[idx]);
            }
            prop_assert!(dom.has_class(r, "keep"));
        }
    }
}
