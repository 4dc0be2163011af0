//! Arena-based XML tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` and all attribute records
//! in a `Vec<AttrData>`, both owned by an [`Arena`]. Nodes and attributes are
//! referenced by typed indices ([`NodeId`], [`AttrId`]) over `NonZeroU32`, so
//! `Option<NodeId>` costs nothing extra.
//!
//! Navigation links (parent, first/last child, siblings) are indices too.
//! Nothing is freed individually: detaching a node unlinks it but keeps its
//! storage until the arena is dropped, which keeps every index ever handed
//! out pointing at a live record.

mod node;

pub use node::NodeKind;

use std::num::NonZeroU32;

/// A typed index into the arena's node storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

/// A typed index into the arena's attribute storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct AttrId(NonZeroU32);

/// Converts a storage position into a non-zero index.
///
/// # Panics
///
/// Panics if `index` is 0 or does not fit in a `u32`. Position 0 of every
/// store is a placeholder, so neither can happen for a pushed record unless
/// the arena holds more than `u32::MAX` entries.
#[allow(clippy::expect_used)]
fn non_zero(index: usize) -> NonZeroU32 {
    u32::try_from(index)
        .ok()
        .and_then(NonZeroU32::new)
        .expect("arena index must be non-zero and fit in u32")
}

impl NodeId {
    fn from_index(index: usize) -> Self {
        Self(non_zero(index))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

impl AttrId {
    fn from_index(index: usize) -> Self {
        Self(non_zero(index))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Storage for a single node.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is, with its payload.
    pub kind: NodeKind,
    /// Parent node. `None` for the document node and for detached nodes.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// Storage for a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrData {
    /// The attribute name as written, including any prefix.
    pub name: String,
    /// The attribute value with references resolved.
    pub value: String,
    /// The element (or declaration) this attribute is attached to.
    pub owner: Option<NodeId>,
}

/// The node and attribute store behind a document.
///
/// Index 0 of both stores is an unused placeholder; index 1 of the node
/// store is the synthetic document node returned by [`Arena::root`].
#[derive(Debug, Clone)]
pub struct Arena {
    nodes: Vec<NodeData>,
    attrs: Vec<AttrData>,
    root: NodeId,
}

impl Arena {
    /// Creates an arena holding only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        let placeholder = AttrData {
            name: String::new(),
            value: String::new(),
            owner: None,
        };
        Self {
            nodes,
            attrs: vec![placeholder],
            root: NodeId::from_index(1),
        }
    }

    /// Returns the document node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the first element among the document node's children.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node(id).kind.is_element())
    }

    /// Returns the XML declaration node, if the document has one.
    #[must_use]
    pub fn declaration(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::Declaration { .. }))
    }

    /// Returns the record for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this arena.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the attribute record for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this arena.
    #[must_use]
    pub fn attr(&self, id: AttrId) -> &AttrData {
        &self.attrs[id.as_index()]
    }

    pub(crate) fn attr_mut(&mut self, id: AttrId) -> &mut AttrData {
        &mut self.attrs[id.as_index()]
    }

    // --- Node payload access ---

    /// Returns the name of an element, declaration or PI node.
    ///
    /// The declaration reports `"xml"`, its PI target.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            NodeKind::Declaration { .. } => Some("xml"),
            _ => None,
        }
    }

    /// Renames an element. Returns `false` (and changes nothing) for any
    /// other kind of node.
    pub fn set_node_name(&mut self, id: NodeId, new_name: impl Into<String>) -> bool {
        match &mut self.node_mut(id).kind {
            NodeKind::Element { name, .. } => {
                *name = new_name.into();
                true
            }
            _ => false,
        }
    }

    /// Returns the content of a text, CDATA, comment or PI node.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the first text child of `id`, if any.
    #[must_use]
    pub fn first_text_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .find(|&child| matches!(self.node(child).kind, NodeKind::Text { .. }))
    }

    /// Returns the value of an element: the content of its first text
    /// child, or `""` if it has none.
    #[must_use]
    pub fn element_value(&self, id: NodeId) -> &str {
        self.first_text_child(id)
            .and_then(|text| self.node_text(text))
            .unwrap_or("")
    }

    /// Replaces the value of an element.
    ///
    /// The first text child is rewritten in place. If there is none, a new
    /// text node is inserted as the first child. An empty value detaches
    /// every text child, so mixed content does not surface a later text
    /// node as the new value.
    pub fn set_element_value(&mut self, id: NodeId, value: &str) {
        match self.first_text_child(id) {
            Some(_) if value.is_empty() => {
                let texts: Vec<NodeId> = self
                    .children(id)
                    .filter(|&child| matches!(self.node(child).kind, NodeKind::Text { .. }))
                    .collect();
                for text in texts {
                    self.detach(text);
                }
            }
            Some(text) => {
                if let NodeKind::Text { content } = &mut self.node_mut(text).kind {
                    value.clone_into(content);
                }
            }
            None if value.is_empty() => {}
            None => {
                let text = self.create_node(NodeKind::text(value));
                self.prepend_child(id, text);
            }
        }
    }

    /// Returns the attribute ids of an element or declaration node.
    ///
    /// Returns an empty slice for every other kind of node.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[AttrId] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } | NodeKind::Declaration { attributes } => {
                attributes
            }
            _ => &[],
        }
    }

    /// Returns the value of the first attribute named `name` on `id`.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.find_attribute(id, name)
            .map(|attr| self.attr(attr).value.as_str())
    }

    /// Returns the id of the first attribute named `name` on `id`.
    #[must_use]
    pub fn find_attribute(&self, id: NodeId, name: &str) -> Option<AttrId> {
        self.attributes(id)
            .iter()
            .copied()
            .find(|&attr| self.attr(attr).name == name)
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            arena: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over the element children of `id` whose name is
    /// `name`, or over all element children when `name` is empty.
    pub fn child_elements<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id).filter(move |&child| match &self.node(child).kind {
            NodeKind::Element { name: n, .. } => name.is_empty() || n == name,
            _ => false,
        })
    }

    // --- Allocation and linking ---

    /// Allocates a new, unlinked node.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Allocates a new attribute record not yet attached to any node.
    pub fn create_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> AttrId {
        let index = self.attrs.len();
        self.attrs.push(AttrData {
            name: name.into(),
            value: value.into(),
            owner: None,
        });
        AttrId::from_index(index)
    }

    /// Appends an attribute record to an element or declaration node.
    ///
    /// Returns `false` (and leaves the record unattached) for any other
    /// kind of node.
    pub fn append_attribute(&mut self, id: NodeId, attr: AttrId) -> bool {
        debug_assert!(
            self.attr(attr).owner.is_none(),
            "attribute already belongs to an element"
        );
        match &mut self.node_mut(id).kind {
            NodeKind::Element { attributes, .. } | NodeKind::Declaration { attributes } => {
                attributes.push(attr);
            }
            _ => return false,
        }
        self.attr_mut(attr).owner = Some(id);
        true
    }

    /// Appends a child node to the end of a parent's child list.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `child` already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Inserts `new_child` immediately before `reference`.
    ///
    /// Does nothing if `reference` has no parent.
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) {
        debug_assert!(
            self.node(new_child).parent.is_none(),
            "new_child already has a parent; detach it first"
        );

        let Some(parent) = self.node(reference).parent else {
            return;
        };
        self.node_mut(new_child).parent = Some(parent);

        if let Some(prev) = self.node(reference).prev_sibling {
            self.node_mut(prev).next_sibling = Some(new_child);
            self.node_mut(new_child).prev_sibling = Some(prev);
        } else {
            self.node_mut(parent).first_child = Some(new_child);
        }

        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
    }

    /// Inserts a child node as the first child of a parent.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(first) = self.first_child(parent) {
            self.insert_before(first, child);
        } else {
            self.append_child(parent, child);
        }
    }

    /// Unlinks a node from its parent. The node stays allocated, and its
    /// own subtree stays attached to it.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        let node = self.node_mut(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Returns the number of allocated nodes, including the document node
    /// and detached nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Returns the number of allocated attribute records.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attrs.len() - 1
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the children of a node.
pub struct Children<'a> {
    arena: &'a Arena,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.arena.node(current).next_sibling;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(arena: &mut Arena, name: &str) -> NodeId {
        arena.create_node(NodeKind::element(name))
    }

    fn text(arena: &mut Arena, content: &str) -> NodeId {
        arena.create_node(NodeKind::text(content))
    }

    #[test]
    fn test_new_arena_has_document_node() {
        let arena = Arena::new();
        assert!(matches!(arena.node(arena.root()).kind, NodeKind::Document));
        assert_eq!(arena.node_count(), 1);
        assert_eq!(arena.attribute_count(), 0);
        assert_eq!(arena.root_element(), None);
        assert_eq!(arena.declaration(), None);
    }

    #[test]
    fn test_append_children_links_siblings() {
        let mut arena = Arena::new();
        let root = arena.root();
        let a = text(&mut arena, "A");
        let b = text(&mut arena, "B");
        let c = text(&mut arena, "C");

        arena.append_child(root, a);
        arena.append_child(root, b);
        arena.append_child(root, c);

        assert_eq!(arena.children(root).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(arena.first_child(root), Some(a));
        assert_eq!(arena.last_child(root), Some(c));
        assert_eq!(arena.next_sibling(a), Some(b));
        assert_eq!(arena.prev_sibling(c), Some(b));
        assert_eq!(arena.prev_sibling(a), None);
        assert_eq!(arena.parent(b), Some(root));
    }

    #[test]
    fn test_prepend_child() {
        let mut arena = Arena::new();
        let root = arena.root();
        let b = text(&mut arena, "B");
        let a = text(&mut arena, "A");

        arena.prepend_child(root, b);
        arena.prepend_child(root, a);

        assert_eq!(arena.children(root).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(arena.first_child(root), Some(a));
        assert_eq!(arena.last_child(root), Some(b));
    }

    #[test]
    fn test_insert_before_detached_reference_is_noop() {
        let mut arena = Arena::new();
        let orphan = text(&mut arena, "orphan");
        let other = text(&mut arena, "other");
        arena.insert_before(orphan, other);
        assert_eq!(arena.parent(other), None);
    }

    #[test]
    fn test_detach_middle_child() {
        let mut arena = Arena::new();
        let root = arena.root();
        let a = text(&mut arena, "A");
        let b = text(&mut arena, "B");
        let c = text(&mut arena, "C");
        arena.append_child(root, a);
        arena.append_child(root, b);
        arena.append_child(root, c);

        arena.detach(b);

        assert_eq!(arena.children(root).collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(arena.parent(b), None);
        assert_eq!(arena.next_sibling(a), Some(c));
        assert_eq!(arena.prev_sibling(c), Some(a));
        // Detaching does not free storage.
        assert_eq!(arena.node_count(), 4);
    }

    #[test]
    fn test_detach_only_child() {
        let mut arena = Arena::new();
        let root = arena.root();
        let a = element(&mut arena, "only");
        arena.append_child(root, a);
        arena.detach(a);
        assert_eq!(arena.first_child(root), None);
        assert_eq!(arena.last_child(root), None);
    }

    #[test]
    fn test_node_name_and_rename() {
        let mut arena = Arena::new();
        let item = element(&mut arena, "item");
        let t = text(&mut arena, "x");

        assert_eq!(arena.node_name(item), Some("item"));
        assert!(arena.set_node_name(item, "entry"));
        assert_eq!(arena.node_name(item), Some("entry"));

        assert_eq!(arena.node_name(t), None);
        assert!(!arena.set_node_name(t, "nope"));
    }

    #[test]
    fn test_declaration_reports_xml_name() {
        let mut arena = Arena::new();
        let root = arena.root();
        let decl = arena.create_node(NodeKind::Declaration {
            attributes: Vec::new(),
        });
        arena.append_child(root, decl);
        assert_eq!(arena.declaration(), Some(decl));
        assert_eq!(arena.node_name(decl), Some("xml"));
        assert!(!arena.set_node_name(decl, "other"));
    }

    #[test]
    fn test_attributes_keep_insertion_order() {
        let mut arena = Arena::new();
        let div = element(&mut arena, "div");
        let id = arena.create_attribute("id", "main");
        let class = arena.create_attribute("class", "wide");

        assert!(arena.append_attribute(div, id));
        assert!(arena.append_attribute(div, class));

        assert_eq!(arena.attributes(div), &[id, class]);
        assert_eq!(arena.attribute(div, "class"), Some("wide"));
        assert_eq!(arena.attribute(div, "style"), None);
        assert_eq!(arena.attr(id).owner, Some(div));
    }

    #[test]
    fn test_append_attribute_to_text_is_rejected() {
        let mut arena = Arena::new();
        let t = text(&mut arena, "x");
        let attr = arena.create_attribute("a", "b");
        assert!(!arena.append_attribute(t, attr));
        assert_eq!(arena.attr(attr).owner, None);
        assert!(arena.attributes(t).is_empty());
    }

    #[test]
    fn test_element_value_is_first_text_child() {
        let mut arena = Arena::new();
        let p = element(&mut arena, "p");
        let b = element(&mut arena, "b");
        let first = text(&mut arena, "hello");
        let second = text(&mut arena, "world");
        arena.append_child(p, b);
        arena.append_child(p, first);
        arena.append_child(p, second);

        assert_eq!(arena.element_value(p), "hello");
        assert_eq!(arena.element_value(b), "");
    }

    #[test]
    fn test_set_element_value() {
        let mut arena = Arena::new();
        let p = element(&mut arena, "p");
        let child = element(&mut arena, "child");
        arena.append_child(p, child);

        arena.set_element_value(p, "first");
        assert_eq!(arena.element_value(p), "first");
        // The new text node goes in front of existing children.
        let first = arena.first_child(p);
        assert_eq!(first, arena.first_text_child(p));
        assert_eq!(arena.last_child(p), Some(child));

        arena.set_element_value(p, "second");
        assert_eq!(arena.element_value(p), "second");
        assert_eq!(arena.children(p).count(), 2);

        arena.set_element_value(p, "");
        assert_eq!(arena.element_value(p), "");
        assert_eq!(arena.children(p).collect::<Vec<_>>(), vec![child]);
    }

    #[test]
    fn test_clear_element_value_mixed_content() {
        let mut arena = Arena::new();
        let p = element(&mut arena, "p");
        let before = text(&mut arena, "x");
        let child = element(&mut arena, "b");
        let after = text(&mut arena, "y");
        for node in [before, child, after] {
            arena.append_child(p, node);
        }

        arena.set_element_value(p, "");
        assert_eq!(arena.element_value(p), "");
        assert_eq!(arena.children(p).collect::<Vec<_>>(), vec![child]);
    }

    #[test]
    fn test_child_elements_filter() {
        let mut arena = Arena::new();
        let list = element(&mut arena, "list");
        let a = element(&mut arena, "item");
        let gap = text(&mut arena, " ");
        let b = element(&mut arena, "other");
        let c = element(&mut arena, "item");
        for child in [a, gap, b, c] {
            arena.append_child(list, child);
        }

        assert_eq!(arena.child_elements(list, "item").collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(arena.child_elements(list, "").collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(arena.child_elements(list, "missing").count(), 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut arena = Arena::new();
        let root = arena.root();
        let item = element(&mut arena, "item");
        arena.append_child(root, item);

        let mut copy = arena.clone();
        copy.set_node_name(item, "renamed");

        assert_eq!(arena.node_name(item), Some("item"));
        assert_eq!(copy.node_name(item), Some("renamed"));
    }
}
