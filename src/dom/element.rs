use tracing::trace;

use crate::error::{Error, HandleKind};
use crate::tree::{Arena, NodeId, NodeKind};

use super::{check_name, check_text, Attribute, Binding};

/// A handle to one element node.
///
/// An element is either *bound* to a node in a document's arena or
/// *detached*, in which case it only carries the name and value it was
/// built with. Detached elements become bound when passed to
/// [`append_element`](Self::append_element) or
/// [`Document::add_root_element`](super::Document::add_root_element).
///
/// Cloning a bound element yields another handle to the same node, and
/// accessors always read the node itself, so a change made through one
/// handle is visible through every other.
///
/// ```
/// use arenaxml::{Document, Element};
///
/// let doc: Document = "<list/>".parse().unwrap();
/// let mut list = doc.root_element();
/// let mut item = Element::with_value("item", "first");
/// list.append_element(&mut item).unwrap();
///
/// assert!(item.is_valid());
/// assert_eq!(list.child("item").value(), "first");
/// assert_eq!(doc.to_string(), "<list><item>first</item></list>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Element {
    name: String,
    value: String,
    binding: Option<Binding<NodeId>>,
}

impl Element {
    /// Creates a detached element with an empty value.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_value(name, "")
    }

    /// Creates a detached element with a text value.
    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            binding: None,
        }
    }

    pub(crate) fn bound(binding: Binding<NodeId>, arena: &Arena) -> Self {
        Self {
            name: arena.node_name(binding.id).unwrap_or_default().to_string(),
            value: arena.element_value(binding.id).to_string(),
            binding: Some(binding),
        }
    }

    pub(crate) fn binding_ref(&self) -> Option<&Binding<NodeId>> {
        self.binding.as_ref()
    }

    /// Points this handle at `binding`, refreshing the cached name and
    /// value from the node.
    pub(crate) fn rebind(&mut self, binding: Binding<NodeId>, arena: &Arena) {
        *self = Self::bound(binding, arena);
    }

    /// Returns the element name. The XML declaration reports `"xml"`.
    pub fn name(&self) -> String {
        self.read(|arena, id| arena.node_name(id).unwrap_or_default().to_string())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Returns the content of the element's first text child, or `""`.
    pub fn value(&self) -> String {
        self.read(|arena, id| arena.element_value(id).to_string())
            .unwrap_or_else(|| self.value.clone())
    }

    /// Returns handles to the element's attributes in document order.
    ///
    /// A detached element has no attributes.
    pub fn attributes(&self) -> Vec<Attribute> {
        self.read_bound(|arena, binding| {
            arena
                .attributes(binding.id)
                .iter()
                .map(|&attr| Attribute::bound(binding.with_id(attr), arena))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Returns the first attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        self.read_bound(|arena, binding| {
            arena
                .find_attribute(binding.id, name)
                .map(|attr| Attribute::bound(binding.with_id(attr), arena))
        })
        .flatten()
    }

    /// Renames the element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unbound`] for a detached element,
    /// [`Error::DocumentDropped`] if the document is gone and
    /// [`Error::Declaration`] for the XML declaration. A name that is not
    /// an XML name gives [`Error::InvalidName`]. The handle is left
    /// unchanged on error.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), Error> {
        const OPERATION: &str = "rename an element";
        let name = name.into();
        let binding = self.structural(OPERATION)?;
        check_name(&name, OPERATION)?;
        binding.write(OPERATION, |arena, id| {
            arena.set_node_name(id, name.clone());
        })?;
        trace!(element = %name, "renamed element");
        self.name = name;
        Ok(())
    }

    /// Replaces the element's text value.
    ///
    /// The first text child is rewritten; one is inserted in front of the
    /// other children if there is none. An empty value removes every text
    /// child, so the value reads back as `""`.
    ///
    /// # Errors
    ///
    /// Same as [`set_name`](Self::set_name), except that a character XML
    /// cannot carry gives [`Error::InvalidChar`].
    pub fn set_value(&mut self, value: impl Into<String>) -> Result<(), Error> {
        const OPERATION: &str = "set an element value";
        let value = value.into();
        let binding = self.structural(OPERATION)?;
        check_text(&value, OPERATION)?;
        binding.write(OPERATION, |arena, id| arena.set_element_value(id, &value))?;
        self.value = value;
        Ok(())
    }

    /// Appends a copy of `attribute` to this element and returns a handle
    /// bound to the new record.
    ///
    /// Attributes are kept in insertion order. Names are not checked for
    /// duplicates. The XML declaration accepts attributes too.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unbound`] for a detached element,
    /// [`Error::DocumentDropped`] if the document is gone, and
    /// [`Error::InvalidName`] or [`Error::InvalidChar`] if the attribute
    /// could not be serialized.
    pub fn append_attribute(&mut self, attribute: &Attribute) -> Result<Attribute, Error> {
        const OPERATION: &str = "append an attribute";
        let (name, value) = (attribute.name(), attribute.value());
        let binding = self.binding(OPERATION)?;
        check_name(&name, OPERATION)?;
        check_text(&value, OPERATION)?;
        binding.write(OPERATION, |arena, id| {
            let attr = arena.create_attribute(name, value);
            let appended = arena.append_attribute(id, attr);
            debug_assert!(appended, "element handles point at elements");
            trace!(attribute = %arena.attr(attr).name, "appended attribute");
            Attribute::bound(binding.with_id(attr), arena)
        })
    }

    /// Appends a new child element built from `child`'s name and value,
    /// then rebinds `child` to that new node.
    ///
    /// `child` may be detached or bound elsewhere; either way it refers to
    /// the new node afterwards.
    ///
    /// # Errors
    ///
    /// Same as [`set_name`](Self::set_name), plus [`Error::InvalidChar`]
    /// for the child's value. `child` is untouched on error.
    pub fn append_element(&mut self, child: &mut Element) -> Result<(), Error> {
        const OPERATION: &str = "append an element";
        let (name, value) = (child.name(), child.value());
        let binding = self.structural(OPERATION)?;
        check_name(&name, OPERATION)?;
        check_text(&value, OPERATION)?;
        let node = binding.write(OPERATION, |arena, id| {
            let node = new_element(arena, name, &value);
            arena.append_child(id, node);
            node
        })?;
        trace!(parent = ?binding.id, child = ?node, "appended element");
        let binding = binding.with_id(node);
        if let Some(shared) = binding.upgrade() {
            child.rebind(binding, &shared.borrow());
        }
        Ok(())
    }

    /// Appends a CDATA section holding `text`.
    ///
    /// # Errors
    ///
    /// Same as [`set_value`](Self::set_value).
    pub fn append_cdata(&mut self, text: impl Into<String>) -> Result<(), Error> {
        const OPERATION: &str = "append a CDATA section";
        let content = text.into();
        let binding = self.structural(OPERATION)?;
        check_text(&content, OPERATION)?;
        binding.write(OPERATION, |arena, id| {
            let node = arena.create_node(NodeKind::CData { content });
            arena.append_child(id, node);
        })
    }

    /// Returns the first child element named `name`, or the first child
    /// element of any name when `name` is empty.
    ///
    /// Returns a detached (invalid) element if there is no match or this
    /// handle is not bound to a live document.
    pub fn child(&self, name: &str) -> Element {
        self.read_bound(|arena, binding| {
            arena
                .child_elements(binding.id, name)
                .next()
                .map(|child| Element::bound(binding.with_id(child), arena))
        })
        .flatten()
        .unwrap_or_default()
    }

    /// Returns every child element named `name` in document order, or every
    /// child element when `name` is empty.
    pub fn children(&self, name: &str) -> Vec<Element> {
        self.read_bound(|arena, binding| {
            arena
                .child_elements(binding.id, name)
                .map(|child| Element::bound(binding.with_id(child), arena))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Returns `true` if the element is bound to a document that is still
    /// alive.
    pub fn is_valid(&self) -> bool {
        self.binding.as_ref().is_some_and(Binding::is_alive)
    }

    fn read_bound<T>(&self, f: impl FnOnce(&Arena, &Binding<NodeId>) -> T) -> Option<T> {
        let binding = self.binding.as_ref()?;
        binding.read(|arena, _| f(arena, binding))
    }

    fn read<T>(&self, f: impl FnOnce(&Arena, NodeId) -> T) -> Option<T> {
        self.binding.as_ref()?.read(f)
    }

    fn binding(&self, operation: &'static str) -> Result<&Binding<NodeId>, Error> {
        self.binding.as_ref().ok_or(Error::Unbound {
            handle: HandleKind::Element,
            operation,
        })
    }

    /// Like [`binding`](Self::binding), but also refuses the declaration.
    fn structural(&self, operation: &'static str) -> Result<&Binding<NodeId>, Error> {
        let binding = self.binding(operation)?;
        let is_declaration = binding
            .read(|arena, id| matches!(arena.node(id).kind, NodeKind::Declaration { .. }))
            .ok_or(Error::DocumentDropped { operation })?;
        if is_declaration {
            return Err(Error::Declaration { operation });
        }
        Ok(binding)
    }
}

/// Allocates an unlinked element node, with a text child if `value` is
/// not empty.
pub(crate) fn new_element(arena: &mut Arena, name: String, value: &str) -> NodeId {
    let node = arena.create_node(NodeKind::element(name));
    if !value.is_empty() {
        let text = arena.create_node(NodeKind::text(value));
        arena.append_child(node, text);
    }
    node
}

/// Bound elements are equal when they alias the same node. Detached
/// elements compare by name and value.
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        match (&self.binding, &other.binding) {
            (Some(a), Some(b)) => a.aliases(b),
            (None, None) => self.name == other.name && self.value == other.value,
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Document;
    use pretty_assertions::assert_eq;

    fn doc(xml: &str) -> Document {
        xml.parse().unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    #[test]
    fn test_detached_element() {
        let element = Element::with_value("item", "text");
        assert_eq!(element.name(), "item");
        assert_eq!(element.value(), "text");
        assert!(element.attributes().is_empty());
        assert!(!element.is_valid());
        assert_eq!(element, Element::with_value("item", "text"));
    }

    #[test]
    fn test_unbound_mutators_report_and_leave_cache() {
        let mut element = Element::new("item");
        let unbound = |operation| Error::Unbound {
            handle: HandleKind::Element,
            operation,
        };

        assert_eq!(element.set_name("other"), Err(unbound("rename an element")));
        assert_eq!(element.set_value("v"), Err(unbound("set an element value")));
        assert_eq!(
            element.append_attribute(&Attribute::new("a", "b")),
            Err(unbound("append an attribute"))
        );
        assert_eq!(element.append_cdata("x"), Err(unbound("append a CDATA section")));

        let mut child = Element::new("child");
        assert_eq!(
            element.append_element(&mut child),
            Err(unbound("append an element"))
        );
        assert!(!child.is_valid());
        assert_eq!(element.name(), "item");
        assert_eq!(element.value(), "");
    }

    #[test]
    fn test_child_and_children() {
        let doc = doc("<r><a>1</a>text<b/><a>2</a></r>");
        let root = doc.root_element();

        assert_eq!(root.child("a").value(), "1");
        assert_eq!(root.child("").name(), "a");
        assert_eq!(
            root.children("a").iter().map(Element::value).collect::<Vec<_>>(),
            vec!["1", "2"]
        );
        assert_eq!(
            root.children("").iter().map(Element::name).collect::<Vec<_>>(),
            vec!["a", "b", "a"]
        );
    }

    #[test]
    fn test_missing_child_is_invalid() {
        let doc = doc("<r><a/></r>");
        let root = doc.root_element();
        assert!(!root.child("missing").is_valid());
        assert!(root.children("missing").is_empty());
        assert!(!Element::new("x").child("").is_valid());
        assert!(Element::new("x").children("").is_empty());
    }

    #[test]
    fn test_append_attribute_order_and_aliasing() {
        let doc = doc("<r><c first=\"1\"/></r>");
        let mut c = doc.root_element().child("c");
        let attr = c.append_attribute(&Attribute::new("second", "2")).unwrap();

        assert!(attr.is_valid());
        let again = doc.root_element().child("c");
        let attrs = again.attributes();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1], ("second", "2"));
        assert_eq!(attrs[1], attr);
    }

    #[test]
    fn test_append_element_rebinds_child() {
        let doc = doc("<r/>");
        let mut root = doc.root_element();
        let mut child = Element::with_value("item", "v");
        root.append_element(&mut child).unwrap();

        assert!(child.is_valid());
        assert_eq!(child.name(), "item");
        assert!(root.children("item").contains(&child));

        child.set_name("entry").unwrap();
        assert_eq!(root.child("entry").value(), "v");
        assert_eq!(doc.to_string(), "<r><entry>v</entry></r>");
    }

    #[test]
    fn test_append_bound_element_copies_it() {
        let doc = doc("<r><a>x</a></r>");
        let mut root = doc.root_element();
        let mut moved = root.child("a");
        let original = moved.clone();
        root.append_element(&mut moved).unwrap();

        assert_ne!(moved, original);
        assert_eq!(root.children("a").len(), 2);
        assert_eq!(doc.to_string(), "<r><a>x</a><a>x</a></r>");
    }

    #[test]
    fn test_set_value_through_alias() {
        let doc = doc("<r><a><b/></a></r>");
        let mut a = doc.root_element().child("a");
        let alias = doc.root_element().child("a");

        a.set_value("text").unwrap();
        assert_eq!(alias.value(), "text");
        assert_eq!(doc.to_string(), "<r><a>text<b/></a></r>");

        a.set_value("").unwrap();
        assert_eq!(alias.value(), "");
        assert_eq!(doc.to_string(), "<r><a><b/></a></r>");
    }

    #[test]
    fn test_clear_value_of_mixed_content() {
        let doc = doc("<r><a>x<b/>y</a></r>");
        let mut a = doc.root_element().child("a");
        let alias = a.clone();

        a.set_value("").unwrap();
        assert_eq!(a.value(), "");
        assert_eq!(alias.value(), "");
        assert_eq!(doc.to_string(), "<r><a><b/></a></r>");
        assert_eq!(
            Document::parse(&doc.to_string())
                .unwrap()
                .root_element()
                .child("a")
                .value(),
            ""
        );
    }

    #[test]
    fn test_invalid_names_rejected() {
        let doc = doc("<r a=\"1\"/>");
        let mut root = doc.root_element();
        let invalid = |name: &str, operation| Error::InvalidName {
            name: name.to_string(),
            operation,
        };

        for name in ["", "1st", "has space", "-dash", "a<b"] {
            assert_eq!(root.set_name(name), Err(invalid(name, "rename an element")));
            assert_eq!(
                root.append_element(&mut Element::new(name)),
                Err(invalid(name, "append an element"))
            );
            assert_eq!(
                root.append_attribute(&Attribute::new(name, "v")),
                Err(invalid(name, "append an attribute"))
            );
        }
        assert_eq!(doc.to_string(), "<r a=\"1\"/>");

        root.set_name("svg:rect").unwrap();
        root.append_element(&mut Element::new("_x.y-z")).unwrap();
        assert_eq!(doc.to_string(), "<svg:rect a=\"1\"><_x.y-z/></svg:rect>");
    }

    #[test]
    fn test_invalid_chars_rejected() {
        let doc = doc("<r>v</r>");
        let mut root = doc.root_element();
        let invalid = |operation| Error::InvalidChar {
            ch: '\u{1}',
            operation,
        };

        assert_eq!(root.set_value("a\u{1}b"), Err(invalid("set an element value")));
        assert_eq!(
            root.append_cdata("\u{1}"),
            Err(invalid("append a CDATA section"))
        );
        assert_eq!(
            root.append_attribute(&Attribute::new("k", "\u{1}")),
            Err(invalid("append an attribute"))
        );
        let mut child = Element::with_value("c", "\u{1}");
        assert_eq!(
            root.append_element(&mut child),
            Err(invalid("append an element"))
        );
        assert!(!child.is_valid());
        assert!(matches!(
            root.set_value("\u{FFFE}"),
            Err(Error::InvalidChar { ch: '\u{FFFE}', .. })
        ));

        assert_eq!(root.value(), "v");
        assert_eq!(doc.to_string(), "<r>v</r>");
    }

    #[test]
    fn test_mutated_output_reparses() {
        let doc = doc("<r/>");
        let mut root = doc.root_element();
        root.set_value("tab\there\r\nline & <more>").unwrap();
        root.append_attribute(&Attribute::new("q", "\"'\t\n\r<&>"))
            .unwrap();
        root.append_cdata("a]]>b").unwrap();

        let reparsed = Document::parse(&doc.to_string()).unwrap();
        let root = reparsed.root_element();
        assert_eq!(root.value(), "tab\there\r\nline & <more>");
        assert_eq!(root.attribute("q").unwrap().value(), "\"'\t\n\r<&>");
    }

    #[test]
    fn test_append_cdata() {
        let doc = doc("<r/>");
        doc.root_element().append_cdata("<raw>").unwrap();
        assert_eq!(doc.to_string(), "<r><![CDATA[<raw>]]></r>");
        // CDATA is not an element child.
        assert!(doc.root_element().children("").is_empty());
    }

    #[test]
    fn test_declaration_refuses_structure() {
        let doc = doc("<?xml version=\"1.0\"?><r/>");
        let mut decl = doc.declaration();
        assert_eq!(decl.name(), "xml");
        assert_eq!(
            decl.set_name("x"),
            Err(Error::Declaration {
                operation: "rename an element"
            })
        );
        assert!(decl.append_element(&mut Element::new("x")).is_err());
        assert!(decl.append_cdata("x").is_err());

        decl.append_attribute(&Attribute::new("encoding", "UTF-8"))
            .unwrap();
        assert_eq!(
            doc.to_string(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>"
        );
    }

    #[test]
    fn test_dropped_document() {
        let doc = doc("<r>v</r>");
        let mut root = doc.root_element();
        drop(doc);

        assert!(!root.is_valid());
        assert_eq!(root.name(), "r");
        assert_eq!(root.value(), "v");
        assert!(root.attributes().is_empty());
        assert!(!root.child("").is_valid());
        assert_eq!(
            root.set_name("x"),
            Err(Error::DocumentDropped {
                operation: "rename an element"
            })
        );
    }
}
