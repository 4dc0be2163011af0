//! Handle-based document API.
//!
//! A [`Document`] owns its [`Arena`] through the only strong `Rc`. Every
//! [`Element`] and [`Attribute`] handle derived from it holds a `Weak`
//! reference plus an index, so handles are cheap to clone, always alias the
//! node they were created for, and can never dangle: once the document is
//! dropped, their accessors fall back to the last cached name and value and
//! their mutators return [`Error::DocumentDropped`].
//!
//! ```
//! use arenaxml::{Attribute, Document, Element};
//!
//! let mut doc = Document::new();
//! let mut root = Element::new("config");
//! doc.add_root_element(&mut root).unwrap();
//!
//! root.append_attribute(&Attribute::new("version", "2")).unwrap();
//! let mut entry = Element::with_value("entry", "on");
//! root.append_element(&mut entry).unwrap();
//!
//! assert_eq!(doc.to_string(), "<config version=\"2\"><entry>on</entry></config>");
//! ```

mod attribute;
mod element;

pub use attribute::Attribute;
pub use element::Element;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use tracing::debug;

use crate::encoding;
use crate::error::{Error, ParseError};
use crate::parser::input::{is_name_char, is_name_start_char, is_xml_char};
use crate::parser::{self, ParseOptions};
use crate::serial::{self, SerializeOptions};
use crate::tree::{Arena, NodeKind};

/// A handle's link to one record in a document's arena.
#[derive(Debug, Clone)]
pub(crate) struct Binding<I> {
    arena: Weak<RefCell<Arena>>,
    pub(crate) id: I,
}

impl<I: Copy + PartialEq> Binding<I> {
    fn new(arena: &Rc<RefCell<Arena>>, id: I) -> Self {
        Self {
            arena: Rc::downgrade(arena),
            id,
        }
    }

    /// A binding to another record of the same arena.
    pub(crate) fn with_id<J>(&self, id: J) -> Binding<J> {
        Binding {
            arena: self.arena.clone(),
            id,
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Rc<RefCell<Arena>>> {
        self.arena.upgrade()
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.arena.strong_count() > 0
    }

    /// Same arena and same record.
    pub(crate) fn aliases(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.arena, &other.arena)
    }

    /// Runs `f` against the arena, or returns `None` if it has been dropped.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Arena, I) -> T) -> Option<T> {
        let arena = self.arena.upgrade()?;
        let arena = arena.borrow();
        Some(f(&arena, self.id))
    }

    /// Runs `f` against the arena mutably.
    pub(crate) fn write<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Arena, I) -> T,
    ) -> Result<T, Error> {
        let arena = self
            .arena
            .upgrade()
            .ok_or(Error::DocumentDropped { operation })?;
        let mut arena = arena.borrow_mut();
        Ok(f(&mut arena, self.id))
    }
}

/// Rejects anything that could not be written back as a tag or attribute
/// name.
pub(crate) fn check_name(name: &str, operation: &'static str) -> Result<(), Error> {
    let mut chars = name.chars();
    if chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            name: name.to_string(),
            operation,
        })
    }
}

/// Rejects text holding a character outside the XML `Char` production.
pub(crate) fn check_text(text: &str, operation: &'static str) -> Result<(), Error> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(ch) => Err(Error::InvalidChar { ch, operation }),
        None => Ok(()),
    }
}

/// An XML document: the source text, the arena holding its tree, and
/// handles to the XML declaration and the root element.
///
/// # Examples
///
/// ```
/// use arenaxml::Document;
///
/// let doc = Document::parse("<root attr=\"1\"><child>text</child></root>").unwrap();
/// let root = doc.root_element();
/// assert_eq!(root.name(), "root");
/// assert_eq!(root.attributes()[0], ("attr", "1"));
/// assert_eq!(root.child("child").value(), "text");
/// ```
pub struct Document {
    source: String,
    arena: Rc<RefCell<Arena>>,
    declaration: Element,
    root: Element,
}

impl Document {
    /// Creates an empty document with no declaration and no root element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: String::new(),
            arena: Rc::new(RefCell::new(Arena::new())),
            declaration: Element::default(),
            root: Element::default(),
        }
    }

    /// Parses a document with default options.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if `text` is not well-formed XML.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_with_options(text, &ParseOptions::default())
    }

    /// Parses a document with the given parser options.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if `text` is not well-formed XML or exceeds one
    /// of the configured limits.
    pub fn parse_with_options(text: &str, options: &ParseOptions) -> Result<Self, ParseError> {
        let arena = parser::parse_str_with_options(text, options)?;
        Ok(Self::from_arena(text.to_string(), arena))
    }

    /// Decodes raw bytes (see [`encoding::decode_to_utf8`]) and parses
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the bytes cannot be decoded and
    /// [`Error::Parse`] if the decoded text is not well-formed.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let text = encoding::decode_to_utf8(bytes)?;
        let arena = parser::parse_str(&text)?;
        Ok(Self::from_arena(text, arena))
    }

    /// Wraps a freshly built arena, binding the first declaration and the
    /// first element among the top-level nodes.
    fn from_arena(source: String, arena: Arena) -> Self {
        let mut doc = Self {
            source,
            arena: Rc::new(RefCell::new(arena)),
            declaration: Element::default(),
            root: Element::default(),
        };
        doc.bind_top_level();
        debug!(
            has_declaration = doc.declaration.is_valid(),
            root = %doc.root.name(),
            "bound document handles"
        );
        doc
    }

    fn bind_top_level(&mut self) {
        let arena = self.arena.borrow();
        let mut declaration = None;
        let mut root = None;
        for id in arena.children(arena.root()) {
            match arena.node(id).kind {
                NodeKind::Declaration { .. } if declaration.is_none() => declaration = Some(id),
                NodeKind::Element { .. } if root.is_none() => root = Some(id),
                _ => {}
            }
        }
        self.declaration = declaration
            .map(|id| Element::bound(Binding::new(&self.arena, id), &arena))
            .unwrap_or_default();
        self.root = root
            .map(|id| Element::bound(Binding::new(&self.arena, id), &arena))
            .unwrap_or_default();
    }

    /// Returns a handle to the root element, or a detached element if the
    /// document has none.
    #[must_use]
    pub fn root_element(&self) -> Element {
        self.root.clone()
    }

    /// Returns a handle to the XML declaration, or a detached element if
    /// the document has none.
    #[must_use]
    pub fn declaration(&self) -> Element {
        self.declaration.clone()
    }

    /// Makes a new node built from `element`'s name and value the root
    /// element, and rebinds `element` to it.
    ///
    /// A previous root element node is detached from the document so the
    /// tree keeps a single root. Handles to it stay valid but no longer
    /// appear in the output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] or [`Error::InvalidChar`] if the name
    /// or value could not be serialized. The document and `element` are
    /// untouched on error.
    pub fn add_root_element(&mut self, element: &mut Element) -> Result<(), Error> {
        const OPERATION: &str = "add a root element";
        let (name, value) = (element.name(), element.value());
        check_name(&name, OPERATION)?;
        check_text(&value, OPERATION)?;
        let node = {
            let mut arena = self.arena.borrow_mut();
            if let Some(previous) = arena.root_element() {
                arena.detach(previous);
            }
            let node = element::new_element(&mut arena, name, &value);
            let top = arena.root();
            arena.append_child(top, node);
            node
        };

        element.rebind(Binding::new(&self.arena, node), &self.arena.borrow());
        self.root = element.clone();
        debug!(root = %self.root.name(), "added root element");
        Ok(())
    }

    /// Returns the text the document was parsed from (empty for documents
    /// built with [`Document::new`]).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Serializes the document with explicit output options.
    #[must_use]
    pub fn serialize_with(&self, options: &SerializeOptions) -> String {
        serial::serialize_with_options(&self.arena.borrow(), options)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Document {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Deep copy: the clone gets its own arena, and its declaration and root
/// handles point into it.
///
/// The arena is copied rather than serialized and reparsed. Both give the
/// same tree, but a copy cannot fail, while a document built through the
/// handles may nest deeper or carry more attributes than the default
/// parser limits accept.
impl Clone for Document {
    fn clone(&self) -> Self {
        let arena = Rc::new(RefCell::new(self.arena.borrow().clone()));
        let rebound = |handle: &Element| match handle.binding_ref() {
            Some(binding) => Element::bound(Binding::new(&arena, binding.id), &arena.borrow()),
            None => handle.clone(),
        };
        let declaration = rebound(&self.declaration);
        let root = rebound(&self.root);
        Self {
            source: self.source.clone(),
            arena,
            declaration,
            root,
        }
    }
}

/// Writes the compact serialization. `to_string()` goes through here too.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        serial::write_arena(&self.arena.borrow(), &SerializeOptions::default(), f)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root.name())
            .field("nodes", &self.arena.borrow().node_count())
            .finish_non_exhaustive()
    }
}
