//! Node payloads.
//!
//! Navigation links live in [`NodeData`](super::NodeData); this enum only
//! carries what is specific to each kind of node.

use super::AttrId;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The synthetic document node. Exactly one per arena, never serialized.
    Document,

    /// An element, e.g. `<item id="1">`.
    Element {
        /// The element name as written, including any prefix.
        name: String,
        /// Attribute records owned by this element, in document order.
        attributes: Vec<AttrId>,
    },

    /// The XML declaration, `<?xml version="1.0" ...?>`.
    ///
    /// Its pseudo-attributes (`version`, `encoding`, `standalone`) are
    /// stored as ordinary attribute records.
    Declaration {
        /// Pseudo-attribute records, in document order.
        attributes: Vec<AttrId>,
    },

    /// Character data with references already resolved.
    Text {
        /// The decoded text.
        content: String,
    },

    /// A CDATA section, `<![CDATA[...]]>`.
    CData {
        /// The raw section content.
        content: String,
    },

    /// A comment, `<!-- ... -->`.
    Comment {
        /// The text between the delimiters.
        content: String,
    },

    /// A processing instruction, `<?target data?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// Everything after the target, if anything.
        data: Option<String>,
    },

    /// A document type declaration, `<!DOCTYPE ...>`.
    DocumentType {
        /// The declared root element name.
        name: String,
        /// The SYSTEM identifier, if any.
        system_id: Option<String>,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The internal subset, verbatim, without the brackets.
        internal_subset: Option<String>,
    },
}

impl NodeKind {
    /// Creates an element payload with no attributes.
    pub fn element(name: impl Into<String>) -> Self {
        Self::Element {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Creates a text payload.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Returns `true` for elements.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}
