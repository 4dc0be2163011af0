//! # arenaxml
//!
//! Handle-based XML documents over an arena-allocated tree.
//!
//! A [`Document`] parses its input once into an arena. [`Element`] and
//! [`Attribute`] are lightweight handles into that arena: cloning one gives
//! another view of the same node, mutations through any handle are seen by
//! all of them, and detached handles can be built up front and bound later
//! by appending them.
//!
//! ## Quick Start
//!
//! ```
//! use arenaxml::{Document, Element};
//!
//! let doc: Document = "<root attr=\"1\"><child>text</child></root>".parse().unwrap();
//! let mut root = doc.root_element();
//! assert_eq!(root.name(), "root");
//! assert_eq!(root.attributes()[0], ("attr", "1"));
//! assert_eq!(root.child("child").value(), "text");
//!
//! root.append_element(&mut Element::with_value("extra", "more")).unwrap();
//! assert_eq!(
//!     doc.to_string(),
//!     "<root attr=\"1\"><child>text</child><extra>more</extra></root>"
//! );
//! ```
//!
//! Misusing a handle is reported, never ignored:
//!
//! ```
//! use arenaxml::{Element, Error};
//!
//! let mut detached = Element::new("orphan");
//! assert!(matches!(detached.set_name("x"), Err(Error::Unbound { .. })));
//! ```

pub mod dom;
pub mod encoding;
pub mod error;
pub mod parser;
pub mod serial;
pub mod tree;

// Re-export primary types at the crate root for convenience.
pub use dom::{Attribute, Document, Element};
pub use error::{Error, ParseError};
