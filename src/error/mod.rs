//! Error types for parsing and for the document handle API.
//!
//! Parse failures carry a [`SourceLocation`] (line, column, byte offset) so
//! callers can point at the offending input. Misuse of a handle (mutating an
//! element that was never appended, or one whose document is gone) is
//! reported through [`Error`] rather than asserted.

use std::fmt;

use crate::encoding::EncodingError;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error type returned when XML parsing fails.
///
/// Parsing stops at the first well-formedness violation; there is no
/// partial tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at {location}: {message}")]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred.
    pub location: SourceLocation,
}

impl ParseError {
    /// Creates a `ParseError` with no meaningful source position.
    pub(crate) fn unlocated(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: SourceLocation::default(),
        }
    }
}

/// The kind of handle an [`Error`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// An [`Element`](crate::Element) handle.
    Element,
    /// An [`Attribute`](crate::Attribute) handle.
    Attribute,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element => write!(f, "element"),
            Self::Attribute => write!(f, "attribute"),
        }
    }
}

/// Errors returned by the [`Document`](crate::Document) handle API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The input was not well-formed XML.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The input bytes could not be decoded to UTF-8.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A mutator was called on a handle that was never bound to a document.
    #[error("cannot {operation}: {handle} is not attached to a document")]
    Unbound {
        /// Which kind of handle was used.
        handle: HandleKind,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A mutator was called on a handle whose document has been dropped.
    #[error("cannot {operation}: the owning document has been dropped")]
    DocumentDropped {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A structural mutator was called on the XML declaration handle.
    #[error("cannot {operation} on the XML declaration")]
    Declaration {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A mutator was given something that is not an XML name.
    #[error("cannot {operation}: {name:?} is not a valid XML name")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A mutator was given text containing a character outside the XML
    /// `Char` production, which no serialization could carry.
    #[error("cannot {operation}: {ch:?} is not allowed in XML")]
    InvalidChar {
        /// The first offending character.
        ch: char,
        /// The operation that was attempted.
        operation: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError {
            message: "unexpected end of input".to_string(),
            location: SourceLocation {
                line: 1,
                column: 15,
                byte_offset: 14,
            },
        };
        assert_eq!(
            err.to_string(),
            "parse error at 1:15: unexpected end of input"
        );
    }

    #[test]
    fn test_unbound_display() {
        let err = Error::Unbound {
            handle: HandleKind::Element,
            operation: "append an attribute",
        };
        assert_eq!(
            err.to_string(),
            "cannot append an attribute: element is not attached to a document"
        );
    }

    #[test]
    fn test_invalid_input_display() {
        let err = Error::InvalidName {
            name: "1st".to_string(),
            operation: "rename an element",
        };
        assert_eq!(
            err.to_string(),
            "cannot rename an element: \"1st\" is not a valid XML name"
        );
        let err = Error::InvalidChar {
            ch: '\u{1}',
            operation: "set an element value",
        };
        assert_eq!(
            err.to_string(),
            "cannot set an element value: '\\u{1}' is not allowed in XML"
        );
    }

    #[test]
    fn test_parse_error_converts_transparently() {
        let parse = ParseError::unlocated("missing root element");
        let err: Error = parse.clone().into();
        assert_eq!(err, Error::Parse(parse.clone()));
        assert_eq!(err.to_string(), parse.to_string());
    }

    #[test]
    fn test_error_is_std_error() {
        let err = Error::DocumentDropped { operation: "rename" };
        let _: &dyn std::error::Error = &err;
    }
}
