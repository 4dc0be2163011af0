//! XML serialization.
//!
//! Turns an [`Arena`](crate::tree::Arena) back into XML text, either compact
//! (exactly the nodes in the tree, no added whitespace) or indented.

pub mod xml;

pub use xml::{serialize, serialize_with_options, write_arena, SerializeOptions};
