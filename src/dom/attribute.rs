use std::fmt;

use tracing::trace;

use crate::error::{Error, HandleKind};
use crate::tree::{Arena, AttrId};

use super::{check_name, check_text, Binding};

/// A handle to one name/value pair on an element.
///
/// Created detached with [`Attribute::new`] and bound by
/// [`Element::append_attribute`](super::Element::append_attribute), which
/// returns the bound handle. Clones of a bound handle alias the same
/// attribute record, so a rename through one is seen by all of them.
#[derive(Debug, Clone, Default)]
pub struct Attribute {
    name: String,
    value: String,
    binding: Option<Binding<AttrId>>,
}

impl Attribute {
    /// Creates a detached attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            binding: None,
        }
    }

    pub(crate) fn bound(binding: Binding<AttrId>, arena: &Arena) -> Self {
        let data = arena.attr(binding.id);
        Self {
            name: data.name.clone(),
            value: data.value.clone(),
            binding: Some(binding),
        }
    }

    /// Returns the attribute name.
    pub fn name(&self) -> String {
        self.read(|arena, id| arena.attr(id).name.clone())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Returns the attribute value.
    pub fn value(&self) -> String {
        self.read(|arena, id| arena.attr(id).value.clone())
            .unwrap_or_else(|| self.value.clone())
    }

    /// Renames the attribute in its document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unbound`] for a detached attribute,
    /// [`Error::DocumentDropped`] if the document is gone and
    /// [`Error::InvalidName`] if `name` is not an XML name. The handle is
    /// left unchanged on error.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), Error> {
        const OPERATION: &str = "rename an attribute";
        let name = name.into();
        let binding = self.binding(OPERATION)?;
        check_name(&name, OPERATION)?;
        binding.write(OPERATION, |arena, id| {
            name.clone_into(&mut arena.attr_mut(id).name);
        })?;
        trace!(attribute = %name, "renamed attribute");
        self.name = name;
        Ok(())
    }

    /// Replaces the attribute value in its document.
    ///
    /// # Errors
    ///
    /// Same as [`set_name`](Self::set_name), except that a character XML
    /// cannot carry gives [`Error::InvalidChar`].
    pub fn set_value(&mut self, value: impl Into<String>) -> Result<(), Error> {
        const OPERATION: &str = "set an attribute value";
        let value = value.into();
        let binding = self.binding(OPERATION)?;
        check_text(&value, OPERATION)?;
        binding.write(OPERATION, |arena, id| {
            value.clone_into(&mut arena.attr_mut(id).value);
        })?;
        self.value = value;
        Ok(())
    }

    /// Returns `true` if the attribute is bound to a document that is
    /// still alive.
    pub fn is_valid(&self) -> bool {
        self.binding.as_ref().is_some_and(Binding::is_alive)
    }

    fn read<T>(&self, f: impl FnOnce(&Arena, AttrId) -> T) -> Option<T> {
        self.binding.as_ref()?.read(f)
    }

    fn binding(&self, operation: &'static str) -> Result<&Binding<AttrId>, Error> {
        self.binding.as_ref().ok_or(Error::Unbound {
            handle: HandleKind::Attribute,
            operation,
        })
    }
}

/// Bound attributes are equal when they alias the same record. Detached
/// attributes compare by name and value.
impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        match (&self.binding, &other.binding) {
            (Some(a), Some(b)) => a.aliases(b),
            (None, None) => self.name == other.name && self.value == other.value,
            _ => false,
        }
    }
}

impl PartialEq<(&str, &str)> for Attribute {
    fn eq(&self, (name, value): &(&str, &str)) -> bool {
        self.name() == *name && self.value() == *value
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.name(), self.value())
    }
}
