//! XML serializer.
//!
//! Output is written to any [`fmt::Write`], so `Display` implementations can
//! stream straight into a formatter without an intermediate `String`.

use std::fmt::{self, Write};

use crate::tree::{Arena, NodeId, NodeKind};

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use arenaxml::Document;
/// use arenaxml::serial::SerializeOptions;
///
/// let doc: Document = "<root><child>Hello</child></root>".parse().unwrap();
/// let xml = doc.serialize_with(&SerializeOptions::default().indent(true));
/// assert_eq!(xml, "<root>\n  <child>Hello</child>\n</root>\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Whether to produce indented (pretty-printed) output.
    /// Defaults to `false`.
    pub indent: bool,
    /// The indentation string used for each level when `indent` is `true`.
    /// Defaults to two spaces.
    pub indent_str: String,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output.
    ///
    /// Element-only content is laid out one child per line. Elements with
    /// text or CDATA children are written as-is so no significant whitespace
    /// is added.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }
}

/// Serializes an arena to a compact XML string.
#[must_use]
pub fn serialize(arena: &Arena) -> String {
    serialize_with_options(arena, &SerializeOptions::default())
}

/// Serializes an arena to an XML string with the given options.
#[must_use]
pub fn serialize_with_options(arena: &Arena, options: &SerializeOptions) -> String {
    let mut out = String::new();
    // `fmt::Write` for `String` never returns an error.
    match write_arena(arena, options, &mut out) {
        Ok(()) | Err(fmt::Error) => out,
    }
}

/// Writes the serialized arena to `out`.
///
/// The XML declaration is written only if the arena has one. In indented
/// mode every top-level node ends with a newline.
///
/// # Errors
///
/// Propagates any error returned by `out`.
pub fn write_arena<W: Write>(arena: &Arena, options: &SerializeOptions, out: &mut W) -> fmt::Result {
    let mut writer = Writer { arena, options, out };
    for child in arena.children(arena.root()) {
        writer.node(child, 0, false)?;
        if options.indent {
            writer.out.write_char('\n')?;
        }
    }
    Ok(())
}

struct Writer<'a, W> {
    arena: &'a Arena,
    options: &'a SerializeOptions,
    out: &'a mut W,
}

impl<W: Write> Writer<'_, W> {
    fn pad(&mut self, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            self.out.write_str(&self.options.indent_str)?;
        }
        Ok(())
    }

    /// `pretty` is set when the parent lays its children out one per line.
    fn node(&mut self, id: NodeId, depth: usize, pretty: bool) -> fmt::Result {
        let arena = self.arena;
        let kind = &arena.node(id).kind;

        if pretty && !matches!(kind, NodeKind::Text { .. }) {
            self.pad(depth)?;
        }

        match kind {
            NodeKind::Element { name, .. } => self.element(id, name, depth)?,
            NodeKind::Declaration { .. } => {
                self.out.write_str("<?xml")?;
                self.attributes(id)?;
                self.out.write_str("?>")?;
            }
            NodeKind::Text { content } => write_escaped_text(&mut *self.out, content)?,
            NodeKind::CData { content } => write_cdata(&mut *self.out, content)?,
            NodeKind::Comment { content } => write!(self.out, "<!--{content}-->")?,
            NodeKind::ProcessingInstruction { target, data } => match data {
                Some(data) => write!(self.out, "<?{target} {data}?>")?,
                None => write!(self.out, "<?{target}?>")?,
            },
            NodeKind::DocumentType {
                name,
                system_id,
                public_id,
                internal_subset,
            } => {
                write!(self.out, "<!DOCTYPE {name}")?;
                match (public_id, system_id) {
                    (Some(public), Some(system)) => {
                        write!(self.out, " PUBLIC {} {}", Quoted(public), Quoted(system))?;
                    }
                    (None, Some(system)) => write!(self.out, " SYSTEM {}", Quoted(system))?,
                    _ => {}
                }
                if let Some(subset) = internal_subset {
                    write!(self.out, " [{subset}]")?;
                }
                self.out.write_char('>')?;
            }
            NodeKind::Document => {}
        }

        if pretty && !matches!(kind, NodeKind::Text { .. }) {
            self.out.write_char('\n')?;
        }
        Ok(())
    }

    fn element(&mut self, id: NodeId, name: &str, depth: usize) -> fmt::Result {
        write!(self.out, "<{name}")?;
        self.attributes(id)?;

        if self.arena.first_child(id).is_none() {
            return self.out.write_str("/>");
        }
        self.out.write_char('>')?;

        let arena = self.arena;
        let pretty = self.options.indent && is_element_only(arena, id);
        if pretty {
            self.out.write_char('\n')?;
        }
        for child in arena.children(id) {
            if pretty && is_blank_text(arena, child) {
                continue;
            }
            self.node(child, depth + 1, pretty)?;
        }
        if pretty {
            self.pad(depth)?;
        }
        write!(self.out, "</{name}>")
    }

    fn attributes(&mut self, id: NodeId) -> fmt::Result {
        let arena = self.arena;
        for &attr in arena.attributes(id) {
            let data = arena.attr(attr);
            write!(self.out, " {}=\"", data.name)?;
            write_escaped_attr(&mut *self.out, &data.value)?;
            self.out.write_char('"')?;
        }
        Ok(())
    }
}

/// A literal in a DOCTYPE external id. Single quotes are used when the
/// value itself contains a double quote.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.contains('"') {
            write!(f, "'{}'", self.0)
        } else {
            write!(f, "\"{}\"", self.0)
        }
    }
}

/// Returns `true` if the element has element children and no text other
/// than whitespace, so indentation cannot change its content.
fn is_element_only(arena: &Arena, id: NodeId) -> bool {
    let mut has_element_child = false;
    for child in arena.children(id) {
        match &arena.node(child).kind {
            NodeKind::Element { .. } => has_element_child = true,
            NodeKind::Text { content } if !content.trim().is_empty() => return false,
            NodeKind::CData { .. } => return false,
            _ => {}
        }
    }
    has_element_child
}

fn is_blank_text(arena: &Arena, id: NodeId) -> bool {
    matches!(&arena.node(id).kind, NodeKind::Text { content } if content.trim().is_empty())
}

/// Escapes character data. `\t` and `\n` pass through; `\r` becomes a
/// character reference so it survives line-end normalization on reparse.
fn write_escaped_text<W: Write>(out: &mut W, text: &str) -> fmt::Result {
    for ch in text.chars() {
        match ch {
            '&' => out.write_str("&amp;")?,
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '\r' => out.write_str("&#13;")?,
            '\t' | '\n' => out.write_char(ch)?,
            c if (c as u32) < 0x20 => write!(out, "&#x{:X};", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    Ok(())
}

/// Escapes an attribute value for a double-quoted literal. Whitespace
/// other than the space character is written as a reference because the
/// parser normalizes literal tabs and newlines to spaces.
fn write_escaped_attr<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    for ch in value.chars() {
        match ch {
            '&' => out.write_str("&amp;")?,
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '"' => out.write_str("&quot;")?,
            '\t' => out.write_str("&#9;")?,
            '\n' => out.write_str("&#10;")?,
            '\r' => out.write_str("&#13;")?,
            c if (c as u32) < 0x20 => write!(out, "&#x{:X};", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    Ok(())
}

/// Writes a CDATA section. A `]]>` inside the content is split across two
/// sections.
fn write_cdata<W: Write>(out: &mut W, content: &str) -> fmt::Result {
    out.write_str("<![CDATA[")?;
    let mut parts = content.split("]]>");
    if let Some(first) = parts.next() {
        out.write_str(first)?;
    }
    for part in parts {
        out.write_str("]]]]><![CDATA[>")?;
        out.write_str(part)?;
    }
    out.write_str("]]>")
}
