//! Tree-building recursive descent parser.

use tracing::debug;

use crate::error::ParseError;
use crate::tree::{Arena, NodeId, NodeKind};

use super::input::{
    parse_cdata_content, parse_comment_content, parse_pi_content, parse_xml_decl, ParserInput,
};
use super::ParseOptions;

pub(crate) struct XmlParser<'a> {
    input: ParserInput<'a>,
    arena: Arena,
    options: &'a ParseOptions,
}

impl<'a> XmlParser<'a> {
    pub fn new(input: &'a str, options: &'a ParseOptions) -> Self {
        let mut cursor = ParserInput::new(input);
        cursor.set_max_depth(options.max_depth);
        cursor.set_max_name_length(options.max_name_length);
        cursor.set_max_entity_expansions(options.max_entity_expansions);

        Self {
            input: cursor,
            arena: Arena::new(),
            options,
        }
    }

    /// Parses the whole input: prolog, exactly one root element, epilog.
    pub fn parse(&mut self) -> Result<Arena, ParseError> {
        let root = self.arena.root();

        if self.looking_at_xml_decl() {
            self.parse_xml_declaration(root)?;
        } else if self.input.skip_whitespace() && self.looking_at_xml_decl() {
            return Err(self
                .input
                .fatal("XML declaration must be at the start of the document"));
        }

        self.parse_misc(root)?;

        if self.input.looking_at(b"<!DOCTYPE") {
            self.parse_doctype(root)?;
            self.parse_misc(root)?;
        }

        if self.input.peek() == Some(b'<') && !self.input.looking_at(b"<!") {
            self.parse_element(root)?;
        } else {
            return Err(self.input.fatal("missing root element"));
        }

        self.parse_misc(root)?;
        if !self.input.at_end() {
            return Err(self.input.fatal("content after document element"));
        }

        debug!(
            nodes = self.arena.node_count(),
            attributes = self.arena.attribute_count(),
            "parsed document"
        );
        Ok(std::mem::take(&mut self.arena))
    }

    fn looking_at_xml_decl(&self) -> bool {
        [b"<?xml ", b"<?xml\t", b"<?xml\n", b"<?xml\r"]
            .iter()
            .any(|prefix| self.input.looking_at(*prefix))
    }

    fn parse_xml_declaration(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let decl = parse_xml_decl(&mut self.input)?;
        let node = self.arena.create_node(NodeKind::Declaration {
            attributes: Vec::new(),
        });
        for (name, value) in decl.pairs() {
            let attr = self.arena.create_attribute(name, value);
            self.arena.append_attribute(node, attr);
        }
        self.arena.append_child(parent, node);
        Ok(())
    }

    /// Comments, PIs and whitespace outside the root element. The
    /// whitespace is dropped.
    fn parse_misc(&mut self, parent: NodeId) -> Result<(), ParseError> {
        loop {
            self.input.skip_whitespace();
            if self.input.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at(b"<?") {
                if self.looking_at_xml_decl() {
                    return Err(self
                        .input
                        .fatal("XML declaration must be at the start of the document"));
                }
                self.parse_processing_instruction(parent)?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_doctype(&mut self, parent: NodeId) -> Result<(), ParseError> {
        self.input.expect_str(b"<!DOCTYPE")?;
        self.input.skip_whitespace_required()?;
        let name = self.input.parse_name()?;
        self.input.skip_whitespace();

        let mut system_id = None;
        let mut public_id = None;
        if self.input.looking_at(b"SYSTEM") {
            self.input.expect_str(b"SYSTEM")?;
            self.input.skip_whitespace_required()?;
            system_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace();
        } else if self.input.looking_at(b"PUBLIC") {
            self.input.expect_str(b"PUBLIC")?;
            self.input.skip_whitespace_required()?;
            public_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace_required()?;
            system_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace();
        }

        let internal_subset = if self.input.peek() == Some(b'[') {
            self.input.advance(1);
            let subset = self.scan_internal_subset()?;
            self.input.skip_whitespace();
            Some(subset)
        } else {
            None
        };

        self.input.expect_byte(b'>')?;

        let doctype = self.arena.create_node(NodeKind::DocumentType {
            name,
            system_id,
            public_id,
            internal_subset,
        });
        self.arena.append_child(parent, doctype);
        Ok(())
    }

    /// Collects the internal subset verbatim up to its closing `]`, which
    /// is consumed. Brackets inside quoted literals and comments do not
    /// count.
    fn scan_internal_subset(&mut self) -> Result<String, ParseError> {
        let mut subset = String::new();
        let mut depth: u32 = 1;
        loop {
            if self.input.looking_at(b"<!--") {
                self.input.advance(4);
                let comment = self.input.take_until("-->", "internal subset")?;
                subset.push_str("<!--");
                subset.push_str(comment);
                subset.push_str("-->");
                self.input.advance(3);
                continue;
            }
            match self.input.peek() {
                None => return Err(self.input.fatal("unexpected end of input in internal subset")),
                Some(q @ (b'"' | b'\'')) => {
                    self.input.advance(1);
                    let delimiter = if q == b'"' { "\"" } else { "'" };
                    let literal = self.input.take_until(delimiter, "internal subset")?;
                    subset.push(q as char);
                    subset.push_str(literal);
                    subset.push(q as char);
                    self.input.advance(1);
                }
                Some(b'[') => {
                    depth += 1;
                    subset.push('[');
                    self.input.advance(1);
                }
                Some(b']') => {
                    depth -= 1;
                    self.input.advance(1);
                    if depth == 0 {
                        return Ok(subset);
                    }
                    subset.push(']');
                }
                Some(_) => subset.push(self.input.next_char()?),
            }
        }
    }

    fn parse_element(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        self.input.increment_depth()?;
        let start = self.input.location();
        self.input.expect_byte(b'<')?;
        let name = self.input.parse_name()?;
        let element = self.arena.create_node(NodeKind::element(name.clone()));

        let mut count: u32 = 0;
        loop {
            let had_ws = self.input.skip_whitespace();
            if self.input.peek() == Some(b'>') || self.input.looking_at(b"/>") {
                break;
            }
            if !had_ws {
                return Err(self.input.fatal("whitespace required between attributes"));
            }
            count += 1;
            if count > self.options.max_attributes {
                return Err(self.input.fatal(format!(
                    "too many attributes on <{name}> (maximum {})",
                    self.options.max_attributes
                )));
            }
            self.parse_attribute(element)?;
        }

        self.arena.append_child(parent, element);

        if self.input.looking_at(b"/>") {
            self.input.advance(2);
            self.input.decrement_depth();
            return Ok(element);
        }
        self.input.expect_byte(b'>')?;

        self.parse_content(element)?;

        self.input.expect_str(b"</")?;
        let end_name = self.input.parse_name()?;
        if end_name != name {
            return Err(self.input.fatal(format!(
                "mismatched end tag: expected </{name}>, found </{end_name}> \
                 (element opened at {start})"
            )));
        }
        self.input.skip_whitespace();
        self.input.expect_byte(b'>')?;
        self.input.decrement_depth();

        Ok(element)
    }

    fn parse_attribute(&mut self, element: NodeId) -> Result<(), ParseError> {
        let name = self.input.parse_name()?;
        if self.arena.find_attribute(element, &name).is_some() {
            return Err(self.input.fatal(format!("duplicate attribute: '{name}'")));
        }
        self.input.skip_whitespace();
        self.input.expect_byte(b'=')?;
        self.input.skip_whitespace();
        let value = self.input.parse_attribute_value()?;

        let attr = self.arena.create_attribute(name, value);
        self.arena.append_attribute(element, attr);
        Ok(())
    }

    fn parse_content(&mut self, parent: NodeId) -> Result<(), ParseError> {
        loop {
            if self.input.at_end() {
                return Err(self
                    .input
                    .fatal("unexpected end of input in element content"));
            }
            if self.input.looking_at(b"</") {
                return Ok(());
            }

            if self.input.looking_at(b"<![CDATA[") {
                self.parse_cdata(parent)?;
            } else if self.input.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at(b"<?") {
                self.parse_processing_instruction(parent)?;
            } else if self.input.peek() == Some(b'<') {
                self.parse_element(parent)?;
            } else {
                self.parse_char_data(parent)?;
            }
        }
    }

    fn parse_char_data(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let mut text = String::new();

        while let Some(b) = self.input.peek() {
            match b {
                b'<' => break,
                b'&' => text.push(self.input.parse_reference()?),
                b']' if self.input.looking_at(b"]]>") => {
                    return Err(self.input.fatal("']]>' not allowed in character data"));
                }
                _ => text.push(self.input.next_char()?),
            }
        }

        if text.is_empty() || (self.options.no_blanks && text.chars().all(char::is_whitespace)) {
            return Ok(());
        }
        let node = self.arena.create_node(NodeKind::text(text));
        self.arena.append_child(parent, node);
        Ok(())
    }

    fn parse_comment(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let content = parse_comment_content(&mut self.input)?;
        let node = self.arena.create_node(NodeKind::Comment { content });
        self.arena.append_child(parent, node);
        Ok(())
    }

    fn parse_cdata(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let content = parse_cdata_content(&mut self.input)?;
        let node = self.arena.create_node(NodeKind::CData { content });
        self.arena.append_child(parent, node);
        Ok(())
    }

    fn parse_processing_instruction(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let (target, data) = parse_pi_content(&mut self.input)?;
        let node = self
            .arena
            .create_node(NodeKind::ProcessingInstruction { target, data });
        self.arena.append_child(parent, node);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{parse_str, parse_str_with_options};
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Arena {
        parse_str(input).unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    fn root_of(arena: &Arena) -> NodeId {
        arena
            .root_element()
            .unwrap_or_else(|| panic!("no root element"))
    }

    fn kinds(arena: &Arena, id: NodeId) -> Vec<NodeKind> {
        arena
            .children(id)
            .map(|child| arena.node(child).kind.clone())
            .map(|kind| match kind {
                NodeKind::Element { name, .. } => NodeKind::element(name),
                other => other,
            })
            .collect()
    }

    #[test]
    fn test_parse_empty_element() {
        let arena = parse("<root/>");
        let root = root_of(&arena);
        assert_eq!(arena.node_name(root), Some("root"));
        assert_eq!(arena.first_child(root), None);
        assert_eq!(arena.declaration(), None);
    }

    #[test]
    fn test_parse_nested_elements_and_text() {
        let arena = parse("<root><a>one</a><b/>tail</root>");
        let root = root_of(&arena);
        assert_eq!(
            kinds(&arena, root),
            vec![
                NodeKind::element("a"),
                NodeKind::element("b"),
                NodeKind::text("tail"),
            ]
        );
        let a = arena.first_child(root).unwrap();
        assert_eq!(arena.element_value(a), "one");
    }

    #[test]
    fn test_parse_attributes_in_order() {
        let arena = parse("<root b='2' a=\"1\" c = \"3\"/>");
        let root = root_of(&arena);
        let pairs: Vec<(&str, &str)> = arena
            .attributes(root)
            .iter()
            .map(|&id| (arena.attr(id).name.as_str(), arena.attr(id).value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1"), ("c", "3")]);
    }

    #[test]
    fn test_parse_declaration_attributes() {
        let arena = parse("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root/>");
        let decl = arena.declaration().unwrap();
        assert_eq!(arena.attribute(decl, "version"), Some("1.0"));
        assert_eq!(arena.attribute(decl, "encoding"), Some("UTF-8"));
        assert_eq!(arena.attribute(decl, "standalone"), None);
        // Whitespace between top-level nodes is not kept.
        assert_eq!(arena.children(arena.root()).count(), 2);
    }

    #[test]
    fn test_parse_references() {
        let arena = parse("<r a=\"&lt;&#x41;&gt;\">&amp;&#66;&apos;&quot;</r>");
        let root = root_of(&arena);
        assert_eq!(arena.attribute(root, "a"), Some("<A>"));
        assert_eq!(arena.element_value(root), "&B'\"");
    }

    #[test]
    fn test_parse_comment_cdata_pi() {
        let arena = parse("<!--top--><r><![CDATA[<x>]]><?pi data?><!--in--></r><?end?>");
        let root = root_of(&arena);
        assert_eq!(
            kinds(&arena, root),
            vec![
                NodeKind::CData {
                    content: "<x>".to_string()
                },
                NodeKind::ProcessingInstruction {
                    target: "pi".to_string(),
                    data: Some("data".to_string()),
                },
                NodeKind::Comment {
                    content: "in".to_string()
                },
            ]
        );
        assert_eq!(arena.children(arena.root()).count(), 3);
    }

    #[test]
    fn test_parse_doctype() {
        let arena = parse(
            "<!DOCTYPE note PUBLIC \"-//X//EN\" \"note.dtd\" [<!ENTITY a \"]\"><!-- ] -->]><note/>",
        );
        let doctype = arena.first_child(arena.root()).unwrap();
        assert_eq!(
            arena.node(doctype).kind,
            NodeKind::DocumentType {
                name: "note".to_string(),
                system_id: Some("note.dtd".to_string()),
                public_id: Some("-//X//EN".to_string()),
                internal_subset: Some("<!ENTITY a \"]\"><!-- ] -->".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_crlf_normalized_in_text() {
        let arena = parse("<r>a\r\nb\rc</r>");
        assert_eq!(arena.element_value(root_of(&arena)), "a\nb\nc");
    }

    #[test]
    fn test_no_blanks_drops_whitespace_text() {
        let input = "<r>\n  <a> </a>\n</r>";
        let kept = parse(input);
        assert_eq!(kept.children(root_of(&kept)).count(), 3);

        let opts = ParseOptions::default().no_blanks(true);
        let stripped = parse_str_with_options(input, &opts).unwrap();
        let root = root_of(&stripped);
        assert_eq!(kinds(&stripped, root), vec![NodeKind::element("a")]);
    }

    #[test]
    fn test_error_mismatched_end_tag() {
        let err = parse_str("<a>\n<b></a>").unwrap_err();
        assert!(err.message.starts_with("mismatched end tag: expected </b>, found </a>"));
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn test_error_missing_root() {
        for input in ["", "   ", "<!-- only -->", "text"] {
            let err = parse_str(input).unwrap_err();
            assert_eq!(err.message, "missing root element", "{input:?}");
        }
    }

    #[test]
    fn test_error_content_after_root() {
        let err = parse_str("<a/><b/>").unwrap_err();
        assert_eq!(err.message, "content after document element");
    }

    #[test]
    fn test_error_duplicate_attribute() {
        let err = parse_str("<a x='1' x='2'/>").unwrap_err();
        assert_eq!(err.message, "duplicate attribute: 'x'");
    }

    #[test]
    fn test_error_late_declaration() {
        assert!(parse_str(" <?xml version=\"1.0\"?><a/>").is_err());
        assert!(parse_str("<!--c--><?xml version=\"1.0\"?><a/>").is_err());
    }

    #[test]
    fn test_error_unterminated() {
        let err = parse_str("<a><b>").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "<a>".repeat(10), "</a>".repeat(10));
        let opts = ParseOptions::default().max_depth(5);
        let err = parse_str_with_options(&deep, &opts).unwrap_err();
        assert!(err.message.contains("nesting depth"));
        assert!(parse_str(&deep).is_ok());
    }

    #[test]
    fn test_attribute_limit() {
        let opts = ParseOptions::default().max_attributes(2);
        assert!(parse_str_with_options("<a x='1' y='2'/>", &opts).is_ok());
        let err = parse_str_with_options("<a x='1' y='2' z='3'/>", &opts).unwrap_err();
        assert!(err.message.contains("too many attributes"));
    }
}
