//! Cursor over the raw input with the lexical primitives the tree builder
//! needs.
//!
//! [`ParserInput`] tracks the byte position together with line and column
//! so every error can point at the offending input. It also enforces the
//! resource limits from [`ParseOptions`](super::ParseOptions): nesting
//! depth, name length and the number of references expanded.

use crate::error::{ParseError, SourceLocation};

/// Default maximum element nesting depth.
pub(crate) const DEFAULT_MAX_DEPTH: u32 = 256;

/// Default maximum number of attributes on a single element.
pub(crate) const DEFAULT_MAX_ATTRIBUTES: u32 = 256;

/// Default maximum length (in bytes) of an element or attribute name.
pub(crate) const DEFAULT_MAX_NAME_LENGTH: usize = 50_000;

/// Default maximum number of references expanded per document.
pub(crate) const DEFAULT_MAX_ENTITY_EXPANSIONS: u32 = 10_000;

// -------------------------------------------------------------------------
// Character classes (XML 1.0 §2.2, §2.3)
// -------------------------------------------------------------------------

/// Returns `true` if `c` matches the XML 1.0 `Char` production.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` may start an XML name.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` may appear after the first character of a name.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

// -------------------------------------------------------------------------
// ParserInput
// -------------------------------------------------------------------------

pub(crate) struct ParserInput<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    depth: u32,
    max_depth: u32,
    max_name_length: usize,
    expansions: u32,
    max_expansions: u32,
}

impl<'a> ParserInput<'a> {
    /// Creates a cursor at the start of `input` with default limits.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            expansions: 0,
            max_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
        }
    }

    pub fn set_max_depth(&mut self, max: u32) {
        self.max_depth = max;
    }

    pub fn set_max_name_length(&mut self, max: usize) {
        self.max_name_length = max;
    }

    pub fn set_max_entity_expansions(&mut self, max: u32) {
        self.max_expansions = max;
    }

    // -- Depth tracking --

    /// Enters one element level, failing once the depth limit is passed.
    pub fn increment_depth(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.fatal(format!(
                "maximum nesting depth exceeded ({})",
                self.max_depth
            )));
        }
        Ok(())
    }

    pub fn decrement_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // -- Position --

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    // -- Peeking --

    pub fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Returns `true` if the unread input starts with `s`.
    pub fn looking_at(&self, s: &[u8]) -> bool {
        self.rest().as_bytes().starts_with(s)
    }

    // -- Advancing --

    /// Advances over `count` bytes. Callers only pass counts that end on a
    /// character boundary (ASCII delimiters they have just matched).
    pub fn advance(&mut self, count: usize) {
        let end = (self.pos + count).min(self.input.len());
        for b in &self.input.as_bytes()[self.pos..end] {
            if *b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if *b & 0xC0 != 0x80 {
                self.column += 1;
            }
        }
        self.pos = end;
    }

    fn advance_char(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += ch.len_utf8();
    }

    /// Consumes one character, folding `\r\n` and lone `\r` into `\n` and
    /// rejecting characters outside the XML `Char` production.
    pub fn next_char(&mut self) -> Result<char, ParseError> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        if !is_xml_char(ch) {
            return Err(self.fatal(format!("invalid XML character: U+{:04X}", ch as u32)));
        }
        self.advance_char(ch);
        if ch == '\r' {
            if self.peek() == Some(b'\n') {
                self.advance(1);
            }
            return Ok('\n');
        }
        Ok(ch)
    }

    pub fn expect_byte(&mut self, expected: u8) -> Result<(), ParseError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(_) => {
                let found = self.peek_char().unwrap_or('\u{FFFD}');
                Err(self.fatal(format!(
                    "expected '{}', found '{found}'",
                    expected as char
                )))
            }
            None => Err(self.fatal(format!(
                "expected '{}', found end of input",
                expected as char
            ))),
        }
    }

    pub fn expect_str(&mut self, expected: &[u8]) -> Result<(), ParseError> {
        expected.iter().try_for_each(|&b| self.expect_byte(b))
    }

    /// Skips XML whitespace. Returns `true` if anything was consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let count = self
            .rest()
            .bytes()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .count();
        self.advance(count);
        count > 0
    }

    pub fn skip_whitespace_required(&mut self) -> Result<(), ParseError> {
        if self.skip_whitespace() {
            Ok(())
        } else {
            Err(self.fatal("whitespace required"))
        }
    }

    /// Consumes ASCII bytes while `pred` holds and returns them.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        let count = self
            .rest()
            .bytes()
            .take_while(|&b| b.is_ascii() && pred(b))
            .count();
        self.advance(count);
        &self.input[start..self.pos]
    }

    /// Consumes everything up to (not including) `delimiter` and returns it
    /// raw. Fails with `context` in the message if the input ends first.
    pub fn take_until(&mut self, delimiter: &str, context: &str) -> Result<&'a str, ParseError> {
        let Some(len) = self.rest().find(delimiter) else {
            self.advance(self.input.len() - self.pos);
            return Err(self.fatal(format!("unexpected end of input in {context}")));
        };
        let start = self.pos;
        self.advance(len);
        Ok(&self.input[start..self.pos])
    }

    // -- Names --

    /// Parses an XML `Name`, enforcing the configured length limit.
    pub fn parse_name(&mut self) -> Result<String, ParseError> {
        let first = self
            .peek_char()
            .ok_or_else(|| self.fatal("expected name, found end of input"))?;
        if !is_name_start_char(first) {
            return Err(self.fatal(format!("invalid name start character: '{first}'")));
        }

        let start = self.pos;
        let len: usize = self
            .rest()
            .chars()
            .take_while(|&c| is_name_char(c))
            .map(char::len_utf8)
            .sum();
        if len > self.max_name_length {
            return Err(self.fatal(format!(
                "name length ({len}) exceeds maximum ({})",
                self.max_name_length
            )));
        }
        self.advance(len);
        Ok(self.input[start..self.pos].to_string())
    }

    // -- References --

    /// Parses `&name;` or `&#...;` and returns the replacement character.
    ///
    /// Only the five predefined entities are known. Every reference counts
    /// against the expansion limit.
    pub fn parse_reference(&mut self) -> Result<char, ParseError> {
        self.expansions += 1;
        if self.expansions > self.max_expansions {
            return Err(self.fatal(format!(
                "entity expansion limit exceeded ({})",
                self.max_expansions
            )));
        }

        self.expect_byte(b'&')?;

        if self.peek() != Some(b'#') {
            let name = self.parse_name()?;
            self.expect_byte(b';')?;
            return match name.as_str() {
                "amp" => Ok('&'),
                "lt" => Ok('<'),
                "gt" => Ok('>'),
                "apos" => Ok('\''),
                "quot" => Ok('"'),
                _ => Err(self.fatal(format!("unknown entity reference: &{name};"))),
            };
        }

        self.advance(1);
        let (digits, radix) = if self.peek() == Some(b'x') {
            self.advance(1);
            (self.take_while(|b| b.is_ascii_hexdigit()), 16)
        } else {
            (self.take_while(|b| b.is_ascii_digit()), 10)
        };
        if digits.is_empty() {
            return Err(self.fatal("empty character reference"));
        }
        let value = u32::from_str_radix(digits, radix)
            .map_err(|_| self.fatal(format!("character reference out of range: {digits}")))?;
        self.expect_byte(b';')?;

        char::from_u32(value)
            .filter(|&c| is_xml_char(c))
            .ok_or_else(|| {
                self.fatal(format!(
                    "character reference &#x{value:X}; is not a valid XML character"
                ))
            })
    }

    // -- Quoted values --

    /// Parses a quoted attribute value, resolving references and
    /// normalizing literal tab, CR and LF to spaces.
    pub fn parse_attribute_value(&mut self) -> Result<String, ParseError> {
        let quote = self.opening_quote("attribute value must be quoted")?;

        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.fatal("unexpected end of input in attribute value")),
                Some(b) if b == quote => {
                    self.advance(1);
                    return Ok(value);
                }
                Some(b'&') => value.push(self.parse_reference()?),
                Some(b'<') => return Err(self.fatal("'<' not allowed in attribute values")),
                Some(_) => match self.next_char()? {
                    '\t' | '\n' => value.push(' '),
                    ch => value.push(ch),
                },
            }
        }
    }

    /// Parses a quoted literal verbatim (no reference resolution).
    pub fn parse_quoted_value(&mut self) -> Result<String, ParseError> {
        let quote = self.opening_quote("expected quoted value")?;
        let delimiter = if quote == b'"' { "\"" } else { "'" };
        let value = self.take_until(delimiter, "quoted value")?.to_string();
        self.advance(1);
        Ok(value)
    }

    fn opening_quote(&mut self, message: &str) -> Result<u8, ParseError> {
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                self.advance(1);
                Ok(q)
            }
            _ => Err(self.fatal(message)),
        }
    }

    /// Builds a `ParseError` at the current position.
    pub fn fatal(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            location: self.location(),
        }
    }
}

// -------------------------------------------------------------------------
// Markup constructs shared by the tree builder
// -------------------------------------------------------------------------

/// Parses `<!-- ... -->` and returns the text between the delimiters.
pub(crate) fn parse_comment_content(input: &mut ParserInput<'_>) -> Result<String, ParseError> {
    input.expect_str(b"<!--")?;
    let mut content = String::new();
    loop {
        if input.looking_at(b"-->") {
            input.advance(3);
            return Ok(content);
        }
        if input.looking_at(b"--") {
            return Err(input.fatal("'--' not allowed inside comments"));
        }
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in comment"));
        }
        content.push(input.next_char()?);
    }
}

/// Parses `<![CDATA[ ... ]]>` and returns the raw section content.
pub(crate) fn parse_cdata_content(input: &mut ParserInput<'_>) -> Result<String, ParseError> {
    input.expect_str(b"<![CDATA[")?;
    let mut content = String::new();
    while !input.looking_at(b"]]>") {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in CDATA section"));
        }
        content.push(input.next_char()?);
    }
    input.advance(3);
    Ok(content)
}

/// Parses `<?target data?>` and returns the target and the optional data.
pub(crate) fn parse_pi_content(
    input: &mut ParserInput<'_>,
) -> Result<(String, Option<String>), ParseError> {
    input.expect_str(b"<?")?;
    let target = input.parse_name()?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(input.fatal("PI target 'xml' is reserved"));
    }

    if !input.skip_whitespace() {
        input.expect_str(b"?>")?;
        return Ok((target, None));
    }

    let mut data = String::new();
    while !input.looking_at(b"?>") {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in processing instruction"));
        }
        data.push(input.next_char()?);
    }
    input.advance(2);
    Ok((target, (!data.is_empty()).then_some(data)))
}

/// Pseudo-attributes of an XML declaration, in the order they appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl XmlDeclaration {
    /// Returns the declared pseudo-attributes as name/value pairs.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("version", self.version.clone())];
        if let Some(encoding) = &self.encoding {
            pairs.push(("encoding", encoding.clone()));
        }
        if let Some(standalone) = &self.standalone {
            pairs.push(("standalone", standalone.clone()));
        }
        pairs
    }
}

/// Parses `<?xml version="..." encoding="..." standalone="..."?>`.
///
/// `version` is required and must be `1.` followed by digits. `encoding`
/// must be a valid encoding name and `standalone` must be `yes` or `no`.
/// Each optional pseudo-attribute needs whitespace before it.
pub(crate) fn parse_xml_decl(input: &mut ParserInput<'_>) -> Result<XmlDeclaration, ParseError> {
    input.expect_str(b"<?xml")?;
    input.skip_whitespace_required()?;

    let version = parse_pseudo_attribute(input, b"version")?;
    if !is_valid_version_num(&version) {
        return Err(input.fatal(format!("invalid version number: '{version}'")));
    }

    let mut separated = input.skip_whitespace();
    let encoding = if input.looking_at(b"encoding") {
        if !separated {
            return Err(input.fatal("whitespace required before encoding"));
        }
        let enc = parse_pseudo_attribute(input, b"encoding")?;
        if !is_valid_encoding_name(&enc) {
            return Err(input.fatal(format!("invalid encoding name: '{enc}'")));
        }
        separated = input.skip_whitespace();
        Some(enc)
    } else {
        None
    };

    let standalone = if input.looking_at(b"standalone") {
        if !separated {
            return Err(input.fatal("whitespace required before standalone"));
        }
        let value = parse_pseudo_attribute(input, b"standalone")?;
        if value != "yes" && value != "no" {
            return Err(input.fatal("standalone must be 'yes' or 'no'"));
        }
        input.skip_whitespace();
        Some(value)
    } else {
        None
    };

    input.expect_str(b"?>")?;

    Ok(XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}

fn parse_pseudo_attribute(input: &mut ParserInput<'_>, name: &[u8]) -> Result<String, ParseError> {
    input.expect_str(name)?;
    input.skip_whitespace();
    input.expect_byte(b'=')?;
    input.skip_whitespace();
    input.parse_quoted_value()
}

fn is_valid_version_num(s: &str) -> bool {
    s.strip_prefix("1.")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn is_valid_encoding_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}
