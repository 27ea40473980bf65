//! Unified Scanner with ScanHandler Trait
//!
//! One well-formedness scanner drives every consumer of markup:
//! - the tree builder (DOM)
//! - the SAX event bridge (streaming)
//!
//! The scanner resolves character and entity references, normalizes
//! attribute values and reports recoverable problems through
//! [`ScanHandler::error`] while it keeps going. Fatal problems end the
//! scan: they are reported to the handler and returned.

use super::attributes::{needs_normalization, push_normalized, Attribute};
use super::dtd::{find_subset_end, parse_declarations, DocTypeDecl, EntityTable, EntityValue};
use super::encoding::decode_input;
use super::entities::{decode_char_ref, decode_predefined, find_invalid_char, predefined_entity};
use super::scanner::{is_name_start_byte, is_xml_whitespace, Scanner};
use crate::error::ParseError;
use crate::options::ParseOptions;
use memchr::memchr;
use std::borrow::Cow;

/// Nesting limit for entity references inside entity replacement text
const MAX_ENTITY_DEPTH: usize = 40;
/// Total replacement text one document may expand to
const MAX_ENTITY_EXPANSION: usize = 10_000_000;

/// Trait for handling scan events
///
/// Text inside a CDATA section arrives as [`characters`](Self::characters)
/// between [`start_cdata`](Self::start_cdata) and
/// [`end_cdata`](Self::end_cdata). A self-closing element produces
/// `start_element` immediately followed by `end_element`.
pub trait ScanHandler {
    fn start_document(&mut self) {}

    fn end_document(&mut self) {}

    /// Called for the XML declaration
    fn xml_declaration(&mut self, _version: &str, _encoding: Option<&str>, _standalone: Option<bool>) {}

    /// Called once the DOCTYPE (and any subsets) have been read
    fn doctype(&mut self, _decl: &DocTypeDecl) {}

    /// Called when an element starts
    ///
    /// # Arguments
    /// * `name` - Qualified element name
    /// * `attrs` - Attributes in document order, namespace declarations included
    fn start_element(&mut self, name: &str, attrs: &[Attribute<'_>]);

    fn end_element(&mut self, name: &str);

    /// One contiguous run of character data
    fn characters(&mut self, text: &str);

    fn start_cdata(&mut self) {}

    fn end_cdata(&mut self) {}

    fn comment(&mut self, text: &str);

    fn processing_instruction(&mut self, target: &str, data: Option<&str>);

    /// An entity reference kept as a reference (substitution disabled or
    /// entity undefined). `replacement` is None for undefined entities.
    fn entity_reference(&mut self, _name: &str, _replacement: Option<&str>) {}

    /// A well-formedness problem. Fatal ones are also returned from `scan`.
    fn error(&mut self, _error: &ParseError) {}

    fn warning(&mut self, _message: &str) {}
}

/// Decode raw bytes and scan them with `handler`
pub fn scan_bytes<H: ScanHandler>(
    bytes: &[u8],
    hint: Option<&str>,
    options: &ParseOptions,
    handler: &mut H,
) -> Result<(), ParseError> {
    let decoded = decode_input(bytes, hint).inspect_err(|e| handler.error(e))?;
    let text = normalize_newlines(&decoded);
    UnifiedScanner::new(&text, options).scan(handler)
}

/// Unified scanner that uses ScanHandler for event dispatch
pub struct UnifiedScanner<'a> {
    input: &'a str,
    options: &'a ParseOptions,
    entities: EntityTable,
    /// Names of open elements
    stack: Vec<String>,
    /// Pending character data, flushed before any other event
    text: String,
    seen_root: bool,
    seen_doctype: bool,
    /// Entities currently being expanded, innermost last
    expanding: Vec<String>,
    expanded_bytes: usize,
    /// Input offset of the outermost reference being expanded
    anchor: usize,
    /// Stack depth when the current entity expansion started
    entity_base: usize,
}

impl<'a> UnifiedScanner<'a> {
    /// Create a scanner over decoded, newline-normalized text
    pub fn new(input: &'a str, options: &'a ParseOptions) -> Self {
        Self {
            input,
            options,
            entities: EntityTable::new(),
            stack: Vec::with_capacity(16),
            text: String::new(),
            seen_root: false,
            seen_doctype: false,
            expanding: Vec::new(),
            expanded_bytes: 0,
            anchor: 0,
            entity_base: 0,
        }
    }

    /// Scan the entire document, calling handler methods for each token
    pub fn scan<H: ScanHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        handler.start_document();
        match self.scan_document(handler) {
            Ok(()) => {
                handler.end_document();
                Ok(())
            }
            Err(e) => {
                handler.error(&e);
                Err(e)
            }
        }
    }

    fn scan_document<H: ScanHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        let input = self.input;
        let mut s = Scanner::new(input);

        if s.starts_with("<?xml") && matches!(s.peek_at(5), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.scan_xml_declaration(&mut s, handler)?;
        }

        while !s.is_eof() {
            self.scan_step(&mut s, handler, 0)?;
        }
        self.flush_text(handler);

        if let Some(open) = self.stack.last() {
            return Err(self.error(format!("Premature end of data in tag {}", open), input.len()));
        }
        if !self.seen_root {
            return Err(self.error("Document is empty", input.len()));
        }
        Ok(())
    }

    fn scan_step<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        match s.peek() {
            Some(b'<') => self.scan_markup(s, handler, depth),
            Some(b'&') => self.scan_reference(s, handler, depth),
            Some(_) => self.scan_text(s, handler, depth),
            None => Ok(()),
        }
    }

    // ---- diagnostics ----

    /// Offset errors are reported at; inside entity text that is the
    /// reference that started the expansion
    #[inline]
    fn offset(&self, pos: usize, depth: usize) -> usize {
        if depth == 0 {
            pos
        } else {
            self.anchor
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> ParseError {
        ParseError::at(message, self.input, offset)
    }

    fn recoverable<H: ScanHandler>(&self, handler: &mut H, message: impl Into<String>, offset: usize) {
        handler.error(&self.error(message, offset));
    }

    fn warn<H: ScanHandler>(&self, handler: &mut H, message: String) {
        log::warn!("{}", message);
        handler.warning(&message);
    }

    /// Literal text must consist of XML Chars
    fn check_chars(&self, text: &str, what: &str, offset: usize) -> Result<(), ParseError> {
        match find_invalid_char(text) {
            Some(c) => Err(self.error(format!("{} invalid Char value {}", what, c as u32), offset)),
            None => Ok(()),
        }
    }

    fn outside_root(&self, offset: usize) -> ParseError {
        if self.seen_root {
            self.error("Extra content at the end of the document", offset)
        } else {
            self.error("Start tag expected, '<' not found", offset)
        }
    }

    fn flush_text<H: ScanHandler>(&mut self, handler: &mut H) {
        if !self.text.is_empty() {
            handler.characters(&self.text);
            self.text.clear();
        }
    }

    // ---- character data and references ----

    fn scan_text<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let start = s.position();
        let end = s
            .find_text_boundary()
            .unwrap_or(start + s.rest().len());
        let text = s.slice(start, end);
        s.set_position(end);

        if self.stack.is_empty() {
            if is_xml_whitespace(text) {
                return Ok(());
            }
            return Err(self.outside_root(self.offset(start, depth)));
        }

        self.check_chars(text, "PCDATA", self.offset(start, depth))?;
        if text.contains("]]>") {
            self.recoverable(handler, "Sequence ']]>' not allowed in content", self.offset(start, depth));
        }
        self.text.push_str(text);
        Ok(())
    }

    fn scan_reference<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let amp = s.position();
        if self.stack.is_empty() {
            return Err(self.outside_root(self.offset(amp, depth)));
        }
        s.advance(1);

        if s.peek() == Some(b'#') {
            s.advance(1);
            let body_start = s.position();
            let semi = s.find_byte(b';');
            match semi.and_then(|p| decode_char_ref(s.slice(body_start, p)).map(|c| (c, p))) {
                Some((c, p)) => {
                    self.text.push(c);
                    s.set_position(p + 1);
                }
                None => {
                    self.recoverable(handler, "xmlParseCharRef: invalid xmlChar value", self.offset(amp, depth));
                    if let Some(p) = semi {
                        s.set_position(p + 1);
                    }
                }
            }
            return Ok(());
        }

        let name = match s.read_name() {
            Some(name) if s.peek() == Some(b';') => name,
            _ => {
                self.recoverable(handler, "xmlParseEntityRef: no name", self.offset(amp, depth));
                s.set_position(amp + 1);
                self.text.push('&');
                return Ok(());
            }
        };
        s.advance(1);

        if let Some(c) = predefined_entity(name) {
            self.text.push(c);
            return Ok(());
        }
        self.expand_entity(name, amp, handler, depth)
    }

    fn expand_entity<H: ScanHandler>(
        &mut self,
        name: &str,
        amp: usize,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let at = self.offset(amp, depth);
        let replacement = match self.entities.get(name).cloned() {
            None => {
                self.recoverable(handler, format!("Entity '{}' not defined", name), at);
                self.flush_text(handler);
                handler.entity_reference(name, None);
                return Ok(());
            }
            Some(EntityValue::Unparsed) => {
                self.recoverable(handler, format!("Entity reference to unparsed entity {}", name), at);
                return Ok(());
            }
            Some(EntityValue::Internal(text)) => text,
            Some(EntityValue::External { system_id, .. }) => {
                self.load_external_entity(name, &system_id, handler)
            }
        };

        if self.options.substitute_entities {
            if depth == 0 {
                self.anchor = amp;
            }
            self.scan_entity_content(name, &replacement, handler, depth)
        } else {
            self.flush_text(handler);
            handler.entity_reference(name, Some(&decode_predefined(&replacement)));
            Ok(())
        }
    }

    fn enter_entity(&mut self, name: &str, len: usize, depth: usize) -> Result<(), ParseError> {
        if depth >= MAX_ENTITY_DEPTH || self.expanding.iter().any(|n| n == name) {
            return Err(self.error("Detected an entity reference loop", self.anchor));
        }
        self.expanded_bytes += len;
        if self.expanded_bytes > MAX_ENTITY_EXPANSION {
            return Err(self.error("Maximum entity amplification factor exceeded", self.anchor));
        }
        self.expanding.push(name.to_string());
        Ok(())
    }

    /// Scan replacement text as content, in place of the reference
    fn scan_entity_content<H: ScanHandler>(
        &mut self,
        name: &str,
        text: &str,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        self.enter_entity(name, text.len(), depth)?;
        let saved_base = std::mem::replace(&mut self.entity_base, self.stack.len());

        let mut sub = Scanner::new(text);
        while !sub.is_eof() {
            self.scan_step(&mut sub, handler, depth + 1)?;
        }
        if self.stack.len() != self.entity_base {
            return Err(self.error(format!("Entity '{}' is not well balanced", name), self.anchor));
        }

        self.entity_base = saved_base;
        self.expanding.pop();
        Ok(())
    }

    /// Replacement text of an external parsed entity; empty when loading is
    /// disabled or fails
    fn load_external_entity<H: ScanHandler>(&self, name: &str, system_id: &str, handler: &mut H) -> String {
        if !self.options.load_external_subsets {
            self.warn(handler, format!("External entity '{}' not loaded: loading disabled", name));
            return String::new();
        }
        match self.read_external(system_id) {
            Ok(text) => strip_text_declaration(&text).to_string(),
            Err(message) => {
                self.warn(
                    handler,
                    format!("failed to load external entity \"{}\": {}", system_id, message),
                );
                String::new()
            }
        }
    }

    fn read_external(&self, system_id: &str) -> Result<String, String> {
        let path = self
            .options
            .resolve_system_id(system_id)
            .ok_or_else(|| "only local files can be loaded".to_string())?;
        let bytes = std::fs::read(&path).map_err(|e| e.to_string())?;
        let text = decode_input(&bytes, None).map_err(|e| e.to_string())?;
        log::debug!("loaded {} ({} bytes)", path.display(), bytes.len());
        Ok(normalize_newlines(&text).into_owned())
    }

    // ---- markup ----

    fn scan_markup<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        self.flush_text(handler);
        let start = s.position();

        if s.starts_with("</") {
            self.scan_end_tag(s, handler, depth)
        } else if s.starts_with("<!--") {
            self.scan_comment(s, handler, depth)
        } else if s.starts_with("<![CDATA[") {
            self.scan_cdata(s, handler, depth)
        } else if s.starts_with("<!DOCTYPE") {
            self.scan_doctype(s, handler, depth)
        } else if s.starts_with("<?") {
            self.scan_pi(s, handler, depth)
        } else if s.peek_at(1).is_some_and(is_name_start_byte) {
            self.scan_start_tag(s, handler, depth)
        } else {
            Err(self.error("StartTag: invalid element name", self.offset(start, depth)))
        }
    }

    fn scan_start_tag<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let tag_start = s.position();
        if self.stack.is_empty() && self.seen_root {
            return Err(self.outside_root(self.offset(tag_start, depth)));
        }
        s.advance(1);
        let name = s
            .read_name()
            .ok_or_else(|| self.error("StartTag: invalid element name", self.offset(tag_start, depth)))?;

        let mut attrs: Vec<Attribute<'_>> = Vec::new();
        let is_empty = loop {
            let had_space = s.skip_whitespace();
            match s.peek() {
                Some(b'>') => {
                    s.advance(1);
                    break false;
                }
                Some(b'/') if s.peek_at(1) == Some(b'>') => {
                    s.advance(2);
                    break true;
                }
                Some(b) if is_name_start_byte(b) && had_space => {
                    let attr = self.scan_attribute(s, handler, depth)?;
                    if attrs.iter().any(|a| a.name == attr.name) {
                        self.recoverable(
                            handler,
                            format!("Attribute {} redefined", attr.name),
                            self.offset(tag_start, depth),
                        );
                    } else {
                        attrs.push(attr);
                    }
                }
                None => {
                    return Err(self.error(
                        format!("Couldn't find end of Start Tag {}", name),
                        self.offset(tag_start, depth),
                    ));
                }
                _ => {
                    return Err(self.error("attributes construct error", self.offset(s.position(), depth)));
                }
            }
        };

        self.seen_root = true;
        handler.start_element(name, &attrs);
        if is_empty {
            handler.end_element(name);
        } else {
            self.stack.push(name.to_string());
        }
        Ok(())
    }

    fn scan_attribute<'s, H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'s>,
        handler: &mut H,
        depth: usize,
    ) -> Result<Attribute<'s>, ParseError> {
        let at = self.offset(s.position(), depth);
        let name = s
            .read_name()
            .ok_or_else(|| self.error("attributes construct error", at))?;

        s.skip_whitespace();
        if s.peek() != Some(b'=') {
            return Err(self.error(format!("Specification mandates value for attribute {}", name), at));
        }
        s.advance(1);
        s.skip_whitespace();

        let raw = s
            .read_quoted()
            .ok_or_else(|| self.error("AttValue: \" or ' expected", at))?;
        self.check_chars(raw, "AttValue:", at)?;
        if memchr(b'<', raw.as_bytes()).is_some() {
            self.recoverable(handler, "Unescaped '<' not allowed in attributes values", at);
        }

        let value = if memchr(b'&', raw.as_bytes()).is_none() && !needs_normalization(raw) {
            Cow::Borrowed(raw)
        } else {
            let mut out = String::with_capacity(raw.len());
            if depth == 0 {
                self.anchor = at;
            }
            self.append_attribute_text(raw, &mut out, handler, at, 0)?;
            Cow::Owned(out)
        };
        Ok(Attribute::new(name, value))
    }

    /// Normalize attribute text into `out`, replacing references.
    /// Internal entities are always substituted inside attribute values.
    fn append_attribute_text<H: ScanHandler>(
        &mut self,
        text: &str,
        out: &mut String,
        handler: &mut H,
        at: usize,
        depth: usize,
    ) -> Result<(), ParseError> {
        let mut rest = text;
        while let Some(amp) = memchr(b'&', rest.as_bytes()) {
            push_normalized(&rest[..amp], out);
            let after = &rest[amp + 1..];

            let Some(semi) = memchr(b';', after.as_bytes()) else {
                self.recoverable(handler, "xmlParseEntityRef: no name", at);
                out.push('&');
                rest = after;
                continue;
            };
            let reference = &after[..semi];

            if let Some(body) = reference.strip_prefix('#') {
                match decode_char_ref(body) {
                    Some(c) => out.push(c),
                    None => self.recoverable(handler, "xmlParseCharRef: invalid xmlChar value", at),
                }
                rest = &after[semi + 1..];
                continue;
            }
            if let Some(c) = predefined_entity(reference) {
                out.push(c);
                rest = &after[semi + 1..];
                continue;
            }
            if Scanner::new(reference).read_name() != Some(reference) {
                self.recoverable(handler, "xmlParseEntityRef: no name", at);
                out.push('&');
                rest = after;
                continue;
            }
            rest = &after[semi + 1..];

            match self.entities.get(reference).cloned() {
                Some(EntityValue::Internal(value)) => {
                    self.enter_entity(reference, value.len(), depth)?;
                    self.append_attribute_text(&value, out, handler, at, depth + 1)?;
                    self.expanding.pop();
                }
                Some(EntityValue::External { .. } | EntityValue::Unparsed) => {
                    self.recoverable(
                        handler,
                        format!("Attribute references external entity '{}'", reference),
                        at,
                    );
                }
                None => {
                    self.recoverable(handler, format!("Entity '{}' not defined", reference), at);
                }
            }
        }
        push_normalized(rest, out);
        Ok(())
    }

    fn scan_end_tag<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let at = self.offset(s.position(), depth);
        s.advance(2);
        let name = s
            .read_name()
            .ok_or_else(|| self.error("xmlParseEndTag: '</' not found", at))?;
        s.skip_whitespace();
        if s.peek() != Some(b'>') {
            return Err(self.error(format!("expected '>' at end of tag {}", name), at));
        }
        s.advance(1);

        let base = if depth == 0 { 0 } else { self.entity_base };
        match self.stack.last() {
            Some(open) if self.stack.len() > base => {
                if open != name {
                    return Err(self.error(
                        format!("Opening and ending tag mismatch: {} and {}", open, name),
                        at,
                    ));
                }
            }
            _ => return Err(self.error(format!("Unexpected end tag : {}", name), at)),
        }

        self.stack.pop();
        handler.end_element(name);
        Ok(())
    }

    fn scan_comment<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let at = self.offset(s.position(), depth);
        s.advance(4);
        let end = s
            .find_str("-->")
            .ok_or_else(|| self.error("Comment not terminated", at))?;
        let text = s.slice(s.position(), end);
        s.set_position(end + 3);

        self.check_chars(text, "Comment", at)?;
        if text.contains("--") || text.ends_with('-') {
            self.recoverable(handler, "Double hyphen within comment", at);
        }
        handler.comment(text);
        Ok(())
    }

    fn scan_cdata<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let at = self.offset(s.position(), depth);
        if self.stack.is_empty() {
            return Err(self.outside_root(at));
        }
        s.advance(9);
        let end = s
            .find_str("]]>")
            .ok_or_else(|| self.error("CData section not finished", at))?;
        let text = s.slice(s.position(), end);
        s.set_position(end + 3);
        self.check_chars(text, "CData section", at)?;

        handler.start_cdata();
        if !text.is_empty() {
            handler.characters(text);
        }
        handler.end_cdata();
        Ok(())
    }

    fn scan_pi<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let at = self.offset(s.position(), depth);
        s.advance(2);
        let target = s
            .read_name()
            .ok_or_else(|| self.error("xmlParsePI : no target name", at))?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.error("XML declaration allowed only at the start of the document", at));
        }

        let had_space = s.skip_whitespace();
        let end = s
            .find_str("?>")
            .ok_or_else(|| self.error(format!("PI {} never end ...", target), at))?;
        let data = s.slice(s.position(), end);
        if !data.is_empty() && !had_space {
            return Err(self.error(format!("ParsePI: PI {} space expected", target), at));
        }
        s.set_position(end + 2);

        handler.processing_instruction(target, (!data.is_empty()).then_some(data));
        Ok(())
    }

    fn scan_xml_declaration<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
    ) -> Result<(), ParseError> {
        let malformed = || self.error("parsing XML declaration: '?>' expected", 0);
        let end = s.find_str("?>").ok_or_else(malformed)?;
        let body = s.slice(s.position() + 5, end);
        s.set_position(end + 2);

        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;
        let mut d = Scanner::new(body);
        loop {
            d.skip_whitespace();
            if d.is_eof() {
                break;
            }
            let key = d.read_name().ok_or_else(malformed)?;
            d.skip_whitespace();
            if d.peek() != Some(b'=') {
                return Err(malformed());
            }
            d.advance(1);
            d.skip_whitespace();
            let value = d.read_quoted().ok_or_else(malformed)?;
            match key {
                "version" => version = Some(value),
                "encoding" => encoding = Some(value),
                "standalone" => standalone = Some(value),
                _ => return Err(malformed()),
            }
        }

        let version = version.ok_or_else(|| self.error("Malformed declaration expecting version", 0))?;
        let standalone = match standalone {
            None => None,
            Some("yes") => Some(true),
            Some("no") => Some(false),
            Some(other) => {
                self.warn(handler, format!("standalone accepts only 'yes' or 'no', got '{}'", other));
                None
            }
        };
        handler.xml_declaration(version, encoding, standalone);
        Ok(())
    }

    fn scan_doctype<H: ScanHandler>(
        &mut self,
        s: &mut Scanner<'_>,
        handler: &mut H,
        depth: usize,
    ) -> Result<(), ParseError> {
        let at = self.offset(s.position(), depth);
        if depth > 0 || self.seen_root || self.seen_doctype {
            return Err(self.error("DOCTYPE improperly placed", at));
        }
        s.advance(9);
        if !s.skip_whitespace() {
            return Err(self.error("Space required after 'DOCTYPE'", at));
        }
        let name = s
            .read_name()
            .ok_or_else(|| self.error("xmlParseDocTypeDecl : no DOCTYPE name !", at))?;
        s.skip_whitespace();

        let (public_id, system_id) = self.scan_external_id(s, at)?;
        s.skip_whitespace();

        let mut internal_subset = None;
        if s.peek() == Some(b'[') {
            s.advance(1);
            let subset_start = s.position();
            let len = find_subset_end(s.rest())
                .ok_or_else(|| self.error("DOCTYPE internal subset not finished", at))?;
            internal_subset = Some(s.slice(subset_start, subset_start + len));
            s.set_position(subset_start + len + 1);
            s.skip_whitespace();
        }
        if s.peek() != Some(b'>') {
            return Err(self.error("DOCTYPE improperly terminated", at));
        }
        s.advance(1);
        self.seen_doctype = true;

        if let Some(subset) = internal_subset {
            for problem in parse_declarations(subset, &mut self.entities) {
                self.recoverable(handler, problem, at);
            }
        }
        if let Some(system) = &system_id {
            self.load_external_subset(system, handler);
        }

        let decl = DocTypeDecl {
            name: name.to_string(),
            public_id,
            system_id,
            internal_subset: internal_subset.map(str::to_string),
        };
        handler.doctype(&decl);
        Ok(())
    }

    fn scan_external_id(
        &self,
        s: &mut Scanner<'_>,
        at: usize,
    ) -> Result<(Option<String>, Option<String>), ParseError> {
        let missing = || self.error("SYSTEM or PUBLIC, the URI is missing", at);
        if s.starts_with("SYSTEM") {
            s.advance(6);
            s.skip_whitespace();
            let system = s.read_quoted().ok_or_else(missing)?;
            Ok((None, Some(system.to_string())))
        } else if s.starts_with("PUBLIC") {
            s.advance(6);
            s.skip_whitespace();
            let public = s
                .read_quoted()
                .ok_or_else(|| self.error("xmlParseExternalID: PUBLIC, no Public Identifier", at))?;
            s.skip_whitespace();
            let system = s.read_quoted().ok_or_else(missing)?;
            Ok((Some(public.to_string()), Some(system.to_string())))
        } else {
            Ok((None, None))
        }
    }

    fn load_external_subset<H: ScanHandler>(&mut self, system_id: &str, handler: &mut H) {
        if !self.options.load_external_subsets {
            self.warn(
                handler,
                format!("External subset \"{}\" not loaded: loading disabled", system_id),
            );
            return;
        }
        match self.read_external(system_id) {
            Ok(text) => {
                for problem in parse_declarations(strip_text_declaration(&text), &mut self.entities) {
                    self.warn(handler, problem);
                }
            }
            Err(message) => self.warn(
                handler,
                format!("failed to load external subset \"{}\": {}", system_id, message),
            ),
        }
    }
}

/// Normalize CR LF and lone CR line endings to LF
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if memchr(b'\r', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Drop a leading `<?xml ...?>` text declaration from external entity text
fn strip_text_declaration(text: &str) -> &str {
    if text.starts_with("<?xml") {
        if let Some(end) = text.find("?>") {
            return &text[end + 2..];
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Test handler that records events as strings
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        errors: Vec<String>,
        warnings: Vec<String>,
        doctype: Option<DocTypeDecl>,
    }

    impl ScanHandler for Recorder {
        fn start_document(&mut self) {
            self.events.push("start_document".into());
        }

        fn end_document(&mut self) {
            self.events.push("end_document".into());
        }

        fn doctype(&mut self, decl: &DocTypeDecl) {
            self.doctype = Some(decl.clone());
        }

        fn start_element(&mut self, name: &str, attrs: &[Attribute<'_>]) {
            let attrs: Vec<String> = attrs.iter().map(|a| format!("{}={}", a.name, a.value)).collect();
            self.events.push(format!("<{}[{}]", name, attrs.join(",")));
        }

        fn end_element(&mut self, name: &str) {
            self.events.push(format!("</{}", name));
        }

        fn characters(&mut self, text: &str) {
            self.events.push(format!("text:{}", text));
        }

        fn start_cdata(&mut self) {
            self.events.push("cdata{".into());
        }

        fn end_cdata(&mut self) {
            self.events.push("}cdata".into());
        }

        fn comment(&mut self, text: &str) {
            self.events.push(format!("comment:{}", text));
        }

        fn processing_instruction(&mut self, target: &str, data: Option<&str>) {
            self.events.push(format!("pi:{}:{}", target, data.unwrap_or("")));
        }

        fn entity_reference(&mut self, name: &str, replacement: Option<&str>) {
            self.events.push(format!("&{}={}", name, replacement.unwrap_or("?")));
        }

        fn error(&mut self, error: &ParseError) {
            self.errors.push(error.message.clone());
        }

        fn warning(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }
    }

    fn scan_with(input: &str, options: &ParseOptions) -> (Recorder, Result<(), ParseError>) {
        let mut handler = Recorder::default();
        let result = scan_bytes(input.as_bytes(), None, options, &mut handler);
        (handler, result)
    }

    fn scan(input: &str) -> (Recorder, Result<(), ParseError>) {
        scan_with(input, &ParseOptions::default())
    }

    #[test]
    fn test_event_order() {
        let (h, result) = scan("<r><a/><b>x</b></r>");
        assert!(result.is_ok());
        assert_eq!(
            h.events,
            vec![
                "start_document", "<r[]", "<a[]", "</a", "<b[]", "text:x", "</b", "</r", "end_document"
            ]
        );
    }

    #[test]
    fn test_text_run_not_split_at_references() {
        let (h, _) = scan("<a>x &amp; y&#65;&#x42;</a>");
        assert_eq!(h.events[2], "text:x & yAB");
        assert_eq!(h.events.len(), 5);
    }

    #[test]
    fn test_attributes_normalized() {
        let (h, _) = scan("<a x=\"1\ty\" y='&lt;&#10;'/>");
        assert_eq!(h.events[1], "<a[x=1 y,y=<\n]");
    }

    #[test]
    fn test_duplicate_attribute_is_recoverable() {
        let (h, result) = scan("<a x='1' x='2'/>");
        assert!(result.is_ok());
        assert_eq!(h.events[1], "<a[x=1]");
        assert_eq!(h.errors, vec!["Attribute x redefined"]);
    }

    #[test]
    fn test_mismatched_tag_is_fatal() {
        let (h, result) = scan("<a><b></a>");
        let err = result.unwrap_err();
        assert_eq!(err.message, "Opening and ending tag mismatch: b and a");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 7);
        assert!(!h.events.contains(&"end_document".to_string()));
        assert_eq!(h.errors.len(), 1);
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(scan("<a>").1.unwrap_err().message, "Premature end of data in tag a");
        assert_eq!(scan("").1.unwrap_err().message, "Document is empty");
        assert_eq!(
            scan("<a/><b/>").1.unwrap_err().message,
            "Extra content at the end of the document"
        );
        assert_eq!(
            scan("text<a/>").1.unwrap_err().message,
            "Start tag expected, '<' not found"
        );
        assert_eq!(scan("<a><!-- x</a>").1.unwrap_err().message, "Comment not terminated");
        assert!(scan("<a b></a>").1.is_err());
    }

    #[test]
    fn test_invalid_literal_chars_are_fatal() {
        assert_eq!(scan("<r>\0</r>").1.unwrap_err().message, "PCDATA invalid Char value 0");
        assert_eq!(
            scan("<r>a\u{1}b</r>").1.unwrap_err().message,
            "PCDATA invalid Char value 1"
        );
        assert!(scan("<r x='\u{8}'/>").1.is_err());
        assert!(scan("<r><![CDATA[\u{ffff}]]></r>").1.is_err());
        assert!(scan("<r><!--\u{0}--></r>").1.is_err());

        // tab, newline and non-ASCII text stay valid
        let (h, result) = scan("<r x='caf\u{e9}'>\ta\u{e000}\u{10000}</r>");
        assert!(result.is_ok());
        assert!(h.errors.is_empty());
    }

    #[test]
    fn test_whitespace_outside_root_ignored() {
        let (h, result) = scan("\n <a/>\n ");
        assert!(result.is_ok());
        assert_eq!(h.events.len(), 4);
    }

    #[test]
    fn test_cdata_events() {
        let (h, _) = scan("<a>x<![CDATA[<y>]]></a>");
        assert_eq!(&h.events[2..6], &["text:x", "cdata{", "text:<y>", "}cdata"]);
    }

    #[test]
    fn test_comment_and_pi() {
        let (h, _) = scan("<?pi some data?><a><!--c--></a>");
        assert_eq!(h.events[1], "pi:pi:some data");
        assert_eq!(h.events[3], "comment:c");
    }

    #[test]
    fn test_double_hyphen_is_recoverable() {
        let (h, result) = scan("<a><!-- x -- y --></a>");
        assert!(result.is_ok());
        assert_eq!(h.errors, vec!["Double hyphen within comment"]);
    }

    #[test]
    fn test_crlf_normalized() {
        let (h, _) = scan("<a>1\r\n2\r3</a>");
        assert_eq!(h.events[2], "text:1\n2\n3");
    }

    #[test]
    fn test_undefined_entity_is_recoverable() {
        let (h, result) = scan("<a>x&nope;y</a>");
        assert!(result.is_ok());
        assert_eq!(h.errors, vec!["Entity 'nope' not defined"]);
        assert_eq!(&h.events[2..5], &["text:x", "&nope=?", "text:y"]);
    }

    #[test]
    fn test_internal_entity_kept_as_reference() {
        let (h, _) = scan("<!DOCTYPE a [<!ENTITY e \"v&amp;w\">]><a>&e;</a>");
        assert_eq!(h.events[2], "&e=v&w");
    }

    #[test]
    fn test_internal_entity_substituted() {
        let options = ParseOptions::new().with_substitute_entities(true);
        let (h, result) = scan_with(
            "<!DOCTYPE a [<!ENTITY e \"<b>in</b>\">]><a>x&e;y</a>",
            &options,
        );
        assert!(result.is_ok());
        assert_eq!(
            &h.events[1..8],
            &["<a[]", "text:x", "<b[]", "text:in", "</b", "text:y", "</a"]
        );
    }

    #[test]
    fn test_entities_in_attributes_always_expand() {
        let (h, _) = scan("<!DOCTYPE a [<!ENTITY e \"v\">]><a x='&e;!'/>");
        assert_eq!(h.events[1], "<a[x=v!]");
    }

    #[test]
    fn test_entity_loop_is_fatal() {
        let options = ParseOptions::new().with_substitute_entities(true);
        let (_, result) = scan_with(
            "<!DOCTYPE a [<!ENTITY x \"&y;\"><!ENTITY y \"&x;\">]><a>&x;</a>",
            &options,
        );
        assert_eq!(result.unwrap_err().message, "Detected an entity reference loop");
    }

    #[test]
    fn test_external_entity_not_loaded_by_default() {
        let (h, result) = scan("<!DOCTYPE a [<!ENTITY ext SYSTEM \"ext.txt\">]><a>&ext;</a>");
        assert!(result.is_ok());
        assert_eq!(h.events[2], "&ext=");
        assert_eq!(h.warnings.len(), 1);
    }

    #[test]
    fn test_external_entity_loaded_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("ext.txt")).unwrap();
        file.write_all(b"<?xml version='1.0'?>hello").unwrap();

        let options = ParseOptions::new()
            .with_substitute_entities(true)
            .with_load_external_subsets(true)
            .with_base_dir(dir.path());
        let (h, result) = scan_with(
            "<!DOCTYPE a [<!ENTITY ext SYSTEM \"ext.txt\">]><a>&ext;</a>",
            &options,
        );
        assert!(result.is_ok());
        assert_eq!(h.events[2], "text:hello");
        assert!(h.warnings.is_empty());
    }

    #[test]
    fn test_doctype_reported() {
        let (h, _) = scan("<!DOCTYPE root PUBLIC \"-//X//EN\" \"x.dtd\" [<!ENTITY e \"v\">]><root/>");
        let decl = h.doctype.unwrap();
        assert_eq!(decl.name, "root");
        assert_eq!(decl.public_id.as_deref(), Some("-//X//EN"));
        assert_eq!(decl.system_id.as_deref(), Some("x.dtd"));
        assert_eq!(decl.internal_subset.as_deref(), Some("<!ENTITY e \"v\">"));
        // external subset skipped with loading off
        assert_eq!(h.warnings.len(), 1);
    }

    #[test]
    fn test_xml_declaration() {
        let (h, result) = scan("<?xml version=\"1.0\" standalone=\"maybe\"?><a/>");
        assert!(result.is_ok());
        assert_eq!(h.warnings.len(), 1);
        assert!(scan("<?xml encoding='UTF-8'?><a/>").1.is_err());
        assert!(scan("<a/><?xml version='1.0'?>").1.is_err());
    }
}
