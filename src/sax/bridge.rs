//! Scanner to SAX handler bridge

use super::SaxHandler;
use crate::core::attributes::Attribute;
use crate::core::unified_scanner::{scan_bytes, ScanHandler};
use crate::error::{ParseError, Result};
use crate::options::ParseOptions;
use log::trace;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CdataState {
    Idle,
    InCdata,
}

/// Streams a document into a [`SaxHandler`].
///
/// With `substitute_entities` set, entity replacement text arrives as
/// `characters`. Otherwise a reference to a declared entity is delivered
/// literally, as `characters("&name;")`.
pub struct SaxEventBridge<H: SaxHandler> {
    handler: H,
    options: ParseOptions,
    state: CdataState,
}

impl<H: SaxHandler> SaxEventBridge<H> {
    pub fn new(handler: H) -> Self {
        Self::with_options(handler, ParseOptions::default())
    }

    pub fn with_options(handler: H, options: ParseOptions) -> Self {
        SaxEventBridge {
            handler,
            options,
            state: CdataState::Idle,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Parse an in-memory document
    pub fn parse_from_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        self.run(bytes, None, None)
    }

    /// Parse a file. Relative external identifiers resolve against its
    /// directory unless the options name a base.
    pub fn parse_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.run(&bytes, None, path.parent())
    }

    /// Parse everything `reader` yields. `encoding` is used when the input
    /// neither has a byte order mark nor declares an encoding.
    pub fn parse_from_stream<R: Read>(&mut self, mut reader: R, encoding: Option<&str>) -> Result<()> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.run(&bytes, encoding, None)
    }

    fn run(&mut self, bytes: &[u8], hint: Option<&str>, base: Option<&Path>) -> Result<()> {
        self.state = CdataState::Idle;
        let options = match base {
            Some(dir) if self.options.base_dir.is_none() => self.options.clone().with_base_dir(dir),
            _ => self.options.clone(),
        };
        scan_bytes(bytes, hint, &options, self)?;
        Ok(())
    }
}

impl<H: SaxHandler> ScanHandler for SaxEventBridge<H> {
    fn start_document(&mut self) {
        trace!("sax: start_document");
        self.handler.start_document();
    }

    fn end_document(&mut self) {
        trace!("sax: end_document");
        self.handler.end_document();
    }

    fn start_element(&mut self, name: &str, attrs: &[Attribute<'_>]) {
        trace!("sax: start_element {}", name);
        let flat: Vec<&str> = attrs
            .iter()
            .flat_map(|attr| [attr.name, attr.value.as_ref()])
            .collect();
        self.handler.start_element(name, &flat);
    }

    fn end_element(&mut self, name: &str) {
        trace!("sax: end_element {}", name);
        self.handler.end_element(name);
    }

    fn characters(&mut self, text: &str) {
        match self.state {
            CdataState::Idle => {
                trace!("sax: characters ({} bytes)", text.len());
                self.handler.characters(text);
            }
            CdataState::InCdata => {
                trace!("sax: cdata_block ({} bytes)", text.len());
                self.handler.cdata_block(text);
            }
        }
    }

    fn start_cdata(&mut self) {
        self.state = CdataState::InCdata;
    }

    fn end_cdata(&mut self) {
        self.state = CdataState::Idle;
    }

    fn comment(&mut self, text: &str) {
        trace!("sax: comment");
        self.handler.comment(text);
    }

    fn processing_instruction(&mut self, target: &str, _data: Option<&str>) {
        trace!("sax: processing instruction {} not forwarded", target);
    }

    fn entity_reference(&mut self, name: &str, replacement: Option<&str>) {
        if replacement.is_some() {
            trace!("sax: entity &{}; kept", name);
            self.characters(&format!("&{};", name));
        }
    }

    fn error(&mut self, error: &ParseError) {
        trace!("sax: error {}", error);
        self.handler.error(&error.to_string());
    }

    fn warning(&mut self, message: &str) {
        trace!("sax: warning {}", message);
        self.handler.warning(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sax::{SaxCollector, SaxEvent};
    use std::io::Write;

    fn collect(xml: &str) -> (Result<()>, Vec<SaxEvent>) {
        let mut bridge = SaxEventBridge::new(SaxCollector::new());
        let outcome = bridge.parse_from_buffer(xml.as_bytes());
        (outcome, bridge.into_handler().into_events())
    }

    fn start(name: &str, attributes: &[&str]) -> SaxEvent {
        SaxEvent::StartElement {
            name: name.to_string(),
            attributes: attributes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn end(name: &str) -> SaxEvent {
        SaxEvent::EndElement {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_event_sequence() {
        let (outcome, events) = collect("<r><a/><b>x</b></r>");
        outcome.unwrap();
        assert_eq!(
            events,
            vec![
                SaxEvent::StartDocument,
                start("r", &[]),
                start("a", &[]),
                end("a"),
                start("b", &[]),
                SaxEvent::Characters("x".to_string()),
                end("b"),
                end("r"),
                SaxEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn test_cdata_blocks() {
        let (_, events) = collect("<r>a<![CDATA[<b>]]>c</r>");
        assert_eq!(
            &events[2..5],
            &[
                SaxEvent::Characters("a".to_string()),
                SaxEvent::CDataBlock("<b>".to_string()),
                SaxEvent::Characters("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_flat_attributes_with_declarations() {
        let (_, events) = collect("<r xmlns:p='urn:p' p:id='1' n='a&amp;b'/>");
        assert_eq!(events[1], start("r", &["xmlns:p", "urn:p", "p:id", "1", "n", "a&b"]));
    }

    #[test]
    fn test_text_is_one_run() {
        let (_, events) = collect("<r>a &lt; b &#65;</r>");
        assert_eq!(events[2], SaxEvent::Characters("a < b A".to_string()));
    }

    #[test]
    fn test_comments_forwarded() {
        let (_, events) = collect("<r><!-- hi --></r>");
        assert_eq!(events[2], SaxEvent::Comment(" hi ".to_string()));
    }

    #[test]
    fn test_fatal_error_reported_and_returned() {
        let (outcome, events) = collect("<r><a></r>");
        assert!(matches!(outcome, Err(Error::Parse(_))));
        assert!(matches!(events.last(), Some(SaxEvent::Error(_))));
        assert!(!events.contains(&SaxEvent::EndDocument));
    }

    #[test]
    fn test_recoverable_error_continues() {
        let (outcome, events) = collect("<r>&undefined;</r>");
        outcome.unwrap();
        assert!(events.iter().any(|e| matches!(e, SaxEvent::Error(_))));
        assert_eq!(events.last(), Some(&SaxEvent::EndDocument));
    }

    #[test]
    fn test_missing_file_is_io_error_before_events() {
        let mut bridge = SaxEventBridge::new(SaxCollector::new());
        let outcome = bridge.parse_from_file("/nonexistent/dir/doc.xml");
        assert!(matches!(outcome, Err(Error::Io(_))));
        assert_eq!(bridge.handler().event_count(), 0);
    }

    #[test]
    fn test_parse_from_file_and_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<r>x</r>").unwrap();
        let mut bridge = SaxEventBridge::new(SaxCollector::new());
        bridge.parse_from_file(file.path()).unwrap();
        assert_eq!(bridge.handler().event_count(), 5);

        let latin1: &[u8] = b"<r>caf\xe9</r>";
        let mut bridge = SaxEventBridge::new(SaxCollector::new());
        bridge.parse_from_stream(latin1, Some("ISO-8859-1")).unwrap();
        assert_eq!(
            bridge.handler().events()[2],
            SaxEvent::Characters("caf\u{e9}".to_string())
        );
    }

    #[test]
    fn test_entity_policy_changes_characters() {
        let xml = "<!DOCTYPE r [<!ENTITY e 'val'>]><r>a&e;</r>";

        let (outcome, events) = collect(xml);
        outcome.unwrap();
        assert!(events.contains(&SaxEvent::Characters("&e;".to_string())));
        assert!(!events.iter().any(|e| matches!(e, SaxEvent::Characters(t) if t.contains("val"))));

        let options = ParseOptions::default().with_substitute_entities(true);
        let mut bridge = SaxEventBridge::with_options(SaxCollector::new(), options);
        bridge.parse_from_buffer(xml.as_bytes()).unwrap();
        let events = bridge.into_handler().into_events();
        assert!(events.contains(&SaxEvent::Characters("aval".to_string())));
        assert!(!events.contains(&SaxEvent::Characters("&e;".to_string())));
    }
}
