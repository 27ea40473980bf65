//! SAX Collector
//!
//! A [`SaxHandler`] that records every event for batch return to Elixir.

use super::events::SaxEvent;
use super::SaxHandler;

/// Collector that gathers SAX events during scanning
#[derive(Debug, Default)]
pub struct SaxCollector {
    events: Vec<SaxEvent>,
}

impl SaxCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(256),
        }
    }

    /// Get the collected events as a slice
    pub fn events(&self) -> &[SaxEvent] {
        &self.events
    }

    /// Take the collected events
    pub fn take_events(&mut self) -> Vec<SaxEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn into_events(self) -> Vec<SaxEvent> {
        self.events
    }

    /// Get number of collected events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl SaxHandler for SaxCollector {
    fn start_document(&mut self) {
        self.events.push(SaxEvent::StartDocument);
    }

    fn end_document(&mut self) {
        self.events.push(SaxEvent::EndDocument);
    }

    fn start_element(&mut self, name: &str, attributes: &[&str]) {
        self.events.push(SaxEvent::StartElement {
            name: name.to_string(),
            attributes: attributes.iter().map(|s| s.to_string()).collect(),
        });
    }

    fn end_element(&mut self, name: &str) {
        self.events.push(SaxEvent::EndElement {
            name: name.to_string(),
        });
    }

    fn characters(&mut self, text: &str) {
        self.events.push(SaxEvent::Characters(text.to_string()));
    }

    fn cdata_block(&mut self, text: &str) {
        self.events.push(SaxEvent::CDataBlock(text.to_string()));
    }

    fn comment(&mut self, text: &str) {
        self.events.push(SaxEvent::Comment(text.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.events.push(SaxEvent::Error(message.to_string()));
    }

    fn warning(&mut self, message: &str) {
        self.events.push(SaxEvent::Warning(message.to_string()));
    }
}
