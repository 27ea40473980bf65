//! SAX (Simple API for XML) Module
//!
//! Streaming parse that builds no tree. The shared scanner drives a
//! [`SaxEventBridge`], which turns scanner callbacks into calls on a
//! [`SaxHandler`]:
//!
//! ```text
//! UnifiedScanner ---> SaxEventBridge ---> SaxHandler
//!                                            |
//!                                            v
//!                                  SaxCollector (SaxEvent[])
//! ```
//!
//! Text inside a CDATA section reaches the handler as
//! [`SaxHandler::cdata_block`], all other character data as
//! [`SaxHandler::characters`].

pub mod bridge;
pub mod collector;
pub mod events;

pub use bridge::SaxEventBridge;
pub use collector::SaxCollector;
pub use events::SaxEvent;

/// Receiver of SAX events. Every method defaults to doing nothing.
pub trait SaxHandler {
    fn start_document(&mut self) {}

    fn end_document(&mut self) {}

    /// `attributes` is a flat `[name, value, name, value, ...]` list in
    /// document order, namespace declarations included
    fn start_element(&mut self, _name: &str, _attributes: &[&str]) {}

    fn end_element(&mut self, _name: &str) {}

    fn characters(&mut self, _text: &str) {}

    fn cdata_block(&mut self, _text: &str) {}

    fn comment(&mut self, _text: &str) {}

    fn error(&mut self, _message: &str) {}

    fn warning(&mut self, _message: &str) {}
}

impl<H: SaxHandler + ?Sized> SaxHandler for &mut H {
    fn start_document(&mut self) {
        (**self).start_document()
    }

    fn end_document(&mut self) {
        (**self).end_document()
    }

    fn start_element(&mut self, name: &str, attributes: &[&str]) {
        (**self).start_element(name, attributes)
    }

    fn end_element(&mut self, name: &str) {
        (**self).end_element(name)
    }

    fn characters(&mut self, text: &str) {
        (**self).characters(text)
    }

    fn cdata_block(&mut self, text: &str) {
        (**self).cdata_block(text)
    }

    fn comment(&mut self, text: &str) {
        (**self).comment(text)
    }

    fn error(&mut self, message: &str) {
        (**self).error(message)
    }

    fn warning(&mut self, message: &str) {
        (**self).warning(message)
    }
}
