//! Byte stream to element events.
//!
//! [`XmlTokenizer`] reads a connection with `quick-xml` and forwards each
//! start tag, text run and end tag to an [`ElementEvents`] consumer. Reads
//! may return any number of bytes; the reader keeps partial tags buffered
//! until an event is complete. Self-closing tags are reported as an open
//! followed by a close. Character data is forwarded untrimmed.

use std::io::BufRead;
use std::str;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::errors::{CommandError, StreamError};

/// Consumer of element events in document order.
pub trait ElementEvents {
    /// An element opened with its attributes in document order.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the event breaks the consumer's contract.
    fn element_open(
        &mut self,
        name: &str,
        attributes: Vec<(String, String)>,
    ) -> Result<(), CommandError>;

    /// A run of character data.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the event breaks the consumer's contract.
    fn element_text(&mut self, text: &str) -> Result<(), CommandError>;

    /// An element closed.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the event breaks the consumer's contract.
    fn element_close(&mut self, name: &str) -> Result<(), CommandError>;
}

/// Pulls element events from a buffered byte stream.
pub struct XmlTokenizer<R> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlTokenizer<R> {
    /// Wraps a buffered reader.
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            buffer: Vec::new(),
        }
    }

    /// Reads one event and forwards it. Returns `false` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] for malformed XML, failed reads and events the
    /// consumer rejects.
    pub fn pump<E>(&mut self, events: &mut E) -> Result<bool, StreamError>
    where
        E: ElementEvents + ?Sized,
    {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Start(start) => {
                let name = str::from_utf8(start.name().as_ref())?.to_owned();
                let attributes = collect_attributes(&start)?;
                events.element_open(&name, attributes)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                events.element_text(&text)?;
            }
            Event::CData(data) => {
                let text = str::from_utf8(&data)?;
                events.element_text(text)?;
            }
            Event::End(end) => {
                let end_name = end.name();
                let name = str::from_utf8(end_name.as_ref())?;
                events.element_close(name)?;
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
        Ok(true)
    }

    /// Forwards events until the stream ends.
    ///
    /// # Errors
    ///
    /// Returns the first [`StreamError`] raised by [`Self::pump`].
    pub fn run<E>(&mut self, events: &mut E) -> Result<(), StreamError>
    where
        E: ElementEvents + ?Sized,
    {
        while self.pump(events)? {}
        Ok(())
    }
}

fn collect_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, StreamError> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = str::from_utf8(attribute.key.as_ref())?.to_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}
