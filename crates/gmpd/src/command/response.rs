//! Response emission for protocol commands.
//!
//! Commands write well-formed XML fragments to a [`ResponseSink`]. The sink is
//! the only way a command talks to its client; a failed send means the
//! connection is gone and the command must stop immediately.

use std::io::Write;

use crate::entity::escape_xml;
use crate::outcome::ProtocolError;

use super::errors::TransportError;

/// Status text attached to plain success responses.
pub const STATUS_OK_TEXT: &str = "OK";

/// Status text attached to creation responses.
pub const STATUS_CREATED_TEXT: &str = "OK, resource created";

/// Destination for response fragments. Sends either deliver the whole
/// fragment or fail.
pub trait ResponseSink {
    /// Sends one XML fragment.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the connection is unusable.
    fn send(&mut self, fragment: &str) -> Result<(), TransportError>;

    /// Pushes buffered fragments to the client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the connection is unusable.
    fn flush(&mut self) -> Result<(), TransportError>;
}

impl<S> ResponseSink for &mut S
where
    S: ResponseSink + ?Sized,
{
    fn send(&mut self, fragment: &str) -> Result<(), TransportError> {
        (**self).send(fragment)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }
}

/// Sink writing fragments to any byte stream.
#[derive(Debug)]
pub struct XmlResponseWriter<W> {
    writer: W,
}

impl<W: Write> XmlResponseWriter<W> {
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResponseSink for XmlResponseWriter<W> {
    fn send(&mut self, fragment: &str) -> Result<(), TransportError> {
        self.writer.write_all(fragment.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// `<{command}_response status="200" status_text="OK"/>`
#[must_use]
pub fn ok_response(command: &str) -> String {
    status_element(command, 200, STATUS_OK_TEXT, None)
}

/// Creation acknowledgement carrying the new resource identifier.
#[must_use]
pub fn created_response(command: &str, id: &str) -> String {
    status_element(command, 201, STATUS_CREATED_TEXT, Some(id))
}

/// Error response with the protocol status code and message.
#[must_use]
pub fn error_response(command: &str, error: &ProtocolError) -> String {
    status_element(command, error.status_code(), &error.to_string(), None)
}

/// Opening tag of a streamed response; pair with [`close_response`].
#[must_use]
pub fn open_response(command: &str) -> String {
    format!("<{command}_response status=\"200\" status_text=\"{STATUS_OK_TEXT}\">")
}

/// Closing tag of a streamed response.
#[must_use]
pub fn close_response(command: &str) -> String {
    format!("</{command}_response>")
}

/// `<name>text</name>` with the text escaped.
pub(crate) fn text_element(name: &str, text: &str) -> String {
    format!("<{name}>{}</{name}>", escape_xml(text))
}

/// `<name id="id"/>` with the identifier escaped.
pub(crate) fn id_element(name: &str, id: &str) -> String {
    format!("<{name} id=\"{}\"/>", escape_xml(id))
}

fn status_element(command: &str, status: u16, text: &str, id: Option<&str>) -> String {
    let id = id
        .map(|id| format!(" id=\"{}\"", escape_xml(id)))
        .unwrap_or_default();
    format!(
        "<{command}_response status=\"{status}\" status_text=\"{}\"{id}/>",
        escape_xml(text)
    )
}
