//! Connection handler that runs protocol sessions.
//!
//! Each accepted connection gets its own [`Session`] and response writer.
//! Commands are read and answered in order until the client disconnects or
//! the stream breaks the protocol.

use std::io::{BufReader, BufWriter};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::AuditSink;
use crate::backend::TicketManager;
use crate::outcome::ProtocolError;
use crate::tickets::TicketExecutor;
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::errors::StreamError;
use super::kind::CommandKind;
use super::response::{ResponseSink, XmlResponseWriter, error_response};
use super::session::Session;
use super::tokenizer::XmlTokenizer;
use super::DISPATCH_TARGET;

type ConnectionSession = Session<TicketExecutor<XmlResponseWriter<BufWriter<ConnectionStream>>>>;

/// Serves ticket commands on accepted connections.
pub struct GmpConnectionHandler {
    manager: Arc<dyn TicketManager>,
    audit: Arc<dyn AuditSink>,
    default_rows: u32,
    max_command_bytes: usize,
}

impl GmpConnectionHandler {
    /// Creates a handler sharing `manager` and `audit` across connections.
    pub fn new(
        manager: Arc<dyn TicketManager>,
        audit: Arc<dyn AuditSink>,
        default_rows: u32,
        max_command_bytes: usize,
    ) -> Self {
        Self {
            manager,
            audit,
            default_rows,
            max_command_bytes,
        }
    }

    fn serve(&self, stream: ConnectionStream) {
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to split connection");
                return;
            }
        };

        let executor = TicketExecutor::new(
            Arc::clone(&self.manager),
            Arc::clone(&self.audit),
            self.default_rows,
            XmlResponseWriter::new(BufWriter::new(writer)),
        );
        let mut session = Session::new(executor, self.max_command_bytes);
        let mut tokenizer = XmlTokenizer::new(BufReader::new(stream));

        match tokenizer.run(&mut session) {
            Ok(()) => {
                debug!(
                    target: DISPATCH_TARGET,
                    completed = session.completed(),
                    "client disconnected"
                );
            }
            Err(error) if error.is_client_fault() => {
                warn!(
                    target: DISPATCH_TARGET,
                    %error,
                    state = %session.state(),
                    "protocol violation, closing connection"
                );
                reject(&mut session, &error);
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    %error,
                    completed = session.completed(),
                    "connection failed"
                );
            }
        }
    }
}

/// Tells the client why the connection is about to close. Delivery is best
/// effort; the peer may already be gone.
fn reject(session: &mut ConnectionSession, error: &StreamError) {
    let sink = session.executor_mut().sink_mut();
    let response = error_response(
        CommandKind::Unknown.as_str(),
        &ProtocolError::validation(error.to_string()),
    );
    if sink.send(&response).and_then(|()| sink.flush()).is_err() {
        debug!(target: DISPATCH_TARGET, "client gone before rejection was sent");
    }
}

impl ConnectionHandler for GmpConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.serve(stream);
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    use rstest::{fixture, rstest};

    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::backend::{MemoryTicketManager, ScanResult};

    /// TCP server/client pair around a single handled connection.
    struct HandlerTestHarness {
        client: TcpStream,
        server_handle: JoinHandle<()>,
    }

    impl HandlerTestHarness {
        /// Sends request bytes, half-closes the connection and collects the
        /// whole reply.
        fn exchange(mut self, request: &[u8]) -> String {
            self.client.write_all(request).expect("write request");
            self.client.flush().expect("flush");
            self.client.shutdown(Shutdown::Write).expect("half close");

            let mut reply = String::new();
            self.client.read_to_string(&mut reply).expect("read reply");
            self.server_handle.join().expect("server join");
            reply
        }
    }

    fn create_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        (listener, addr)
    }

    #[fixture]
    fn manager() -> Arc<MemoryTicketManager> {
        let manager = MemoryTicketManager::new();
        manager.add_user("U1");
        manager.add_result(ScanResult {
            id: "R1".to_owned(),
            name: "Weak cipher".to_owned(),
            ..ScanResult::default()
        });
        Arc::new(manager)
    }

    fn harness_with_limit(manager: Arc<MemoryTicketManager>, max_bytes: usize) -> HandlerTestHarness {
        let (listener, addr) = create_listener();
        let server_handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            GmpConnectionHandler::new(manager, Arc::new(TracingAuditSink), 10, max_bytes)
                .handle(ConnectionStream::Tcp(stream));
        });

        let client = TcpStream::connect(addr).expect("connect");
        HandlerTestHarness {
            client,
            server_handle,
        }
    }

    #[fixture]
    fn harness(manager: Arc<MemoryTicketManager>) -> HandlerTestHarness {
        harness_with_limit(manager, 64 * 1024)
    }

    #[rstest]
    fn answers_commands_in_order(harness: HandlerTestHarness) {
        let reply = harness.exchange(
            b"<create_ticket><result id=\"R1\"/><assigned_to><user id=\"U1\"/></assigned_to></create_ticket>\n\
              <get_tickets filter=\"rows=5\"/>",
        );

        let created = reply
            .find("<create_ticket_response status=\"201\"")
            .expect("create response");
        let listed = reply
            .find("<get_tickets_response status=\"200\"")
            .expect("listing response");
        assert!(created < listed, "responses out of order: {reply}");
        assert!(reply.contains("<name>Weak cipher</name>"), "{reply}");
        assert!(reply.ends_with("</get_tickets_response>"), "{reply}");
    }

    #[rstest]
    fn unknown_command_keeps_connection_open(harness: HandlerTestHarness) {
        let reply = harness.exchange(b"<help/><get_tickets/>");

        assert!(
            reply.starts_with(
                "<gmp_response status=\"400\" status_text=\"Bogus command name\"/>"
            ),
            "{reply}"
        );
        assert!(reply.contains("<get_tickets_response"), "{reply}");
    }

    #[rstest]
    fn malformed_xml_is_rejected_and_closes(harness: HandlerTestHarness) {
        let reply = harness.exchange(b"<get_tickets></modify_ticket><get_tickets/>");

        assert!(reply.starts_with("<gmp_response status=\"400\""), "{reply}");
        assert!(!reply.contains("get_tickets_response"), "{reply}");
    }

    #[rstest]
    fn oversized_command_is_rejected(manager: Arc<MemoryTicketManager>) {
        let harness = harness_with_limit(manager, 32);
        let reply = harness.exchange(
            b"<create_ticket><comment>far too long for the budget</comment></create_ticket>",
        );

        assert!(reply.starts_with("<gmp_response status=\"400\""), "{reply}");
        assert!(reply.contains("byte limit"), "{reply}");
    }

    #[rstest]
    fn silent_client_gets_no_reply(harness: HandlerTestHarness) {
        assert_eq!(harness.exchange(b""), "");
    }
}
