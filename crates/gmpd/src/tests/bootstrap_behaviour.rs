//! Behavioural tests for bootstrapping and serving the daemon.

use std::cell::RefCell;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ortho_config::OrthoError;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use gmp_config::{Config, SocketEndpoint};

use crate::audit::TracingAuditSink;
use crate::backend::{MemoryTicketManager, ScanResult};
use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, bootstrap_with};
use crate::health::HealthReporter;
use crate::transport::{ListenerError, ListenerHandle};

const EXCHANGE: &str = "<create_ticket><result id=\"R1\"/><assigned_to><user id=\"U1\"/></assigned_to></create_ticket>\
<get_tickets filter=\"rows=5\"/>";

/// Records lifecycle events by name.
#[derive(Debug, Default)]
struct RecordingHealthReporter {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingHealthReporter {
    fn events(&self) -> Vec<&'static str> {
        self.events.lock().expect("health mutex poisoned").clone()
    }

    fn push(&self, event: &'static str) {
        self.events.lock().expect("health mutex poisoned").push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.push("bootstrap_starting");
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.push("bootstrap_succeeded");
    }

    fn bootstrap_failed(&self, _error: &BootstrapError) {
        self.push("bootstrap_failed");
    }

    fn listener_started(&self, _endpoint: &SocketEndpoint) {
        self.push("listener_started");
    }

    fn listener_failed(&self, _error: &ListenerError) {
        self.push("listener_failed");
    }
}

/// Loader feeding an unsupported socket scheme through the CLI layer.
struct InvalidSocketLoader;

impl ConfigLoader for InvalidSocketLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("gmpd"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}

struct DaemonWorld {
    loader: Option<Box<dyn ConfigLoader>>,
    reporter: Arc<RecordingHealthReporter>,
    socket_dir: Option<TempDir>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    listener: Option<ListenerHandle>,
    reply: String,
}

impl DaemonWorld {
    fn new() -> Self {
        Self {
            loader: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            socket_dir: None,
            daemon: None,
            bootstrap_error: None,
            listener: None,
            reply: String::new(),
        }
    }

    fn use_config(&mut self, daemon_socket: SocketEndpoint) {
        self.loader = Some(Box::new(StaticConfigLoader::new(Config {
            daemon_socket,
            log_filter: "warn".to_owned(),
            ..Config::default()
        })));
    }

    fn exchange(&self, request: &[u8]) -> String {
        let daemon = self.daemon.as_ref().expect("daemon bootstrapped");
        match daemon.config().daemon_socket() {
            SocketEndpoint::Tcp { .. } => {
                let addr = self
                    .listener
                    .as_ref()
                    .and_then(ListenerHandle::local_addr)
                    .expect("tcp listener address");
                let mut stream = TcpStream::connect(addr).expect("connect tcp");
                stream
                    .set_read_timeout(Some(Duration::from_secs(5)))
                    .expect("read timeout");
                stream.write_all(request).expect("write request");
                stream.shutdown(Shutdown::Write).expect("half close");
                read_all(stream)
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                let mut stream =
                    std::os::unix::net::UnixStream::connect(path.as_std_path()).expect("connect unix");
                stream
                    .set_read_timeout(Some(Duration::from_secs(5)))
                    .expect("read timeout");
                stream.write_all(request).expect("write request");
                stream.shutdown(Shutdown::Write).expect("half close");
                read_all(stream)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => panic!("unix sockets are unsupported here"),
        }
    }
}

fn read_all(mut stream: impl Read) -> String {
    let mut reply = String::new();
    stream.read_to_string(&mut reply).expect("read reply");
    reply
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.shutdown();
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<DaemonWorld> {
    RefCell::new(DaemonWorld::new())
}

#[given("a configuration listening on a loopback TCP port")]
fn given_tcp_config(world: &RefCell<DaemonWorld>) {
    world
        .borrow_mut()
        .use_config(SocketEndpoint::tcp("127.0.0.1", 0));
}

#[given("a configuration listening on a Unix socket in a fresh directory")]
fn given_unix_config(world: &RefCell<DaemonWorld>) {
    let mut world = world.borrow_mut();
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("run").join("gmpd.sock");
    world.use_config(SocketEndpoint::unix(path.to_str().expect("utf8 path")));
    world.socket_dir = Some(dir);
}

#[given("a configuration with an unsupported socket scheme")]
fn given_invalid_config(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().loader = Some(Box::new(InvalidSocketLoader));
}

#[when("the daemon bootstraps")]
fn when_bootstraps(world: &RefCell<DaemonWorld>) {
    let mut world = world.borrow_mut();
    let loader = world.loader.take().expect("loader configured");
    let reporter: Arc<dyn HealthReporter> = world.reporter.clone();
    match bootstrap_with(loader.as_ref(), reporter) {
        Ok(daemon) => world.daemon = Some(daemon),
        Err(error) => world.bootstrap_error = Some(error),
    }
}

#[when("the daemon serves the ticket store")]
fn when_serves(world: &RefCell<DaemonWorld>) {
    let mut world = world.borrow_mut();
    let store = MemoryTicketManager::new();
    store.add_user("U1");
    store.add_result(ScanResult {
        id: "R1".to_owned(),
        name: "Outdated OpenSSH".to_owned(),
        ..ScanResult::default()
    });
    let handle = world
        .daemon
        .as_ref()
        .expect("daemon bootstrapped")
        .serve(Arc::new(store), Arc::new(TracingAuditSink))
        .expect("listener started");
    world.listener = Some(handle);
}

#[when("a client creates a ticket and lists tickets over the socket")]
fn when_client_exchanges(world: &RefCell<DaemonWorld>) {
    let reply = world.borrow().exchange(EXCHANGE.as_bytes());
    world.borrow_mut().reply = reply;
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    assert!(
        world.bootstrap_error.is_none(),
        "bootstrap error: {:?}",
        world.bootstrap_error
    );
    assert!(world.daemon.is_some());
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<DaemonWorld>) {
    assert!(matches!(
        world.borrow().bootstrap_error,
        Some(BootstrapError::Configuration { .. })
    ));
}

#[then("the health events are {events}")]
fn then_health_events(world: &RefCell<DaemonWorld>, events: String) {
    let expected: Vec<&str> = events.split(", ").collect();
    assert_eq!(world.borrow().reporter.events(), expected);
}

#[then("the client receives a creation response followed by a listing of {count} ticket")]
fn then_client_reply(world: &RefCell<DaemonWorld>, count: usize) {
    let world = world.borrow();
    let reply = world.reply.as_str();
    assert!(
        reply.starts_with("<create_ticket_response status=\"201\""),
        "{reply}"
    );
    assert_eq!(reply.matches("<ticket id=").count(), count, "{reply}");
    assert!(reply.contains("<name>Outdated OpenSSH</name>"), "{reply}");
    assert!(reply.ends_with("</get_tickets_response>"), "{reply}");
}

#[scenario(path = "tests/features/daemon_bootstrap.feature")]
fn daemon_bootstrap(#[from(world)] world: RefCell<DaemonWorld>) {
    drop(world);
}
