use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;

use gmpd::shutdown::{ShutdownSignal, SystemShutdownSignal};
use gmpd::{
    MemoryTicketManager, StructuredHealthReporter, SystemConfigLoader, TracingAuditSink,
    bootstrap_with,
};

const MAIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::main");

fn main() -> ExitCode {
    let daemon = match bootstrap_with(&SystemConfigLoader, Arc::new(StructuredHealthReporter)) {
        Ok(daemon) => daemon,
        Err(error) => {
            eprintln!("gmpd: {error}");
            return ExitCode::FAILURE;
        }
    };

    let listener = match daemon.serve(
        Arc::new(MemoryTicketManager::new()),
        Arc::new(TracingAuditSink),
    ) {
        Ok(listener) => listener,
        Err(_) => return ExitCode::FAILURE,
    };

    let waited = SystemShutdownSignal.wait();
    listener.shutdown();
    if let Err(error) = listener.join() {
        error!(target: MAIN_TARGET, %error, "listener did not stop cleanly");
        return ExitCode::FAILURE;
    }
    match waited {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(target: MAIN_TARGET, %error, "shutdown signal unavailable");
            ExitCode::FAILURE
        }
    }
}
