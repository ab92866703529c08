//! Behavioural and cross-module test suites for the daemon.

mod bootstrap_behaviour;
mod executor;
pub(crate) mod support;
