//! Connection-level routing of element events.

use super::errors::CommandError;
use super::kind::CommandKind;
use super::lifecycle::{CommandController, CommandExecutor, LifecycleState, Progress};
use super::tokenizer::ElementEvents;

/// Routes one connection's element events into commands.
///
/// A top-level element starts a command of the kind named by the element;
/// everything inside it belongs to that command. Text between commands is
/// ignored.
#[derive(Debug)]
pub struct Session<E> {
    controller: CommandController,
    executor: E,
    completed: u64,
}

impl<E: CommandExecutor> Session<E> {
    /// Creates a session executing commands with `executor`.
    pub fn new(executor: E, max_command_bytes: usize) -> Self {
        Self {
            controller: CommandController::new(max_command_bytes),
            executor,
            completed: 0,
        }
    }

    /// Lifecycle state of the in-flight command.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.controller.state()
    }

    /// Number of commands executed so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Borrows the executor commands are handed to.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Mutably borrows the executor, for writing outside a command.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }
}

impl<E: CommandExecutor> ElementEvents for Session<E> {
    fn element_open(
        &mut self,
        name: &str,
        attributes: Vec<(String, String)>,
    ) -> Result<(), CommandError> {
        if self.controller.is_idle() {
            let kind = CommandKind::from_element(name);
            return self.controller.start(kind, name, attributes);
        }
        self.controller.on_open(name, attributes)
    }

    fn element_text(&mut self, text: &str) -> Result<(), CommandError> {
        if self.controller.is_idle() {
            return Ok(());
        }
        self.controller.on_text(text)
    }

    fn element_close(&mut self, name: &str) -> Result<(), CommandError> {
        if let Progress::Completed(_) = self.controller.on_close(name, &mut self.executor)? {
            self.completed += 1;
        }
        Ok(())
    }
}
