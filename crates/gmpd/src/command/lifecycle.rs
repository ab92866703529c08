//! Per-command lifecycle.
//!
//! A [`CommandController`] owns at most one command context at a time. The
//! context is allocated when a command's root element opens, receives every
//! event until the root closes, and is consumed by the single call to
//! [`CommandExecutor::execute`]. Whatever the executor does, the context is
//! gone afterwards and the controller is idle again.

use std::fmt;

use tracing::debug;

use crate::entity::Entity;

use super::DISPATCH_TARGET;
use super::builder::TreeBuilder;
use super::errors::{CommandError, TransportError};
use super::kind::CommandKind;

/// Lifecycle states of the in-flight command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No command in flight.
    Idle,
    /// Events are being assembled into the command tree.
    Building,
    /// The root element closed; the tree is complete.
    Ready,
    /// The executor owns the tree.
    Executing,
    /// Execution returned; the context is being released.
    Finished,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Ready => "ready",
            Self::Executing => "executing",
            Self::Finished => "finished",
        })
    }
}

/// Runs a complete command.
pub trait CommandExecutor {
    /// Executes a command and writes its response. Consumes the tree.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the response cannot be delivered.
    fn execute(&mut self, kind: CommandKind, command: Entity) -> Result<(), TransportError>;
}

impl<E> CommandExecutor for &mut E
where
    E: CommandExecutor + ?Sized,
{
    fn execute(&mut self, kind: CommandKind, command: Entity) -> Result<(), TransportError> {
        (**self).execute(kind, command)
    }
}

/// Result of forwarding a close event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The command is still being assembled.
    Pending,
    /// The command ran.
    Completed(CommandKind),
}

#[derive(Debug)]
struct CommandContext {
    kind: CommandKind,
    builder: TreeBuilder,
}

/// State machine for one connection's in-flight command.
#[derive(Debug)]
pub struct CommandController {
    state: LifecycleState,
    context: Option<CommandContext>,
    max_command_bytes: usize,
}

impl CommandController {
    /// Creates an idle controller whose commands may not exceed
    /// `max_command_bytes`.
    #[must_use]
    pub fn new(max_command_bytes: usize) -> Self {
        Self {
            state: LifecycleState::Idle,
            context: None,
            max_command_bytes,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// True when no command is in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.context.is_none()
    }

    /// Starts a command with its root element.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Busy`] while another command is in flight and
    /// [`CommandError::Build`] when the root element exceeds the size limit.
    pub fn start(
        &mut self,
        kind: CommandKind,
        name: &str,
        attributes: Vec<(String, String)>,
    ) -> Result<(), CommandError> {
        if let Some(context) = &self.context {
            return Err(CommandError::Busy {
                running: context.kind,
            });
        }
        let mut builder = TreeBuilder::new(self.max_command_bytes);
        builder.on_open(name, attributes)?;
        self.context = Some(CommandContext { kind, builder });
        self.transition(LifecycleState::Building, kind);
        Ok(())
    }

    /// Forwards a nested element open.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NoCommand`] when idle and
    /// [`CommandError::Build`] for builder contract violations.
    pub fn on_open(
        &mut self,
        name: &str,
        attributes: Vec<(String, String)>,
    ) -> Result<(), CommandError> {
        let result = self.builder(name)?.on_open(name, attributes);
        self.abort_on_error(result)
    }

    /// Forwards text.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NoCommand`] when idle and
    /// [`CommandError::Build`] when the command grows too large.
    pub fn on_text(&mut self, text: &str) -> Result<(), CommandError> {
        let result = self.builder("#text")?.on_text(text);
        self.abort_on_error(result)
    }

    /// Forwards a close event and runs the command once its root closes.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NoCommand`] when idle,
    /// [`CommandError::Build`] for mismatched closes and
    /// [`CommandError::Transport`] when the executor could not respond.
    pub fn on_close<E>(&mut self, name: &str, executor: &mut E) -> Result<Progress, CommandError>
    where
        E: CommandExecutor + ?Sized,
    {
        let builder = self.builder(name)?;
        let result = builder.on_close(name);
        let done = builder.is_done();
        self.abort_on_error(result)?;
        if !done {
            return Ok(Progress::Pending);
        }

        let Some(mut context) = self.context.take() else {
            return Ok(Progress::Pending);
        };
        let kind = context.kind;
        self.transition(LifecycleState::Ready, kind);
        let command = context.builder.take_root();
        drop(context);

        let outcome = match command {
            Some(command) => {
                self.transition(LifecycleState::Executing, kind);
                executor.execute(kind, command)
            }
            None => Ok(()),
        };
        self.transition(LifecycleState::Finished, kind);
        self.transition(LifecycleState::Idle, kind);
        outcome?;
        Ok(Progress::Completed(kind))
    }

    fn builder(&mut self, name: &str) -> Result<&mut TreeBuilder, CommandError> {
        match self.context.as_mut() {
            Some(context) => Ok(&mut context.builder),
            None => Err(CommandError::NoCommand {
                name: name.to_owned(),
            }),
        }
    }

    fn abort_on_error<T, E>(&mut self, result: Result<T, E>) -> Result<T, CommandError>
    where
        E: Into<CommandError>,
    {
        result.map_err(|error| {
            if let Some(context) = self.context.take() {
                self.transition(LifecycleState::Idle, context.kind);
            }
            error.into()
        })
    }

    fn transition(&mut self, next: LifecycleState, kind: CommandKind) {
        debug!(
            target: DISPATCH_TARGET,
            command = %kind,
            from = %self.state,
            to = %next,
            "command lifecycle transition"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::command::errors::BuildError;

    #[derive(Default)]
    struct Recording {
        runs: Vec<(CommandKind, Entity)>,
        fail: bool,
    }

    impl CommandExecutor for Recording {
        fn execute(&mut self, kind: CommandKind, command: Entity) -> Result<(), TransportError> {
            self.runs.push((kind, command));
            if self.fail {
                return Err(TransportError::Io(std::io::ErrorKind::BrokenPipe.into()));
            }
            Ok(())
        }
    }

    #[fixture]
    fn controller() -> CommandController {
        CommandController::new(usize::MAX)
    }

    fn start_create(controller: &mut CommandController) {
        controller
            .start(CommandKind::CreateTicket, "create_ticket", Vec::new())
            .expect("start");
    }

    #[rstest]
    fn executes_once_when_root_closes(mut controller: CommandController) {
        let mut executor = Recording::default();
        start_create(&mut controller);
        assert_eq!(controller.state(), LifecycleState::Building);

        controller
            .on_open("result", vec![("id".to_owned(), "R1".to_owned())])
            .expect("open");
        assert_eq!(
            controller.on_close("result", &mut executor).expect("close"),
            Progress::Pending
        );
        assert!(executor.runs.is_empty());

        assert_eq!(
            controller
                .on_close("create_ticket", &mut executor)
                .expect("close root"),
            Progress::Completed(CommandKind::CreateTicket)
        );
        assert_eq!(executor.runs.len(), 1);
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert!(controller.is_idle());

        let error = controller
            .on_close("create_ticket", &mut executor)
            .expect_err("context is gone");
        assert!(matches!(error, CommandError::NoCommand { .. }));
        assert_eq!(executor.runs.len(), 1);
    }

    #[rstest]
    fn rejects_second_start_while_building(mut controller: CommandController) {
        start_create(&mut controller);
        let error = controller
            .start(CommandKind::GetTickets, "get_tickets", Vec::new())
            .expect_err("busy");
        assert!(matches!(
            error,
            CommandError::Busy {
                running: CommandKind::CreateTicket
            }
        ));
    }

    #[rstest]
    fn transport_failure_still_releases_context(mut controller: CommandController) {
        let mut executor = Recording {
            fail: true,
            ..Recording::default()
        };
        start_create(&mut controller);
        let error = controller
            .on_close("create_ticket", &mut executor)
            .expect_err("transport failure");
        assert!(matches!(error, CommandError::Transport(_)));
        assert!(controller.is_idle());
        assert_eq!(controller.state(), LifecycleState::Idle);
    }

    #[rstest]
    fn builder_errors_discard_the_command(mut controller: CommandController) {
        let mut executor = Recording::default();
        start_create(&mut controller);
        let error = controller
            .on_close("modify_ticket", &mut executor)
            .expect_err("mismatch");
        assert!(matches!(
            error,
            CommandError::Build(BuildError::MismatchedClose { .. })
        ));
        assert!(controller.is_idle());
        assert!(executor.runs.is_empty());
    }

    #[rstest]
    fn text_while_idle_is_rejected(mut controller: CommandController) {
        assert!(matches!(
            controller.on_text("stray"),
            Err(CommandError::NoCommand { .. })
        ));
    }
}
