//! Status action machine
//!
//! A command write flips the attribute to in-progress and launches one
//! background backend call. The call's outcome becomes the terminal state,
//! which reads (and notifications, when subscribed) report.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use casanode_proto::{STATUS_ERROR, STATUS_IN_PROGRESS, STATUS_NOT_STARTED};

use crate::backend::{Backend, BackendRequest, BackendResponse};
use crate::error::RejectReason;
use crate::notify::NotifyGate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    NotStarted,
    InProgress,
    /// Terminal, carries the encoded success payload
    Success(String),
    /// Terminal, carries the reason for the log
    Error(String),
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Success(_) | ActionState::Error(_))
    }

    /// Simple status code encoding: `0`, `1`, the success payload, `-1`
    pub fn code(&self) -> &str {
        match self {
            ActionState::NotStarted => STATUS_NOT_STARTED,
            ActionState::InProgress => STATUS_IN_PROGRESS,
            ActionState::Success(payload) => payload,
            ActionState::Error(_) => STATUS_ERROR,
        }
    }
}

/// What to do with a command the attribute doesn't recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidCommandPolicy {
    /// Refuse the write, state untouched
    Reject,
    /// Accept the write and record an error state
    Absorb,
}

/// What to do with a command while one is already running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyPolicy {
    /// Refuse the write
    Reject,
    /// Accept the write and drop it
    Ignore,
}

/// Per-attribute behaviour plugged into an [`ActionMachine`].
pub trait Action: Send + Sync + 'static {
    type Command: Debug + Clone + Send + Sync + 'static;

    /// Attribute identifier, used in logs
    fn name(&self) -> &'static str;

    /// Parse a trimmed, lowercased command
    fn decode_command(&self, input: &str) -> Option<Self::Command>;

    /// Backend call that carries out `command`
    fn request(&self, command: &Self::Command) -> BackendRequest;

    /// Turn a successful response into the success payload
    fn complete(&self, command: &Self::Command, response: BackendResponse) -> Result<String, String>;

    fn encode_state(&self, state: &ActionState) -> Vec<u8> {
        state.code().as_bytes().to_vec()
    }

    fn on_invalid(&self) -> InvalidCommandPolicy {
        InvalidCommandPolicy::Reject
    }

    fn on_busy(&self) -> BusyPolicy {
        BusyPolicy::Reject
    }
}

struct Inner<A: Action> {
    action: A,
    backend: Arc<dyn Backend>,
    state: Mutex<ActionState>,
    gate: NotifyGate,
}

/// One action attribute's state plus the machinery to drive it.
///
/// Cloning shares the same state.
pub struct ActionMachine<A: Action> {
    inner: Arc<Inner<A>>,
}

impl<A: Action> Clone for ActionMachine<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Action> ActionMachine<A> {
    pub fn new(action: A, backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                action,
                backend,
                state: Mutex::new(ActionState::NotStarted),
                gate: NotifyGate::new(),
            }),
        }
    }

    pub fn action(&self) -> &A {
        &self.inner.action
    }

    pub fn gate(&self) -> &NotifyGate {
        &self.inner.gate
    }

    pub fn state(&self) -> ActionState {
        self.inner.lock().clone()
    }

    /// Encoded snapshot of the current state
    pub fn read(&self) -> Vec<u8> {
        let snapshot = self.state();
        tracing::debug!(attribute = self.inner.action.name(), state = ?snapshot, "read");
        self.inner.action.encode_state(&snapshot)
    }

    /// Accept a command write.
    ///
    /// Must be called from within a tokio runtime; the backend call runs on a
    /// spawned task and this returns before it completes.
    pub fn submit(&self, value: &[u8]) -> Result<(), RejectReason> {
        let inner = &self.inner;
        let name = inner.action.name();
        let input = String::from_utf8_lossy(value).trim().to_lowercase();

        let Some(command) = inner.action.decode_command(&input) else {
            tracing::warn!(attribute = name, action = %input, "unknown command");
            return match inner.action.on_invalid() {
                InvalidCommandPolicy::Reject => Err(RejectReason::InvalidCommand(input)),
                InvalidCommandPolicy::Absorb => {
                    let value = {
                        let mut state = inner.lock();
                        if *state == ActionState::InProgress {
                            return Ok(());
                        }
                        *state = ActionState::Error(format!("unknown command {input:?}"));
                        inner.action.encode_state(&state)
                    };
                    inner.gate.maybe_notify(value);
                    Ok(())
                }
            };
        };

        let value = {
            let mut state = inner.lock();
            if *state == ActionState::InProgress {
                tracing::warn!(attribute = name, action = %input, "already in progress");
                return match inner.action.on_busy() {
                    BusyPolicy::Reject => Err(RejectReason::AlreadyInProgress),
                    BusyPolicy::Ignore => Ok(()),
                };
            }
            *state = ActionState::InProgress;
            inner.action.encode_state(&state)
        };

        tracing::info!(attribute = name, action = %input, "started");
        inner.gate.maybe_notify(value);
        self.spawn(command);
        Ok(())
    }

    fn spawn(&self, command: A::Command) {
        let worker = {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run(command).await })
        };

        // The supervisor owns the terminal transition so that a panicking
        // worker still ends in Error.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("task failed: {e}")),
            };
            inner.finish(outcome);
        });
    }
}

impl<A: Action> Inner<A> {
    fn lock(&self) -> MutexGuard<'_, ActionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self, command: A::Command) -> Result<String, String> {
        let request = self.action.request(&command);
        match self.backend.call(request).await {
            Ok(response) => self.action.complete(&command, response),
            Err(e) => Err(e.to_string()),
        }
    }

    fn finish(&self, outcome: Result<String, String>) {
        let name = self.action.name();
        let state = match outcome {
            Ok(payload) => {
                tracing::info!(attribute = name, result = %payload, "completed");
                ActionState::Success(payload)
            }
            Err(reason) => {
                tracing::error!(attribute = name, "failed: {reason}");
                ActionState::Error(reason)
            }
        };
        // Encode under the lock so the notification carries this transition
        // even if a new command starts right after.
        let value = {
            let mut current = self.lock();
            *current = state;
            self.action.encode_state(&current)
        };
        self.gate.maybe_notify(value);
    }
}
