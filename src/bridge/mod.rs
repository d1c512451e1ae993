//! Interactive subprocess bridge.
//!
//! Runs an installer CLI on a pseudo-terminal, streams its output as
//! [`BridgeEvent`]s, surfaces the questions it blocks on, and writes the
//! caller's replies back. One worker thread per child owns all prompt state;
//! callers interact with it through a [`BridgeHandle`] and the event receiver
//! returned by [`ProcessBridge::start`].

mod arbiter;
mod command;
mod process;
mod text;

use std::io;

pub use arbiter::{ArbiterConfig, PromptArbiter, PromptState, Verdict};
pub use command::CommandLine;
pub use process::{BridgeConfig, BridgeHandle, ProcessBridge};
pub use text::{normalize, strip_ansi, Utf8Decoder};

/// Output line emitted when the child exits with code 0.
pub const COMPLETED_MARKER: &str = "Command completed successfully";
/// Prefix of the output line emitted when the child exits with any other code.
pub const FAILED_MARKER_PREFIX: &str = "Command failed with return code: ";
/// Output line emitted when the child was stopped through [`BridgeHandle::terminate`].
pub const CANCELLED_MARKER: &str = "Operation cancelled by user";

/// Events emitted by the bridge, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A decoded chunk of child output, or a bridge status line.
    Output(String),
    /// The child is blocked on a new question.
    PromptDetected(String),
    /// The child is gone. Always the last event, emitted exactly once.
    Exit(ExitResult),
}

/// Final status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitResult {
    pub exit_code: Option<i32>,
    pub terminated_by_signal: bool,
}

impl ExitResult {
    pub fn success(&self) -> bool {
        !self.terminated_by_signal && self.exit_code == Some(0)
    }

    /// The completion line collaborators pattern-match on.
    pub fn completion_message(&self) -> String {
        if self.terminated_by_signal {
            return CANCELLED_MARKER.to_string();
        }
        match self.exit_code {
            Some(0) => COMPLETED_MARKER.to_string(),
            Some(code) => format!("{FAILED_MARKER_PREFIX}{code}"),
            None => format!("{FAILED_MARKER_PREFIX}unknown"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write to the process: {0}")]
    Write(#[source] io::Error),

    #[error("no process is running")]
    NotRunning,
}
