use crate::core::input::InputError;
use crate::core::models::structure::StructureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Shell startup failed: {0}")]
    Startup(String),

    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Protocol violation: expected {expected}, received '{received}'")]
    Protocol { expected: String, received: String },

    #[error("Invalid input configuration: {source}")]
    Configuration {
        #[from]
        source: InputError,
    },

    #[error("Invalid structure: {source}")]
    Structure {
        #[from]
        source: StructureError,
    },

    #[error("Shell process terminated: {0}")]
    ProcessTerminated(String),

    #[error("Numeric invariant violated: {0}")]
    NumericInvariant(String),

    #[error("Operation '{operation}' is not valid while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Session is unusable after an earlier failure and must be restarted")]
    Faulted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellError {
    pub(crate) fn protocol(expected: impl Into<String>, received: impl Into<String>) -> Self {
        Self::Protocol {
            expected: expected.into(),
            received: received.into(),
        }
    }

    /// Whether the error leaves the conversation with the engine in an unknown state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. }
                | Self::ProcessTerminated(_)
                | Self::NumericInvariant(_)
                | Self::Io(_)
        )
    }
}
