//! Service layer
//!
//! Services wrap the external container runtime. The orchestrator only sees
//! the traits, which keeps the state machine testable with in-memory doubles.

mod checker;
mod environment;

use std::time::Duration;
use thiserror::Error;

pub use checker::{CheckerOutcome, CheckerRequest, CheckerService, ContainerCheckerService, container_name};
pub use environment::{ComposeEnvironmentService, EnvironmentService, find_network, services_ready};

/// Errors raised by runtime services
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The external program could not be launched
    #[error("Failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran and reported failure
    #[error("'{command}' failed: {details}")]
    CommandFailed { command: String, details: String },

    /// The external program's output could not be interpreted
    #[error("Unexpected output from '{command}': {output}")]
    UnexpectedOutput { command: String, output: String },

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Cancelled")]
    Cancelled,
}
