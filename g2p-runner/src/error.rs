//! Error types for pipeline orchestration
//!
//! Every variant is an infrastructure failure that aborts the pipeline.
//! A checker exiting nonzero is not an error: it is recorded on the checker
//! and only shows up in the aggregated outcome.

use g2p_core::descriptor::DescriptorError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Phase of a state's deploy → check → teardown cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Deploying,
    RunningTests,
    Undeploying,
}

impl Phase {
    /// Operation label shown by the reporter while the phase runs
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Deploying => "Deploying",
            Phase::RunningTests => "Running tests",
            Phase::Undeploying => "Undeploying",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Descriptor missing or malformed
    #[error(transparent)]
    Config(#[from] DescriptorError),

    #[error("State '{state}': provisioning environment {run_id} failed: {message}")]
    Provisioning {
        state: String,
        run_id: String,
        message: String,
    },

    #[error("State '{state}': could not resolve a network for environment {run_id}: {reason}")]
    NetworkResolution {
        state: String,
        run_id: String,
        reason: String,
    },

    #[error("State '{state}': checker '{checker}' could not be executed: {message}")]
    Execution {
        state: String,
        checker: String,
        message: String,
    },

    #[error("State '{state}': decommissioning environment {run_id} failed: {message}")]
    Decommission {
        state: String,
        run_id: String,
        message: String,
    },

    #[error("State '{state}': {phase} timed out after {after:?}")]
    Timeout {
        state: String,
        phase: Phase,
        after: Duration,
    },

    #[error("State '{state}': cancelled while {phase}")]
    Cancelled { state: String, phase: Phase },
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_state_and_phase() {
        let err = PipelineError::Timeout {
            state: "blue".to_string(),
            phase: Phase::RunningTests,
            after: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "State 'blue': Running tests timed out after 3s");
        assert!(!err.is_cancelled());

        let err = PipelineError::Cancelled {
            state: "green".to_string(),
            phase: Phase::Deploying,
        };
        assert_eq!(err.to_string(), "State 'green': cancelled while Deploying");
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err = PipelineError::from(DescriptorError::Invalid("no name".to_string()));
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "Invalid descriptor: no name");
    }
}
