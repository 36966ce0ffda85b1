//! g2p Runner
//!
//! Drives a pipeline against a container runtime, one state at a time.
//!
//! Architecture:
//! - Configuration: settle policy, timeouts and failure policies
//! - Services: environment lifecycle (compose) and checker execution (containers)
//! - Orchestrator: the deploy → check → teardown state machine
//!
//! The orchestrator writes progress into the shared pipeline model and
//! publishes out-of-band messages for the reporter.

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod service;

pub use config::{Config, DecommissionPolicy, NetworkGapPolicy, SettlePolicy};
pub use error::{Phase, PipelineError};
pub use events::ReportEvent;
pub use orchestrator::{Orchestrator, PipelineOutcome};
pub use service::{
    CheckerOutcome, CheckerRequest, CheckerService, ComposeEnvironmentService,
    ContainerCheckerService, EnvironmentService, ServiceError,
};
