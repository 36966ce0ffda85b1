//! Checker execution service
//!
//! Runs one verification workload as a container attached to the state's
//! network and reports its exit code. The container is always removed
//! afterwards, whatever the outcome.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ServiceError;
use crate::command::{CommandLine, CommandOutput, args};
use crate::config::Config;

/// Everything needed to run one checker
#[derive(Debug, Clone, Copy)]
pub struct CheckerRequest<'a> {
    pub run_id: &'a str,
    /// Position of the checker within its state
    pub ordinal: usize,
    pub name: &'a str,
    pub image: &'a str,
    pub env: &'a [String],
    pub network: Option<&'a str>,
}

/// Result of a checker that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerOutcome {
    pub container: String,
    pub exit_code: i64,
    /// Combined workload output, only collected in debug mode
    pub logs: Option<String>,
}

/// Service trait for running checkers
#[async_trait]
pub trait CheckerService: Send + Sync {
    /// Runs the checker and waits for it to exit
    ///
    /// A nonzero exit code is a successful call; errors are reserved for
    /// infrastructure failures, timeouts and cancellation.
    async fn execute(
        &self,
        request: CheckerRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CheckerOutcome, ServiceError>;
}

/// Checker service backed by the docker (or podman) CLI
pub struct ContainerCheckerService {
    container: CommandLine,
    timeout: Duration,
    debug: bool,
}

impl ContainerCheckerService {
    /// Creates the service from the runner configuration
    ///
    /// Returns `None` when the configured container binary is empty.
    pub fn new(config: &Config) -> Option<Self> {
        Some(Self {
            container: CommandLine::parse(&config.container_binary)?,
            timeout: config.checker_timeout,
            debug: config.debug,
        })
    }

    async fn run(&self, arguments: Vec<String>) -> Result<CommandOutput, ServiceError> {
        self.container
            .run(&arguments)
            .await
            .map_err(|source| ServiceError::Spawn {
                program: self.container.program().to_string(),
                source,
            })
    }

    async fn run_checked(&self, arguments: Vec<String>) -> Result<CommandOutput, ServiceError> {
        let output = self.run(arguments.clone()).await?;
        if !output.success() {
            return Err(ServiceError::CommandFailed {
                command: self.container.display_with(&arguments),
                details: output.describe(),
            });
        }
        Ok(output)
    }

    fn create_args(request: &CheckerRequest<'_>, container: &str) -> Vec<String> {
        let mut arguments = args(["create", "--name", container]);
        if let Some(network) = request.network {
            arguments.extend(args(["--network", network]));
        }
        for assignment in request.env {
            arguments.extend(args(["-e", assignment.as_str()]));
        }
        arguments.push(request.image.to_string());
        arguments
    }

    /// Starts the created container and waits for its exit status
    async fn start_and_wait(
        &self,
        container: &str,
        cancel: &CancellationToken,
    ) -> Result<i64, ServiceError> {
        self.run_checked(args(["start", container])).await?;

        let wait_args = args(["wait", container]);
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.run_checked(wait_args.clone())) => {
                match result {
                    Ok(output) => output?,
                    Err(_) => return Err(ServiceError::TimedOut(self.timeout)),
                }
            }
        };

        parse_exit_code(&output.stdout).ok_or_else(|| ServiceError::UnexpectedOutput {
            command: self.container.display_with(&wait_args),
            output: output.stdout.trim().to_string(),
        })
    }

    async fn collect_logs(&self, container: &str) -> Option<String> {
        match self.run_checked(args(["logs", container])).await {
            Ok(output) => Some(combine_streams(&output)),
            Err(e) => {
                warn!("Failed to fetch logs of {}: {}", container, e);
                None
            }
        }
    }

    async fn remove(&self, container: &str) {
        match self.run(args(["rm", "-f", container])).await {
            Ok(output) if output.success() => debug!("Container {} removed", container),
            Ok(output) => warn!("Failed to remove container {}: {}", container, output.describe()),
            Err(e) => warn!("Failed to remove container {}: {}", container, e),
        }
    }
}

#[async_trait]
impl CheckerService for ContainerCheckerService {
    async fn execute(
        &self,
        request: CheckerRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CheckerOutcome, ServiceError> {
        let container = container_name(request.run_id, request.name, request.ordinal);
        info!("Running checker '{}' as {}", request.name, container);

        // Nothing to remove when creation itself failed.
        self.run_checked(Self::create_args(&request, &container)).await?;

        let result = self.start_and_wait(&container, cancel).await;

        let logs = match (&result, self.debug) {
            (Ok(_), true) => self.collect_logs(&container).await,
            _ => None,
        };

        self.remove(&container).await;

        let exit_code = result?;
        info!("Checker '{}' exited with code {}", request.name, exit_code);

        Ok(CheckerOutcome {
            container,
            exit_code,
            logs,
        })
    }
}

/// Deterministic container name: `<run_id>_<sanitized name>_<ordinal>`
pub fn container_name(run_id: &str, checker_name: &str, ordinal: usize) -> String {
    let sanitized: String = checker_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}_{}", run_id, sanitized, ordinal)
}

fn parse_exit_code(stdout: &str) -> Option<i64> {
    stdout.lines().map(str::trim).find(|line| !line.is_empty())?.parse().ok()
}

fn combine_streams(output: &CommandOutput) -> String {
    let stdout = output.stdout.trim_end();
    let stderr = output.stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (false, false) => format!("{}\n{}", stdout, stderr),
        (false, true) => stdout.to_string(),
        (true, _) => stderr.to_string(),
    }
}
