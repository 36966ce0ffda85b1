//! Environment lifecycle service
//!
//! Brings a state's compose stack up and down under a run identifier used
//! as the compose project name, which isolates concurrent runs of the same
//! descriptor and names the stack's default network.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::ServiceError;
use crate::command::{CommandLine, CommandOutput, args};
use crate::config::Config;

/// Service trait for environment provisioning
#[async_trait]
pub trait EnvironmentService: Send + Sync {
    /// Brings the stack described by `compose_file` up under `run_id`
    async fn provision(&self, compose_file: &Path, run_id: &str) -> Result<(), ServiceError>;

    /// Returns the first network whose name contains `run_id`
    async fn resolve_network(&self, run_id: &str) -> Result<Option<String>, ServiceError>;

    /// Reports whether every service of the stack is up
    async fn is_ready(&self, compose_file: &Path, run_id: &str) -> Result<bool, ServiceError>;

    /// Tears the stack down
    async fn decommission(&self, compose_file: &Path, run_id: &str) -> Result<(), ServiceError>;
}

/// Environment service backed by `docker compose` (or any compatible CLI)
pub struct ComposeEnvironmentService {
    compose: CommandLine,
    container: CommandLine,
}

impl ComposeEnvironmentService {
    /// Creates the service from the runner configuration
    ///
    /// Returns `None` when the configured compose command is empty.
    pub fn new(config: &Config) -> Option<Self> {
        Some(Self {
            compose: CommandLine::from_words(&config.compose_command)?,
            container: CommandLine::parse(&config.container_binary)?,
        })
    }

    fn project_args(compose_file: &Path, run_id: &str) -> Vec<String> {
        vec![
            "-f".to_string(),
            compose_file.to_string_lossy().to_string(),
            "-p".to_string(),
            run_id.to_string(),
        ]
    }

    async fn run_checked(
        line: &CommandLine,
        arguments: Vec<String>,
    ) -> Result<CommandOutput, ServiceError> {
        let output = line
            .run(&arguments)
            .await
            .map_err(|source| ServiceError::Spawn {
                program: line.program().to_string(),
                source,
            })?;

        if !output.success() {
            return Err(ServiceError::CommandFailed {
                command: line.display_with(&arguments),
                details: output.describe(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl EnvironmentService for ComposeEnvironmentService {
    async fn provision(&self, compose_file: &Path, run_id: &str) -> Result<(), ServiceError> {
        info!("Provisioning {} as {}", compose_file.display(), run_id);

        let mut arguments = Self::project_args(compose_file, run_id);
        arguments.extend(args(["up", "-d"]));
        Self::run_checked(&self.compose, arguments).await?;

        info!("Environment {} is up", run_id);
        Ok(())
    }

    async fn resolve_network(&self, run_id: &str) -> Result<Option<String>, ServiceError> {
        let output =
            Self::run_checked(&self.container, args(["network", "ls", "--format", "{{.Name}}"]))
                .await?;

        let network = find_network(output.stdout.lines(), run_id);
        debug!("Network for {}: {:?}", run_id, network);
        Ok(network)
    }

    async fn is_ready(&self, compose_file: &Path, run_id: &str) -> Result<bool, ServiceError> {
        let mut arguments = Self::project_args(compose_file, run_id);
        arguments.extend(args(["ps", "-a", "--format", "{{.State}}|{{.Health}}"]));
        let output = Self::run_checked(&self.compose, arguments).await?;

        Ok(services_ready(&output.stdout))
    }

    async fn decommission(&self, compose_file: &Path, run_id: &str) -> Result<(), ServiceError> {
        info!("Decommissioning environment {}", run_id);

        let mut arguments = Self::project_args(compose_file, run_id);
        arguments.push("down".to_string());
        Self::run_checked(&self.compose, arguments).await?;

        info!("Environment {} is down", run_id);
        Ok(())
    }
}

/// Picks the first network name containing the run identifier
pub fn find_network<'a>(names: impl IntoIterator<Item = &'a str>, run_id: &str) -> Option<String> {
    names
        .into_iter()
        .map(str::trim)
        .find(|name| name.contains(run_id))
        .map(str::to_string)
}

/// Interprets `compose ps --format '{{.State}}|{{.Health}}'` output
///
/// Ready iff at least one service is listed and every service is running
/// with either no health check or a healthy one.
pub fn services_ready(ps_output: &str) -> bool {
    let mut services = ps_output.lines().map(str::trim).filter(|line| !line.is_empty()).peekable();

    if services.peek().is_none() {
        return false;
    }

    services.all(|line| {
        let (state, health) = line.split_once('|').unwrap_or((line, ""));
        state.trim() == "running" && matches!(health.trim(), "" | "healthy")
    })
}
