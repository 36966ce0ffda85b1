//! Check command handler
//!
//! Loads a pipeline descriptor, spawns the orchestrator and keeps the live
//! summary on screen until the pipeline has finished.

use anyhow::{Context, Result, anyhow};
use clap::{Args, ValueEnum};
use colored::*;
use g2p_core::descriptor::load_pipeline;
use g2p_runner::events;
use g2p_runner::{
    ComposeEnvironmentService, Config, ContainerCheckerService, DecommissionPolicy,
    NetworkGapPolicy, Orchestrator, PipelineError, PipelineOutcome, SettlePolicy,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::logging;
use crate::reporter::{Completion, Painter, Reporter};

pub const EXIT_PASSED: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_FATAL: u8 = 2;
pub const EXIT_CANCELLED: u8 = 130;

/// What to do when no network matches the run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingNetwork {
    Fatal,
    Continue,
}

impl From<MissingNetwork> for NetworkGapPolicy {
    fn from(value: MissingNetwork) -> Self {
        match value {
            MissingNetwork::Fatal => NetworkGapPolicy::Fatal,
            MissingNetwork::Continue => NetworkGapPolicy::Continue,
        }
    }
}

/// What to do when tearing an environment down fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TeardownFailure {
    Fatal,
    BestEffort,
}

impl From<TeardownFailure> for DecommissionPolicy {
    fn from(value: TeardownFailure) -> Self {
        match value {
            TeardownFailure::Fatal => DecommissionPolicy::Fatal,
            TeardownFailure::BestEffort => DecommissionPolicy::BestEffort,
        }
    }
}

/// Arguments of `g2p check`
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Pipeline descriptor (YAML)
    #[arg(short, long, env = "G2P_STATE_FILE")]
    pub file: PathBuf,

    /// Forward checker output and log at debug level
    #[arg(short, long, env = "G2P_DEBUG")]
    pub debug: bool,

    /// Delay between provisioning and the first checker
    #[arg(long, env = "G2P_SETTLE_SECS", default_value_t = 10)]
    pub settle_secs: u64,

    /// Poll the environment until it is ready instead of sleeping
    #[arg(long, env = "G2P_PROBE")]
    pub probe: bool,

    /// Interval between readiness probes
    #[arg(long, env = "G2P_PROBE_INTERVAL_SECS", default_value_t = 2)]
    pub probe_interval_secs: u64,

    /// Give up waiting for readiness after this many seconds
    #[arg(long, env = "G2P_PROBE_TIMEOUT_SECS", default_value_t = 120)]
    pub probe_timeout_secs: u64,

    /// Upper bound for bringing an environment up
    #[arg(long, env = "G2P_PROVISION_TIMEOUT_SECS", default_value_t = 300)]
    pub provision_timeout_secs: u64,

    /// Upper bound for a single checker run
    #[arg(long, env = "G2P_CHECK_TIMEOUT_SECS", default_value_t = 600)]
    pub check_timeout_secs: u64,

    /// Upper bound for tearing an environment down
    #[arg(long, env = "G2P_DECOMMISSION_TIMEOUT_SECS", default_value_t = 300)]
    pub decommission_timeout_secs: u64,

    /// Behaviour when no network matches the run identifier
    #[arg(long, env = "G2P_ON_MISSING_NETWORK", value_enum, default_value_t = MissingNetwork::Fatal)]
    pub on_missing_network: MissingNetwork,

    /// Behaviour when an environment cannot be torn down
    #[arg(long, env = "G2P_ON_TEARDOWN_FAILURE", value_enum, default_value_t = TeardownFailure::Fatal)]
    pub on_teardown_failure: TeardownFailure,

    /// Compose command line
    #[arg(long, env = "G2P_COMPOSE_BIN", default_value = "docker compose")]
    pub compose_bin: String,

    /// Container CLI
    #[arg(long, env = "G2P_CONTAINER_BIN", default_value = "docker")]
    pub container_bin: String,

    /// Summary refresh interval in milliseconds
    #[arg(long, env = "G2P_REFRESH_MS", default_value_t = 1000)]
    pub refresh_ms: u64,
}

impl CheckArgs {
    /// Builds the runner configuration from the parsed arguments
    pub fn runner_config(&self) -> Config {
        let settle = if self.probe {
            SettlePolicy::Probe {
                interval: Duration::from_secs(self.probe_interval_secs),
                timeout: Duration::from_secs(self.probe_timeout_secs),
            }
        } else {
            SettlePolicy::Fixed(Duration::from_secs(self.settle_secs))
        };

        Config::new(Vec::new(), self.container_bin.trim().to_string())
            .with_compose_command(&self.compose_bin)
            .with_debug(self.debug)
            .with_settle(settle)
            .with_timeouts(
                Duration::from_secs(self.provision_timeout_secs),
                Duration::from_secs(self.check_timeout_secs),
            )
            .with_network_gap(self.on_missing_network.into())
            .with_decommission(self.on_teardown_failure.into())
            .with_decommission_timeout(Duration::from_secs(self.decommission_timeout_secs))
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }
}

/// Handle `g2p check`
pub async fn handle_check(args: CheckArgs) -> Result<ExitCode> {
    let (events_tx, events_rx) = events::channel();
    logging::init(args.debug, events_tx.clone());

    let pipeline = load_pipeline(&args.file)
        .map_err(PipelineError::from)
        .with_context(|| format!("Failed to load pipeline from {}", args.file.display()))?;
    let pipeline = Arc::new(pipeline);
    info!(
        "Loaded pipeline '{}' with {} state(s)",
        pipeline.name,
        pipeline.states.len()
    );

    let config = args.runner_config();
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let environments =
        ComposeEnvironmentService::new(&config).context("Compose command cannot be empty")?;
    let checkers =
        ContainerCheckerService::new(&config).context("Container binary cannot be empty")?;

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(config, Arc::new(environments), Arc::new(checkers))
        .with_events(events_tx)
        .with_cancellation(cancel.clone());

    let task = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { orchestrator.run(&pipeline).await })
    };

    let reporter = Reporter::new(Painter::detect(), args.refresh_interval());
    let completion = reporter
        .run(&pipeline, task, events_rx, cancel)
        .await
        .context("Orchestrator task failed")?;

    let result = match completion {
        Completion::Finished(result) => result,
        Completion::Interrupted => {
            eprintln!(
                "{} environment left behind, teardown was abandoned",
                "interrupted:".yellow().bold()
            );
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
    };

    print_conclusion(&result);
    Ok(ExitCode::from(exit_status(&result)))
}

/// Maps the pipeline result to the process exit status
pub fn exit_status(result: &Result<PipelineOutcome, PipelineError>) -> u8 {
    match result {
        Ok(PipelineOutcome::Passed) => EXIT_PASSED,
        Ok(PipelineOutcome::Failed) => EXIT_FAILED,
        Err(e) if e.is_cancelled() => EXIT_CANCELLED,
        Err(_) => EXIT_FATAL,
    }
}

fn print_conclusion(result: &Result<PipelineOutcome, PipelineError>) {
    match result {
        Ok(PipelineOutcome::Passed) => {
            println!("{}", "All checkers passed.".green().bold());
        }
        Ok(PipelineOutcome::Failed) => {
            println!("{}", "At least one checker failed.".red().bold());
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("{} {}", "cancelled:".yellow().bold(), e);
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use g2p_runner::Phase;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CheckArgs,
    }

    fn parse(argv: &[&str]) -> CheckArgs {
        let argv = std::iter::once("g2p").chain(argv.iter().copied());
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--file", "pipeline.yml"]);
        assert_eq!(args.file, PathBuf::from("pipeline.yml"));
        assert!(!args.debug);
        assert_eq!(args.refresh_interval(), Duration::from_secs(1));

        let config = args.runner_config();
        assert_eq!(config.compose_command, vec!["docker", "compose"]);
        assert_eq!(config.container_binary, "docker");
        assert_eq!(config.settle, SettlePolicy::Fixed(Duration::from_secs(10)));
        assert_eq!(config.provision_timeout, Duration::from_secs(300));
        assert_eq!(config.checker_timeout, Duration::from_secs(600));
        assert_eq!(config.decommission_timeout, Duration::from_secs(300));
        assert_eq!(config.network_gap, NetworkGapPolicy::Fatal);
        assert_eq!(config.decommission, DecommissionPolicy::Fatal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_is_required() {
        assert!(TestCli::try_parse_from(["g2p"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "-f",
            "p.yml",
            "-d",
            "--probe",
            "--probe-interval-secs",
            "1",
            "--probe-timeout-secs",
            "30",
            "--on-missing-network",
            "continue",
            "--on-teardown-failure",
            "best-effort",
            "--decommission-timeout-secs",
            "45",
            "--compose-bin",
            "podman-compose",
            "--container-bin",
            "podman",
            "--refresh-ms",
            "0",
        ]);

        assert_eq!(args.refresh_interval(), Duration::from_millis(1));

        let config = args.runner_config();
        assert!(config.debug);
        assert_eq!(
            config.settle,
            SettlePolicy::Probe {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(30),
            }
        );
        assert_eq!(config.network_gap, NetworkGapPolicy::Continue);
        assert_eq!(config.decommission, DecommissionPolicy::BestEffort);
        assert_eq!(config.decommission_timeout, Duration::from_secs(45));
        assert_eq!(config.compose_command, vec!["podman-compose"]);
        assert_eq!(config.container_binary, "podman");
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = TestCli::try_parse_from(["g2p", "-f", "p.yml", "--on-missing-network", "maybe"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&Ok(PipelineOutcome::Passed)), 0);
        assert_eq!(exit_status(&Ok(PipelineOutcome::Failed)), 1);

        let cancelled = PipelineError::Cancelled {
            state: "blue".to_string(),
            phase: Phase::RunningTests,
        };
        assert_eq!(exit_status(&Err(cancelled)), 130);

        let fatal = PipelineError::Provisioning {
            state: "blue".to_string(),
            run_id: "g2p_1".to_string(),
            message: "exit_code=1".to_string(),
        };
        assert_eq!(exit_status(&Err(fatal)), 2);
    }
}
