//! Pipeline orchestrator
//!
//! Drives every state of a pipeline, strictly in declared order, through
//! deploy → check → teardown. The next state is only provisioned once the
//! previous one has been decommissioned.
//!
//! Infrastructure failures abort the whole pipeline after a best-effort
//! teardown of the current environment. Checker exit codes are only recorded:
//! they decide the final outcome, never the control flow.

use g2p_core::domain::{Pipeline, State};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, DecommissionPolicy, NetworkGapPolicy, SettlePolicy};
use crate::error::{Phase, PipelineError};
use crate::events::{EventSender, ReportEvent};
use crate::service::{CheckerRequest, CheckerService, EnvironmentService, ServiceError};

/// Aggregated result of a pipeline that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every checker of every state exited with code 0
    Passed,
    /// At least one checker exited nonzero
    Failed,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Passed)
    }
}

/// Generates a collision-resistant run identifier, e.g. `g2p_3f2a…`
pub fn new_run_id() -> String {
    format!("g2p_{}", Uuid::new_v4().simple())
}

/// Sequences states against the environment and checker services
pub struct Orchestrator {
    config: Config,
    environments: Arc<dyn EnvironmentService>,
    checkers: Arc<dyn CheckerService>,
    events: Option<EventSender>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        environments: Arc<dyn EnvironmentService>,
        checkers: Arc<dyn CheckerService>,
    ) -> Self {
        Self {
            config,
            environments,
            checkers,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Publishes out-of-band messages (checker output, warnings) to `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Uses `cancel` to stop the pipeline from the outside
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every state and aggregates the outcome
    pub async fn run(&self, pipeline: &Pipeline) -> Result<PipelineOutcome, PipelineError> {
        info!(
            "Starting pipeline '{}' ({} state(s), {} checker(s))",
            pipeline.name,
            pipeline.states.len(),
            pipeline.checker_count()
        );

        for (idx, state) in pipeline.states.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    state: state.name.clone(),
                    phase: Phase::Deploying,
                });
            }

            info!(
                "Processing state {}/{}: {}",
                idx + 1,
                pipeline.states.len(),
                state.name
            );
            self.process_state(state).await?;
        }

        let outcome = if pipeline.is_valid() {
            PipelineOutcome::Passed
        } else {
            PipelineOutcome::Failed
        };
        info!("Pipeline '{}' finished: {:?}", pipeline.name, outcome);

        Ok(outcome)
    }

    async fn process_state(&self, state: &State) -> Result<(), PipelineError> {
        let run_id = new_run_id();
        state.start();

        state.set_operation(Phase::Deploying.label());
        if let Err(e) = self.provision(state, &run_id).await {
            error!("{}", e);
            self.teardown_after_failure(state, &run_id).await;
            return Err(e);
        }

        state.set_operation(Phase::RunningTests.label());
        if let Err(e) = self.run_checkers(state, &run_id).await {
            error!("{}", e);
            self.teardown_after_failure(state, &run_id).await;
            return Err(e);
        }

        state.set_operation(Phase::Undeploying.label());
        if let Err(e) = self.decommission(state, &run_id).await {
            error!("{}", e);
            state.set_operation("Aborted");
            return Err(e);
        }

        state.stop();
        info!("State '{}' completed (valid: {})", state.name, state.is_valid());
        Ok(())
    }

    async fn provision(&self, state: &State, run_id: &str) -> Result<(), PipelineError> {
        let work = self.environments.provision(&state.compose_file, run_id);

        self.bounded(state, Phase::Deploying, self.config.provision_timeout, work)
            .await?
            .map_err(|e| PipelineError::Provisioning {
                state: state.name.clone(),
                run_id: run_id.to_string(),
                message: e.to_string(),
            })
    }

    async fn run_checkers(&self, state: &State, run_id: &str) -> Result<(), PipelineError> {
        let network = self.resolve_network(state, run_id).await?;
        self.settle(state, run_id).await?;

        for (ordinal, checker) in state.checkers.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    state: state.name.clone(),
                    phase: Phase::RunningTests,
                });
            }

            checker.start();
            let request = CheckerRequest {
                run_id,
                ordinal,
                name: &checker.name,
                image: &checker.image,
                env: &checker.env,
                network: network.as_deref(),
            };

            let outcome = match self.checkers.execute(request, &self.cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Completed without exit code: shown as failed, elapsed frozen.
                    checker.stop();
                    return Err(match e {
                        ServiceError::Cancelled => PipelineError::Cancelled {
                            state: state.name.clone(),
                            phase: Phase::RunningTests,
                        },
                        ServiceError::TimedOut(after) => PipelineError::Timeout {
                            state: state.name.clone(),
                            phase: Phase::RunningTests,
                            after,
                        },
                        other => PipelineError::Execution {
                            state: state.name.clone(),
                            checker: checker.name.clone(),
                            message: other.to_string(),
                        },
                    });
                }
            };

            checker.finish(outcome.exit_code);
            debug!(
                "Checker '{}' ran as container {}",
                checker.name, outcome.container
            );

            if outcome.exit_code != 0 {
                info!(
                    "Checker '{}' of state '{}' failed with exit code {}",
                    checker.name, state.name, outcome.exit_code
                );
            }

            if let Some(output) = outcome.logs {
                self.publish(ReportEvent::CheckerOutput {
                    state: state.name.clone(),
                    checker: checker.name.clone(),
                    output,
                });
            }
        }

        Ok(())
    }

    async fn resolve_network(
        &self,
        state: &State,
        run_id: &str,
    ) -> Result<Option<String>, PipelineError> {
        let network = self
            .environments
            .resolve_network(run_id)
            .await
            .map_err(|e| PipelineError::NetworkResolution {
                state: state.name.clone(),
                run_id: run_id.to_string(),
                reason: e.to_string(),
            })?;

        match (network, self.config.network_gap) {
            (Some(network), _) => {
                debug!("State '{}' uses network {}", state.name, network);
                Ok(Some(network))
            }
            (None, NetworkGapPolicy::Fatal) => Err(PipelineError::NetworkResolution {
                state: state.name.clone(),
                run_id: run_id.to_string(),
                reason: "no network name contains the run identifier".to_string(),
            }),
            (None, NetworkGapPolicy::Continue) => {
                let message = format!(
                    "State '{}': no network found for {}, running checkers unattached",
                    state.name, run_id
                );
                warn!("{}", message);
                self.publish(ReportEvent::Notice(message));
                Ok(None)
            }
        }
    }

    /// Waits for the freshly provisioned environment to become reachable
    async fn settle(&self, state: &State, run_id: &str) -> Result<(), PipelineError> {
        match self.config.settle {
            SettlePolicy::Fixed(delay) => {
                debug!("Waiting {:?} for environment {} to settle", delay, run_id);
                tokio::select! {
                    _ = self.cancel.cancelled() => Err(PipelineError::Cancelled {
                        state: state.name.clone(),
                        phase: Phase::RunningTests,
                    }),
                    _ = tokio::time::sleep(delay) => Ok(()),
                }
            }
            SettlePolicy::Probe { interval, timeout } => {
                let probe = async {
                    loop {
                        match self.environments.is_ready(&state.compose_file, run_id).await {
                            Ok(true) => break,
                            Ok(false) => debug!("Environment {} is not ready yet", run_id),
                            Err(e) => debug!("Readiness probe for {} failed: {}", run_id, e),
                        }
                        tokio::time::sleep(interval).await;
                    }
                };
                self.bounded(state, Phase::RunningTests, timeout, probe).await
            }
        }
    }

    async fn decommission(&self, state: &State, run_id: &str) -> Result<(), PipelineError> {
        let Err(err) = self.bounded_decommission(state, run_id).await else {
            return Ok(());
        };

        match self.config.decommission {
            DecommissionPolicy::Fatal => Err(err),
            DecommissionPolicy::BestEffort => {
                warn!("{}", err);
                self.publish(ReportEvent::Notice(format!("Warning: {}", err)));
                Ok(())
            }
        }
    }

    /// Tears the environment down while unwinding from a fatal error
    async fn teardown_after_failure(&self, state: &State, run_id: &str) {
        state.set_operation("Aborting");
        if let Err(e) = self.bounded_decommission(state, run_id).await {
            warn!("Best-effort teardown of {} failed: {}", run_id, e);
        }
        state.set_operation("Aborted");
    }

    /// Runs `compose down` under `decommission_timeout`
    ///
    /// Not raced against cancellation: a cancelled run still tears down.
    async fn bounded_decommission(
        &self,
        state: &State,
        run_id: &str,
    ) -> Result<(), PipelineError> {
        let limit = self.config.decommission_timeout;
        let work = self.environments.decommission(&state.compose_file, run_id);

        match tokio::time::timeout(limit, work).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PipelineError::Decommission {
                state: state.name.clone(),
                run_id: run_id.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(PipelineError::Timeout {
                state: state.name.clone(),
                phase: Phase::Undeploying,
                after: limit,
            }),
        }
    }

    /// Races `work` against cancellation and a deadline
    async fn bounded<T>(
        &self,
        state: &State,
        phase: Phase,
        limit: Duration,
        work: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled {
                state: state.name.clone(),
                phase,
            }),
            result = tokio::time::timeout(limit, work) => result.map_err(|_| PipelineError::Timeout {
                state: state.name.clone(),
                phase,
                after: limit,
            }),
        }
    }

    fn publish(&self, event: ReportEvent) {
        if let Some(events) = &self.events {
            // The reporter may already be gone at shutdown.
            let _ = events.send(event);
        }
    }
}
