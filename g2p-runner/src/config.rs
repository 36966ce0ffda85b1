//! Runner configuration
//!
//! Defines how the runner talks to the container runtime, how long each
//! phase may take and which failures abort the pipeline.

use std::time::Duration;

/// How the orchestrator waits for a freshly provisioned environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePolicy {
    /// Sleep for a fixed delay
    Fixed(Duration),
    /// Poll the runtime until every service is running (and healthy, when it
    /// declares a health check), giving up after `timeout`
    Probe { interval: Duration, timeout: Duration },
}

/// What to do when no network matches the run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkGapPolicy {
    /// Tear the environment down and abort the pipeline
    #[default]
    Fatal,
    /// Warn and run checkers without a network attachment
    Continue,
}

/// What to do when tearing an environment down fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecommissionPolicy {
    /// Abort the pipeline
    #[default]
    Fatal,
    /// Warn and move on to the next state
    BestEffort,
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Compose invocation, program first (e.g. `["docker", "compose"]`)
    pub compose_command: Vec<String>,

    /// Container CLI used for checkers and network listing
    pub container_binary: String,

    /// Fetch checker output and forward it to the reporter
    pub debug: bool,

    pub settle: SettlePolicy,

    /// Upper bound for bringing an environment up
    pub provision_timeout: Duration,

    /// Upper bound for a single checker run
    pub checker_timeout: Duration,

    /// Upper bound for tearing an environment down
    pub decommission_timeout: Duration,

    pub network_gap: NetworkGapPolicy,

    pub decommission: DecommissionPolicy,
}

impl Config {
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

    /// Creates a configuration with defaults for the given binaries
    pub fn new(compose_command: Vec<String>, container_binary: String) -> Self {
        Self {
            compose_command,
            container_binary,
            debug: false,
            settle: SettlePolicy::Fixed(Self::DEFAULT_SETTLE_DELAY),
            provision_timeout: Duration::from_secs(300),
            checker_timeout: Duration::from_secs(600),
            decommission_timeout: Duration::from_secs(300),
            network_gap: NetworkGapPolicy::default(),
            decommission: DecommissionPolicy::default(),
        }
    }

    /// Splits a command line such as `"docker compose"` on whitespace
    pub fn with_compose_command(mut self, command_line: &str) -> Self {
        self.compose_command = command_line.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_timeouts(mut self, provision: Duration, checker: Duration) -> Self {
        self.provision_timeout = provision;
        self.checker_timeout = checker;
        self
    }

    pub fn with_decommission_timeout(mut self, timeout: Duration) -> Self {
        self.decommission_timeout = timeout;
        self
    }

    pub fn with_network_gap(mut self, policy: NetworkGapPolicy) -> Self {
        self.network_gap = policy;
        self
    }

    pub fn with_decommission(mut self, policy: DecommissionPolicy) -> Self {
        self.decommission = policy;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.compose_command.is_empty() {
            return Err("compose command cannot be empty".to_string());
        }

        if self.container_binary.trim().is_empty() {
            return Err("container binary cannot be empty".to_string());
        }

        if let SettlePolicy::Probe { interval, timeout } = self.settle {
            if interval.is_zero() {
                return Err("probe interval must be greater than 0".to_string());
            }
            if timeout < interval {
                return Err("probe timeout must not be shorter than the probe interval".to_string());
            }
        }

        if self.provision_timeout.is_zero() {
            return Err("provision timeout must be greater than 0".to_string());
        }

        if self.checker_timeout.is_zero() {
            return Err("checker timeout must be greater than 0".to_string());
        }

        if self.decommission_timeout.is_zero() {
            return Err("decommission timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            vec!["docker".to_string(), "compose".to_string()],
            "docker".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.compose_command, vec!["docker", "compose"]);
        assert_eq!(config.container_binary, "docker");
        assert_eq!(config.settle, SettlePolicy::Fixed(Duration::from_secs(10)));
        assert_eq!(config.network_gap, NetworkGapPolicy::Fatal);
        assert_eq!(config.decommission, DecommissionPolicy::Fatal);
        assert_eq!(config.decommission_timeout, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_compose_command() {
        let config = Config::default().with_compose_command("  docker-compose ");
        assert_eq!(config.compose_command, vec!["docker-compose"]);

        let config = Config::default().with_compose_command("   ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.container_binary = String::new();
        assert!(config.validate().is_err());
        config.container_binary = "podman".to_string();

        config.settle = SettlePolicy::Probe {
            interval: Duration::ZERO,
            timeout: Duration::from_secs(30),
        };
        assert!(config.validate().is_err());

        config.settle = SettlePolicy::Probe {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
        };
        assert!(config.validate().is_err());

        config.settle = SettlePolicy::Probe {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        };
        assert!(config.validate().is_ok());

        config.checker_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.checker_timeout = Duration::from_secs(1);

        config.decommission_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_debug(true)
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(2))
            .with_network_gap(NetworkGapPolicy::Continue)
            .with_decommission(DecommissionPolicy::BestEffort)
            .with_decommission_timeout(Duration::from_secs(3));

        assert!(config.debug);
        assert_eq!(config.decommission_timeout, Duration::from_secs(3));
        assert_eq!(config.provision_timeout, Duration::from_secs(1));
        assert_eq!(config.checker_timeout, Duration::from_secs(2));
        assert_eq!(config.network_gap, NetworkGapPolicy::Continue);
        assert_eq!(config.decommission, DecommissionPolicy::BestEffort);
    }
}
