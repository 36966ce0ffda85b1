//! Lifecycle tracking shared by states and checkers

use std::time::{Duration, Instant};

/// Observable phase of a lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Pending,
    Running,
    Completed,
}

/// Visual severity paralleling the status text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Neutral,
    InProgress,
    Success,
    Failure,
}

/// Start/stop tracker attached to every state and checker
///
/// Pending until `start()`, Running until `stop()`, Completed afterwards.
/// The end instant is never earlier than the start instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lifecycle {
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    operation: String,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves Pending to Running
    ///
    /// Returns `false` and leaves the tracker untouched if it was already started.
    pub fn start(&mut self) -> bool {
        self.start_at(Instant::now())
    }

    pub fn start_at(&mut self, at: Instant) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(at);
        true
    }

    /// Moves Running to Completed
    ///
    /// Returns `false` if the tracker is pending or already completed.
    pub fn stop(&mut self) -> bool {
        self.stop_at(Instant::now())
    }

    pub fn stop_at(&mut self, at: Instant) -> bool {
        match self.started_at {
            Some(start) if self.ended_at.is_none() => {
                self.ended_at = Some(at.max(start));
                true
            }
            _ => false,
        }
    }

    /// Sets the label shown while running (e.g. "Deploying")
    pub fn set_operation(&mut self, operation: impl Into<String>) {
        self.operation = operation.into();
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn phase(&self) -> LifecyclePhase {
        match (self.started_at, self.ended_at) {
            (None, _) => LifecyclePhase::Pending,
            (Some(_), None) => LifecyclePhase::Running,
            (Some(_), Some(_)) => LifecyclePhase::Completed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase() == LifecyclePhase::Completed
    }

    /// Elapsed time: live while running, frozen once stopped, `None` before start
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        let start = self.started_at?;
        let end = self.ended_at.unwrap_or(now);
        Some(end.saturating_duration_since(start))
    }

    /// Status text
    ///
    /// `frame` drives the cosmetic dot animation shown while running; the
    /// dot count is `frame % 4`.
    pub fn status(&self, valid: bool, frame: usize) -> String {
        match self.phase() {
            LifecyclePhase::Pending => "Pending".to_string(),
            LifecyclePhase::Running => {
                let operation = if self.operation.is_empty() {
                    "Running"
                } else {
                    self.operation.as_str()
                };
                format!("{} {}", operation, ".".repeat(frame % 4))
            }
            LifecyclePhase::Completed if valid => "Valid".to_string(),
            LifecyclePhase::Completed => "Failed".to_string(),
        }
    }

    pub fn severity(&self, valid: bool) -> Severity {
        match self.phase() {
            LifecyclePhase::Pending => Severity::Neutral,
            LifecyclePhase::Running => Severity::InProgress,
            LifecyclePhase::Completed if valid => Severity::Success,
            LifecyclePhase::Completed => Severity::Failure,
        }
    }
}

/// Capability of anything that owns a lifecycle and a validity predicate
pub trait Tracked {
    fn lifecycle(&self) -> &Lifecycle;

    fn is_valid(&self) -> bool;

    fn status(&self, frame: usize) -> String {
        self.lifecycle().status(self.is_valid(), frame)
    }

    fn severity(&self) -> Severity {
        self.lifecycle().severity(self.is_valid())
    }
}

/// Formats a duration rounded to the millisecond
///
/// `850ms`, `1.5s`, `2m3.004s`, `1h0m5s`.
pub fn format_elapsed(duration: Duration) -> String {
    let millis = (duration.as_nanos() + 500_000) / 1_000_000;
    if millis == 0 {
        return "0s".to_string();
    }
    if millis < 1_000 {
        return format!("{}ms", millis);
    }

    let total_secs = millis / 1_000;
    let fraction = millis % 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h{}m", hours, minutes));
    } else if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }

    if fraction == 0 {
        out.push_str(&format!("{}s", seconds));
    } else {
        let fraction = format!("{:03}", fraction);
        out.push_str(&format!("{}.{}s", seconds, fraction.trim_end_matches('0')));
    }
    out
}
