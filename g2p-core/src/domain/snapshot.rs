//! Point-in-time copies of pipeline progress
//!
//! Snapshots are plain values: rendering them never touches a lock, and the
//! same snapshot always renders the same way.

use std::time::{Duration, Instant};

use super::lifecycle::{Lifecycle, Tracked, format_elapsed};

#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub name: String,
    /// Reference instant for the elapsed time of running entities
    pub taken_at: Instant,
    pub states: Vec<StateSnapshot>,
}

impl PipelineSnapshot {
    /// Number of summary rows: one per state plus one per checker
    pub fn row_count(&self) -> usize {
        self.states.iter().map(|state| 1 + state.checkers.len()).sum()
    }

    pub fn elapsed_of(&self, tracked: &impl Tracked) -> Option<Duration> {
        tracked.lifecycle().elapsed_at(self.taken_at)
    }

    /// Elapsed text for a state or checker, empty before it started
    pub fn elapsed_text(&self, tracked: &impl Tracked) -> String {
        self.elapsed_of(tracked)
            .map(format_elapsed)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub checkers: Vec<CheckerSnapshot>,
}

impl Tracked for StateSnapshot {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn is_valid(&self) -> bool {
        self.checkers.iter().all(Tracked::is_valid)
    }
}

#[derive(Debug, Clone)]
pub struct CheckerSnapshot {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub exit_code: Option<i64>,
}

impl CheckerSnapshot {
    /// Exit code worth reporting: present and nonzero
    pub fn failing_exit_code(&self) -> Option<i64> {
        self.exit_code.filter(|code| *code != 0)
    }
}

impl Tracked for CheckerSnapshot {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn is_valid(&self) -> bool {
        self.exit_code == Some(0)
    }
}
