//! Pipeline domain types

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use super::lifecycle::{Lifecycle, LifecyclePhase};
use super::snapshot::{CheckerSnapshot, PipelineSnapshot, StateSnapshot};

/// Ordered plan of states to verify
///
/// Built once from a descriptor. Only the nested lifecycles and exit codes
/// change afterwards.
#[derive(Debug)]
pub struct Pipeline {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub states: Vec<State>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        version: Option<String>,
        states: Vec<State>,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            version,
            states,
        }
    }

    /// True iff every state is valid
    pub fn is_valid(&self) -> bool {
        self.states.iter().all(State::is_valid)
    }

    pub fn checker_count(&self) -> usize {
        self.states.iter().map(|state| state.checkers.len()).sum()
    }

    /// Copies the current progress of every state and checker
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            name: self.name.clone(),
            taken_at: Instant::now(),
            states: self.states.iter().map(State::snapshot).collect(),
        }
    }
}

/// A deployment stage: one environment, a sequence of checkers
#[derive(Debug)]
pub struct State {
    pub name: String,
    pub description: Option<String>,
    /// Environment descriptor handed to the compose runtime
    pub compose_file: PathBuf,
    pub checkers: Vec<Checker>,
    lifecycle: RwLock<Lifecycle>,
}

impl State {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        compose_file: impl Into<PathBuf>,
        checkers: Vec<Checker>,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            compose_file: compose_file.into(),
            checkers,
            lifecycle: RwLock::new(Lifecycle::new()),
        }
    }

    pub fn start(&self) -> bool {
        write(&self.lifecycle).start()
    }

    pub fn stop(&self) -> bool {
        write(&self.lifecycle).stop()
    }

    pub fn set_operation(&self, operation: impl Into<String>) {
        write(&self.lifecycle).set_operation(operation);
    }

    pub fn lifecycle(&self) -> Lifecycle {
        read(&self.lifecycle).clone()
    }

    /// AND over the checkers; vacuously true without checkers
    pub fn is_valid(&self) -> bool {
        self.checkers.iter().all(Checker::is_valid)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            name: self.name.clone(),
            lifecycle: self.lifecycle(),
            checkers: self.checkers.iter().map(Checker::snapshot).collect(),
        }
    }
}

/// Mutable part of a checker, guarded as one record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerProgress {
    pub lifecycle: Lifecycle,
    /// Absent until the workload has exited
    pub exit_code: Option<i64>,
}

/// A verification workload run against a provisioned state
#[derive(Debug)]
pub struct Checker {
    pub name: String,
    pub image: String,
    /// `KEY=VALUE` assignments in declaration order
    pub env: Vec<String>,
    progress: RwLock<CheckerProgress>,
}

impl Checker {
    pub fn new(name: impl Into<String>, image: impl Into<String>, env: Vec<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            env,
            progress: RwLock::new(CheckerProgress::default()),
        }
    }

    pub fn start(&self) -> bool {
        write(&self.progress).lifecycle.start()
    }

    pub fn stop(&self) -> bool {
        write(&self.progress).lifecycle.stop()
    }

    /// Records the exit code and completes the lifecycle as one update
    ///
    /// Readers never see a running checker that already carries an exit code.
    /// Returns `false` and changes nothing unless the checker is running.
    pub fn finish(&self, exit_code: i64) -> bool {
        let mut progress = write(&self.progress);
        if progress.lifecycle.phase() != LifecyclePhase::Running {
            return false;
        }
        progress.exit_code = Some(exit_code);
        progress.lifecycle.stop()
    }

    pub fn exit_code(&self) -> Option<i64> {
        read(&self.progress).exit_code
    }

    pub fn is_valid(&self) -> bool {
        self.exit_code() == Some(0)
    }

    pub fn progress(&self) -> CheckerProgress {
        read(&self.progress).clone()
    }

    pub fn snapshot(&self) -> CheckerSnapshot {
        let progress = self.progress();
        CheckerSnapshot {
            name: self.name.clone(),
            lifecycle: progress.lifecycle,
            exit_code: progress.exit_code,
        }
    }
}

// A panicking writer cannot leave a record half-updated: no write section can
// panic between its field assignments, so a poisoned lock still holds a whole record.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
