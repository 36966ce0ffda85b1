//! Live pipeline summary
//!
//! Repaints a block of status lines on every tick while the orchestrator
//! runs in the background. Rendering works on snapshots only and never
//! blocks the orchestrator.

use colored::*;
use g2p_core::domain::{Pipeline, PipelineSnapshot, Severity, Tracked};
use g2p_runner::events::EventReceiver;
use g2p_runner::{PipelineError, PipelineOutcome};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const SEPARATOR_WIDTH: usize = 55;

/// Moves the cursor one line up and clears it
const ERASE_LINE: &str = "\x1b[F\x1b[K";

/// One line of the summary, before painting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// 0 for states, 1 for their checkers
    pub depth: usize,
    pub name: String,
    pub elapsed: String,
    pub status: String,
    pub severity: Severity,
}

/// Builds the summary rows of a snapshot
///
/// Pure: the same snapshot and frame always give the same rows.
pub fn render_rows(snapshot: &PipelineSnapshot, frame: usize) -> Vec<SummaryRow> {
    let mut rows = Vec::with_capacity(snapshot.row_count());

    for state in &snapshot.states {
        rows.push(SummaryRow {
            depth: 0,
            name: state.name.clone(),
            elapsed: snapshot.elapsed_text(state),
            status: state.status(frame),
            severity: state.severity(),
        });

        for checker in &state.checkers {
            let mut status = checker.status(frame);
            if let Some(code) = checker.failing_exit_code() {
                status.push_str(&format!(" (exit code = {})", code));
            }

            rows.push(SummaryRow {
                depth: 1,
                name: checker.name.clone(),
                elapsed: snapshot.elapsed_text(checker),
                status,
                severity: checker.severity(),
            });
        }
    }

    rows
}

/// Turns rows into terminal lines
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    ansi: bool,
}

impl Painter {
    /// Colours and in-place redraws only when stdout is a terminal
    pub fn detect() -> Self {
        Self {
            ansi: io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { ansi: false }
    }

    pub fn is_interactive(&self) -> bool {
        self.ansi
    }

    pub fn paint_row(&self, row: &SummaryRow) -> String {
        let indent = if row.depth == 0 {
            String::new()
        } else {
            format!("{}-- ", "  ".repeat(row.depth))
        };
        let line = format!("{}[{}] {} ({})", indent, row.status, row.name, row.elapsed);

        if !self.ansi {
            return line;
        }

        match row.severity {
            Severity::Neutral => line,
            Severity::InProgress => line.yellow().to_string(),
            Severity::Success => line.green().to_string(),
            Severity::Failure => line.red().to_string(),
        }
    }

    /// Separator line followed by one line per row
    pub fn paint_block(&self, rows: &[SummaryRow]) -> Vec<String> {
        std::iter::once("=".repeat(SEPARATOR_WIDTH))
            .chain(rows.iter().map(|row| self.paint_row(row)))
            .collect()
    }
}

/// How the foreground loop ended
#[derive(Debug)]
pub enum Completion {
    /// The orchestrator returned
    Finished(Result<PipelineOutcome, PipelineError>),
    /// A second Ctrl-C abandoned the pending teardown
    Interrupted,
}

/// Foreground loop showing the summary until the orchestrator is done
pub struct Reporter {
    painter: Painter,
    refresh: Duration,
    /// Animation frame, advanced once per tick
    frame: usize,
    /// Lines of the block currently on screen
    painted: usize,
}

impl Reporter {
    pub fn new(painter: Painter, refresh: Duration) -> Self {
        Self {
            painter,
            refresh,
            frame: 0,
            painted: 0,
        }
    }

    /// Paints until `task` completes and returns its result
    ///
    /// The first Ctrl-C cancels `cancel`; painting goes on while the
    /// orchestrator tears the current environment down. A second Ctrl-C
    /// aborts `task` without waiting for the teardown.
    pub async fn run(
        mut self,
        pipeline: &Pipeline,
        mut task: JoinHandle<Result<PipelineOutcome, PipelineError>>,
        mut events: EventReceiver,
        cancel: CancellationToken,
    ) -> Result<Completion, JoinError> {
        let mut ticker = tokio::time::interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut watch_signals = true;

        let completion = loop {
            tokio::select! {
                joined = &mut task => break joined.map(Completion::Finished),
                Some(event) = events.recv() => self.message(pipeline, &event.render()),
                _ = ticker.tick() => {
                    self.frame = self.frame.wrapping_add(1);
                    self.repaint(pipeline);
                }
                signal = tokio::signal::ctrl_c(), if watch_signals => {
                    match signal {
                        Ok(()) => {
                            if self.interrupt(pipeline, &cancel) {
                                task.abort();
                                break Ok(Completion::Interrupted);
                            }
                        }
                        Err(e) => {
                            watch_signals = false;
                            warn!("Cannot listen for Ctrl-C: {}", e);
                        }
                    }
                }
            }
        };

        while let Ok(event) = events.try_recv() {
            self.message(pipeline, &event.render());
        }

        let mut out = self.erase();
        self.paint_into(&mut out, pipeline);
        emit(&out);

        completion
    }

    /// Handles one Ctrl-C, returns `true` when the run should be abandoned
    fn interrupt(&mut self, pipeline: &Pipeline, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            self.message(pipeline, "Interrupted again: abandoning teardown");
            return true;
        }

        cancel.cancel();
        self.message(
            pipeline,
            "Cancelling: tearing down the current environment (press Ctrl-C again to abandon)",
        );
        false
    }

    fn repaint(&mut self, pipeline: &Pipeline) {
        if !self.painter.is_interactive() {
            return;
        }
        let mut out = self.erase();
        self.paint_into(&mut out, pipeline);
        emit(&out);
    }

    /// Prints `text` above the block
    fn message(&mut self, pipeline: &Pipeline, text: &str) {
        let mut out = self.erase();
        out.push_str(text);
        out.push('\n');
        if self.painter.is_interactive() {
            self.paint_into(&mut out, pipeline);
        }
        emit(&out);
    }

    fn erase(&mut self) -> String {
        let out = ERASE_LINE.repeat(self.painted);
        self.painted = 0;
        out
    }

    fn paint_into(&mut self, out: &mut String, pipeline: &Pipeline) {
        let rows = render_rows(&pipeline.snapshot(), self.frame);
        let lines = self.painter.paint_block(&rows);
        for line in &lines {
            out.push_str(line);
            out.push('\n');
        }
        self.painted = lines.len();
    }
}

fn emit(out: &str) {
    let mut stdout = io::stdout().lock();
    // Nothing sensible to do when the terminal is gone.
    let _ = stdout.write_all(out.as_bytes());
    let _ = stdout.flush();
}
