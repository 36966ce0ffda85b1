//! Out-of-band messages for the reporter
//!
//! Progress itself is read from the pipeline model; events only carry text
//! that has no place in the summary block.

use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<ReportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ReportEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// Combined output of a checker, forwarded in debug mode
    CheckerOutput {
        state: String,
        checker: String,
        output: String,
    },
    /// Free-form line (warnings, log records)
    Notice(String),
}

impl ReportEvent {
    /// Text printed above the summary block
    pub fn render(&self) -> String {
        match self {
            ReportEvent::CheckerOutput {
                state,
                checker,
                output,
            } => format!("[{} / {}]\n{}", state, checker, output),
            ReportEvent::Notice(message) => message.clone(),
        }
    }
}

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
