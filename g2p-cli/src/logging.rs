//! Logging initialisation
//!
//! Log records are routed to the reporter as out-of-band messages so they
//! land above the live summary instead of tearing through it. When nobody
//! listens any more, records go to stderr.

use g2p_runner::ReportEvent;
use g2p_runner::events::EventSender;
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber
///
/// `RUST_LOG` wins over the defaults (`warn`, or `g2p=debug` with `debug`).
pub fn init(debug: bool, events: EventSender) {
    let default_filter = if debug { "warn,g2p=debug" } else { "warn" };

    // A second initialisation (tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(ChannelMakeWriter::new(events)),
        )
        .try_init();
}

/// Hands out one [`ChannelWriter`] per log record
#[derive(Clone)]
pub struct ChannelMakeWriter {
    events: EventSender,
}

impl ChannelMakeWriter {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl<'a> MakeWriter<'a> for ChannelMakeWriter {
    type Writer = ChannelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ChannelWriter {
            events: self.events.clone(),
            buffer: Vec::new(),
        }
    }
}

/// Buffers one formatted record and publishes it when dropped
pub struct ChannelWriter {
    events: EventSender,
    buffer: Vec<u8>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
        if line.is_empty() {
            return;
        }

        if let Err(unsent) = self.events.send(ReportEvent::Notice(line)) {
            eprintln!("{}", unsent.0.render());
        }
    }
}
