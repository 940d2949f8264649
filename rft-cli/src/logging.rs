//! Diagnostics and packet trace output
//!
//! Diagnostics go through `tracing` to stderr. The packet trace goes to
//! stdout, one line per event, unless the tool runs quiet.

use rft_protocol::{EventSink, PacketEvent, TracingSink};
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins over `default_directive` when set.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints each event on its own stdout line
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn record(&self, event: PacketEvent) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // Write errors on stdout are ignored
        let _ = writeln!(out, "{}", event);
    }
}

/// Packet trace destination for a CLI run
pub fn event_sink(quiet: bool) -> Arc<dyn EventSink> {
    if quiet {
        Arc::new(TracingSink)
    } else {
        Arc::new(StdoutSink)
    }
}
