//! RFT CLI Library
//!
//! Shared functionality for the RFT command-line tools.

pub mod config;
pub mod logging;
pub mod signal;
pub mod stats;

pub use config::{parse_port, resolve_host, Config, ConfigError, ServerConfig, TimeoutConfig};
pub use logging::{event_sink, init_tracing, StdoutSink};
pub use stats::{format_bytes, format_duration, format_throughput, log_server_outcome, log_transfer};
