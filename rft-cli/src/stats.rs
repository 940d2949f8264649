//! Statistics display and formatting

use rft::{ServerOutcome, TransferReport};
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format an average rate in human-readable form
pub fn format_throughput(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "N/A".to_string();
    }
    format!("{}/s", format_bytes((bytes as f64 / secs) as u64))
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else if secs > 0 {
        format!("{}.{:01}s", seconds, duration.subsec_millis() / 100)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Log a finished transfer
pub fn log_transfer(report: &TransferReport) {
    tracing::info!(
        "Sent {} in {} ({}) on connection {}",
        format_bytes(report.bytes),
        format_duration(report.elapsed),
        format_throughput(report.bytes, report.elapsed),
        report.connection_id
    );
    tracing::info!(
        "Segments: {} sent, {} retransmitted, {} duplicate ACKs, {} timeouts",
        report.segments_sent,
        report.retransmissions,
        report.duplicate_acks,
        report.timeouts
    );
    tracing::info!(
        "Final window: cwnd {} ssthresh {}",
        report.final_cwnd,
        report.final_ssthresh
    );
}

/// Log what a receiver did before stopping
pub fn log_server_outcome(outcome: &ServerOutcome) {
    tracing::info!(
        "Connections: {} opened, {} finished, {} files written",
        outcome.connections,
        outcome.finished,
        outcome.stats.files_written
    );
    tracing::info!(
        "Packets: {} received, {} dropped, {} malformed",
        outcome.stats.packets_received,
        outcome.stats.packets_dropped,
        outcome.stats.malformed
    );
}
