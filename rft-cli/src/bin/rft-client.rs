//! RFT Client - sends one file to an RFT server
//!
//! Usage: rft-client <HOST> <PORT> <FILE>

use anyhow::Context;
use clap::Parser;
use rft::Client;
use rft_cli::{config, logging, signal, stats, Config};
use rft_io::{RftSocket, StopSignal};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "rft-client")]
#[command(about = "Send a file over RFT", long_about = None, version)]
struct Args {
    /// Server host name or address
    host: String,

    /// Server port (1023-65535)
    port: String,

    /// File to send
    file: PathBuf,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not print the packet trace
    #[arg(short, long)]
    quiet: bool,

    /// Verbose diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    logging::init_tracing(if args.verbose { "debug" } else { "info" });

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let port = config::parse_port(&args.port)?;
    let peer = config::resolve_host(&args.host, port)?;
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    let stop = StopSignal::new();
    signal::install(stop.clone()).context("failed to install signal handlers")?;

    let socket = RftSocket::for_peer(peer).context("failed to open UDP socket")?;
    tracing::debug!("Local socket {}", socket.local_addr()?);

    let mut client = Client::new(socket, peer)
        .with_timeouts(config.timeouts())
        .with_event_sink(logging::event_sink(args.quiet))
        .with_stop_signal(stop);

    let report = client
        .send_file(&args.file)
        .with_context(|| format!("failed to send {}", args.file.display()))?;

    stats::log_transfer(&report);
    Ok(())
}
