//! RFT Server - receives files from many clients
//!
//! Usage: rft-server <PORT> <FILE-DIR>
//!
//! Each connection's file is written to `<FILE-DIR>/<connection id>.file`.
//! Runs until interrupted.

use anyhow::Context;
use clap::Parser;
use rft::{DirectoryStorage, Server};
use rft_cli::{config, logging, signal, stats, Config};
use rft_io::{RftSocket, StopSignal};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

/// Room for bursts from many concurrent senders
const RECV_BUFFER_SIZE: usize = 4 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "rft-server")]
#[command(about = "Receive files over RFT", long_about = None, version)]
struct Args {
    /// Port to listen on (1023-65535)
    port: String,

    /// Directory for received files, created if missing
    dir: PathBuf,

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
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    let storage = DirectoryStorage::create(&args.dir)
        .with_context(|| format!("failed to create {}", args.dir.display()))?;

    let stop = StopSignal::new();
    signal::install(stop.clone()).context("failed to install signal handlers")?;

    let listen = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = RftSocket::bind(listen).with_context(|| format!("failed to bind {}", listen))?;
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        tracing::warn!("Could not enlarge receive buffer: {}", e);
    }
    tracing::debug!("Receive buffer {} bytes", socket.recv_buffer_size()?);
    tracing::info!("Writing files to {}", storage.dir().display());

    let mut server = Server::new(socket, storage)
        .with_options(config.server_options())
        .with_event_sink(logging::event_sink(args.quiet))
        .with_stop_signal(stop);

    let outcome = server.run()?;
    stats::log_server_outcome(&outcome);
    Ok(())
}
