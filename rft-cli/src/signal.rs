//! OS signal handling
//!
//! The drivers are synchronous, so signals are awaited on a small
//! current-thread runtime in a background thread that raises the shared
//! [`StopSignal`].

use rft_io::StopSignal;
use std::io;
use std::thread::{self, JoinHandle};

/// Raise `stop` on Ctrl-C, SIGTERM or SIGQUIT
pub fn install(stop: StopSignal) -> io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("rft-signal".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let name = wait_for_signal().await;
                tracing::info!("Received {}, stopping", name);
                stop.raise();
            })
        })
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut quit) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(term), Ok(quit)) => (term, quit),
        _ => {
            tracing::warn!("Could not register SIGTERM/SIGQUIT handlers");
            let _ = tokio::signal::ctrl_c().await;
            return "interrupt";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "interrupt",
        _ = term.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
