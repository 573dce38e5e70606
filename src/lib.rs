// src/lib.rs

pub mod apply;
pub mod catalog;
pub mod cli;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod system;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::CliArgs;
use crate::engine::{ApplyOptions, ApplyStats};
use crate::errors::Result;
use crate::system::{LocalSystem, LoggingSystem, SimulatedSystem, System};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - catalog decoding (file or stdin)
/// - backend selection (local / simulated, optional logging wrapper)
/// - Ctrl-C handling
/// - the apply engine
pub async fn run(args: CliArgs) -> Result<ApplyStats> {
    let catalog = match &args.catalog {
        Some(path) => catalog::load_from_path(path)?,
        None => catalog::load_from_reader(std::io::stdin().lock())?,
    };

    let mut sys: Arc<dyn System> = if args.simulate {
        Arc::new(SimulatedSystem)
    } else {
        Arc::new(LocalSystem)
    };
    if args.show_commands {
        sys = Arc::new(LoggingSystem::new(sys));
    }

    // Ctrl-C → stop dispatching, let in-flight appliers wind down.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupt received; cancelling apply");
            cancel.cancel();
        });
    }

    let opts = ApplyOptions {
        jobs: args.jobs.get(),
        shell: args.shell.clone(),
    };

    engine::apply(sys, catalog, &opts, cancel).await
}
