//! Record service.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────────┐
//!                 │                    RECORD SERVICE                     │
//!                 │                                                       │
//!  POST /records  │  ┌──────────┐    ┌──────────┐    ┌──────────────┐     │
//!  ───────────────┼─▶│   net    │───▶│   http   │───▶│   handlers   │─────┼──▶ MySQL / TiDB
//!                 │  │ listener │    │ runtime  │    │ (store slot) │     │
//!                 │  └──────────┘    └──────────┘    └──────────────┘     │
//!                 │                                                       │
//!  SIGTERM/SIGINT │  ┌─────────────────────────────────────────────────┐  │
//!  ───────────────┼─▶│ lifecycle: acquire → serve → graceful/forced    │  │
//!                 │  │            stop → release socket, store, log    │  │
//!                 │  └─────────────────────────────────────────────────┘  │
//!                 │  ┌──────────┐ ┌───────────────┐                       │
//!                 │  │  config  │ │ observability │                       │
//!                 │  └──────────┘ └───────────────┘                       │
//!                 └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use record_service::config;
use record_service::lifecycle::{Supervisor, TerminationSignal};
use record_service::observability::{logging, LogSink};
use record_service::store::BackendConnector;

#[derive(Parser)]
#[command(name = "record-service")]
#[command(about = "Record service with ordered startup and bounded graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the shutdown grace period.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    grace_period_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("record-service: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(secs) = cli.grace_period_secs {
        config.shutdown.grace_period_secs = secs;
        if let Err(errors) = config::validation::validate_config(&config) {
            eprintln!("record-service: {}", config::ConfigError::Validation(errors));
            return ExitCode::FAILURE;
        }
    }

    let log_sink = LogSink::new();
    if let Err(e) = logging::init_tracing(&config.logging.level, log_sink.clone()) {
        eprintln!("record-service: failed to install tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("record-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store_backend = ?config.store.backend,
        grace_period_secs = config.shutdown.grace_period_secs,
        "Configuration loaded"
    );

    let signal = TerminationSignal::new();
    if let Err(e) = signal.listen_os() {
        tracing::error!(error = %e, "Failed to register signal handlers");
        return ExitCode::FAILURE;
    }

    match Supervisor::new(config, log_sink, BackendConnector).run(signal).await {
        Ok(report) => {
            // The log sink is closed by now; this reaches stdout only.
            tracing::info!(
                path = report.path.as_str(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Exiting"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
