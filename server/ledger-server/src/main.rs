use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use config_engine::{EngineConfig, LoggingSettings};
use error_common::{log_error, EngineError, Result};
use ledger_server::{create_app, LedgerServer};

/// SplitLedger HTTP server
#[derive(Parser, Debug)]
#[command(name = "ledger-server")]
#[command(about = "Invoice fee splitting and department revenue ledger")]
struct Args {
    /// Configuration file path (YAML or TOML)
    #[arg(short, long, env = "SPLITLEDGER_CONFIG")]
    config: Option<String>,

    /// Server bind address, overrides the configuration file
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides the configuration file
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref())
        .map_err(|e| EngineError::ConfigError(e.to_string()))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging, args.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting SplitLedger server");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| EngineError::ConfigError(format!("invalid bind address: {e}")))?;

    let server = match LedgerServer::from_config(config).await {
        Ok(server) => server,
        Err(e) => {
            log_error("startup", &e);
            return Err(e);
        }
    };
    let database = server.database.clone();
    let reconciler = server.spawn_reconciler();
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EngineError::NetworkError(format!("Failed to bind to {addr}: {e}")))?;

    info!("SplitLedger server running on http://{addr}");
    info!("Health check available at: http://{addr}/health");
    info!("API v1 available at: http://{addr}/api/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EngineError::ServerError(format!("HTTP server error: {e}")))?;

    if let Some(reconciler) = reconciler {
        reconciler.abort();
    }
    if let Some(pool) = database {
        pool.close().await;
    }
    info!("SplitLedger server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "ledger_server={level},billing_service={level},accounting_service={level},database_layer={level},tower_http=info,sqlx=warn"
        )
        .into()
    });

    if logging.json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received; draining connections");
}
