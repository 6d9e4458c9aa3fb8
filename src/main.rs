//! Consignr - Capability-based direct-to-S3 upload broker
//!
//! Issues presigned write capabilities, lets clients upload straight to the
//! bucket, and verifies each object against the provider before acceptance.

use clap::Parser;
use consignr::authz::{AllowAllAuthorizer, PurposeListAuthorizer, UploadAuthorizer};
use consignr::config::Config;
use consignr::finalize::FinalizeVerifier;
use consignr::issuer::CapabilityIssuer;
use consignr::metrics::server::MetricsServer;
use consignr::server::{BrokerState, Server};
use consignr::storage::{ObjectStore, S3ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Consignr - direct-to-S3 upload broker with presigned write capabilities
#[derive(Parser, Debug)]
#[command(name = "consignr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Consignr v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::from_config(&config.storage).await);
    let authorizer: Arc<dyn UploadAuthorizer> = if config.upload.allowed_purposes.is_empty() {
        Arc::new(AllowAllAuthorizer)
    } else {
        Arc::new(PurposeListAuthorizer::new(
            config.upload.allowed_purposes.clone(),
        ))
    };

    let constraints = config.constraints();
    let state = BrokerState {
        issuer: Arc::new(CapabilityIssuer::new(
            Arc::clone(&store),
            authorizer,
            constraints.clone(),
            Duration::from_secs(config.upload.capability_ttl_secs),
        )),
        verifier: Arc::new(FinalizeVerifier::new(store, constraints)),
    };

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(&format!("0.0.0.0:{}", config.metrics.port));
        let addr = server.start().await?;
        info!("Metrics server listening on {}", addr);
        Some(server)
    } else {
        None
    };

    let mut server = Server::new(&config.server.address, state);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    server.shutdown().await;
    if let Some(ref mut metrics_server) = metrics_server {
        metrics_server.shutdown().await;
    }

    Ok(())
}
