//! Scanhive Daemon - Main Entry Point
//! SQLite job store + process launcher + JSON-RPC server

mod config;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{DaemonConfig, LogFormat};
use scanhive_api_rpc::{RpcServer, RpcServerConfig};
use scanhive_core::application::ScanOrchestrator;
use scanhive_core::port::id_provider::UuidProvider;
use scanhive_core::port::time_provider::SystemTimeProvider;
use scanhive_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use scanhive_infra_system::{AdapterConfig, SupervisorConfig, SystemScanLauncher};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::from_env()?;

    // 1. Logging
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("scanhive=info"))
        .context("Failed to create env filter")?;

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }

    info!("Scanhive v{} starting...", VERSION);

    // 2. Database
    if let Some(parent) = Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path, "Initializing database...");

    let pool = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. Wiring
    let launcher = SystemScanLauncher::new(
        SupervisorConfig {
            timeout: config.scan_timeout,
            ..Default::default()
        },
        AdapterConfig {
            masscan_rate: config.masscan_rate,
        },
    );
    let orchestrator = Arc::new(ScanOrchestrator::new(
        Arc::new(SqliteJobStore::new(pool.clone())),
        Arc::new(launcher),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));

    // 4. Jobs left unfinished by the previous run can never complete
    match orchestrator.recover_on_startup().await {
        Ok(count) => info!(recovered_jobs = count, "Startup recovery completed"),
        Err(e) => error!(error = %e, "Startup recovery failed"),
    }

    // 5. JSON-RPC server
    let rpc_server = RpcServer::new(
        RpcServerConfig {
            host: config.rpc_host.clone(),
            port: config.rpc_port,
        },
        Arc::clone(&orchestrator),
    );
    let (addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Waiting for scans...");
    info!("Press Ctrl+C to shutdown");

    // 6. Shutdown
    tokio::signal::ctrl_c().await?;

    info!(
        active_scans = orchestrator.active_jobs(),
        "Shutdown signal received. Exiting gracefully..."
    );
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
