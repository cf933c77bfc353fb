// Daemon configuration from SCANHIVE_* environment variables

use anyhow::{Context, Result};
use scanhive_api_rpc::server::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};
use scanhive_core::application::worker::constants::{DEFAULT_MASSCAN_RATE, DEFAULT_SCAN_TIMEOUT};
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.scanhive/scans.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    pub scan_timeout: Duration,
    pub masscan_rate: u32,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("SCANHIVE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let rpc_port = match lookup("SCANHIVE_RPC_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SCANHIVE_RPC_PORT is not a port: {}", raw))?,
            None => DEFAULT_RPC_PORT,
        };

        let scan_timeout = match lookup("SCANHIVE_SCAN_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("SCANHIVE_SCAN_TIMEOUT_SECS is not a number: {}", raw))?;
                anyhow::ensure!(secs > 0, "SCANHIVE_SCAN_TIMEOUT_SECS must be positive");
                Duration::from_secs(secs)
            }
            None => DEFAULT_SCAN_TIMEOUT,
        };

        let masscan_rate = match lookup("SCANHIVE_MASSCAN_RATE") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SCANHIVE_MASSCAN_RATE is not a number: {}", raw))?,
            None => DEFAULT_MASSCAN_RATE,
        };

        let log_format = match lookup("SCANHIVE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            db_path: shellexpand::tilde(&db_path).into_owned(),
            rpc_host: lookup("SCANHIVE_RPC_HOST").unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port,
            log_format,
            scan_timeout,
            masscan_rate,
        })
    }
}
