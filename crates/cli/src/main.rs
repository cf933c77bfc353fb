//! Scanhive CLI - submit and manage scans on a running daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9530";

#[derive(Parser)]
#[command(name = "scanhive")]
#[command(about = "Scanhive scan orchestrator CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "SCANHIVE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new scan
    Submit {
        /// Host, address or range to scan
        target: String,

        /// Scanner: nmap, zmap or masscan (daemon default: nmap)
        #[arg(short, long)]
        tool: Option<String>,

        /// Tool-specific scan type (daemon default: "default")
        #[arg(short, long)]
        scan_type: Option<String>,

        /// Port, required by zmap tcp_syn and masscan tcp/udp scans
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List all scans, newest first
    List,

    /// Show one scan with its result
    Show {
        /// Job ID
        job_id: String,
    },

    /// Stop a running scan
    Stop {
        /// Job ID
        job_id: String,
    },

    /// Delete a scan record (stops it first if running)
    Delete {
        /// Job ID
        job_id: String,
    },

    /// Check that the daemon is up
    Health,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanJobView {
    job_id: String,
    tool: String,
    target: String,
    scan_type: String,
    port: Option<u16>,
    status: String,
    progress: u8,
    result: Option<serde_json::Value>,
    created_at: String,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "JOB ID")]
    job_id: String,
    #[tabled(rename = "TOOL")]
    tool: String,
    #[tabled(rename = "TARGET")]
    target: String,
    #[tabled(rename = "TYPE")]
    scan_type: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "PROGRESS")]
    progress: String,
    #[tabled(rename = "CREATED")]
    created_at: String,
}

impl From<ScanJobView> for JobRow {
    fn from(job: ScanJobView) -> Self {
        Self {
            job_id: job.job_id,
            tool: job.tool,
            target: job.target,
            scan_type: job.scan_type,
            status: job.status,
            progress: format!("{}%", job.progress),
            created_at: job.created_at,
        }
    }
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "OPEN PORTS")]
    ports: String,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn colored_status(status: &str) -> String {
    match status {
        "completed" => status.green().to_string(),
        "failed" => status.red().to_string(),
        "stopped" => status.yellow().to_string(),
        "running" => status.cyan().to_string(),
        _ => status.to_string(),
    }
}

/// `host -> "22, 80"` rows from a stored report
fn host_rows(result: &serde_json::Value) -> Vec<HostRow> {
    result["hosts"]
        .as_array()
        .map(|hosts| {
            hosts
                .iter()
                .map(|host| HostRow {
                    host: host["host"].as_str().unwrap_or_default().to_string(),
                    ports: host["ports"]
                        .as_array()
                        .map(|ports| {
                            ports
                                .iter()
                                .filter_map(|p| p["portid"].as_str())
                                .filter(|p| !p.is_empty())
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn print_job(job: ScanJobView) {
    println!("  {} {}", "Job:".bold(), job.job_id);
    println!("  {} {} {}", "Scan:".bold(), job.tool, job.scan_type);
    println!("  {} {}", "Target:".bold(), job.target);
    if let Some(port) = job.port {
        println!("  {} {}", "Port:".bold(), port);
    }
    println!("  {} {}", "Status:".bold(), colored_status(&job.status));
    println!("  {} {}%", "Progress:".bold(), job.progress);
    println!("  {} {}", "Created:".bold(), job.created_at);

    let Some(result) = job.result else {
        return;
    };
    println!();
    if let Some(error) = result["error"].as_str() {
        println!("  {} {}", "Error:".red().bold(), error);
        return;
    }

    let rows = host_rows(&result);
    if rows.is_empty() {
        println!("  {}", "No hosts found".yellow());
    } else {
        println!("{}", Table::new(rows));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            target,
            tool,
            scan_type,
            port,
        } => {
            let params = json!({
                "target": target,
                "tool": tool,
                "scan_type": scan_type,
                "port": port,
            });

            let result = call_rpc(&cli.rpc_url, "scan.create.v1", params).await?;
            let job_id = result["jobId"].as_str().unwrap_or_default();

            println!("{}", "✓ Scan submitted".green().bold());
            println!("  {} {}", "Job:".bold(), job_id);
        }

        Commands::List => {
            let result = call_rpc(&cli.rpc_url, "scan.list.v1", json!({})).await?;
            let jobs: Vec<ScanJobView> =
                serde_json::from_value(result).context("Unexpected scan.list.v1 result")?;

            if jobs.is_empty() {
                println!("{}", "No scans yet".yellow());
            } else {
                let rows: Vec<JobRow> = jobs.into_iter().map(JobRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Show { job_id } => {
            let result = call_rpc(&cli.rpc_url, "scan.get.v1", json!({ "job_id": job_id })).await?;
            let job: ScanJobView =
                serde_json::from_value(result).context("Unexpected scan.get.v1 result")?;
            print_job(job);
        }

        Commands::Stop { job_id } => {
            call_rpc(&cli.rpc_url, "scan.stop.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("✓ Scan {} stopped", job_id).green().bold());
        }

        Commands::Delete { job_id } => {
            call_rpc(&cli.rpc_url, "scan.delete.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("✓ Scan {} deleted", job_id).green().bold());
        }

        Commands::Health => {
            let health = call_rpc(&cli.rpc_url, "system.health.v1", json!({})).await?;
            println!(
                "{} scanhive {} ({} active, {} total)",
                "✓".green().bold(),
                health["version"].as_str().unwrap_or("unknown"),
                health["activeJobs"],
                health["totalJobs"]
            );
        }
    }

    Ok(())
}
