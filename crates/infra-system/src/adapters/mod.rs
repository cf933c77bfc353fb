// Tool adapters - request -> argv, stderr line -> progress, output -> report

mod masscan;
mod nmap;
mod zmap;

pub use masscan::MasscanAdapter;
pub use nmap::NmapAdapter;
pub use zmap::ZmapAdapter;

use scanhive_core::application::worker::constants::DEFAULT_MASSCAN_RATE;
use scanhive_core::domain::{ScanReport, ScanRequest, ScanTool};
use scanhive_core::port::ScanFailure;
use std::io;

/// Settings that shape tool invocations
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// masscan `--rate` (packets/second)
    pub masscan_rate: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            masscan_rate: DEFAULT_MASSCAN_RATE,
        }
    }
}

/// Everything a finished tool process left behind
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// None when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Per-tool protocol
///
/// `parse_progress` and `parse_report` are pure, so they are tested against
/// captured sample output without spawning anything.
pub trait ScanAdapter {
    fn tool(&self) -> ScanTool;

    /// Arguments after the program name; rejects unsupported scan types and
    /// missing ports before anything is spawned
    fn build_args(&self, request: &ScanRequest) -> Result<Vec<String>, ScanFailure>;

    /// Progress percentage carried by one stderr line, if any
    fn parse_progress(&self, line: &str) -> Option<u8>;

    /// Canonical report from a successful run
    fn parse_report(&self, request: &ScanRequest, output: &ProcessOutput)
        -> Result<ScanReport, ScanFailure>;

    /// Whether a non-zero exit still counts as success
    fn tolerates_exit(&self, _output: &ProcessOutput) -> bool {
        false
    }
}

/// Closed set of supported tools
#[derive(Debug, Clone)]
pub enum ToolAdapter {
    Nmap(NmapAdapter),
    Zmap(ZmapAdapter),
    Masscan(MasscanAdapter),
}

impl ToolAdapter {
    pub fn for_tool(tool: ScanTool, config: &AdapterConfig) -> Self {
        match tool {
            ScanTool::Nmap => ToolAdapter::Nmap(NmapAdapter),
            ScanTool::Zmap => ToolAdapter::Zmap(ZmapAdapter),
            ScanTool::Masscan => ToolAdapter::Masscan(MasscanAdapter::new(config.masscan_rate)),
        }
    }

    fn inner(&self) -> &dyn ScanAdapter {
        match self {
            ToolAdapter::Nmap(a) => a,
            ToolAdapter::Zmap(a) => a,
            ToolAdapter::Masscan(a) => a,
        }
    }

    /// Terminal outcome of a process that exited on its own
    pub fn conclude(
        &self,
        request: &ScanRequest,
        output: &ProcessOutput,
    ) -> Result<ScanReport, ScanFailure> {
        if !output.success() && !self.tolerates_exit(output) {
            return Err(exit_failure(self.tool(), output));
        }
        self.parse_report(request, output)
    }
}

impl ScanAdapter for ToolAdapter {
    fn tool(&self) -> ScanTool {
        self.inner().tool()
    }

    fn build_args(&self, request: &ScanRequest) -> Result<Vec<String>, ScanFailure> {
        self.inner().build_args(request)
    }

    fn parse_progress(&self, line: &str) -> Option<u8> {
        self.inner().parse_progress(line)
    }

    fn parse_report(
        &self,
        request: &ScanRequest,
        output: &ProcessOutput,
    ) -> Result<ScanReport, ScanFailure> {
        self.inner().parse_report(request, output)
    }

    fn tolerates_exit(&self, output: &ProcessOutput) -> bool {
        self.inner().tolerates_exit(output)
    }
}

/// Percentage text such as `"42.57"` to a whole percent in 0..=100
pub(crate) fn percent(text: &str) -> Option<u8> {
    let value: f64 = text.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.min(100.0) as u8)
}

pub(crate) fn unsupported(tool: ScanTool, scan_type: &str) -> ScanFailure {
    ScanFailure::UnsupportedScanType {
        tool,
        scan_type: scan_type.to_string(),
    }
}

pub(crate) fn port_required(tool: ScanTool, scan_type: &str) -> ScanFailure {
    ScanFailure::InvalidRequest(format!(
        "Port is required for {} {} scan",
        tool, scan_type
    ))
}

pub(crate) fn raw_socket_hint(tool: ScanTool) -> String {
    format!(
        "{} requires root privileges to access raw sockets. Run the scan service with sudo.",
        tool
    )
}

/// Classify a non-zero exit; privilege problems get their own error class
pub(crate) fn exit_failure(tool: ScanTool, output: &ProcessOutput) -> ScanFailure {
    let stderr = output.stderr.trim();
    let lowered = stderr.to_lowercase();
    let privilege_problem = lowered.contains("permission denied")
        || lowered.contains("operation not permitted")
        || lowered.contains("requires root privileges")
        || (tool.requires_raw_sockets() && lowered.contains("root"));

    if privilege_problem && output.exit_code.is_some() {
        let detail = if tool.requires_raw_sockets() {
            raw_socket_hint(tool)
        } else {
            stderr.to_string()
        };
        return ScanFailure::PermissionDenied { tool, detail };
    }

    let message = if stderr.is_empty() {
        output.stdout.trim()
    } else {
        stderr
    };
    ScanFailure::ToolFailed {
        tool,
        code: output.exit_code,
        stderr: message.to_string(),
    }
}

/// Classify a failed spawn
pub(crate) fn spawn_failure(tool: ScanTool, err: &io::Error) -> ScanFailure {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ScanFailure::PermissionDenied {
            tool,
            detail: if tool.requires_raw_sockets() {
                raw_socket_hint(tool)
            } else {
                "Please check permissions.".to_string()
            },
        },
        io::ErrorKind::NotFound => ScanFailure::ToolUnavailable {
            tool,
            reason: crate::preflight::install_hint(tool),
        },
        _ => ScanFailure::ProcessStartFailure {
            tool,
            reason: err.to_string(),
        },
    }
}
