// masscan: rate-limited tcp/udp/ping scans, "Discovered open port" report

use super::{percent, port_required, unsupported, ProcessOutput, ScanAdapter};
use once_cell::sync::Lazy;
use regex::Regex;
use scanhive_core::domain::{ScanReport, ScanReportBuilder, ScanRequest, ScanTool};
use scanhive_core::port::ScanFailure;

static OPEN_PORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Discovered open port (\d+)/(\w+) on (\S+)")
        .expect("masscan open-port regex should compile")
});

static HOST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Host: (\S+)\s").expect("masscan host regex should compile"));

/// Running host count on masscan's status line; the last one is final
static FOUND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"found=(\d+)").expect("masscan found regex should compile"));

/// Host count from the last status line that carried one
fn final_found_count(stderr: &str) -> Option<u64> {
    FOUND_PATTERN
        .captures_iter(stderr)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

#[derive(Debug, Clone, Copy)]
pub struct MasscanAdapter {
    rate: u32,
}

impl MasscanAdapter {
    pub fn new(rate: u32) -> Self {
        Self { rate }
    }
}

impl ScanAdapter for MasscanAdapter {
    fn tool(&self) -> ScanTool {
        ScanTool::Masscan
    }

    fn build_args(&self, request: &ScanRequest) -> Result<Vec<String>, ScanFailure> {
        let mut args = vec![
            request.target.clone(),
            "--rate".to_string(),
            self.rate.to_string(),
        ];
        match request.scan_type.as_str() {
            "tcp_scan" => {
                let port = request
                    .port
                    .ok_or_else(|| port_required(ScanTool::Masscan, "TCP"))?;
                args.push("-p".to_string());
                args.push(port.to_string());
            }
            "udp_scan" => {
                let port = request
                    .port
                    .ok_or_else(|| port_required(ScanTool::Masscan, "UDP"))?;
                args.push(format!("-pU:{}", port));
            }
            "ping_scan" => args.push("--ping".to_string()),
            other => return Err(unsupported(ScanTool::Masscan, other)),
        }
        Ok(args)
    }

    /// `rate:  0.99-kpps, 42.57% done,   0:00:12 remaining, found=3`
    fn parse_progress(&self, line: &str) -> Option<u8> {
        if !line.contains("rate:") || !line.contains('%') {
            return None;
        }
        let field = line.split(',').nth(1)?;
        let (value, _) = field.trim().split_once('%')?;
        percent(value)
    }

    fn parse_report(
        &self,
        _request: &ScanRequest,
        output: &ProcessOutput,
    ) -> Result<ScanReport, ScanFailure> {
        let mut builder = ScanReportBuilder::default();

        for line in output.stdout.lines() {
            if let Some(caps) = OPEN_PORT_PATTERN.captures(line) {
                builder.add_open_port(&caps[3], &caps[1]);
            } else if let Some(caps) = HOST_PATTERN.captures(line) {
                builder.add_host(&caps[1]);
            }
        }

        Ok(builder.build())
    }

    fn tolerates_exit(&self, output: &ProcessOutput) -> bool {
        output.exit_code.is_some() && final_found_count(&output.stderr) == Some(0)
    }
}
