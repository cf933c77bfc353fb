// zmap: tcp_syn / icmp_echo probes, CSV report

use super::{percent, port_required, unsupported, ProcessOutput, ScanAdapter};
use scanhive_core::domain::{ScanReport, ScanReportBuilder, ScanRequest, ScanTool};
use scanhive_core::port::ScanFailure;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZmapAdapter;

impl ScanAdapter for ZmapAdapter {
    fn tool(&self) -> ScanTool {
        ScanTool::Zmap
    }

    fn build_args(&self, request: &ScanRequest) -> Result<Vec<String>, ScanFailure> {
        let mut args = match request.scan_type.as_str() {
            "tcp_syn" => {
                let port = request
                    .port
                    .ok_or_else(|| port_required(ScanTool::Zmap, "TCP SYN"))?;
                vec!["-p".to_string(), port.to_string(), request.target.clone()]
            }
            "icmp_echo" => vec![
                "--probe-module=icmp_echoscan".to_string(),
                request.target.clone(),
            ],
            other => return Err(unsupported(ScanTool::Zmap, other)),
        };
        args.push("--output-module=csv".to_string());
        args.push("--output-fields=*".to_string());
        Ok(args)
    }

    /// Status lines look like ` 0:04 12%; send: 10001 done (14.2 Kp/s avg); ...`
    fn parse_progress(&self, line: &str) -> Option<u8> {
        let (before, _) = line.split_once('%')?;
        percent(before.trim().rsplit(' ').next()?)
    }

    fn parse_report(
        &self,
        request: &ScanRequest,
        output: &ProcessOutput,
    ) -> Result<ScanReport, ScanFailure> {
        parse_csv(&output.stdout, request.port).map_err(|reason| ScanFailure::ParseFailure {
            tool: ScanTool::Zmap,
            reason,
        })
    }
}

/// One host per responding address, each carrying the probed port
fn parse_csv(stdout: &str, port: Option<u16>) -> Result<ScanReport, String> {
    let lines: Vec<&str> = stdout.trim().lines().collect();
    if lines.len() < 2 {
        return Ok(ScanReport::default());
    }

    let header: Vec<&str> = lines[0].split(',').map(str::trim).collect();
    let address_column = header
        .iter()
        .position(|c| *c == "saddr")
        .or_else(|| header.iter().position(|c| *c == "daddr"))
        .ok_or_else(|| "Could not find source or destination address in zmap output".to_string())?;

    let port_id = port.map(|p| p.to_string()).unwrap_or_default();
    let mut builder = ScanReportBuilder::default();

    for (row, line) in lines.iter().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let address = line
            .split(',')
            .nth(address_column)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| format!("row {} has no address column", row + 1))?;
        builder.add_open_port(address, port_id.clone());
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "saddr,daddr,sport,dport,seqnum,acknum,window,classification,success,repeat,cooldown,timestamp_str\n\
10.0.0.7,10.0.0.100,443,41523,0,1840394,65535,synack,1,0,0,2024-01-01T10:00:00.000+0000\n\
10.0.0.9,10.0.0.100,443,41523,0,3120394,65535,synack,1,0,0,2024-01-01T10:00:00.100+0000\n\
10.0.0.7,10.0.0.100,443,41523,0,1840394,65535,synack,1,1,0,2024-01-01T10:00:00.200+0000\n";

    fn output(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    #[test]
    fn test_tcp_syn_requires_port() {
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.5", "tcp_syn", None);
        let err = ZmapAdapter.build_args(&request).unwrap_err();
        assert!(matches!(err, ScanFailure::InvalidRequest(_)));
        assert_eq!(err.to_string(), "Port is required for zmap TCP SYN scan");
    }

    #[test]
    fn test_build_args() {
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.0/24", "tcp_syn", Some(443));
        assert_eq!(
            ZmapAdapter.build_args(&request).unwrap(),
            vec![
                "-p",
                "443",
                "10.0.0.0/24",
                "--output-module=csv",
                "--output-fields=*"
            ]
        );

        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.0/24", "icmp_echo", None);
        assert_eq!(
            ZmapAdapter.build_args(&request).unwrap()[0],
            "--probe-module=icmp_echoscan"
        );
    }

    #[test]
    fn test_default_scan_type_is_unsupported() {
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.1", "default", None);
        assert_eq!(
            ZmapAdapter.build_args(&request).unwrap_err().to_string(),
            "Unsupported zmap scan type: default"
        );
    }

    #[test]
    fn test_parse_progress() {
        let line = " 0:04 12%; send: 10001 done (14.2 Kp/s avg); recv: 3 0 p/s (0 p/s avg); drops: 0 p/s (0 p/s avg); hitrate: 0.03%";
        assert_eq!(ZmapAdapter.parse_progress(line), Some(12));
        assert_eq!(ZmapAdapter.parse_progress(" 0:00 0%; send: 0 done"), Some(0));
        assert_eq!(ZmapAdapter.parse_progress("Jan 01 10:00:00 zmap: started"), None);
    }

    #[test]
    fn test_parse_report_deduplicates_addresses() {
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.0/24", "tcp_syn", Some(443));
        let report = ZmapAdapter.parse_report(&request, &output(SAMPLE_CSV)).unwrap();

        assert!(report.is_normalized());
        assert_eq!(report.hosts.len(), 2);
        assert_eq!(report.hosts[0].host, "10.0.0.7");
        assert_eq!(report.hosts[0].ports[0].port_id, "443");
    }

    #[test]
    fn test_daddr_fallback_and_icmp_port() {
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.0/24", "icmp_echo", None);
        let report = ZmapAdapter
            .parse_report(&request, &output("daddr,ttl\n10.0.0.3,64\n"))
            .unwrap();
        assert_eq!(report.hosts[0].host, "10.0.0.3");
        assert_eq!(report.hosts[0].ports[0].port_id, "");
    }

    #[test]
    fn test_header_only_is_empty() {
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.0/24", "tcp_syn", Some(80));
        let report = ZmapAdapter
            .parse_report(&request, &output("saddr,daddr\n"))
            .unwrap();
        assert!(report.hosts.is_empty());
    }

    #[test]
    fn test_missing_address_column_is_parse_failure() {
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.0/24", "tcp_syn", Some(80));
        let err = ZmapAdapter
            .parse_report(&request, &output("sport,dport\n80,41523\n"))
            .unwrap_err();
        assert!(matches!(err, ScanFailure::ParseFailure { .. }));
        assert!(err.to_string().contains("Could not find source or destination address"));
    }
}
