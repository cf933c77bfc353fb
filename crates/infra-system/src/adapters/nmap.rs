// nmap: argument profiles, "About NN.NN% done" progress, XML report

use super::{percent, unsupported, ProcessOutput, ScanAdapter};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use scanhive_core::domain::{ScanReport, ScanReportBuilder, ScanRequest, ScanTool};
use scanhive_core::port::ScanFailure;

static PROGRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"About (\d+\.\d+)% done").expect("nmap progress regex should compile"));

#[derive(Debug, Clone, Copy, Default)]
pub struct NmapAdapter;

impl NmapAdapter {
    fn profile(scan_type: &str) -> Option<&'static [&'static str]> {
        let profile: &'static [&'static str] = match scan_type {
            "default" | "quick" => &["-T4", "-F"],
            "intense" => &["-T4", "-A", "-v"],
            "tcp" => &["-p", "1-65535"],
            "udp" => &["-sU", "-T4"],
            _ => return None,
        };
        Some(profile)
    }
}

impl ScanAdapter for NmapAdapter {
    fn tool(&self) -> ScanTool {
        ScanTool::Nmap
    }

    fn build_args(&self, request: &ScanRequest) -> Result<Vec<String>, ScanFailure> {
        let profile = Self::profile(&request.scan_type)
            .ok_or_else(|| unsupported(ScanTool::Nmap, &request.scan_type))?;

        let mut args: Vec<String> = profile.iter().map(|s| s.to_string()).collect();
        args.extend(["-v", "-oX", "-"].map(String::from));
        args.push(request.target.clone());
        Ok(args)
    }

    fn parse_progress(&self, line: &str) -> Option<u8> {
        PROGRESS_PATTERN
            .captures(line)
            .and_then(|caps| percent(&caps[1]))
    }

    fn parse_report(
        &self,
        _request: &ScanRequest,
        output: &ProcessOutput,
    ) -> Result<ScanReport, ScanFailure> {
        parse_xml(&output.stdout).map_err(|reason| ScanFailure::ParseFailure {
            tool: ScanTool::Nmap,
            reason,
        })
    }
}

/// Host being assembled while walking `<host>` children
#[derive(Default)]
struct HostState {
    up: bool,
    address: Option<String>,
    open_ports: Vec<String>,
}

/// Open ports of up hosts from nmap's `-oX` document
fn parse_xml(xml: &str) -> Result<ScanReport, String> {
    if xml.trim().is_empty() {
        return Err("nmap returned no XML output".to_string());
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut builder = ScanReportBuilder::default();
    let mut saw_root = false;
    let mut root_closed = false;
    let mut host: Option<HostState> = None;
    // (portid, open) of the <port> currently open
    let mut port: Option<(String, bool)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed XML at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    b"nmaprun" => saw_root = true,
                    b"host" if !is_empty => host = Some(HostState::default()),
                    b"status" => {
                        if let Some(h) = host.as_mut() {
                            h.up = attr(e, b"state")?.as_deref() == Some("up");
                        }
                    }
                    b"address" => {
                        if let Some(h) = host.as_mut() {
                            let kind = attr(e, b"addrtype")?;
                            // MAC addresses are not host identities
                            if h.address.is_none() && kind.as_deref() != Some("mac") {
                                h.address = attr(e, b"addr")?;
                            }
                        }
                    }
                    b"port" if host.is_some() && !is_empty => {
                        let port_id = attr(e, b"portid")?
                            .ok_or_else(|| "<port> without portid".to_string())?;
                        port = Some((port_id, false));
                    }
                    b"state" => {
                        if let Some((_, open)) = port.as_mut() {
                            *open = attr(e, b"state")?.as_deref() == Some("open");
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"port" => {
                    if let (Some((port_id, true)), Some(h)) = (port.take(), host.as_mut()) {
                        h.open_ports.push(port_id);
                    }
                }
                b"host" => {
                    if let Some(HostState {
                        up: true,
                        address: Some(address),
                        open_ports,
                    }) = host.take()
                    {
                        builder.add_host(&address);
                        for port_id in open_ports {
                            builder.add_open_port(&address, port_id);
                        }
                    }
                }
                b"nmaprun" => root_closed = true,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err("output is not an nmap XML report".to_string());
    }
    if !root_closed {
        return Err("XML report is truncated".to_string());
    }
    Ok(builder.build())
}

fn attr(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, String> {
    match element.try_get_attribute(name) {
        Ok(Some(attribute)) => attribute
            .unescape_value()
            .map(|value| Some(value.into_owned()))
            .map_err(|e| e.to_string()),
        Ok(None) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -T4 -F -v -oX - 192.168.1.0/30" start="1700000000" version="7.94">
<scaninfo type="syn" protocol="tcp" numservices="100" services="7,9,13"/>
<verbose level="1"/>
<hosthint><status state="up" reason="arp-response"/><address addr="192.168.1.9" addrtype="ipv4"/></hosthint>
<host starttime="1700000001" endtime="1700000002">
<status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.1" addrtype="ipv4"/>
<address addr="AA:BB:CC:DD:EE:FF" addrtype="mac" vendor="Acme"/>
<ports>
<extraports state="closed" count="97"><extrareasons reason="reset" count="97"/></extraports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="ssh" method="table" conf="3"/></port>
<port protocol="tcp" portid="53"><state state="filtered" reason="no-response" reason_ttl="0"/></port>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="http" method="table" conf="3"/></port>
</ports>
</host>
<host><status state="down" reason="no-response"/><address addr="192.168.1.2" addrtype="ipv4"/></host>
<host><status state="up" reason="echo-reply"/><address addr="192.168.1.3" addrtype="ipv4"/><ports><extraports state="closed" count="100"/></ports></host>
<runstats><finished time="1700000005" elapsed="4.10" exit="success"/><hosts up="2" down="1" total="3"/></runstats>
</nmaprun>
"#;

    fn run(stdout: &str) -> Result<ScanReport, ScanFailure> {
        let request = ScanRequest::new(ScanTool::Nmap, "192.168.1.0/30", "quick", None);
        NmapAdapter.parse_report(
            &request,
            &ProcessOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            },
        )
    }

    #[test]
    fn test_build_args_profiles() {
        let request = ScanRequest::new(ScanTool::Nmap, "127.0.0.1", "quick", None);
        assert_eq!(
            NmapAdapter.build_args(&request).unwrap(),
            vec!["-T4", "-F", "-v", "-oX", "-", "127.0.0.1"]
        );

        let request = ScanRequest::new(ScanTool::Nmap, "10.0.0.1", "udp", None);
        assert_eq!(
            NmapAdapter.build_args(&request).unwrap(),
            vec!["-sU", "-T4", "-v", "-oX", "-", "10.0.0.1"]
        );

        let request = ScanRequest::new(ScanTool::Nmap, "10.0.0.1", "tcp", Some(22));
        assert_eq!(NmapAdapter.build_args(&request).unwrap()[..2], ["-p", "1-65535"]);
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let request = ScanRequest::new(ScanTool::Nmap, "10.0.0.1", "stealth", None);
        let err = NmapAdapter.build_args(&request).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported nmap scan type: stealth");
    }

    #[test]
    fn test_parse_progress() {
        let line = "SYN Stealth Scan Timing: About 42.57% done; ETC: 12:01 (0:00:20 remaining)";
        assert_eq!(NmapAdapter.parse_progress(line), Some(42));
        assert_eq!(
            NmapAdapter.parse_progress("Discovered open port 22/tcp on 10.0.0.1"),
            None
        );
        assert_eq!(NmapAdapter.parse_progress("About 7% done"), None);
    }

    #[test]
    fn test_parse_report_keeps_open_ports_of_up_hosts() {
        let report = run(SAMPLE_XML).unwrap();

        assert!(report.is_normalized());
        assert_eq!(report.hosts.len(), 2);

        let router = report.host("192.168.1.1").unwrap();
        let ports: Vec<&str> = router.ports.iter().map(|p| p.port_id.as_str()).collect();
        assert_eq!(ports, vec!["22", "80"]);

        assert!(report.host("192.168.1.2").is_none());
        assert!(report.host("192.168.1.3").unwrap().ports.is_empty());
        assert!(report.host("192.168.1.9").is_none());
    }

    #[test]
    fn test_no_hosts_is_empty_report() {
        let xml = r#"<?xml version="1.0"?><nmaprun scanner="nmap"><runstats/></nmaprun>"#;
        assert!(run(xml).unwrap().hosts.is_empty());
    }

    #[test]
    fn test_empty_output_is_parse_failure() {
        let err = run("  \n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to parse nmap output: nmap returned no XML output"
        );
    }

    #[test]
    fn test_truncated_output_is_parse_failure() {
        let truncated = &SAMPLE_XML[..SAMPLE_XML.find("<runstats>").unwrap()];
        assert!(matches!(run(truncated), Err(ScanFailure::ParseFailure { .. })));
    }

    #[test]
    fn test_non_nmap_document_is_parse_failure() {
        assert!(matches!(
            run("<html><body>nope</body></html>"),
            Err(ScanFailure::ParseFailure { .. })
        ));
        assert!(matches!(run("Starting Nmap 7.94"), Err(ScanFailure::ParseFailure { .. })));
    }
}
