// Submit Use Case - request validation

use crate::application::worker::constants::{DEFAULT_SCAN_TYPE, DEFAULT_TOOL};
use crate::domain::{DomainError, ScanRequest, ScanTool};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Raw submission as received from a caller
///
/// Every field is optional on the wire; defaults are `tool = "nmap"` and
/// `scan_type = "default"`. `target` is mandatory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitScan {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl SubmitScan {
    pub fn new(tool: &str, target: &str, scan_type: &str) -> Self {
        Self {
            target: Some(target.to_string()),
            tool: Some(tool.to_string()),
            scan_type: Some(scan_type.to_string()),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Validate and apply defaults
    ///
    /// Rejections happen here, before any job record exists.
    pub fn validate(self) -> Result<ScanRequest> {
        let target = self
            .target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::InvalidRequest("Target is required".to_string()))?;

        let tool_name = self
            .tool
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TOOL.to_string());
        let tool: ScanTool = tool_name.parse().map_err(|e| match e {
            DomainError::UnknownTool(name) => AppError::UnknownTool(name),
            other => AppError::Domain(other),
        })?;

        let scan_type = self
            .scan_type
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SCAN_TYPE.to_string());

        if target.starts_with('-') || target.chars().any(char::is_whitespace) {
            return Err(AppError::InvalidRequest(format!(
                "Target '{}' is not a host, address or range",
                target
            )));
        }

        Ok(ScanRequest {
            tool,
            target,
            scan_type,
            port: self.port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_rejected() {
        let req = SubmitScan {
            tool: Some("nmap".into()),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert!(err.to_string().contains("Target is required"));
    }

    #[test]
    fn test_blank_target_rejected() {
        let err = SubmitScan::new("nmap", "   ", "quick").validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn test_option_like_target_rejected() {
        let err = SubmitScan::new("nmap", "--script=evil", "quick")
            .validate()
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn test_unknown_tool_rejected() {
        let err = SubmitScan::new("nessus", "10.0.0.1", "default")
            .validate()
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownTool(name) if name == "nessus"));
    }

    #[test]
    fn test_defaults_applied() {
        let req = SubmitScan {
            target: Some("192.168.1.0/24".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(req.tool, ScanTool::Nmap);
        assert_eq!(req.scan_type, "default");
        assert_eq!(req.port, None);
    }

    #[test]
    fn test_port_carried_through() {
        let req = SubmitScan::new("masscan", "10.0.0.0/8", "tcp_scan")
            .with_port(443)
            .validate()
            .unwrap();
        assert_eq!(req.tool, ScanTool::Masscan);
        assert_eq!(req.port, Some(443));
    }
}
