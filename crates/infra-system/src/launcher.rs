// ScanLauncher backed by real tool processes

use crate::adapters::{AdapterConfig, ScanAdapter, ToolAdapter};
use crate::preflight::preflight;
use crate::supervisor::{ProcessSupervisor, SupervisorConfig};
use scanhive_core::application::worker::constants::UPDATE_CHANNEL_CAPACITY;
use scanhive_core::domain::ScanRequest;
use scanhive_core::port::{ScanLauncher, ScanUpdate, UpdateStream};
use std::ffi::OsString;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Runs nmap, zmap and masscan as child processes
///
/// Each launch builds the argument list, resolves the binary, then hands the
/// process to a [`ProcessSupervisor`] on its own task. Failures before spawn
/// arrive as a single `Error` update with no `Process` before it.
#[derive(Debug, Clone, Default)]
pub struct SystemScanLauncher {
    supervisor: ProcessSupervisor,
    adapter_config: AdapterConfig,
    search_path: Option<OsString>,
}

impl SystemScanLauncher {
    pub fn new(supervisor: SupervisorConfig, adapter_config: AdapterConfig) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(supervisor),
            adapter_config,
            search_path: None,
        }
    }

    /// Look tools up in `paths` (PATH syntax) instead of `PATH`
    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }
}

impl ScanLauncher for SystemScanLauncher {
    fn launch(&self, request: ScanRequest) -> UpdateStream {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let supervisor = self.supervisor.clone();
        let adapter = ToolAdapter::for_tool(request.tool, &self.adapter_config);
        let search_path = self.search_path.clone();

        tokio::spawn(async move {
            let args = match adapter.build_args(&request) {
                Ok(args) => args,
                Err(failure) => {
                    warn!(tool = %request.tool, error = %failure, "Scan request rejected");
                    let _ = tx.send(ScanUpdate::Error(failure)).await;
                    return;
                }
            };

            let program = match preflight(request.tool, search_path.as_deref()) {
                Ok(path) => path,
                Err(failure) => {
                    let _ = tx.send(ScanUpdate::Error(failure)).await;
                    return;
                }
            };

            debug!(tool = %request.tool, program = %program.display(), ?args, "Launching scanner");
            let mut command = Command::new(program);
            command.args(&args);
            supervisor.run(command, adapter, request, tx).await;
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanhive_core::domain::ScanTool;
    use scanhive_core::port::ScanFailure;

    async fn first_update(launcher: &SystemScanLauncher, request: ScanRequest) -> ScanUpdate {
        let mut rx = launcher.launch(request);
        let update = rx.recv().await.expect("launcher sends at least one update");
        assert!(rx.recv().await.is_none(), "pre-spawn failure must be the only update");
        update
    }

    #[tokio::test]
    async fn test_invalid_request_fails_before_preflight() {
        // Empty search path: preflight would fail too, but args come first
        let launcher = SystemScanLauncher::default().with_search_path("");
        let request = ScanRequest::new(ScanTool::Zmap, "10.0.0.1", "tcp_syn", None);

        match first_update(&launcher, request).await {
            ScanUpdate::Error(ScanFailure::InvalidRequest(message)) => {
                assert_eq!(message, "Port is required for zmap TCP SYN scan");
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = SystemScanLauncher::default().with_search_path(dir.path());
        let request = ScanRequest::new(ScanTool::Nmap, "127.0.0.1", "default", None);

        match first_update(&launcher, request).await {
            ScanUpdate::Error(failure @ ScanFailure::ToolUnavailable { .. }) => {
                assert!(failure.to_string().contains("sudo apt install nmap"));
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fake_tool_runs_end_to_end() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("masscan");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             echo 'rate:  1.00-kpps, 50.00% done, 0:00:01 remaining, found=1' >&2\n\
             echo \"Discovered open port $5/tcp on $1\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let launcher = SystemScanLauncher::default().with_search_path(dir.path());
        let request = ScanRequest::new(ScanTool::Masscan, "10.1.2.3", "tcp_scan", Some(8080));
        let mut rx = launcher.launch(request);

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }

        assert!(matches!(updates.first(), Some(ScanUpdate::Process(_))));
        assert!(updates.iter().any(|u| matches!(u, ScanUpdate::Progress(50))));
        match updates.last() {
            Some(ScanUpdate::Result(report)) => {
                let host = report.host("10.1.2.3").expect("host reported");
                assert_eq!(host.ports[0].port_id, "8080");
            }
            other => panic!("unexpected terminal update: {:?}", other),
        }
    }
}
