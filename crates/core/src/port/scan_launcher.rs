// Scan Launcher Port
// Abstraction over "run this tool against this target and tell me what happens"

use crate::domain::{ScanReport, ScanRequest, ScanTool};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures captured as a job's terminal error
///
/// `Display` output is what ends up in `result.error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unsupported {tool} scan type: {scan_type}")]
    UnsupportedScanType { tool: ScanTool, scan_type: String },

    #[error("{tool} is unavailable: {reason}")]
    ToolUnavailable { tool: ScanTool, reason: String },

    #[error("Permission denied when running {tool}: {detail}")]
    PermissionDenied { tool: ScanTool, detail: String },

    #[error("Failed to start {tool}: {reason}")]
    ProcessStartFailure { tool: ScanTool, reason: String },

    #[error("{tool} scan timed out after {secs} seconds")]
    Timeout { tool: ScanTool, secs: u64 },

    #[error("Failed to parse {tool} output: {reason}")]
    ParseFailure { tool: ScanTool, reason: String },

    #[error("{tool} scan failed{}: {stderr}", exit_suffix(.code))]
    ToolFailed {
        tool: ScanTool,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0}")]
    Interrupted(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {}", code),
        None => " (terminated by signal)".to_string(),
    }
}

/// Live external process, as seen by everything that is not its supervisor
#[async_trait]
pub trait ProcessControl: Send + Sync + std::fmt::Debug {
    /// OS process id, when the platform exposes one
    fn pid(&self) -> Option<u32>;

    /// True once the supervisor has observed the process exit
    fn has_exited(&self) -> bool;

    /// Graceful terminate, short grace period, then forced kill
    ///
    /// Never fails: calling it on a process that already exited is a no-op.
    async fn terminate(&self);
}

pub type ProcessRef = Arc<dyn ProcessControl>;

/// One message in a job's update stream
///
/// Shape: exactly one `Process` first (absent when the process never
/// started), any number of non-decreasing `Progress` values, then exactly
/// one terminal `Result` or `Error`, after which the channel closes.
#[derive(Debug, Clone)]
pub enum ScanUpdate {
    Process(ProcessRef),
    Progress(u8),
    Result(ScanReport),
    Error(ScanFailure),
}

impl ScanUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanUpdate::Result(_) | ScanUpdate::Error(_))
    }
}

pub type UpdateStream = mpsc::Receiver<ScanUpdate>;

/// Starts scans
///
/// Implementations:
/// - SystemScanLauncher: real tool processes (infra-system)
/// - ScriptedLauncher: canned update streams for tests
pub trait ScanLauncher: Send + Sync {
    /// Begin a scan and return its update stream without waiting for it
    fn launch(&self, request: ScanRequest) -> UpdateStream;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// Process stand-in that "exits" when terminated
    #[derive(Debug)]
    pub struct MockProcess {
        pid: u32,
        exited: watch::Sender<bool>,
        terminate_calls: AtomicUsize,
    }

    impl MockProcess {
        pub fn new(pid: u32) -> Arc<Self> {
            let (exited, _) = watch::channel(false);
            Arc::new(Self {
                pid,
                exited,
                terminate_calls: AtomicUsize::new(0),
            })
        }

        pub fn exit(&self) {
            self.exited.send_replace(true);
        }

        pub async fn wait_exit(&self) {
            let mut rx = self.exited.subscribe();
            let _ = rx.wait_for(|exited| *exited).await;
        }

        pub fn terminate_calls(&self) -> usize {
            self.terminate_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProcessControl for MockProcess {
        fn pid(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn has_exited(&self) -> bool {
            *self.exited.borrow()
        }

        async fn terminate(&self) {
            self.terminate_calls.fetch_add(1, Ordering::SeqCst);
            self.exit();
        }
    }

    /// Canned behavior for one launch
    #[derive(Debug, Clone)]
    pub enum Script {
        /// Process, progress values, then a report
        Complete {
            progress: Vec<u8>,
            report: ScanReport,
        },
        /// Single error, no process ever started
        RejectBeforeSpawn(ScanFailure),
        /// Process, progress values, then an error
        FailAfterSpawn {
            progress: Vec<u8>,
            failure: ScanFailure,
        },
        /// Process and progress, then block until terminated
        RunUntilTerminated { progress: Vec<u8> },
        /// Process, then the stream closes with no terminal update
        Vanish,
        /// Panic inside `launch`
        Panic(String),
    }

    /// Launcher that replays scripts instead of spawning processes
    pub struct ScriptedLauncher {
        default: Script,
        per_tool: Mutex<HashMap<ScanTool, Script>>,
        launches: AtomicUsize,
        next_pid: AtomicU32,
        processes: Mutex<Vec<Arc<MockProcess>>>,
    }

    impl ScriptedLauncher {
        pub fn new(default: Script) -> Self {
            Self {
                default,
                per_tool: Mutex::new(HashMap::new()),
                launches: AtomicUsize::new(0),
                next_pid: AtomicU32::new(4000),
                processes: Mutex::new(Vec::new()),
            }
        }

        pub fn completing_with(report: ScanReport) -> Self {
            Self::new(Script::Complete {
                progress: vec![10, 50, 90],
                report,
            })
        }

        pub fn with_tool(self, tool: ScanTool, script: Script) -> Self {
            self.per_tool.lock().unwrap().insert(tool, script);
            self
        }

        pub fn launch_count(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }

        /// Processes handed out so far, in launch order
        pub fn processes(&self) -> Vec<Arc<MockProcess>> {
            self.processes.lock().unwrap().clone()
        }

        fn spawn_process(&self) -> Arc<MockProcess> {
            let process = MockProcess::new(self.next_pid.fetch_add(1, Ordering::SeqCst));
            self.processes.lock().unwrap().push(Arc::clone(&process));
            process
        }
    }

    impl ScanLauncher for ScriptedLauncher {
        fn launch(&self, request: ScanRequest) -> UpdateStream {
            self.launches.fetch_add(1, Ordering::SeqCst);
            let script = self
                .per_tool
                .lock()
                .unwrap()
                .get(&request.tool)
                .cloned()
                .unwrap_or_else(|| self.default.clone());

            if let Script::Panic(message) = &script {
                panic!("{}", message);
            }

            let (tx, rx) = mpsc::channel(16);
            let process = match &script {
                Script::RejectBeforeSpawn(_) => None,
                _ => Some(self.spawn_process()),
            };
            let tool = request.tool;

            tokio::spawn(async move {
                if let Some(process) = &process {
                    let handle: ProcessRef = process.clone();
                    if tx.send(ScanUpdate::Process(handle)).await.is_err() {
                        return;
                    }
                }

                // The process is gone before its terminal update, as with a real supervisor
                let exit = |process: &Option<Arc<MockProcess>>| {
                    if let Some(process) = process {
                        process.exit();
                    }
                };

                match script {
                    Script::Complete { progress, report } => {
                        for p in progress {
                            let _ = tx.send(ScanUpdate::Progress(p)).await;
                        }
                        exit(&process);
                        let _ = tx.send(ScanUpdate::Result(report)).await;
                    }
                    Script::RejectBeforeSpawn(failure) => {
                        let _ = tx.send(ScanUpdate::Error(failure)).await;
                    }
                    Script::FailAfterSpawn { progress, failure } => {
                        for p in progress {
                            let _ = tx.send(ScanUpdate::Progress(p)).await;
                        }
                        exit(&process);
                        let _ = tx.send(ScanUpdate::Error(failure)).await;
                    }
                    Script::RunUntilTerminated { progress } => {
                        for p in progress {
                            let _ = tx.send(ScanUpdate::Progress(p)).await;
                        }
                        if let Some(process) = &process {
                            process.wait_exit().await;
                        }
                        let _ = tx
                            .send(ScanUpdate::Error(ScanFailure::ToolFailed {
                                tool,
                                code: None,
                                stderr: String::new(),
                            }))
                            .await;
                    }
                    Script::Vanish | Script::Panic(_) => exit(&process),
                }
            });

            rx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    #[test]
    fn test_failure_messages() {
        let timeout = ScanFailure::Timeout {
            tool: ScanTool::Nmap,
            secs: 300,
        };
        assert_eq!(timeout.to_string(), "nmap scan timed out after 300 seconds");

        let failed = ScanFailure::ToolFailed {
            tool: ScanTool::Zmap,
            code: Some(1),
            stderr: "bad target".into(),
        };
        assert_eq!(
            failed.to_string(),
            "zmap scan failed with exit code 1: bad target"
        );
    }

    #[tokio::test]
    async fn test_scripted_stream_shape() {
        let launcher = ScriptedLauncher::completing_with(ScanReport::default());
        let mut rx = launcher.launch(ScanRequest::new(ScanTool::Nmap, "127.0.0.1", "quick", None));

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }

        assert!(matches!(updates.first(), Some(ScanUpdate::Process(_))));
        assert!(updates.last().unwrap().is_terminal());
        assert_eq!(updates.iter().filter(|u| u.is_terminal()).count(), 1);
        assert_eq!(launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_reject_before_spawn_has_no_process() {
        let failure = ScanFailure::InvalidRequest("port required".into());
        let launcher = ScriptedLauncher::new(Script::RejectBeforeSpawn(failure.clone()));
        let mut rx = launcher.launch(ScanRequest::new(ScanTool::Zmap, "10.0.0.5", "tcp_syn", None));

        match rx.recv().await {
            Some(ScanUpdate::Error(f)) => assert_eq!(f, failure),
            other => panic!("unexpected update: {:?}", other),
        }
        assert!(rx.recv().await.is_none());
        assert!(launcher.processes().is_empty());
    }
}
