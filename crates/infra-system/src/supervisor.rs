// Process supervision: spawn, drain output, enforce timeout, terminate
// reason: tokio::process for async child management, nix for signals

use crate::adapters::{spawn_failure, ProcessOutput, ScanAdapter, ToolAdapter};
use async_trait::async_trait;
use scanhive_core::application::worker::constants::{
    DEFAULT_SCAN_TIMEOUT, GRACEFUL_SHUTDOWN_TIMEOUT, OUTPUT_POLL_INTERVAL, OUTPUT_QUEUE_CAPACITY,
};
use scanhive_core::domain::{ScanRequest, ScanTool};
use scanhive_core::port::{ProcessControl, ProcessRef, ScanFailure, ScanUpdate};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

/// Timing knobs for one supervised process
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Wall-clock limit measured from spawn
    pub timeout: Duration,
    /// Time between SIGTERM and SIGKILL
    pub grace_period: Duration,
    /// How long to wait for more output once the process has exited
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCAN_TIMEOUT,
            grace_period: GRACEFUL_SHUTDOWN_TIMEOUT,
            poll_interval: OUTPUT_POLL_INTERVAL,
        }
    }
}

/// Splits a byte stream into lines on `\n` or `\r`
///
/// Tools that redraw a status line end it with a bare `\r`, so both count as
/// line breaks; `\r\n` is a single break.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    after_cr: bool,
}

impl LineSplitter {
    /// Feed a chunk; returns every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => self.after_cr = false,
                b'\n' | b'\r' => {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                    self.after_cr = byte == b'\r';
                }
                _ => {
                    self.after_cr = false;
                    self.pending.push(byte);
                }
            }
        }
        lines
    }

    /// Whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Live tool process as handed to the rest of the system
///
/// Signals are sent by pid; the supervisor owns the `Child` and reports the
/// exit through a watch channel, so terminating never races with reaping.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    tool: ScanTool,
    grace_period: Duration,
    exited: watch::Sender<bool>,
}

impl ProcessHandle {
    pub fn new(pid: Option<u32>, tool: ScanTool, grace_period: Duration) -> Arc<Self> {
        let (exited, _) = watch::channel(false);
        Arc::new(Self {
            pid,
            tool,
            grace_period,
            exited,
        })
    }

    pub(crate) fn mark_exited(&self) {
        self.exited.send_replace(true);
    }

    /// Wait up to `limit` for the supervisor to observe the exit
    async fn wait_exit(&self, limit: Duration) -> bool {
        let mut rx = self.exited.subscribe();
        let exited = matches!(
            timeout(limit, rx.wait_for(|exited| *exited)).await,
            Ok(Ok(_))
        );
        exited
    }

    pub(crate) async fn request_stop(&self) {
        if !self.has_exited() {
            self.signal(false).await;
        }
    }

    async fn force_kill(&self) {
        if !self.has_exited() {
            self.signal(true).await;
        }
    }

    #[cfg(unix)]
    async fn signal(&self, force: bool) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else { return };
        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        debug!(tool = %self.tool, pid, signal = %signal, "Signalling scan process");
        if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
            // ESRCH: already gone
            debug!(pid, error = %e, "Signal not delivered");
        }
    }

    #[cfg(windows)]
    async fn signal(&self, force: bool) {
        let Some(pid) = self.pid else { return };
        let pid = pid.to_string();
        let mut args = vec!["/PID", pid.as_str()];
        if force {
            args.push("/F");
        }
        if let Err(e) = Command::new("taskkill").args(&args).output().await {
            debug!(pid = %pid, error = %e, "taskkill failed");
        }
    }
}

#[async_trait]
impl ProcessControl for ProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    async fn terminate(&self) {
        if self.has_exited() {
            return;
        }

        info!(tool = %self.tool, pid = ?self.pid, "Sending SIGTERM for graceful shutdown");
        self.request_stop().await;
        if self.wait_exit(self.grace_period).await {
            return;
        }

        warn!(tool = %self.tool, pid = ?self.pid, "Process did not exit after SIGTERM, sending SIGKILL");
        self.force_kill().await;
        if !self.wait_exit(self.grace_period).await {
            warn!(tool = %self.tool, pid = ?self.pid, "Process exit not yet observed after SIGKILL");
        }
    }
}

/// Runs one tool process and turns it into an update stream
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Spawn `command` and report on `tx` until the terminal update
    ///
    /// Sends `Process` first (or a lone `Error` when the spawn fails), then
    /// increasing `Progress` values, then exactly one `Result` or `Error`.
    pub async fn run(
        &self,
        mut command: Command,
        adapter: ToolAdapter,
        request: ScanRequest,
        tx: mpsc::Sender<ScanUpdate>,
    ) {
        let tool = adapter.tool();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(tool = %tool, error = %e, "Failed to spawn scanner");
                let _ = tx.send(ScanUpdate::Error(spawn_failure(tool, &e))).await;
                return;
            }
        };

        let handle = ProcessHandle::new(child.id(), tool, self.config.grace_period);
        info!(tool = %tool, pid = ?handle.pid(), target = %request.target, "Scanner process spawned");

        let process: ProcessRef = handle.clone();
        if tx.send(ScanUpdate::Process(process)).await.is_err() {
            // Nobody is listening any more
            let _ = child.kill().await;
            handle.mark_exited();
            return;
        }

        let mut stdout_rx = spawn_line_reader(child.stdout.take());
        let mut stderr_rx = spawn_line_reader(child.stderr.take());

        let mut monitor = OutputMonitor::new(&adapter, &tx);
        let deadline = Instant::now() + self.config.timeout;
        let mut stdout_open = true;
        let mut stderr_open = true;

        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                _ = sleep_until(deadline) => {
                    self.expire(&mut child, &handle).await;
                    let _ = tx
                        .send(ScanUpdate::Error(ScanFailure::Timeout {
                            tool,
                            secs: self.config.timeout.as_secs(),
                        }))
                        .await;
                    return;
                }
                line = stderr_rx.recv(), if stderr_open => match line {
                    Some(line) => monitor.on_stderr(line).await,
                    None => stderr_open = false,
                },
                line = stdout_rx.recv(), if stdout_open => match line {
                    Some(line) => monitor.on_stdout(line),
                    None => stdout_open = false,
                },
            }
        };
        handle.mark_exited();

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                let _ = tx
                    .send(ScanUpdate::Error(ScanFailure::ToolFailed {
                        tool,
                        code: None,
                        stderr: format!("failed to wait for process: {}", e),
                    }))
                    .await;
                return;
            }
        };

        // Forward whatever was still buffered when the process exited
        while let Ok(Some(line)) = timeout(self.config.poll_interval, stderr_rx.recv()).await {
            monitor.on_stderr(line).await;
        }
        while let Ok(Some(line)) = timeout(self.config.poll_interval, stdout_rx.recv()).await {
            monitor.on_stdout(line);
        }

        let output = monitor.into_output(status);
        info!(tool = %tool, exit_code = ?output.exit_code, "Scanner process exited");

        let update = match adapter.conclude(&request, &output) {
            Ok(report) => ScanUpdate::Result(report),
            Err(failure) => ScanUpdate::Error(failure),
        };
        let _ = tx.send(update).await;
    }

    /// Timeout path: SIGTERM, grace period, SIGKILL
    async fn expire(&self, child: &mut Child, handle: &ProcessHandle) {
        warn!(
            tool = %handle.tool,
            pid = ?handle.pid(),
            timeout_secs = self.config.timeout.as_secs(),
            "Scan timed out, terminating"
        );
        handle.request_stop().await;
        if timeout(self.config.grace_period, child.wait()).await.is_err() {
            warn!(pid = ?handle.pid(), "Process did not exit after SIGTERM, sending SIGKILL");
            if let Err(e) = child.kill().await {
                warn!(pid = ?handle.pid(), error = %e, "Failed to kill timed-out process");
            }
        }
        handle.mark_exited();
    }
}

/// Collects output and turns stderr lines into progress updates
struct OutputMonitor<'a> {
    adapter: &'a ToolAdapter,
    tx: &'a mpsc::Sender<ScanUpdate>,
    stdout: Vec<String>,
    stderr: Vec<String>,
    last_progress: u8,
}

impl<'a> OutputMonitor<'a> {
    fn new(adapter: &'a ToolAdapter, tx: &'a mpsc::Sender<ScanUpdate>) -> Self {
        Self {
            adapter,
            tx,
            stdout: Vec::new(),
            stderr: Vec::new(),
            last_progress: 0,
        }
    }

    async fn on_stderr(&mut self, line: String) {
        debug!(tool = %self.adapter.tool(), line = %line.trim(), "Scanner output");
        if let Some(progress) = self.adapter.parse_progress(&line) {
            if progress > self.last_progress {
                self.last_progress = progress;
                let _ = self.tx.send(ScanUpdate::Progress(progress)).await;
            }
        }
        self.stderr.push(line);
    }

    fn on_stdout(&mut self, line: String) {
        self.stdout.push(line);
    }

    fn into_output(self, status: ExitStatus) -> ProcessOutput {
        ProcessOutput {
            stdout: self.stdout.join("\n"),
            stderr: self.stderr.join("\n"),
            exit_code: status.code(),
        }
    }
}

/// Background reader feeding complete lines into a bounded queue
fn spawn_line_reader<R>(reader: Option<R>) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
    let Some(mut reader) = reader else {
        return rx;
    };

    tokio::spawn(async move {
        let mut splitter = LineSplitter::default();
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        if tx.send(line).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Output reader stopped");
                    break;
                }
            }
        }
        if let Some(line) = splitter.finish() {
            let _ = tx.send(line).await;
        }
    });

    rx
}
