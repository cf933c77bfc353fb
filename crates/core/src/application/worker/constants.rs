// Worker constants (No magic values)
use std::time::Duration;

/// Wall-clock limit for one scan, measured from spawn (5 minutes)
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Graceful process shutdown window before SIGKILL (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while draining tool output after exit (100ms)
pub const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the worker-facing update channel
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Capacity of each stdout/stderr line queue
pub const OUTPUT_QUEUE_CAPACITY: usize = 1024;

/// Default masscan packet rate (packets/second)
pub const DEFAULT_MASSCAN_RATE: u32 = 1000;

/// Defaults applied when a submission leaves them out
pub const DEFAULT_TOOL: &str = "nmap";
pub const DEFAULT_SCAN_TYPE: &str = "default";

/// Terminal error recorded for jobs found unfinished at startup
pub const INTERRUPTED_BY_RESTART: &str = "Scan was interrupted by a server restart.";
