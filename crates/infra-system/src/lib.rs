// Scanhive Infrastructure - System Adapters
// Implements: ScanLauncher (tool adapters + process supervision)

pub mod adapters;
pub mod launcher;
pub mod preflight;
pub mod supervisor;

pub use adapters::{AdapterConfig, ProcessOutput, ScanAdapter, ToolAdapter};
pub use launcher::SystemScanLauncher;
pub use preflight::preflight;
pub use supervisor::{LineSplitter, ProcessHandle, ProcessSupervisor, SupervisorConfig};
