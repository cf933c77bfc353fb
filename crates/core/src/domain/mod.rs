// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod report;

// Re-exports
pub use error::DomainError;
pub use job::{JobId, JobResult, JobStatus, ScanJob, ScanRequest, ScanTool, Termination};
pub use report::{HostEntry, PortEntry, PortState, ScanReport, ScanReportBuilder};
