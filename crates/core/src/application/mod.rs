// Application Layer - Use Cases and Business Logic

pub mod orchestrator;
pub mod recovery;
pub mod registry;
pub mod submit;
pub mod worker;

// Re-exports
pub use orchestrator::ScanOrchestrator;
pub use recovery::RecoveryService;
pub use registry::ActiveJobRegistry;
pub use submit::SubmitScan;
pub use worker::ScanWorker;
