// Application Layer - Use Cases and Business Logic

pub mod orchestrator;
pub mod recovery;
pub mod supervisor;

// Re-exports
pub use orchestrator::{CreateJobRequest, JobOrchestrator, CANCELLED_MESSAGE};
pub use recovery::{RecoveryService, SUPERVISION_LOST_MESSAGE};
pub use supervisor::{JobTransitions, SupervisionOutcome, WorkerSupervisor};
