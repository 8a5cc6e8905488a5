// Port Layer - Interfaces for external dependencies

pub mod cancellation;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod memory_repository;
pub mod time_provider;
pub mod worker_launcher;

// Re-exports
pub use cancellation::{cancel_channel, CancelHandle, CancelToken};
pub use id_provider::{IdProvider, SequentialIdProvider, UuidProvider};
pub use job_repository::{JobRepository, UpdateOutcome};
pub use memory_repository::InMemoryJobRepository;
pub use time_provider::{SystemTimeProvider, TickingTimeProvider, TimeProvider};
pub use worker_launcher::{ExecutionError, WorkerInvocation, WorkerLauncher, WorkerSignal};
