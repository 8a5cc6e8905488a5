// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod patch;
pub mod protocol;
pub mod template;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobMetrics, JobStatus, StyleOptions};
pub use patch::{JobPatch, Precondition};
pub use protocol::{parse_line, ProtocolParseError, WorkerEvent};
pub use template::{StyleTemplate, StyleTemplateCatalog};
