// Restyle Core - Domain Logic, Ports & Job Orchestration
// NO infrastructure dependencies: stores and process spawning live behind ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};
