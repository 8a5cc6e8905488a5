//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the Restyle job engine.
//! Method names carry a version suffix (`job.create.v1`).

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
