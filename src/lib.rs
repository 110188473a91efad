//! membridge - MCP bridge for project-scoped memories and tasks
//!
//! Exposes a fixed catalogue of schema-validated tools over JSON-RPC on
//! stdio and fulfills them against either a directly-connected store plus
//! embedding service, or a hosted API reached over authenticated HTTP.

pub mod backend;
pub mod embedding;
pub mod error;
pub mod mcp;
pub mod session;
pub mod types;

pub use error::{BridgeError, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
