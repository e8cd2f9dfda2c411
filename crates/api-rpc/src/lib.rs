//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 surface over the dispatch service: submission, per-category
//! status and handler monitoring.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
