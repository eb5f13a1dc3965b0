//! FAQBot Server Library
//!
//! Hosts the FAQ match engine behind a line-delimited JSON-RPC interface and a
//! one-shot command line.

pub mod error;
pub mod rpc;
pub mod service;

pub use error::{ServerError, ServerResult};
pub use rpc::FaqServer;
pub use service::{EmbedderKind, FaqService, Reply, ServiceConfig};
