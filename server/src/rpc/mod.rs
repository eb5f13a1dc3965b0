//! JSON-RPC front end
//!
//! Line-delimited JSON-RPC 2.0 over stdio.

pub mod protocol;
pub mod server;
pub mod transport;

pub use server::FaqServer;
