//! Embedding boundary
//!
//! The engine treats embedding as a black box behind [`EmbeddingProvider`].
//! [`VectorEngine`] adds caching and output validation on top of any provider.

mod engine;
#[cfg(feature = "fastembed")]
mod fastembed_embedder;
mod hashing;
mod provider;

pub use engine::VectorEngine;
#[cfg(feature = "fastembed")]
pub use fastembed_embedder::FastEmbedProvider;
pub use hashing::{HashingEmbedder, DEFAULT_HASHING_DIMENSION};
pub use provider::EmbeddingProvider;
