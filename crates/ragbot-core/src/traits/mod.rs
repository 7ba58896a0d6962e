//! Seams between the pipeline and the outside world.

pub mod channel;
pub mod embedding;
pub mod provider;

pub use channel::Channel;
pub use embedding::EmbeddingProvider;
pub use provider::{ChatProvider, GenerateParams};
