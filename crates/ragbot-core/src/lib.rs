//! # RagBot Core
//!
//! Shared building blocks for the RagBot workspace: the error taxonomy,
//! configuration, message types and the provider / channel traits that the
//! pipeline and the bot front end are written against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::RagBotConfig;
pub use error::{FailureReason, RagBotError, Result};
