//! promptrelay - Prompt relay with ordered multi-provider LLM fallback
//!
//! This library provides the core functionality for the relay, including
//! configuration, provider clients, key/model rotation, and fallback routing.

pub mod config;
pub mod error;
pub mod providers;
pub mod proxy;
pub mod router;

pub use config::Config;
pub use error::{Error, Result};
pub use router::{GenerationResult, ProviderRouter};
