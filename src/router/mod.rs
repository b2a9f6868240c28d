//! Router module for provider fallback.
//!
//! This module handles turning a prompt and mode into a reply:
//! - Mode lookup with a `chat` default
//! - Ordered provider fallback, first success wins

mod fallback;
pub mod mode;

pub use fallback::{GenerationResult, ProviderRouter};
pub use mode::Mode;
