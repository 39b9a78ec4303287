//! FormCheck Core Engine
//!
//! Acquisition, validation, resource lifecycle, submission, normalization
//! and the session handoff between pipeline stages.

pub mod analysis;
pub mod capture;
pub mod exercises;
pub mod flow;
pub mod media;
pub mod resources;
pub mod session;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
mod tests_destructive;
