//! FormCheck Core Library
//!
//! Client-side capture and analysis pipeline for short exercise videos.
//! A video is acquired from a file or a camera recording, validated,
//! submitted to the remote analysis service, and the normalized result is
//! handed to the presentation layer through an explicit session handoff.

pub mod core;

pub use crate::core::flow::FormCheckFlow;
pub use crate::core::{CoreError, CoreResult};
