//! Spotline Core - Shared types and traits
//!
//! This crate defines the vocabulary used across:
//! - spotline-simulation-engine (simulator, policies, batch runner, CLI)
//! - third-party policies evaluated against the simulator
//!
//! Key types:
//! - Policy trait (interface every strategy implements)
//! - Job, Decision and TickSnapshot
//! - Run outcomes and error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
