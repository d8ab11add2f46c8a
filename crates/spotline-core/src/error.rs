//! Error types for Spotline

use thiserror::Error;

/// Result type for Spotline operations
pub type Result<T> = std::result::Result<T, SpotlineError>;

/// Core error type for Spotline operations
///
/// Only setup problems surface here. A missed deadline is an
/// [`Outcome`](crate::types::Outcome), and a misbehaving policy degrades the
/// tick it misbehaved in instead of failing the run.
#[derive(Error, Debug)]
pub enum SpotlineError {
    /// Malformed or missing job / simulation parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tick length is zero, negative or not finite
    #[error("Invalid gap: {0} seconds (must be positive and finite)")]
    InvalidGap(f64),

    /// A run needs at least one region
    #[error("Region set is empty")]
    EmptyRegionSet,

    /// A region index that does not exist in this run
    #[error("Region {index} out of range ({num_regions} regions configured)")]
    RegionOutOfRange { index: usize, num_regions: usize },

    /// Trace file could not be interpreted
    #[error("Trace error in {path}: {message}")]
    Trace { path: String, message: String },

    /// Trace declares a tick length different from the run's
    #[error("Trace gap mismatch: run uses {expected}s ticks, trace declares {found}s")]
    TraceGapMismatch { expected: f64, found: f64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpotlineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a trace error for the given source
    pub fn trace(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Trace {
            path: path.into(),
            message: msg.into(),
        }
    }
}
