use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while assembling trajectories.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    /// Detection frames and timestamps are not aligned index-for-index.
    #[error("input shape mismatch: {frames} detection frames but {timestamps} timestamps")]
    InputShape {
        /// Number of detection frames supplied.
        frames: usize,
        /// Number of timestamps supplied.
        timestamps: usize,
    },

    /// Exposures handed to the differencing stage do not share one shape.
    #[error("exposure {index} has shape {actual:?}, expected {expected:?}")]
    ExposureShape {
        /// Index of the offending exposure.
        index: usize,
        /// Shape of the first exposure.
        expected: (usize, usize),
        /// Shape of the offending exposure.
        actual: (usize, usize),
    },

    /// Timestamps must increase strictly from one frame to the next.
    #[error("timestamps not monotonically increasing at index {index}")]
    NonMonotonicTimestamps {
        /// Index of the first timestamp that does not exceed its predecessor.
        index: usize,
    },

    /// Configuration values that make the search or ranking meaningless.
    #[error("degenerate configuration: {0}")]
    DegenerateConfig(String),

    /// Velocity is undefined for this path.
    #[error("velocity undefined for path of length {path_length} spanning {elapsed_days} days")]
    DegenerateVelocity {
        /// Number of detections in the path.
        path_length: usize,
        /// Elapsed time between the first and last detection.
        elapsed_days: f64,
    },

    /// The search stopped early on a configured budget.
    #[error("resource budget exceeded: {0}")]
    ResourceBudgetExceeded(#[from] BudgetExceeded),
}

/// Which search budget tripped.
///
/// A tripped budget never discards what was already found; it is reported
/// alongside the partial result.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BudgetExceeded {
    #[error("node budget of {limit} expansions exhausted")]
    Nodes { limit: usize },

    #[error("path budget of {limit} recorded paths exhausted")]
    Paths { limit: usize },

    /// Some continuations were skipped; the search itself ran to completion.
    #[error("branching factor above {limit} at frame {frame}")]
    Branching { limit: usize, frame: usize },

    #[error("time budget of {limit:?} exhausted")]
    Duration { limit: Duration },
}

impl BudgetExceeded {
    /// Whether this budget aborts the whole search when it trips.
    pub fn stops_search(&self) -> bool {
        !matches!(self, BudgetExceeded::Branching { .. })
    }
}

pub type TrackResult<T> = Result<T, TrackError>;
