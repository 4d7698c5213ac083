use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};

/// Default proximity gate between consecutive path detections (pixels).
pub const DEFAULT_MAX_DISTANCE: f64 = 5.0;
/// Default minimum number of frames a path must span to be kept.
pub const DEFAULT_MIN_PATH_LENGTH: usize = 10;
/// Default number of ranked paths retained.
pub const DEFAULT_MAX_RANKED_PATHS: usize = 1000;

/// Which frame a search started from an origin detection continues into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationMode {
    /// An origin in frame `i` continues into frame `i + 1`.
    #[default]
    RelativeToOrigin,
    /// Every origin continues into frame 1, whatever frame it came from.
    /// Kept for comparison against historical runs; paths from origins past
    /// frame 0 are not frame-contiguous under this mode.
    FromSequenceStart,
}

/// Optional limits on the exhaustive search. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum number of search nodes expanded across the whole run
    pub max_nodes: Option<usize>,
    /// Maximum number of candidate paths recorded
    pub max_paths: Option<usize>,
    /// Maximum continuations explored from any single node
    pub max_branching: Option<usize>,
    /// Wall-clock limit for the run
    pub max_duration: Option<Duration>,
}

impl SearchBudget {
    pub fn is_unbounded(&self) -> bool {
        self.max_nodes.is_none()
            && self.max_paths.is_none()
            && self.max_branching.is_none()
            && self.max_duration.is_none()
    }
}

/// Configuration for the trajectory search engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Proximity gate in pixels; consecutive detections must be strictly closer
    pub max_distance: f64,
    /// Minimum path length (frames) to record
    pub min_path_length: usize,
    pub continuation: ContinuationMode,
    /// Search frames in parallel with rayon
    pub parallel: bool,
    pub budget: SearchBudget,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            min_path_length: DEFAULT_MIN_PATH_LENGTH,
            continuation: ContinuationMode::default(),
            parallel: false,
            budget: SearchBudget::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> TrackResult<()> {
        if !self.max_distance.is_finite() || self.max_distance <= 0.0 {
            return Err(TrackError::DegenerateConfig(format!(
                "max_distance must be positive and finite, got {}",
                self.max_distance
            )));
        }
        if self.min_path_length == 0 {
            return Err(TrackError::DegenerateConfig(
                "min_path_length must be at least 1".to_string(),
            ));
        }
        if self.budget.max_branching == Some(0) {
            return Err(TrackError::DegenerateConfig(
                "max_branching of 0 would prune every continuation".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for path ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Number of longest paths to keep
    pub max_paths: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_paths: DEFAULT_MAX_RANKED_PATHS,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> TrackResult<()> {
        if self.max_paths == 0 {
            return Err(TrackError::DegenerateConfig(
                "max_paths must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
