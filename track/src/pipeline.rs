//! One-call assembly: validate inputs, search, rank.

use serde::{Deserialize, Serialize};

use crate::config::{RankingConfig, SearchConfig};
use crate::detection::DetectionSequence;
use crate::error::{BudgetExceeded, TrackError, TrackResult};
use crate::frames::validate_timestamps;
use crate::ranking::{rank_paths, RankingReport};
use crate::search::{PathSearch, SearchStats};

/// Detection frames with one timestamp (days) per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyInput {
    pub timestamps: Vec<f64>,
    pub frames: DetectionSequence,
}

impl AssemblyInput {
    /// Check that frames and timestamps line up and timestamps increase.
    pub fn validate(&self) -> TrackResult<()> {
        if self.frames.len() != self.timestamps.len() {
            return Err(TrackError::InputShape {
                frames: self.frames.len(),
                timestamps: self.timestamps.len(),
            });
        }
        validate_timestamps(&self.timestamps)
    }
}

/// Ranked paths plus the search bookkeeping that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub report: RankingReport,
    pub stats: SearchStats,
    /// Set when the search stopped on a budget; the report is then partial
    pub exceeded: Option<BudgetExceeded>,
}

impl Assembly {
    pub fn is_partial(&self) -> bool {
        self.exceeded.is_some()
    }
}

/// Run search and ranking over `input`.
///
/// Shape and configuration errors are fatal and reported before any search
/// work. A tripped budget is not an error here; it is carried in
/// [`Assembly::exceeded`].
pub fn assemble(
    input: &AssemblyInput,
    search: &SearchConfig,
    ranking: &RankingConfig,
) -> TrackResult<Assembly> {
    input.validate()?;
    ranking.validate()?;
    let engine = PathSearch::new(search.clone())?;

    let outcome = engine.run(&input.frames);
    let report = rank_paths(outcome.paths, &input.timestamps, ranking)?;

    Ok(Assembly {
        report,
        stats: outcome.stats,
        exceeded: outcome.exceeded,
    })
}
