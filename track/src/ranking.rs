//! Ranking and kinematic summaries of candidate paths.
//!
//! The search over-generates heavily overlapping candidates. Ranking keeps
//! the longest `max_paths` of them (stable, so equal lengths stay in
//! discovery order) and annotates each with its apparent pixel velocity and
//! flux series for later inspection.

use serde::{Deserialize, Serialize};

use crate::config::RankingConfig;
use crate::error::{TrackError, TrackResult};
use crate::path::Path;

/// Apparent motion of a path across the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelVelocity {
    /// x-component in pixels per day
    pub vx: f64,
    /// y-component in pixels per day
    pub vy: f64,
    /// Magnitude in pixels per day
    pub speed: f64,
    /// Pixel distance between first and last detection
    pub displacement: f64,
    /// Days between first and last detection
    pub elapsed_days: f64,
}

/// Velocity of a ranked path, or why it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VelocityEstimate {
    Defined(PixelVelocity),
    Undefined { reason: String },
}

impl VelocityEstimate {
    pub fn defined(&self) -> Option<&PixelVelocity> {
        match self {
            VelocityEstimate::Defined(velocity) => Some(velocity),
            VelocityEstimate::Undefined { .. } => None,
        }
    }
}

/// A path annotated for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPath {
    /// Zero-based position in the ranking
    pub rank: usize,
    pub length: usize,
    pub velocity: VelocityEstimate,
    /// Flux of each detection in frame order
    pub fluxes: Vec<f64>,
    /// Timestamp of each detection's frame
    pub times: Vec<f64>,
    pub path: Path,
}

/// Ranked output of one assembly run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingReport {
    /// Candidate paths handed to ranking
    pub candidates: usize,
    /// Ranked paths whose velocity is undefined
    pub undefined_velocity: usize,
    pub paths: Vec<RankedPath>,
}

/// Pixel velocity of a path using the timestamps of its own first and last frame.
///
/// Fails with [`TrackError::DegenerateVelocity`] for single-detection paths or
/// when no time elapses, rather than producing infinity or NaN.
pub fn pixel_velocity(path: &Path, timestamps: &[f64]) -> TrackResult<PixelVelocity> {
    let start = frame_time(timestamps, path.start_frame())?;
    let end = frame_time(timestamps, path.end_frame())?;
    let elapsed_days = end - start;

    if path.len() < 2 || elapsed_days.is_nan() || elapsed_days <= 0.0 {
        return Err(TrackError::DegenerateVelocity {
            path_length: path.len(),
            elapsed_days,
        });
    }

    let first = path.first().detection;
    let last = path.last().detection;
    let vx = (last.x - first.x) / elapsed_days;
    let vy = (last.y - first.y) / elapsed_days;

    Ok(PixelVelocity {
        vx,
        vy,
        speed: vx.hypot(vy),
        displacement: path.displacement(),
        elapsed_days,
    })
}

fn frame_time(timestamps: &[f64], frame: usize) -> TrackResult<f64> {
    timestamps
        .get(frame)
        .copied()
        .ok_or(TrackError::InputShape {
            frames: frame + 1,
            timestamps: timestamps.len(),
        })
}

/// Sort by length (longest first), keep `config.max_paths`, and annotate.
///
/// Paths with undefined velocity stay in the ranking with
/// [`VelocityEstimate::Undefined`]; only a path referencing a frame with no
/// timestamp aborts the pass.
pub fn rank_paths(
    mut paths: Vec<Path>,
    timestamps: &[f64],
    config: &RankingConfig,
) -> TrackResult<RankingReport> {
    config.validate()?;
    let candidates = paths.len();

    paths.sort_by_key(|path| std::cmp::Reverse(path.len()));
    paths.truncate(config.max_paths);

    let mut undefined_velocity = 0;
    let mut ranked = Vec::with_capacity(paths.len());
    for (rank, path) in paths.into_iter().enumerate() {
        let velocity = match pixel_velocity(&path, timestamps) {
            Ok(velocity) => VelocityEstimate::Defined(velocity),
            Err(err @ TrackError::DegenerateVelocity { .. }) => {
                log::warn!("Path {rank} has no defined velocity: {err}");
                undefined_velocity += 1;
                VelocityEstimate::Undefined {
                    reason: err.to_string(),
                }
            }
            Err(err) => return Err(err),
        };

        let times = path
            .frame_indices()
            .into_iter()
            .map(|frame| frame_time(timestamps, frame))
            .collect::<TrackResult<Vec<f64>>>()?;

        ranked.push(RankedPath {
            rank,
            length: path.len(),
            velocity,
            fluxes: path.fluxes(),
            times,
            path,
        });
    }

    if let Some(best) = ranked.first() {
        log::info!(
            "Ranked {} of {} candidates, longest spans {} frames",
            ranked.len(),
            candidates,
            best.length
        );
    }

    Ok(RankingReport {
        candidates,
        undefined_velocity,
        paths: ranked,
    })
}
