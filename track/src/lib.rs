//! Multi-frame trajectory assembly for faint moving sources
//!
//! Given candidate point detections from each frame of a time-ordered
//! sequence of differenced images, this crate reconstructs plausible
//! continuous paths of a single object moving across the sequence and ranks
//! them for inspection.
//!
//! # Pipeline
//!
//! 1. **frames**: difference consecutive exposures and run a [`Detector`]
//!    over each difference
//! 2. **search**: exhaustive depth-first branching search from every
//!    detection, gated by pixel proximity between consecutive frames
//! 3. **ranking**: keep the longest paths and derive pixel velocity and flux
//!    series for each
//!
//! The search deliberately over-generates overlapping candidates; picking
//! the physical track out of them is left to downstream filtering.
//!
//! # Example
//!
//! ```
//! use track::{assemble, AssemblyInput, Detection, DetectionSequence, RankingConfig, SearchConfig};
//!
//! let input = AssemblyInput {
//!     timestamps: vec![0.0, 1.0, 2.0],
//!     frames: DetectionSequence::from_frames(vec![
//!         vec![Detection::at(0.0, 0.0)],
//!         vec![Detection::at(1.0, 1.0)],
//!         vec![Detection::at(2.0, 2.0)],
//!     ]),
//! };
//! let search = SearchConfig { min_path_length: 3, ..Default::default() };
//!
//! let assembly = assemble(&input, &search, &RankingConfig::default()).unwrap();
//! assert_eq!(assembly.report.paths.len(), 1);
//! ```

pub mod config;
pub mod detection;
pub mod error;
pub mod frames;
pub mod path;
pub mod pipeline;
pub mod ranking;
pub mod search;

pub use config::{ContinuationMode, RankingConfig, SearchBudget, SearchConfig};
pub use detection::{Detection, DetectionSequence, FrameDetections};
pub use error::{BudgetExceeded, TrackError, TrackResult};
pub use frames::{
    detect_sequence, difference_exposures, difference_timestamps, validate_timestamps, Detector,
};
pub use path::{Path, PathNode};
pub use pipeline::{assemble, Assembly, AssemblyInput};
pub use ranking::{pixel_velocity, rank_paths, PixelVelocity, RankedPath, RankingReport, VelocityEstimate};
pub use search::{PathSearch, SearchOutcome, SearchStats, VisitedMarkers};
