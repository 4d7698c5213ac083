//! Common utilities for track tests

#![allow(dead_code)]

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use track::{AssemblyInput, Detection, DetectionSequence};

/// A source moving at constant pixel velocity
#[derive(Debug, Clone)]
pub struct MovingSource {
    pub x0: f64,
    pub y0: f64,
    /// Pixels per frame
    pub dx: f64,
    pub dy: f64,
    pub flux: f64,
    /// First and last frame (inclusive) in which the source is detected
    pub frames: (usize, usize),
}

impl MovingSource {
    pub fn new(x0: f64, y0: f64, dx: f64, dy: f64) -> Self {
        Self {
            x0,
            y0,
            dx,
            dy,
            flux: 500.0,
            frames: (0, usize::MAX),
        }
    }

    pub fn during(mut self, first: usize, last: usize) -> Self {
        self.frames = (first, last);
        self
    }

    pub fn position_at(&self, frame: usize) -> (f64, f64) {
        let t = frame as f64;
        (self.x0 + self.dx * t, self.y0 + self.dy * t)
    }

    fn visible_in(&self, frame: usize) -> bool {
        frame >= self.frames.0 && frame <= self.frames.1
    }
}

/// Configuration for synthetic detection sequences
#[derive(Debug, Clone)]
pub struct SyntheticSceneConfig {
    pub frames: usize,
    pub width: f64,
    pub height: f64,
    /// Spurious detections per frame, placed uniformly
    pub noise_per_frame: usize,
    /// Days between frames
    pub cadence_days: f64,
    pub seed: u64,
}

impl Default for SyntheticSceneConfig {
    fn default() -> Self {
        Self {
            frames: 20,
            width: 512.0,
            height: 512.0,
            noise_per_frame: 10,
            cadence_days: 1.0 / 48.0,
            seed: 42,
        }
    }
}

/// Build detections for `sources` plus uniform noise, with timestamps.
pub fn synthetic_input(config: &SyntheticSceneConfig, sources: &[MovingSource]) -> AssemblyInput {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let frames = (0..config.frames)
        .map(|frame| {
            let mut detections: Vec<Detection> = sources
                .iter()
                .filter(|s| s.visible_in(frame))
                .map(|s| {
                    let (x, y) = s.position_at(frame);
                    Detection::new(x, y, s.flux * 0.1, s.flux)
                })
                .collect();
            for _ in 0..config.noise_per_frame {
                let x = rng.gen_range(0.0..config.width);
                let y = rng.gen_range(0.0..config.height);
                let flux = rng.gen_range(50.0..150.0);
                detections.push(Detection::new(x, y, flux * 0.1, flux));
            }
            detections
        })
        .collect();

    AssemblyInput {
        timestamps: (0..config.frames)
            .map(|i| 2_459_000.0 + i as f64 * config.cadence_days)
            .collect(),
        frames: DetectionSequence::from_frames(frames),
    }
}

/// Render a moving Gaussian-ish spot on a flat background for each exposure.
pub fn synthetic_exposures(
    frames: usize,
    shape: (usize, usize),
    source: &MovingSource,
    background: f64,
) -> Vec<Array2<f64>> {
    (0..frames)
        .map(|frame| {
            let (sx, sy) = source.position_at(frame);
            Array2::from_shape_fn(shape, |(row, col)| {
                let r2 = (col as f64 - sx).powi(2) + (row as f64 - sy).powi(2);
                background + source.flux * (-r2 / 2.0).exp()
            })
        })
        .collect()
}

/// Log to the test harness, ignoring repeated initialisation.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
