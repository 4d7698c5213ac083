//! Upstream boundary: differencing consecutive exposures and detecting
//! candidate points in each difference.
//!
//! A moving or variable source leaves a residual in the difference of two
//! consecutive exposures while static stars cancel. The actual point finder
//! is supplied by the caller through [`Detector`].

use ndarray::{Array2, ArrayView2};

use crate::detection::{Detection, DetectionSequence, FrameDetections};
use crate::error::{TrackError, TrackResult};

/// Finds candidate point sources in one differenced frame.
///
/// Order of the returned detections carries no meaning.
pub trait Detector {
    fn detect(&self, frame: ArrayView2<f64>) -> Vec<Detection>;
}

impl<F> Detector for F
where
    F: Fn(ArrayView2<f64>) -> Vec<Detection>,
{
    fn detect(&self, frame: ArrayView2<f64>) -> Vec<Detection> {
        self(frame)
    }
}

/// Difference consecutive exposures: frame `i` is `exposure[i + 1] - exposure[i]`.
///
/// All exposures must share one shape. Fewer than two exposures give an
/// empty sequence.
pub fn difference_exposures(exposures: &[Array2<f64>]) -> TrackResult<Vec<Array2<f64>>> {
    let Some(first) = exposures.first() else {
        return Ok(Vec::new());
    };
    let expected = first.dim();
    if let Some((index, exposure)) = exposures
        .iter()
        .enumerate()
        .find(|(_, exposure)| exposure.dim() != expected)
    {
        return Err(TrackError::ExposureShape {
            index,
            expected,
            actual: exposure.dim(),
        });
    }

    Ok(exposures.windows(2).map(|pair| &pair[1] - &pair[0]).collect())
}

/// Timestamps for differenced frames: each frame takes the later exposure's time.
pub fn difference_timestamps(exposure_times: &[f64]) -> Vec<f64> {
    exposure_times.iter().skip(1).copied().collect()
}

/// Check that timestamps increase strictly.
pub fn validate_timestamps(timestamps: &[f64]) -> TrackResult<()> {
    match timestamps
        .windows(2)
        .position(|pair| pair[1].partial_cmp(&pair[0]) != Some(std::cmp::Ordering::Greater))
    {
        Some(i) => Err(TrackError::NonMonotonicTimestamps { index: i + 1 }),
        None => Ok(()),
    }
}

/// Run `detector` over every differenced frame.
pub fn detect_sequence<D: Detector>(detector: &D, frames: &[Array2<f64>]) -> DetectionSequence {
    let detected: Vec<FrameDetections> = frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let detections = detector.detect(frame.view());
            log::debug!("Frame {i}: {} candidate detections", detections.len());
            FrameDetections::new(detections)
        })
        .collect();
    DetectionSequence::new(detected)
}
