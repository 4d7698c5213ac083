//! Candidate point detections and the frame-ordered sequence they form.
//!
//! Detections come from an upstream detector run over differenced images.
//! This module only holds them; nothing here mutates a detection after it
//! has been produced.

use serde::{Deserialize, Serialize};

/// A single candidate point source found in one differenced frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Centroid x-coordinate in pixels
    pub x: f64,
    /// Centroid y-coordinate in pixels
    pub y: f64,
    /// Peak pixel value of the source
    pub peak: f64,
    /// Integrated flux of the source
    pub flux: f64,
}

impl Detection {
    pub fn new(x: f64, y: f64, peak: f64, flux: f64) -> Self {
        Self { x, y, peak, flux }
    }

    /// Detection at a position with zero peak and flux, handy for geometry-only inputs.
    pub fn at(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0, 0.0)
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Euclidean pixel distance to another detection.
    pub fn distance_to(&self, other: &Detection) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// All detections found in one frame. Order within a frame carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameDetections {
    detections: Vec<Detection>,
}

impl FrameDetections {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Detection> {
        self.detections.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    /// Indices and detections lying strictly closer than `max_distance` to `from`.
    pub fn within<'a>(
        &'a self,
        from: &'a Detection,
        max_distance: f64,
    ) -> impl Iterator<Item = (usize, &'a Detection)> + 'a {
        self.detections
            .iter()
            .enumerate()
            .filter(move |(_, candidate)| from.distance_to(candidate) < max_distance)
    }
}

impl From<Vec<Detection>> for FrameDetections {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

/// Time-ordered detection sets, indexed 0..F-1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionSequence {
    frames: Vec<FrameDetections>,
}

impl DetectionSequence {
    pub fn new(frames: Vec<FrameDetections>) -> Self {
        Self { frames }
    }

    /// Build a sequence from plain per-frame detection lists.
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self::new(frames.into_iter().map(FrameDetections::from).collect())
    }

    /// Number of frames (not detections).
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&FrameDetections> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[FrameDetections] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrameDetections> {
        self.frames.iter()
    }

    pub fn total_detections(&self) -> usize {
        self.frames.iter().map(FrameDetections::len).sum()
    }
}

impl From<Vec<Vec<Detection>>> for DetectionSequence {
    fn from(frames: Vec<Vec<Detection>>) -> Self {
        Self::from_frames(frames)
    }
}
