//! Candidate trajectories produced by the search.

use serde::{Deserialize, Serialize};

use crate::detection::Detection;

/// One step of a path: which detection, in which frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    /// Frame index within the detection sequence
    pub frame: usize,
    /// Index of the detection within its frame
    pub index: usize,
    pub detection: Detection,
}

/// A hypothesised trajectory, one detection per frame.
///
/// Paths are recorded once and never edited afterwards. The search extends a
/// private working buffer and snapshots it into a `Path` only when recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathNode>", into = "Vec<PathNode>")]
pub struct Path {
    nodes: Vec<PathNode>,
}

impl Path {
    /// Snapshot a non-empty working buffer. Returns `None` for an empty one.
    pub fn new(nodes: Vec<PathNode>) -> Option<Self> {
        if nodes.is_empty() {
            None
        } else {
            Some(Self { nodes })
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn first(&self) -> &PathNode {
        &self.nodes[0]
    }

    pub fn last(&self) -> &PathNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn start_frame(&self) -> usize {
        self.first().frame
    }

    pub fn end_frame(&self) -> usize {
        self.last().frame
    }

    pub fn frame_indices(&self) -> Vec<usize> {
        self.nodes.iter().map(|n| n.frame).collect()
    }

    pub fn positions(&self) -> Vec<(f64, f64)> {
        self.nodes.iter().map(|n| n.detection.position()).collect()
    }

    /// Flux of each detection in frame order.
    pub fn fluxes(&self) -> Vec<f64> {
        self.nodes.iter().map(|n| n.detection.flux).collect()
    }

    pub fn peaks(&self) -> Vec<f64> {
        self.nodes.iter().map(|n| n.detection.peak).collect()
    }

    /// Pixel distance between the first and last detection.
    pub fn displacement(&self) -> f64 {
        self.first().detection.distance_to(&self.last().detection)
    }

    /// Largest step between consecutive detections, 0.0 for a single-node path.
    pub fn max_step(&self) -> f64 {
        self.nodes
            .windows(2)
            .map(|w| w[0].detection.distance_to(&w[1].detection))
            .fold(0.0, f64::max)
    }
}

impl TryFrom<Vec<PathNode>> for Path {
    type Error = &'static str;

    fn try_from(nodes: Vec<PathNode>) -> Result<Self, Self::Error> {
        Path::new(nodes).ok_or("path must contain at least one node")
    }
}

impl From<Path> for Vec<PathNode> {
    fn from(path: Path) -> Self {
        path.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn node(frame: usize, x: f64, y: f64, flux: f64) -> PathNode {
        PathNode {
            frame,
            index: 0,
            detection: Detection::new(x, y, flux * 0.1, flux),
        }
    }

    #[test]
    fn test_empty_buffer_is_not_a_path() {
        assert!(Path::new(Vec::new()).is_none());
    }

    #[test]
    fn test_empty_json_path_is_rejected() {
        assert!(serde_json::from_str::<Path>("[]").is_err());
    }

    #[test]
    fn test_summaries_follow_frame_order() {
        let path = Path::new(vec![
            node(2, 0.0, 0.0, 10.0),
            node(3, 1.0, 0.0, 12.0),
            node(4, 3.0, 4.0, 9.0),
        ])
        .unwrap();

        assert_eq!(path.len(), 3);
        assert_eq!(path.start_frame(), 2);
        assert_eq!(path.end_frame(), 4);
        assert_eq!(path.frame_indices(), vec![2, 3, 4]);
        assert_eq!(path.fluxes(), vec![10.0, 12.0, 9.0]);
        assert_relative_eq!(path.displacement(), 5.0);
        assert_relative_eq!(path.max_step(), 20.0_f64.sqrt());
    }
}
