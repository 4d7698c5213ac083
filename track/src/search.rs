//! Exhaustive depth-first trajectory search.
//!
//! Every detection in every frame is used once as the origin of a branching
//! search. From the last detection of the working path, each detection in the
//! next frame that lies strictly inside the proximity gate spawns a branch.
//! A branch is recorded when it reaches the final frame or finds no
//! continuation, provided it spans at least `min_path_length` frames.
//!
//! Branches share one working buffer: a continuation is pushed before
//! descending and popped after, so siblings always start from the same prefix.
//! The buffer is copied into an immutable [`Path`] only when recording.
//!
//! The search is exponential in the worst case. [`SearchBudget`] bounds it;
//! a tripped budget is reported in [`SearchOutcome::exceeded`] and the paths
//! found up to that point are kept.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ContinuationMode, SearchBudget, SearchConfig};
use crate::detection::{Detection, DetectionSequence};
use crate::error::{BudgetExceeded, TrackError, TrackResult};
use crate::path::{Path, PathNode};

/// Elapsed time is only sampled every this many node expansions.
const CLOCK_CHECK_INTERVAL: usize = 1024;

/// Per-frame record of detections already used as a search origin.
///
/// Only written when a top-level search starts; detections reached mid-path
/// are never marked, so they may appear in many overlapping paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitedMarkers {
    frames: Vec<HashSet<usize>>,
}

impl VisitedMarkers {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![HashSet::new(); frame_count],
        }
    }

    pub fn contains(&self, frame: usize, index: usize) -> bool {
        self.frames
            .get(frame)
            .is_some_and(|visited| visited.contains(&index))
    }

    /// Markers recorded for one frame
    pub fn frame(&self, frame: usize) -> Option<&HashSet<usize>> {
        self.frames.get(frame)
    }

    /// Total number of origins searched
    pub fn origin_count(&self) -> usize {
        self.frames.iter().map(HashSet::len).sum()
    }
}

/// Counters describing one search run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub frames: usize,
    pub detections: usize,
    pub origins_searched: usize,
    pub nodes_expanded: usize,
    pub paths_recorded: usize,
    pub elapsed: Duration,
}

/// Result of a search run. Partial when a stopping budget tripped.
///
/// Only finished branches are recorded, those that reached the last frame or
/// a dead end. A branch cut short by a stopping budget is dropped, even when
/// its prefix already spans `min_path_length` frames, since a longer path
/// may have continued it.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Candidate paths in discovery order
    pub paths: Vec<Path>,
    pub stats: SearchStats,
    pub visited: VisitedMarkers,
    /// The first budget that tripped, if any
    pub exceeded: Option<BudgetExceeded>,
}

impl SearchOutcome {
    pub fn is_partial(&self) -> bool {
        self.exceeded.is_some()
    }

    /// Complete paths, or the budget error for a partial run.
    pub fn into_result(self) -> TrackResult<Vec<Path>> {
        match self.exceeded {
            Some(exceeded) => Err(TrackError::ResourceBudgetExceeded(exceeded)),
            None => Ok(self.paths),
        }
    }
}

/// One level of the depth-first search: the detections in `frame` that
/// continue the working path, and the next one to try.
struct Expansion {
    frame: usize,
    candidates: Vec<(usize, Detection)>,
    resume: usize,
}

/// Budget accounting shared by every top-level search of a run.
struct BudgetTracker {
    budget: SearchBudget,
    started: Instant,
    nodes: AtomicUsize,
    paths: AtomicUsize,
    stopped: AtomicBool,
    exceeded: Mutex<Option<BudgetExceeded>>,
}

impl BudgetTracker {
    fn new(budget: SearchBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            nodes: AtomicUsize::new(0),
            paths: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            exceeded: Mutex::new(None),
        }
    }

    fn trip(&self, exceeded: BudgetExceeded) -> ControlFlow<()> {
        let stops = exceeded.stops_search();
        if let Ok(mut slot) = self.exceeded.lock() {
            // A stopping budget outranks an earlier branching notice
            let replace = match slot.as_ref() {
                None => true,
                Some(previous) => stops && !previous.stops_search(),
            };
            if replace {
                log::warn!("Search budget tripped: {exceeded}");
                *slot = Some(exceeded);
            }
        }
        if stops {
            self.stopped.store(true, Ordering::Relaxed);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    fn charge_node(&self) -> ControlFlow<()> {
        if self.is_stopped() {
            return ControlFlow::Break(());
        }
        let expanded = self.nodes.fetch_add(1, Ordering::Relaxed);
        if let Some(limit) = self.budget.max_nodes {
            if expanded >= limit {
                return self.trip(BudgetExceeded::Nodes { limit });
            }
        }
        if let Some(limit) = self.budget.max_duration {
            if expanded % CLOCK_CHECK_INTERVAL == 0 && self.started.elapsed() >= limit {
                return self.trip(BudgetExceeded::Duration { limit });
            }
        }
        ControlFlow::Continue(())
    }

    fn charge_path(&self) -> ControlFlow<()> {
        let recorded = self.paths.fetch_add(1, Ordering::Relaxed);
        match self.budget.max_paths {
            Some(limit) if recorded >= limit => self.trip(BudgetExceeded::Paths { limit }),
            _ => ControlFlow::Continue(()),
        }
    }

    fn nodes_expanded(&self) -> usize {
        let expanded = self.nodes.load(Ordering::Relaxed);
        // Rejected charges still bumped the counter
        match self.budget.max_nodes {
            Some(limit) => expanded.min(limit),
            None => expanded,
        }
    }

    fn into_exceeded(self) -> Option<BudgetExceeded> {
        self.exceeded.into_inner().ok().flatten()
    }
}

/// Trajectory search engine. Each [`PathSearch::run`] owns its own visited
/// markers, so one engine can be reused across sequences.
#[derive(Debug, Clone, Default)]
pub struct PathSearch {
    config: SearchConfig,
}

impl PathSearch {
    pub fn new(config: SearchConfig) -> TrackResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Enumerate every qualifying candidate path in `sequence`.
    pub fn run(&self, sequence: &DetectionSequence) -> SearchOutcome {
        let tracker = BudgetTracker::new(self.config.budget.clone());
        let mut visited = VisitedMarkers::new(sequence.len());

        log::info!(
            "Searching {} frames ({} detections), max_distance={:.2}, min_path_length={}, parallel={}",
            sequence.len(),
            sequence.total_detections(),
            self.config.max_distance,
            self.config.min_path_length,
            self.config.parallel
        );

        // Each task writes only its own frame's markers
        let per_frame: Vec<Vec<Path>> = if self.config.parallel {
            visited
                .frames
                .par_iter_mut()
                .enumerate()
                .map(|(frame, markers)| self.search_frame(sequence, frame, markers, &tracker))
                .collect()
        } else {
            visited
                .frames
                .iter_mut()
                .enumerate()
                .map(|(frame, markers)| self.search_frame(sequence, frame, markers, &tracker))
                .collect()
        };

        let paths: Vec<Path> = per_frame.into_iter().flatten().collect();
        let stats = SearchStats {
            frames: sequence.len(),
            detections: sequence.total_detections(),
            origins_searched: visited.origin_count(),
            nodes_expanded: tracker.nodes_expanded(),
            paths_recorded: paths.len(),
            elapsed: tracker.started.elapsed(),
        };
        let exceeded = tracker.into_exceeded();

        log::info!(
            "Search finished: {} origins, {} nodes, {} paths in {:.3}s{}",
            stats.origins_searched,
            stats.nodes_expanded,
            stats.paths_recorded,
            stats.elapsed.as_secs_f64(),
            if exceeded.is_some() { " (partial)" } else { "" }
        );

        SearchOutcome {
            paths,
            stats,
            visited,
            exceeded,
        }
    }

    /// Run a top-level search from every unvisited detection of one frame.
    fn search_frame(
        &self,
        sequence: &DetectionSequence,
        frame: usize,
        markers: &mut HashSet<usize>,
        tracker: &BudgetTracker,
    ) -> Vec<Path> {
        let mut paths = Vec::new();
        let Some(detections) = sequence.frame(frame) else {
            return paths;
        };

        let cursor = match self.config.continuation {
            ContinuationMode::RelativeToOrigin => frame,
            ContinuationMode::FromSequenceStart => 0,
        };

        let mut working = Vec::with_capacity(sequence.len());
        for (index, detection) in detections.iter().enumerate() {
            if tracker.is_stopped() {
                break;
            }
            if !markers.insert(index) {
                continue;
            }

            working.clear();
            working.push(PathNode {
                frame,
                index,
                detection: *detection,
            });
            let flow = self.extend(sequence, cursor, &mut working, &mut paths, tracker);
            if flow.is_break() {
                break;
            }
        }

        log::debug!(
            "Frame {frame}: {} origins, {} paths",
            markers.len(),
            paths.len()
        );
        paths
    }

    /// Grow `working` from the frame after `cursor`, recording finished branches.
    ///
    /// Depth-first with an explicit stack of [`Expansion`]s, one per frame
    /// below the origin, so path length is bounded by the heap rather than
    /// the thread stack. Each descent pushes onto `working` and each return
    /// pops, keeping sibling branches on the same prefix.
    fn extend(
        &self,
        sequence: &DetectionSequence,
        cursor: usize,
        working: &mut Vec<PathNode>,
        paths: &mut Vec<Path>,
        tracker: &BudgetTracker,
    ) -> ControlFlow<()> {
        let mut stack: Vec<Expansion> = Vec::new();
        if let Some(root) = self.enter(sequence, cursor, working, paths, tracker)? {
            stack.push(root);
        }

        while let Some(level) = stack.last_mut() {
            let candidate = level.candidates.get(level.resume).copied();
            let capped = self
                .config
                .budget
                .max_branching
                .filter(|&limit| level.resume == limit);

            let Some((index, detection)) = candidate.filter(|_| capped.is_none()) else {
                if let (Some(limit), Some(_)) = (capped, candidate) {
                    tracker.trip(BudgetExceeded::Branching {
                        limit,
                        frame: level.frame,
                    })?;
                }
                stack.pop();
                // The root level was entered from the origin, which the caller owns
                if !stack.is_empty() {
                    working.pop();
                }
                continue;
            };

            let frame = level.frame;
            level.resume += 1;
            working.push(PathNode {
                frame,
                index,
                detection,
            });
            match self.enter(sequence, frame, working, paths, tracker)? {
                Some(child) => stack.push(child),
                None => {
                    working.pop();
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Expand the working path's tip. Records the path and returns `None` at
    /// the last frame or a dead end; otherwise returns the continuations.
    fn enter(
        &self,
        sequence: &DetectionSequence,
        cursor: usize,
        working: &[PathNode],
        paths: &mut Vec<Path>,
        tracker: &BudgetTracker,
    ) -> ControlFlow<(), Option<Expansion>> {
        tracker.charge_node()?;

        let next_frame = cursor + 1;
        let (Some(next), Some(last)) = (sequence.frame(next_frame), working.last()) else {
            self.record(working, paths, tracker)?;
            return ControlFlow::Continue(None);
        };

        let candidates: Vec<(usize, Detection)> = next
            .within(&last.detection, self.config.max_distance)
            .map(|(index, detection)| (index, *detection))
            .collect();
        if candidates.is_empty() {
            self.record(working, paths, tracker)?;
            return ControlFlow::Continue(None);
        }

        ControlFlow::Continue(Some(Expansion {
            frame: next_frame,
            candidates,
            resume: 0,
        }))
    }

    fn record(
        &self,
        working: &[PathNode],
        paths: &mut Vec<Path>,
        tracker: &BudgetTracker,
    ) -> ControlFlow<()> {
        if working.len() < self.config.min_path_length {
            return ControlFlow::Continue(());
        }
        tracker.charge_path()?;
        if let Some(path) = Path::new(working.to_vec()) {
            paths.push(path);
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_distance: f64, min_path_length: usize) -> SearchConfig {
        SearchConfig {
            max_distance,
            min_path_length,
            ..Default::default()
        }
    }

    fn run(frames: Vec<Vec<Detection>>, config: SearchConfig) -> SearchOutcome {
        PathSearch::new(config)
            .unwrap()
            .run(&DetectionSequence::from_frames(frames))
    }

    #[test]
    fn test_single_diagonal_track() {
        let outcome = run(
            vec![
                vec![Detection::at(0.0, 0.0)],
                vec![Detection::at(1.0, 1.0)],
                vec![Detection::at(2.0, 2.0)],
            ],
            config(5.0, 3),
        );

        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].len(), 3);
        assert_eq!(outcome.paths[0].frame_indices(), vec![0, 1, 2]);
        assert!(!outcome.is_partial());
    }

    #[test]
    fn test_dead_end_records_only_long_enough_prefix() {
        let frames = vec![
            vec![Detection::at(0.0, 0.0)],
            vec![Detection::at(1.0, 0.0)],
            vec![Detection::at(50.0, 50.0)],
        ];

        let kept = run(frames.clone(), config(5.0, 2));
        // Origin 0 dies after two frames; the far detection is its own length-1 origin
        let lengths: Vec<usize> = kept.paths.iter().map(Path::len).collect();
        assert_eq!(lengths, vec![2]);
        assert_eq!(kept.paths[0].end_frame(), 1);

        let dropped = run(frames, config(5.0, 3));
        assert!(dropped.paths.is_empty());
    }

    #[test]
    fn test_two_continuations_share_prefix() {
        let outcome = run(
            vec![
                vec![Detection::at(0.0, 0.0)],
                vec![Detection::at(1.0, 0.0)],
                vec![Detection::at(2.0, 1.0), Detection::at(2.0, -1.0)],
            ],
            config(5.0, 3),
        );

        assert_eq!(outcome.paths.len(), 2);
        let (a, b) = (&outcome.paths[0], &outcome.paths[1]);
        assert_eq!(a.nodes()[..2], b.nodes()[..2]);
        assert_eq!(a.last().index, 0);
        assert_eq!(b.last().index, 1);
    }

    #[test]
    fn test_min_length_above_frame_count_yields_nothing() {
        let outcome = run(
            vec![vec![Detection::at(0.0, 0.0)], vec![Detection::at(1.0, 0.0)]],
            config(5.0, 3),
        );
        assert!(outcome.paths.is_empty());
        assert_eq!(outcome.stats.origins_searched, 2);
    }

    #[test]
    fn test_every_detection_is_an_origin_exactly_once() {
        let outcome = run(
            vec![
                vec![Detection::at(0.0, 0.0), Detection::at(20.0, 0.0)],
                vec![],
                vec![Detection::at(1.0, 0.0)],
            ],
            config(5.0, 1),
        );

        assert_eq!(outcome.visited.origin_count(), 3);
        assert!(outcome.visited.contains(0, 0));
        assert!(outcome.visited.contains(0, 1));
        assert!(outcome.visited.contains(2, 0));
        assert!(!outcome.visited.contains(1, 0));
        assert!(outcome.visited.frame(1).unwrap().is_empty());
    }

    #[test]
    fn test_empty_sequence() {
        let outcome = run(Vec::new(), SearchConfig::default());
        assert!(outcome.paths.is_empty());
        assert_eq!(outcome.stats.frames, 0);
        assert!(outcome.into_result().unwrap().is_empty());
    }

    #[test]
    fn test_origin_relative_continuation() {
        // Track lives in frames 2..4; frame 1 holds an unrelated nearby point
        let frames = vec![
            vec![Detection::at(100.0, 100.0)],
            vec![Detection::at(0.5, 0.0)],
            vec![Detection::at(0.0, 0.0)],
            vec![Detection::at(1.0, 0.0)],
            vec![Detection::at(2.0, 0.0)],
        ];

        let relative = run(frames.clone(), config(5.0, 3));
        assert_eq!(relative.paths.len(), 2);
        let from_frame_two = relative
            .paths
            .iter()
            .find(|p| p.start_frame() == 2)
            .unwrap();
        assert_eq!(from_frame_two.frame_indices(), vec![2, 3, 4]);

        let legacy = run(
            frames,
            SearchConfig {
                continuation: ContinuationMode::FromSequenceStart,
                ..config(5.0, 3)
            },
        );
        // Frame-2 origin jumps back to frame 1, then on through 2, 3 and 4
        let from_frame_two = legacy
            .paths
            .iter()
            .find(|p| p.start_frame() == 2)
            .unwrap();
        assert_eq!(from_frame_two.frame_indices(), vec![2, 1, 2, 3, 4]);
    }

    #[test]
    fn test_branching_cap_flags_but_completes() {
        let outcome = run(
            vec![
                vec![Detection::at(0.0, 0.0)],
                vec![
                    Detection::at(1.0, 0.0),
                    Detection::at(0.0, 1.0),
                    Detection::at(-1.0, 0.0),
                ],
            ],
            SearchConfig {
                budget: SearchBudget {
                    max_branching: Some(2),
                    ..Default::default()
                },
                ..config(5.0, 2)
            },
        );

        assert_eq!(outcome.paths.len(), 2);
        assert_eq!(
            outcome.exceeded,
            Some(BudgetExceeded::Branching { limit: 2, frame: 1 })
        );
        // The three frame-1 origins were still searched
        assert_eq!(outcome.stats.origins_searched, 4);
    }

    #[test]
    fn test_path_budget_keeps_what_was_found() {
        let frames = vec![
            vec![Detection::at(0.0, 0.0)],
            vec![
                Detection::at(1.0, 0.0),
                Detection::at(0.0, 1.0),
                Detection::at(-1.0, 0.0),
            ],
        ];

        let outcome = run(
            frames,
            SearchConfig {
                budget: SearchBudget {
                    max_paths: Some(2),
                    ..Default::default()
                },
                ..config(5.0, 2)
            },
        );

        assert_eq!(outcome.paths.len(), 2);
        assert_eq!(outcome.exceeded, Some(BudgetExceeded::Paths { limit: 2 }));
        assert!(matches!(
            outcome.into_result(),
            Err(TrackError::ResourceBudgetExceeded(BudgetExceeded::Paths { limit: 2 }))
        ));
    }

    #[test]
    fn test_node_budget_stops_search() {
        let frames: Vec<Vec<Detection>> = (0..20)
            .map(|i| vec![Detection::at(i as f64, 0.0)])
            .collect();

        let outcome = run(
            frames,
            SearchConfig {
                budget: SearchBudget {
                    max_nodes: Some(5),
                    ..Default::default()
                },
                ..config(5.0, 2)
            },
        );

        assert!(outcome.paths.is_empty());
        assert_eq!(outcome.exceeded, Some(BudgetExceeded::Nodes { limit: 5 }));
        assert_eq!(outcome.stats.nodes_expanded, 5);
        assert_eq!(outcome.stats.origins_searched, 1);
    }

    #[test]
    fn test_duration_budget_stops_search() {
        let frames: Vec<Vec<Detection>> = (0..50)
            .map(|i| vec![Detection::at(i as f64, 0.0)])
            .collect();

        let outcome = run(
            frames.clone(),
            SearchConfig {
                budget: SearchBudget {
                    max_duration: Some(Duration::ZERO),
                    ..Default::default()
                },
                ..config(5.0, 2)
            },
        );

        assert!(outcome.is_partial());
        assert!(outcome.paths.is_empty());
        assert_eq!(
            outcome.exceeded,
            Some(BudgetExceeded::Duration {
                limit: Duration::ZERO
            })
        );

        // With both set, whichever limit is reached first is reported
        let nodes_first = run(
            frames.clone(),
            SearchConfig {
                budget: SearchBudget {
                    max_nodes: Some(5),
                    max_duration: Some(Duration::from_secs(3600)),
                    ..Default::default()
                },
                ..config(5.0, 2)
            },
        );
        assert_eq!(nodes_first.exceeded, Some(BudgetExceeded::Nodes { limit: 5 }));
        assert_eq!(nodes_first.stats.nodes_expanded, 5);

        let clock_first = run(
            frames,
            SearchConfig {
                budget: SearchBudget {
                    max_nodes: Some(5),
                    max_duration: Some(Duration::ZERO),
                    ..Default::default()
                },
                ..config(5.0, 2)
            },
        );
        assert!(matches!(
            clock_first.exceeded,
            Some(BudgetExceeded::Duration { .. })
        ));
        assert!(clock_first.into_result().is_err());
    }

    #[test]
    fn test_long_track_does_not_exhaust_stack() {
        let frames: Vec<Vec<Detection>> = (0..20_000)
            .map(|i| vec![Detection::at(i as f64 * 0.5, 0.0)])
            .collect();
        let budget = SearchBudget {
            max_paths: Some(1),
            ..Default::default()
        };

        let outcome = run(
            frames.clone(),
            SearchConfig {
                budget: budget.clone(),
                ..Default::default()
            },
        );
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].len(), 20_000);
        assert_eq!(outcome.paths[0].start_frame(), 0);
        assert_eq!(outcome.exceeded, Some(BudgetExceeded::Paths { limit: 1 }));

        // Rayon workers run with small stacks too
        let parallel = run(
            frames,
            SearchConfig {
                parallel: true,
                budget,
                ..Default::default()
            },
        );
        assert_eq!(parallel.paths.len(), 1);
        assert_eq!(parallel.paths[0].end_frame(), 19_999);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let frames: Vec<Vec<Detection>> = (0..8)
            .map(|i| {
                let x = i as f64;
                vec![
                    Detection::at(x, 0.0),
                    Detection::at(x, 2.0),
                    Detection::at(50.0 + x, 50.0),
                ]
            })
            .collect();

        let sequential = run(frames.clone(), config(3.0, 4));
        let parallel = run(
            frames,
            SearchConfig {
                parallel: true,
                ..config(3.0, 4)
            },
        );

        assert!(!sequential.paths.is_empty());
        assert_eq!(sequential.paths, parallel.paths);
        assert_eq!(sequential.visited, parallel.visited);
    }
}
