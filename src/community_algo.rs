//! Greedy agglomerative modularity maximization (Clauset, Newman & Moore).
//!
//! Every vertex starts in its own community. The pair of communities whose
//! merge raises modularity the most is merged, the coarsened multigraph is
//! re-keyed, and new candidates are queued for the merged community. The
//! loop stops once no merge has a positive gain, the queue runs dry, or the
//! target community count is reached.
//!
//! Candidates are never removed from the queue when they go stale. A popped
//! candidate whose endpoint has already been merged away is dropped on the
//! spot, which is safe because community IDs are never reused: a candidate
//! whose two endpoints are both still alive always carries an exact gain.
//!
//! Equal gains are resolved by the heap layout, so among several equally good
//! merge sequences the one produced is not canonical.

use std::time::Instant;

use anyhow::Result;
use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::comm_table::{is_valid_partition, CommID, CommStructure, CommTable};
use crate::community::CommGraph;
use crate::config::{DetectConfig, DEFAULT_TARGET_COMMUNITIES};
use crate::graph::UndirectedEdges;
use crate::priority_queue::{HeapKey, MaxHeap};

/// A queued merge of two communities with its gain at insertion time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeCandidate {
    pub left: CommID,
    pub right: CommID,
    pub gain: f64,
}

impl MergeCandidate {
    fn new(a: CommID, b: CommID, gain: f64) -> MergeCandidate {
        // Canonical order of the unordered pair.
        MergeCandidate {
            left: a.min(b),
            right: a.max(b),
            gain,
        }
    }
}

impl HeapKey for MergeCandidate {
    fn key(&self) -> f64 {
        self.gain
    }
}

/// An accepted merge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergeRecord {
    pub left: CommID,
    pub right: CommID,
    pub merged: CommID,
    pub gain: f64,
}

/// One entry of the modularity history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryStep {
    pub score: f64,
    pub communities: CommStructure,
    /// `None` for the initial singleton partition.
    pub merge: Option<MergeRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    pub trajectory: Vec<TrajectoryStep>,
    pub best_step: usize,
    pub best_score: f64,
    pub best_partition: CommStructure,
}

impl DetectionResult {
    /// The result of an invalid input: no communities and no history.
    pub fn empty() -> DetectionResult {
        DetectionResult::default()
    }

    fn from_trajectory(trajectory: Vec<TrajectoryStep>) -> DetectionResult {
        // First occurrence wins ties.
        let mut best_step = 0usize;
        for (index, step) in trajectory.iter().enumerate() {
            if step.score > trajectory[best_step].score {
                best_step = index;
            }
        }
        match trajectory.get(best_step) {
            Some(best) => DetectionResult {
                best_score: best.score,
                best_partition: best.communities.clone(),
                best_step,
                trajectory,
            },
            None => DetectionResult::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trajectory.is_empty()
    }

    pub fn merge_count(&self) -> usize {
        self.trajectory.len().saturating_sub(1)
    }

    pub fn best(&self) -> Option<&TrajectoryStep> {
        self.trajectory.get(self.best_step)
    }

    /// Community index of every vertex under the best partition.
    pub fn best_labels(&self) -> Vec<usize> {
        let vertex_count: usize = self.best_partition.iter().map(Vec::len).sum();
        let mut labels = vec![0usize; vertex_count];
        for (label, members) in self.best_partition.iter().enumerate() {
            for vertex in members {
                labels[*vertex as usize] = label;
            }
        }
        labels
    }
}

/// Greedy modularity community detection.
#[derive(Debug, Clone)]
pub struct GreedyModularity {
    target_communities: usize,
}

impl Default for GreedyModularity {
    fn default() -> Self {
        Self::new()
    }
}

impl GreedyModularity {
    pub fn new() -> GreedyModularity {
        GreedyModularity {
            target_communities: DEFAULT_TARGET_COMMUNITIES,
        }
    }

    pub fn from_config(config: &DetectConfig) -> GreedyModularity {
        GreedyModularity {
            target_communities: config.target_communities,
        }
    }

    /// Stop merging once this many communities remain.
    pub fn with_target_communities(mut self, target: usize) -> Self {
        self.target_communities = target;
        self
    }

    pub fn target_communities(&self) -> usize {
        self.target_communities
    }

    /// Same as [`GreedyModularity::detect`]. The body runs to completion
    /// without yielding.
    pub async fn detect_async(&self, matrix: &[Vec<u32>]) -> Result<DetectionResult> {
        self.detect(matrix)
    }

    /// Run the merge loop over a square adjacency matrix.
    ///
    /// An empty or non-square matrix yields [`DetectionResult::empty`].
    pub fn detect(&self, matrix: &[Vec<u32>]) -> Result<DetectionResult> {
        let started = Instant::now();
        // Init. Degrees and `m` from the matrix.
        let Some(edges) = UndirectedEdges::from_matrix(matrix) else {
            warn!(
                "Rejecting adjacency matrix with {} row(s): empty or not square",
                matrix.len()
            );
            return Ok(DetectionResult::empty());
        };
        let vertex_count = edges.vertex_count();
        let mut comm_table = CommTable::new(edges.degrees());

        let degree_sum = comm_table.degree_sum();
        if degree_sum == 0 {
            info!("Graph with {} vertices has no edges, nothing to merge", vertex_count);
            return Ok(DetectionResult::from_trajectory(vec![TrajectoryStep {
                score: 0.0,
                communities: comm_table.snapshot(),
                merge: None,
            }]));
        }

        // Seed. Every undirected edge is visited once.
        let mut comm_graph = CommGraph::new(vertex_count);
        for &(src, dst, multiplicity) in edges.edges() {
            if let (Some(a), Some(b)) = (comm_table.community_of(src), comm_table.community_of(dst)) {
                if a != b {
                    comm_graph.add_crossing(a, b, multiplicity as u64)?;
                }
            }
        }
        let mut queue = MaxHeap::with_capacity(comm_graph.pair_count());
        for (comm_id, neighbors) in comm_graph.iter_live() {
            for (&neighbor, &crossing) in neighbors.range(comm_id + 1..) {
                queue.insert(MergeCandidate::new(
                    comm_id,
                    neighbor,
                    comm_table.gain(comm_id, neighbor, crossing)?,
                ));
            }
        }

        let two_m = degree_sum as f64;
        let mut score = -comm_table
            .degrees()
            .map(|(_, degree)| (degree as f64 / two_m).powi(2))
            .sum::<f64>();
        let mut trajectory = vec![TrajectoryStep {
            score,
            communities: comm_table.snapshot(),
            merge: None,
        }];
        debug!(
            "Seeded {} candidates over {} vertices, initial modularity {:.6}",
            queue.size(),
            vertex_count,
            score
        );

        // Merge loop.
        let mut stale_count = 0usize;
        while comm_table.live_count() > self.target_communities {
            let Some(candidate) = queue.extract_max() else {
                break;
            };
            if candidate.gain <= 0.0 {
                break;
            }
            if !comm_table.is_live(candidate.left) || !comm_table.is_live(candidate.right) {
                stale_count += 1;
                trace!(
                    "Dropping stale candidate ({}, {})",
                    candidate.left,
                    candidate.right
                );
                continue;
            }

            let merged = comm_table.merge(candidate.left, candidate.right)?;
            score += candidate.gain;
            comm_graph.contract(candidate.left, candidate.right, merged)?;
            if let Some(neighbors) = comm_graph.neighbors(merged) {
                for (&neighbor, &crossing) in neighbors {
                    queue.insert(MergeCandidate::new(
                        merged,
                        neighbor,
                        comm_table.gain(merged, neighbor, crossing)?,
                    ));
                }
            }

            debug!(
                "Merged {} + {} -> {} (gain {:.6}, modularity {:.6}, {} left)",
                candidate.left,
                candidate.right,
                merged,
                candidate.gain,
                score,
                comm_table.live_count()
            );
            let communities = comm_table.snapshot();
            debug_assert!(is_valid_partition(&communities, vertex_count));
            debug_assert_eq!(comm_table.degrees().map(|(_, d)| d).sum::<u64>(), degree_sum);
            trajectory.push(TrajectoryStep {
                score,
                communities,
                merge: Some(MergeRecord {
                    left: candidate.left,
                    right: candidate.right,
                    merged,
                    gain: candidate.gain,
                }),
            });
        }

        let result = DetectionResult::from_trajectory(trajectory);
        info!(
            "Greedy modularity on {} vertices / {} edges: {} merges, {} stale candidates, best modularity {:.6} with {} communities ({:?})",
            vertex_count,
            comm_table.edge_count(),
            result.merge_count(),
            stale_count,
            result.best_score,
            result.best_partition.len(),
            started.elapsed()
        );
        Ok(result)
    }
}
