//! Greedy agglomerative community detection by modularity maximization.
//!
//! The detector takes a dense symmetric adjacency matrix and returns the full
//! history of merges together with the best-scoring partition. Graph files
//! and point clouds are turned into adjacency matrices by [`graph`] and
//! [`distance`].

pub mod comm_table;
pub mod community;
pub mod community_algo;
pub mod config;
pub mod distance;
pub mod graph;
pub mod logger;
pub mod modularity;
pub mod priority_queue;

pub use comm_table::{is_valid_partition, CommID, CommStructure, CommTable};
pub use community_algo::{DetectionResult, GreedyModularity, MergeRecord, TrajectoryStep};
pub use config::{AppConfig, DetectConfig};
pub use distance::Metric;
pub use graph::{AdjacencyMatrix, GraphSnapshot, VInt};
pub use modularity::modularity;
