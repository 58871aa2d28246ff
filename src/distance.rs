//! Elementary distances between points and graph construction from point clouds.

use anyhow::{bail, Result};
use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::graph::AdjacencyMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
    SquaredEuclidean,
    Manhattan,
    Cosine,
}

impl Metric {
    /// Distance between two points of equal dimension.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        if a.len() != b.len() {
            bail!("dimension mismatch: {} vs {}", a.len(), b.len());
        }
        Ok(match self {
            Metric::Euclidean => euclidean(a, b),
            Metric::SquaredEuclidean => squared_euclidean(a, b),
            Metric::Manhattan => manhattan(a, b),
            Metric::Cosine => cosine(a, b),
        })
    }
}

pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

pub fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// `1 - cos(a, b)`. A zero vector is at distance 1 from everything.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn check_dimensions(points: &[Vec<f64>]) -> Result<()> {
    if let Some(first) = points.first() {
        if let Some((index, point)) = points.iter().find_position(|p| p.len() != first.len()) {
            bail!(
                "point {} has dimension {}, expected {}",
                index,
                point.len(),
                first.len()
            );
        }
    }
    Ok(())
}

/// Link every pair of points closer than `epsilon`.
pub fn epsilon_graph(points: &[Vec<f64>], epsilon: f64, metric: Metric) -> Result<AdjacencyMatrix> {
    check_dimensions(points)?;
    let n = points.len();
    let mut matrix = vec![vec![0u32; n]; n];
    for (i, j) in (0..n).tuple_combinations() {
        if metric.distance(&points[i], &points[j])? < epsilon {
            matrix[i][j] = 1;
            matrix[j][i] = 1;
        }
    }
    Ok(matrix)
}

/// Symmetric k-nearest-neighbor graph: `i` and `j` are linked when either is
/// among the `k` nearest of the other. Ties go to the lower index.
pub fn knn_graph(points: &[Vec<f64>], k: usize, metric: Metric) -> Result<AdjacencyMatrix> {
    check_dimensions(points)?;
    let n = points.len();
    let mut matrix = vec![vec![0u32; n]; n];
    for i in 0..n {
        let mut distances = Vec::with_capacity(n.saturating_sub(1));
        for j in (0..n).filter(|&j| j != i) {
            distances.push((metric.distance(&points[i], &points[j])?, j));
        }
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for &(_, j) in distances.iter().take(k) {
            matrix[i][j] = 1;
            matrix[j][i] = 1;
        }
    }
    Ok(matrix)
}
