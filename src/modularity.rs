use log::warn;

use crate::graph::{UndirectedEdges, VInt};

/// Newman modularity of an arbitrary partition, computed from scratch.
///
/// `Q = sum_c [ L_c / m - (d_c / 2m)^2 ]` where `L_c` counts edges inside
/// community `c` and `d_c` sums its degrees. The matrix is read the same way
/// the greedy detector reads it: degrees are row sums with the diagonal, `L_c`
/// counts upper-triangle edges only. Vertices missing from `communities`
/// count as singletons. Invalid matrices and edgeless graphs score 0.
pub fn modularity(matrix: &[Vec<u32>], communities: &[Vec<VInt>]) -> f64 {
    let Some(edges) = UndirectedEdges::from_matrix(matrix) else {
        return 0.0;
    };
    if edges.degree_sum() == 0 {
        return 0.0;
    }
    let m = edges.edge_count();
    let n = edges.vertex_count();

    // Uncovered vertices get a label of their own past the listed communities.
    let mut labels: Vec<usize> = (0..n).map(|v| communities.len() + v).collect();
    for (label, members) in communities.iter().enumerate() {
        for &vertex in members {
            match labels.get_mut(vertex as usize) {
                Some(slot) => *slot = label,
                None => warn!("Ignoring vertex {} outside 0..{} in partition", vertex, n),
            }
        }
    }

    let mut internal = vec![0u64; communities.len() + n];
    let mut degree = vec![0u64; communities.len() + n];
    for (vertex, d) in edges.degrees().iter().enumerate() {
        degree[labels[vertex]] += d;
    }
    for &(src, dst, multiplicity) in edges.edges() {
        if labels[src as usize] == labels[dst as usize] {
            internal[labels[src as usize]] += multiplicity as u64;
        }
    }

    internal
        .iter()
        .zip(&degree)
        .filter(|(_, d)| **d > 0)
        .map(|(&l, &d)| l as f64 / m - (d as f64 / (2.0 * m)).powi(2))
        .sum()
}
