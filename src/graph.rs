use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use rand::Rng;

use crate::comm_table::CommStructure;
use crate::config::READ_BUFFER_SIZE;

pub type VInt = u32;

/// Dense `n x n` matrix of edge multiplicities, zero means no edge.
pub type AdjacencyMatrix = Vec<Vec<u32>>;

// Graph Snapshot without timestamp, used to feed community detection.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub(crate) adj_map: BTreeMap<VInt, Vec<VInt>>,
    pub(crate) v_size: u32,
    pub(crate) e_size: u32,
}

impl GraphSnapshot {
    pub fn vertex_count(&self) -> usize {
        self.v_size as usize
    }

    /// Number of undirected edges, parallel edges counted separately.
    pub fn edge_count(&self) -> usize {
        self.e_size as usize
    }

    pub fn get_neighbor(&self, vertex_id: &VInt) -> &[VInt] {
        self.adj_map
            .get(vertex_id)
            .map(|neighbors| neighbors.as_slice())
            .unwrap_or(&[])
    }

    /// Build an undirected multigraph on vertices `0..vertex_count`.
    ///
    /// Self-loops are skipped, they never cross between communities.
    pub fn from_edge_list(vertex_count: usize, edge_list: &[(VInt, VInt)]) -> Result<Self> {
        let mut adj_map = BTreeMap::<VInt, Vec<VInt>>::new();
        for vertex in 0..vertex_count as VInt {
            adj_map.insert(vertex, vec![]);
        }
        let mut e_size = 0u32;
        let mut self_loops = 0usize;
        for &(src, dst) in edge_list {
            if src as usize >= vertex_count || dst as usize >= vertex_count {
                bail!(
                    "edge ({}, {}) references a vertex outside 0..{}",
                    src,
                    dst,
                    vertex_count
                );
            }
            if src == dst {
                self_loops += 1;
                continue;
            }
            adj_map.entry(src).or_default().push(dst);
            adj_map.entry(dst).or_default().push(src);
            e_size += 1;
        }
        if self_loops > 0 {
            warn!("Skipped {} self-loop(s) while building the graph", self_loops);
        }
        Ok(GraphSnapshot {
            adj_map,
            v_size: vertex_count as u32,
            e_size,
        })
    }

    /// Load a graph from a `.graph` file, with optional ground-truth communities.
    ///
    /// The first line is a header and is skipped. Vertices are declared as
    /// `v <id> <label> [<community>]`, edges as `e <src> <dst>`. Vertex IDs are
    /// renumbered densely in declaration order. Communities are returned only
    /// when every vertex line carries one.
    pub fn from_graph_file(file_path: impl AsRef<Path>) -> Result<(Self, Option<CommStructure>)> {
        let file_path = file_path.as_ref();
        let graph_file = File::open(file_path)
            .with_context(|| format!("failed to open graph file {}", file_path.display()))?;
        let graph_reader = BufReader::with_capacity(READ_BUFFER_SIZE, graph_file);

        let mut dense_ids = BTreeMap::<u64, VInt>::new();
        let mut community_info = Vec::<Option<u64>>::new();
        let mut raw_edges = Vec::<(u64, u64, usize)>::new();

        for (line_index, line) in graph_reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", file_path.display()))?;
            let line_no = line_index + 1;
            if line_no == 1 {
                // The first line, just skip it.
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.first() {
                Some(&"v") => {
                    // Process Vertices.
                    if tokens.len() < 3 {
                        bail!("line {}: vertex line needs `v <id> <label>`", line_no);
                    }
                    let parsed_vid = parse_id(tokens[1], line_no)?;
                    if dense_ids.contains_key(&parsed_vid) {
                        bail!("line {}: vertex {} declared twice", line_no, parsed_vid);
                    }
                    dense_ids.insert(parsed_vid, dense_ids.len() as VInt);
                    let parsed_comm = match tokens.get(3) {
                        Some(token) => Some(parse_id(token, line_no)?),
                        None => None,
                    };
                    community_info.push(parsed_comm);
                }
                Some(&"e") => {
                    // Process Edges.
                    if tokens.len() < 3 {
                        bail!("line {}: edge line needs `e <src> <dst>`", line_no);
                    }
                    let src = parse_id(tokens[1], line_no)?;
                    let dst = parse_id(tokens[2], line_no)?;
                    raw_edges.push((src, dst, line_no));
                }
                _ => {}
            }
        }

        let mut edge_list = Vec::with_capacity(raw_edges.len());
        for (src, dst, line_no) in raw_edges {
            let lookup = |vid: u64| {
                dense_ids
                    .get(&vid)
                    .copied()
                    .ok_or_else(|| anyhow!("line {}: edge references undeclared vertex {}", line_no, vid))
            };
            edge_list.push((lookup(src)?, lookup(dst)?));
        }
        let graph = Self::from_edge_list(dense_ids.len(), &edge_list)?;

        // Process the community info.
        let communities = if !community_info.is_empty() && community_info.iter().all(Option::is_some) {
            let mut grouped = BTreeMap::<u64, Vec<VInt>>::new();
            for (vertex, comm) in community_info.iter().enumerate() {
                if let Some(comm) = comm {
                    grouped.entry(*comm).or_default().push(vertex as VInt);
                }
            }
            Some(grouped.into_values().collect())
        } else {
            None
        };

        info!(
            "Loaded {}: {} vertices, {} edges",
            file_path.display(),
            graph.v_size,
            graph.e_size
        );
        Ok((graph, communities))
    }

    /// Load a whitespace separated `src dst` edge list. Lines starting with
    /// `#` or `%` are comments. The vertex count is the largest ID plus one.
    pub fn from_edge_list_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let graph_file = File::open(file_path)
            .with_context(|| format!("failed to open edge list {}", file_path.display()))?;
        let graph_reader = BufReader::with_capacity(READ_BUFFER_SIZE, graph_file);

        let mut edge_list = Vec::new();
        let mut vertex_count = 0usize;
        for (line_index, line) in graph_reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", file_path.display()))?;
            let line_no = line_index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
                continue;
            }
            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            if tokens.len() < 2 {
                bail!("line {}: expected `<src> <dst>`", line_no);
            }
            let src = parse_vertex(tokens[0], line_no)?;
            let dst = parse_vertex(tokens[1], line_no)?;
            vertex_count = vertex_count.max(src as usize + 1).max(dst as usize + 1);
            edge_list.push((src, dst));
        }
        let graph = Self::from_edge_list(vertex_count, &edge_list)?;
        info!(
            "Loaded {}: {} vertices, {} edges",
            file_path.display(),
            graph.v_size,
            graph.e_size
        );
        Ok(graph)
    }

    /// Generate a planted-partition random graph.
    ///
    /// `groups` blocks of `group_size` consecutive vertices. Each pair inside a
    /// block is linked with probability `p_in`, each pair across blocks with
    /// `p_out`. Returns the graph and its planted blocks.
    pub fn planted_partition<R: Rng + ?Sized>(
        groups: usize,
        group_size: usize,
        p_in: f64,
        p_out: f64,
        rng: &mut R,
    ) -> Result<(Self, CommStructure)> {
        if !(0.0..=1.0).contains(&p_in) || !(0.0..=1.0).contains(&p_out) {
            bail!("edge probabilities must lie in [0, 1], got p_in={} p_out={}", p_in, p_out);
        }
        let vertex_count = groups * group_size;
        let mut edge_list = Vec::new();
        for src in 0..vertex_count {
            for dst in src + 1..vertex_count {
                let p = if src / group_size == dst / group_size { p_in } else { p_out };
                if rng.gen_bool(p) {
                    edge_list.push((src as VInt, dst as VInt));
                }
            }
        }
        let planted = (0..groups)
            .map(|g| ((g * group_size) as VInt..((g + 1) * group_size) as VInt).collect())
            .collect();
        Ok((Self::from_edge_list(vertex_count, &edge_list)?, planted))
    }

    /// Dense adjacency matrix of edge multiplicities.
    pub fn to_adjacency_matrix(&self) -> AdjacencyMatrix {
        let n = self.v_size as usize;
        let mut matrix = vec![vec![0u32; n]; n];
        for (vertex, neighbors) in &self.adj_map {
            for neighbor in neighbors {
                matrix[*vertex as usize][*neighbor as usize] += 1;
            }
        }
        matrix
    }
}

fn parse_id(token: &str, line_no: usize) -> Result<u64> {
    token
        .parse::<u64>()
        .with_context(|| format!("line {}: `{}` is not a vertex id", line_no, token))
}

fn parse_vertex(token: &str, line_no: usize) -> Result<VInt> {
    token
        .parse::<VInt>()
        .with_context(|| format!("line {}: `{}` is not a vertex id", line_no, token))
}

/// Undirected view over an adjacency matrix: the upper triangle is the
/// authoritative edge set. A vertex's degree is its row sum, diagonal
/// included, so self-loops weigh on `m` but never link two communities.
#[derive(Debug, Clone, PartialEq)]
pub struct UndirectedEdges {
    pub(crate) edges: Vec<(VInt, VInt, u32)>, // (i, j, multiplicity) with i < j.
    pub(crate) degrees: Vec<u64>,
}

impl UndirectedEdges {
    /// `None` when the matrix is empty or not square.
    ///
    /// If the matrix is not symmetric, the upper triangle wins for the
    /// off-diagonal entries.
    pub fn from_matrix(matrix: &[Vec<u32>]) -> Option<UndirectedEdges> {
        let n = matrix.len();
        if n == 0 || matrix.iter().any(|row| row.len() != n) {
            return None;
        }
        let mut edges = Vec::new();
        let mut degrees = vec![0u64; n];
        let mut self_loops = 0usize;
        let mut asymmetric = 0usize;
        for (i, row) in matrix.iter().enumerate() {
            if row[i] != 0 {
                self_loops += 1;
                degrees[i] += row[i] as u64;
            }
            for (j, &multiplicity) in row.iter().enumerate().skip(i + 1) {
                if multiplicity != matrix[j][i] {
                    asymmetric += 1;
                }
                if multiplicity == 0 {
                    continue;
                }
                edges.push((i as VInt, j as VInt, multiplicity));
                degrees[i] += multiplicity as u64;
                degrees[j] += multiplicity as u64;
            }
        }
        if self_loops > 0 {
            debug!("{} vertex(es) carry a self-loop, counted in their degree only", self_loops);
        }
        if asymmetric > 0 {
            warn!(
                "Adjacency matrix is not symmetric ({} pair(s)), using the upper triangle",
                asymmetric
            );
        }
        Some(UndirectedEdges { edges, degrees })
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.degrees.len()
    }

    pub fn degree_sum(&self) -> u64 {
        self.degrees.iter().sum()
    }

    /// `m`, half the degree sum. Odd diagonal entries make it half-integral.
    pub fn edge_count(&self) -> f64 {
        self.degree_sum() as f64 / 2.0
    }

    pub fn degrees(&self) -> &[u64] {
        &self.degrees
    }

    pub fn edges(&self) -> &[(VInt, VInt, u32)] {
        &self.edges
    }
}

#[cfg(test)]
mod test_graph {
    use std::io::Write;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::NamedTempFile;

    use super::{GraphSnapshot, UndirectedEdges};

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_from_edge_list() {
        let graph = GraphSnapshot::from_edge_list(4, &[(0, 1), (1, 2), (1, 2), (3, 3)]).unwrap();
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.get_neighbor(&1), &[0, 2, 2]);
        assert!(graph.get_neighbor(&3).is_empty());

        let matrix = graph.to_adjacency_matrix();
        assert_eq!(matrix[1][2], 2);
        assert_eq!(matrix[2][1], 2);
        assert_eq!(matrix[3][3], 0);
    }

    #[test]
    fn test_from_edge_list_out_of_range() {
        assert!(GraphSnapshot::from_edge_list(2, &[(0, 2)]).is_err());
    }

    #[test]
    fn test_read_graph_file() {
        let file = write_temp(
            "t 1 6\nv 10 0 1\nv 11 0 1\nv 12 0 1\nv 20 0 2\nv 21 0 2\nv 22 0 2\n\
             e 10 11\ne 11 12\ne 10 12\ne 20 21\ne 21 22\ne 20 22\n",
        );
        let (graph, communities) = GraphSnapshot::from_graph_file(file.path()).unwrap();
        assert_eq!(graph.vertex_count(), 6);
        assert_eq!(graph.edge_count(), 6);
        assert_eq!(graph.get_neighbor(&0), &[1, 2]);
        assert_eq!(communities, Some(vec![vec![0, 1, 2], vec![3, 4, 5]]));
    }

    #[test]
    fn test_read_graph_file_without_communities() {
        let file = write_temp("t 1 2\nv 0 0\nv 1 0\ne 0 1\n");
        let (graph, communities) = GraphSnapshot::from_graph_file(file.path()).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert!(communities.is_none());
    }

    #[test]
    fn test_read_graph_file_errors() {
        let undeclared = write_temp("t 1 1\nv 0 0\ne 0 5\n");
        let err = GraphSnapshot::from_graph_file(undeclared.path()).unwrap_err();
        assert!(err.to_string().contains("undeclared vertex 5"));

        let garbage = write_temp("t\nv x 0\n");
        assert!(GraphSnapshot::from_graph_file(garbage.path()).is_err());

        assert!(GraphSnapshot::from_graph_file("/definitely/not/here.graph").is_err());
    }

    #[test]
    fn test_read_edge_list_file() {
        let file = write_temp("# comment\n0 1\n1 2\n\n% other comment\n4 2\n");
        let graph = GraphSnapshot::from_edge_list_file(file.path()).unwrap();
        assert_eq!(graph.vertex_count(), 5);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.get_neighbor(&3).is_empty());
    }

    #[test]
    fn test_planted_partition() {
        let mut rng = StdRng::seed_from_u64(3);
        let (graph, planted) = GraphSnapshot::planted_partition(3, 4, 1.0, 0.0, &mut rng).unwrap();
        assert_eq!(graph.vertex_count(), 12);
        // Three disjoint 4-cliques.
        assert_eq!(graph.edge_count(), 18);
        assert_eq!(planted[1], vec![4, 5, 6, 7]);
        assert!(GraphSnapshot::planted_partition(2, 2, 1.5, 0.0, &mut rng).is_err());
    }

    #[test]
    fn test_undirected_edges() {
        let matrix = vec![vec![0, 2, 0], vec![2, 0, 1], vec![0, 1, 0]];
        let edges = UndirectedEdges::from_matrix(&matrix).unwrap();
        assert_eq!(edges.edges(), &[(0, 1, 2), (1, 2, 1)]);
        assert_eq!(edges.degrees(), &[2, 3, 1]);
        assert_eq!(edges.edge_count(), 3.0);
    }

    #[test]
    fn test_self_loops_count_in_row_sums() {
        let matrix = vec![vec![1, 2, 0], vec![2, 0, 1], vec![0, 1, 4]];
        let edges = UndirectedEdges::from_matrix(&matrix).unwrap();
        // The diagonal never becomes an edge.
        assert_eq!(edges.edges(), &[(0, 1, 2), (1, 2, 1)]);
        assert_eq!(edges.degrees(), &[3, 3, 5]);
        assert_eq!(edges.degree_sum(), 11);
        assert_eq!(edges.edge_count(), 5.5);
    }

    #[test]
    fn test_asymmetric_matrix_uses_upper_triangle() {
        let matrix = vec![vec![0, 3, 0], vec![1, 0, 0], vec![0, 2, 0]];
        let edges = UndirectedEdges::from_matrix(&matrix).unwrap();
        assert_eq!(edges.edges(), &[(0, 1, 3)]);
        assert_eq!(edges.degrees(), &[3, 3, 0]);
    }

    #[test]
    fn test_undirected_edges_rejects_bad_shapes() {
        assert!(UndirectedEdges::from_matrix(&[]).is_none());
        assert!(UndirectedEdges::from_matrix(&[vec![0, 1]]).is_none());
        assert!(UndirectedEdges::from_matrix(&[vec![0, 1], vec![1]]).is_none());
    }
}
