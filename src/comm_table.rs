// The partition manager: vertex-to-community map plus per-community aggregate degrees.
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use fixedbitset::FixedBitSet;

use crate::graph::VInt;

pub type CommID = VInt;
pub type CommStructure = Vec<Vec<VInt>>;

// Define the metadata of a live community.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommMeta {
    degree: u64,          // Sum of the degrees of all members.
    members: Vec<VInt>,   // Member vertices, kept sorted.
}

/// Community ID manager. IDs are handed out in increasing order and never reused.
#[derive(Debug, Clone)]
pub(crate) struct IDManager {
    next_id: CommID,
}

impl IDManager {
    pub(crate) fn starting_at(first: CommID) -> IDManager {
        IDManager { next_id: first }
    }

    pub(crate) fn allocate_comm(&mut self) -> CommID {
        // Allocate a fresh community ID.
        let comm_id = self.next_id;
        self.next_id += 1;
        comm_id
    }

    pub(crate) fn peek_next(&self) -> CommID {
        self.next_id
    }
}

/// Community Table, owns the live partition of the vertices.
///
/// Every vertex points at exactly one live community, and every live
/// community appears in the degree table. A merge kills two communities
/// and gives birth to exactly one, so the sum of live degrees never changes.
#[derive(Debug, Clone)]
pub struct CommTable {
    vertex_community_map: Vec<CommID>,       // Map from a vertex to its community.
    community_map: BTreeMap<CommID, CommMeta>, // Live communities only.
    degree_sum: u64,                          // `2m`, fixed for the whole run.
    id_manager: IDManager,
}

impl CommTable {
    /// Build the all-singleton table, community `i` holds vertex `i`.
    pub fn new(degrees: &[u64]) -> CommTable {
        let vertex_count = degrees.len();
        let mut community_map = BTreeMap::new();
        for (vertex, &degree) in degrees.iter().enumerate() {
            community_map.insert(
                vertex as CommID,
                CommMeta {
                    degree,
                    members: vec![vertex as VInt],
                },
            );
        }
        CommTable {
            vertex_community_map: (0..vertex_count as CommID).collect(),
            community_map,
            degree_sum: degrees.iter().sum(),
            id_manager: IDManager::starting_at(vertex_count as CommID),
        }
    }

    #[inline]
    pub fn degree_sum(&self) -> u64 {
        self.degree_sum
    }

    /// `m`, half the degree sum.
    #[inline]
    pub fn edge_count(&self) -> f64 {
        self.degree_sum as f64 / 2.0
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.community_map.len()
    }

    #[inline]
    pub fn is_live(&self, comm_id: CommID) -> bool {
        self.community_map.contains_key(&comm_id)
    }

    pub fn degree(&self, comm_id: CommID) -> Option<u64> {
        self.community_map.get(&comm_id).map(|meta| meta.degree)
    }

    pub fn community_of(&self, vertex: VInt) -> Option<CommID> {
        self.vertex_community_map.get(vertex as usize).copied()
    }

    /// The ID the next merge will allocate.
    pub fn next_comm_id(&self) -> CommID {
        self.id_manager.peek_next()
    }

    /// Iterate over `(community, aggregate degree)` of the live communities.
    pub fn degrees(&self) -> impl Iterator<Item = (CommID, u64)> + '_ {
        self.community_map
            .iter()
            .map(|(comm_id, meta)| (*comm_id, meta.degree))
    }

    /// Modularity gain of merging `a` and `b`, which share `crossing` edges.
    ///
    /// `crossing/m - deg(a)*deg(b)/(2m^2)`. Both communities must be live and
    /// the graph must have at least one edge.
    pub fn gain(&self, a: CommID, b: CommID, crossing: u64) -> Result<f64> {
        if self.degree_sum == 0 {
            bail!("modularity gain is undefined on an edgeless graph");
        }
        let (Some(deg_a), Some(deg_b)) = (self.degree(a), self.degree(b)) else {
            bail!("gain requested for dead community pair ({}, {})", a, b);
        };
        let m = self.edge_count();
        Ok(crossing as f64 / m - (deg_a as f64 * deg_b as f64) / (2.0 * m * m))
    }

    /// Merge two distinct live communities into a freshly allocated one.
    pub fn merge(&mut self, a: CommID, b: CommID) -> Result<CommID> {
        if a == b {
            bail!("cannot merge community {} with itself", a);
        }
        if !self.is_live(a) || !self.is_live(b) {
            bail!("cannot merge dead community pair ({}, {})", a, b);
        }
        // Step 1. Remove both sides from the degree table.
        let (Some(left), Some(right)) = (self.community_map.remove(&a), self.community_map.remove(&b))
        else {
            bail!("community table lost ({}, {}) during merge", a, b);
        };

        // Step 2. Allocate the new community and fold members together.
        let merged_id = self.id_manager.allocate_comm();
        let mut members = left.members;
        members.extend(right.members);
        members.sort_unstable();

        // Step 3. Re-point every member vertex.
        for vertex in &members {
            self.vertex_community_map[*vertex as usize] = merged_id;
        }
        self.community_map.insert(
            merged_id,
            CommMeta {
                degree: left.degree + right.degree,
                members,
            },
        );
        Ok(merged_id)
    }

    /// Snapshot the current partition, one member list per live community.
    pub fn snapshot(&self) -> CommStructure {
        self.community_map
            .values()
            .map(|meta| meta.members.clone())
            .collect()
    }

    pub fn members(&self, comm_id: CommID) -> Option<&[VInt]> {
        self.community_map
            .get(&comm_id)
            .map(|meta| meta.members.as_slice())
    }
}

/// Whether `communities` covers every vertex of `0..vertex_count` exactly once.
pub fn is_valid_partition(communities: &[Vec<VInt>], vertex_count: usize) -> bool {
    let mut seen = FixedBitSet::with_capacity(vertex_count);
    for members in communities {
        if members.is_empty() {
            return false;
        }
        for &vertex in members {
            let vertex = vertex as usize;
            if vertex >= vertex_count || seen.put(vertex) {
                return false;
            }
        }
    }
    seen.count_ones(..) == vertex_count
}
