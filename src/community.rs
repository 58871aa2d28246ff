use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::comm_table::CommID;

/// Define the community neighbors, neighbor community -> crossing edge count.
pub type CommNeighbors = BTreeMap<CommID, u64>;

/// Define the community Graph, i.e. the coarsened multigraph.
///
/// Slots are addressed by community ID. A consumed community keeps its slot
/// as a tombstone (`None`) so IDs are never reused.
#[derive(Debug, Clone, Default)]
pub struct CommGraph {
    adj_list: Vec<Option<CommNeighbors>>, // One slot per community ever born.
    live_count: usize,
}

impl CommGraph {
    pub fn new(community_count: usize) -> CommGraph {
        // Create one empty neighbor map per singleton community.
        CommGraph {
            adj_list: vec![Some(CommNeighbors::new()); community_count],
            live_count: community_count,
        }
    }

    #[inline]
    pub fn is_live(&self, comm_id: CommID) -> bool {
        matches!(self.adj_list.get(comm_id as usize), Some(Some(_)))
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn neighbors(&self, comm_id: CommID) -> Option<&CommNeighbors> {
        self.adj_list.get(comm_id as usize).and_then(|slot| slot.as_ref())
    }

    pub fn crossing_count(&self, a: CommID, b: CommID) -> u64 {
        self.neighbors(a)
            .and_then(|neighbors| neighbors.get(&b))
            .copied()
            .unwrap_or(0)
    }

    /// Iterate over the live communities with their neighbor maps.
    pub fn iter_live(&self) -> impl Iterator<Item = (CommID, &CommNeighbors)> + '_ {
        self.adj_list
            .iter()
            .enumerate()
            .filter_map(|(comm_id, slot)| slot.as_ref().map(|n| (comm_id as CommID, n)))
    }

    /// Number of unordered community pairs with at least one crossing edge.
    pub fn pair_count(&self) -> usize {
        self.iter_live()
            .map(|(comm_id, neighbors)| neighbors.range(comm_id + 1..).count())
            .sum()
    }

    /// Record `count` crossing edges between two distinct live communities.
    pub fn add_crossing(&mut self, a: CommID, b: CommID, count: u64) -> Result<()> {
        if a == b {
            bail!("community {} cannot cross itself", a);
        }
        if !self.is_live(a) || !self.is_live(b) {
            bail!("crossing edge between dead communities ({}, {})", a, b);
        }
        for (src, dst) in [(a, b), (b, a)] {
            if let Some(Some(neighbors)) = self.adj_list.get_mut(src as usize) {
                *neighbors.entry(dst).or_insert(0) += count;
            }
        }
        Ok(())
    }

    /// Contract `a` and `b` into the new community `merged`.
    ///
    /// `merged` must be the next unused slot. Both old slots become tombstones,
    /// their neighbor counts are summed into `merged`, the entries that pointed
    /// at each other are dropped, and every neighbor is re-keyed to `merged`.
    pub fn contract(&mut self, a: CommID, b: CommID, merged: CommID) -> Result<()> {
        if merged as usize != self.adj_list.len() {
            bail!(
                "contracted community {} must take slot {}",
                merged,
                self.adj_list.len()
            );
        }
        if a == b || !self.is_live(a) || !self.is_live(b) {
            bail!("cannot contract community pair ({}, {})", a, b);
        }
        let left = self.adj_list[a as usize].take().unwrap_or_default();
        let right = self.adj_list[b as usize].take().unwrap_or_default();

        // Step 1. Fold both neighbor maps, skipping the pair itself.
        let mut folded = CommNeighbors::new();
        for (neighbor, count) in left.into_iter().chain(right) {
            if neighbor == a || neighbor == b {
                continue;
            }
            *folded.entry(neighbor).or_insert(0) += count;
        }

        // Step 2. Re-key each neighbor's own record.
        for (neighbor, count) in &folded {
            if let Some(Some(neighbor_map)) = self.adj_list.get_mut(*neighbor as usize) {
                neighbor_map.remove(&a);
                neighbor_map.remove(&b);
                neighbor_map.insert(merged, *count);
            }
        }

        self.adj_list.push(Some(folded));
        self.live_count -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod test_comm_graph {
    use super::CommGraph;

    fn star_with_tail() -> CommGraph {
        // 0 - 1, 0 - 2, 1 - 2 (twice), 2 - 3.
        let mut graph = CommGraph::new(4);
        graph.add_crossing(0, 1, 1).unwrap();
        graph.add_crossing(0, 2, 1).unwrap();
        graph.add_crossing(1, 2, 2).unwrap();
        graph.add_crossing(2, 3, 1).unwrap();
        graph
    }

    #[test]
    fn test_symmetric_counts() {
        let mut graph = star_with_tail();
        assert_eq!(graph.crossing_count(1, 2), 2);
        assert_eq!(graph.crossing_count(2, 1), 2);
        assert_eq!(graph.crossing_count(0, 3), 0);
        assert_eq!(graph.pair_count(), 4);
        assert!(graph.add_crossing(1, 1, 1).is_err());
    }

    #[test]
    fn test_contract_folds_shared_neighbors() {
        let mut graph = star_with_tail();
        graph.contract(0, 1, 4).unwrap();

        assert!(!graph.is_live(0));
        assert!(!graph.is_live(1));
        assert_eq!(graph.live_count(), 3);
        // Both 0 and 1 touched 2: 1 + 2 crossing edges.
        assert_eq!(graph.crossing_count(4, 2), 3);
        assert_eq!(graph.crossing_count(2, 4), 3);
        // The 0 - 1 edge is internal now.
        assert_eq!(graph.crossing_count(4, 4), 0);
        let keys: Vec<u32> = graph.neighbors(2).unwrap().keys().copied().collect();
        assert_eq!(keys, vec![3, 4]);
    }

    #[test]
    fn test_contract_rejects_bad_slots() {
        let mut graph = star_with_tail();
        assert!(graph.contract(0, 1, 7).is_err());
        graph.contract(0, 1, 4).unwrap();
        assert!(graph.contract(0, 2, 5).is_err());
        assert!(graph.contract(4, 4, 5).is_err());
    }

    #[test]
    fn test_contract_to_single_community() {
        let mut graph = star_with_tail();
        graph.contract(0, 1, 4).unwrap();
        graph.contract(4, 2, 5).unwrap();
        assert_eq!(graph.crossing_count(5, 3), 1);
        graph.contract(5, 3, 6).unwrap();
        assert_eq!(graph.live_count(), 1);
        assert!(graph.neighbors(6).unwrap().is_empty());
        assert_eq!(graph.pair_count(), 0);
    }
}
