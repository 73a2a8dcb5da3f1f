use std::sync::Arc;

use crate::fat_tree::{AggrTree, FatTree, NodeId};

/// Usage counters over one fat tree, with optional per-node and per-link
/// quotas. Over-allocation and over-free are programming errors and abort.
pub struct FatTreeResource {
    topology: Arc<FatTree>,
    node_usage: Vec<u32>,
    edge_usage: Vec<u32>,

    pub node_quota: Option<u32>,
    pub link_quota: Option<u32>,
}

impl FatTreeResource {
    pub fn new(topology: Arc<FatTree>, node_quota: Option<u32>, link_quota: Option<u32>) -> Self {
        assert!(node_quota.map_or(true, |q| q > 0), "Node quota must be positive");
        assert!(link_quota.map_or(true, |q| q > 0), "Link quota must be positive");
        FatTreeResource {
            node_usage: vec![0; topology.nodes.len()],
            edge_usage: vec![0; topology.edges.len()],
            topology,
            node_quota,
            link_quota,
        }
    }

    pub fn topology(&self) -> &Arc<FatTree> {
        &self.topology
    }

    pub fn node_usage(&self) -> &[u32] {
        &self.node_usage
    }

    pub fn edge_usage(&self) -> &[u32] {
        &self.edge_usage
    }

    /// Claim the switches and links of an aggregation tree. Hosts are not
    /// counted here; they are claimed by `allocate_hosts` at admission.
    pub fn allocate_tree(&mut self, tree: &AggrTree) {
        for &node in &tree.nodes {
            if self.topology.is_host(node) {
                continue;
            }
            let usage = &mut self.node_usage[node as usize];
            assert!(self.node_quota.map_or(true, |q| *usage < q), "Node quota exceeded");
            *usage += 1;
        }
        for &edge in &tree.edges {
            let usage = &mut self.edge_usage[edge as usize];
            assert!(self.link_quota.map_or(true, |q| *usage < q), "Link quota exceeded");
            *usage += 1;
        }
    }

    pub fn deallocate_tree(&mut self, tree: &AggrTree) {
        for &node in &tree.nodes {
            if self.topology.is_host(node) {
                continue;
            }
            let usage = &mut self.node_usage[node as usize];
            assert!(*usage > 0, "Freeing an unallocated node");
            *usage -= 1;
        }
        for &edge in &tree.edges {
            let usage = &mut self.edge_usage[edge as usize];
            assert!(*usage > 0, "Freeing an unallocated link");
            *usage -= 1;
        }
    }

    pub fn allocate_hosts(&mut self, hosts: &[NodeId]) {
        for &host in hosts {
            assert!(self.topology.is_host(host));
            let usage = &mut self.node_usage[host as usize];
            assert!(self.node_quota.map_or(true, |q| *usage < q), "Node quota exceeded");
            *usage += 1;
        }
    }

    pub fn deallocate_hosts(&mut self, hosts: &[NodeId]) {
        for &host in hosts {
            assert!(self.topology.is_host(host));
            let usage = &mut self.node_usage[host as usize];
            assert!(*usage > 0, "Freeing an unallocated host");
            *usage -= 1;
        }
    }

    /// Would allocating this tree exceed a quota right now?
    pub fn check_tree_conflict(&self, tree: &AggrTree) -> bool {
        if let Some(quota) = self.node_quota {
            for &node in &tree.nodes {
                if self.topology.is_host(node) {
                    continue;
                }
                if self.node_usage[node as usize] >= quota {
                    return true;
                }
            }
        }
        if let Some(quota) = self.link_quota {
            for &edge in &tree.edges {
                if self.edge_usage[edge as usize] >= quota {
                    return true;
                }
            }
        }
        false
    }

    /// Would two trees clash if co-allocated? Only quotas below 2 can make
    /// plain overlap a conflict.
    pub fn check_tree_pair_conflict(&self, tree1: &AggrTree, tree2: &AggrTree) -> bool {
        if self.node_quota.map_or(false, |q| q < 2) {
            for &node in &tree1.nodes {
                if self.topology.is_host(node) {
                    continue;
                }
                if tree2.has_node(node) {
                    return true;
                }
            }
        }
        if self.link_quota.map_or(false, |q| q < 2) {
            for &edge in &tree1.edges {
                if tree2.has_edge(edge) {
                    return true;
                }
            }
        }
        false
    }

    /// Count "pure" pods: recursing over the down-link factoring, a pod whose
    /// hosts are all free counts once when `available`, a pod whose hosts are
    /// all busy counts once when `!available`, and a mixed pod recurses.
    pub fn calc_host_fragments(&self, available: bool) -> u32 {
        self.host_fragments(available, 0, self.topology.host_count(), self.topology.height)
    }

    fn host_fragments(&self, available: bool, begin: usize, pod_size: usize, level: u32) -> u32 {
        let mut all_free = true;
        let mut none_free = true;
        for host in begin..begin + pod_size {
            if self.node_usage[host] == 0 {
                none_free = false;
            } else {
                all_free = false;
            }
        }
        if all_free {
            return available as u32;
        }
        if none_free {
            return !available as u32;
        }
        assert!(level > 0);
        assert!(pod_size > 1);
        let sub_pod_size = pod_size / self.topology.down_link_count[level as usize - 1] as usize;
        let mut sum = 0;
        for sub_begin in (begin..begin + pod_size).step_by(sub_pod_size) {
            sum += self.host_fragments(available, sub_begin, sub_pod_size, level - 1);
        }
        sum
    }
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::FatTreeResource;
    use crate::fat_tree::FatTree;

    #[test]
    fn test_allocate_deallocate_round_trip() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let mut resources = FatTreeResource::new(Arc::clone(&topology), None, Some(1));

        let leaves = vec![0, 1];
        let roots = topology.closest_common_ancestors(&leaves);
        let tree = topology.aggregation_tree(&leaves, roots[0]);

        let before_nodes = resources.node_usage().to_vec();
        let before_edges = resources.edge_usage().to_vec();

        resources.allocate_tree(&tree);
        assert!(resources.check_tree_conflict(&tree));
        // hosts are never claimed by tree allocation
        assert_eq!(resources.node_usage()[0], 0);
        assert_eq!(resources.node_usage()[1], 0);

        resources.deallocate_tree(&tree);
        assert_eq!(resources.node_usage(), &before_nodes[..]);
        assert_eq!(resources.edge_usage(), &before_edges[..]);
        assert!(!resources.check_tree_conflict(&tree));
    }

    #[test]
    fn test_pair_conflict_symmetric() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let resources = FatTreeResource::new(Arc::clone(&topology), Some(1), Some(1));

        let tree_a = {
            let leaves = vec![0, 1];
            let root = topology.closest_common_ancestors(&leaves)[0];
            topology.aggregation_tree(&leaves, root)
        };
        let tree_b = {
            let leaves = vec![0, 2];
            let root = topology.closest_common_ancestors(&leaves)[0];
            topology.aggregation_tree(&leaves, root)
        };
        let tree_c = {
            let leaves = vec![8, 9];
            let root = topology.closest_common_ancestors(&leaves)[0];
            topology.aggregation_tree(&leaves, root)
        };

        // trees over hosts {0,1} and {0,2} share the ToR above host 0
        assert!(resources.check_tree_pair_conflict(&tree_a, &tree_b));
        assert!(resources.check_tree_pair_conflict(&tree_b, &tree_a));
        // disjoint pods never clash
        assert!(!resources.check_tree_pair_conflict(&tree_a, &tree_c));
        assert!(!resources.check_tree_pair_conflict(&tree_c, &tree_a));
    }

    #[test]
    fn test_pair_conflict_ignored_without_tight_quota() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let resources = FatTreeResource::new(Arc::clone(&topology), Some(2), None);

        let tree_a = {
            let leaves = vec![0, 1];
            let root = topology.closest_common_ancestors(&leaves)[0];
            topology.aggregation_tree(&leaves, root)
        };
        // two jobs may share a switch when the quota allows it
        assert!(!resources.check_tree_pair_conflict(&tree_a, &tree_a.clone()));
    }

    #[test]
    fn test_host_fragments() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let mut resources = FatTreeResource::new(Arc::clone(&topology), None, None);

        // empty cluster: one fully-available pod, zero occupied pods
        assert_eq!(resources.calc_host_fragments(true), 1);
        assert_eq!(resources.calc_host_fragments(false), 0);

        // occupy one host: its sibling ToR pod splits into host-level fragments
        resources.allocate_hosts(&[0]);
        assert_eq!(resources.calc_host_fragments(false), 1);

        // occupy the first ToR pod entirely
        resources.allocate_hosts(&[1]);
        assert_eq!(resources.calc_host_fragments(false), 1);
        resources.deallocate_hosts(&[0, 1]);
        assert_eq!(resources.calc_host_fragments(true), 1);
    }

    #[test]
    #[should_panic(expected = "Freeing an unallocated host")]
    fn test_over_free_aborts() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let mut resources = FatTreeResource::new(topology, None, None);
        resources.deallocate_hosts(&[0]);
    }
}
