use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::fat_tree::NodeId;
use crate::policies::HostAllocationPolicy;
use crate::resources::FatTreeResource;

/// Uniform sample of idle hosts, driven by a caller-supplied seed so runs
/// reproduce.
pub struct RandomHostsPolicy {
    rng: StdRng,
}

impl RandomHostsPolicy {
    pub fn new(seed: u64) -> Self {
        RandomHostsPolicy {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl HostAllocationPolicy for RandomHostsPolicy {
    fn allocate(&mut self, resources: &FatTreeResource, host_count: u32) -> Option<Vec<NodeId>> {
        assert!(host_count > 0);
        let node_usage = resources.node_usage();
        let available: Vec<NodeId> = resources.topology().nodes_by_layer[0]
            .iter()
            .copied()
            .filter(|&host| node_usage[host as usize] == 0)
            .collect();
        if available.len() < host_count as usize {
            return None;
        }
        let mut chosen: Vec<NodeId> = available
            .choose_multiple(&mut self.rng, host_count as usize)
            .copied()
            .collect();
        chosen.sort_unstable();
        Some(chosen)
    }
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::RandomHostsPolicy;
    use crate::fat_tree::FatTree;
    use crate::policies::HostAllocationPolicy;
    use crate::resources::FatTreeResource;

    #[test]
    fn test_sample_is_idle_and_seeded() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let mut resources = FatTreeResource::new(topology, None, None);
        resources.allocate_hosts(&[0, 1, 2, 3]);

        let mut policy_a = RandomHostsPolicy::new(7);
        let mut policy_b = RandomHostsPolicy::new(7);
        let chosen_a = policy_a.allocate(&resources, 4).unwrap();
        let chosen_b = policy_b.allocate(&resources, 4).unwrap();

        assert_eq!(chosen_a, chosen_b);
        assert!(chosen_a.iter().all(|&h| h >= 4));

        assert_eq!(policy_a.allocate(&resources, 13), None);
    }
}
