use crate::fat_tree::NodeId;
use crate::policies::HostAllocationPolicy;
use crate::resources::FatTreeResource;

/// Takes the first idle hosts in ID order. Deterministic, so also handy as a
/// baseline in tests.
pub struct FirstHostsPolicy;

impl HostAllocationPolicy for FirstHostsPolicy {
    fn allocate(&mut self, resources: &FatTreeResource, host_count: u32) -> Option<Vec<NodeId>> {
        assert!(host_count > 0);
        let node_usage = resources.node_usage();
        let mut chosen = Vec::with_capacity(host_count as usize);
        for &host in &resources.topology().nodes_by_layer[0] {
            if node_usage[host as usize] == 0 {
                chosen.push(host);
                if chosen.len() == host_count as usize {
                    return Some(chosen);
                }
            }
        }
        None
    }
}

/*====================================================================================================================*/
