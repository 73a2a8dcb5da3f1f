use crate::fat_tree::NodeId;
use crate::policies::HostAllocationPolicy;
use crate::resources::FatTreeResource;

#[derive(Clone, Default)]
struct PodPlan {
    score: f64,
    hosts: Vec<NodeId>,
}

/// Fragmentation-minimizing allocator. Recursing over the pod tree, each pod
/// yields the cheapest way to take exactly k hosts from it: an idle host
/// costs 1 to take and `alpha` to leave behind, sub-pod plans combine by
/// convolution, and draining a fully idle pod exactly is clamped to the
/// perfect score of 1. Ties resolve to the first minimum in scan order.
pub struct SmartHostsPolicy {
    pub alpha: f64,
}

impl SmartHostsPolicy {
    pub fn new(alpha: f64) -> Self {
        assert!(alpha >= 0.0);
        SmartHostsPolicy { alpha }
    }

    // fills result[k] for k in 0..=required with the best plan taking k hosts
    // out of this pod; returns how many hosts in the pod are idle
    fn try_allocate(
        &self,
        resources: &FatTreeResource,
        begin: usize,
        pod_size: usize,
        level: u32,
        result: &mut [PodPlan],
    ) -> usize {
        assert!(result.len() >= 2);
        let node_usage = resources.node_usage();
        if level == 0 {
            assert_eq!(pod_size, 1);
            if node_usage[begin] > 0 {
                result[0] = PodPlan {
                    score: 0.0,
                    hosts: Vec::new(),
                };
                return 0;
            }
            result[0] = PodPlan {
                score: self.alpha,
                hosts: Vec::new(),
            };
            result[1] = PodPlan {
                score: 1.0,
                hosts: vec![begin as NodeId],
            };
            return 1;
        }

        result[0] = PodPlan {
            score: 0.0,
            hosts: Vec::new(),
        };
        let required = result.len() - 1;
        let sub_pod_size = pod_size / resources.topology().down_link_count[level as usize - 1] as usize;
        let mut total_avail = 0usize;
        let mut sub_result = vec![PodPlan::default(); required + 1];
        for sub_begin in (begin..begin + pod_size).step_by(sub_pod_size) {
            let sub_avail = self.try_allocate(resources, sub_begin, sub_pod_size, level - 1, &mut sub_result);
            // convolve: take i hosts from this sub-pod and n - i from the ones before it
            for n in (0..=(total_avail + sub_avail).min(required)).rev() {
                let mut min_score = f64::MAX;
                let mut min_i = 0usize;
                let lo = n.saturating_sub(total_avail);
                for i in lo..=sub_avail.min(n) {
                    let score = sub_result[i].score + result[n - i].score;
                    if score < min_score {
                        min_score = score;
                        min_i = i;
                    }
                }
                let mut hosts = result[n - min_i].hosts.clone();
                hosts.extend_from_slice(&sub_result[min_i].hosts);
                result[n] = PodPlan {
                    score: min_score,
                    hosts,
                };
            }
            total_avail += sub_avail;
        }
        if total_avail == pod_size {
            // the whole pod is idle: leaving it intact costs alpha, draining it exactly is perfect
            result[0].score = self.alpha;
            if pod_size <= required {
                result[pod_size].score = 1.0;
            }
        }
        total_avail
    }
}

impl HostAllocationPolicy for SmartHostsPolicy {
    fn allocate(&mut self, resources: &FatTreeResource, host_count: u32) -> Option<Vec<NodeId>> {
        assert!(host_count > 0);
        let topology = resources.topology();
        let mut result = vec![PodPlan::default(); host_count as usize + 1];
        let avail = self.try_allocate(resources, 0, topology.host_count(), topology.height, &mut result);
        if avail < host_count as usize {
            return None;
        }
        let plan = &result[host_count as usize];
        assert_eq!(plan.hosts.len(), host_count as usize);
        Some(plan.hosts.clone())
    }
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SmartHostsPolicy;
    use crate::fat_tree::FatTree;
    use crate::policies::HostAllocationPolicy;
    use crate::resources::FatTreeResource;

    #[test]
    fn test_prefers_whole_pods() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let mut resources = FatTreeResource::new(Arc::clone(&topology), None, None);
        let mut policy = SmartHostsPolicy::new(0.5);

        // a 2-host job should drain one ToR pod exactly
        let hosts = policy.allocate(&resources, 2).unwrap();
        assert_eq!(hosts, vec![0, 1]);

        // occupy host 1: hosts 0 and 1 no longer form an idle pod, the
        // allocator should jump to the next whole pod instead of scattering
        resources.allocate_hosts(&[1]);
        let hosts = policy.allocate(&resources, 2).unwrap();
        assert_eq!(hosts, vec![2, 3]);
    }

    #[test]
    fn test_leftover_singles_used_for_one_host_jobs() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let mut resources = FatTreeResource::new(Arc::clone(&topology), None, None);
        let mut policy = SmartHostsPolicy::new(0.5);

        resources.allocate_hosts(&[1]);
        // a 1-host job should take host 0 (stranded half-pod) rather than
        // break an untouched pod
        let hosts = policy.allocate(&resources, 1).unwrap();
        assert_eq!(hosts, vec![0]);
    }

    #[test]
    fn test_declines_when_full() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let mut resources = FatTreeResource::new(Arc::clone(&topology), None, None);
        let mut policy = SmartHostsPolicy::new(0.5);

        let all_hosts: Vec<u32> = (0..16).collect();
        resources.allocate_hosts(&all_hosts);
        assert!(policy.allocate(&resources, 1).is_none());

        resources.deallocate_hosts(&[7]);
        assert_eq!(policy.allocate(&resources, 1), Some(vec![7]));
        assert!(policy.allocate(&resources, 2).is_none());
    }
}
