use super::candidate_conflicts;
use crate::fat_tree::AggrTree;
use crate::job::Job;
use crate::policies::TreeBuildingPolicy;
use crate::resources::FatTreeResource;

/// Gives each new job the first aggregation tree in root-enumeration order,
/// optionally skipping trees that would conflict. Jobs with no viable root
/// are left without a pending tree.
pub struct FirstTreePolicy {
    check_conflict: bool,
    conflict_count: u64,
    fallback_count: u64,
}

impl FirstTreePolicy {
    pub fn new(check_conflict: bool) -> Self {
        FirstTreePolicy {
            check_conflict,
            conflict_count: 0,
            fallback_count: 0,
        }
    }
}

impl TreeBuildingPolicy for FirstTreePolicy {
    fn build_trees(&mut self, resources: &FatTreeResource, jobs: &mut [Job], new_job_indices: &[usize]) {
        let topology = resources.topology().clone();
        let mut chosen_trees: Vec<AggrTree> = Vec::new();
        for &job_idx in new_job_indices {
            let hosts = jobs[job_idx].hosts().to_vec();
            let mut chosen: Option<AggrTree> = None;
            for root in topology.closest_common_ancestors(&hosts) {
                let tree = topology.aggregation_tree(&hosts, root);
                if self.check_conflict && candidate_conflicts(resources, &tree, &chosen_trees, jobs) {
                    self.conflict_count += 1;
                    continue;
                }
                chosen = Some(tree);
                break;
            }
            match chosen {
                Some(tree) => {
                    chosen_trees.push(tree.clone());
                    jobs[job_idx].set_next_aggr_tree(Some(tree));
                }
                None => self.fallback_count += 1,
            }
        }
    }

    fn tree_conflict_count(&self) -> u64 {
        self.conflict_count
    }

    fn tree_fallback_count(&self) -> u64 {
        self.fallback_count
    }
}

/*====================================================================================================================*/
