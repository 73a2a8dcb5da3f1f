mod first;
mod random;
mod smart;

pub use first::FirstTreePolicy;
pub use random::RandomTreePolicy;
pub use smart::SmartTreePolicy;

use crate::fat_tree::AggrTree;
use crate::job::Job;
use crate::resources::FatTreeResource;

// shared filter of the first/random policies: a candidate is out if it clashes
// with live usage, with a tree already chosen in this round, or with any
// job's pending tree
fn candidate_conflicts(
    resources: &FatTreeResource,
    candidate: &AggrTree,
    chosen_this_round: &[AggrTree],
    jobs: &[Job],
) -> bool {
    if resources.check_tree_conflict(candidate) {
        return true;
    }
    if chosen_this_round
        .iter()
        .any(|tree| resources.check_tree_pair_conflict(candidate, tree))
    {
        return true;
    }
    jobs.iter().any(|job| {
        job.next_aggr_tree()
            .map_or(false, |tree| resources.check_tree_pair_conflict(candidate, tree))
    })
}
