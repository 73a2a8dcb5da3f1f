pub mod hosts;
pub mod sharing;
pub mod trees;

use crate::fat_tree::NodeId;
use crate::job::{CommOpScheduleResult, Job};
use crate::resources::FatTreeResource;

pub use hosts::{FirstHostsPolicy, RandomHostsPolicy, SmartHostsPolicy};
pub use sharing::{GreedySharingPolicy, NonSharpSharingPolicy, SmartSharingPolicy};
pub use trees::{FirstTreePolicy, RandomTreePolicy, SmartTreePolicy};

/*====================================================================================================================*/

/// What a sharing policy may observe about a job's group mates.
#[derive(Debug, Clone, Copy)]
pub struct PeerState {
    pub is_using_sharp: bool,
    pub transmission_end_time: f64,
}

/// Picks hosts for a job, or declines when the cluster cannot fit it.
pub trait HostAllocationPolicy {
    fn allocate(&mut self, resources: &FatTreeResource, host_count: u32) -> Option<Vec<NodeId>>;
}

/// Chooses the next aggregation tree of newly admitted jobs (and may re-root
/// running ones). `new_job_indices` points into `jobs`.
pub trait TreeBuildingPolicy {
    fn build_trees(&mut self, resources: &FatTreeResource, jobs: &mut [Job], new_job_indices: &[usize]);

    /// Candidate trees rejected by a conflict check since construction.
    fn tree_conflict_count(&self) -> u64 {
        0
    }

    /// Times a build round left a job without a pending tree, forcing it
    /// onto the plain network.
    fn tree_fallback_count(&self) -> u64 {
        0
    }
}

/// Decides, before each transmission, whether the job waits or transmits,
/// with SHARP or without, and how many bytes.
pub trait SharingPolicy {
    fn schedule(&mut self, job: &Job, peers: &[PeerState], resources: &FatTreeResource, now: f64)
        -> CommOpScheduleResult;

    /// Whether arbitrations of this policy go through the consensus protocol.
    fn needs_consensus(&self) -> bool {
        false
    }
}
