use crate::job::{CommOpScheduleResult, Job};
use crate::policies::{PeerState, SharingPolicy};
use crate::resources::FatTreeResource;

/// Uses SHARP whenever the job holds a tree, no group mate is mid-SHARP and
/// the tree is free on the hardware; always ships the whole remaining op.
pub struct GreedySharingPolicy;

impl SharingPolicy for GreedySharingPolicy {
    fn schedule(
        &mut self,
        job: &Job,
        peers: &[PeerState],
        resources: &FatTreeResource,
        _now: f64,
    ) -> CommOpScheduleResult {
        assert!(!job.is_finished());
        assert!(!job.is_transmitting());
        let use_sharp = job.current_aggr_tree().map_or(false, |tree| {
            !peers.iter().any(|peer| peer.is_using_sharp) && !resources.check_tree_conflict(tree)
        });
        CommOpScheduleResult::Transmit {
            use_sharp,
            message_size: job.remaining_message_size(),
        }
    }
}

/*====================================================================================================================*/
