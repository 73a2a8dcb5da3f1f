use crate::job::{CommOpScheduleResult, Job};
use crate::policies::{PeerState, SharingPolicy};
use crate::resources::FatTreeResource;

/// Time-divides SHARP inside a sharing group. Each arbitration is one
/// consensus round: when the tree is free the job takes SHARP for the whole
/// remaining op; when a group mate holds SHARP until `T`, the job waits out
/// the blockage iff waiting-then-SHARP still beats transmitting plainly
/// right away, and otherwise falls back to the plain network.
pub struct SmartSharingPolicy;

impl SmartSharingPolicy {
    pub fn new() -> Self {
        SmartSharingPolicy
    }
}

impl Default for SmartSharingPolicy {
    fn default() -> Self {
        SmartSharingPolicy::new()
    }
}

impl SharingPolicy for SmartSharingPolicy {
    fn schedule(
        &mut self,
        job: &Job,
        peers: &[PeerState],
        resources: &FatTreeResource,
        now: f64,
    ) -> CommOpScheduleResult {
        assert!(!job.is_finished());
        assert!(!job.is_transmitting());
        let remaining = job.remaining_message_size();
        let plain = CommOpScheduleResult::Transmit {
            use_sharp: false,
            message_size: remaining,
        };

        let tree = match job.current_aggr_tree() {
            Some(tree) => tree,
            None => return plain,
        };

        // SHARP exclusion: at most one group mate transmits with SHARP, so
        // the latest end time is the end of the single active blockage
        let blocked_until = peers
            .iter()
            .filter(|peer| peer.is_using_sharp)
            .map(|peer| peer.transmission_end_time)
            .fold(f64::NEG_INFINITY, f64::max);

        if blocked_until > now {
            let op = job.current_comm_op();
            let duration_fn = job.duration_fn();
            let sharp_duration = (**duration_fn)(op.op_type, remaining, true, job.host_count());
            let plain_duration = (**duration_fn)(op.op_type, remaining, false, job.host_count());
            let wait = blocked_until - now;
            if wait + sharp_duration < plain_duration {
                return CommOpScheduleResult::Wait(wait);
            }
            return plain;
        }

        if resources.check_tree_conflict(tree) {
            // conflict from outside the group; SHARP cannot engage
            return plain;
        }
        CommOpScheduleResult::Transmit {
            use_sharp: true,
            message_size: remaining,
        }
    }

    fn needs_consensus(&self) -> bool {
        true
    }
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SmartSharingPolicy;
    use crate::controller::test_support::{make_job_with_duration, NoopHooks};
    use crate::data::DurationCalculator;
    use crate::fat_tree::FatTree;
    use crate::job::CommOpScheduleResult;
    use crate::policies::{PeerState, SharingPolicy};
    use crate::resources::FatTreeResource;

    #[test]
    fn test_waits_out_short_blockage() {
        let topology = Arc::new(FatTree::with_degree(3, 4));
        let resources = FatTreeResource::new(Arc::clone(&topology), Some(1), Some(1));
        let mut policy = SmartSharingPolicy::new();

        // 2x sharp speedup: plain takes 1s, sharp 0.5s
        let duration_fn = DurationCalculator::new(100.0, 2.0, 0.0).into_duration_fn();
        let mut job = make_job_with_duration(2, 100, duration_fn);
        job.set_hosts(vec![0, 1]);
        let tree = topology.aggregation_tree(&[0, 1], topology.closest_common_ancestors(&[0, 1])[0]);
        job.set_next_aggr_tree(Some(tree));
        job.run_next_event(0.0, &mut NoopHooks);

        // free: sharp, whole op
        assert_eq!(
            policy.schedule(&job, &[], &resources, 0.0),
            CommOpScheduleResult::Transmit {
                use_sharp: true,
                message_size: 100
            }
        );

        // blocked for 0.2s: waiting (0.2 + 0.5 < 1.0) is worth it
        let peer = PeerState {
            is_using_sharp: true,
            transmission_end_time: 0.2,
        };
        assert_eq!(
            policy.schedule(&job, &[peer], &resources, 0.0),
            CommOpScheduleResult::Wait(0.2)
        );

        // blocked for 0.8s: waiting loses, go plain
        let peer = PeerState {
            is_using_sharp: true,
            transmission_end_time: 0.8,
        };
        assert_eq!(
            policy.schedule(&job, &[peer], &resources, 0.0),
            CommOpScheduleResult::Transmit {
                use_sharp: false,
                message_size: 100
            }
        );

        // blockage ending exactly now is not a wait (idempotence)
        let peer = PeerState {
            is_using_sharp: true,
            transmission_end_time: 0.0,
        };
        assert!(matches!(
            policy.schedule(&job, &[peer], &resources, 0.0),
            CommOpScheduleResult::Transmit { use_sharp: false, .. }
        ));
    }

    #[test]
    fn test_consensus_flag() {
        assert!(SmartSharingPolicy::new().needs_consensus());
    }
}
