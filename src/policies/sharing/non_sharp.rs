use crate::job::{CommOpScheduleResult, Job};
use crate::policies::{PeerState, SharingPolicy};
use crate::resources::FatTreeResource;

/// Baseline: every op goes over the plain network in one piece.
pub struct NonSharpSharingPolicy;

impl SharingPolicy for NonSharpSharingPolicy {
    fn schedule(
        &mut self,
        job: &Job,
        _peers: &[PeerState],
        _resources: &FatTreeResource,
        _now: f64,
    ) -> CommOpScheduleResult {
        CommOpScheduleResult::Transmit {
            use_sharp: false,
            message_size: job.remaining_message_size(),
        }
    }
}
