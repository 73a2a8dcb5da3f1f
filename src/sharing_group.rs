use std::time::{Duration, Instant};

use crate::job::{CommOpScheduleResult, Job, JobHooks};
use crate::policies::{PeerState, SharingPolicy};
use crate::resources::FatTreeResource;
use crate::trace::{Span, Tracer};

/// One equivalence class of running jobs whose pending aggregation trees
/// share hardware. The group is the arbitration unit of the sharing policy;
/// it guarantees that at most one member transmits with SHARP at a time.
pub struct SharingGroup {
    job_indices: Vec<usize>,
}

impl SharingGroup {
    pub fn new(job_indices: Vec<usize>) -> Self {
        assert!(!job_indices.is_empty(), "A sharing group needs at least one job");
        SharingGroup { job_indices }
    }

    pub fn job_indices(&self) -> &[usize] {
        &self.job_indices
    }

    pub fn len(&self) -> usize {
        self.job_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.job_indices.is_empty()
    }

    /// Earliest next event over the members; ties go to the earliest member
    /// in insertion order.
    pub fn next_event(&self, jobs: &[Job], now: f64) -> (f64, usize) {
        let mut nearest: Option<(f64, usize)> = None;
        for &job_idx in &self.job_indices {
            let time = jobs[job_idx].next_event_time(now);
            if nearest.map_or(true, |(nearest_time, _)| time < nearest_time) {
                nearest = Some((time, job_idx));
            }
        }
        nearest.expect("Sharing group has no jobs")
    }

    /// Snapshot of what the sharing policy may see of everyone but `job_idx`.
    pub fn peer_states(&self, jobs: &[Job], job_idx: usize) -> Vec<PeerState> {
        self.job_indices
            .iter()
            .filter(|&&idx| idx != job_idx)
            .map(|&idx| {
                let job = &jobs[idx];
                PeerState {
                    is_using_sharp: job.is_using_sharp(),
                    transmission_end_time: if job.is_transmitting() {
                        job.transmission_end_time()
                    } else {
                        f64::NEG_INFINITY
                    },
                }
            })
            .collect()
    }
}

/*====================================================================================================================*/

/// The per-event hook bundle handed to `Job::run_next_event`: consults the
/// sharing policy before a transmission, claims the aggregation tree on the
/// hardware for SHARP transmissions and releases it afterwards.
pub struct GroupHooks<'a> {
    pub peers: &'a [PeerState],
    pub policy: &'a mut dyn SharingPolicy,
    pub resources: &'a mut FatTreeResource,
    pub tracer: Option<&'a mut Tracer>,
    // filled in while the event runs
    pub sharp_usage: f64,
    pub arbitrated: bool,
    pub sharing_policy_cost: Duration,
}

impl<'a> GroupHooks<'a> {
    pub fn new(
        peers: &'a [PeerState],
        policy: &'a mut dyn SharingPolicy,
        resources: &'a mut FatTreeResource,
        tracer: Option<&'a mut Tracer>,
    ) -> Self {
        GroupHooks {
            peers,
            policy,
            resources,
            tracer,
            sharp_usage: 0.0,
            arbitrated: false,
            sharing_policy_cost: Duration::ZERO,
        }
    }
}

impl JobHooks for GroupHooks<'_> {
    fn before_transmission(&mut self, job: &Job, now: f64) -> CommOpScheduleResult {
        self.arbitrated = true;
        let started = Instant::now();
        let result = self.policy.schedule(job, self.peers, self.resources, now);
        self.sharing_policy_cost += started.elapsed();
        if let CommOpScheduleResult::Transmit { use_sharp: true, .. } = result {
            let tree = job
                .current_aggr_tree()
                .expect("SHARP transmission without an aggregation tree");
            self.resources.allocate_tree(tree);
        }
        result
    }

    fn after_transmission(&mut self, job: &Job, _now: f64, used_sharp: bool) {
        if used_sharp {
            let tree = job
                .current_aggr_tree()
                .expect("SHARP transmission without an aggregation tree");
            self.resources.deallocate_tree(tree);
            let topology = self.resources.topology();
            let switches = tree.nodes.iter().filter(|&&node| !topology.is_host(node)).count();
            self.sharp_usage += job.transmission_duration() * switches as f64;
        }
    }

    fn trace(&mut self, span: Span, is_begin: bool, now: f64, job: &Job) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            tracer.record(span, is_begin, now, job.id());
        }
    }
}
