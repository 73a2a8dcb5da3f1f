use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::fat_tree::{AggrTree, NodeId};
use crate::trace::Span;

static NEXT_JOB_ID: AtomicU32 = AtomicU32::new(0);

/*====================================================================================================================*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommOpType {
    AllReduce,
}

#[derive(Debug, Clone)]
pub struct CommOp {
    pub start_time_in_group: f64,
    pub message_size: u64, // in bytes
    pub op_type: CommOpType,
}

#[derive(Debug, Clone, Default)]
pub struct CommOpGroup {
    pub comm_ops: Vec<CommOp>,
    pub sync_time: f64,
}

/// What the sharing policy decided for the op at hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommOpScheduleResult {
    Wait(f64),
    Transmit { use_sharp: bool, message_size: u64 },
}

/// Maps (op type, message size, use_sharp, host count) to seconds.
pub type DurationFn = Arc<dyn Fn(CommOpType, u64, bool, u32) -> f64 + Send + Sync>;

/// The sharing group's surface onto a running job: scheduling decisions
/// before each transmission, resource bookkeeping after, optional tracing.
pub trait JobHooks {
    fn before_transmission(&mut self, job: &Job, now: f64) -> CommOpScheduleResult;
    fn after_transmission(&mut self, job: &Job, now: f64, used_sharp: bool);
    fn trace(&mut self, _span: Span, _is_begin: bool, _now: f64, _job: &Job) {}
}

/*====================================================================================================================*/

/// One training job: immutable shape (hosts needed, steps, comm-op groups)
/// plus the nested step/group/op/transmission cursor the simulation advances.
pub struct Job {
    id: u32,
    model_name: String,
    host_count: u32,
    step_count: Option<u32>,
    comm_op_groups: Vec<CommOpGroup>,
    duration_fn: DurationFn,
    step_duration_with_sharp: f64,
    step_duration_without_sharp: f64,

    hosts: Vec<NodeId>,
    current_aggr_tree: Option<AggrTree>,
    next_aggr_tree: Option<AggrTree>,
    tree_migration_count: u64,
    consensus_count: u64,

    current_step: u32,
    current_group: u32,
    current_op: u32,
    transmitted_in_op: u64,
    is_transmitting: bool,
    waiting_until: Option<f64>,
    transmitting_size: u64,
    transmission_duration: f64,
    transmission_start_time: f64,
    group_start_time: f64,
    using_sharp: bool,

    is_started: bool,
    is_finished: bool,
    start_time: f64,
    finish_time: f64,
    duration_with_sharp: f64,
    duration_without_sharp: f64,
}

impl Job {
    pub fn new(
        model_name: impl Into<String>,
        host_count: u32,
        step_count: Option<u32>,
        comm_op_groups: Vec<CommOpGroup>,
        duration_fn: DurationFn,
    ) -> Self {
        assert!(host_count > 0, "A job needs at least one host");
        assert!(!comm_op_groups.is_empty(), "A job needs at least one comm-op group");
        let mut job = Job {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            model_name: model_name.into(),
            host_count,
            step_count,
            comm_op_groups,
            duration_fn,
            step_duration_with_sharp: 0.0,
            step_duration_without_sharp: 0.0,
            hosts: Vec::new(),
            current_aggr_tree: None,
            next_aggr_tree: None,
            tree_migration_count: 0,
            consensus_count: 0,
            current_step: 0,
            current_group: 0,
            current_op: 0,
            transmitted_in_op: 0,
            is_transmitting: false,
            waiting_until: None,
            transmitting_size: 0,
            transmission_duration: 0.0,
            transmission_start_time: 0.0,
            group_start_time: 0.0,
            using_sharp: false,
            is_started: false,
            is_finished: false,
            start_time: 0.0,
            finish_time: 0.0,
            duration_with_sharp: 0.0,
            duration_without_sharp: 0.0,
        };
        job.step_duration_with_sharp = job.calc_step_duration(true);
        job.step_duration_without_sharp = job.calc_step_duration(false);
        job
    }

    // closed-form duration of one step: ops run back to back (but never
    // before their start offset), the group ends no earlier than its sync time
    fn calc_step_duration(&self, use_sharp: bool) -> f64 {
        let mut total = 0.0;
        for group in &self.comm_op_groups {
            let mut t = 0.0f64;
            for op in &group.comm_ops {
                t = t.max(op.start_time_in_group)
                    + (*self.duration_fn)(op.op_type, op.message_size, use_sharp, self.host_count);
            }
            total += t.max(group.sync_time);
        }
        total
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn host_count(&self) -> u32 {
        self.host_count
    }

    pub fn step_count(&self) -> Option<u32> {
        self.step_count
    }

    pub fn comm_op_groups(&self) -> &[CommOpGroup] {
        &self.comm_op_groups
    }

    pub fn duration_fn(&self) -> &DurationFn {
        &self.duration_fn
    }

    pub fn step_duration_with_sharp(&self) -> f64 {
        self.step_duration_with_sharp
    }

    pub fn step_duration_without_sharp(&self) -> f64 {
        self.step_duration_without_sharp
    }

    pub fn hosts(&self) -> &[NodeId] {
        &self.hosts
    }

    pub fn set_hosts(&mut self, hosts: Vec<NodeId>) {
        assert_eq!(hosts.len(), self.host_count as usize);
        self.hosts = hosts;
    }

    pub fn current_aggr_tree(&self) -> Option<&AggrTree> {
        self.current_aggr_tree.as_ref()
    }

    pub fn next_aggr_tree(&self) -> Option<&AggrTree> {
        self.next_aggr_tree.as_ref()
    }

    /// Install the tree to adopt at the next group boundary. Replacing an
    /// established, different tree counts as a migration; the initial
    /// assignment and a revocation do not.
    pub fn set_next_aggr_tree(&mut self, tree: Option<AggrTree>) {
        if tree.is_some() && self.current_aggr_tree.is_some() && tree != self.current_aggr_tree {
            self.tree_migration_count += 1;
        }
        self.next_aggr_tree = tree;
    }

    fn adopt_next_tree(&mut self) {
        if self.next_aggr_tree != self.current_aggr_tree {
            self.current_aggr_tree = self.next_aggr_tree.clone();
        }
    }

    pub fn tree_migration_count(&self) -> u64 {
        self.tree_migration_count
    }

    pub fn consensus_count(&self) -> u64 {
        self.consensus_count
    }

    pub fn add_consensus_invocation(&mut self) {
        self.consensus_count += 1;
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn current_group_start_time(&self) -> f64 {
        self.group_start_time
    }

    pub fn current_comm_op(&self) -> &CommOp {
        &self.comm_op_groups[self.current_group as usize].comm_ops[self.current_op as usize]
    }

    pub fn remaining_message_size(&self) -> u64 {
        self.current_comm_op().message_size - self.transmitted_in_op
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    pub fn is_transmitting(&self) -> bool {
        self.is_transmitting
    }

    pub fn is_using_sharp(&self) -> bool {
        self.is_transmitting && self.using_sharp
    }

    pub fn transmission_end_time(&self) -> f64 {
        assert!(self.is_transmitting);
        self.transmission_start_time + self.transmission_duration
    }

    // duration of the transmission that is running or just ended
    pub fn transmission_duration(&self) -> f64 {
        self.transmission_duration
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn finish_time(&self) -> f64 {
        self.finish_time
    }

    pub fn duration_with_sharp(&self) -> f64 {
        self.duration_with_sharp
    }

    pub fn duration_without_sharp(&self) -> f64 {
        self.duration_without_sharp
    }

    pub fn used_sharp(&self) -> bool {
        self.duration_with_sharp > 0.0
    }

    /*================================================================================================================*/

    /// Time of the job's next transition. Pure; never earlier than `now`.
    pub fn next_event_time(&self, now: f64) -> f64 {
        if !self.is_started {
            return now;
        }
        assert!(!self.is_finished, "Advancing a finished job");
        let group = &self.comm_op_groups[self.current_group as usize];
        if self.current_op as usize >= group.comm_ops.len() {
            assert!(!self.is_transmitting);
            return now.max(self.group_start_time + group.sync_time);
        }
        if self.is_transmitting {
            return self.transmission_start_time + self.transmission_duration;
        }
        let op = &group.comm_ops[self.current_op as usize];
        now.max(self.waiting_until.unwrap_or(now))
            .max(self.group_start_time + op.start_time_in_group)
    }

    /// Advance one transition. Returns true iff the job just finished.
    pub fn run_next_event(&mut self, now: f64, hooks: &mut dyn JobHooks) -> bool {
        if !self.is_started {
            self.trace_begin_run(now, hooks);
            self.is_started = true;
            self.start_time = now;
            self.group_start_time = now;
            self.adopt_next_tree();
            return false;
        }
        assert!(!self.is_finished, "Advancing a finished job");
        let group_len = self.comm_op_groups[self.current_group as usize].comm_ops.len();
        if self.current_op as usize >= group_len {
            return self.advance_group(now, hooks);
        }
        if self.is_transmitting {
            self.finish_transmission(now, hooks);
            return false;
        }
        self.start_transmission(now, hooks)
    }

    fn trace_begin_run(&self, now: f64, hooks: &mut dyn JobHooks) {
        hooks.trace(Span::Job, true, now, self);
        hooks.trace(Span::Step, true, now, self);
        hooks.trace(Span::Group, true, now, self);
    }

    fn advance_group(&mut self, now: f64, hooks: &mut dyn JobHooks) -> bool {
        assert!(!self.is_transmitting);
        let sync_time = self.comm_op_groups[self.current_group as usize].sync_time;
        assert!(now >= self.group_start_time + sync_time);
        hooks.trace(Span::Group, false, now, self);
        self.current_op = 0;
        self.current_group += 1;
        if self.current_group as usize >= self.comm_op_groups.len() {
            hooks.trace(Span::Step, false, now, self);
            self.current_group = 0;
            self.current_step += 1;
            if self.step_count.map_or(false, |steps| self.current_step >= steps) {
                hooks.trace(Span::Job, false, now, self);
                self.is_finished = true;
                self.finish_time = now;
                return true;
            }
            hooks.trace(Span::Step, true, now, self);
        }
        hooks.trace(Span::Group, true, now, self);
        self.group_start_time = now;
        self.adopt_next_tree();
        false
    }

    fn finish_transmission(&mut self, now: f64, hooks: &mut dyn JobHooks) {
        assert!(now == self.transmission_start_time + self.transmission_duration);
        hooks.trace(Span::Transmission, false, now, self);
        self.is_transmitting = false;
        self.transmitted_in_op += self.transmitting_size;
        let op_size = self.current_comm_op().message_size;
        assert!(self.transmitted_in_op <= op_size);
        if self.transmitted_in_op == op_size {
            hooks.trace(Span::CommOp, false, now, self);
            self.transmitted_in_op = 0;
            self.current_op += 1;
        }
        if self.using_sharp {
            self.duration_with_sharp += self.transmission_duration;
        } else {
            self.duration_without_sharp += self.transmission_duration;
        }
        hooks.after_transmission(self, now, self.using_sharp);
    }

    fn start_transmission(&mut self, now: f64, hooks: &mut dyn JobHooks) -> bool {
        if self.transmitted_in_op == 0 && self.waiting_until.is_none() {
            hooks.trace(Span::CommOp, true, now, self);
        }
        match hooks.before_transmission(self, now) {
            CommOpScheduleResult::Wait(waiting_time) => {
                assert!(waiting_time > 0.0, "Waiting time must be positive");
                hooks.trace(Span::Waiting, true, now, self);
                self.waiting_until = Some(now + waiting_time);
            }
            CommOpScheduleResult::Transmit {
                use_sharp,
                message_size,
            } => {
                if self.waiting_until.take().is_some() {
                    hooks.trace(Span::Waiting, false, now, self);
                }
                let op_type = self.current_comm_op().op_type;
                assert!(
                    self.transmitted_in_op + message_size <= self.current_comm_op().message_size,
                    "Transmission larger than the op's remaining bytes"
                );
                self.is_transmitting = true;
                self.using_sharp = use_sharp;
                self.transmitting_size = message_size;
                self.transmission_duration = (*self.duration_fn)(op_type, message_size, use_sharp, self.host_count);
                self.transmission_start_time = now;
                hooks.trace(Span::Transmission, true, now, self);
            }
        }
        false
    }
}

/*====================================================================================================================*/
