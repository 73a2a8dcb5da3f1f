use std::sync::Arc;

use log::info;

use super::{load_models, random_job_source, write_results, ExperimentResult, HOST_COUNT_TRACES};
use crate::controller::{AllocationController, ClusterSnapshot};
use crate::data::DurationCalculator;
use crate::fat_tree::FatTree;
use crate::job::CommOpGroup;
use crate::policies::{
    FirstHostsPolicy, FirstTreePolicy, GreedySharingPolicy, HostAllocationPolicy, SmartHostsPolicy,
};
use crate::resources::FatTreeResource;

const JOB_COUNT: u32 = 2000;
const SEED: u64 = 42;
const SNAPSHOT_INTERVAL: f64 = 1000.0;

fn simulate(smart_stack: bool, models: Vec<(String, Vec<CommOpGroup>)>) -> Vec<ClusterSnapshot> {
    let duration_fn = DurationCalculator::new(12_500_000_000.0, 2.0, 0.000_05).into_duration_fn();
    let topology = Arc::new(FatTree::with_degree(3, 16));
    let resources = FatTreeResource::new(topology, Some(1), None);
    let job_source = random_job_source(SEED, JOB_COUNT, models, HOST_COUNT_TRACES[0].clone(), duration_fn);

    let host_policy: Box<dyn HostAllocationPolicy> = if smart_stack {
        Box::new(SmartHostsPolicy::new(0.5))
    } else {
        Box::new(FirstHostsPolicy)
    };
    let mut controller = AllocationController::new(
        resources,
        job_source,
        host_policy,
        Box::new(FirstTreePolicy::new(true)),
        Box::new(GreedySharingPolicy),
    );
    controller.enable_cluster_state_recording(SNAPSHOT_INTERVAL);
    controller.run_simulation(None);
    controller.take_cluster_snapshots()
}

/// Periodic host-occupancy snapshots, smart placement against first-fit, for
/// fragmentation visualizations.
pub fn run() -> ExperimentResult {
    let models = load_models(1.0)?;

    let snapshots_smart = simulate(true, models.clone());
    let path_smart = write_results("cluster_state_smart", &snapshots_smart)?;
    info!("{} snapshots written to {}", snapshots_smart.len(), path_smart.display());

    let snapshots_baseline = simulate(false, models);
    let path_baseline = write_results("cluster_state_baseline", &snapshots_baseline)?;
    info!(
        "{} snapshots written to {}",
        snapshots_baseline.len(),
        path_baseline.display()
    );
    Ok(())
}
