use std::sync::Arc;

use log::info;

use super::{load_models, random_job_source, write_results, ExperimentResult, HOST_COUNT_TRACES};
use crate::controller::{AllocationController, SimulationResult};
use crate::data::DurationCalculator;
use crate::fat_tree::FatTree;
use crate::job::CommOpGroup;
use crate::policies::{
    FirstHostsPolicy, FirstTreePolicy, GreedySharingPolicy, HostAllocationPolicy, SharingPolicy, SmartHostsPolicy,
    SmartSharingPolicy, SmartTreePolicy, TreeBuildingPolicy,
};
use crate::resources::FatTreeResource;
use crate::utils::parallel;

const JOB_COUNT: u32 = 2000;
const SEED: u64 = 42;

fn simulate(
    smart_hosts: bool,
    smart_trees: bool,
    smart_sharing: bool,
    models: Vec<(String, Vec<CommOpGroup>)>,
) -> SimulationResult {
    let duration_fn = DurationCalculator::new(12_500_000_000.0, 2.0, 0.000_05).into_duration_fn();
    let topology = Arc::new(FatTree::with_degree(3, 16));
    let resources = FatTreeResource::new(topology, Some(1), None);
    let job_source = random_job_source(SEED, JOB_COUNT, models, HOST_COUNT_TRACES[0].clone(), duration_fn);

    let host_policy: Box<dyn HostAllocationPolicy> = if smart_hosts {
        Box::new(SmartHostsPolicy::new(0.5))
    } else {
        Box::new(FirstHostsPolicy)
    };
    let tree_policy: Box<dyn TreeBuildingPolicy> = if smart_trees {
        Box::new(SmartTreePolicy::new(Some(5), true, SEED))
    } else {
        Box::new(FirstTreePolicy::new(true))
    };
    let sharing_policy: Box<dyn SharingPolicy> = if smart_sharing {
        Box::new(SmartSharingPolicy::new())
    } else {
        Box::new(GreedySharingPolicy)
    };

    let mut controller = AllocationController::new(resources, job_source, host_policy, tree_policy, sharing_policy);
    controller.run_simulation(None)
}

/// Toggle each smart policy independently: 2^3 configurations over one trace.
pub fn run() -> ExperimentResult {
    let models = load_models(1.0)?;
    let mut tasks: Vec<Box<dyn FnOnce() -> SimulationResult + Send>> = Vec::new();
    for mask in 0..8u32 {
        let models = models.clone();
        tasks.push(Box::new(move || {
            simulate(mask & 4 != 0, mask & 2 != 0, mask & 1 != 0, models)
        }));
    }
    let results = parallel::run_all(tasks);
    let path = write_results("ablation_study", &results)?;

    for (mask, result) in results.iter().enumerate() {
        info!(
            "{}{}{} jct_score={:.6} sharp_ratio={:.6} utilization={:.4} sharp_utilization={:.4}",
            (mask >> 2) & 1,
            (mask >> 1) & 1,
            mask & 1,
            result.jct_score,
            result.sharp_ratio,
            result.cluster_utilization,
            result.sharp_utilization.unwrap_or(0.0),
        );
    }
    info!("written to {}", path.display());
    Ok(())
}
