use std::sync::Arc;

use log::info;

use super::{load_models, random_job_source, write_results, ExperimentResult, HOST_COUNT_TRACES};
use crate::controller::{AllocationController, SimulationResult};
use crate::data::DurationCalculator;
use crate::fat_tree::FatTree;
use crate::job::CommOpGroup;
use crate::policies::{
    FirstHostsPolicy, FirstTreePolicy, GreedySharingPolicy, SmartHostsPolicy, SmartSharingPolicy, SmartTreePolicy,
};
use crate::resources::FatTreeResource;
use crate::utils::parallel;

const JOB_COUNT: u32 = 2000;
const SEED: u64 = 42;

fn simulate(smart_stack: bool, trace_idx: usize, models: Vec<(String, Vec<CommOpGroup>)>) -> SimulationResult {
    let duration_fn = DurationCalculator::new(12_500_000_000.0, 2.0, 0.000_05).into_duration_fn();
    let topology = Arc::new(FatTree::with_degree(3, 16));
    let resources = FatTreeResource::new(topology, None, Some(1));
    let job_source = random_job_source(
        SEED,
        JOB_COUNT,
        models,
        HOST_COUNT_TRACES[trace_idx].clone(),
        duration_fn,
    );
    let mut controller = if smart_stack {
        AllocationController::new(
            resources,
            job_source,
            Box::new(SmartHostsPolicy::new(0.5)),
            Box::new(SmartTreePolicy::new(Some(5), true, SEED)),
            Box::new(SmartSharingPolicy::new()),
        )
    } else {
        AllocationController::new(
            resources,
            job_source,
            Box::new(FirstHostsPolicy),
            Box::new(FirstTreePolicy::new(true)),
            Box::new(GreedySharingPolicy),
        )
    };
    controller.run_simulation(None)
}

/// Full-cluster study: every host-count trace, with and without the smart
/// policy stack, all runs fanned out over the worker pool.
pub fn run() -> ExperimentResult {
    let models = load_models(1.0)?;
    let mut tasks: Vec<Box<dyn FnOnce() -> SimulationResult + Send>> = Vec::new();
    for trace_idx in 0..HOST_COUNT_TRACES.len() {
        for smart_stack in [true, false] {
            let models = models.clone();
            tasks.push(Box::new(move || simulate(smart_stack, trace_idx, models)));
        }
    }
    let results = parallel::run_all(tasks);
    let path = write_results("large_scale_simulation", &results)?;

    for (idx, result) in results.iter().enumerate() {
        info!(
            "trace #{}, smart stack {}: jct_score_weighted={:.6} sharp_ratio={:.6} utilization={:.4}",
            idx / 2,
            if idx % 2 == 0 { "enabled" } else { "disabled" },
            result.jct_score_weighted,
            result.sharp_ratio_weighted,
            result.cluster_utilization,
        );
    }
    info!("written to {}", path.display());
    Ok(())
}
