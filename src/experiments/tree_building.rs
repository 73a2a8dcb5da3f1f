use std::sync::Arc;

use log::info;

use super::{load_models, random_job_source, write_results, ExperimentResult, HOST_COUNT_TRACES};
use crate::controller::{AllocationController, SimulationResult};
use crate::data::DurationCalculator;
use crate::fat_tree::FatTree;
use crate::job::CommOpGroup;
use crate::policies::{SmartHostsPolicy, SmartSharingPolicy, SmartTreePolicy};
use crate::resources::FatTreeResource;
use crate::utils::parallel;

const JOB_COUNT: u32 = 1000;
const SEED: u64 = 42;

fn simulate(max_tree_count: Option<usize>, models: Vec<(String, Vec<CommOpGroup>)>) -> SimulationResult {
    let duration_fn = DurationCalculator::new(12_500_000_000.0, 2.0, 0.000_05).into_duration_fn();
    let topology = Arc::new(FatTree::with_degree(3, 16));
    let resources = FatTreeResource::new(topology, Some(1), None);
    let job_source = random_job_source(SEED, JOB_COUNT, models, HOST_COUNT_TRACES[0].clone(), duration_fn);
    let mut controller = AllocationController::new(
        resources,
        job_source,
        Box::new(SmartHostsPolicy::new(0.5)),
        Box::new(SmartTreePolicy::new(max_tree_count, true, SEED)),
        Box::new(SmartSharingPolicy::new()),
    );
    controller.run_simulation(None)
}

/// Sweep the candidate-tree cap of the smart tree policy from 1 to 10 and
/// finally unlimited, watching solution quality against policy cost.
pub fn run() -> ExperimentResult {
    let models = load_models(1.0)?;
    let mut tasks: Vec<Box<dyn FnOnce() -> SimulationResult + Send>> = Vec::new();
    for count in 1..=10usize {
        let models = models.clone();
        tasks.push(Box::new(move || simulate(Some(count), models)));
    }
    {
        let models = models.clone();
        tasks.push(Box::new(move || simulate(None, models)));
    }
    let results = parallel::run_all(tasks);
    let path = write_results("tree_building", &results)?;

    for (idx, result) in results.iter().enumerate() {
        let label = if idx < 10 { format!("{}", idx + 1) } else { "all".to_string() };
        let jobs = result.finished_job_count.max(1) as f64;
        info!("max_tree_count={label}:");
        info!(
            "  host allocation per job: {:.4}ms, tree building per job: {:.4}ms",
            result.time_cost_host_allocation_ms / jobs,
            result.time_cost_tree_building_ms / jobs,
        );
        info!(
            "  tree_migration_count={} jct_score_weighted={:.6} sharp_ratio_weighted={:.6} sharp_utilization={:.2}%",
            result.tree_migration_count,
            result.jct_score_weighted,
            result.sharp_ratio_weighted,
            result.sharp_utilization.unwrap_or(0.0) * 100.0,
        );
    }
    info!("written to {}", path.display());
    Ok(())
}
