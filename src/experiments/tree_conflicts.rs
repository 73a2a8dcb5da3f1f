use std::sync::Arc;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{write_results, ExperimentResult, STEP_COUNT_LIST};
use crate::controller::{AllocationController, JobSource};
use crate::data::{load_model_info, DurationCalculator};
use crate::fat_tree::FatTree;
use crate::job::Job;
use crate::policies::{FirstHostsPolicy, FirstTreePolicy, GreedySharingPolicy};
use crate::resources::FatTreeResource;

const JOB_COUNT: u32 = 5000;
const SEED: u64 = 42;
const MODEL: &str = "traces/opt-350m-16.json";

/// Conflict pressure under naive tree building: one model, uniform host
/// counts, first-fit everything; how many jobs still manage to engage SHARP.
pub fn run() -> ExperimentResult {
    // slower fabric than the default settings to stress conflicts
    let duration_fn = DurationCalculator::new(2_000_000_000.0, 1.0, 0.000_05).into_duration_fn();
    let comm_op_groups = load_model_info(MODEL, 1.0)?;

    let job_source: JobSource = {
        let duration_fn = duration_fn.clone();
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut produced = 0;
        Box::new(move || {
            if produced >= JOB_COUNT {
                return None;
            }
            produced += 1;
            let host_count = rng.gen_range(1..=16);
            let step_count = STEP_COUNT_LIST[rng.gen_range(0..STEP_COUNT_LIST.len())];
            Some(Job::new(
                MODEL,
                host_count,
                Some(step_count),
                comm_op_groups.clone(),
                duration_fn.clone(),
            ))
        })
    };

    let topology = Arc::new(FatTree::with_degree(3, 16));
    let resources = FatTreeResource::new(topology, Some(1), None);
    let mut controller = AllocationController::new(
        resources,
        job_source,
        Box::new(FirstHostsPolicy),
        Box::new(FirstTreePolicy::new(true)),
        Box::new(GreedySharingPolicy),
    );
    let result = controller.run_simulation(None);

    info!(
        "finished {} jobs, {} engaged SHARP, sharp_ratio={:.6}",
        result.finished_job_count, result.sharp_enabled_job_count, result.sharp_ratio
    );
    info!(
        "{} candidate trees rejected by conflicts, {} jobs fell back to the plain network",
        result.tree_conflict_count, result.tree_fallback_count
    );
    let path = write_results("tree_conflicts", &result)?;
    info!("written to {}", path.display());
    Ok(())
}
