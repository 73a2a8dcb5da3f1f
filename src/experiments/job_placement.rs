use std::sync::Arc;

use log::info;
use serde_json::json;

use super::{load_models, random_job_source, write_results, ExperimentResult, HOST_COUNT_TRACES};
use crate::controller::{AllocationController, SimulationResult};
use crate::data::DurationCalculator;
use crate::fat_tree::FatTree;
use crate::job::CommOpGroup;
use crate::policies::{
    FirstHostsPolicy, FirstTreePolicy, GreedySharingPolicy, HostAllocationPolicy, SmartHostsPolicy,
};
use crate::resources::FatTreeResource;
use crate::utils::parallel;

const JOB_COUNT: u32 = 1000;
const SEED: u64 = 42;

fn simulate(rank: usize, smart_stack: bool, models: Vec<(String, Vec<CommOpGroup>)>) -> SimulationResult {
    let duration_fn = DurationCalculator::new(12_500_000_000.0, 2.0, 0.000_05).into_duration_fn();
    // the 8x8 grid varies the oversubscription of the two upper layers
    let up_mid = (rank / 8) as u32 + 1;
    let up_top = (rank % 8) as u32 + 1;
    let topology = Arc::new(FatTree::new(&[8, 8, 16], &[1, up_mid, up_top]));
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
    controller.run_simulation(None)
}

/// Placement study over an 8x8 grid of up-link provisioning factors,
/// smart placement against first-fit.
pub fn run() -> ExperimentResult {
    let models = load_models(1.0)?;

    let smart_models = models.clone();
    let result_smart = parallel::run_ranks(
        move |rank| simulate(rank, true, smart_models.clone()),
        64,
    );
    let baseline_models = models;
    let result_baseline = parallel::run_ranks(
        move |rank| simulate(rank, false, baseline_models.clone()),
        64,
    );

    let path = write_results(
        "job_placement",
        &json!({
            "smart": result_smart,
            "baseline": result_baseline,
        }),
    )?;

    for (label, results) in [("smart", &result_smart), ("baseline", &result_baseline)] {
        info!("========= {label} jct_score_weighted =========");
        for row in 0..8 {
            let line: Vec<String> = (0..8)
                .map(|col| format!("{:.4}", results[row * 8 + col].jct_score_weighted))
                .collect();
            info!("{}", line.join(" "));
        }
    }
    info!("written to {}", path.display());
    Ok(())
}
