use std::sync::Arc;

use log::info;

use super::{load_models, random_job_source, write_results, ExperimentResult, HOST_COUNT_TRACES};
use crate::controller::AllocationController;
use crate::data::DurationCalculator;
use crate::fat_tree::FatTree;
use crate::policies::{SmartHostsPolicy, SmartSharingPolicy, SmartTreePolicy};
use crate::resources::FatTreeResource;

const JOB_COUNT: u32 = 2000;
const SEED: u64 = 42;

/// Cost of the smart sharing policy's arbitration path under the full smart
/// stack: how many times it is called, the wall-clock time those calls take,
/// and how often they go through the consensus protocol.
pub fn run() -> ExperimentResult {
    let duration_fn = DurationCalculator::new(12_500_000_000.0, 2.0, 0.000_05).into_duration_fn();
    let models = load_models(1.0)?;
    let topology = Arc::new(FatTree::with_degree(3, 16));
    let resources = FatTreeResource::new(topology, None, Some(1));
    let job_source = random_job_source(SEED, JOB_COUNT, models, HOST_COUNT_TRACES[0].clone(), duration_fn);
    let mut controller = AllocationController::new(
        resources,
        job_source,
        Box::new(SmartHostsPolicy::new(0.5)),
        Box::new(SmartTreePolicy::new(Some(5), true, SEED)),
        Box::new(SmartSharingPolicy::new()),
    );
    let result = controller.run_simulation(None);

    info!(
        "sharing policy calls: {} taking {:.3}ms total ({:.6}ms per call)",
        result.sharing_policy_call_count,
        result.time_cost_sharing_ms,
        result.time_cost_sharing_ms / result.sharing_policy_call_count.max(1) as f64,
    );
    info!(
        "consensus invocations: {} ({:.6} per simulated JCT second)",
        result.consensus_count, result.consensus_frequency
    );
    let path = write_results("sharing_overhead", &result)?;
    info!("written to {}", path.display());
    Ok(())
}
