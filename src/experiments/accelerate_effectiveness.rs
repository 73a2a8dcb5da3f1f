use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use super::{load_models, write_results, ExperimentResult};
use crate::data::DurationCalculator;
use crate::job::Job;

/// Where acceleration matters: per-model single-step duration as a function
/// of fabric bandwidth, from the closed-form step model (no event loop).
pub fn run() -> ExperimentResult {
    let models = load_models(1.0)?;
    let mut result: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();

    let mut bandwidth = 1e8;
    while bandwidth <= 20e9 {
        let duration_fn = DurationCalculator::new(bandwidth, 1.0, 0.0).into_duration_fn();
        for (model_name, comm_op_groups) in &models {
            let job = Job::new(
                model_name.clone(),
                2,
                Some(1),
                comm_op_groups.clone(),
                Arc::clone(&duration_fn),
            );
            result
                .entry(model_name.clone())
                .or_default()
                .push((bandwidth, job.step_duration_without_sharp()));
        }
        bandwidth += 1e8;
    }

    let path = write_results("accelerate_effectiveness", &result)?;
    info!("written to {}", path.display());
    Ok(())
}
