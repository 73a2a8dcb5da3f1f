use log::info;
use serde_json::json;

use super::{load_models, write_results, ExperimentResult, MODEL_LIST};
use crate::controller::{simulate_sharing_group, SharingJobSpec};
use crate::data::DurationCalculator;
use crate::policies::SmartSharingPolicy;

const SUBSIM_MAX_TIME: f64 = 1000.0;

/// Pairwise sharing study: every pair of models as a two-job sharing group,
/// scored by the JCT score the smart sharing policy reaches.
pub fn run() -> ExperimentResult {
    let duration_fn = DurationCalculator::new(12_500_000_000.0, 1.5, 0.000_05).into_duration_fn();
    let models = load_models(1.5)?;

    let mut result_matrix = vec![vec![0.0f64; models.len()]; models.len()];
    for (idx1, (model1, groups1)) in models.iter().enumerate() {
        for (idx2, (model2, groups2)) in models.iter().enumerate() {
            info!(
                "running simulation #{} of {}",
                idx1 * models.len() + idx2 + 1,
                models.len() * models.len()
            );
            let specs = vec![
                SharingJobSpec {
                    host_count: 2,
                    model_name: model1.clone(),
                    comm_op_groups: groups1.clone(),
                },
                SharingJobSpec {
                    host_count: 2,
                    model_name: model2.clone(),
                    comm_op_groups: groups2.clone(),
                },
            ];
            let result = simulate_sharing_group(
                specs,
                duration_fn.clone(),
                Box::new(SmartSharingPolicy::new()),
                SUBSIM_MAX_TIME,
            );
            result_matrix[idx1][idx2] = result.jct_score;
        }
    }

    let path = write_results(
        "sharing",
        &json!({
            "model_list": &*MODEL_LIST,
            "result": result_matrix,
        }),
    )?;

    let scores: Vec<f64> = result_matrix
        .iter()
        .flatten()
        .copied()
        .filter(|score| score.is_finite())
        .collect();
    info!(
        "average JCT score: {:.6} ({} pairs), written to {}",
        scores.iter().sum::<f64>() / scores.len() as f64,
        scores.len(),
        path.display()
    );
    Ok(())
}
