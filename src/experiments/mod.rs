pub mod accelerate_effectiveness;
pub mod ablation;
pub mod job_placement;
pub mod large_scale;
pub mod record_cluster_state;
pub mod sharing;
pub mod sharing_overhead;
pub mod tree_building;
pub mod tree_conflicts;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::controller::JobSource;
use crate::data::load_model_info;
use crate::job::{CommOpGroup, DurationFn, Job};

pub type ExperimentResult = Result<(), Box<dyn Error>>;

lazy_static! {
    /// Model-info traces shipped alongside the binary.
    pub static ref MODEL_LIST: Vec<&'static str> = vec![
        "traces/vgg16-16.json",
        "traces/vgg19-16.json",
        "traces/resnet50-16.json",
        "traces/resnet152-16.json",
        "traces/inception3-16.json",
        "traces/bert-base-16.json",
        "traces/bert-large-16.json",
        "traces/gpt2-16.json",
        "traces/opt-350m-16.json",
        "traces/opt-1-3b-16.json",
    ];

    /// Host-count distributions, (host count, weight) pairs per trace.
    pub static ref HOST_COUNT_TRACES: Vec<Vec<(u32, u32)>> = vec![
        vec![(1, 30), (2, 20), (4, 20), (8, 15), (16, 10), (32, 5)],
        vec![(1, 10), (2, 10), (4, 25), (8, 25), (16, 20), (32, 10)],
        vec![(1, 50), (2, 25), (4, 15), (8, 6), (16, 3), (32, 1)],
        vec![(2, 20), (4, 30), (8, 30), (16, 15), (32, 5)],
        vec![(1, 20), (2, 20), (4, 20), (8, 20), (16, 20)],
        vec![(4, 25), (8, 35), (16, 25), (32, 10), (64, 5)],
        vec![(1, 40), (4, 30), (16, 20), (64, 10)],
        vec![(2, 35), (8, 35), (32, 25), (128, 5)],
        vec![(1, 15), (2, 15), (4, 20), (8, 20), (16, 15), (32, 10), (64, 5)],
        vec![(8, 40), (16, 30), (32, 20), (64, 10)],
    ];

    pub static ref STEP_COUNT_LIST: Vec<u32> = vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
}

/*====================================================================================================================*/

/// Load every model in MODEL_LIST once, yielding (name, comm-op groups).
pub fn load_models(gpu_speedup_ratio: f64) -> Result<Vec<(String, Vec<CommOpGroup>)>, Box<dyn Error>> {
    let mut models = Vec::with_capacity(MODEL_LIST.len());
    for &model in MODEL_LIST.iter() {
        models.push((model.to_string(), load_model_info(model, gpu_speedup_ratio)?));
    }
    Ok(models)
}

/// Random job stream: model, host count and step count are drawn from the
/// given tables with a fixed seed, so a (seed, trace) pair names one exact
/// workload.
pub fn random_job_source(
    seed: u64,
    job_count: u32,
    models: Vec<(String, Vec<CommOpGroup>)>,
    host_count_trace: Vec<(u32, u32)>,
    duration_fn: DurationFn,
) -> JobSource {
    assert!(!models.is_empty());
    let weights: Vec<u32> = host_count_trace.iter().map(|&(_, weight)| weight).collect();
    let host_counts: Vec<u32> = host_count_trace.iter().map(|&(count, _)| count).collect();
    let weighted = WeightedIndex::new(weights).expect("Host-count trace must have positive weights");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut produced = 0;
    Box::new(move || {
        if produced >= job_count {
            return None;
        }
        produced += 1;
        let (model_name, comm_op_groups) = models[rng.gen_range(0..models.len())].clone();
        let host_count = host_counts[weighted.sample(&mut rng)];
        let step_count = STEP_COUNT_LIST[rng.gen_range(0..STEP_COUNT_LIST.len())];
        Some(Job::new(
            model_name,
            host_count,
            Some(step_count),
            comm_op_groups,
            Arc::clone(&duration_fn),
        ))
    })
}

/// Write `results/<name>.json`, creating the directory on demand.
pub fn write_results(name: &str, value: &impl Serialize) -> Result<PathBuf, Box<dyn Error>> {
    fs::create_dir_all("results")?;
    let path = PathBuf::from("results").join(format!("{name}.json"));
    let file = fs::File::create(&path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), value)?;
    Ok(path)
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::random_job_source;
    use crate::job::{CommOp, CommOpGroup, CommOpType};

    fn test_models() -> Vec<(String, Vec<CommOpGroup>)> {
        vec![(
            "model-a".to_string(),
            vec![CommOpGroup {
                comm_ops: vec![CommOp {
                    start_time_in_group: 0.0,
                    message_size: 64,
                    op_type: CommOpType::AllReduce,
                }],
                sync_time: 1.0,
            }],
        )]
    }

    #[test]
    fn test_job_source_is_finite_and_seeded() {
        let duration_fn: crate::job::DurationFn = Arc::new(|_, _, _, _| 1.0);
        let make = || {
            random_job_source(
                42,
                5,
                test_models(),
                vec![(2, 1), (4, 1)],
                Arc::clone(&duration_fn),
            )
        };

        let mut source_a = make();
        let mut source_b = make();
        let mut count = 0;
        while let (Some(job_a), Some(job_b)) = (source_a(), source_b()) {
            assert_eq!(job_a.host_count(), job_b.host_count());
            assert_eq!(job_a.step_count(), job_b.step_count());
            count += 1;
        }
        assert_eq!(count, 5);
        assert!(source_a().is_none());
    }
}
