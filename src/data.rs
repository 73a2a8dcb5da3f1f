use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::job::{CommOp, CommOpGroup, CommOpType, DurationFn};

/*====================================================================================================================*/

/// Closed-form transmission timing: a latency floor plus bytes over
/// bandwidth, with the bandwidth scaled up by `sharp_acc_ratio` for SHARP
/// AllReduce traffic.
#[derive(Debug, Clone, Copy)]
pub struct DurationCalculator {
    pub bandwidth: f64, // bytes per second
    pub sharp_acc_ratio: f64,
    pub latency: f64, // seconds
}

impl DurationCalculator {
    pub fn new(bandwidth: f64, sharp_acc_ratio: f64, latency: f64) -> Self {
        assert!(bandwidth > 0.0, "Bandwidth must be positive");
        assert!(sharp_acc_ratio >= 1.0, "SHARP acceleration ratio must be at least 1");
        assert!(latency >= 0.0, "Latency must not be negative");
        DurationCalculator {
            bandwidth,
            sharp_acc_ratio,
            latency,
        }
    }

    pub fn calc(&self, op_type: CommOpType, message_size: u64, use_sharp: bool, host_count: u32) -> f64 {
        if host_count == 1 {
            return self.latency;
        }
        let bandwidth = if use_sharp && op_type == CommOpType::AllReduce {
            self.bandwidth * self.sharp_acc_ratio
        } else {
            self.bandwidth
        };
        self.latency + message_size as f64 / bandwidth
    }

    pub fn into_duration_fn(self) -> DurationFn {
        Arc::new(move |op_type, message_size, use_sharp, host_count| {
            self.calc(op_type, message_size, use_sharp, host_count)
        })
    }
}

/*====================================================================================================================*/

#[derive(Debug, Error)]
pub enum ModelInfoError {
    #[error("failed to read model info {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model info {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct ModelInfoFile {
    duration: f64,
    allreduces: Vec<AllReduceEntry>,
}

#[derive(Deserialize)]
struct AllReduceEntry {
    start: f64,
    size: u64,
}

/// Load a model-info file into a single comm-op group: the step duration
/// becomes the group's sync time and every allreduce becomes one op. The GPU
/// speedup ratio compresses the compute timeline (sync time and op offsets)
/// without touching message sizes.
pub fn load_model_info(path: impl AsRef<Path>, gpu_speedup_ratio: f64) -> Result<Vec<CommOpGroup>, ModelInfoError> {
    assert!(gpu_speedup_ratio > 0.0);
    let path_str = path.as_ref().display().to_string();
    let file = File::open(&path).map_err(|source| ModelInfoError::Io {
        path: path_str.clone(),
        source,
    })?;
    let info: ModelInfoFile = serde_json::from_reader(BufReader::new(file)).map_err(|source| ModelInfoError::Parse {
        path: path_str,
        source,
    })?;

    let comm_ops = info
        .allreduces
        .iter()
        .map(|entry| CommOp {
            start_time_in_group: entry.start / gpu_speedup_ratio,
            message_size: entry.size,
            op_type: CommOpType::AllReduce,
        })
        .collect();
    Ok(vec![CommOpGroup {
        comm_ops,
        sync_time: info.duration / gpu_speedup_ratio,
    }])
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{load_model_info, DurationCalculator};
    use crate::job::CommOpType;

    #[test]
    fn test_duration_calculator() {
        let calc = DurationCalculator::new(100.0, 2.0, 0.5);

        // single host: latency only
        assert_eq!(calc.calc(CommOpType::AllReduce, 1000, true, 1), 0.5);
        // no sharp: latency + size / bandwidth
        assert_eq!(calc.calc(CommOpType::AllReduce, 1000, false, 4), 10.5);
        // sharp allreduce: bandwidth doubled
        assert_eq!(calc.calc(CommOpType::AllReduce, 1000, true, 4), 5.5);
    }

    #[test]
    fn test_load_model_info() {
        let dir = std::env::temp_dir();
        let path = dir.join("sharpsim_model_info_test.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"duration": 2.0, "allreduces": [{{"start": 0.5, "size": 1000}}, {{"start": 1.0, "size": 2000}}]}}"#
        )
        .unwrap();

        let groups = load_model_info(&path, 2.0).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sync_time, 1.0);
        assert_eq!(groups[0].comm_ops.len(), 2);
        assert_eq!(groups[0].comm_ops[0].start_time_in_group, 0.25);
        assert_eq!(groups[0].comm_ops[0].message_size, 1000);
        assert_eq!(groups[0].comm_ops[1].message_size, 2000);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_model_info_missing_file() {
        assert!(load_model_info("definitely/not/there.json", 1.0).is_err());
    }
}
