mod controller;
mod data;
mod experiments;
mod fat_tree;
mod job;
mod policies;
mod resources;
mod sharing_group;
mod trace;
mod utils;

pub use controller::{AllocationController, SimulationResult};
pub use fat_tree::{AggrTree, FatTree};
pub use job::{CommOp, CommOpGroup, CommOpScheduleResult, CommOpType, Job};
pub use resources::FatTreeResource;

use experiments::ExperimentResult;

/*====================================================================================================================*/

const EXPERIMENTS: &[(&str, fn() -> ExperimentResult)] = &[
    ("sharing", experiments::sharing::run),
    ("large-scale", experiments::large_scale::run),
    ("ablation", experiments::ablation::run),
    ("tree-building", experiments::tree_building::run),
    ("job-placement", experiments::job_placement::run),
    ("sharing-overhead", experiments::sharing_overhead::run),
    ("tree-conflicts", experiments::tree_conflicts::run),
    ("accelerate-effectiveness", experiments::accelerate_effectiveness::run),
    ("record-cluster-state", experiments::record_cluster_state::run),
];

fn print_experiment_list() {
    eprintln!("known experiments:");
    for (name, _) in EXPERIMENTS {
        eprintln!("  {name}");
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: {} <experiment>", args.first().map_or("sharpsim", String::as_str));
        print_experiment_list();
        std::process::exit(2);
    }

    let Some((_, run)) = EXPERIMENTS.iter().find(|(name, _)| *name == args[1]) else {
        eprintln!("unknown experiment \"{}\"", args[1]);
        print_experiment_list();
        std::process::exit(1);
    };

    if let Err(error) = run() {
        eprintln!("experiment \"{}\" failed: {error}", args[1]);
        std::process::exit(1);
    }
}
