use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::controller::{simulate_sharing_group, SharingJobSpec};
use crate::fat_tree::AggrTree;
use crate::job::Job;
use crate::policies::{SmartSharingPolicy, TreeBuildingPolicy};
use crate::resources::FatTreeResource;
use crate::utils::{Graph, MeanStdTracker, UnionFind};

// largest sharing group the lookahead will try to assemble
const MAX_SHARING_JOB_COUNT: usize = 4;
// sub-simulations are cut off after this much simulated time
const SUBSIM_MAX_TIME: f64 = 1000.0;
// per-job-count-class pruning bound: mean + SIGMA * std, floored
const LOOKAHEAD_SIGMA: f64 = 3.0;
const LOOKAHEAD_BOUND_FLOOR: f64 = 0.05;
// classes need this many samples before the bound is trusted
const LOOKAHEAD_MIN_SAMPLES: u32 = 8;

/*====================================================================================================================*/

/// Conflict-graph tree builder. Candidate aggregation trees of all live jobs
/// form a weighted graph (weight = owner's host count, edges = hardware
/// conflicts plus same-job exclusivity); a maximum weighted independent set
/// picks the trees to install, trees adjacent to exactly one chosen tree are
/// greedily attached to that sharing opportunity, and an optional lookahead
/// merges groups whenever a joint sub-simulation scores better than running
/// them apart.
pub struct SmartTreePolicy {
    max_tree_count: Option<usize>,
    enable_lookahead: bool,
    rng: StdRng,

    graph: Graph,
    node_trees: Vec<AggrTree>,
    node_jobs: Vec<u32>,

    subsim_cache: HashMap<Vec<(u32, String)>, f64>,
    class_trackers: HashMap<usize, MeanStdTracker>,
    fallback_count: u64,
}

impl SmartTreePolicy {
    pub fn new(max_tree_count: Option<usize>, enable_lookahead: bool, seed: u64) -> Self {
        assert!(max_tree_count.map_or(true, |count| count > 0));
        SmartTreePolicy {
            max_tree_count,
            enable_lookahead,
            rng: StdRng::seed_from_u64(seed),
            graph: Graph::new(),
            node_trees: Vec::new(),
            node_jobs: Vec::new(),
            subsim_cache: HashMap::new(),
            class_trackers: HashMap::new(),
            fallback_count: 0,
        }
    }

    // drop graph nodes whose owning job has left the cluster
    fn project_to_live_jobs(&mut self, jobs: &[Job]) {
        let alive: HashSet<u32> = jobs.iter().map(|job| job.id()).collect();
        let keep: Vec<bool> = self.node_jobs.iter().map(|job_id| alive.contains(job_id)).collect();
        if keep.iter().all(|&kept| kept) {
            return;
        }
        let (graph, old_of_new) = self.graph.subgraph(&keep);
        self.graph = graph;
        self.node_trees = old_of_new
            .iter()
            .map(|&old| self.node_trees[old as usize].clone())
            .collect();
        self.node_jobs = old_of_new.iter().map(|&old| self.node_jobs[old as usize]).collect();
    }

    // enumerate candidate roots of a job, sampling when there are too many;
    // the sample keeps enumeration order so runs with one seed reproduce
    fn add_candidates(&mut self, resources: &FatTreeResource, job: &Job) {
        let topology = resources.topology();
        let roots = topology.closest_common_ancestors(job.hosts());
        let chosen_roots = match self.max_tree_count {
            Some(max) if max < roots.len() => {
                let mut picks: Vec<usize> = (0..roots.len()).collect();
                picks.shuffle(&mut self.rng);
                picks.truncate(max);
                picks.sort_unstable();
                picks.into_iter().map(|idx| roots[idx]).collect()
            }
            _ => roots,
        };
        for root in chosen_roots {
            let tree = topology.aggregation_tree(job.hosts(), root);
            let node = self.graph.add_node(job.host_count());
            for other in 0..node {
                if self.node_jobs[other as usize] == job.id()
                    || resources.check_tree_pair_conflict(&tree, &self.node_trees[other as usize])
                {
                    self.graph.add_edge(node, other);
                }
            }
            self.node_trees.push(tree);
            self.node_jobs.push(job.id());
        }
    }

    fn assign_from_mis(&mut self, jobs: &mut [Job]) {
        let job_position: HashMap<u32, usize> = jobs
            .iter()
            .enumerate()
            .map(|(position, job)| (job.id(), position))
            .collect();
        let mis = self.graph.calc_max_independent_set();

        let mut mis_neighbor_count = vec![0u32; self.graph.node_count()];
        for &center in &mis {
            for &neighbor in self.graph.neighbors(center) {
                mis_neighbor_count[neighbor as usize] += 1;
            }
        }

        for &center in &mis {
            let center_job = self.node_jobs[center as usize];
            jobs[job_position[&center_job]].set_next_aggr_tree(Some(self.node_trees[center as usize].clone()));

            // attach trees that touch only this chosen tree, heaviest job
            // first, one tree per job
            let neighbors = self.graph.neighbors(center).to_vec();
            let mut available: Vec<bool> = neighbors
                .iter()
                .map(|&neighbor| {
                    mis_neighbor_count[neighbor as usize] == 1 && self.node_jobs[neighbor as usize] != center_job
                })
                .collect();
            loop {
                let mut best: Option<(u32, usize)> = None;
                for (slot, &neighbor) in neighbors.iter().enumerate() {
                    if !available[slot] {
                        continue;
                    }
                    let host_count = self.graph.node_weight(neighbor);
                    if best.map_or(true, |(best_count, _)| host_count > best_count) {
                        best = Some((host_count, slot));
                    }
                }
                let Some((_, slot)) = best else {
                    break;
                };
                let neighbor = neighbors[slot];
                let neighbor_job = self.node_jobs[neighbor as usize];
                jobs[job_position[&neighbor_job]]
                    .set_next_aggr_tree(Some(self.node_trees[neighbor as usize].clone()));
                available[slot] = false;
                for (other_slot, &other) in neighbors.iter().enumerate() {
                    if available[other_slot] && self.node_jobs[other as usize] == neighbor_job {
                        available[other_slot] = false;
                    }
                }
            }
        }
    }

    /*================================================================================================================*/

    // union-find over the jobs holding pending trees: the sharing groups the
    // controller would build from the current assignment
    fn prospective_groups(resources: &FatTreeResource, jobs: &[Job]) -> Vec<Vec<usize>> {
        let with_trees: Vec<usize> = (0..jobs.len())
            .filter(|&position| jobs[position].next_aggr_tree().is_some())
            .collect();
        let mut union_find = UnionFind::new(with_trees.len());
        for i in 0..with_trees.len() {
            for j in i + 1..with_trees.len() {
                let tree1 = jobs[with_trees[i]].next_aggr_tree().unwrap();
                let tree2 = jobs[with_trees[j]].next_aggr_tree().unwrap();
                if resources.check_tree_pair_conflict(tree1, tree2) {
                    union_find.union(i as u32, j as u32);
                }
            }
        }
        union_find
            .groups()
            .into_iter()
            .map(|group| group.into_iter().map(|idx| with_trees[idx as usize]).collect())
            .collect()
    }

    // for each job of `joiners`, a candidate tree that is free on the
    // hardware and overlaps the anchor group; None when some job has none
    fn find_bridge_trees(
        &self,
        resources: &FatTreeResource,
        jobs: &[Job],
        anchors: &[usize],
        joiners: &[usize],
    ) -> Option<Vec<(usize, AggrTree)>> {
        let anchor_trees: Vec<&AggrTree> = anchors
            .iter()
            .map(|&position| jobs[position].next_aggr_tree().unwrap())
            .collect();
        let mut reassignments = Vec::with_capacity(joiners.len());
        for &position in joiners {
            let job_id = jobs[position].id();
            let bridge = (0..self.node_trees.len()).find(|&node| {
                self.node_jobs[node] == job_id
                    && !resources.check_tree_conflict(&self.node_trees[node])
                    && anchor_trees
                        .iter()
                        .any(|anchor| resources.check_tree_pair_conflict(&self.node_trees[node], anchor))
            })?;
            reassignments.push((position, self.node_trees[bridge].clone()));
        }
        Some(reassignments)
    }

    // weighted JCT score of the job set when run as one sharing group,
    // cached by the (host count, model) multiset
    fn subsim_score(&mut self, jobs: &[Job], positions: &[usize]) -> f64 {
        let mut key: Vec<(u32, String)> = positions
            .iter()
            .map(|&position| (jobs[position].host_count(), jobs[position].model_name().to_string()))
            .collect();
        key.sort();
        if let Some(&score) = self.subsim_cache.get(&key) {
            return score;
        }
        let specs = positions
            .iter()
            .map(|&position| SharingJobSpec {
                host_count: jobs[position].host_count(),
                model_name: jobs[position].model_name().to_string(),
                comm_op_groups: jobs[position].comm_op_groups().to_vec(),
            })
            .collect();
        let duration_fn = Arc::clone(jobs[positions[0]].duration_fn());
        let result = simulate_sharing_group(
            specs,
            duration_fn,
            Box::new(SmartSharingPolicy::new()),
            SUBSIM_MAX_TIME,
        );
        let score = result.jct_score_weighted;
        self.subsim_cache.insert(key, score);
        score
    }

    fn host_weight(jobs: &[Job], positions: &[usize]) -> f64 {
        positions.iter().map(|&position| jobs[position].host_count() as f64).sum()
    }

    // repeatedly merge the pair of prospective groups with the best positive
    // sub-simulated improvement over running them separately
    fn lookahead(&mut self, resources: &FatTreeResource, jobs: &mut [Job]) {
        loop {
            let groups = Self::prospective_groups(resources, jobs);
            if groups.len() < 2 {
                return;
            }
            let mut best: Option<(f64, Vec<(usize, AggrTree)>)> = None;
            for a in 0..groups.len() {
                for b in a + 1..groups.len() {
                    let merged_size = groups[a].len() + groups[b].len();
                    if merged_size > MAX_SHARING_JOB_COUNT {
                        continue;
                    }
                    // skip classes whose history says they cannot beat the best
                    if let (Some((best_gain, _)), Some(tracker)) = (&best, self.class_trackers.get(&merged_size)) {
                        if tracker.count() >= LOOKAHEAD_MIN_SAMPLES {
                            let bound =
                                (tracker.mean() + LOOKAHEAD_SIGMA * tracker.std()).max(LOOKAHEAD_BOUND_FLOOR);
                            if *best_gain >= bound {
                                continue;
                            }
                        }
                    }
                    let Some(reassignments) = self.find_bridge_trees(resources, jobs, &groups[a], &groups[b])
                    else {
                        continue;
                    };
                    let merged: Vec<usize> = groups[a].iter().chain(&groups[b]).copied().collect();
                    let merged_score = self.subsim_score(jobs, &merged);
                    let score_a = self.subsim_score(jobs, &groups[a]);
                    let score_b = self.subsim_score(jobs, &groups[b]);
                    let weight_a = Self::host_weight(jobs, &groups[a]);
                    let weight_b = Self::host_weight(jobs, &groups[b]);
                    let separate = (score_a * weight_a + score_b * weight_b) / (weight_a + weight_b);
                    let improvement = merged_score - separate;
                    self.class_trackers.entry(merged_size).or_default().update(improvement);
                    if improvement > 0.0 && best.as_ref().map_or(true, |(gain, _)| improvement > *gain) {
                        best = Some((improvement, reassignments));
                    }
                }
            }
            match best {
                Some((_, reassignments)) => {
                    for (position, tree) in reassignments {
                        jobs[position].set_next_aggr_tree(Some(tree));
                    }
                }
                None => return,
            }
        }
    }
}

impl TreeBuildingPolicy for SmartTreePolicy {
    fn build_trees(&mut self, resources: &FatTreeResource, jobs: &mut [Job], _new_job_indices: &[usize]) {
        // every assignment is recomputed from the full conflict picture
        for job in jobs.iter_mut() {
            job.set_next_aggr_tree(None);
        }

        self.project_to_live_jobs(jobs);

        let known: HashSet<u32> = self.node_jobs.iter().copied().collect();
        for position in 0..jobs.len() {
            if !known.contains(&jobs[position].id()) {
                self.add_candidates(resources, &jobs[position]);
            }
        }

        self.assign_from_mis(jobs);

        if self.enable_lookahead {
            self.lookahead(resources, jobs);
        }

        self.fallback_count += jobs.iter().filter(|job| job.next_aggr_tree().is_none()).count() as u64;
    }

    fn tree_fallback_count(&self) -> u64 {
        self.fallback_count
    }
}

/*====================================================================================================================*/
