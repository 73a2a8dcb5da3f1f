use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;

// local search budget: rounds of improvement sweeps before giving up
const MAX_SEARCH_ROUNDS: u32 = 64;
// seed for the sweep-order shuffle; fixed so identical graphs give identical sets
const SEARCH_SEED: u64 = 0x5eed;

/*====================================================================================================================*/

/// Weighted undirected graph with dynamic node growth and subgraph
/// projection. Duplicate edge inserts are tolerated and removed when the
/// adjacency lists are normalized.
pub struct Graph {
    node_weights: Vec<u32>,
    adjacency: Vec<Vec<u32>>,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            node_weights: Vec::new(),
            adjacency: Vec::new(),
        }
    }

    pub fn with_node_count(node_count: usize) -> Self {
        Graph {
            node_weights: vec![0; node_count],
            adjacency: vec![Vec::new(); node_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_weights.len()
    }

    pub fn add_node(&mut self, weight: u32) -> u32 {
        self.node_weights.push(weight);
        self.adjacency.push(Vec::new());
        self.node_weights.len() as u32 - 1
    }

    pub fn node_weight(&self, node: u32) -> u32 {
        self.node_weights[node as usize]
    }

    pub fn set_node_weight(&mut self, node: u32, weight: u32) {
        self.node_weights[node as usize] = weight;
    }

    pub fn add_edge(&mut self, node1: u32, node2: u32) {
        assert!(node1 != node2, "Self loops are not allowed");
        assert!((node1 as usize) < self.node_count());
        assert!((node2 as usize) < self.node_count());
        self.adjacency[node1 as usize].push(node2);
        self.adjacency[node2 as usize].push(node1);
    }

    pub fn neighbors(&self, node: u32) -> &[u32] {
        &self.adjacency[node as usize]
    }

    pub fn has_edge(&self, node1: u32, node2: u32) -> bool {
        self.adjacency[node1 as usize].contains(&node2)
    }

    // sort and deduplicate all adjacency lists; returns the edge count
    fn normalize(&mut self) -> usize {
        let mut total = 0;
        for list in &mut self.adjacency {
            list.sort_unstable();
            list.dedup();
            total += list.len();
        }
        total / 2
    }

    /// Project onto the nodes with `keep[node] == true`. Returns the
    /// projected graph and, per new node, the node it came from.
    pub fn subgraph(&self, keep: &[bool]) -> (Graph, Vec<u32>) {
        assert_eq!(keep.len(), self.node_count());
        let mut old_of_new = Vec::new();
        let mut new_of_old = vec![u32::MAX; self.node_count()];
        for (old, &kept) in keep.iter().enumerate() {
            if kept {
                new_of_old[old] = old_of_new.len() as u32;
                old_of_new.push(old as u32);
            }
        }
        let mut graph = Graph::with_node_count(old_of_new.len());
        for (new, &old) in old_of_new.iter().enumerate() {
            graph.node_weights[new] = self.node_weights[old as usize];
            for &neighbor in &self.adjacency[old as usize] {
                if new_of_old[neighbor as usize] != u32::MAX {
                    graph.adjacency[new].push(new_of_old[neighbor as usize]);
                }
            }
        }
        (graph, old_of_new)
    }

    /// Maximum weighted independent set, approximated by a greedy seed plus
    /// an iteration-bounded (1,2)-swap local search. Deterministic: identical
    /// graphs (including insertion order) yield identical sets, returned in
    /// ascending node order.
    pub fn calc_max_independent_set(&mut self) -> Vec<u32> {
        self.normalize();
        let n = self.node_count();
        if n == 0 {
            return Vec::new();
        }

        // CSR form keeps the search cache friendly
        let mut offsets = Vec::with_capacity(n + 1);
        let mut csr = Vec::new();
        offsets.push(0usize);
        for list in &self.adjacency {
            csr.extend_from_slice(list);
            offsets.push(csr.len());
        }
        let neighbors = |v: usize| &csr[offsets[v]..offsets[v + 1]];
        let weight = |v: usize| self.node_weights[v];

        // greedy seed: heavy and sparsely connected nodes first
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            weight(b)
                .cmp(&weight(a))
                .then((offsets[a + 1] - offsets[a]).cmp(&(offsets[b + 1] - offsets[b])))
                .then(a.cmp(&b))
        });
        let mut in_set = vec![false; n];
        for &v in &order {
            if !neighbors(v).iter().any(|&u| in_set[u as usize]) {
                in_set[v] = true;
            }
        }

        let mut rng = StdRng::seed_from_u64(SEARCH_SEED);
        let mut sweep: Vec<usize> = (0..n).collect();
        for _ in 0..MAX_SEARCH_ROUNDS {
            sweep.shuffle(&mut rng);
            let mut improved = false;

            // (1,k)-swap: bring v in if it outweighs its set neighbors
            for &v in &sweep {
                if in_set[v] {
                    continue;
                }
                let conflict_weight: u32 = neighbors(v)
                    .iter()
                    .filter(|&&u| in_set[u as usize])
                    .map(|&u| weight(u as usize))
                    .sum();
                if weight(v) > conflict_weight {
                    for &u in neighbors(v) {
                        in_set[u as usize] = false;
                    }
                    in_set[v] = true;
                    improved = true;
                }
            }

            // (1,k)-swap: replace u by a heavier set of its now-free neighbors
            for &u in &sweep {
                if !in_set[u] {
                    continue;
                }
                // neighbors that would become free if u left the set
                let mut candidates: Vec<u32> = neighbors(u)
                    .iter()
                    .copied()
                    .filter(|&v| {
                        !neighbors(v as usize)
                            .iter()
                            .any(|&w| w as usize != u && in_set[w as usize])
                    })
                    .collect();
                candidates.sort_by(|&a, &b| {
                    weight(b as usize).cmp(&weight(a as usize)).then(a.cmp(&b))
                });
                let mut chosen: Vec<u32> = Vec::new();
                let mut gain = 0;
                for &c in &candidates {
                    if chosen.iter().any(|&d| self.has_edge(c, d)) {
                        continue;
                    }
                    chosen.push(c);
                    gain += weight(c as usize);
                }
                if gain > weight(u) {
                    in_set[u] = false;
                    for &c in &chosen {
                        in_set[c as usize] = true;
                    }
                    improved = true;
                }
            }

            if !improved {
                break;
            }
        }

        (0..n as u32).filter(|&v| in_set[v as usize]).collect()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use super::Graph;

    fn set_weight(graph: &Graph, set: &[u32]) -> u32 {
        set.iter().map(|&v| graph.node_weight(v)).sum()
    }

    fn assert_independent(graph: &Graph, set: &[u32]) {
        for (i, &a) in set.iter().enumerate() {
            for &b in &set[i + 1..] {
                assert!(!graph.has_edge(a, b), "{a} and {b} are adjacent");
            }
        }
    }

    #[test]
    fn test_path_graph() {
        // path 0-1-2 with a heavy middle: the middle alone wins
        let mut graph = Graph::with_node_count(3);
        graph.set_node_weight(0, 1);
        graph.set_node_weight(1, 5);
        graph.set_node_weight(2, 1);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);

        let mis = graph.calc_max_independent_set();
        assert_eq!(mis, vec![1]);
    }

    #[test]
    fn test_star_prefers_leaves() {
        // star with center weight 3 and four unit leaves
        let mut graph = Graph::with_node_count(5);
        graph.set_node_weight(0, 3);
        for leaf in 1..5 {
            graph.set_node_weight(leaf, 1);
            graph.add_edge(0, leaf);
        }

        let mis = graph.calc_max_independent_set();
        assert_eq!(mis, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_duplicate_edges_tolerated() {
        let mut graph = Graph::with_node_count(2);
        graph.set_node_weight(0, 1);
        graph.set_node_weight(1, 2);
        graph.add_edge(0, 1);
        graph.add_edge(0, 1);
        graph.add_edge(1, 0);

        let mis = graph.calc_max_independent_set();
        assert_eq!(mis, vec![1]);
    }

    #[test]
    fn test_deterministic() {
        let build = || {
            let mut graph = Graph::with_node_count(12);
            for v in 0..12 {
                graph.set_node_weight(v, (v * 7 % 5 + 1) as u32);
            }
            for v in 0..12u32 {
                for u in (v + 1)..12 {
                    if (v * 31 + u * 17) % 3 == 0 {
                        graph.add_edge(v, u);
                    }
                }
            }
            graph
        };

        let mis1 = build().calc_max_independent_set();
        let mis2 = build().calc_max_independent_set();
        assert_eq!(mis1, mis2);
        assert_independent(&build(), &mis1);
        assert!(set_weight(&build(), &mis1) > 0);
    }

    #[test]
    fn test_subgraph_projection() {
        let mut graph = Graph::with_node_count(4);
        for v in 0..4 {
            graph.set_node_weight(v, v + 1);
        }
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);

        let (sub, old_of_new) = graph.subgraph(&[true, false, true, true]);
        assert_eq!(old_of_new, vec![0, 2, 3]);
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.node_weight(0), 1);
        assert_eq!(sub.node_weight(1), 3);
        // only the 2-3 edge survives the projection
        assert!(sub.has_edge(1, 2));
        assert!(!sub.has_edge(0, 1));
    }
}
