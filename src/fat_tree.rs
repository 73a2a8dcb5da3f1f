use std::fmt::{Debug, Display};

pub type NodeId = u32;
pub type EdgeId = u32;

/*====================================================================================================================*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub layer: u32,
    // indices[i] < up_link_count[i] for i < layer, indices[i] < down_link_count[i] otherwise
    pub indices: Vec<u32>,
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node#{}@L{}{:?}", self.id, self.layer, self.indices)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub parent: NodeId,
    pub child: NodeId,
}

impl Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Edge#{}({}->{})", self.id, self.child, self.parent)
    }
}

/*====================================================================================================================*/

/// Aggregation tree: the subset of the fat tree spanning a host set up to one
/// of its closest common ancestors. Bitsets allow O(1) membership tests.
#[derive(Debug, Clone)]
pub struct AggrTree {
    pub root: NodeId,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub node_set: Vec<bool>,
    pub edge_set: Vec<bool>,
}

impl AggrTree {
    pub fn has_node(&self, node: NodeId) -> bool {
        self.node_set[node as usize]
    }

    pub fn has_edge(&self, edge: EdgeId) -> bool {
        self.edge_set[edge as usize]
    }
}

// the bitsets are derived from the id lists, so comparing the lists is enough
impl PartialEq for AggrTree {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }
}

impl Eq for AggrTree {}

/*====================================================================================================================*/

/// Fat tree of height `H`, parameterized by per-level down-link and up-link
/// counts. Node IDs are dense, assigned layer-major and indices-minor;
/// edge IDs are dense and child-major. Both are closed-form functions of the
/// coordinates, so lookups never search.
pub struct FatTree {
    pub height: u32,
    pub down_link_count: Vec<u32>,
    pub up_link_count: Vec<u32>,

    pub nodes: Vec<Node>,
    pub nodes_by_layer: Vec<Vec<NodeId>>,
    pub edges: Vec<Edge>,
    pub edges_by_layer: Vec<Vec<EdgeId>>,

    // node_layer_prefix[l] is the ID of the first node at layer l
    node_layer_prefix: Vec<u32>,
    // edge_layer_prefix[l] is the ID of the first edge whose child is at layer l
    edge_layer_prefix: Vec<u32>,
}

impl FatTree {
    pub fn new(down_link_count: &[u32], up_link_count: &[u32]) -> Self {
        let height = down_link_count.len() as u32;
        assert!(height >= 1, "Fat tree height must be at least 1");
        assert_eq!(down_link_count.len(), up_link_count.len());
        assert!(down_link_count.iter().all(|&c| c > 0));
        assert!(up_link_count.iter().all(|&c| c > 0));

        let h = height as usize;

        let mut node_layer_prefix = vec![0u32; h + 2];
        for layer in 0..=h {
            let mut size = 1u32;
            for i in 0..h {
                size *= if i < layer { up_link_count[i] } else { down_link_count[i] };
            }
            node_layer_prefix[layer + 1] = node_layer_prefix[layer] + size;
        }

        let mut nodes = Vec::with_capacity(node_layer_prefix[h + 1] as usize);
        let mut nodes_by_layer = vec![Vec::new(); h + 1];
        for layer in 0..=h {
            let layer_size = node_layer_prefix[layer + 1] - node_layer_prefix[layer];
            for ordinal in 0..layer_size {
                // decompose the ordinal, indices[0] least significant
                let mut indices = vec![0u32; h];
                let mut rem = ordinal;
                for i in 0..h {
                    let radix = if i < layer { up_link_count[i] } else { down_link_count[i] };
                    indices[i] = rem % radix;
                    rem /= radix;
                }
                let id = node_layer_prefix[layer] + ordinal;
                nodes_by_layer[layer].push(id);
                nodes.push(Node {
                    id,
                    layer: layer as u32,
                    indices,
                });
            }
        }

        let mut edge_layer_prefix = vec![0u32; h + 1];
        for layer in 0..h {
            let layer_size = node_layer_prefix[layer + 1] - node_layer_prefix[layer];
            edge_layer_prefix[layer + 1] = edge_layer_prefix[layer] + layer_size * up_link_count[layer];
        }

        let tree = FatTree {
            height,
            down_link_count: down_link_count.to_vec(),
            up_link_count: up_link_count.to_vec(),
            nodes,
            nodes_by_layer,
            edges: Vec::new(),
            edges_by_layer: vec![Vec::new(); h],
            node_layer_prefix,
            edge_layer_prefix,
        };

        let mut edges = Vec::with_capacity(tree.edge_layer_prefix[h] as usize);
        let mut edges_by_layer = vec![Vec::new(); h];
        for layer in 0..h {
            for &child_id in &tree.nodes_by_layer[layer] {
                let child = &tree.nodes[child_id as usize];
                for port in 0..up_link_count[layer] {
                    let mut parent_indices = child.indices.clone();
                    parent_indices[layer] = port;
                    let parent_id = tree.node_id(layer as u32 + 1, &parent_indices);
                    let id = edges.len() as u32;
                    edges_by_layer[layer].push(id);
                    edges.push(Edge {
                        id,
                        parent: parent_id,
                        child: child_id,
                    });
                }
            }
        }

        FatTree {
            edges,
            edges_by_layer,
            ..tree
        }
    }

    /// Standard switch-degree construction: `down = [d/2, .., d/2, d]` and
    /// `up = [1, d/2, .., d/2]`.
    pub fn with_degree(height: u32, degree: u32) -> Self {
        assert!(degree >= 2 && degree % 2 == 0, "Switch degree must be even and at least 2");
        let h = height as usize;
        let mut down = vec![degree / 2; h];
        down[h - 1] = degree;
        let mut up = vec![degree / 2; h];
        up[0] = 1;
        FatTree::new(&down, &up)
    }

    pub fn host_count(&self) -> usize {
        self.nodes_by_layer[0].len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id as usize]
    }

    // layer-0 nodes occupy the lowest IDs
    pub fn is_host(&self, id: NodeId) -> bool {
        (id as usize) < self.host_count()
    }

    pub fn node_id(&self, layer: u32, indices: &[u32]) -> NodeId {
        let h = self.height as usize;
        assert_eq!(indices.len(), h);
        let mut ordinal = 0u32;
        for i in (0..h).rev() {
            let radix = if i < layer as usize {
                self.up_link_count[i]
            } else {
                self.down_link_count[i]
            };
            debug_assert!(indices[i] < radix);
            ordinal = ordinal * radix + indices[i];
        }
        self.node_layer_prefix[layer as usize] + ordinal
    }

    pub fn edge_id(&self, parent: NodeId, child: NodeId) -> EdgeId {
        let child = &self.nodes[child as usize];
        let parent = &self.nodes[parent as usize];
        let layer = child.layer as usize;
        assert_eq!(parent.layer, child.layer + 1);
        let child_ordinal = child.id - self.node_layer_prefix[layer];
        self.edge_layer_prefix[layer] + child_ordinal * self.up_link_count[layer] + parent.indices[layer]
    }

    /// All closest common ancestors of a non-empty set of hosts. The result
    /// is in ID order; its length is the product of the up-link counts below
    /// the ancestor layer.
    pub fn closest_common_ancestors(&self, leaves: &[NodeId]) -> Vec<NodeId> {
        assert!(!leaves.is_empty(), "Leaf set must not be empty");
        let h = self.height as usize;
        let first = &self.nodes[leaves[0] as usize];
        for &leaf in leaves {
            assert_eq!(self.nodes[leaf as usize].layer, 0, "Leaves must be hosts");
        }

        // ancestor layer is one above the highest index level where the leaves disagree
        let mut ancestor_layer = 0usize;
        for i in (0..h).rev() {
            if leaves
                .iter()
                .any(|&leaf| self.nodes[leaf as usize].indices[i] != first.indices[i])
            {
                ancestor_layer = i + 1;
                break;
            }
        }

        let free_count: u32 = self.up_link_count[..ancestor_layer].iter().product();
        let mut ancestors = Vec::with_capacity(free_count as usize);
        for ordinal in 0..free_count {
            let mut indices = first.indices.clone();
            let mut rem = ordinal;
            for (i, idx) in indices.iter_mut().enumerate().take(ancestor_layer) {
                *idx = rem % self.up_link_count[i];
                rem /= self.up_link_count[i];
            }
            ancestors.push(self.node_id(ancestor_layer as u32, &indices));
        }
        ancestors
    }

    /// Extract the aggregation tree spanning `leaves` up to `root`: walking
    /// up one layer at a time, a node's parent is found by replacing the
    /// index at the current layer with the root's.
    pub fn aggregation_tree(&self, leaves: &[NodeId], root: NodeId) -> AggrTree {
        assert!(!leaves.is_empty(), "Leaf set must not be empty");
        let root_node = &self.nodes[root as usize];
        let root_layer = root_node.layer as usize;

        let mut tree_nodes: Vec<NodeId> = leaves.to_vec();
        let mut tree_edges: Vec<EdgeId> = Vec::new();
        let mut frontier: Vec<NodeId> = leaves.to_vec();
        for layer in 0..root_layer {
            let mut parents: Vec<NodeId> = Vec::with_capacity(frontier.len());
            for &child in &frontier {
                let mut parent_indices = self.nodes[child as usize].indices.clone();
                parent_indices[layer] = root_node.indices[layer];
                let parent = self.node_id(layer as u32 + 1, &parent_indices);
                tree_edges.push(self.edge_id(parent, child));
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
            tree_nodes.extend_from_slice(&parents);
            frontier = parents;
        }
        assert_eq!(frontier, vec![root], "Walk from leaves must converge on the root");

        let mut node_set = vec![false; self.nodes.len()];
        for &node in &tree_nodes {
            node_set[node as usize] = true;
        }
        let mut edge_set = vec![false; self.edges.len()];
        for &edge in &tree_edges {
            edge_set[edge as usize] = true;
        }
        AggrTree {
            root,
            nodes: tree_nodes,
            edges: tree_edges,
            node_set,
            edge_set,
        }
    }
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use super::FatTree;

    #[test]
    fn test_degree_construction() {
        let tree = FatTree::with_degree(3, 4);

        assert_eq!(tree.down_link_count, vec![2, 2, 4]);
        assert_eq!(tree.up_link_count, vec![1, 2, 2]);
        assert_eq!(tree.nodes_by_layer[0].len(), 16);
        assert_eq!(tree.nodes_by_layer[1].len(), 8);
        assert_eq!(tree.nodes_by_layer[2].len(), 8);
        assert_eq!(tree.nodes_by_layer[3].len(), 4);
        assert_eq!(tree.edges.len(), 16 + 16 + 16);
    }

    #[test]
    fn test_node_id_round_trip() {
        let tree = FatTree::new(&[2, 2, 4], &[1, 2, 2]);

        assert_eq!(tree.node_id(0, &[0, 0, 0]), 0);
        for node in &tree.nodes {
            assert_eq!(tree.node_id(node.layer, &node.indices), node.id);
        }
    }

    #[test]
    fn test_edge_id_round_trip() {
        let tree = FatTree::with_degree(3, 4);

        for edge in &tree.edges {
            assert_eq!(tree.edge_id(edge.parent, edge.child), edge.id);
        }
        // every child at layer l has exactly up[l] edges
        for layer in 0..3usize {
            assert_eq!(
                tree.edges_by_layer[layer].len(),
                tree.nodes_by_layer[layer].len() * tree.up_link_count[layer] as usize
            );
        }
    }

    #[test]
    fn test_closest_common_ancestors() {
        let tree = FatTree::with_degree(3, 4);

        // single host: the host itself
        assert_eq!(tree.closest_common_ancestors(&[5]), vec![5]);

        // hosts 0 and 1 differ only at index level 0 -> one ToR (up[0] == 1)
        let ancestors = tree.closest_common_ancestors(&[0, 1]);
        assert_eq!(ancestors.len(), 1);
        assert_eq!(tree.node(ancestors[0]).layer, 1);

        // hosts 0 and 2 differ at index level 1 -> up[0] * up[1] == 2 ancestors
        let ancestors = tree.closest_common_ancestors(&[0, 2]);
        assert_eq!(ancestors.len(), 2);
        assert!(ancestors.iter().all(|&a| tree.node(a).layer == 2));

        // hosts 0 and 4 differ at index level 2 -> up[0] * up[1] * up[2] == 4 roots
        let ancestors = tree.closest_common_ancestors(&[0, 4]);
        assert_eq!(ancestors.len(), 4);
        assert!(ancestors.iter().all(|&a| tree.node(a).layer == 3));
    }

    #[test]
    fn test_aggregation_tree() {
        let tree = FatTree::with_degree(3, 4);
        let leaves = vec![0, 4];

        for root in tree.closest_common_ancestors(&leaves) {
            let aggr = tree.aggregation_tree(&leaves, root);

            assert_eq!(aggr.root, root);
            for &leaf in &leaves {
                assert!(aggr.has_node(leaf));
            }
            // every edge connects two nodes of the tree
            for &edge_id in &aggr.edges {
                let edge = tree.edge(edge_id);
                assert!(aggr.has_node(edge.parent));
                assert!(aggr.has_node(edge.child));
            }
            // walking up from any leaf by root-index projection stays inside the node set
            for &leaf in &leaves {
                let mut indices = tree.node(leaf).indices.clone();
                for layer in 0..tree.node(root).layer {
                    indices[layer as usize] = tree.node(root).indices[layer as usize];
                    assert!(aggr.has_node(tree.node_id(layer + 1, &indices)));
                }
            }
        }
    }

    #[test]
    fn test_aggregation_tree_node_count() {
        let tree = FatTree::with_degree(3, 4);
        // hosts 0..4 share a layer-2 pod; distinct ancestors: 4 hosts, 2 ToRs, 1 aggregation switch
        let leaves = vec![0, 1, 2, 3];
        let roots = tree.closest_common_ancestors(&leaves);
        assert_eq!(roots.len(), 2);
        let aggr = tree.aggregation_tree(&leaves, roots[0]);
        assert_eq!(aggr.nodes.len(), 4 + 2 + 1);
        assert_eq!(aggr.edges.len(), 4 + 2);
    }
}
