use crate::core::topology::MoleculeTopology;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::{Bfs, EdgeRef};

// ============================================================================
// GRAPH REPRESENTATION
// ============================================================================

/// Bond graph of one molecular species.
///
/// Nodes carry local atom indices and edges carry bond indices. The graph is
/// immutable; traversal state lives with whoever walks it, so one graph can
/// serve every molecule of every frame, on any thread.
#[derive(Debug, Clone)]
pub struct MoleculeGraph {
    pub graph: UnGraph<usize, usize>,
}

impl MoleculeGraph {
    /// Builds the adjacency structure from a topology's local bond list.
    pub fn from_topology(topology: &MoleculeTopology) -> Self {
        let num_atoms = topology.num_atoms();
        let mut graph = UnGraph::<usize, usize>::with_capacity(num_atoms, topology.bonds().len());

        // Add all nodes first so node index == local atom index
        let node_indices: Vec<NodeIndex> = (0..num_atoms)
            .map(|i| graph.add_node(i))
            .collect();

        for (bond_index, &[i, j]) in topology.bonds().iter().enumerate() {
            graph.add_edge(node_indices[i], node_indices[j], bond_index);
        }
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Local indices of the atoms bonded to `atom`, in bond-list order.
    pub fn neighbors(&self, atom: usize) -> Vec<usize> {
        // petgraph walks edges newest first
        let mut neighbors: Vec<(usize, usize)> = self
            .graph
            .edges(NodeIndex::new(atom))
            .map(|e| {
                let other = if e.source().index() == atom { e.target() } else { e.source() };
                (*e.weight(), self.graph[other])
            })
            .collect();
        neighbors.sort_unstable();
        neighbors.into_iter().map(|(_, atom)| atom).collect()
    }

    /// Atoms that no chain of bonds connects to `root`, sorted.
    pub fn unreachable_from(&self, root: usize) -> Vec<usize> {
        let mut visited = vec![false; self.graph.node_count()];
        let mut bfs = Bfs::new(&self.graph, NodeIndex::new(root));
        while let Some(nx) = bfs.next(&self.graph) {
            visited[self.graph[nx]] = true;
        }
        visited
            .iter()
            .enumerate()
            .filter(|(_, &seen)| !seen)
            .map(|(i, _)| i)
            .collect()
    }
}
