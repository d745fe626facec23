use crate::analysis::bond_centers::BondCenterCalculator;
use crate::core::connectivity::MoleculeGraph;
use crate::core::structure::PeriodicCell;
use crate::core::topology::MoleculeTopology;
use crate::math::pbc::{minimum_image_displacements, minimum_image_vector};
use nalgebra::Vector3;
use std::collections::VecDeque;

/// A bond that is longer than the reconstruction tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongBond {
    pub bond: usize,
    pub length: f64,
}

/// One molecule unwrapped into a single rigid body.
#[derive(Debug, Clone)]
pub struct ReconstructedMolecule {
    /// Absolute positions: representative atom position + displacement.
    pub positions: Vec<Vector3<f64>>,
    /// Displacements from the representative atom.
    pub displacements: Vec<Vector3<f64>>,
    /// Midpoints of every bond, in bond-list order.
    pub bond_centers: Vec<Vector3<f64>>,
    /// Whether the single-image guess failed and the bond graph was walked.
    pub used_traversal: bool,
    /// Bonds still out of tolerance after the graph walk.
    pub long_bonds: Vec<LongBond>,
}

impl ReconstructedMolecule {
    pub fn is_resolved(&self) -> bool {
        self.long_bonds.is_empty()
    }
}

/// Engine for making a periodically split molecule whole again.
///
/// Atoms are first placed at their single minimum image relative to the
/// representative atom. If that leaves any bond longer than
/// `bond_tolerance`, the bond graph is walked breadth first from the
/// representative atom and every atom is placed at the minimum image of the
/// atom it was reached from.
pub struct PeriodicReconstructor<'a> {
    cell: &'a PeriodicCell,
    topology: &'a MoleculeTopology,
    graph: &'a MoleculeGraph,
    bond_tolerance: f64,
}

impl<'a> PeriodicReconstructor<'a> {
    pub fn new(
        cell: &'a PeriodicCell,
        topology: &'a MoleculeTopology,
        graph: &'a MoleculeGraph,
        bond_tolerance: f64,
    ) -> Self {
        Self {
            cell,
            topology,
            graph,
            bond_tolerance,
        }
    }

    /// Returns displacements from the representative atom for the raw
    /// `positions` of one molecule (local atom order), the flag telling
    /// whether the graph walk ran and the bonds it could not fix.
    pub fn displacements(&self, molecule: usize, positions: &[Vector3<f64>]) -> (Vec<Vector3<f64>>, bool, Vec<LongBond>) {
        let representative = self.topology.representative();
        let origin = positions[representative];

        // 1. Single-image guess
        let mut displacements = minimum_image_displacements(&origin, positions, self.cell, true);
        if self.long_bonds(&displacements).is_empty() {
            return (displacements, false, Vec::new());
        }

        // 2. Graph-guided reconstruction
        log::warn!("molecule {}: single-image reconstruction failed, walking the bond graph", molecule);
        self.walk(positions, &mut displacements);

        // 3. Re-validate
        let long_bonds = self.long_bonds(&displacements);
        for long in &long_bonds {
            let [i, j] = self.topology.bonds()[long.bond];
            log::warn!(
                "molecule {}: bond {} between atom {} ({}) and atom {} ({}) is still {:.4} Å after reconstruction",
                molecule,
                long.bond,
                i,
                self.topology.elements()[i],
                j,
                self.topology.elements()[j],
                long.length
            );
        }
        (displacements, true, long_bonds)
    }

    /// Full reconstruction of one molecule, including bond centers.
    pub fn reconstruct(
        &self,
        molecule: usize,
        positions: &[Vector3<f64>],
        bond_centers: &BondCenterCalculator,
    ) -> ReconstructedMolecule {
        let (displacements, used_traversal, long_bonds) = self.displacements(molecule, positions);
        let origin = positions[self.topology.representative()];
        let unwrapped: Vec<Vector3<f64>> = displacements.iter().map(|d| origin + d).collect();
        let centers = bond_centers.compute(molecule, &unwrapped, self.topology.bonds());

        ReconstructedMolecule {
            positions: unwrapped,
            displacements,
            bond_centers: centers,
            used_traversal,
            long_bonds,
        }
    }

    fn long_bonds(&self, displacements: &[Vector3<f64>]) -> Vec<LongBond> {
        self.topology
            .bonds()
            .iter()
            .enumerate()
            .filter_map(|(bond, &[i, j])| {
                let length = (displacements[i] - displacements[j]).norm();
                (length > self.bond_tolerance).then_some(LongBond { bond, length })
            })
            .collect()
    }

    /// Breadth-first walk from the representative atom. Atoms the walk never
    /// reaches keep their single-image displacement.
    fn walk(&self, positions: &[Vector3<f64>], displacements: &mut [Vector3<f64>]) {
        let representative = self.topology.representative();
        let mut parent: Vec<Option<usize>> = vec![None; self.graph.node_count()];
        parent[representative] = Some(representative);

        let mut queue = VecDeque::from([representative]);
        while let Some(current) = queue.pop_front() {
            for neighbor in self.graph.neighbors(current) {
                if parent[neighbor].is_some() {
                    continue;
                }
                parent[neighbor] = Some(current);
                // Step between bonded atoms, never from the representative atom
                let step = minimum_image_vector(&positions[current], &positions[neighbor], self.cell);
                displacements[neighbor] = displacements[current] + step;
                queue.push_back(neighbor);
            }
        }
    }
}
