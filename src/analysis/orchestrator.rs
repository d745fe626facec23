use crate::analysis::assignment::{Assignment, AssignmentEngine, AssignmentState};
use crate::analysis::bond_centers::BondCenterCalculator;
use crate::analysis::reconstruct::{LongBond, PeriodicReconstructor, ReconstructedMolecule};
use crate::core::connectivity::MoleculeGraph;
use crate::core::structure::{Atom, Frame};
use crate::core::topology::{BondKind, MoleculeTopology};
use crate::error::{AssignmentError, Error, Result};
use crate::AssignConfig;
use nalgebra::Vector3;
use serde::Serialize;

/// Wannier centers per oxygen lone-pair site.
pub const OXYGEN_LONE_PAIR_CENTERS: usize = 2;
/// Wannier centers per nitrogen lone-pair site.
pub const NITROGEN_LONE_PAIR_CENTERS: usize = 1;

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LonePairAssignment {
    /// Local index of the atom carrying the lone pair.
    pub atom: usize,
    #[serde(flatten)]
    pub assignment: Assignment,
}

#[derive(Debug, Clone, Serialize)]
pub struct BondAssignment {
    /// Index of the bond in the topology's bond list.
    pub bond: usize,
    #[serde(flatten)]
    pub assignment: Assignment,
}

#[derive(Debug, Clone, Serialize)]
pub struct PiBondAssignment {
    /// Index of the double bond in the topology's bond list.
    pub bond: usize,
    #[serde(flatten)]
    pub assignment: Assignment,
}

/// A feature left without Wannier centers because the frame ran out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "feature", rename_all = "snake_case")]
pub enum UnassignedFeature {
    OxygenLonePair { atom: usize },
    NitrogenLonePair { atom: usize },
    Bond { bond: usize },
}

/// Everything assigned to one molecule of a frame.
#[derive(Debug, Clone, Serialize)]
pub struct MoleculeAssignment {
    pub index: usize,
    pub positions: Vec<Vector3<f64>>,
    pub bond_centers: Vec<Vector3<f64>>,
    /// Assigned single bonds, in bond-list order.
    pub bonds: Vec<BondAssignment>,
    /// Only the double bonds for which a π center was found.
    pub pi_bonds: Vec<PiBondAssignment>,
    pub oxygen_lone_pairs: Vec<LonePairAssignment>,
    pub nitrogen_lone_pairs: Vec<LonePairAssignment>,
    pub reconstructed_by_traversal: bool,
    /// Bonds still too long after reconstruction.
    pub unresolved_bonds: Vec<usize>,
    pub unassigned: Vec<UnassignedFeature>,
}

impl MoleculeAssignment {
    fn new(index: usize, molecule: ReconstructedMolecule) -> Self {
        Self {
            index,
            unresolved_bonds: molecule.long_bonds.iter().map(|b| b.bond).collect(),
            reconstructed_by_traversal: molecule.used_traversal,
            positions: molecule.positions,
            bond_centers: molecule.bond_centers,
            bonds: Vec::new(),
            pi_bonds: Vec::new(),
            oxygen_lone_pairs: Vec::new(),
            nitrogen_lone_pairs: Vec::new(),
            unassigned: Vec::new(),
        }
    }

    /// Molecular dipole: sum of every assigned feature dipole, in Debye.
    pub fn dipole(&self) -> Vector3<f64> {
        self.bonds.iter().map(|b| b.assignment.dipole).sum::<Vector3<f64>>()
            + self.pi_bonds.iter().map(|p| p.assignment.dipole).sum::<Vector3<f64>>()
            + self.oxygen_lone_pairs.iter().map(|l| l.assignment.dipole).sum::<Vector3<f64>>()
            + self.nitrogen_lone_pairs.iter().map(|l| l.assignment.dipole).sum::<Vector3<f64>>()
    }
}

/// Assignment result of one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameAssignment {
    pub molecules: Vec<MoleculeAssignment>,
    /// Every claimed Wannier-center index, in claim order.
    pub claimed: Vec<usize>,
    /// Assignments that reused a claimed center.
    pub collisions: usize,
}

impl FrameAssignment {
    pub fn molecule_dipoles(&self) -> Vec<Vector3<f64>> {
        self.molecules.iter().map(|m| m.dipole()).collect()
    }

    pub fn total_dipole(&self) -> Vector3<f64> {
        self.molecules.iter().map(|m| m.dipole()).sum()
    }

    /// `[molecule][bond]` dipoles of the assigned single bonds.
    pub fn bond_dipoles(&self) -> Vec<Vec<Vector3<f64>>> {
        self.molecules
            .iter()
            .map(|m| m.bonds.iter().map(|b| b.assignment.dipole).collect())
            .collect()
    }

    pub fn pi_bond_dipoles(&self) -> Vec<Vec<Vector3<f64>>> {
        self.molecules
            .iter()
            .map(|m| m.pi_bonds.iter().map(|p| p.assignment.dipole).collect())
            .collect()
    }

    pub fn oxygen_lone_pair_dipoles(&self) -> Vec<Vec<Vector3<f64>>> {
        self.molecules
            .iter()
            .map(|m| m.oxygen_lone_pairs.iter().map(|l| l.assignment.dipole).collect())
            .collect()
    }

    pub fn nitrogen_lone_pair_dipoles(&self) -> Vec<Vec<Vector3<f64>>> {
        self.molecules
            .iter()
            .map(|m| m.nitrogen_lone_pairs.iter().map(|l| l.assignment.dipole).collect())
            .collect()
    }

    /// Dipoles of every bond of `kind` across the frame, molecule by molecule.
    pub fn bond_dipoles_of_kind(&self, topology: &MoleculeTopology, kind: BondKind) -> Vec<Vector3<f64>> {
        let of_kind = topology.bonds_of_kind(kind);
        let of_kind = &of_kind;
        self.molecules
            .iter()
            .flat_map(|m| m.bonds.iter().filter(move |b| of_kind.contains(&b.bond)))
            .map(|b| b.assignment.dipole)
            .collect()
    }

    pub fn unresolved_molecules(&self) -> Vec<usize> {
        self.molecules
            .iter()
            .filter(|m| !m.unresolved_bonds.is_empty())
            .map(|m| m.index)
            .collect()
    }
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Receives frames whose molecules could not be reconstructed.
pub trait DiagnosticSink: Send + Sync {
    fn record_unresolved(&self, frame: &Frame, molecule: usize, long_bonds: &[LongBond]) -> Result<()>;
}

// ============================================================================
// FRAME ASSIGNER
// ============================================================================

/// Runs reconstruction and Wannier-center assignment on whole frames.
///
/// Features are assigned in a fixed greedy order across the whole frame:
/// oxygen lone pairs, nitrogen lone pairs, single bonds, then π-bonds.
/// A feature the frame has too few Wannier centers for is logged and listed
/// in [`MoleculeAssignment::unassigned`]; the rest of the frame still runs.
pub struct FrameAssigner<'a> {
    topology: &'a MoleculeTopology,
    graph: MoleculeGraph,
    config: &'a AssignConfig,
    sink: Option<&'a dyn DiagnosticSink>,
}

impl<'a> FrameAssigner<'a> {
    pub fn new(topology: &'a MoleculeTopology, config: &'a AssignConfig) -> Result<Self> {
        let graph = MoleculeGraph::from_topology(topology);

        let unreachable = graph.unreachable_from(topology.representative());
        if !unreachable.is_empty() {
            if config.disconnected_atoms_fatal {
                return Err(Error::DisconnectedMolecule {
                    representative: topology.representative(),
                    unreachable,
                });
            }
            log::warn!(
                "atoms {:?} are not bonded to representative atom {}; they keep single-image positions",
                unreachable,
                topology.representative()
            );
        }

        Ok(Self {
            topology,
            graph,
            config,
            sink: None,
        })
    }

    pub fn with_diagnostics(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn assign(&self, frame: &Frame) -> Result<FrameAssignment> {
        let per_molecule = self.topology.num_atoms();
        let num_molecules = frame.molecule_count(per_molecule)?;

        // 1. Reconstruction
        let reconstructor = PeriodicReconstructor::new(
            &frame.cell,
            self.topology,
            &self.graph,
            self.config.bond_tolerance,
        );
        let centers = BondCenterCalculator::new(self.config.bond_center_tolerance);

        let mut molecules = Vec::with_capacity(num_molecules);
        let mut oxygen_sites = Vec::with_capacity(num_molecules);
        let mut nitrogen_sites = Vec::with_capacity(num_molecules);
        for m in 0..num_molecules {
            let atoms = frame.molecule(m, per_molecule);
            if atoms
                .iter()
                .zip(self.topology.elements())
                .any(|(a, e)| &a.element != e)
            {
                log::warn!("molecule {}: species differ from the topology", m);
            }
            let positions: Vec<Vector3<f64>> = atoms.iter().map(|a| a.position).collect();
            let reconstructed = reconstructor.reconstruct(m, &positions, &centers);

            if !reconstructed.is_resolved() {
                if let Some(sink) = self.sink {
                    if let Err(e) = sink.record_unresolved(frame, m, &reconstructed.long_bonds) {
                        log::warn!("could not record unresolved molecule {}: {}", m, e);
                    }
                }
            }

            oxygen_sites.push(sites_of(atoms, "O"));
            nitrogen_sites.push(sites_of(atoms, "N"));
            molecules.push(MoleculeAssignment::new(m, reconstructed));
        }

        // 2. Assignment, in priority order
        let engine = AssignmentEngine::new(&frame.cell, &frame.wannier_centers, self.config.wc_distance_warning);
        let mut state = AssignmentState::new(self.config.collision_policy);

        for (molecule, sites) in molecules.iter_mut().zip(&oxygen_sites) {
            for &atom in sites {
                let feature = UnassignedFeature::OxygenLonePair { atom };
                let reference = molecule.positions[atom];
                if let Some(assignment) =
                    claim_or_skip(&engine, &mut state, molecule, feature, &reference, OXYGEN_LONE_PAIR_CENTERS)?
                {
                    molecule.oxygen_lone_pairs.push(LonePairAssignment { atom, assignment });
                }
            }
        }

        for (molecule, sites) in molecules.iter_mut().zip(&nitrogen_sites) {
            for &atom in sites {
                let feature = UnassignedFeature::NitrogenLonePair { atom };
                let reference = molecule.positions[atom];
                if let Some(assignment) =
                    claim_or_skip(&engine, &mut state, molecule, feature, &reference, NITROGEN_LONE_PAIR_CENTERS)?
                {
                    molecule.nitrogen_lone_pairs.push(LonePairAssignment { atom, assignment });
                }
            }
        }

        for molecule in molecules.iter_mut() {
            for bond in 0..molecule.bond_centers.len() {
                let reference = molecule.bond_centers[bond];
                if let Some(assignment) =
                    claim_or_skip(&engine, &mut state, molecule, UnassignedFeature::Bond { bond }, &reference, 1)?
                {
                    molecule.bonds.push(BondAssignment { bond, assignment });
                }
            }
        }

        if self.config.assign_pi {
            for molecule in molecules.iter_mut() {
                for &bond in self.topology.double_bonds() {
                    let center = molecule.bond_centers[bond];
                    if let Some(assignment) = engine.assign_nearest_within_radius(&center, &mut state, self.config.pi_radius) {
                        molecule.pi_bonds.push(PiBondAssignment { bond, assignment });
                    }
                }
            }
        }

        log::debug!(
            "frame assigned: {} molecules, {} of {} Wannier centers claimed",
            num_molecules,
            state.len(),
            frame.wannier_centers.len()
        );

        Ok(FrameAssignment {
            molecules,
            claimed: state.claimed().to_vec(),
            collisions: state.collisions(),
        })
    }
}

/// Only an invalid arity is an error; an exhausted pool leaves the feature unassigned.
fn claim_or_skip(
    engine: &AssignmentEngine,
    state: &mut AssignmentState,
    molecule: &mut MoleculeAssignment,
    feature: UnassignedFeature,
    reference: &Vector3<f64>,
    k: usize,
) -> Result<Option<Assignment>> {
    match engine.assign_nearest(reference, state, k) {
        Ok(assignment) => Ok(Some(assignment)),
        Err(e @ AssignmentError::PoolExhausted { .. }) => {
            log::warn!("molecule {}: {:?} left unassigned: {}", molecule.index, feature, e);
            molecule.unassigned.push(feature);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn sites_of(atoms: &[Atom], element: &str) -> Vec<usize> {
    atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| a.element == element)
        .map(|(i, _)| i)
        .collect()
}
