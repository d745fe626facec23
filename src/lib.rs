// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
pub mod core;
pub mod error;
pub mod io;
pub mod math;
pub mod analysis;

// ============================================================================
// RE-EXPORTS (Public API)
// ============================================================================
pub use crate::core::structure::{Atom, Frame, Lattice, PeriodicCell};
pub use crate::core::topology::{BondKind, MoleculeTopology};
pub use crate::core::connectivity::MoleculeGraph;
pub use crate::io::{parser, writer};

pub use crate::analysis::assignment::{Assignment, AssignmentEngine, AssignmentState, CollisionPolicy};
pub use crate::analysis::bond_centers::BondCenterCalculator;
pub use crate::analysis::orchestrator::{
    BondAssignment, DiagnosticSink, FrameAssigner, FrameAssignment, MoleculeAssignment, UnassignedFeature,
};
pub use crate::analysis::reconstruct::{PeriodicReconstructor, ReconstructedMolecule};
pub use crate::error::{AssignmentError, Error, Result};

use crate::io::writer::XyzDump;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// HIGH-LEVEL INTERFACE
// ============================================================================

/// Configuration for reconstruction and Wannier-center assignment.
///
/// All distances are in Å. Missing fields in a JSON config take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignConfig {
    /// Longest bond accepted after reconstruction.
    pub bond_tolerance: f64,
    /// Bond length above which a bond center is reported.
    pub bond_center_tolerance: f64,
    /// Reference-to-center distance above which an assignment is reported.
    pub wc_distance_warning: f64,
    /// Search radius for π centers around double-bond centers.
    pub pi_radius: f64,
    pub assign_pi: bool,
    pub collision_policy: CollisionPolicy,
    /// Refuse topologies where some atoms are not bonded to the representative.
    pub disconnected_atoms_fatal: bool,
    /// XYZ file collecting frames with unresolved molecules.
    pub diagnostic_dump: Option<PathBuf>,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            bond_tolerance: 3.0,
            bond_center_tolerance: 2.0,
            wc_distance_warning: 1.0,
            pi_radius: 0.65,
            assign_pi: true,
            collision_policy: CollisionPolicy::Prevent,
            disconnected_atoms_fatal: false,
            diagnostic_dump: None,
        }
    }
}

/// Reconstructs and assigns a single frame.
pub fn assign_frame(frame: &Frame, topology: &MoleculeTopology, config: &AssignConfig) -> Result<FrameAssignment> {
    let dump = config.diagnostic_dump.as_ref().map(XyzDump::new);
    let assigner = FrameAssigner::new(topology, config)?;
    match &dump {
        Some(sink) => assigner.with_diagnostics(sink).assign(frame),
        None => assigner.assign(frame),
    }
}

/// Assigns every frame of a trajectory in parallel.
///
/// Frames are independent; a failing frame yields its own `Err` and the
/// others are unaffected. Results keep the input order. `jobs == 0` uses
/// rayon's default thread count.
pub fn assign_trajectory(
    frames: &[Frame],
    topology: &MoleculeTopology,
    config: &AssignConfig,
    jobs: usize,
) -> Result<Vec<Result<FrameAssignment>>> {
    let dump = config.diagnostic_dump.as_ref().map(XyzDump::new);
    let mut assigner = FrameAssigner::new(topology, config)?;
    if let Some(sink) = &dump {
        assigner = assigner.with_diagnostics(sink);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let results: Vec<Result<FrameAssignment>> = pool.install(|| {
        frames
            .par_iter()
            .enumerate()
            .map(|(i, frame)| {
                assigner.assign(frame).map_err(|e| {
                    log::error!("frame {}: {}", i, e);
                    e
                })
            })
            .collect()
    });
    Ok(results)
}
