//! Error types for reconstruction and Wannier-center assignment.
//!
//! Only conditions that make a frame's result meaningless are errors.
//! Geometric anomalies (long bonds, distant Wannier centers, repeated
//! minimum-image folding) are reported through `log::warn!` and never
//! surface here.

use thiserror::Error;

/// Errors raised by the nearest-feature assignment engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    /// A feature can only claim one or two Wannier centers.
    #[error("a feature must claim 1 or 2 Wannier centers, got {0}")]
    InvalidFeatureArity(usize),

    /// The frame holds fewer Wannier centers than the feature requires.
    #[error("Wannier-center pool exhausted: {requested} requested, {available} available")]
    PoolExhausted {
        /// Number of centers the feature asked for.
        requested: usize,
        /// Number of centers the search could draw from.
        available: usize,
    },
}

/// Errors that can occur while building inputs or processing a frame.
#[derive(Debug, Error)]
pub enum Error {
    /// The unit cell has zero volume or cannot be inverted.
    #[error("invalid unit cell: {0}")]
    InvalidCell(String),

    /// The molecule topology is internally inconsistent.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Invalid bond definition in the topology.
    #[error("invalid bond between atoms {i} and {j}: {detail}")]
    InvalidBond {
        /// First atom index.
        i: usize,
        /// Second atom index.
        j: usize,
        /// Description of the problem.
        detail: String,
    },

    /// The frame does not hold a whole number of molecules.
    #[error("frame holds {atoms} atoms, which is not a multiple of {per_molecule} atoms per molecule")]
    AtomCountMismatch {
        /// Atoms in the frame.
        atoms: usize,
        /// Atoms per molecule according to the topology.
        per_molecule: usize,
    },

    /// The frame's per-atom arrays disagree in length.
    #[error("frame has {positions} positions but {elements} element labels")]
    InconsistentFrame {
        /// Number of positions.
        positions: usize,
        /// Number of element labels.
        elements: usize,
    },

    /// Some atoms cannot be reached from the representative atom.
    #[error("atoms {unreachable:?} are not bonded to the representative atom {representative}")]
    DisconnectedMolecule {
        /// Representative atom index.
        representative: usize,
        /// Local indices that the bond graph never reaches.
        unreachable: Vec<usize>,
    },

    /// Wannier-center assignment failed.
    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    /// The worker pool for trajectory processing could not be started.
    #[error("could not build worker pool: {0}")]
    ThreadPool(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input or output document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates an [`InvalidBond`](Error::InvalidBond) error.
    pub fn invalid_bond(i: usize, j: usize, detail: impl Into<String>) -> Self {
        Self::InvalidBond {
            i,
            j,
            detail: detail.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
