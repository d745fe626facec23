use crate::core::structure::{Frame, Lattice, PeriodicCell};
use crate::core::topology::MoleculeTopology;
use crate::error::{Error, Result};
use crate::AssignConfig;
use nalgebra::Vector3;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A parsed input document: one molecular species and the frames to assign.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub topology: MoleculeTopology,
    pub frames: Vec<Frame>,
}

// ============================================================================
// RAW SCHEMA
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    topology: RawTopology,
    #[serde(default)]
    frames: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTopology {
    elements: Vec<String>,
    bonds: Vec<[usize; 2]>,
    /// First atom index used in `bonds` and `double_bond_pairs`.
    #[serde(default)]
    index_base: usize,
    representative: Option<usize>,
    /// Geometry used to pick a representative when none is given.
    template_positions: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    double_bonds: Vec<usize>,
    #[serde(default)]
    double_bond_pairs: Vec<[usize; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCell {
    /// Lattice vectors as rows.
    Rows([[f64; 3]; 3]),
    Parameters { parameters: [f64; 6] },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFrame {
    cell: RawCell,
    #[serde(default = "all_periodic")]
    pbc: [bool; 3],
    /// Omitted elements repeat the topology's elements for every molecule.
    elements: Option<Vec<String>>,
    positions: Vec<[f64; 3]>,
    #[serde(default)]
    wannier_centers: Vec<[f64; 3]>,
}

fn all_periodic() -> [bool; 3] {
    [true; 3]
}

// ============================================================================
// CONVERSION
// ============================================================================

fn build_topology(raw: RawTopology) -> Result<MoleculeTopology> {
    let mut topology = MoleculeTopology::from_indexed_bonds(raw.elements, &raw.bonds, raw.index_base)?;

    let representative = match (raw.representative, &raw.template_positions) {
        (Some(r), _) => r.checked_sub(raw.index_base).ok_or_else(|| {
            Error::InvalidTopology(format!("representative {} below index base {}", r, raw.index_base))
        })?,
        (None, Some(template)) => {
            let template: Vec<Vector3<f64>> = template.iter().map(|&p| Vector3::from(p)).collect();
            let chosen = topology.select_representative(&template)?;
            log::info!("selected atom {} as representative", chosen);
            chosen
        }
        (None, None) => 0,
    };
    topology = topology.with_representative(representative)?;

    let mut double_bonds = raw.double_bonds;
    if !raw.double_bond_pairs.is_empty() {
        let pairs = raw
            .double_bond_pairs
            .iter()
            .map(|&[i, j]| match (i.checked_sub(raw.index_base), j.checked_sub(raw.index_base)) {
                (Some(a), Some(b)) => Ok([a, b]),
                _ => Err(Error::invalid_bond(i, j, format!("index below base {}", raw.index_base))),
            })
            .collect::<Result<Vec<_>>>()?;
        for &[i, j] in &pairs {
            let bond = topology
                .bond_index(i, j)
                .ok_or_else(|| Error::invalid_bond(i, j, "double bond is not in the bond list"))?;
            if !double_bonds.contains(&bond) {
                double_bonds.push(bond);
            }
        }
    }
    topology.with_double_bonds(double_bonds)
}

fn build_frame(raw: RawFrame, topology: &MoleculeTopology) -> Result<Frame> {
    let lattice = match raw.cell {
        RawCell::Rows(rows) => Lattice::from_rows(rows)?,
        RawCell::Parameters { parameters: [a, b, c, alpha, beta, gamma] } => {
            Lattice::from_parameters(a, b, c, alpha, beta, gamma)?
        }
    };
    let cell = PeriodicCell::new(lattice, raw.pbc);

    let elements = match raw.elements {
        Some(elements) => elements,
        None => {
            let per_molecule = topology.num_atoms();
            if raw.positions.len() % per_molecule != 0 {
                return Err(Error::AtomCountMismatch {
                    atoms: raw.positions.len(),
                    per_molecule,
                });
            }
            topology
                .elements()
                .iter()
                .cloned()
                .cycle()
                .take(raw.positions.len())
                .collect()
        }
    };

    let positions = raw.positions.into_iter().map(Vector3::from).collect();
    let wannier_centers = raw.wannier_centers.into_iter().map(Vector3::from).collect();
    Frame::from_parts(cell, elements, positions, wannier_centers)
}

/// Parses an input document from a JSON string.
pub fn from_json_str(contents: &str) -> Result<InputDocument> {
    let raw: RawDocument = serde_json::from_str(contents)?;
    let topology = build_topology(raw.topology)?;
    let frames = raw
        .frames
        .into_iter()
        .map(|f| build_frame(f, &topology))
        .collect::<Result<Vec<_>>>()?;
    Ok(InputDocument { topology, frames })
}

/// Reads and parses an input document.
pub fn from_json(path: &Path) -> Result<InputDocument> {
    let contents = fs::read_to_string(path)?;
    from_json_str(&contents)
}

/// Reads an [`AssignConfig`] from JSON; missing fields keep their defaults.
pub fn config_from_json(path: &Path) -> Result<AssignConfig> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
