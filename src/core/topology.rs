use crate::error::{Error, Result};
use nalgebra::Vector3;
use std::fmt;

// ============================================================================
// BOND CLASSIFICATION
// ============================================================================

/// Chemical kind of a bond, from the elements at its two ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondKind {
    CH,
    CO,
    OH,
    OO,
    CC,
    CN,
    NH,
    Other,
}

impl BondKind {
    pub fn from_elements(a: &str, b: &str) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match (lo, hi) {
            ("C", "H") => BondKind::CH,
            ("C", "O") => BondKind::CO,
            ("H", "O") => BondKind::OH,
            ("O", "O") => BondKind::OO,
            ("C", "C") => BondKind::CC,
            ("C", "N") => BondKind::CN,
            ("H", "N") => BondKind::NH,
            _ => BondKind::Other,
        }
    }
}

impl fmt::Display for BondKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BondKind::CH => "C-H",
            BondKind::CO => "C-O",
            BondKind::OH => "O-H",
            BondKind::OO => "O-O",
            BondKind::CC => "C-C",
            BondKind::CN => "C-N",
            BondKind::NH => "N-H",
            BondKind::Other => "other",
        };
        f.write_str(label)
    }
}

// ============================================================================
// MOLECULE TOPOLOGY
// ============================================================================

/// Bond topology of one molecular species.
///
/// Indices are local to the molecule (0 = first atom of the molecule). The
/// same topology is shared by every instance of the species in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeTopology {
    elements: Vec<String>,
    bonds: Vec<[usize; 2]>,
    representative: usize,
    double_bonds: Vec<usize>,
}

impl MoleculeTopology {
    /// Creates a topology from element labels and 0-based bonds. The
    /// representative atom defaults to atom 0.
    pub fn new(elements: Vec<String>, bonds: Vec<[usize; 2]>) -> Result<Self> {
        if elements.is_empty() {
            return Err(Error::InvalidTopology("molecule has no atoms".to_string()));
        }
        for &[i, j] in &bonds {
            if i >= elements.len() || j >= elements.len() {
                return Err(Error::invalid_bond(
                    i,
                    j,
                    format!("molecule only has {} atoms", elements.len()),
                ));
            }
            if i == j {
                return Err(Error::invalid_bond(i, j, "atom bonded to itself"));
            }
        }
        let topology = Self {
            elements,
            bonds,
            representative: 0,
            double_bonds: Vec::new(),
        };
        if !topology.bonds_of_kind(BondKind::Other).is_empty() {
            log::warn!("topology contains bonds of unknown kind");
        }
        Ok(topology)
    }

    /// Creates a topology from bonds numbered from `base` (1 for most
    /// force-field topology files).
    pub fn from_indexed_bonds(elements: Vec<String>, bonds: &[[usize; 2]], base: usize) -> Result<Self> {
        let shifted = bonds
            .iter()
            .map(|&[i, j]| match (i.checked_sub(base), j.checked_sub(base)) {
                (Some(a), Some(b)) => Ok([a, b]),
                _ => Err(Error::invalid_bond(i, j, format!("index below base {base}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(elements, shifted)
    }

    pub fn with_representative(mut self, index: usize) -> Result<Self> {
        if index >= self.elements.len() {
            return Err(Error::InvalidTopology(format!(
                "representative atom {} out of range ({} atoms)",
                index,
                self.elements.len()
            )));
        }
        self.representative = index;
        Ok(self)
    }

    /// Marks the bonds at `indices` (positions in the bond list) as double bonds.
    pub fn with_double_bonds(mut self, indices: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&b| b >= self.bonds.len()) {
            return Err(Error::InvalidTopology(format!(
                "double bond {} out of range ({} bonds)",
                bad,
                self.bonds.len()
            )));
        }
        self.double_bonds = indices;
        Ok(self)
    }

    /// Marks double bonds given as atom pairs, in either orientation.
    pub fn with_double_bond_pairs(self, pairs: &[[usize; 2]]) -> Result<Self> {
        let indices = pairs
            .iter()
            .map(|&[i, j]| {
                self.bond_index(i, j)
                    .ok_or_else(|| Error::invalid_bond(i, j, "not in the bond list"))
            })
            .collect::<Result<Vec<_>>>()?;
        self.with_double_bonds(indices)
    }

    /// Picks the heavy atom closest to the centroid of all heavy atoms of a
    /// template geometry; a central atom keeps single-image displacements short.
    pub fn select_representative(&self, template: &[Vector3<f64>]) -> Result<usize> {
        if template.len() != self.elements.len() {
            return Err(Error::InvalidTopology(format!(
                "template has {} positions for {} atoms",
                template.len(),
                self.elements.len()
            )));
        }
        let heavy: Vec<usize> = (0..self.elements.len())
            .filter(|&i| self.elements[i] != "H")
            .collect();
        let candidates = if heavy.is_empty() {
            (0..self.elements.len()).collect()
        } else {
            heavy
        };

        let centroid = candidates
            .iter()
            .fold(Vector3::zeros(), |acc, &i| acc + template[i])
            / candidates.len() as f64;

        candidates
            .into_iter()
            .min_by(|&a, &b| {
                (template[a] - centroid)
                    .norm()
                    .total_cmp(&(template[b] - centroid).norm())
            })
            .ok_or_else(|| Error::InvalidTopology("molecule has no atoms".to_string()))
    }

    pub fn num_atoms(&self) -> usize { self.elements.len() }
    pub fn elements(&self) -> &[String] { &self.elements }
    pub fn bonds(&self) -> &[[usize; 2]] { &self.bonds }
    pub fn representative(&self) -> usize { self.representative }
    pub fn double_bonds(&self) -> &[usize] { &self.double_bonds }

    /// Position of the bond between `i` and `j` in the bond list.
    pub fn bond_index(&self, i: usize, j: usize) -> Option<usize> {
        self.bonds
            .iter()
            .position(|&b| b == [i, j] || b == [j, i])
    }

    pub fn bond_kind(&self, bond: usize) -> BondKind {
        let [i, j] = self.bonds[bond];
        BondKind::from_elements(&self.elements[i], &self.elements[j])
    }

    pub fn bonds_of_kind(&self, kind: BondKind) -> Vec<usize> {
        (0..self.bonds.len())
            .filter(|&b| self.bond_kind(b) == kind)
            .collect()
    }

    /// Local indices of atoms with the given element label.
    pub fn atoms_of_element(&self, element: &str) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.as_str() == element)
            .map(|(i, _)| i)
            .collect()
    }
}
