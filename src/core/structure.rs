use crate::error::{Error, Result};
use nalgebra::{Matrix3, Vector3};

// ============================================================================
// LATTICE
// ============================================================================

/// Unit cell of a periodic simulation box.
///
/// The columns of `matrix` are the lattice vectors a, b and c.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    pub matrix: Matrix3<f64>,
    pub reciprocal_matrix: Matrix3<f64>,
}

impl Lattice {
    pub fn new(matrix: Matrix3<f64>) -> Result<Self> {
        if matrix.determinant().abs() < 1e-6 {
            return Err(Error::InvalidCell("zero or near-zero volume".to_string()));
        }
        let reciprocal_matrix = matrix
            .try_inverse()
            .ok_or_else(|| Error::InvalidCell("matrix is not invertible".to_string()))?
            .transpose();
        Ok(Self {
            matrix,
            reciprocal_matrix,
        })
    }

    /// Builds a lattice from row vectors, the layout trajectory codes write.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Result<Self> {
        let matrix = Matrix3::from_columns(&[
            Vector3::from(rows[0]),
            Vector3::from(rows[1]),
            Vector3::from(rows[2]),
        ]);
        Self::new(matrix)
    }

    pub fn cubic(a: f64) -> Result<Self> {
        Self::orthorhombic(a, a, a)
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self> {
        Self::new(Matrix3::from_diagonal(&Vector3::new(a, b, c)))
    }

    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        let alpha_r = alpha.to_radians();
        let beta_r = beta.to_radians();
        let gamma_r = gamma.to_radians();

        let term = 1.0 - alpha_r.cos().powi(2) - beta_r.cos().powi(2) - gamma_r.cos().powi(2)
            + 2.0 * alpha_r.cos() * beta_r.cos() * gamma_r.cos();

        if term <= 0.0 {
            return Err(Error::InvalidCell(format!(
                "angles ({alpha}, {beta}, {gamma}) do not describe a cell"
            )));
        }

        let v_factor = term.sqrt();
        let matrix = Matrix3::new(
            a, b * gamma_r.cos(), c * beta_r.cos(),
            0.0, b * gamma_r.sin(), c * (alpha_r.cos() - beta_r.cos() * gamma_r.cos()) / gamma_r.sin(),
            0.0, 0.0, c * v_factor / gamma_r.sin(),
        );
        Self::new(matrix)
    }

    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> { self.matrix * frac }
    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> { self.reciprocal_matrix.transpose() * cart }

    /// Lattice vectors as rows.
    pub fn rows(&self) -> [[f64; 3]; 3] {
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            let col = self.matrix.column(i);
            *row = [col[0], col[1], col[2]];
        }
        rows
    }

    pub fn to_parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let a = self.matrix.column(0).norm();
        let b = self.matrix.column(1).norm();
        let c = self.matrix.column(2).norm();
        let alpha = (self.matrix.column(1).dot(&self.matrix.column(2)) / (b * c)).acos().to_degrees();
        let beta = (self.matrix.column(0).dot(&self.matrix.column(2)) / (a * c)).acos().to_degrees();
        let gamma = (self.matrix.column(0).dot(&self.matrix.column(1)) / (a * b)).acos().to_degrees();
        (a, b, c, alpha, beta, gamma)
    }
}

/// A lattice together with the axes along which it repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicCell {
    pub lattice: Lattice,
    pub pbc: [bool; 3],
}

impl PeriodicCell {
    pub fn new(lattice: Lattice, pbc: [bool; 3]) -> Self {
        Self { lattice, pbc }
    }

    pub fn fully_periodic(lattice: Lattice) -> Self {
        Self::new(lattice, [true; 3])
    }
}

// ============================================================================
// FRAME
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub element: String,
    /// Cartesian position in Å, possibly wrapped into the cell.
    pub position: Vector3<f64>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: Vector3<f64>) -> Self {
        Self {
            element: element.into(),
            position,
        }
    }
}

/// One simulation snapshot: atoms, cell and the Wannier centers of that step.
///
/// Atoms are stored molecule by molecule; every molecule has the same
/// number of atoms in the same order as its topology.
#[derive(Debug, Clone)]
pub struct Frame {
    pub cell: PeriodicCell,
    pub atoms: Vec<Atom>,
    pub wannier_centers: Vec<Vector3<f64>>,
}

impl Frame {
    pub fn new(cell: PeriodicCell, atoms: Vec<Atom>, wannier_centers: Vec<Vector3<f64>>) -> Self {
        Self {
            cell,
            atoms,
            wannier_centers,
        }
    }

    /// Builds a frame from parallel element/position arrays.
    pub fn from_parts(
        cell: PeriodicCell,
        elements: Vec<String>,
        positions: Vec<Vector3<f64>>,
        wannier_centers: Vec<Vector3<f64>>,
    ) -> Result<Self> {
        if elements.len() != positions.len() {
            return Err(Error::InconsistentFrame {
                positions: positions.len(),
                elements: elements.len(),
            });
        }
        let atoms = elements
            .into_iter()
            .zip(positions)
            .map(|(element, position)| Atom { element, position })
            .collect();
        Ok(Self::new(cell, atoms, wannier_centers))
    }

    /// Number of whole molecules of `atoms_per_molecule` atoms in the frame.
    pub fn molecule_count(&self, atoms_per_molecule: usize) -> Result<usize> {
        if atoms_per_molecule == 0 || self.atoms.len() % atoms_per_molecule != 0 {
            return Err(Error::AtomCountMismatch {
                atoms: self.atoms.len(),
                per_molecule: atoms_per_molecule,
            });
        }
        Ok(self.atoms.len() / atoms_per_molecule)
    }

    /// Atoms of molecule `index`.
    pub fn molecule(&self, index: usize, atoms_per_molecule: usize) -> &[Atom] {
        let start = index * atoms_per_molecule;
        &self.atoms[start..start + atoms_per_molecule]
    }
}
