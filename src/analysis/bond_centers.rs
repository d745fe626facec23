use nalgebra::Vector3;

/// Computes bond midpoints from reconstructed atom positions.
///
/// Bonds longer than `long_bond_warning` are reported but still get a
/// midpoint. This threshold is independent of the reconstruction tolerance.
#[derive(Debug, Clone, Copy)]
pub struct BondCenterCalculator {
    pub long_bond_warning: f64,
}

impl BondCenterCalculator {
    pub fn new(long_bond_warning: f64) -> Self {
        Self { long_bond_warning }
    }

    pub fn compute(&self, molecule: usize, positions: &[Vector3<f64>], bonds: &[[usize; 2]]) -> Vec<Vector3<f64>> {
        bonds
            .iter()
            .enumerate()
            .map(|(bond, &[i, j])| {
                let length = (positions[i] - positions[j]).norm();
                if length > self.long_bond_warning {
                    log::warn!(
                        "molecule {}: bond {} ({}-{}) is {:.4} Å long",
                        molecule, bond, i, j, length
                    );
                }
                (positions[i] + positions[j]) / 2.0
            })
            .collect()
    }
}
