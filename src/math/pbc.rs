//! Minimum-image displacements under periodic boundary conditions.
//!
//! Folding is done on fractional components, so any (triclinic) cell is
//! handled; for an orthorhombic cell a component is folded exactly when its
//! Cartesian magnitude exceeds half the edge length. Axes that are not
//! periodic are never folded.

use crate::core::structure::PeriodicCell;
use nalgebra::Vector3;

/// Applies a single minimum-image fold to `d`.
///
/// Every periodic fractional component whose magnitude exceeds one half is
/// moved back by one cell. A displacement that needs no folding is returned
/// unchanged, bit for bit, so folding an already-folded vector is a no-op.
pub fn fold_once(cell: &PeriodicCell, d: &Vector3<f64>) -> Vector3<f64> {
    let frac = cell.lattice.to_fractional(d);
    let mut shift = Vector3::zeros();
    for axis in 0..3 {
        if cell.pbc[axis] && frac[axis].is_finite() && frac[axis].abs() > 0.5 {
            shift[axis] = frac[axis].signum();
        }
    }
    apply_shift(cell, d, &shift)
}

/// Repeats the single fold until no periodic component exceeds one half.
///
/// Returns the folded vector and the number of passes that moved it.
pub fn fold_repeatedly(cell: &PeriodicCell, d: &Vector3<f64>) -> (Vector3<f64>, usize) {
    let frac = cell.lattice.to_fractional(d);
    let mut shift: Vector3<f64> = Vector3::zeros();
    let mut passes = 0;
    loop {
        let mut moved = false;
        for axis in 0..3 {
            let f = frac[axis] - shift[axis];
            if cell.pbc[axis] && f.is_finite() && f.abs() > 0.5 {
                shift[axis] += f.signum();
                moved = true;
            }
        }
        if !moved {
            break;
        }
        passes += 1;
    }
    (apply_shift(cell, d, &shift), passes)
}

fn apply_shift(cell: &PeriodicCell, d: &Vector3<f64>, shift: &Vector3<f64>) -> Vector3<f64> {
    if shift.iter().all(|s| *s == 0.0) {
        *d
    } else {
        d - cell.lattice.to_cartesian(shift)
    }
}

/// Displacements from `reference` to every target.
///
/// With `wrap` false these are raw Cartesian differences; otherwise each is
/// folded once (single-image minimum image).
pub fn minimum_image_displacements(
    reference: &Vector3<f64>,
    targets: &[Vector3<f64>],
    cell: &PeriodicCell,
    wrap: bool,
) -> Vec<Vector3<f64>> {
    targets
        .iter()
        .map(|t| {
            let d = t - reference;
            if wrap { fold_once(cell, &d) } else { d }
        })
        .collect()
}

/// Like [`minimum_image_displacements`], but folds each vector as many times
/// as needed. Targets more than one image away from the reference (Wannier
/// centers versus unwrapped bond centers) end up on the nearest image.
pub fn minimum_image_displacements_multi_pass(
    reference: &Vector3<f64>,
    targets: &[Vector3<f64>],
    cell: &PeriodicCell,
) -> Vec<Vector3<f64>> {
    let mut max_passes = 0;
    let displacements = targets
        .iter()
        .map(|t| {
            let (d, passes) = fold_repeatedly(cell, &(t - reference));
            max_passes = max_passes.max(passes);
            d
        })
        .collect();
    if max_passes > 1 {
        log::warn!("minimum image needed {} folding passes", max_passes);
    }
    displacements
}

/// Single-pass minimum-image vector from `a` to `b`.
pub fn minimum_image_vector(a: &Vector3<f64>, b: &Vector3<f64>, cell: &PeriodicCell) -> Vector3<f64> {
    fold_once(cell, &(b - a))
}

pub fn minimum_image_distance(a: &Vector3<f64>, b: &Vector3<f64>, cell: &PeriodicCell) -> f64 {
    minimum_image_vector(a, b, cell).norm()
}
