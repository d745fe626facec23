//! Nearest-feature assignment of Wannier centers.
//!
//! A chemical feature (lone pair, bond, π-bond) is represented by a reference
//! point. Assignment picks the Wannier centers nearest to that point under
//! the minimum image convention, claims them for the current frame and turns
//! their displacements into a dipole moment. Claims are irrevocable and the
//! search is greedy: the order in which features are assigned matters.

use crate::core::constants::DEBYE_PER_E_ANGSTROM;
use crate::core::structure::PeriodicCell;
use crate::error::AssignmentError;
use crate::math::pbc::{minimum_image_displacements, minimum_image_displacements_multi_pass};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// EXCLUSION STATE
// ============================================================================

/// How k-nearest assignment treats Wannier centers that are already claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Claimed centers are skipped while enough unclaimed ones remain.
    #[default]
    Prevent,
    /// Lone pairs and single bonds search the whole pool; reusing a claimed
    /// center is warned about and counted. π centers are ranked with a single
    /// minimum-image fold. Reproduces older numeric results.
    Legacy,
}

/// The set of Wannier centers claimed so far in one frame.
#[derive(Debug, Clone, Default)]
pub struct AssignmentState {
    claimed: HashSet<usize>,
    order: Vec<usize>,
    collisions: usize,
    policy: CollisionPolicy,
}

impl AssignmentState {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    pub fn is_claimed(&self, index: usize) -> bool {
        self.claimed.contains(&index)
    }

    /// Claims all of `indices`, or none of them.
    ///
    /// Fails if any index is already claimed or appears twice in `indices`.
    pub fn try_claim(&mut self, indices: &[usize]) -> bool {
        let mut seen = HashSet::with_capacity(indices.len());
        if indices
            .iter()
            .any(|i| self.claimed.contains(i) || !seen.insert(*i))
        {
            return false;
        }
        for &i in indices {
            self.claimed.insert(i);
            self.order.push(i);
        }
        true
    }

    fn record_collision(&mut self, indices: &[usize]) {
        self.collisions += 1;
        for &i in indices {
            if self.claimed.insert(i) {
                self.order.push(i);
            }
        }
    }

    /// Claimed indices in claim order, each listed once.
    pub fn claimed(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of assignments that reused an already claimed center.
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

// ============================================================================
// ASSIGNMENT
// ============================================================================

/// Wannier centers claimed by one chemical feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub wc_indices: Vec<usize>,
    /// Dipole moment in Debye.
    pub dipole: Vector3<f64>,
    /// Positions of the claimed centers, on the image nearest the reference.
    pub wc_positions: Vec<Vector3<f64>>,
}

/// Dipole of one or two Wannier centers (each carrying two electrons)
/// relative to a reference point, in Debye.
pub fn dipole_moment(displacements: &[Vector3<f64>]) -> Result<Vector3<f64>, AssignmentError> {
    match displacements {
        [d] => Ok(-2.0 * DEBYE_PER_E_ANGSTROM * d),
        [d1, d2] => Ok(-4.0 * DEBYE_PER_E_ANGSTROM * (d1 + d2) / 2.0),
        other => Err(AssignmentError::InvalidFeatureArity(other.len())),
    }
}

struct Candidate {
    index: usize,
    displacement: Vector3<f64>,
    distance: f64,
}

/// Assigns Wannier centers of one frame to reference points.
pub struct AssignmentEngine<'a> {
    cell: &'a PeriodicCell,
    wannier_centers: &'a [Vector3<f64>],
    distance_warning: f64,
}

impl<'a> AssignmentEngine<'a> {
    /// `distance_warning` is the reference-to-center distance (Å) above
    /// which an assignment is reported as implausible.
    pub fn new(cell: &'a PeriodicCell, wannier_centers: &'a [Vector3<f64>], distance_warning: f64) -> Self {
        Self {
            cell,
            wannier_centers,
            distance_warning,
        }
    }

    /// Claims the `k` (1 or 2) centers nearest to `reference`.
    ///
    /// Under [`CollisionPolicy::Prevent`] claimed centers are skipped while at
    /// least `k` unclaimed ones remain; after that the whole pool is searched
    /// and the reuse is counted as a collision. Only a frame holding fewer
    /// than `k` centers in total yields [`AssignmentError::PoolExhausted`].
    pub fn assign_nearest(
        &self,
        reference: &Vector3<f64>,
        state: &mut AssignmentState,
        k: usize,
    ) -> Result<Assignment, AssignmentError> {
        if k != 1 && k != 2 {
            return Err(AssignmentError::InvalidFeatureArity(k));
        }

        let all: Vec<usize> = (0..self.wannier_centers.len()).collect();
        let pool: Vec<usize> = match state.policy() {
            CollisionPolicy::Prevent => {
                let unclaimed: Vec<usize> = all.iter().copied().filter(|&i| !state.is_claimed(i)).collect();
                if unclaimed.len() >= k {
                    unclaimed
                } else {
                    log::warn!(
                        "only {} unclaimed Wannier centers left for a feature needing {}; claimed centers are searched too",
                        unclaimed.len(),
                        k
                    );
                    all
                }
            }
            CollisionPolicy::Legacy => all,
        };
        if pool.len() < k {
            return Err(AssignmentError::PoolExhausted {
                requested: k,
                available: pool.len(),
            });
        }

        let ranked = self.rank(reference, &pool, true);
        let selected = &ranked[..k];

        if selected[0].distance > self.distance_warning {
            log::warn!(
                "Wannier center {} is {:.4} Å from reference point {:?}",
                selected[0].index,
                selected[0].distance,
                reference.as_slice()
            );
        }

        let wc_indices: Vec<usize> = selected.iter().map(|c| c.index).collect();
        if !state.try_claim(&wc_indices) {
            log::warn!("Wannier centers {:?} are assigned more than once", wc_indices);
            state.record_collision(&wc_indices);
        }

        let displacements: Vec<Vector3<f64>> = selected.iter().map(|c| c.displacement).collect();
        Ok(Assignment {
            dipole: dipole_moment(&displacements)?,
            wc_positions: displacements.iter().map(|d| reference + d).collect(),
            wc_indices,
        })
    }

    /// Claims the nearest unclaimed center strictly closer than `radius`, if any.
    ///
    /// Under [`CollisionPolicy::Legacy`] displacements are folded once, so a
    /// center more than one image away from `reference` is out of reach.
    ///
    /// `None` is a normal outcome: not every double bond carries a
    /// separate π center.
    pub fn assign_nearest_within_radius(
        &self,
        reference: &Vector3<f64>,
        state: &mut AssignmentState,
        radius: f64,
    ) -> Option<Assignment> {
        let pool: Vec<usize> = (0..self.wannier_centers.len())
            .filter(|&i| !state.is_claimed(i))
            .collect();

        let multi_pass = state.policy() == CollisionPolicy::Prevent;
        let nearest = self
            .rank(reference, &pool, multi_pass)
            .into_iter()
            .find(|c| c.distance < radius)?;

        if !state.try_claim(&[nearest.index]) {
            return None;
        }
        Some(Assignment {
            wc_indices: vec![nearest.index],
            dipole: -2.0 * DEBYE_PER_E_ANGSTROM * nearest.displacement,
            wc_positions: vec![reference + nearest.displacement],
        })
    }

    /// Candidates from `pool` sorted by ascending distance to `reference`;
    /// ties keep pool order.
    fn rank(&self, reference: &Vector3<f64>, pool: &[usize], multi_pass: bool) -> Vec<Candidate> {
        let targets: Vec<Vector3<f64>> = pool.iter().map(|&i| self.wannier_centers[i]).collect();
        let displacements = if multi_pass {
            minimum_image_displacements_multi_pass(reference, &targets, self.cell)
        } else {
            minimum_image_displacements(reference, &targets, self.cell, true)
        };

        let mut ranked: Vec<Candidate> = pool
            .iter()
            .zip(displacements)
            .map(|(&index, displacement)| Candidate {
                index,
                distance: displacement.norm(),
                displacement,
            })
            .collect();
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        ranked
    }
}
