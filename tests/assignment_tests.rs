use nalgebra::Vector3;
use wannier_assigner::analysis::assignment::dipole_moment;
use wannier_assigner::core::constants::DEBYE_PER_E_ANGSTROM;
use wannier_assigner::{
    AssignmentEngine, AssignmentError, AssignmentState, CollisionPolicy, Lattice, PeriodicCell,
};

const C: f64 = DEBYE_PER_E_ANGSTROM;

fn cubic(a: f64) -> PeriodicCell {
    PeriodicCell::fully_periodic(Lattice::cubic(a).expect("Failed to build lattice"))
}

#[test]
fn test_debye_conversion_factor() {
    assert!((DEBYE_PER_E_ANGSTROM - 4.8032).abs() < 1e-3);
}

#[test]
fn test_try_claim_is_all_or_nothing() {
    let mut state = AssignmentState::default();
    assert!(state.try_claim(&[1, 2]));
    assert!(!state.try_claim(&[2, 3]));
    assert!(!state.is_claimed(3));
    assert!(!state.try_claim(&[4, 4]));
    assert!(!state.is_claimed(4));
    assert_eq!(state.claimed(), &[1, 2]);
    assert_eq!(state.len(), 2);
    assert_eq!(state.collisions(), 0);
}

#[test]
fn test_dipole_moment_arity() {
    let d = Vector3::new(0.1, 0.0, 0.0);
    assert!((dipole_moment(&[d]).expect("Failed to compute dipole") - (-2.0 * C * d)).norm() < 1e-12);
    assert!((dipole_moment(&[d, d]).expect("Failed to compute dipole") - (-4.0 * C * d)).norm() < 1e-12);
    assert_eq!(dipole_moment(&[]), Err(AssignmentError::InvalidFeatureArity(0)));
    assert_eq!(dipole_moment(&[d, d, d]), Err(AssignmentError::InvalidFeatureArity(3)));
}

#[test]
fn test_single_center_bond_assignment() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(5.3, 5.0, 5.0), Vector3::new(7.0, 5.0, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();

    let assignment = engine
        .assign_nearest(&Vector3::new(5.0, 5.0, 5.0), &mut state, 1)
        .expect("Assignment failed");
    assert_eq!(assignment.wc_indices, vec![0]);
    assert!((assignment.dipole - Vector3::new(-2.0 * C * 0.3, 0.0, 0.0)).norm() < 1e-9);
    assert!((assignment.wc_positions[0] - wcs[0]).norm() < 1e-9);
    assert!(state.is_claimed(0));
    assert!(!state.is_claimed(1));
}

#[test]
fn test_lone_pair_assignment_averages_two_centers() {
    let cell = cubic(10.0);
    let wcs = [
        Vector3::new(5.0, 5.4, 5.0),
        Vector3::new(5.0, 4.6, 5.2),
        Vector3::new(9.0, 9.0, 9.0),
    ];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();

    let assignment = engine
        .assign_nearest(&Vector3::new(5.0, 5.0, 5.0), &mut state, 2)
        .expect("Assignment failed");
    assert_eq!(assignment.wc_indices, vec![0, 1]);
    assert!((assignment.dipole - Vector3::new(0.0, 0.0, -0.4 * C)).norm() < 1e-9);
    assert_eq!(state.claimed(), &[0, 1]);
}

#[test]
fn test_invalid_arity_is_an_error() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(5.3, 5.0, 5.0); 4];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();

    let reference = Vector3::new(5.0, 5.0, 5.0);
    assert_eq!(
        engine.assign_nearest(&reference, &mut state, 3),
        Err(AssignmentError::InvalidFeatureArity(3))
    );
    assert_eq!(
        engine.assign_nearest(&reference, &mut state, 0),
        Err(AssignmentError::InvalidFeatureArity(0))
    );
    assert!(state.is_empty());
}

#[test]
fn test_claimed_centers_are_skipped() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(5.1, 5.0, 5.0), Vector3::new(5.5, 5.0, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();
    assert!(state.try_claim(&[0]));

    let assignment = engine
        .assign_nearest(&Vector3::new(5.0, 5.0, 5.0), &mut state, 1)
        .expect("Assignment failed");
    assert_eq!(assignment.wc_indices, vec![1]);
    assert_eq!(state.claimed(), &[0, 1]);
}

#[test]
fn test_candidates_are_ranked_under_minimum_image() {
    let cell = cubic(10.0);
    // 9.8 is 0.4 away through the boundary, 0.9 is 0.7 away directly
    let wcs = [Vector3::new(0.9, 5.0, 5.0), Vector3::new(9.8, 5.0, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();

    let assignment = engine
        .assign_nearest(&Vector3::new(0.2, 5.0, 5.0), &mut state, 1)
        .expect("Assignment failed");
    assert_eq!(assignment.wc_indices, vec![1]);
    assert!((assignment.wc_positions[0] - Vector3::new(-0.2, 5.0, 5.0)).norm() < 1e-9);
    assert!((assignment.dipole - Vector3::new(0.8 * C, 0.0, 0.0)).norm() < 1e-9);
}

#[test]
fn test_distant_reference_uses_nearest_image() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(3.2, 5.0, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();

    // Reconstructed bond centers can sit two cells away from the wrapped centers
    let assignment = engine
        .assign_nearest(&Vector3::new(23.0, 5.0, 5.0), &mut state, 1)
        .expect("Assignment failed");
    assert!((assignment.wc_positions[0] - Vector3::new(23.2, 5.0, 5.0)).norm() < 1e-9);
}

#[test]
fn test_exhausted_unclaimed_pool_falls_back_to_a_collision() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(5.1, 5.0, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();

    let reference = Vector3::new(5.0, 5.0, 5.0);
    let first = engine
        .assign_nearest(&reference, &mut state, 1)
        .expect("Assignment failed");
    let second = engine
        .assign_nearest(&reference, &mut state, 1)
        .expect("Fallback assignment failed");
    assert_eq!(first.wc_indices, vec![0]);
    assert_eq!(second.wc_indices, vec![0]);
    assert_eq!(state.collisions(), 1);
    assert_eq!(state.claimed(), &[0]);

    // Only a pool smaller than the feature itself is an error
    assert_eq!(
        engine.assign_nearest(&reference, &mut state, 2),
        Err(AssignmentError::PoolExhausted {
            requested: 2,
            available: 1
        })
    );
    assert_eq!(state.collisions(), 1);
}

#[test]
fn test_lone_pair_takes_one_claimed_center_when_one_is_left() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(5.2, 5.0, 5.0), Vector3::new(4.7, 5.0, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::default();
    assert!(state.try_claim(&[0]));

    let assignment = engine
        .assign_nearest(&Vector3::new(5.0, 5.0, 5.0), &mut state, 2)
        .expect("Assignment failed");
    assert_eq!(assignment.wc_indices, vec![0, 1]);
    assert_eq!(state.collisions(), 1);
    assert_eq!(state.claimed(), &[0, 1]);
}

#[test]
fn test_legacy_policy_reuses_and_counts_collisions() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(5.1, 5.0, 5.0), Vector3::new(8.0, 5.0, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let mut state = AssignmentState::new(CollisionPolicy::Legacy);

    let reference = Vector3::new(5.0, 5.0, 5.0);
    let first = engine
        .assign_nearest(&reference, &mut state, 1)
        .expect("Assignment failed");
    let second = engine
        .assign_nearest(&reference, &mut state, 1)
        .expect("Assignment failed");
    assert_eq!(first.wc_indices, vec![0]);
    assert_eq!(second.wc_indices, vec![0]);
    assert_eq!(state.collisions(), 1);
    assert_eq!(state.claimed(), &[0]);
}

#[test]
fn test_pi_assignment_respects_radius() {
    let cell = cubic(10.0);
    let reference = Vector3::new(5.0, 5.0, 5.0);

    let inside = [Vector3::new(5.0, 5.5, 5.0)];
    let engine = AssignmentEngine::new(&cell, &inside, 1.0);
    let mut state = AssignmentState::default();
    let assignment = engine
        .assign_nearest_within_radius(&reference, &mut state, 0.65)
        .expect("Assignment failed");
    assert_eq!(assignment.wc_indices, vec![0]);
    assert!((assignment.dipole - Vector3::new(0.0, -2.0 * C * 0.5, 0.0)).norm() < 1e-9);
    assert!(state.is_claimed(0));

    let outside = [Vector3::new(5.0, 5.8, 5.0)];
    let engine = AssignmentEngine::new(&cell, &outside, 1.0);
    let mut state = AssignmentState::default();
    assert!(engine.assign_nearest_within_radius(&reference, &mut state, 0.65).is_none());
    assert!(state.is_empty());
}

#[test]
fn test_pi_assignment_never_takes_claimed_centers() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(5.0, 5.2, 5.0), Vector3::new(5.0, 5.6, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    let reference = Vector3::new(5.0, 5.0, 5.0);

    // Filtering applies under either policy
    let mut state = AssignmentState::new(CollisionPolicy::Legacy);
    assert!(state.try_claim(&[0]));
    let assignment = engine
        .assign_nearest_within_radius(&reference, &mut state, 0.65)
        .expect("Assignment failed");
    assert_eq!(assignment.wc_indices, vec![1]);
    assert!(engine.assign_nearest_within_radius(&reference, &mut state, 0.65).is_none());
    assert_eq!(state.collisions(), 0);
}

#[test]
fn test_legacy_pi_search_folds_once() {
    let cell = cubic(10.0);
    let wcs = [Vector3::new(3.0, 5.5, 5.0)];
    let engine = AssignmentEngine::new(&cell, &wcs, 1.0);
    // Two cells away from the wrapped center
    let reference = Vector3::new(23.0, 5.0, 5.0);

    let mut state = AssignmentState::new(CollisionPolicy::Prevent);
    let assignment = engine
        .assign_nearest_within_radius(&reference, &mut state, 0.65)
        .expect("π center within radius");
    assert!((assignment.wc_positions[0] - Vector3::new(23.0, 5.5, 5.0)).norm() < 1e-9);

    let mut state = AssignmentState::new(CollisionPolicy::Legacy);
    assert!(engine.assign_nearest_within_radius(&reference, &mut state, 0.65).is_none());
    assert!(state.is_empty());
}
