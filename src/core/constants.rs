//! Physical constants used to express dipoles in Debye.

/// One Ångström in metres.
pub const ANGSTROM: f64 = 1.0e-10;

/// Elementary charge in Coulomb.
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

/// One Debye in Coulomb metres.
pub const DEBYE: f64 = 3.33564e-30;

/// Converts a dipole in e·Å into Debye (≈ 4.8032).
pub const DEBYE_PER_E_ANGSTROM: f64 = ANGSTROM * ELEMENTARY_CHARGE / DEBYE;
