pub mod assignment;
pub mod bond_centers;
pub mod orchestrator;
pub mod reconstruct;
