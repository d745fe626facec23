pub mod connectivity;
pub mod constants;
pub mod structure;
pub mod topology;
