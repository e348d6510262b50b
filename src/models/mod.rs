pub mod common;
pub mod contract;
pub mod datasets;
pub mod errors;
