//! Graph storage layer
//!
//! Provides the CSR graph topology and, with the `storage` feature, Parquet
//! persistence for edge lists and run results.

pub mod csr;
#[cfg(feature = "storage")]
pub mod parquet;

pub use csr::GraphTopology;
#[cfg(feature = "storage")]
pub use parquet::{read_results_parquet, write_results_parquet};
