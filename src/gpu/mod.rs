//! GPU acceleration for frontier traversal
//!
//! # Architecture
//!
//! - `device`: wgpu device initialization, buffer readback, memory budget
//! - `traverse`: level-synchronous traversal labeling as a WGSL compute pass
//!
//! A [`GpuDevice`] can also size a host [`Context`](crate::Context) through
//! [`Context::with_gpu_budget`](crate::Context::with_gpu_budget), so the
//! memory ledger reflects the adapter's limits.
//!
//! # Feature Flag
//!
//! This module is only available with the `gpu` feature flag:
//! ```bash
//! cargo build --features gpu
//! ```

mod device;
mod traverse;

pub use device::{GpuDevice, GpuDeviceError};
pub use traverse::{gpu_traverse, GpuTraversal};
