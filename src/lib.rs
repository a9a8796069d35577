//! trueno-frontier: frontier-based parallel graph traversal
//!
//! # Overview
//!
//! trueno-frontier runs graph primitives as a loop of data-parallel phases
//! over a *frontier*, the set of vertices active in the current iteration.
//! A primitive is three pieces:
//!
//! - a [`Problem`]: partitioned topology, per-vertex state and frontiers
//! - a [`Functor`](functor::Functor): per-edge and per-vertex kernels
//! - an [`Enactor`]: the Advance / Filter / Exchange iteration driver
//!
//! Two primitives ship with the crate: hop-count traversal labeling
//! ([`TraversalLabel`]) and damped rank propagation ([`RankPropagation`]).
//!
//! # Quick Start
//!
//! ```
//! use trueno_frontier::{
//!     Context, ContextConfig, Enactor, GraphTopology, Problem, RunConfig, Termination,
//!     TraversalLabel, TraversalOptions,
//! };
//!
//! # fn example() -> trueno_frontier::Result<()> {
//! let ctx = Context::new(&ContextConfig::default())?;
//! let graph = GraphTopology::<u32, u32>::from_edge_list(4, &[(0, 1), (1, 2), (0, 3)])?;
//!
//! let algorithm = TraversalLabel::<u32, u32, i32>::new(TraversalOptions::default())?;
//! let mut problem = Problem::init(&ctx, &graph, algorithm, 1)?;
//! problem.reset(&RunConfig::traversal(0))?;
//!
//! let mut enactor = Enactor::default();
//! assert_eq!(enactor.enact(&mut problem)?, Termination::Converged);
//! assert_eq!(problem.labels()?, vec![0, 1, 2, 1]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Architecture
//!
//! - **Storage**: CSR topology, Parquet edge lists and results (`storage` feature)
//! - **Devices**: explicit [`Context`] of worker pools with memory budgets
//! - **Partitioning**: owned vertices plus ghosts, cross-device exchange per iteration
//! - **Dispatch**: width-erased entry point over vertex-id, offset and value widths
//! - **GPU**: wgpu traversal kernel and VRAM-derived budgets (`gpu` feature)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bitset;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod enactor;
pub mod error;
pub mod frontier;
pub mod functor;
pub mod partition;
pub mod problem;
pub mod reference;
pub mod stats;
pub mod storage;
pub mod types;

// GPU acceleration (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export core types
pub use config::{AlgorithmKind, RunConfig, SourceSelection};
pub use context::{Context, ContextConfig, Device, MemoryReservation, DEFAULT_MEMORY_BUDGET};
pub use dispatch::{
    run, CsrInput, IdColumn, IdSlice, LabelColumn, OffsetSlice, RankColumn, RunOutput,
    VertexResults,
};
pub use enactor::{
    AdvanceStrategy, CancelToken, Enactor, EnactorState, Termination, AUTO_EDGE_THRESHOLD,
};
pub use error::{ErrorClass, FrontierError, Phase, Result};
pub use frontier::{CapacityExceeded, Frontier};
pub use functor::{RankPropagation, TraversalLabel, TraversalOptions};
pub use partition::{Partition, PartitionPlan, PartitionStrategy};
pub use problem::{Algorithm, Lifecycle, Problem};
pub use stats::{PhaseBusy, RunReport, Statistics, StatsCollector};
pub use storage::GraphTopology;
pub use types::{IdWidth, Label, Rank, SizeT, TypeSpec, ValueKind, VertexId};

#[cfg(feature = "storage")]
pub use storage::{read_results_parquet, write_results_parquet};

#[cfg(feature = "gpu")]
pub use gpu::{gpu_traverse, GpuDevice, GpuDeviceError, GpuTraversal};
