//! Runtime datatype dispatch
//!
//! The engine is generic over vertex-id, row-offset and value widths. This
//! module is the width-erased entry point: callers hand in tagged CSR slices
//! and a [`RunConfig`]; the combination is checked once and mapped onto a
//! monomorphized engine instance.
//!
//! | vertex | size | traversal  | rank       |
//! |--------|------|------------|------------|
//! | u32    | u32  | i32 / i64  | f32 / f64  |
//! | u32    | u64  | i32 / i64  | f32 / f64  |
//! | u64    | u64  | i32 / i64  | f32 / f64  |

use crate::config::{AlgorithmKind, RunConfig};
use crate::context::Context;
use crate::enactor::{Enactor, Termination};
use crate::error::{FrontierError, Result};
use crate::functor::{RankPropagation, TraversalLabel, TraversalOptions};
use crate::problem::Problem;
use crate::stats::RunReport;
use crate::storage::GraphTopology;
use crate::types::{IdWidth, Label, Rank, SizeT, ValueKind, VertexId};

/// Row offsets of either width
#[derive(Debug, Clone, Copy)]
pub enum OffsetSlice<'a> {
    /// 32-bit offsets
    U32(&'a [u32]),
    /// 64-bit offsets
    U64(&'a [u64]),
}

/// Vertex ids of either width
#[derive(Debug, Clone, Copy)]
pub enum IdSlice<'a> {
    /// 32-bit ids
    U32(&'a [u32]),
    /// 64-bit ids
    U64(&'a [u64]),
}

macro_rules! width_tagged {
    ($name:ident) => {
        impl $name<'_> {
            /// Element width
            #[must_use]
            pub const fn width(&self) -> IdWidth {
                match self {
                    Self::U32(_) => IdWidth::U32,
                    Self::U64(_) => IdWidth::U64,
                }
            }

            /// Number of elements
            #[must_use]
            pub const fn len(&self) -> usize {
                match self {
                    Self::U32(values) => values.len(),
                    Self::U64(values) => values.len(),
                }
            }

            /// Whether the slice is empty
            #[must_use]
            pub const fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }
    };
}

width_tagged!(OffsetSlice);
width_tagged!(IdSlice);

/// Borrowed CSR input of any supported width
#[derive(Debug, Clone, Copy)]
pub struct CsrInput<'a> {
    /// Number of vertices
    pub node_count: usize,
    /// `node_count + 1` row offsets
    pub row_offsets: OffsetSlice<'a>,
    /// Edge targets
    pub col_indices: IdSlice<'a>,
}

/// Vertex ids (predecessors) of either width
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdColumn {
    /// 32-bit ids
    U32(Vec<u32>),
    /// 64-bit ids
    U64(Vec<u64>),
}

impl IdColumn {
    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U32(values) => values.len(),
            Self::U64(values) => values.len(),
        }
    }

    /// Whether the column is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry widened to `u64`; the all-ones sentinel stays all-ones
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u64> {
        match self {
            Self::U32(values) => values
                .get(index)
                .map(|&v| if v == u32::INVALID { u64::MAX } else { u64::from(v) }),
            Self::U64(values) => values.get(index).copied(),
        }
    }

    /// Whole column widened to `u64`
    #[must_use]
    pub fn to_u64(&self) -> Vec<u64> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }
}

/// Labels of either width
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelColumn {
    /// 32-bit labels
    I32(Vec<i32>),
    /// 64-bit labels
    I64(Vec<i64>),
}

impl LabelColumn {
    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::I32(values) => values.len(),
            Self::I64(values) => values.len(),
        }
    }

    /// Whether the column is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry widened to `i64`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        match self {
            Self::I32(values) => values.get(index).map(|&v| i64::from(v)),
            Self::I64(values) => values.get(index).copied(),
        }
    }

    /// Whole column widened to `i64`
    #[must_use]
    pub fn to_i64(&self) -> Vec<i64> {
        match self {
            Self::I32(values) => values.iter().map(|&v| i64::from(v)).collect(),
            Self::I64(values) => values.clone(),
        }
    }
}

/// Ranks of either width
#[derive(Debug, Clone, PartialEq)]
pub enum RankColumn {
    /// 32-bit ranks
    F32(Vec<f32>),
    /// 64-bit ranks
    F64(Vec<f64>),
}

impl RankColumn {
    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F32(values) => values.len(),
            Self::F64(values) => values.len(),
        }
    }

    /// Whether the column is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry widened to `f64`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Self::F32(values) => values.get(index).map(|&v| f64::from(v)),
            Self::F64(values) => values.get(index).copied(),
        }
    }

    /// Whole column widened to `f64`
    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Self::F32(values) => values.iter().map(|&v| f64::from(v)).collect(),
            Self::F64(values) => values.clone(),
        }
    }
}

/// Per-vertex results of a run, in vertex-id order
#[derive(Debug, Clone, PartialEq)]
pub enum VertexResults {
    /// Traversal labeling
    Labels {
        /// Hop counts (`-1` for unreached vertices)
        labels: LabelColumn,
        /// Predecessors when tracked (all-ones for unreached vertices)
        predecessors: Option<IdColumn>,
    },
    /// Rank propagation
    Ranks(RankColumn),
}

/// Results, termination and report of a dispatched run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Per-vertex results
    pub results: VertexResults,
    /// How the run ended
    pub termination: Termination,
    /// Run statistics
    pub report: RunReport,
    /// Source vertex of a traversal
    pub source: Option<u64>,
}

/// Typed view of a width-tagged slice
trait Width: Sized {
    fn ids<'a>(slice: &IdSlice<'a>) -> Option<&'a [Self]>;
    fn offsets<'a>(slice: &OffsetSlice<'a>) -> Option<&'a [Self]>;
}

impl Width for u32 {
    fn ids<'a>(slice: &IdSlice<'a>) -> Option<&'a [Self]> {
        match *slice {
            IdSlice::U32(values) => Some(values),
            IdSlice::U64(_) => None,
        }
    }

    fn offsets<'a>(slice: &OffsetSlice<'a>) -> Option<&'a [Self]> {
        match *slice {
            OffsetSlice::U32(values) => Some(values),
            OffsetSlice::U64(_) => None,
        }
    }
}

impl Width for u64 {
    fn ids<'a>(slice: &IdSlice<'a>) -> Option<&'a [Self]> {
        match *slice {
            IdSlice::U64(values) => Some(values),
            IdSlice::U32(_) => None,
        }
    }

    fn offsets<'a>(slice: &OffsetSlice<'a>) -> Option<&'a [Self]> {
        match *slice {
            OffsetSlice::U64(values) => Some(values),
            OffsetSlice::U32(_) => None,
        }
    }
}

/// Validate, pick the engine instance for `config.types`, and run it
///
/// # Errors
///
/// - any [`RunConfig::validate`] error
/// - `UnsupportedTypes` if the input widths disagree with `config.types`
/// - `InvalidTopology` for malformed CSR arrays
/// - any `Problem::init`, `Problem::reset` or `Enactor::enact` error
pub fn run(ctx: &Context, input: &CsrInput<'_>, config: &RunConfig) -> Result<RunOutput> {
    config.validate()?;
    let types = config.types;
    if input.col_indices.width() != types.vertex || input.row_offsets.width() != types.size {
        return Err(FrontierError::UnsupportedTypes(format!(
            "input has vertex={} size={}, configuration asks for {types}",
            input.col_indices.width(),
            input.row_offsets.width()
        )));
    }

    tracing::debug!(%types, algorithm = %config.algorithm, "dispatching run");

    macro_rules! engine {
        ($v:ty, $s:ty) => {
            match (config.algorithm, types.value) {
                (AlgorithmKind::TraversalLabel, ValueKind::I32) => {
                    run_traversal::<$v, $s, i32>(ctx, input, config)
                }
                (AlgorithmKind::TraversalLabel, ValueKind::I64) => {
                    run_traversal::<$v, $s, i64>(ctx, input, config)
                }
                (AlgorithmKind::RankPropagation, ValueKind::F32) => {
                    run_rank::<$v, $s, f32>(ctx, input, config)
                }
                (AlgorithmKind::RankPropagation, ValueKind::F64) => {
                    run_rank::<$v, $s, f64>(ctx, input, config)
                }
                (algorithm, value) => Err(FrontierError::UnsupportedTypes(format!(
                    "{value} values for {algorithm}"
                ))),
            }
        };
    }

    match (types.vertex, types.size) {
        (IdWidth::U32, IdWidth::U32) => engine!(u32, u32),
        (IdWidth::U32, IdWidth::U64) => engine!(u32, u64),
        (IdWidth::U64, IdWidth::U64) => engine!(u64, u64),
        (IdWidth::U64, IdWidth::U32) => Err(FrontierError::UnsupportedTypes(format!(
            "{types}: size counter narrower than vertex id"
        ))),
    }
}

fn topology<V, S>(input: &CsrInput<'_>) -> Result<GraphTopology<V, S>>
where
    V: VertexId + Width,
    S: SizeT + Width,
{
    let mismatch = || FrontierError::UnsupportedTypes("input width changed during dispatch".into());
    let row_offsets = S::offsets(&input.row_offsets).ok_or_else(mismatch)?;
    let col_indices = V::ids(&input.col_indices).ok_or_else(mismatch)?;
    GraphTopology::from_csr(input.node_count, row_offsets, col_indices)
}

fn run_traversal<V, S, L>(ctx: &Context, input: &CsrInput<'_>, config: &RunConfig) -> Result<RunOutput>
where
    V: VertexId + Width,
    S: SizeT + Width,
    L: Label,
{
    let topology = topology::<V, S>(input)?;
    let algorithm = TraversalLabel::<V, S, L>::new(TraversalOptions::from_config(config))?;
    let mut problem = Problem::init_partitioned(
        ctx,
        &topology,
        algorithm,
        config.device_count,
        config.partition,
    )?;
    problem.reset(config)?;

    let mut enactor = Enactor::new(config.advance);
    let termination = enactor.enact(&mut problem)?;

    Ok(RunOutput {
        results: VertexResults::Labels {
            labels: L::into_column(problem.labels()?),
            predecessors: problem.predecessors()?.map(V::into_column),
        },
        termination,
        report: enactor.report(&problem)?,
        source: problem.source().and_then(|s| u64::try_from(s).ok()),
    })
}

fn run_rank<V, S, R>(ctx: &Context, input: &CsrInput<'_>, config: &RunConfig) -> Result<RunOutput>
where
    V: VertexId + Width,
    S: SizeT + Width,
    R: Rank,
{
    let topology = topology::<V, S>(input)?;
    let mut problem = Problem::init_partitioned(
        ctx,
        &topology,
        RankPropagation::<V, S, R>::new(),
        config.device_count,
        config.partition,
    )?;
    problem.reset(config)?;

    let mut enactor = Enactor::new(config.advance);
    let termination = enactor.enact(&mut problem)?;

    Ok(RunOutput {
        results: VertexResults::Ranks(R::into_column(problem.ranks()?)),
        termination,
        report: enactor.report(&problem)?,
        source: None,
    })
}
