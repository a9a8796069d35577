//! Datatype widths for vertex ids, size counters and vertex values
//!
//! The engine is generic over these traits. A concrete combination is picked
//! once, at configuration time, through [`TypeSpec`] (see [`crate::dispatch`]),
//! and never changes during a run.

use crate::config::AlgorithmKind;
use crate::dispatch::{IdColumn, LabelColumn, RankColumn};
use crate::error::{FrontierError, Result};
use num_traits::{Float, PrimInt, Signed};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

/// Vertex identifier width
pub trait VertexId:
    Copy + Send + Sync + fmt::Debug + fmt::Display + Eq + Ord + Hash + Default + 'static
{
    /// Atomic cell holding a vertex id
    type Atomic: Send + Sync + fmt::Debug;

    /// Width tag used by the dispatcher
    const WIDTH: IdWidth;

    /// "No vertex" sentinel (all bits set)
    const INVALID: Self;

    /// Convert an index, `None` if it does not fit this width
    fn from_index(index: usize) -> Option<Self>;

    /// Convert to an index
    fn index(self) -> usize;

    /// Widen to `u64`
    fn as_u64(self) -> u64;

    /// New atomic cell
    fn new_atomic(value: Self) -> Self::Atomic;

    /// Relaxed load
    fn load(cell: &Self::Atomic) -> Self;

    /// Relaxed store
    fn store(cell: &Self::Atomic, value: Self);

    /// Wrap a column of ids for width-erased output
    fn into_column(values: Vec<Self>) -> IdColumn;
}

/// Size-counter width (CSR row offsets)
pub trait SizeT: Copy + Send + Sync + fmt::Debug + Eq + Ord + Default + 'static {
    /// Width tag used by the dispatcher
    const WIDTH: IdWidth;

    /// Convert a count, `None` if it does not fit this width
    fn from_count(count: usize) -> Option<Self>;

    /// Convert to a count
    fn count(self) -> usize;
}

/// Integer label width (hop counts)
pub trait Label:
    PrimInt + Signed + Send + Sync + fmt::Debug + fmt::Display + Default + 'static
{
    /// Atomic cell holding a label
    type Atomic: Send + Sync + fmt::Debug;

    /// Width tag used by the dispatcher
    const KIND: ValueKind;

    /// Sentinel for vertices that were never reached
    const UNVISITED: Self;

    /// Label for a hop count, saturating at the maximum
    fn from_depth(depth: u32) -> Self;

    /// New atomic cell
    fn new_atomic(value: Self) -> Self::Atomic;

    /// Relaxed load
    fn load(cell: &Self::Atomic) -> Self;

    /// Relaxed store
    fn store(cell: &Self::Atomic, value: Self);

    /// Compare-exchange from [`Label::UNVISITED`] to `value`.
    ///
    /// Returns `true` for exactly one caller per cell.
    fn claim(cell: &Self::Atomic, value: Self) -> bool;

    /// Wrap a column of labels for width-erased output
    fn into_column(values: Vec<Self>) -> LabelColumn;
}

/// Floating rank width
pub trait Rank:
    Float + Send + Sync + fmt::Debug + fmt::Display + Default + std::iter::Sum + 'static
{
    /// Atomic cell holding a rank (stored as its bit pattern)
    type Atomic: Send + Sync + fmt::Debug;

    /// Width tag used by the dispatcher
    const KIND: ValueKind;

    /// Narrow or widen from `f64`
    fn from_f64(value: f64) -> Self;

    /// Widen to `f64`
    fn as_f64(self) -> f64;

    /// New atomic cell
    fn new_atomic(value: Self) -> Self::Atomic;

    /// Relaxed load
    fn load(cell: &Self::Atomic) -> Self;

    /// Relaxed store
    fn store(cell: &Self::Atomic, value: Self);

    /// Atomic add, returns the previous value
    fn fetch_add(cell: &Self::Atomic, value: Self) -> Self;

    /// Atomic swap, returns the previous value
    fn swap(cell: &Self::Atomic, value: Self) -> Self;

    /// Bitwise equality (distinguishes `0.0` from `-0.0`, `NaN` equals itself)
    fn bits_eq(self, other: Self) -> bool;

    /// Wrap a column of ranks for width-erased output
    fn into_column(values: Vec<Self>) -> RankColumn;
}

macro_rules! impl_unsigned_width {
    ($t:ty, $atomic:ty, $width:expr, $column:ident) => {
        impl VertexId for $t {
            type Atomic = $atomic;
            const WIDTH: IdWidth = $width;
            const INVALID: Self = <$t>::MAX;

            fn from_index(index: usize) -> Option<Self> {
                <$t>::try_from(index).ok()
            }

            #[allow(clippy::cast_possible_truncation)] // ids beyond usize cannot be allocated
            fn index(self) -> usize {
                self as usize
            }

            fn as_u64(self) -> u64 {
                u64::from(self)
            }

            fn new_atomic(value: Self) -> Self::Atomic {
                <$atomic>::new(value)
            }

            fn load(cell: &Self::Atomic) -> Self {
                cell.load(Ordering::Relaxed)
            }

            fn store(cell: &Self::Atomic, value: Self) {
                cell.store(value, Ordering::Relaxed);
            }

            fn into_column(values: Vec<Self>) -> IdColumn {
                IdColumn::$column(values)
            }
        }

        impl SizeT for $t {
            const WIDTH: IdWidth = $width;

            fn from_count(count: usize) -> Option<Self> {
                <$t>::try_from(count).ok()
            }

            #[allow(clippy::cast_possible_truncation)]
            fn count(self) -> usize {
                self as usize
            }
        }
    };
}

impl_unsigned_width!(u32, AtomicU32, IdWidth::U32, U32);
impl_unsigned_width!(u64, AtomicU64, IdWidth::U64, U64);

macro_rules! impl_label {
    ($t:ty, $atomic:ty, $kind:expr, $column:ident) => {
        impl Label for $t {
            type Atomic = $atomic;
            const KIND: ValueKind = $kind;
            const UNVISITED: Self = -1;

            fn from_depth(depth: u32) -> Self {
                <$t>::try_from(depth).unwrap_or(<$t>::MAX)
            }

            fn new_atomic(value: Self) -> Self::Atomic {
                <$atomic>::new(value)
            }

            fn load(cell: &Self::Atomic) -> Self {
                cell.load(Ordering::Relaxed)
            }

            fn store(cell: &Self::Atomic, value: Self) {
                cell.store(value, Ordering::Relaxed);
            }

            fn claim(cell: &Self::Atomic, value: Self) -> bool {
                cell.compare_exchange(
                    Self::UNVISITED,
                    value,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            }

            fn into_column(values: Vec<Self>) -> LabelColumn {
                LabelColumn::$column(values)
            }
        }
    };
}

impl_label!(i32, AtomicI32, ValueKind::I32, I32);
impl_label!(i64, AtomicI64, ValueKind::I64, I64);

macro_rules! impl_rank {
    ($t:ty, $atomic:ty, $kind:expr, $column:ident) => {
        impl Rank for $t {
            type Atomic = $atomic;
            const KIND: ValueKind = $kind;

            #[allow(clippy::cast_possible_truncation)] // f32 ranks accept rounding
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn as_f64(self) -> f64 {
                f64::from(self)
            }

            fn new_atomic(value: Self) -> Self::Atomic {
                <$atomic>::new(value.to_bits())
            }

            fn load(cell: &Self::Atomic) -> Self {
                <$t>::from_bits(cell.load(Ordering::Relaxed))
            }

            fn store(cell: &Self::Atomic, value: Self) {
                cell.store(value.to_bits(), Ordering::Relaxed);
            }

            fn fetch_add(cell: &Self::Atomic, value: Self) -> Self {
                let previous = cell
                    .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |bits| {
                        Some((<$t>::from_bits(bits) + value).to_bits())
                    })
                    .unwrap_or_else(|bits| bits);
                <$t>::from_bits(previous)
            }

            fn swap(cell: &Self::Atomic, value: Self) -> Self {
                <$t>::from_bits(cell.swap(value.to_bits(), Ordering::AcqRel))
            }

            fn bits_eq(self, other: Self) -> bool {
                self.to_bits() == other.to_bits()
            }

            fn into_column(values: Vec<Self>) -> RankColumn {
                RankColumn::$column(values)
            }
        }
    };
}

impl_rank!(f32, AtomicU32, ValueKind::F32, F32);
impl_rank!(f64, AtomicU64, ValueKind::F64, F64);

/// Integer width of vertex ids or size counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdWidth {
    /// 32-bit
    #[default]
    U32,
    /// 64-bit
    U64,
}

impl IdWidth {
    /// Width in bits
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::U32 => 32,
            Self::U64 => 64,
        }
    }
}

impl fmt::Display for IdWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.bits())
    }
}

/// Value type of the per-vertex result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 32-bit signed integer
    #[default]
    I32,
    /// 64-bit signed integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}

impl ValueKind {
    /// Integer kinds (labels)
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    /// Floating kinds (ranks)
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Vertex-id, size-counter and value widths of one engine instantiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSpec {
    /// Vertex id width
    pub vertex: IdWidth,
    /// Row-offset width
    pub size: IdWidth,
    /// Per-vertex value type
    pub value: ValueKind,
}

impl TypeSpec {
    /// Build a type spec
    #[must_use]
    pub const fn new(vertex: IdWidth, size: IdWidth, value: ValueKind) -> Self {
        Self {
            vertex,
            size,
            value,
        }
    }

    /// Narrowest supported widths for an algorithm (`u32`/`u32` with `i32` or `f32`)
    #[must_use]
    pub const fn for_algorithm(algorithm: AlgorithmKind) -> Self {
        let value = match algorithm {
            AlgorithmKind::TraversalLabel => ValueKind::I32,
            AlgorithmKind::RankPropagation => ValueKind::F32,
        };
        Self::new(IdWidth::U32, IdWidth::U32, value)
    }

    /// Reject combinations the engine cannot run correctly
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedTypes` when the size counter is narrower than the
    /// vertex id, or when the value kind does not match the algorithm.
    pub fn check(&self, algorithm: AlgorithmKind) -> Result<()> {
        if self.size.bits() < self.vertex.bits() {
            return Err(FrontierError::UnsupportedTypes(format!(
                "{self}: size counter narrower than vertex id"
            )));
        }

        let value_ok = match algorithm {
            AlgorithmKind::TraversalLabel => self.value.is_integer(),
            AlgorithmKind::RankPropagation => self.value.is_float(),
        };
        if !value_ok {
            return Err(FrontierError::UnsupportedTypes(format!(
                "{self}: value type not usable for {algorithm}"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vertex={} size={} value={}",
            self.vertex, self.size, self.value
        )
    }
}
