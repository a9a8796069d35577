//! Engine error taxonomy
//!
//! Every failure the engine can report is a [`FrontierError`]. Errors fall into
//! the classes of [`ErrorClass`]: configuration problems are caught before any
//! device work, resource problems at `init`/`reset`, frontier overflow at the
//! end of the offending phase, and device faults carry the phase and iteration
//! in which they happened.

use std::fmt;
use thiserror::Error;

/// Engine phase, used as diagnostic context in overflow and fault errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Problem initialization (partitioning, allocation)
    Init,
    /// Seeding of the initial frontier during reset
    Seed,
    /// Edge expansion
    Advance,
    /// Compaction and deduplication
    Filter,
    /// Cross-device exchange, merge and frontier swap
    Exchange,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Seed => "seed",
            Self::Advance => "advance",
            Self::Filter => "filter",
            Self::Exchange => "exchange",
        };
        f.write_str(name)
    }
}

/// Broad class of an error, used to decide how a caller should react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Invalid input or option combination; fix the request
    Configuration,
    /// Not enough devices or device memory
    Resource,
    /// Frontier exceeded its capacity; retry with a larger queue sizing factor
    Overflow,
    /// Accelerator execution or communication failure
    Device,
    /// Operation called in the wrong lifecycle state, or run cancelled
    Lifecycle,
}

/// Errors reported by `Problem`, `Enactor` and the dispatcher
#[derive(Debug, Error)]
pub enum FrontierError {
    /// Source vertex is not a vertex of the graph
    #[error("source vertex {vertex} out of range for graph with {node_count} vertices")]
    InvalidSource {
        /// Requested source
        vertex: u64,
        /// Number of vertices in the graph
        node_count: usize,
    },

    /// Vertex-id / size-counter / value widths that the engine does not support
    #[error("unsupported type combination: {0}")]
    UnsupportedTypes(String),

    /// Options that cannot be enabled together
    #[error("incompatible options: {0}")]
    IncompatibleOptions(&'static str),

    /// Out-of-range or malformed configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// CSR arrays violate the compressed-sparse-row invariants
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Caller-supplied output buffer has the wrong length
    #[error("output buffer `{name}` has length {actual}, expected {expected}")]
    BufferSize {
        /// Buffer name
        name: &'static str,
        /// Supplied length
        actual: usize,
        /// Required length (vertex count)
        expected: usize,
    },

    /// More devices requested than the context provides
    #[error("requested {requested} devices but the context provides {available}")]
    DeviceCountExceeded {
        /// Requested device count
        requested: usize,
        /// Devices available in the context
        available: usize,
    },

    /// Device memory budget too small for the requested arrays
    #[error("device {device} out of memory allocating {what}: need {required} bytes, {available} available")]
    OutOfDeviceMemory {
        /// Device index
        device: usize,
        /// What was being allocated
        what: &'static str,
        /// Bytes requested
        required: usize,
        /// Bytes still available on the device
        available: usize,
    },

    /// A frontier would have exceeded its allocated capacity
    #[error("frontier overflow on device {device} in {phase} at iteration {iteration}: {required} items exceed capacity {capacity}")]
    Overflowed {
        /// Device index
        device: usize,
        /// Phase that produced too many items
        phase: Phase,
        /// Iteration number (0-based)
        iteration: u32,
        /// Items the phase needed to write
        required: usize,
        /// Allocated capacity
        capacity: usize,
    },

    /// Accelerator execution or transport failure
    #[error("device {device} fault in {phase} at iteration {iteration}: {message}")]
    DeviceFault {
        /// Device index
        device: usize,
        /// Phase in which the fault happened
        phase: Phase,
        /// Iteration number (0-based)
        iteration: u32,
        /// Fault description
        message: String,
    },

    /// Run abandoned between phases through a cancel token
    #[error("run cancelled before {phase} at iteration {iteration}")]
    Cancelled {
        /// Phase that was about to start
        phase: Phase,
        /// Iteration number (0-based)
        iteration: u32,
    },

    /// Operation called in the wrong lifecycle state
    #[error("{operation} requires {required}")]
    NotReady {
        /// Operation that was attempted
        operation: &'static str,
        /// What has to happen first
        required: &'static str,
    },
}

impl FrontierError {
    /// Classify the error
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidSource { .. }
            | Self::UnsupportedTypes(_)
            | Self::IncompatibleOptions(_)
            | Self::InvalidConfig(_)
            | Self::InvalidTopology(_)
            | Self::BufferSize { .. } => ErrorClass::Configuration,
            Self::DeviceCountExceeded { .. } | Self::OutOfDeviceMemory { .. } => {
                ErrorClass::Resource
            }
            Self::Overflowed { .. } => ErrorClass::Overflow,
            Self::DeviceFault { .. } => ErrorClass::Device,
            Self::Cancelled { .. } | Self::NotReady { .. } => ErrorClass::Lifecycle,
        }
    }

    /// Whether retrying with different sizing can succeed
    ///
    /// Overflow is resolved by a larger queue sizing factor, memory exhaustion
    /// by a smaller one or fewer tracked fields. Device faults are never retried
    /// by the engine.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Overflowed { .. } | Self::OutOfDeviceMemory { .. }
        )
    }
}

/// Result alias used throughout the engine
pub type Result<T, E = FrontierError> = std::result::Result<T, E>;
