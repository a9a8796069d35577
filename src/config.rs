//! Run configuration
//!
//! [`RunConfig`] carries every option a run needs. It can be built in code,
//! parsed from TOML, and overridden from `TRUENO_FRONTIER_*` environment
//! variables. [`RunConfig::validate`] reports every configuration error
//! before any device work starts.

use crate::enactor::AdvanceStrategy;
use crate::error::{FrontierError, Result};
use crate::partition::PartitionStrategy;
use crate::types::TypeSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Graph primitive to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Hop-count labeling from a source (breadth-first)
    #[default]
    TraversalLabel,
    /// Damped rank propagation over all vertices
    RankPropagation,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TraversalLabel => f.write_str("traversal-label"),
            Self::RankPropagation => f.write_str("rank-propagation"),
        }
    }
}

/// How the traversal source vertex is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSelection {
    /// A given vertex id
    Explicit {
        /// Source vertex
        vertex: u64,
    },
    /// Uniformly random vertex (seeded for reproducibility when `seed` is set)
    Random {
        /// RNG seed, `None` for OS entropy
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Vertex with the largest out-degree (lowest id on ties)
    MaxDegree,
}

impl Default for SourceSelection {
    fn default() -> Self {
        Self::Explicit { vertex: 0 }
    }
}

impl FromStr for SourceSelection {
    type Err = FrontierError;

    /// Parses `<vertex>`, `random`, `random:<seed>` or `max-degree`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || FrontierError::InvalidConfig(format!("unrecognized source selection `{s}`"));
        match s {
            "random" => Ok(Self::Random { seed: None }),
            "max-degree" | "max_degree" => Ok(Self::MaxDegree),
            _ => {
                if let Some(seed) = s.strip_prefix("random:") {
                    let seed = seed.parse().map_err(|_| bad())?;
                    Ok(Self::Random { seed: Some(seed) })
                } else {
                    s.parse()
                        .map(|vertex| Self::Explicit { vertex })
                        .map_err(|_| bad())
                }
            }
        }
    }
}

/// Options of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Primitive to run
    pub algorithm: AlgorithmKind,
    /// Traversal source
    pub source: SourceSelection,
    /// Record a breadth-first predecessor per vertex (traversal only)
    pub track_predecessors: bool,
    /// Suppress duplicate frontier entries with a visited bitmap (traversal only)
    pub suppress_duplicates: bool,
    /// Frontier capacity as a multiple of the edge count
    pub queue_sizing_factor: f64,
    /// Damping factor `d` of rank propagation
    pub damping_factor: f64,
    /// Minimum accumulated rank change that keeps a vertex active
    pub convergence_threshold: f64,
    /// Iteration limit
    pub max_iterations: u32,
    /// Devices to partition the graph over
    pub device_count: usize,
    /// How vertices are assigned to devices
    pub partition: PartitionStrategy,
    /// Advance load-balancing strategy
    pub advance: AdvanceStrategy,
    /// Vertex-id, size-counter and value widths
    pub types: TypeSpec,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmKind::TraversalLabel,
            source: SourceSelection::default(),
            track_predecessors: false,
            suppress_duplicates: false,
            queue_sizing_factor: 1.0,
            damping_factor: 0.85,
            convergence_threshold: 0.001,
            max_iterations: u32::MAX,
            device_count: 1,
            partition: PartitionStrategy::default(),
            advance: AdvanceStrategy::default(),
            types: TypeSpec::for_algorithm(AlgorithmKind::TraversalLabel),
        }
    }
}

impl RunConfig {
    /// Traversal labeling from `source`
    #[must_use]
    pub fn traversal(source: u64) -> Self {
        Self {
            source: SourceSelection::Explicit { vertex: source },
            ..Self::default()
        }
    }

    /// Rank propagation with damping 0.85 and at most 50 iterations
    #[must_use]
    pub fn rank_propagation() -> Self {
        Self {
            algorithm: AlgorithmKind::RankPropagation,
            max_iterations: 50,
            types: TypeSpec::for_algorithm(AlgorithmKind::RankPropagation),
            ..Self::default()
        }
    }

    /// Set the source selection
    #[must_use]
    pub const fn with_source(mut self, source: SourceSelection) -> Self {
        self.source = source;
        self
    }

    /// Enable or disable predecessor tracking
    #[must_use]
    pub const fn with_predecessors(mut self, enabled: bool) -> Self {
        self.track_predecessors = enabled;
        self
    }

    /// Enable or disable duplicate suppression
    #[must_use]
    pub const fn with_duplicate_suppression(mut self, enabled: bool) -> Self {
        self.suppress_duplicates = enabled;
        self
    }

    /// Set the queue sizing factor
    #[must_use]
    pub const fn with_queue_sizing(mut self, factor: f64) -> Self {
        self.queue_sizing_factor = factor;
        self
    }

    /// Set damping factor and convergence threshold
    #[must_use]
    pub const fn with_damping(mut self, damping: f64, threshold: f64) -> Self {
        self.damping_factor = damping;
        self.convergence_threshold = threshold;
        self
    }

    /// Set the iteration limit
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set device count and partition strategy
    #[must_use]
    pub const fn with_devices(mut self, device_count: usize, partition: PartitionStrategy) -> Self {
        self.device_count = device_count;
        self.partition = partition;
        self
    }

    /// Set the advance strategy
    #[must_use]
    pub const fn with_advance(mut self, advance: AdvanceStrategy) -> Self {
        self.advance = advance;
        self
    }

    /// Set the datatype widths
    #[must_use]
    pub const fn with_types(mut self, types: TypeSpec) -> Self {
        self.types = types;
        self
    }

    /// Check every option
    ///
    /// # Errors
    ///
    /// - `IncompatibleOptions` for duplicate suppression combined with
    ///   predecessor tracking
    /// - `InvalidConfig` for out-of-range numeric options
    /// - `UnsupportedTypes` for a type combination the algorithm cannot use
    pub fn validate(&self) -> Result<()> {
        if self.algorithm == AlgorithmKind::TraversalLabel
            && self.suppress_duplicates
            && self.track_predecessors
        {
            return Err(FrontierError::IncompatibleOptions(
                "duplicate suppression cannot be combined with predecessor tracking",
            ));
        }

        if !(self.queue_sizing_factor.is_finite() && self.queue_sizing_factor > 0.0) {
            return Err(FrontierError::InvalidConfig(format!(
                "queue_sizing_factor must be positive and finite, got {}",
                self.queue_sizing_factor
            )));
        }
        if self.max_iterations == 0 {
            return Err(FrontierError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.device_count == 0 {
            return Err(FrontierError::InvalidConfig(
                "device_count must be at least 1".to_string(),
            ));
        }
        if self.algorithm == AlgorithmKind::RankPropagation {
            if !(self.damping_factor > 0.0 && self.damping_factor < 1.0) {
                return Err(FrontierError::InvalidConfig(format!(
                    "damping_factor must be in (0, 1), got {}",
                    self.damping_factor
                )));
            }
            if !(self.convergence_threshold.is_finite() && self.convergence_threshold > 0.0) {
                return Err(FrontierError::InvalidConfig(format!(
                    "convergence_threshold must be positive and finite, got {}",
                    self.convergence_threshold
                )));
            }
        }

        self.types.check(self.algorithm)
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for malformed TOML, otherwise any
    /// [`RunConfig::validate`] error
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| FrontierError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TRUENO_FRONTIER_*` environment overrides
    ///
    /// Recognized: `SOURCE`, `QUEUE_SIZING`, `MAX_ITERATIONS`, `DEVICES`,
    /// `DAMPING`, `THRESHOLD`, `TRACK_PREDECESSORS`, `SUPPRESS_DUPLICATES`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a variable is set but does not parse
    pub fn with_env_overrides(mut self) -> Result<Self> {
        fn env<T: FromStr>(key: &str) -> Result<Option<T>> {
            match std::env::var(key) {
                Ok(value) => value.trim().parse().map(Some).map_err(|_| {
                    FrontierError::InvalidConfig(format!("cannot parse {key}={value}"))
                }),
                Err(_) => Ok(None),
            }
        }

        if let Some(source) = env("TRUENO_FRONTIER_SOURCE")? {
            self.source = source;
        }
        if let Some(factor) = env("TRUENO_FRONTIER_QUEUE_SIZING")? {
            self.queue_sizing_factor = factor;
        }
        if let Some(max) = env("TRUENO_FRONTIER_MAX_ITERATIONS")? {
            self.max_iterations = max;
        }
        if let Some(devices) = env("TRUENO_FRONTIER_DEVICES")? {
            self.device_count = devices;
        }
        if let Some(damping) = env("TRUENO_FRONTIER_DAMPING")? {
            self.damping_factor = damping;
        }
        if let Some(threshold) = env("TRUENO_FRONTIER_THRESHOLD")? {
            self.convergence_threshold = threshold;
        }
        if let Some(track) = env("TRUENO_FRONTIER_TRACK_PREDECESSORS")? {
            self.track_predecessors = track;
        }
        if let Some(suppress) = env("TRUENO_FRONTIER_SUPPRESS_DUPLICATES")? {
            self.suppress_duplicates = suppress;
        }
        Ok(self)
    }
}
