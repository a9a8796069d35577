//! Problem: per-run graph data, vertex state and frontiers
//!
//! A [`Problem`] owns everything a run touches on the devices: one
//! [`DataSlice`] per device holding the partition topology, the algorithm's
//! vertex state, the double-buffered frontier and the exchange buffers.
//!
//! Lifecycle: `init` partitions and allocates once; `reset` validates a run
//! configuration, picks the source and seeds the frontiers; the enactor runs
//! it to completion; `extract` copies results back in vertex-id order. A
//! problem can be reset and run again any number of times.

use crate::bitset::AtomicBitset;
use crate::config::{AlgorithmKind, RunConfig, SourceSelection};
use crate::context::{Context, Device, MemoryReservation, OnDevice};
use crate::enactor::Termination;
use crate::error::{FrontierError, Phase, Result};
use crate::frontier::Frontier;
use crate::functor::{Functor, RankPropagation, TraversalLabel};
use crate::partition::{Partition, PartitionPlan, PartitionStrategy, VertexHome};
use crate::storage::GraphTopology;
use crate::types::{Label, Rank, SizeT, VertexId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::Arc;

/// Per-algorithm problem policy
///
/// Describes the vertex state a primitive needs, how it is reset and seeded,
/// and how work crossing a partition boundary is packed and merged.
pub trait Algorithm: Send + Sync {
    /// Vertex id width
    type Vertex: VertexId;
    /// Row-offset width
    type Offset: SizeT;
    /// Per-partition vertex state
    type State: Send + Sync;
    /// Payload sent from a ghost to its owner
    type Message: Copy + Send + Sync;
    /// Edge and filter kernels
    type Functor: Functor<Vertex = Self::Vertex, State = Self::State>;

    /// Primitive tag
    const KIND: AlgorithmKind;

    /// Whether `reset` resolves and seeds a source vertex
    const NEEDS_SOURCE: bool;

    /// Check a run configuration for this primitive
    ///
    /// # Errors
    ///
    /// Any configuration error
    fn validate(&self, config: &RunConfig) -> Result<()>;

    /// Kernels for a run
    fn functor(&self, config: &RunConfig, node_count: usize) -> Self::Functor;

    /// Device bytes of the state for `local_count` local vertices
    fn state_bytes(&self, local_count: usize) -> usize;

    /// Allocate the state of one partition
    fn allocate(&self, partition: &Partition<Self::Vertex, Self::Offset>) -> Self::State;

    /// Reset the state and return the initial frontier (local ids)
    ///
    /// `source` is the local id of the source when this partition owns it.
    fn reset(
        &self,
        state: &Self::State,
        partition: &Partition<Self::Vertex, Self::Offset>,
        node_count: usize,
        source: Option<usize>,
    ) -> Vec<Self::Vertex>;

    /// Whether every vertex may appear at most once per frontier
    fn unique_frontier(&self) -> bool {
        false
    }

    /// Whether a visited bitmap keeps duplicates out of the frontier
    fn suppresses_duplicates(&self) -> bool {
        false
    }

    /// Message for a ghost that received work this iteration
    fn pack(&self, state: &Self::State, local: usize) -> Self::Message;

    /// Apply a message on the owner; `true` if the vertex joins the frontier
    fn merge(
        &self,
        functor: &Self::Functor,
        state: &Self::State,
        local: usize,
        message: Self::Message,
        iteration: u32,
    ) -> bool;

    /// Whether every owned vertex has to be re-filtered after the exchange
    fn needs_refresh(&self, _state: &Self::State, _iteration: u32) -> bool {
        false
    }

    /// Owned vertices with a final value
    fn finalized(&self, state: &Self::State, owned: usize) -> usize;
}

/// Where a problem is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Allocated, not yet reset
    Initialized,
    /// Reset and seeded, ready to enact
    Ready,
    /// Enact finished
    Completed(Termination),
    /// Enact or reset failed; reset required
    Aborted,
}

/// Ghost work addressed to its owner
#[derive(Debug, Clone, Copy)]
pub(crate) struct Outgoing<M> {
    pub(crate) partition: usize,
    pub(crate) local: usize,
    pub(crate) message: M,
}

/// One device's share of a problem
pub(crate) struct DataSlice<A: Algorithm> {
    pub(crate) device: Arc<Device>,
    pub(crate) partition: Partition<A::Vertex, A::Offset>,
    pub(crate) state: A::State,
    pub(crate) frontier: Frontier<A::Vertex>,
    pub(crate) scratch: AtomicBitset,
    pub(crate) outbox: Vec<Outgoing<A::Message>>,
    pub(crate) inbox: Vec<(usize, A::Message)>,
    _resident: Vec<MemoryReservation>,
    frontier_memory: Option<MemoryReservation>,
}

impl<A: Algorithm> OnDevice for DataSlice<A> {
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

/// Borrowed pieces the enactor iterates over
pub(crate) struct RunParts<'a, A: Algorithm> {
    pub(crate) algorithm: &'a A,
    pub(crate) functor: &'a A::Functor,
    pub(crate) slices: &'a mut [DataSlice<A>],
    pub(crate) max_iterations: u32,
}

/// Graph data, vertex state and frontiers of one primitive
pub struct Problem<A: Algorithm> {
    algorithm: A,
    slices: Vec<DataSlice<A>>,
    homes: Vec<VertexHome>,
    node_count: usize,
    edge_count: usize,
    config: Option<RunConfig>,
    functor: Option<A::Functor>,
    lifecycle: Lifecycle,
    source: Option<usize>,
}

impl<A: Algorithm> std::fmt::Debug for Problem<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("homes", &self.homes)
            .field("node_count", &self.node_count)
            .field("edge_count", &self.edge_count)
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<A: Algorithm> Problem<A> {
    /// Partition `topology` contiguously over `device_count` devices and allocate
    ///
    /// # Errors
    ///
    /// See [`Problem::init_partitioned`]
    pub fn init(
        ctx: &Context,
        topology: &GraphTopology<A::Vertex, A::Offset>,
        algorithm: A,
        device_count: usize,
    ) -> Result<Self> {
        Self::init_partitioned(
            ctx,
            topology,
            algorithm,
            device_count,
            PartitionStrategy::Contiguous,
        )
    }

    /// Partition `topology` over `device_count` devices and allocate
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` for zero devices
    /// - `DeviceCountExceeded` if the context has fewer devices
    /// - `OutOfDeviceMemory` if a device budget cannot hold its slice
    pub fn init_partitioned(
        ctx: &Context,
        topology: &GraphTopology<A::Vertex, A::Offset>,
        algorithm: A,
        device_count: usize,
        strategy: PartitionStrategy,
    ) -> Result<Self> {
        if device_count == 0 {
            return Err(FrontierError::InvalidConfig(
                "device_count must be at least 1".to_string(),
            ));
        }
        if device_count > ctx.device_count() {
            return Err(FrontierError::DeviceCountExceeded {
                requested: device_count,
                available: ctx.device_count(),
            });
        }

        let (partitions, homes) = PartitionPlan::new(topology, device_count, strategy)?.into_parts();

        let slices = partitions
            .into_iter()
            .zip(ctx.devices())
            .map(|(partition, device)| {
                let local = partition.local_count();
                let resident = vec![
                    device.reserve("topology", partition.size_bytes())?,
                    device.reserve("vertex state", algorithm.state_bytes(local))?,
                    device.reserve("scratch bitset", AtomicBitset::bytes_for(local))?,
                    device.reserve(
                        "exchange buffers",
                        local * std::mem::size_of::<Outgoing<A::Message>>(),
                    )?,
                ];
                let state = device.install(|| algorithm.allocate(&partition));

                tracing::debug!(
                    device = device.id(),
                    owned = partition.owned_count(),
                    ghosts = partition.ghost_count(),
                    edges = partition.topology().edge_count(),
                    "partition allocated"
                );

                Ok(DataSlice {
                    device: Arc::clone(device),
                    scratch: AtomicBitset::new(local),
                    state,
                    frontier: Frontier::with_capacity(0),
                    outbox: Vec::new(),
                    inbox: Vec::new(),
                    partition,
                    _resident: resident,
                    frontier_memory: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            algorithm,
            slices,
            homes,
            node_count: topology.node_count(),
            edge_count: topology.edge_count(),
            config: None,
            functor: None,
            lifecycle: Lifecycle::Initialized,
            source: None,
        })
    }

    /// Prepare a run
    ///
    /// The whole configuration is checked before anything is modified, so a
    /// configuration error leaves the problem as it was. Device count and
    /// partition strategy are fixed at init; those fields are not consulted.
    ///
    /// # Errors
    ///
    /// - any configuration error (`IncompatibleOptions`, `InvalidConfig`,
    ///   `UnsupportedTypes`, `InvalidSource`)
    /// - `OutOfDeviceMemory` if the frontier queues do not fit
    /// - `Overflowed` (phase `seed`) if the initial frontier exceeds capacity;
    ///   each queue holds `ceil(queue_sizing_factor * max(m, n))` entries, at
    ///   least one, for `m` edges and `n` vertices
    pub fn reset(&mut self, config: &RunConfig) -> Result<()> {
        self.algorithm.validate(config)?;
        let source = if A::NEEDS_SOURCE {
            Some(self.resolve_source(config.source)?)
        } else {
            None
        };

        let capacity = Frontier::<A::Vertex>::capacity_for(
            self.edge_count.max(self.node_count),
            config.queue_sizing_factor,
        );

        self.lifecycle = Lifecycle::Aborted;
        self.functor = None;
        let result = self.seed(capacity, source);
        if result.is_ok() {
            self.functor = Some(self.algorithm.functor(config, self.node_count));
            self.config = Some(config.clone());
            self.source = source;
            self.lifecycle = Lifecycle::Ready;
            tracing::debug!(?source, capacity, "problem reset");
        }
        result
    }

    fn seed(&mut self, capacity: usize, source: Option<usize>) -> Result<()> {
        let bytes = Frontier::<A::Vertex>::bytes_for(capacity);
        for slice in &mut self.slices {
            slice.frontier_memory = None;
        }
        for slice in &mut self.slices {
            slice.frontier_memory = Some(slice.device.reserve("frontier queues", bytes)?);
        }

        let source_home = source.map(|s| self.homes[s]);
        let algorithm = &self.algorithm;
        let node_count = self.node_count;

        crate::context::run_on_devices(&mut self.slices, Phase::Seed, 0, |slice| {
            let local_source = source_home
                .filter(|home| home.partition == slice.partition.index())
                .map(|home| home.local);
            let seeds = algorithm.reset(&slice.state, &slice.partition, node_count, local_source);

            slice.scratch.clear_all();
            slice.outbox.clear();
            slice.inbox.clear();
            slice.frontier = Frontier::with_capacity(capacity);
            slice
                .frontier
                .seed(&seeds)
                .map_err(|err| FrontierError::Overflowed {
                    device: slice.device.id(),
                    phase: Phase::Seed,
                    iteration: 0,
                    required: err.required,
                    capacity: err.capacity,
                })
        })?;
        Ok(())
    }

    fn resolve_source(&self, selection: SourceSelection) -> Result<usize> {
        let n = self.node_count;
        let invalid = |vertex: u64| FrontierError::InvalidSource {
            vertex,
            node_count: n,
        };

        match selection {
            SourceSelection::Explicit { vertex } => usize::try_from(vertex)
                .ok()
                .filter(|v| *v < n)
                .ok_or_else(|| invalid(vertex)),
            SourceSelection::Random { seed } => {
                if n == 0 {
                    return Err(invalid(0));
                }
                let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
                Ok(rng.gen_range(0..n))
            }
            SourceSelection::MaxDegree => self.max_degree_vertex().ok_or_else(|| invalid(0)),
        }
    }

    /// Vertex with the largest out-degree (lowest id on ties)
    #[must_use]
    pub fn max_degree_vertex(&self) -> Option<usize> {
        let degree = |v: usize| {
            let home = self.homes[v];
            self.slices[home.partition]
                .partition
                .topology()
                .out_degree(home.local)
        };
        (0..self.node_count).fold(None, |best, v| match best {
            Some(b) if degree(b) >= degree(v) => Some(b),
            _ => Some(v),
        })
    }

    /// Number of vertices
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of edges
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of devices (partitions)
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.slices.len()
    }

    /// Partition held by device `index`
    #[must_use]
    pub fn partition(&self, index: usize) -> Option<&Partition<A::Vertex, A::Offset>> {
        self.slices.get(index).map(|s| &s.partition)
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Source chosen by the last reset
    #[must_use]
    pub const fn source(&self) -> Option<usize> {
        self.source
    }

    /// Configuration of the last successful reset
    #[must_use]
    pub const fn config(&self) -> Option<&RunConfig> {
        self.config.as_ref()
    }

    /// The primitive
    #[must_use]
    pub const fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Frontier capacity per device, `None` before the first reset
    #[must_use]
    pub fn frontier_capacity(&self) -> Option<usize> {
        self.config
            .as_ref()
            .and(self.slices.first())
            .map(|s| s.frontier.capacity())
    }

    /// Owned vertices with a final value, summed over partitions
    #[must_use]
    pub fn finalized(&self) -> usize {
        self.slices
            .iter()
            .map(|s| self.algorithm.finalized(&s.state, s.partition.owned_count()))
            .sum()
    }

    pub(crate) fn run_parts(&mut self) -> Result<RunParts<'_, A>> {
        let not_ready = FrontierError::NotReady {
            operation: "enact",
            required: "a successful reset",
        };
        if self.lifecycle != Lifecycle::Ready {
            return Err(not_ready);
        }
        match (&self.functor, &self.config) {
            (Some(functor), Some(config)) => Ok(RunParts {
                algorithm: &self.algorithm,
                functor,
                slices: &mut self.slices,
                max_iterations: config.max_iterations,
            }),
            _ => Err(not_ready),
        }
    }

    pub(crate) fn finish(&mut self, outcome: &Result<Termination>) {
        self.lifecycle = match outcome {
            Ok(termination) => Lifecycle::Completed(*termination),
            Err(_) => Lifecycle::Aborted,
        };
    }

    pub(crate) fn ensure_completed(&self, operation: &'static str) -> Result<Termination> {
        match self.lifecycle {
            Lifecycle::Completed(termination) => Ok(termination),
            _ => Err(FrontierError::NotReady {
                operation,
                required: "a completed enact",
            }),
        }
    }

    fn gather<T, F>(&self, out: &mut [T], name: &'static str, read: F)
    where
        T: Send,
        F: Fn(&DataSlice<A>, usize) -> T + Sync,
    {
        out.par_iter_mut()
            .zip(self.homes.par_iter())
            .for_each(|(slot, home)| *slot = read(&self.slices[home.partition], home.local));
        tracing::trace!(name, len = out.len(), "gathered");
    }

    fn check_buffer(&self, name: &'static str, actual: usize) -> Result<()> {
        if actual == self.node_count {
            Ok(())
        } else {
            Err(FrontierError::BufferSize {
                name,
                actual,
                expected: self.node_count,
            })
        }
    }
}

impl<V: VertexId, S: SizeT, L: Label> Problem<TraversalLabel<V, S, L>> {
    /// Copy labels (and optionally predecessors) into caller buffers
    ///
    /// Unreached vertices carry `L::UNVISITED` and `V::INVALID`.
    ///
    /// # Errors
    ///
    /// - `NotReady` before a completed enact
    /// - `BufferSize` if a buffer length differs from the vertex count
    /// - `InvalidConfig` if predecessors are requested but were not tracked
    pub fn extract(&self, labels: &mut [L], predecessors: Option<&mut [V]>) -> Result<()> {
        self.ensure_completed("extract")?;
        self.check_buffer("labels", labels.len())?;
        if let Some(predecessors) = &predecessors {
            self.check_buffer("predecessors", predecessors.len())?;
            if !self.algorithm.options().track_predecessors {
                return Err(FrontierError::InvalidConfig(
                    "predecessors requested but not tracked".to_string(),
                ));
            }
        }

        self.gather(labels, "labels", |slice, local| slice.state.label(local));
        if let Some(predecessors) = predecessors {
            self.gather(predecessors, "predecessors", |slice, local| {
                slice.state.predecessor(local).unwrap_or(V::INVALID)
            });
        }
        Ok(())
    }

    /// Labels in vertex-id order
    ///
    /// # Errors
    ///
    /// `NotReady` before a completed enact
    pub fn labels(&self) -> Result<Vec<L>> {
        let mut labels = vec![L::UNVISITED; self.node_count];
        self.extract(&mut labels, None)?;
        Ok(labels)
    }

    /// Predecessors in vertex-id order, `None` when not tracked
    ///
    /// # Errors
    ///
    /// `NotReady` before a completed enact
    pub fn predecessors(&self) -> Result<Option<Vec<V>>> {
        self.ensure_completed("extract")?;
        if !self.algorithm.options().track_predecessors {
            return Ok(None);
        }
        let mut predecessors = vec![V::INVALID; self.node_count];
        self.gather(&mut predecessors, "predecessors", |slice, local| {
            slice.state.predecessor(local).unwrap_or(V::INVALID)
        });
        Ok(Some(predecessors))
    }
}

impl<V: VertexId, S: SizeT, R: Rank> Problem<RankPropagation<V, S, R>> {
    /// Copy ranks into a caller buffer
    ///
    /// Residual change held back by the convergence threshold never reaches
    /// the receivers, so the device ranks sum to `1 - d/(1-d) * Σ (rank - sent)`.
    /// The extracted ranks are scaled to sum to one.
    ///
    /// # Errors
    ///
    /// - `NotReady` before a completed enact
    /// - `BufferSize` if the buffer length differs from the vertex count
    pub fn extract(&self, ranks: &mut [R]) -> Result<()> {
        self.ensure_completed("extract")?;
        self.check_buffer("ranks", ranks.len())?;
        self.gather(ranks, "ranks", |slice, local| slice.state.rank(local));

        let total: f64 = ranks.par_iter().map(|r| r.as_f64()).sum();
        if total.is_finite() && total > 0.0 {
            let scale = total.recip();
            ranks
                .par_iter_mut()
                .for_each(|r| *r = R::from_f64(r.as_f64() * scale));
            tracing::trace!(total, "ranks normalized");
        }
        Ok(())
    }

    /// Ranks in vertex-id order
    ///
    /// # Errors
    ///
    /// `NotReady` before a completed enact
    pub fn ranks(&self) -> Result<Vec<R>> {
        let mut ranks = vec![R::zero(); self.node_count];
        self.extract(&mut ranks)?;
        Ok(ranks)
    }
}
