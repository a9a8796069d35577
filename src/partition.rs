//! Vertex partitioning across devices
//!
//! Every vertex is owned by exactly one partition. A partition holds the
//! out-edges of its owned vertices re-indexed into a local id space: owned
//! vertices take local ids `0..owned`, remote endpoints ("ghosts") take
//! `owned..`. Ghost rows are empty; work reaching a ghost is routed to its
//! owner during the exchange phase.

use crate::error::{FrontierError, Result};
use crate::storage::GraphTopology;
use crate::types::{SizeT, VertexId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How vertices are assigned to partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Consecutive blocks of `ceil(n / k)` vertex ids
    #[default]
    Contiguous,
    /// Vertex `v` goes to partition `v % k`
    Hashed,
}

impl PartitionStrategy {
    /// Owning partition of vertex `v` in a graph of `n` vertices split `k` ways
    #[must_use]
    pub fn owner(self, v: usize, n: usize, k: usize) -> usize {
        match self {
            Self::Contiguous => {
                let block = n.div_ceil(k).max(1);
                (v / block).min(k - 1)
            }
            Self::Hashed => v % k,
        }
    }
}

/// Owning partition and local id of a global vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexHome {
    /// Owning partition
    pub partition: usize,
    /// Local id within the owner
    pub local: usize,
}

/// Where a ghost's work has to be delivered
pub type RemoteRoute = VertexHome;

/// One device's share of the graph
#[derive(Debug, Clone)]
pub struct Partition<V, S> {
    index: usize,
    owned: Vec<V>,
    ghosts: Vec<V>,
    routes: Vec<RemoteRoute>,
    topology: GraphTopology<V, S>,
}

impl<V: VertexId, S: SizeT> Partition<V, S> {
    /// Partition index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Local topology (owned rows carry every out-edge, ghost rows are empty)
    #[must_use]
    pub const fn topology(&self) -> &GraphTopology<V, S> {
        &self.topology
    }

    /// Number of owned vertices
    #[must_use]
    pub fn owned_count(&self) -> usize {
        self.owned.len()
    }

    /// Number of ghost vertices
    #[must_use]
    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    /// Owned plus ghost vertices
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.owned.len() + self.ghosts.len()
    }

    /// Global ids of the owned vertices, indexed by local id
    #[must_use]
    pub fn owned(&self) -> &[V] {
        &self.owned
    }

    /// Global id of a local vertex
    ///
    /// # Panics
    ///
    /// Panics if `local >= local_count()`
    #[must_use]
    pub fn global_id(&self, local: usize) -> V {
        match local.checked_sub(self.owned.len()) {
            Some(ghost) => self.ghosts[ghost],
            None => self.owned[local],
        }
    }

    /// Whether a local id refers to a ghost
    #[must_use]
    pub fn is_ghost(&self, local: usize) -> bool {
        local >= self.owned.len()
    }

    /// Owner route of a ghost, `None` for owned vertices
    #[must_use]
    pub fn route(&self, local: usize) -> Option<RemoteRoute> {
        local
            .checked_sub(self.owned.len())
            .and_then(|ghost| self.routes.get(ghost).copied())
    }

    /// Device bytes for the local topology and id maps
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.topology.size_bytes()
            + self.local_count() * std::mem::size_of::<V>()
            + self.routes.len() * std::mem::size_of::<RemoteRoute>()
    }
}

/// All partitions of a graph plus the global-to-local vertex map
#[derive(Debug, Clone)]
pub struct PartitionPlan<V, S> {
    partitions: Vec<Partition<V, S>>,
    homes: Vec<VertexHome>,
}

impl<V: VertexId, S: SizeT> PartitionPlan<V, S> {
    /// Split `topology` into `parts` partitions
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopology` if a local topology cannot be represented
    /// (never happens for a validated input topology)
    ///
    /// # Panics
    ///
    /// Panics if `parts == 0`
    pub fn new(
        topology: &GraphTopology<V, S>,
        parts: usize,
        strategy: PartitionStrategy,
    ) -> Result<Self> {
        assert!(parts > 0, "at least one partition required");
        let n = topology.node_count();

        let mut owned: Vec<Vec<V>> = vec![Vec::new(); parts];
        let mut homes = Vec::with_capacity(n);
        for v in 0..n {
            let partition = strategy.owner(v, n, parts);
            homes.push(VertexHome {
                partition,
                local: owned[partition].len(),
            });
            owned[partition].push(local_id::<V>(v));
        }

        let partitions = owned
            .into_par_iter()
            .enumerate()
            .map(|(index, owned)| build_partition(topology, &homes, index, owned))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { partitions, homes })
    }

    /// Partitions in index order
    #[must_use]
    pub fn partitions(&self) -> &[Partition<V, S>] {
        &self.partitions
    }

    /// Home of every global vertex, indexed by global id
    #[must_use]
    pub fn homes(&self) -> &[VertexHome] {
        &self.homes
    }

    /// Split into partitions and homes
    #[must_use]
    pub fn into_parts(self) -> (Vec<Partition<V, S>>, Vec<VertexHome>) {
        (self.partitions, self.homes)
    }
}

fn build_partition<V: VertexId, S: SizeT>(
    topology: &GraphTopology<V, S>,
    homes: &[VertexHome],
    index: usize,
    owned: Vec<V>,
) -> Result<Partition<V, S>> {
    let owned_count = owned.len();
    let mut ghost_of: HashMap<usize, usize> = HashMap::new();
    let mut ghosts = Vec::new();
    let mut routes = Vec::new();

    let mut row_offsets = Vec::with_capacity(owned_count + 1);
    let mut col_indices = Vec::new();
    row_offsets.push(0_usize);

    for id in &owned {
        for target in topology.neighbors(id.index()) {
            let home = homes[target.index()];
            let local = if home.partition == index {
                home.local
            } else {
                *ghost_of.entry(target.index()).or_insert_with(|| {
                    ghosts.push(*target);
                    routes.push(home);
                    owned_count + ghosts.len() - 1
                })
            };
            col_indices.push(local_id::<V>(local));
        }
        row_offsets.push(col_indices.len());
    }

    let local_count = owned_count + ghosts.len();
    let edge_total = col_indices.len();
    row_offsets.resize(local_count + 1, edge_total);

    let row_offsets = row_offsets
        .into_iter()
        .map(|o| {
            S::from_count(o).ok_or_else(|| {
                FrontierError::InvalidTopology(format!("partition {index} offset {o} overflows"))
            })
        })
        .collect::<Result<Vec<S>>>()?;

    Ok(Partition {
        index,
        owned,
        ghosts,
        routes,
        topology: GraphTopology::from_parts(local_count, row_offsets, col_indices)?,
    })
}

/// Local id as a vertex id
///
/// Local ids are bounded by the global vertex count, which the topology
/// already validated against `V`.
pub(crate) fn local_id<V: VertexId>(local: usize) -> V {
    V::from_index(local).unwrap_or(V::INVALID)
}
