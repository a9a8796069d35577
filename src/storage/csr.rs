//! CSR (Compressed Sparse Row) graph topology
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2
//!
//! CSR:
//!   row_offsets: [0, 2, 3, 3]  // Node 0: edges [0..2), Node 1: [2..3), Node 2: [3..3)
//!   col_indices: [1, 2, 2]      // Edge 0 → node 1, edge 1 → node 2, edge 2 → node 2
//! ```
//!
//! A topology is validated once on ingestion and is read-only afterwards.

use crate::error::{FrontierError, Result};
use crate::types::{SizeT, VertexId};
use std::ops::Range;

/// Immutable directed graph in CSR form
///
/// `V` is the vertex-id width, `S` the size-counter width of the row offsets.
/// Undirected graphs store each edge in both directions.
///
/// # Example
///
/// ```
/// use trueno_frontier::GraphTopology;
///
/// let graph = GraphTopology::<u32, u32>::from_edge_list(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
///
/// assert_eq!(graph.node_count(), 3);
/// assert_eq!(graph.neighbors(0), &[1, 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphTopology<V, S> {
    /// Node i's edges are `col_indices[row_offsets[i]..row_offsets[i + 1]]`
    /// Length: `node_count` + 1
    row_offsets: Vec<S>,

    /// Edge targets
    /// Length: `edge_count`
    col_indices: Vec<V>,
}

impl<V: VertexId, S: SizeT> GraphTopology<V, S> {
    /// Copy caller-provided CSR arrays into a validated topology
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopology` if the arrays violate the CSR invariants
    pub fn from_csr(node_count: usize, row_offsets: &[S], col_indices: &[V]) -> Result<Self> {
        Self::from_parts(node_count, row_offsets.to_vec(), col_indices.to_vec())
    }

    /// Take ownership of CSR arrays and validate them
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopology` if:
    /// - `row_offsets.len() != node_count + 1`
    /// - `row_offsets[0] != 0`, offsets decrease, or the last offset is not the edge count
    /// - a column index is not a vertex of the graph
    /// - the vertex or edge count does not fit the chosen widths
    pub fn from_parts(node_count: usize, row_offsets: Vec<S>, col_indices: Vec<V>) -> Result<Self> {
        let topology = Self {
            row_offsets,
            col_indices,
        };
        topology.validate(node_count)?;
        Ok(topology)
    }

    /// Build a topology from a directed edge list
    ///
    /// Out-edges of each vertex keep their order from the list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopology` if an endpoint is out of range or the counts
    /// do not fit the chosen widths
    pub fn from_edge_list(node_count: usize, edges: &[(V, V)]) -> Result<Self> {
        check_vertex_width::<V>(node_count)?;
        let mut degrees = vec![0_usize; node_count];
        for &(src, dst) in edges {
            for endpoint in [src, dst] {
                if endpoint.index() >= node_count {
                    return Err(FrontierError::InvalidTopology(format!(
                        "edge endpoint {endpoint} out of range for {node_count} vertices"
                    )));
                }
            }
            degrees[src.index()] += 1;
        }

        let mut row_offsets = Vec::with_capacity(node_count + 1);
        let mut offset = 0_usize;
        row_offsets.push(to_size::<S>(0)?);
        for degree in &degrees {
            offset += degree;
            row_offsets.push(to_size::<S>(offset)?);
        }

        // Scatter with a per-row cursor (stable)
        let mut cursor: Vec<usize> = row_offsets.iter().map(|o| o.count()).collect();
        let mut col_indices = vec![V::default(); edges.len()];
        for &(src, dst) in edges {
            let slot = &mut cursor[src.index()];
            col_indices[*slot] = dst;
            *slot += 1;
        }

        Self::from_parts(node_count, row_offsets, col_indices)
    }

    /// Build a symmetric topology, storing every edge in both directions
    ///
    /// # Errors
    ///
    /// Same as [`GraphTopology::from_edge_list`]
    pub fn from_undirected_edges(node_count: usize, edges: &[(V, V)]) -> Result<Self> {
        let both: Vec<(V, V)> = edges
            .iter()
            .flat_map(|&(a, b)| [(a, b), (b, a)])
            .collect();
        Self::from_edge_list(node_count, &both)
    }

    fn validate(&self, node_count: usize) -> Result<()> {
        let invalid = |msg: String| Err(FrontierError::InvalidTopology(msg));

        check_vertex_width::<V>(node_count)?;
        if self.row_offsets.len() != node_count + 1 {
            return invalid(format!(
                "row_offsets has {} entries, expected {}",
                self.row_offsets.len(),
                node_count + 1
            ));
        }
        if S::from_count(self.col_indices.len()).is_none() {
            return invalid(format!(
                "{} edges do not fit {}-bit row offsets",
                self.col_indices.len(),
                S::WIDTH.bits()
            ));
        }
        if self.row_offsets[0].count() != 0 {
            return invalid("row_offsets[0] must be 0".to_string());
        }
        if let Some(i) = self
            .row_offsets
            .windows(2)
            .position(|pair| pair[1] < pair[0])
        {
            return invalid(format!("row_offsets decrease at vertex {i}"));
        }
        let last = self.row_offsets[node_count].count();
        if last != self.col_indices.len() {
            return invalid(format!(
                "row_offsets end at {last} but there are {} column indices",
                self.col_indices.len()
            ));
        }
        if let Some(bad) = self.col_indices.iter().find(|c| c.index() >= node_count) {
            return invalid(format!(
                "column index {bad} out of range for {node_count} vertices"
            ));
        }

        Ok(())
    }
}

impl<V: VertexId, S: SizeT> GraphTopology<V, S> {
    /// Number of vertices
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Number of directed edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.col_indices.len()
    }

    /// Edge positions of vertex `v` in the column array
    ///
    /// # Panics
    ///
    /// Panics if `v >= node_count()`
    #[must_use]
    pub fn row_range(&self, v: usize) -> Range<usize> {
        self.row_offsets[v].count()..self.row_offsets[v + 1].count()
    }

    /// Out-neighbors of vertex `v`
    ///
    /// # Panics
    ///
    /// Panics if `v >= node_count()`
    #[must_use]
    pub fn neighbors(&self, v: usize) -> &[V] {
        &self.col_indices[self.row_range(v)]
    }

    /// Out-degree of vertex `v`
    ///
    /// # Panics
    ///
    /// Panics if `v >= node_count()`
    #[must_use]
    pub fn out_degree(&self, v: usize) -> usize {
        self.row_range(v).len()
    }

    /// Vertex with the largest out-degree (lowest id on ties)
    #[must_use]
    pub fn max_degree_vertex(&self) -> Option<usize> {
        (0..self.node_count()).fold(None, |best, v| match best {
            Some(b) if self.out_degree(b) >= self.out_degree(v) => Some(b),
            _ => Some(v),
        })
    }

    /// Device bytes needed to hold both CSR arrays
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.row_offsets.len() * std::mem::size_of::<S>()
            + self.col_indices.len() * std::mem::size_of::<V>()
    }

    /// Iterate over all `(source, target)` edges in CSR order
    pub fn edges(&self) -> impl Iterator<Item = (usize, V)> + '_ {
        (0..self.node_count()).flat_map(move |v| self.neighbors(v).iter().map(move |&t| (v, t)))
    }

    /// Raw CSR components
    #[must_use]
    pub fn csr_components(&self) -> (&[S], &[V]) {
        (&self.row_offsets, &self.col_indices)
    }
}

fn to_size<S: SizeT>(count: usize) -> Result<S> {
    S::from_count(count).ok_or_else(|| {
        FrontierError::InvalidTopology(format!(
            "offset {count} does not fit {}-bit row offsets",
            S::WIDTH.bits()
        ))
    })
}

/// Every vertex id must fit `V` and differ from `V::INVALID`, the
/// "no predecessor" marker
fn check_vertex_width<V: VertexId>(node_count: usize) -> Result<()> {
    let Some(last) = node_count.checked_sub(1) else {
        return Ok(());
    };
    match V::from_index(last) {
        Some(id) if id != V::INVALID => Ok(()),
        _ => Err(FrontierError::InvalidTopology(format!(
            "{node_count} vertices do not fit {}-bit vertex ids",
            V::WIDTH.bits()
        ))),
    }
}
