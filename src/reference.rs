//! Sequential reference computations
//!
//! Plain single-threaded breadth-first search and power-iteration `PageRank`
//! over a [`GraphTopology`]. Tests and benchmarks compare the frontier engine
//! against these.

use crate::storage::GraphTopology;
use crate::types::{SizeT, VertexId};
use std::collections::VecDeque;

/// Hop count from `source` to every vertex, `None` for unreachable vertices
///
/// # Panics
///
/// Panics if `source >= topology.node_count()`
///
/// # Example
///
/// ```
/// use trueno_frontier::{reference, GraphTopology};
///
/// let graph = GraphTopology::<u32, u32>::from_edge_list(3, &[(0, 1), (1, 2)]).unwrap();
///
/// assert_eq!(reference::bfs_hops(&graph, 0), vec![Some(0), Some(1), Some(2)]);
/// ```
#[must_use]
pub fn bfs_hops<V: VertexId, S: SizeT>(topology: &GraphTopology<V, S>, source: usize) -> Vec<Option<u32>> {
    let mut hops = vec![None; topology.node_count()];
    let mut queue = VecDeque::new();

    hops[source] = Some(0);
    queue.push_back(source);

    while let Some(current) = queue.pop_front() {
        let next = hops[current].map_or(0, |h| h + 1);
        for neighbor in topology.neighbors(current) {
            let neighbor = neighbor.index();
            if hops[neighbor].is_none() {
                hops[neighbor] = Some(next);
                queue.push_back(neighbor);
            }
        }
    }

    hops
}

/// Power-iteration `PageRank`
///
/// ```text
/// PR(u) = (1-d)/N + d * (Σ PR(v) / outdegree(v) + Σ PR(dangling) / N)
/// ```
///
/// Mass of vertices without out-edges is spread uniformly, so the ranks sum
/// to one. Iterates until the L1 change drops below `tolerance` or
/// `max_iterations` is reached.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pagerank<V: VertexId, S: SizeT>(
    topology: &GraphTopology<V, S>,
    damping: f64,
    max_iterations: usize,
    tolerance: f64,
) -> Vec<f64> {
    let n = topology.node_count();
    if n == 0 {
        return Vec::new();
    }

    let teleport = (1.0 - damping) / n as f64;
    let mut ranks = vec![1.0 / n as f64; n];
    let mut new_ranks = vec![0.0; n];

    for _ in 0..max_iterations {
        let dangling: f64 = (0..n)
            .filter(|&u| topology.out_degree(u) == 0)
            .map(|u| ranks[u])
            .sum();
        new_ranks.fill(teleport + damping * dangling / n as f64);

        for (node, rank) in ranks.iter().enumerate() {
            let degree = topology.out_degree(node);
            if degree == 0 {
                continue;
            }
            let contribution = damping * rank / degree as f64;
            for target in topology.neighbors(node) {
                new_ranks[target.index()] += contribution;
            }
        }

        let diff: f64 = ranks
            .iter()
            .zip(&new_ranks)
            .map(|(old, new)| (new - old).abs())
            .sum();
        std::mem::swap(&mut ranks, &mut new_ranks);

        if diff < tolerance {
            break;
        }
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    type Graph = GraphTopology<u32, u32>;

    #[test]
    fn test_bfs_hops_unreachable() {
        let graph = Graph::from_edge_list(4, &[(0, 1), (1, 2)]).unwrap();
        assert_eq!(bfs_hops(&graph, 0), vec![Some(0), Some(1), Some(2), None]);
        assert_eq!(bfs_hops(&graph, 2), vec![None, None, Some(0), None]);
    }

    #[test]
    fn test_pagerank_simple_chain() {
        let graph = Graph::from_edge_list(3, &[(0, 1), (1, 2)]).unwrap();
        let scores = pagerank(&graph, 0.85, 100, 1e-12);

        let sum: f64 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "Sum = {sum}");
        assert!(scores[2] > scores[1]);
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn test_pagerank_cycle() {
        let graph = Graph::from_edge_list(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();
        let scores = pagerank(&graph, 0.85, 50, 1e-12);
        for score in &scores {
            assert!((*score - 1.0 / 3.0).abs() < 1e-9, "Score = {score}");
        }
    }

    #[test]
    fn test_pagerank_empty() {
        let graph = Graph::from_parts(0, vec![0], vec![]).unwrap();
        assert!(pagerank(&graph, 0.85, 10, 1e-6).is_empty());
    }
}
