//! Integration tests for trueno-frontier
//!
//! End-to-end runs through the public API: problem lifecycle, both
//! primitives, multi-device partitioning, dispatch and persistence.

use trueno_frontier::{
    reference, run, Context, ContextConfig, CsrInput, Enactor, EnactorState, ErrorClass,
    FrontierError, GraphTopology, IdSlice, IdWidth, LabelColumn, Lifecycle, OffsetSlice,
    PartitionStrategy, Phase, Problem, RankPropagation, RunConfig, SourceSelection, Termination,
    TraversalLabel, TraversalOptions, TypeSpec, ValueKind, VertexResults,
};

type Bfs = TraversalLabel<u32, u32, i32>;
type PageRank = RankPropagation<u32, u32, f64>;

/// Five-vertex cycle with a chord
///
/// ```text
///   0 → 1 → 2 → 3 → 4
///   ↑   └───↗       │
///   └───────────────┘
/// ```
fn cycle_with_chord() -> GraphTopology<u32, u32> {
    GraphTopology::from_edge_list(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (0, 2)]).unwrap()
}

/// Star: vertex 0 points at every other vertex
fn star(leaves: u32) -> GraphTopology<u32, u32> {
    let edges: Vec<(u32, u32)> = (1..=leaves).map(|v| (0, v)).collect();
    GraphTopology::from_edge_list(leaves as usize + 1, &edges).unwrap()
}

fn expected_labels(graph: &GraphTopology<u32, u32>, source: usize) -> Vec<i32> {
    reference::bfs_hops(graph, source)
        .into_iter()
        .map(|h| h.map_or(-1, |d| i32::try_from(d).unwrap()))
        .collect()
}

fn context(devices: usize) -> Context {
    Context::new(&ContextConfig::with_devices(devices)).unwrap()
}

// ============================================================================
// Traversal labeling
// ============================================================================

#[test]
fn test_traversal_matches_reference_bfs() {
    let ctx = context(1);
    let graph = cycle_with_chord();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();
    problem.reset(&RunConfig::traversal(0)).unwrap();

    let mut enactor = Enactor::default();
    assert_eq!(enactor.enact(&mut problem).unwrap(), Termination::Converged);

    let labels = problem.labels().unwrap();
    assert_eq!(labels, vec![0, 1, 1, 2, 3]);
    assert_eq!(labels, expected_labels(&graph, 0));

    let report = enactor.report(&problem).unwrap();
    assert_eq!(report.vertices_finalized, 5);
    assert_eq!(report.search_depth, 4);
    assert!(report.redundant_work_percent >= 0.0);
}

#[test]
fn test_traversal_predecessors_are_bfs_parents() {
    let ctx = context(1);
    let graph = cycle_with_chord();
    let algorithm = Bfs::new(TraversalOptions {
        track_predecessors: true,
        suppress_duplicates: false,
    })
    .unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();
    problem
        .reset(&RunConfig::traversal(0).with_predecessors(true))
        .unwrap();
    Enactor::default().enact(&mut problem).unwrap();

    let labels = problem.labels().unwrap();
    let predecessors = problem.predecessors().unwrap().unwrap();
    assert_eq!(predecessors[0], u32::MAX);
    for v in 1..5 {
        let p = predecessors[v] as usize;
        assert!(graph.neighbors(p).contains(&u32::try_from(v).unwrap()));
        assert_eq!(labels[p] + 1, labels[v], "vertex {v}");
    }
}

#[test]
fn test_traversal_with_duplicate_suppression() {
    let ctx = context(1);
    let graph = GraphTopology::<u32, u32>::from_edge_list(
        6,
        &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (1, 4)],
    )
    .unwrap();
    let algorithm = Bfs::new(TraversalOptions {
        track_predecessors: false,
        suppress_duplicates: true,
    })
    .unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();
    problem
        .reset(&RunConfig::traversal(0).with_duplicate_suppression(true))
        .unwrap();
    Enactor::default().enact(&mut problem).unwrap();

    assert_eq!(problem.labels().unwrap(), expected_labels(&graph, 0));
}

#[test]
fn test_incompatible_options_rejected_everywhere() {
    let config = RunConfig::traversal(0)
        .with_predecessors(true)
        .with_duplicate_suppression(true);

    // Configuration check
    for _ in 0..3 {
        let err = config.validate().unwrap_err();
        assert!(matches!(err, FrontierError::IncompatibleOptions(_)));
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    // Primitive construction
    let options = TraversalOptions::from_config(&config);
    assert!(matches!(
        Bfs::new(options),
        Err(FrontierError::IncompatibleOptions(_))
    ));

    // Reset leaves the problem untouched
    let ctx = context(1);
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &cycle_with_chord(), algorithm, 1).unwrap();
    assert!(matches!(
        problem.reset(&config),
        Err(FrontierError::IncompatibleOptions(_))
    ));
    assert_eq!(problem.lifecycle(), Lifecycle::Initialized);

    // Dispatch
    let offsets = [0_u32, 1, 1];
    let targets = [1_u32];
    let input = CsrInput {
        node_count: 2,
        row_offsets: OffsetSlice::U32(&offsets),
        col_indices: IdSlice::U32(&targets),
    };
    assert!(matches!(
        run(&ctx, &input, &config),
        Err(FrontierError::IncompatibleOptions(_))
    ));
}

#[test]
fn test_invalid_source_rejected() {
    let ctx = context(1);
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &cycle_with_chord(), algorithm, 1).unwrap();

    let err = problem.reset(&RunConfig::traversal(5)).unwrap_err();
    assert!(matches!(
        err,
        FrontierError::InvalidSource {
            vertex: 5,
            node_count: 5
        }
    ));
}

#[test]
fn test_reset_and_rerun_from_other_source() {
    let ctx = context(1);
    let graph = cycle_with_chord();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();
    let mut enactor = Enactor::default();

    for source in [0_u64, 3, 0, 4] {
        problem.reset(&RunConfig::traversal(source)).unwrap();
        enactor.enact(&mut problem).unwrap();
        assert_eq!(
            problem.labels().unwrap(),
            expected_labels(&graph, source as usize),
            "source {source}"
        );
    }
}

#[test]
fn test_max_degree_source() {
    let ctx = context(1);
    let graph = GraphTopology::<u32, u32>::from_edge_list(
        4,
        &[(0, 1), (2, 0), (2, 1), (2, 3), (3, 2)],
    )
    .unwrap();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();
    problem
        .reset(&RunConfig::traversal(0).with_source(SourceSelection::MaxDegree))
        .unwrap();
    assert_eq!(problem.source(), Some(2));

    Enactor::default().enact(&mut problem).unwrap();
    assert_eq!(problem.labels().unwrap(), vec![1, 1, 0, 1]);
}

// ============================================================================
// Rank propagation
// ============================================================================

#[test]
fn test_rank_on_complete_triangle() {
    let ctx = context(1);
    let graph =
        GraphTopology::<u32, u32>::from_undirected_edges(3, &[(0, 1), (1, 2), (0, 2)]).unwrap();
    let mut problem = Problem::init(&ctx, &graph, PageRank::new(), 1).unwrap();
    problem
        .reset(
            &RunConfig::rank_propagation()
                .with_damping(0.85, 0.01)
                .with_max_iterations(20),
        )
        .unwrap();

    let mut enactor = Enactor::default();
    assert_eq!(enactor.enact(&mut problem).unwrap(), Termination::Converged);

    let ranks = problem.ranks().unwrap();
    for rank in &ranks {
        assert!((rank - 1.0 / 3.0).abs() < 0.01, "rank {rank}");
    }
    assert!((ranks.iter().sum::<f64>() - 1.0).abs() < 1e-6);
}

/// Center 0 linked both ways to every leaf
fn bidirectional_star(n: u32) -> GraphTopology<u32, u32> {
    let spokes: Vec<(u32, u32)> = (1..n).map(|leaf| (0, leaf)).collect();
    GraphTopology::from_undirected_edges(n as usize, &spokes).unwrap()
}

fn ring_with_chords() -> GraphTopology<u32, u32> {
    let edges: Vec<(u32, u32)> = (0..20)
        .map(|v| (v, (v + 1) % 20))
        .chain([(0, 10), (5, 10)])
        .collect();
    GraphTopology::from_edge_list(20, &edges).unwrap()
}

fn ranks_at(graph: &GraphTopology<u32, u32>, threshold: f64, max_iterations: u32) -> Vec<f64> {
    let ctx = context(1);
    let mut problem = Problem::init(&ctx, graph, PageRank::new(), 1).unwrap();
    problem
        .reset(
            &RunConfig::rank_propagation()
                .with_damping(0.85, threshold)
                .with_max_iterations(max_iterations),
        )
        .unwrap();
    Enactor::default().enact(&mut problem).unwrap();
    problem.ranks().unwrap()
}

#[test]
fn test_rank_sums_to_one_at_coarse_threshold() {
    let star = ranks_at(&bidirectional_star(50), 0.01, 50);
    let sum: f64 = star.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6, "star sum {sum}");
    assert!(star[0] > star[1]);
    assert!(star[1..].iter().all(|r| (r - star[1]).abs() < 1e-12));

    for max_iterations in [1, 2, 3, 20] {
        let ranks = ranks_at(&ring_with_chords(), 0.01, max_iterations);
        let sum: f64 = ranks.iter().sum();
        assert!(
            (sum - 1.0).abs() < 1e-6,
            "ring sum {sum} after {max_iterations} iterations"
        );
        assert!(ranks.iter().all(|&r| r > 0.0));
    }
}

#[test]
fn test_rank_coarse_threshold_stays_near_reference() {
    let graph = ring_with_chords();
    let ranks = ranks_at(&graph, 1e-4, 200);
    let expected = reference::pagerank(&graph, 0.85, 1000, 1e-13);
    for (got, want) in ranks.iter().zip(&expected) {
        assert!((got - want).abs() < 0.01, "{got} vs {want}");
    }
}

#[test]
fn test_rank_close_to_power_iteration() {
    let ctx = context(1);
    // Vertex 3 is dangling
    let graph = GraphTopology::<u32, u32>::from_edge_list(
        4,
        &[(0, 1), (0, 2), (1, 2), (2, 0), (2, 3)],
    )
    .unwrap();
    let mut problem = Problem::init(&ctx, &graph, PageRank::new(), 1).unwrap();
    problem
        .reset(
            &RunConfig::rank_propagation()
                .with_damping(0.85, 1e-9)
                .with_max_iterations(1000),
        )
        .unwrap();
    Enactor::default().enact(&mut problem).unwrap();

    let ranks = problem.ranks().unwrap();
    let expected = reference::pagerank(&graph, 0.85, 1000, 1e-12);
    for (v, (got, want)) in ranks.iter().zip(&expected).enumerate() {
        assert!((got - want).abs() < 1e-6, "vertex {v}: {got} vs {want}");
    }
}

#[test]
fn test_rank_iteration_limit() {
    let ctx = context(1);
    // Ring plus two chords into vertex 10, so ranks are not uniform
    let edges: Vec<(u32, u32)> = (0..20)
        .map(|v| (v, (v + 1) % 20))
        .chain([(0, 10), (5, 10)])
        .collect();
    let graph = GraphTopology::<u32, u32>::from_edge_list(20, &edges).unwrap();
    let mut problem = Problem::init(&ctx, &graph, PageRank::new(), 1).unwrap();
    problem
        .reset(
            &RunConfig::rank_propagation()
                .with_damping(0.85, 1e-12)
                .with_max_iterations(1),
        )
        .unwrap();

    let mut enactor = Enactor::default();
    let termination = enactor.enact(&mut problem).unwrap();
    assert_eq!(termination, Termination::MaxIterationsReached);
    assert_eq!(enactor.state(), EnactorState::MaxIterationsReached);
    assert_eq!(problem.ranks().unwrap().len(), 20);
}

// ============================================================================
// Lifecycle and errors
// ============================================================================

#[test]
fn test_extract_before_enact() {
    let ctx = context(1);
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &cycle_with_chord(), algorithm, 1).unwrap();
    assert!(matches!(
        problem.labels(),
        Err(FrontierError::NotReady { .. })
    ));

    problem.reset(&RunConfig::traversal(0)).unwrap();
    assert_eq!(problem.lifecycle(), Lifecycle::Ready);
    let err = problem.labels().unwrap_err();
    assert_eq!(err.class(), ErrorClass::Lifecycle);
}

#[test]
fn test_extract_buffer_length_checked() {
    let ctx = context(1);
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &cycle_with_chord(), algorithm, 1).unwrap();
    problem.reset(&RunConfig::traversal(0)).unwrap();
    Enactor::default().enact(&mut problem).unwrap();

    let mut short = vec![0_i32; 4];
    assert!(matches!(
        problem.extract(&mut short, None),
        Err(FrontierError::BufferSize {
            name: "labels",
            actual: 4,
            expected: 5
        })
    ));
}

#[test]
fn test_queue_capacity_scales_larger_of_edges_and_vertices() {
    let ctx = context(1);
    let config = RunConfig::traversal(0).with_queue_sizing(0.25);

    // 10 isolated vertices: ceil(0.25 * 10)
    let sparse = GraphTopology::<u32, u32>::from_edge_list(10, &[]).unwrap();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &sparse, algorithm, 1).unwrap();
    problem.reset(&config).unwrap();
    assert_eq!(problem.frontier_capacity(), Some(3));

    // Complete digraph on 4 vertices, 12 edges: ceil(0.25 * 12)
    let edges: Vec<(u32, u32)> = (0..4)
        .flat_map(|a| (0..4).filter(move |&b| b != a).map(move |b| (a, b)))
        .collect();
    let dense = GraphTopology::<u32, u32>::from_edge_list(4, &edges).unwrap();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &dense, algorithm, 1).unwrap();
    problem.reset(&config).unwrap();
    assert_eq!(problem.frontier_capacity(), Some(3));

    problem
        .reset(&RunConfig::traversal(0).with_queue_sizing(0.1))
        .unwrap();
    assert_eq!(problem.frontier_capacity(), Some(2));
}

#[test]
fn test_overflow_then_retry_with_larger_queue() {
    let ctx = context(1);
    let graph = star(100);
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();
    problem
        .reset(&RunConfig::traversal(0).with_queue_sizing(0.01))
        .unwrap();
    assert_eq!(problem.frontier_capacity(), Some(2));

    let mut enactor = Enactor::default();
    let err = enactor.enact(&mut problem).unwrap_err();
    match err {
        FrontierError::Overflowed {
            phase,
            iteration,
            capacity,
            required,
            ..
        } => {
            assert_eq!(phase, Phase::Advance);
            assert_eq!(iteration, 0);
            assert_eq!(capacity, 2);
            assert!(required > capacity);
        }
        other => panic!("expected overflow, got {other:?}"),
    }
    assert_eq!(enactor.state(), EnactorState::Overflowed);
    assert_eq!(problem.lifecycle(), Lifecycle::Aborted);

    problem
        .reset(&RunConfig::traversal(0).with_queue_sizing(1.0))
        .unwrap();
    assert_eq!(enactor.enact(&mut problem).unwrap(), Termination::Converged);
    let labels = problem.labels().unwrap();
    assert_eq!(labels[0], 0);
    assert!(labels[1..].iter().all(|&l| l == 1));
}

#[test]
fn test_device_memory_exhausted() {
    let ctx = Context::new(&ContextConfig::default().with_memory_budget(64)).unwrap();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let err = Problem::init(&ctx, &star(100), algorithm, 1).unwrap_err();
    assert!(matches!(err, FrontierError::OutOfDeviceMemory { .. }));
    assert_eq!(err.class(), ErrorClass::Resource);
    assert!(err.is_retryable());
}

#[test]
fn test_frontier_queues_exceed_budget_then_recover() {
    let ctx = Context::new(&ContextConfig::default().with_memory_budget(4096)).unwrap();
    let edges: Vec<(u32, u32)> = (1..10).map(|v| (v - 1, v)).collect();
    let graph = GraphTopology::<u32, u32>::from_edge_list(10, &edges).unwrap();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();

    let err = problem
        .reset(&RunConfig::traversal(0).with_queue_sizing(1e6))
        .unwrap_err();
    assert!(matches!(
        err,
        FrontierError::OutOfDeviceMemory {
            what: "frontier queues",
            ..
        }
    ));
    assert_eq!(problem.lifecycle(), Lifecycle::Aborted);

    problem.reset(&RunConfig::traversal(0)).unwrap();
    Enactor::default().enact(&mut problem).unwrap();
    assert_eq!(problem.labels().unwrap(), (0..10).collect::<Vec<i32>>());
}

#[test]
fn test_device_count_exceeded() {
    let ctx = context(2);
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let err = Problem::init(&ctx, &cycle_with_chord(), algorithm, 3).unwrap_err();
    assert!(matches!(
        err,
        FrontierError::DeviceCountExceeded {
            requested: 3,
            available: 2
        }
    ));
}

#[test]
fn test_cancelled_run_can_be_reset() {
    let ctx = context(1);
    let graph = cycle_with_chord();
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &graph, algorithm, 1).unwrap();
    problem.reset(&RunConfig::traversal(0)).unwrap();

    let mut cancelled = Enactor::default();
    cancelled.cancel_token().cancel();
    assert!(matches!(
        cancelled.enact(&mut problem),
        Err(FrontierError::Cancelled { .. })
    ));
    assert_eq!(problem.lifecycle(), Lifecycle::Aborted);

    problem.reset(&RunConfig::traversal(0)).unwrap();
    let mut enactor = Enactor::default();
    enactor.enact(&mut problem).unwrap();
    assert_eq!(problem.labels().unwrap(), expected_labels(&graph, 0));
}

// ============================================================================
// Multiple devices
// ============================================================================

#[test]
fn test_multi_device_traversal_matches_single_device() {
    let edges: Vec<(u32, u32)> = (0..60_u32)
        .flat_map(|v| [(v, (v * 5 + 1) % 60), (v, (v + 17) % 60)])
        .collect();
    let graph = GraphTopology::<u32, u32>::from_edge_list(60, &edges).unwrap();
    let expected = expected_labels(&graph, 7);
    let ctx = context(4);

    for strategy in [PartitionStrategy::Contiguous, PartitionStrategy::Hashed] {
        for devices in 1..=4 {
            let algorithm = Bfs::new(TraversalOptions {
                track_predecessors: true,
                suppress_duplicates: false,
            })
            .unwrap();
            let mut problem =
                Problem::init_partitioned(&ctx, &graph, algorithm, devices, strategy).unwrap();
            problem
                .reset(&RunConfig::traversal(7).with_predecessors(true))
                .unwrap();
            let mut enactor = Enactor::default();
            enactor.enact(&mut problem).unwrap();

            let labels = problem.labels().unwrap();
            assert_eq!(labels, expected, "{strategy:?} on {devices} devices");

            let predecessors = problem.predecessors().unwrap().unwrap();
            for (v, &p) in predecessors.iter().enumerate() {
                if labels[v] > 0 {
                    assert_eq!(labels[p as usize] + 1, labels[v]);
                }
            }

            let report = enactor.report(&problem).unwrap();
            if devices == 1 {
                assert_eq!(report.remote_messages, 0);
            }
        }
    }
}

#[test]
fn test_multi_device_rank_matches_single_device() {
    let edges: Vec<(u32, u32)> = (0..40_u32)
        .flat_map(|v| [(v, (v * 3 + 1) % 40), (v, (v + 11) % 40)])
        .chain([(5, 6), (6, 5)])
        .collect();
    let graph = GraphTopology::<u32, u32>::from_edge_list(40, &edges).unwrap();
    let ctx = context(3);
    let config = RunConfig::rank_propagation()
        .with_damping(0.85, 1e-10)
        .with_max_iterations(500);

    let mut single = Problem::init(&ctx, &graph, PageRank::new(), 1).unwrap();
    single.reset(&config).unwrap();
    Enactor::default().enact(&mut single).unwrap();
    let baseline = single.ranks().unwrap();

    let mut multi =
        Problem::init_partitioned(&ctx, &graph, PageRank::new(), 3, PartitionStrategy::Hashed)
            .unwrap();
    multi.reset(&config).unwrap();
    Enactor::default().enact(&mut multi).unwrap();

    for (a, b) in baseline.iter().zip(multi.ranks().unwrap()) {
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_dispatch_wide_ids() {
    let ctx = context(2);
    let offsets: Vec<u64> = vec![0, 2, 3, 4, 5, 6];
    let targets: Vec<u64> = vec![1, 2, 2, 3, 4, 0];
    let input = CsrInput {
        node_count: 5,
        row_offsets: OffsetSlice::U64(&offsets),
        col_indices: IdSlice::U64(&targets),
    };
    let config = RunConfig::traversal(0)
        .with_devices(2, PartitionStrategy::Hashed)
        .with_types(TypeSpec::new(IdWidth::U64, IdWidth::U64, ValueKind::I64));

    let output = run(&ctx, &input, &config).unwrap();
    assert_eq!(output.termination, Termination::Converged);
    assert_eq!(output.source, Some(0));
    match output.results {
        VertexResults::Labels {
            labels: LabelColumn::I64(labels),
            predecessors: None,
        } => assert_eq!(labels, vec![0, 1, 1, 2, 3]),
        other => panic!("unexpected results {other:?}"),
    }
}

#[test]
fn test_dispatch_rejects_mismatched_widths() {
    let ctx = context(1);
    let offsets = [0_u32, 1, 1];
    let targets = [1_u32];
    let input = CsrInput {
        node_count: 2,
        row_offsets: OffsetSlice::U32(&offsets),
        col_indices: IdSlice::U32(&targets),
    };
    let config = RunConfig::traversal(0).with_types(TypeSpec::new(
        IdWidth::U64,
        IdWidth::U64,
        ValueKind::I32,
    ));
    assert!(matches!(
        run(&ctx, &input, &config),
        Err(FrontierError::UnsupportedTypes(_))
    ));
}

#[test]
fn test_dispatch_rank_f32() {
    let ctx = context(1);
    let offsets = [0_u32, 2, 4, 6];
    let targets = [1_u32, 2, 0, 2, 0, 1];
    let input = CsrInput {
        node_count: 3,
        row_offsets: OffsetSlice::U32(&offsets),
        col_indices: IdSlice::U32(&targets),
    };
    let config = RunConfig::rank_propagation().with_damping(0.85, 0.01);

    let output = run(&ctx, &input, &config).unwrap();
    match output.results {
        VertexResults::Ranks(ranks) => {
            assert_eq!(ranks.len(), 3);
            for rank in ranks.to_f64() {
                assert!((rank - 1.0 / 3.0).abs() < 0.01);
            }
        }
        other @ VertexResults::Labels { .. } => panic!("unexpected results {other:?}"),
    }
    assert_eq!(output.report.vertices_finalized, 3);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_parquet_graph_then_run() {
    use tempfile::tempdir;
    use trueno_frontier::{read_results_parquet, write_results_parquet};

    let dir = tempdir().unwrap();
    let graph_path = dir.path().join("graph.parquet");
    let results_path = dir.path().join("labels.parquet");

    cycle_with_chord().write_parquet(&graph_path).await.unwrap();
    let loaded = GraphTopology::<u32, u32>::read_parquet(&graph_path)
        .await
        .unwrap();
    assert_eq!(loaded, cycle_with_chord());

    let ctx = context(1);
    let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
    let mut problem = Problem::init(&ctx, &loaded, algorithm, 1).unwrap();
    problem.reset(&RunConfig::traversal(0)).unwrap();
    Enactor::default().enact(&mut problem).unwrap();

    let results = VertexResults::Labels {
        labels: LabelColumn::I32(problem.labels().unwrap()),
        predecessors: None,
    };
    write_results_parquet(&results_path, &results).await.unwrap();
    assert_eq!(read_results_parquet(&results_path).await.unwrap(), results);
}
