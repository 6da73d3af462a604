//! Tests for the step dependency layout.

use std::time::{Duration, Instant};

use runboard_core::layout::Anchor;
use runboard_core::{layout, Direction, LayoutConfig, LayoutGraph, StepFlow, StepNode, StepStatus};

fn step(id: &str, deps: &[&str]) -> StepNode {
    StepNode::new(id, deps.iter().copied())
}

fn run_layout(steps: &[StepNode], direction: Direction) -> LayoutGraph {
    layout(steps, direction, &LayoutConfig::default())
}

fn overlaps(graph: &LayoutGraph) -> bool {
    let nodes: Vec<_> = graph.nodes.values().collect();
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            let apart_x = a.position.x + a.width <= b.position.x || b.position.x + b.width <= a.position.x;
            let apart_y = a.position.y + a.height <= b.position.y || b.position.y + b.height <= a.position.y;
            if !apart_x && !apart_y {
                return true;
            }
        }
    }
    false
}

/// A small training pipeline: prepare -> pretrain -> {eval, finetune} -> final.
fn pipeline() -> Vec<StepNode> {
    vec![
        step("prepare", &[]),
        step("pretrain", &["prepare"]),
        step("intermediate_eval", &["prepare", "pretrain"]),
        step("finetune", &["prepare", "pretrain"]),
        step("final_eval", &["intermediate_eval", "prepare", "finetune"]),
    ]
}

#[test]
fn test_two_steps_left_to_right() {
    let steps = vec![step("s1", &[]), step("s2", &["s1"])];
    let graph = run_layout(&steps, Direction::LeftToRight);

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    let edge = &graph.edges[0];
    assert_eq!((edge.source.as_str(), edge.target.as_str()), ("s1", "s2"));
    assert_eq!(edge.id, "s2_s1");
    assert_eq!(edge.upstream.as_ref().map(|s| s.id.as_str()), Some("s1"));

    let s1 = graph.node("s1").unwrap();
    let s2 = graph.node("s2").unwrap();
    assert!(s1.position.x < s2.position.x);
    assert_eq!(s1.position.y, s2.position.y, "a chain stays on one line");
    assert_eq!(s1.rank, 0);
    assert_eq!(s2.rank, 1);
    assert_eq!(s1.target_anchor, Anchor::Left);
    assert_eq!(s1.source_anchor, Anchor::Right);
}

#[test]
fn test_top_to_bottom_advances_y() {
    let steps = vec![step("s1", &[]), step("s2", &["s1"])];
    let graph = run_layout(&steps, Direction::TopToBottom);
    let s1 = graph.node("s1").unwrap();
    let s2 = graph.node("s2").unwrap();
    assert!(s1.position.y < s2.position.y);
    assert_eq!(s1.position.x, s2.position.x);
    assert_eq!(s2.target_anchor, Anchor::Top);
    assert_eq!(s2.source_anchor, Anchor::Bottom);
}

#[test]
fn test_positions_are_top_left_corners() {
    let config = LayoutConfig::default();
    let graph = layout(&[step("only", &[])], Direction::LeftToRight, &config);
    let node = graph.node("only").unwrap();
    assert_eq!(node.position.x, 0.0);
    assert_eq!(node.position.y, 0.0);
    assert_eq!(node.width, config.compact.width);
    assert_eq!(node.height, config.compact.height);
    assert_eq!(node.center().x, config.compact.width / 2.0);
}

#[test]
fn test_counts_nodes_and_edges() {
    let steps = pipeline();
    let graph = run_layout(&steps, Direction::LeftToRight);
    let expected_edges: usize = steps.iter().map(|s| s.dependency_ids.len()).sum();
    assert_eq!(graph.nodes.len(), steps.len());
    assert_eq!(graph.edges.len(), expected_edges);
    assert!(graph.edges.iter().all(|e| e.is_resolved()));
    assert!(!overlaps(&graph), "nodes must not overlap");
}

#[test]
fn test_dependencies_point_forward_in_rank() {
    let graph = run_layout(&pipeline(), Direction::LeftToRight);
    for edge in &graph.edges {
        let source = graph.node(&edge.source).unwrap();
        let target = graph.node(&edge.target).unwrap();
        assert!(source.rank < target.rank, "{} should precede {}", edge.source, edge.target);
        assert!(source.position.x < target.position.x);
    }
    assert_eq!(graph.node("final_eval").unwrap().rank, 3);
}

#[test]
fn test_layout_is_deterministic() {
    let steps = pipeline();
    let first = run_layout(&steps, Direction::LeftToRight);
    let second = run_layout(&steps, Direction::LeftToRight);
    assert_eq!(first, second);
}

#[test]
fn test_dangling_dependency_keeps_edge_without_upstream() {
    let steps = vec![step("a", &[]), step("b", &["a", "ghost"])];
    let graph = run_layout(&steps, Direction::LeftToRight);
    assert_eq!(graph.nodes.len(), 2, "unknown steps get no node");
    assert_eq!(graph.edges.len(), 2);

    let dangling: Vec<_> = graph.dangling_edges().collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].source, "ghost");
    assert!(dangling[0].upstream.is_none());
}

#[test]
fn test_duplicate_dependencies_collapse_to_one_edge() {
    let steps = vec![step("a", &[]), step("b", &["a", "a"])];
    let graph = run_layout(&steps, Direction::LeftToRight);
    assert_eq!(graph.edges.len(), 1);
}

#[test]
fn test_duplicate_ids_last_write_wins() {
    let steps = vec![
        step("a", &[]),
        step("b", &[]),
        step("a", &["b"]).with_status(StepStatus::Failed),
    ];
    let graph = run_layout(&steps, Direction::LeftToRight);
    assert_eq!(graph.nodes.len(), 2);
    let a = graph.node("a").unwrap();
    assert_eq!(a.step.status, Some(StepStatus::Failed));
    assert_eq!(a.rank, 1);
    assert_eq!(graph.edges.len(), 1);
}

#[test]
fn test_edges_carry_upstream_status() {
    let steps = vec![
        step("a", &[]).with_status(StepStatus::Running),
        step("b", &["a"]).with_status(StepStatus::Incomplete),
    ];
    let graph = run_layout(&steps, Direction::LeftToRight);
    let upstream = graph.edges[0].upstream.as_ref().unwrap();
    assert_eq!(upstream.status, Some(StepStatus::Running));
}

#[test]
fn test_two_step_cycle_terminates() {
    let steps = vec![step("A", &["B"]), step("B", &["A"])];
    let start = Instant::now();
    let graph = run_layout(&steps, Direction::LeftToRight);
    assert!(start.elapsed() < Duration::from_secs(1));

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 2, "both edges are still reported");
    let a = graph.node("A").unwrap();
    let b = graph.node("B").unwrap();
    assert!(a.position.x.is_finite() && a.position.y.is_finite());
    assert!(b.position.x.is_finite() && b.position.y.is_finite());
    assert_ne!(a.rank, b.rank);
    assert!(!overlaps(&graph));
}

#[test]
fn test_self_dependency_and_long_cycle() {
    let steps = vec![
        step("a", &["a", "d"]),
        step("b", &["a"]),
        step("c", &["b"]),
        step("d", &["c"]),
    ];
    let graph = run_layout(&steps, Direction::TopToBottom);
    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.edges.len(), 5);
    assert!(!overlaps(&graph));
}

#[test]
fn test_expanding_grows_node_and_keeps_ranks() {
    let config = LayoutConfig::default();
    let mut flow = StepFlow::new(pipeline(), Direction::LeftToRight, config);
    let before = flow.graph().clone();

    assert!(flow.toggle_expanded("pretrain"));
    let after = flow.graph();

    let old = before.node("pretrain").unwrap();
    let new = after.node("pretrain").unwrap();
    assert!(new.height > old.height);
    assert!(new.width >= old.width);
    assert!(new.step.expanded);

    for (id, node) in &before.nodes {
        assert_eq!(after.node(id).unwrap().rank, node.rank, "rank of {} changed", id);
    }
    assert!(!overlaps(after));

    // Collapsing restores the original layout exactly.
    assert!(flow.toggle_expanded("pretrain"));
    assert_eq!(flow.graph(), &before);
}

#[test]
fn test_toggle_unknown_step() {
    let mut flow = StepFlow::new(pipeline(), Direction::LeftToRight, LayoutConfig::default());
    assert!(!flow.toggle_expanded("missing"));
}

#[test]
fn test_switching_direction_relayouts() {
    let mut flow = StepFlow::new(pipeline(), Direction::LeftToRight, LayoutConfig::default());
    flow.set_direction(Direction::TopToBottom);
    let graph = flow.graph();
    assert_eq!(graph.direction, Direction::TopToBottom);
    let prepare = graph.node("prepare").unwrap();
    let pretrain = graph.node("pretrain").unwrap();
    assert!(prepare.position.y < pretrain.position.y);
}

#[test]
fn test_empty_input() {
    let graph = run_layout(&[], Direction::LeftToRight);
    assert!(graph.nodes.is_empty());
    assert!(graph.edges.is_empty());
    assert_eq!(graph.extent(), (0.0, 0.0));
}
