//! Step dependency graph layout.
//!
//! [`layout`] turns the steps of a run into a freshly positioned node/edge
//! graph. The drawing follows the usual layered scheme: break cycles, rank by
//! longest path, split long edges with virtual vertices, reduce crossings with
//! barycenter sweeps, then assign coordinates rank by rank. Nothing is patched
//! incrementally; any change to the steps or their expansion means a new call.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{LayoutConfig, NodeSize};
use crate::models::{RunStepInfo, StepInfo, StepStatus};

/// Axis along which ranks advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "LR")]
    LeftToRight,
    #[serde(rename = "TB")]
    TopToBottom,
}

impl Direction {
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::LeftToRight)
    }

    /// Side of a node that incoming edges attach to.
    pub fn target_anchor(&self) -> Anchor {
        match self {
            Direction::LeftToRight => Anchor::Left,
            Direction::TopToBottom => Anchor::Top,
        }
    }

    /// Side of a node that outgoing edges leave from.
    pub fn source_anchor(&self) -> Anchor {
        match self {
            Direction::LeftToRight => Anchor::Right,
            Direction::TopToBottom => Anchor::Bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Left,
    Right,
    Top,
    Bottom,
}

/// A step as seen by the graph: identity, upstream ids and expansion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepNode {
    pub id: String,
    #[serde(default)]
    pub dependency_ids: Vec<String>,
    #[serde(default)]
    pub expanded: bool,
    /// Carried along so edges can decorate themselves with upstream status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
}

impl StepNode {
    pub fn new<I, S>(id: impl Into<String>, dependency_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            dependency_ids: dependency_ids.into_iter().map(Into::into).collect(),
            expanded: false,
            status: None,
        }
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn size(&self, config: &LayoutConfig) -> NodeSize {
        config.node_size(self.expanded)
    }
}

impl From<&StepInfo> for StepNode {
    fn from(info: &StepInfo) -> Self {
        StepNode::new(info.id.clone(), info.dependencies.iter().cloned()).with_status(info.status)
    }
}

impl From<&RunStepInfo> for StepNode {
    fn from(step: &RunStepInfo) -> Self {
        StepNode::from(&step.info)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A positioned step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub step: StepNode,
    /// Top-left corner.
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub rank: usize,
    /// Index among the steps of the same rank.
    pub order: usize,
    pub target_anchor: Anchor,
    pub source_anchor: Anchor,
}

impl LayoutNode {
    pub fn center(&self) -> Point {
        Point {
            x: self.position.x + self.width / 2.0,
            y: self.position.y + self.height / 2.0,
        }
    }
}

/// Edge from a dependency to the step that needs it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutEdge {
    /// `"{target}_{source}"`
    pub id: String,
    pub source: String,
    pub target: String,
    /// The upstream step, or `None` when `source` names no known step.
    pub upstream: Option<StepNode>,
}

impl LayoutEdge {
    pub fn is_resolved(&self) -> bool {
        self.upstream.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutGraph {
    pub direction: Direction,
    pub nodes: IndexMap<String, LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl LayoutGraph {
    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.get(id)
    }

    /// Edges whose upstream step is unknown.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &LayoutEdge> {
        self.edges.iter().filter(|e| !e.is_resolved())
    }

    /// Width and height of the bounding box of all nodes.
    pub fn extent(&self) -> (f64, f64) {
        self.nodes.values().fold((0.0, 0.0), |(w, h), n| {
            (w.max(n.position.x + n.width), h.max(n.position.y + n.height))
        })
    }
}

/// Lay out `steps` as a layered graph.
///
/// Duplicate ids keep the position of their first occurrence and the data of
/// their last. Every distinct `(dependency, step)` pair yields one edge, even
/// when the dependency is unknown; such edges are left out of the layout.
/// Cycles are broken by reversing the back edges of a depth-first search that
/// visits steps in input order, so the result is always a valid drawing.
pub fn layout(steps: &[StepNode], direction: Direction, config: &LayoutConfig) -> LayoutGraph {
    let mut lookup: IndexMap<&str, &StepNode> = IndexMap::with_capacity(steps.len());
    for step in steps {
        lookup.insert(step.id.as_str(), step);
    }

    let mut edges = Vec::new();
    let mut links = Vec::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for (target, step) in lookup.values().enumerate() {
        for dep in &step.dependency_ids {
            if !seen.insert((dep.as_str(), step.id.as_str())) {
                continue;
            }
            match lookup.get_index_of(dep.as_str()) {
                Some(source) if source != target => links.push((source, target)),
                _ => {}
            }
            edges.push(LayoutEdge {
                id: format!("{}_{}", step.id, dep),
                source: dep.clone(),
                target: step.id.clone(),
                upstream: lookup.get(dep.as_str()).map(|s| (*s).clone()),
            });
        }
    }

    let dangling = edges.iter().filter(|e| !e.is_resolved()).count();
    if dangling > 0 {
        debug!(dangling, "Some dependencies reference unknown steps");
    }

    let (acyclic, reversed) = break_cycles(lookup.len(), &links);
    if reversed > 0 {
        warn!(reversed, "Reversed edges to break dependency cycles");
    }

    let ranks = assign_ranks(lookup.len(), &acyclic);
    let mut layering = Layering::new(&ranks, &acyclic);
    layering.reduce_crossings(config.order_iterations);

    let sizes: Vec<NodeSize> = lookup.values().map(|s| s.size(config)).collect();
    let centers = layering.place(&sizes, direction, config);
    let orders = layering.step_orders();

    // Shift so the drawing starts at the origin.
    let (min_x, min_y) = sizes
        .iter()
        .zip(&centers)
        .map(|(s, &(x, y))| (x - s.width / 2.0, y - s.height / 2.0))
        .fold((f64::INFINITY, f64::INFINITY), |(ax, ay), (x, y)| {
            (ax.min(x), ay.min(y))
        });

    let nodes: IndexMap<String, LayoutNode> = lookup
        .values()
        .enumerate()
        .map(|(i, step)| {
            let size = sizes[i];
            let (cx, cy) = centers[i];
            let node = LayoutNode {
                step: (*step).clone(),
                position: Point {
                    x: cx - size.width / 2.0 - min_x,
                    y: cy - size.height / 2.0 - min_y,
                },
                width: size.width,
                height: size.height,
                rank: ranks[i],
                order: orders[i],
                target_anchor: direction.target_anchor(),
                source_anchor: direction.source_anchor(),
            };
            (step.id.clone(), node)
        })
        .collect();

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        ranks = layering.layers.len(),
        "Computed step layout"
    );

    LayoutGraph {
        direction,
        nodes,
        edges,
    }
}

/// Interactive graph state: the steps, their expansion flags and the current layout.
///
/// Every mutation recomputes the whole layout.
#[derive(Debug, Clone)]
pub struct StepFlow {
    steps: Vec<StepNode>,
    direction: Direction,
    config: LayoutConfig,
    graph: LayoutGraph,
}

impl StepFlow {
    pub fn new(steps: Vec<StepNode>, direction: Direction, config: LayoutConfig) -> Self {
        let graph = layout(&steps, direction, &config);
        Self {
            steps,
            direction,
            config,
            graph,
        }
    }

    pub fn from_run_steps(steps: &[RunStepInfo], direction: Direction, config: LayoutConfig) -> Self {
        Self::new(steps.iter().map(StepNode::from).collect(), direction, config)
    }

    pub fn graph(&self) -> &LayoutGraph {
        &self.graph
    }

    pub fn steps(&self) -> &[StepNode] {
        &self.steps
    }

    /// Flip the expansion of every step with `id`. Returns false if there is none.
    pub fn toggle_expanded(&mut self, id: &str) -> bool {
        let mut found = false;
        for step in self.steps.iter_mut().filter(|s| s.id == id) {
            step.expanded = !step.expanded;
            found = true;
        }
        if found {
            self.relayout();
        }
        found
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.relayout();
    }

    fn relayout(&mut self) {
        self.graph = layout(&self.steps, self.direction, &self.config);
    }
}

// ─── Layering internals ──────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    New,
    Active,
    Done,
}

/// Reverse DFS back edges. Returns the deduplicated acyclic edge list and the
/// number of edges reversed.
fn break_cycles(n: usize, links: &[(usize, usize)]) -> (Vec<(usize, usize)>, usize) {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, &(u, _)) in links.iter().enumerate() {
        adjacency[u].push(i);
    }

    let mut mark = vec![Mark::New; n];
    let mut reverse = vec![false; links.len()];
    for root in 0..n {
        if mark[root] != Mark::New {
            continue;
        }
        mark[root] = Mark::Active;
        let mut stack = vec![(root, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (node, cursor) = *top;
            match adjacency[node].get(cursor) {
                Some(&edge) => {
                    top.1 += 1;
                    let child = links[edge].1;
                    match mark[child] {
                        Mark::Active => reverse[edge] = true,
                        Mark::New => {
                            mark[child] = Mark::Active;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    mark[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let acyclic = links
        .iter()
        .zip(&reverse)
        .map(|(&(u, v), &rev)| if rev { (v, u) } else { (u, v) })
        .filter(|pair| seen.insert(*pair))
        .collect();
    (acyclic, reverse.iter().filter(|r| **r).count())
}

/// Longest-path ranking over an acyclic edge list, with sources pulled down
/// to sit right before their nearest successor.
fn assign_ranks(n: usize, links: &[(usize, usize)]) -> Vec<usize> {
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    for &(u, v) in links {
        succs[u].push(v);
        preds[v].push(u);
        indegree[v] += 1;
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&v| indegree[v] == 0).collect();
    let mut topo = Vec::with_capacity(n);
    let mut rank = vec![0usize; n];
    while let Some(u) = queue.pop_front() {
        topo.push(u);
        for &v in &succs[u] {
            rank[v] = rank[v].max(rank[u] + 1);
            indegree[v] -= 1;
            if indegree[v] == 0 {
                queue.push_back(v);
            }
        }
    }

    for &u in topo.iter().rev() {
        if preds[u].is_empty() {
            if let Some(nearest) = succs[u].iter().map(|&v| rank[v]).min() {
                rank[u] = nearest - 1;
            }
        }
    }
    rank
}

/// Ranked vertices: steps first (`0..steps`), then virtual vertices that
/// split edges spanning more than one rank.
struct Layering {
    steps: usize,
    layers: Vec<Vec<usize>>,
    up: Vec<Vec<usize>>,
    down: Vec<Vec<usize>>,
}

impl Layering {
    fn new(ranks: &[usize], links: &[(usize, usize)]) -> Self {
        let steps = ranks.len();
        let mut rank = ranks.to_vec();
        let mut up: Vec<Vec<usize>> = vec![Vec::new(); steps];
        let mut down: Vec<Vec<usize>> = vec![Vec::new(); steps];

        for &(u, v) in links {
            let mut prev = u;
            for r in rank[u] + 1..rank[v] {
                let dummy = rank.len();
                rank.push(r);
                up.push(vec![prev]);
                down.push(Vec::new());
                down[prev].push(dummy);
                prev = dummy;
            }
            down[prev].push(v);
            up[v].push(prev);
        }

        let depth = rank.iter().max().map_or(0, |m| m + 1);
        let mut layers = vec![Vec::new(); depth];
        for (v, &r) in rank.iter().enumerate() {
            layers[r].push(v);
        }

        Self {
            steps,
            layers,
            up,
            down,
        }
    }

    fn positions(&self) -> Vec<usize> {
        let mut pos = vec![0; self.up.len()];
        for layer in &self.layers {
            for (i, &v) in layer.iter().enumerate() {
                pos[v] = i;
            }
        }
        pos
    }

    /// Alternate downward and upward barycenter sweeps, keeping the best ordering seen.
    fn reduce_crossings(&mut self, iterations: usize) {
        let mut best = self.layers.clone();
        let mut best_crossings = self.crossings();

        for i in 0..iterations {
            if best_crossings == 0 {
                break;
            }
            if i % 2 == 0 {
                for r in 1..self.layers.len() {
                    self.sort_layer(r, true);
                }
            } else {
                for r in (0..self.layers.len().saturating_sub(1)).rev() {
                    self.sort_layer(r, false);
                }
            }
            let crossings = self.crossings();
            if crossings < best_crossings {
                best = self.layers.clone();
                best_crossings = crossings;
            }
        }

        self.layers = best;
    }

    fn sort_layer(&mut self, r: usize, downward: bool) {
        let pos = self.positions();
        let neighbours = if downward { &self.up } else { &self.down };
        let mut keyed: Vec<(f64, usize, usize)> = self.layers[r]
            .iter()
            .map(|&v| {
                let ns = &neighbours[v];
                let barycenter = if ns.is_empty() {
                    pos[v] as f64
                } else {
                    ns.iter().map(|&n| pos[n] as f64).sum::<f64>() / ns.len() as f64
                };
                (barycenter, pos[v], v)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        self.layers[r] = keyed.into_iter().map(|(_, _, v)| v).collect();
    }

    fn crossings(&self) -> usize {
        let pos = self.positions();
        let pos = &pos;
        self.layers
            .windows(2)
            .map(|pair| {
                let segments: Vec<(usize, usize)> = pair[0]
                    .iter()
                    .flat_map(|&u| self.down[u].iter().map(move |&v| (pos[u], pos[v])))
                    .collect();
                count_crossings(&segments)
            })
            .sum()
    }

    /// Index of each step among the steps of its rank.
    fn step_orders(&self) -> Vec<usize> {
        let mut orders = vec![0; self.steps];
        for layer in &self.layers {
            for (i, &v) in layer.iter().filter(|&&v| v < self.steps).enumerate() {
                orders[v] = i;
            }
        }
        orders
    }

    /// Center of every vertex as `(x, y)`.
    fn place(&self, sizes: &[NodeSize], direction: Direction, config: &LayoutConfig) -> Vec<(f64, f64)> {
        let horizontal = direction.is_horizontal();
        // (along ranks, across ranks); virtual vertices take no room.
        let extent = |v: usize| -> (f64, f64) {
            match sizes.get(v) {
                Some(s) if horizontal => (s.width, s.height),
                Some(s) => (s.height, s.width),
                None => (0.0, 0.0),
            }
        };

        let count = self.up.len();
        let mut main = vec![0.0; count];
        let mut cross = vec![0.0; count];
        let mut cursor = 0.0;

        for layer in &self.layers {
            let depth = layer.iter().map(|&v| extent(v).0).fold(0.0, f64::max);
            for &v in layer {
                main[v] = cursor + depth / 2.0;
            }
            cursor += depth + config.rank_sep;

            let half: Vec<f64> = layer.iter().map(|&v| extent(v).1 / 2.0).collect();
            let stacked = stack_centered(&half, config.node_sep);
            let desired: Vec<f64> = layer
                .iter()
                .zip(&stacked)
                .map(|(&v, &fallback)| {
                    let ups = &self.up[v];
                    if ups.is_empty() {
                        fallback
                    } else {
                        ups.iter().map(|&u| cross[u]).sum::<f64>() / ups.len() as f64
                    }
                })
                .collect();
            for (&v, c) in layer.iter().zip(pack(&desired, &half, config.node_sep)) {
                cross[v] = c;
            }
        }

        main.into_iter()
            .zip(cross)
            .take(self.steps)
            .map(|(m, c)| if horizontal { (m, c) } else { (c, m) })
            .collect()
    }
}

/// Pairs of segments between two adjacent ranks that cross.
fn count_crossings(segments: &[(usize, usize)]) -> usize {
    let mut count = 0;
    for (i, a) in segments.iter().enumerate() {
        for b in &segments[i + 1..] {
            if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                count += 1;
            }
        }
    }
    count
}

/// Centers of boxes with the given half-extents laid side by side, centered on 0.
fn stack_centered(half: &[f64], sep: f64) -> Vec<f64> {
    let mut centers = Vec::with_capacity(half.len());
    let mut cursor = 0.0;
    for (i, h) in half.iter().enumerate() {
        if i > 0 {
            cursor += sep;
        }
        centers.push(cursor + h);
        cursor += 2.0 * h;
    }
    let shift = cursor / 2.0;
    centers.into_iter().map(|c| c - shift).collect()
}

/// Move boxes as close to `desired` as their order and separation allow.
///
/// Averages a left-to-right and a right-to-left packing; both keep every gap
/// at least `sep`, so their mean does too.
fn pack(desired: &[f64], half: &[f64], sep: f64) -> Vec<f64> {
    let n = desired.len();
    let gap = |i: usize| half[i] + sep + half[i + 1];

    let mut left = desired.to_vec();
    for i in 1..n {
        left[i] = left[i].max(left[i - 1] + gap(i - 1));
    }
    let mut right = desired.to_vec();
    for i in (0..n.saturating_sub(1)).rev() {
        right[i] = right[i].min(right[i + 1] - gap(i));
    }

    left.iter().zip(&right).map(|(l, r)| (l + r) / 2.0).collect()
}
