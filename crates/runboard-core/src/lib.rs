//! runboard-core: the data-shaping half of the runboard dashboard.
//!
//! Everything here is a pure function of already-fetched workspace data,
//! except the [`poll::Poller`], which keeps that data fresh from a tokio task.

pub mod config;
pub mod error;
pub mod layout;
pub mod models;
pub mod poll;
pub mod progress;
pub mod storage;
pub mod table;
pub mod tree;

pub use config::{LayoutConfig, NodeSize};
pub use error::RunboardError;
pub use layout::{layout, Direction, LayoutEdge, LayoutGraph, LayoutNode, StepFlow, StepNode};
pub use models::{ArtifactMap, Run, RunStatus, RunStepInfo, RunSummary, StepInfo, StepStatus};
pub use poll::{Poller, FETCH_INTERVAL};
pub use progress::{ordered_steps, RunProgress};
pub use tree::{build_path_tree, PathTreeNode};
