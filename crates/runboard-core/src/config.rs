//! Layout configuration, loadable from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage;

/// Box size reserved for a step node, padding included.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NodeSize {
    pub width: f64,
    pub height: f64,
}

/// Settings for the dependency graph layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Size of a collapsed step (default: 300x50 plus 50 padding)
    pub compact: NodeSize,
    /// Size of an expanded step (default: 300x300 plus 50 padding)
    pub expanded: NodeSize,
    /// Gap between consecutive ranks (default: 50)
    pub rank_sep: f64,
    /// Gap between neighbours within a rank (default: 50)
    pub node_sep: f64,
    /// Barycenter sweeps used for crossing reduction (default: 4)
    pub order_iterations: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            compact: NodeSize {
                width: 350.0,
                height: 100.0,
            },
            expanded: NodeSize {
                width: 350.0,
                height: 350.0,
            },
            rank_sep: 50.0,
            node_sep: 50.0,
            order_iterations: 4,
        }
    }
}

impl LayoutConfig {
    /// Load from a YAML file. A missing file yields the defaults; absent keys keep theirs.
    pub fn load(path: &Path) -> Result<Self> {
        storage::load_yaml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        storage::save_yaml(path, self)
    }

    pub fn node_size(&self, expanded: bool) -> NodeSize {
        if expanded {
            self.expanded
        } else {
            self.compact
        }
    }
}
