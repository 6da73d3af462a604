//! Artifact file tree: turns a flat `path -> size` map into nested directories.
//!
//! `/sqlite/train` and `/sqlite/val` become one `sqlite` root with two leaf
//! children. The tree is a plain trie keyed by path segment, walked top-down
//! only, so nodes own their children and carry no parent links.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::models::ArtifactMap;

/// One segment of an artifact path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTreeNode {
    pub name: String,
    /// The artifact key this node was created or last terminated by.
    pub full_path: String,
    /// Present iff some artifact key ends on this node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub children: IndexMap<String, PathTreeNode>,
}

impl PathTreeNode {
    fn new(name: &str, full_path: &str) -> Self {
        Self {
            name: name.to_string(),
            full_path: full_path.to_string(),
            size: None,
            children: IndexMap::new(),
        }
    }

    /// True when this node stands for an actual artifact.
    pub fn is_leaf(&self) -> bool {
        self.size.is_some()
    }

    /// Sum of every artifact size at or below this node.
    pub fn total_size(&self) -> u64 {
        self.size.unwrap_or(0)
            + self
                .children
                .values()
                .map(PathTreeNode::total_size)
                .sum::<u64>()
    }

    /// Depth-first iterator over artifact nodes, this node included.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }
}

/// Iterator returned by [`PathTreeNode::leaves`].
pub struct Leaves<'a> {
    stack: Vec<&'a PathTreeNode>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a PathTreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            // Reverse so the first child is visited first.
            self.stack.extend(node.children.values().rev());
            if node.is_leaf() {
                return Some(node);
            }
        }
        None
    }
}

fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('/').filter(|s| !s.is_empty())
}

/// Build the artifact forest for `paths`.
///
/// Roots and children keep first-seen order; the builder never sorts.
/// Keys with no segments (`""`, `"///"`) are ignored. When a key ends on a
/// node that also serves as a directory for a longer key, the node keeps its
/// children and takes the key's size; repeated writes keep the last one.
pub fn build_path_tree(paths: &ArtifactMap) -> Vec<PathTreeNode> {
    let mut roots: IndexMap<String, PathTreeNode> = IndexMap::new();

    for (key, &size) in paths {
        let parts: Vec<&str> = segments(key).collect();
        let Some((last, dirs)) = parts.split_last() else {
            continue;
        };

        let mut level = &mut roots;
        for dir in dirs {
            level = &mut level
                .entry(dir.to_string())
                .or_insert_with(|| PathTreeNode::new(dir, key))
                .children;
        }

        let leaf = level
            .entry(last.to_string())
            .or_insert_with(|| PathTreeNode::new(last, key));
        leaf.size = Some(size);
        leaf.full_path = key.clone();
    }

    debug!(artifacts = paths.len(), roots = roots.len(), "Built artifact tree");
    roots.into_values().collect()
}

/// Render a byte count the way the dashboard labels files, e.g. `"16.44 MB"`.
pub fn format_megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / 1_000_000.0;
    let text = format!("{:.2}", mb);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} MB", text)
}
