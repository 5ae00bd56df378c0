//! Shape statistics for a fluid tree
//!
//! This module provides a snapshot of how large and how deep a tree has
//! grown, and how much reinforcement its roots have absorbed.

/// Statistics describing a fluid tree at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStatistics {
    /// Total number of nodes in the arena
    pub node_count: usize,

    /// Nodes without a parent
    pub root_count: usize,

    /// Nodes without children
    pub leaf_count: usize,

    /// Longest parent chain, in edges
    pub max_depth: usize,

    /// Visits summed over every root
    pub total_root_visits: u64,

    /// Number of recorded parent-child links
    pub link_count: usize,
}

impl TreeStatistics {
    /// Creates statistics for a tree holding only the initial root
    pub fn new() -> Self {
        TreeStatistics {
            node_count: 1,
            root_count: 1,
            leaf_count: 1,
            max_depth: 0,
            total_root_visits: 0,
            link_count: 0,
        }
    }

    /// Average number of children per interior node
    pub fn mean_branching(&self) -> f64 {
        let interior = self.node_count.saturating_sub(self.leaf_count);
        if interior == 0 {
            return 0.0;
        }
        self.link_count as f64 / interior as f64
    }

    /// Returns a summary of the statistics as a string
    pub fn summary(&self) -> String {
        format!(
            "Fluid Tree Statistics:\n\
             - Nodes: {}\n\
             - Roots: {}\n\
             - Leaves: {}\n\
             - Max depth: {}\n\
             - Root visits: {}\n\
             - Mean branching: {:.2}",
            self.node_count,
            self.root_count,
            self.leaf_count,
            self.max_depth,
            self.total_root_visits,
            self.mean_branching()
        )
    }
}

impl Default for TreeStatistics {
    fn default() -> Self {
        Self::new()
    }
}
