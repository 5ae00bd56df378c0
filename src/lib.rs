//! # fluxzero
//!
//! A reinforcement-style tree search engine. The engine keeps an
//! incrementally grown decision tree whose nodes accumulate a scalar
//! "conductivity" through repeated select-and-update cycles.
//!
//! ## Features
//!
//! - Arena node storage addressed by dense integer ids
//! - Deterministic upper-confidence descent, or stochastic flow sampling
//! - Exponential-moving-average backpropagation from leaf to root
//! - Compact, strictly validated binary persistence
//! - A C ABI over an opaque handle for embedding in other runtimes
//!
//! ## Basic Usage
//!
//! ```
//! use fluxzero::{FluidTree, NodeId};
//!
//! fn main() -> Result<(), fluxzero::FluxError> {
//!     let mut tree = FluidTree::new();
//!
//!     // Expand the root with two options
//!     let left = tree.create_child(NodeId::ROOT)?;
//!     let right = tree.create_child(NodeId::ROOT)?;
//!
//!     for _ in 0..20 {
//!         // Walk to a leaf, evaluate it externally, report the outcome
//!         let leaf = tree.select_leaf(NodeId::ROOT, 1.414);
//!         let reward = if leaf == left { 1.0 } else { 0.0 };
//!         tree.backprop(leaf, reward, 0.1);
//!     }
//!
//!     assert_eq!(tree.get_best_child(NodeId::ROOT), left);
//!     assert!(tree.get_visits(right) > 0);
//!     println!("{}", tree.statistics().summary());
//!     Ok(())
//! }
//! ```
//!
//! ## How It Works
//!
//! 1. **Growth**: callers allocate nodes and link them under a parent. The
//!    mapping from domain states to node ids is the caller's business; see
//!    [`StateIndex`] for a typed helper.
//!
//! 2. **Selection**: starting from any node, the tree descends through
//!    children until it reaches a node without children, choosing at each
//!    step the child with the highest upper-confidence score.
//!
//! 3. **Evaluation**: the caller scores the leaf (a rollout, a lookup).
//!
//! 4. **Backpropagation**: the reward erodes a path from the leaf to the
//!    root: every node gains a visit and has its conductivity pulled
//!    toward the reward.
//!
//! Trees are saved and loaded with [`FluidTree::save`] and
//! [`FluidTree::load`]; a failed load never touches the existing nodes.

pub mod capi;
pub mod codec;
pub mod config;
pub mod index;
pub mod node;
pub mod policy;
pub mod stats;
pub mod traverse;
pub mod tree;

pub use config::FluxConfig;
pub use index::StateIndex;
pub use node::{FluxNode, NodeId};
pub use policy::{BackpropagationPolicy, SelectionPolicy};
pub use stats::TreeStatistics;
pub use traverse::traverse_fuzzy;
pub use tree::FluidTree;

/// Error types for the fluid tree
#[derive(thiserror::Error, Debug)]
pub enum FluxError {
    /// A mutation named a node id that does not exist
    #[error("Invalid node reference: {0}")]
    InvalidReference(i32),

    /// A link was rejected because the child was created under another parent
    #[error("Node {child} does not belong to parent {parent}")]
    ParentMismatch {
        /// Parent named in the link request
        parent: i32,
        /// Child named in the link request
        child: i32,
    },

    /// The arena cannot address more nodes
    #[error("Tree is full at {0} nodes")]
    CapacityExceeded(usize),

    /// Reading or writing a persisted tree failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data is truncated or inconsistent
    #[error("Malformed tree data: {0}")]
    Malformed(String),

    /// Companion metadata could not be read or written
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl FluxError {
    /// True for failures that leave the persisted source unusable
    ///
    /// Malformed data is reported the same way as an I/O failure to callers
    /// that only distinguish "load worked" from "load failed".
    pub fn is_io_failure(&self) -> bool {
        matches!(self, FluxError::Io(_) | FluxError::Malformed(_))
    }
}

/// Result type for fluid tree operations
pub type Result<T> = std::result::Result<T, FluxError>;
