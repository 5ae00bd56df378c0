//! Node records stored in the fluid tree arena
//!
//! Nodes are addressed by dense [`NodeId`]s handed out by the owning
//! [`FluidTree`](crate::tree::FluidTree). A node never holds references to
//! other nodes, only their ids.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index into the node arena
///
/// Ids are signed so they can cross the C boundary unchanged; `-1` is the
/// "no node" sentinel used for root parents and failed lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i32);

impl NodeId {
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(-1);

    /// The node every tree is created with
    pub const ROOT: NodeId = NodeId(0);

    /// Returns true if this is the sentinel
    pub fn is_none(self) -> bool {
        self.0 < 0
    }

    /// Returns true if this is not the sentinel
    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    /// Arena slot for this id, if it is non-negative
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// Builds an id from an arena slot
    pub(crate) fn from_index(index: usize) -> NodeId {
        NodeId(index as i32)
    }
}

impl From<i32> for NodeId {
    fn from(raw: i32) -> Self {
        NodeId(raw)
    }
}

impl From<NodeId> for i32 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "#none")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// A single node of the fluid tree
///
/// `value` is the node's conductivity: an exponential moving average of the
/// rewards reported through it. Statistics only change through a
/// [`BackpropagationPolicy`](crate::policy::BackpropagationPolicy).
#[derive(Debug, Clone, PartialEq)]
pub struct FluxNode {
    id: NodeId,
    parent: NodeId,
    children: Vec<NodeId>,
    visits: u32,
    value: f64,
}

impl FluxNode {
    /// Creates a fresh node with zeroed statistics
    pub(crate) fn new(id: NodeId, parent: NodeId) -> Self {
        FluxNode {
            id,
            parent,
            children: Vec::new(),
            visits: 0,
            value: 0.0,
        }
    }

    /// Rebuilds a node from persisted fields
    pub(crate) fn from_parts(
        id: NodeId,
        parent: NodeId,
        children: Vec<NodeId>,
        visits: u32,
        value: f64,
    ) -> Self {
        FluxNode {
            id,
            parent,
            children,
            visits,
            value,
        }
    }

    /// Arena index of this node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent id, [`NodeId::NONE`] for roots
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Children in link order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of updates that passed through this node
    pub fn visits(&self) -> u32 {
        self.visits
    }

    /// Current conductivity
    pub fn value(&self) -> f64 {
        self.value
    }

    /// True when the node has no parent
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// True when the node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Increments the visit count, saturating at `u32::MAX`
    pub fn increment_visits(&mut self) {
        self.visits = self.visits.saturating_add(1);
    }

    /// Pulls the conductivity toward `reward` by `learning_rate` of the gap
    ///
    /// ```text
    /// value += learning_rate * (reward - value)
    /// ```
    ///
    /// The reward is not clamped; out-of-range rewards move the value out of
    /// `[0, 1]` as well.
    pub fn erode(&mut self, reward: f64, learning_rate: f64) {
        self.value += learning_rate * (reward - self.value);
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }
}
