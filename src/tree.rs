//! The fluid tree: node arena, descent, reinforcement and persistence
//!
//! All nodes live in a single `Vec` owned by the tree and are addressed by
//! [`NodeId`]. Ids are assigned sequentially from 0 and never reused. Node 0
//! exists from construction on and serves as the default root.
//!
//! Read operations never fail: unknown ids yield benign defaults (0, an empty
//! slice, the start node, [`NodeId::NONE`]). Mutations that name unknown ids
//! are rejected with an error and leave the arena untouched.

use std::fmt::Write as _;
use std::path::Path;

use log::{debug, trace, warn};

use crate::{
    codec,
    config::{BestChildCriteria, FluxConfig, SelectionStrategy},
    node::{FluxNode, NodeId},
    policy::{
        backpropagation::{BackpropagationPolicy, ErosionPolicy},
        selection::{FlowPolicy, SelectionPolicy, UcbPolicy},
    },
    stats::TreeStatistics,
    FluxError, Result,
};

/// An incrementally grown decision tree with conductivity statistics
///
/// Callers grow the tree, repeatedly [`select_leaf`](Self::select_leaf) to
/// find where to evaluate, and report the outcome with
/// [`backprop`](Self::backprop).
///
/// ```
/// use fluxzero::{FluidTree, NodeId};
///
/// let mut tree = FluidTree::new();
/// let a = tree.create_child(NodeId::ROOT)?;
/// let b = tree.create_child(NodeId::ROOT)?;
///
/// for _ in 0..5 {
///     tree.backprop(a, 1.0, 1.0);
/// }
/// tree.backprop(b, 0.0, 1.0);
///
/// assert_eq!(tree.get_best_child(NodeId::ROOT), a);
/// assert_eq!(tree.get_visits(NodeId::ROOT), 6);
/// # Ok::<(), fluxzero::FluxError>(())
/// ```
pub struct FluidTree {
    /// Node arena, indexed by id
    nodes: Vec<FluxNode>,

    /// Configuration resolved at construction
    config: FluxConfig,

    /// Policy for choosing a child during descent
    selection_policy: Box<dyn SelectionPolicy>,

    /// Policy for folding rewards into nodes
    backpropagation_policy: Box<dyn BackpropagationPolicy>,
}

impl FluidTree {
    /// Creates a tree holding only the root node with the default configuration
    pub fn new() -> Self {
        Self::build(FluxConfig::default())
    }

    /// Creates a tree with a validated configuration
    pub fn with_config(config: FluxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: FluxConfig) -> Self {
        let selection_policy: Box<dyn SelectionPolicy> = match config.selection {
            SelectionStrategy::Ucb => Box::new(UcbPolicy::new()),
            SelectionStrategy::Flow => match config.seed {
                Some(seed) => Box::new(FlowPolicy::with_seed(seed)),
                None => Box::new(FlowPolicy::new()),
            },
        };

        FluidTree {
            nodes: vec![FluxNode::new(NodeId::ROOT, NodeId::NONE)],
            config,
            selection_policy,
            backpropagation_policy: Box::new(ErosionPolicy::new()),
        }
    }

    /// Sets the selection policy to use
    pub fn with_selection_policy<P: SelectionPolicy + 'static>(mut self, policy: P) -> Self {
        self.selection_policy = Box::new(policy);
        self
    }

    /// Sets the backpropagation policy to use
    pub fn with_backpropagation_policy<P: BackpropagationPolicy + 'static>(
        mut self,
        policy: P,
    ) -> Self {
        self.backpropagation_policy = Box::new(policy);
        self
    }

    /// Returns the configuration
    pub fn config(&self) -> &FluxConfig {
        &self.config
    }

    /// Number of nodes; also the next id to be assigned
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: node 0 exists for the tree's whole lifetime
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Read access to the arena in id order
    pub fn nodes(&self) -> &[FluxNode] {
        &self.nodes
    }

    /// Looks up a node
    pub fn node(&self, id: NodeId) -> Option<&FluxNode> {
        id.index().and_then(|i| self.nodes.get(i))
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut FluxNode> {
        id.index().and_then(move |i| self.nodes.get_mut(i))
    }

    /// Returns true if `id` names a node of this tree
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    // ------------------------------------------------------------------
    // Growing the tree
    // ------------------------------------------------------------------

    /// Allocates a node with zeroed statistics and returns its id
    ///
    /// `parent` must be [`NodeId::NONE`] (a new root) or an existing node.
    /// The new node is not linked into the parent's children; use
    /// [`add_child`](Self::add_child) or [`create_child`](Self::create_child).
    pub fn create_node(&mut self, parent: NodeId) -> Result<NodeId> {
        if parent != NodeId::NONE && !self.contains(parent) {
            warn!("create_node: unknown parent {}", parent);
            return Err(FluxError::InvalidReference(parent.0));
        }
        if self.nodes.len() >= i32::MAX as usize {
            return Err(FluxError::CapacityExceeded(self.nodes.len()));
        }

        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(FluxNode::new(id, parent));
        trace!("created node {} under {}", id, parent);
        Ok(id)
    }

    /// Appends `child` to `parent`'s children
    ///
    /// Returns `Ok(true)` when the link was recorded and `Ok(false)` when it
    /// already existed. Links are only accepted when the child was created
    /// under `parent`; re-parenting is rejected with
    /// [`FluxError::ParentMismatch`], unknown ids with
    /// [`FluxError::InvalidReference`].
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        if !self.contains(parent) {
            warn!("add_child: unknown parent {}", parent);
            return Err(FluxError::InvalidReference(parent.0));
        }
        let recorded = match self.node(child) {
            Some(node) => node.parent(),
            None => {
                warn!("add_child: unknown child {}", child);
                return Err(FluxError::InvalidReference(child.0));
            }
        };
        if recorded != parent {
            warn!(
                "add_child: child {} belongs to {}, not {}",
                child, recorded, parent
            );
            return Err(FluxError::ParentMismatch {
                parent: parent.0,
                child: child.0,
            });
        }

        let Some(parent_node) = self.node_mut(parent) else {
            return Err(FluxError::InvalidReference(parent.0));
        };
        if parent_node.children().contains(&child) {
            debug!("add_child: {} already linked under {}", child, parent);
            return Ok(false);
        }
        parent_node.push_child(child);
        Ok(true)
    }

    /// Allocates a node under `parent` and links it in one step
    pub fn create_child(&mut self, parent: NodeId) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(FluxError::InvalidReference(parent.0));
        }
        let child = self.create_node(parent)?;
        self.add_child(parent, child)?;
        Ok(child)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Children of `id` in link order; empty for unknown ids
    pub fn get_children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(FluxNode::children).unwrap_or(&[])
    }

    /// Visit count of `id`; 0 for unknown ids
    pub fn get_visits(&self, id: NodeId) -> u32 {
        self.node(id).map(FluxNode::visits).unwrap_or(0)
    }

    /// Conductivity of `id`; 0.0 for unknown ids
    pub fn get_value(&self, id: NodeId) -> f64 {
        self.node(id).map(FluxNode::value).unwrap_or(0.0)
    }

    /// Parent of `id`; [`NodeId::NONE`] for roots and unknown ids
    pub fn get_parent(&self, id: NodeId) -> NodeId {
        self.node(id).map(FluxNode::parent).unwrap_or(NodeId::NONE)
    }

    /// Number of parent links between `id` and its root; 0 for unknown ids
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get_parent(id);
        while current.is_some() {
            depth += 1;
            current = self.get_parent(current);
        }
        depth
    }

    /// Child of `id` with the most visits, lowest id on ties
    ///
    /// Returns [`NodeId::NONE`] if `id` is unknown or has no children.
    pub fn get_best_child(&self, id: NodeId) -> NodeId {
        self.best_child_by(id, BestChildCriteria::MostVisits)
    }

    /// Best child of `id` under the configured criteria
    pub fn best_child(&self, id: NodeId) -> NodeId {
        self.best_child_by(id, self.config.best_child_criteria)
    }

    /// Best child of `id` under the given criteria, lowest id on ties
    pub fn best_child_by(&self, id: NodeId, criteria: BestChildCriteria) -> NodeId {
        let mut best: Option<&FluxNode> = None;

        for child in self.get_children(id).iter().filter_map(|&c| self.node(c)) {
            let better = match best {
                None => true,
                Some(current) => match criteria {
                    BestChildCriteria::MostVisits => {
                        child.visits() > current.visits()
                            || (child.visits() == current.visits() && child.id() < current.id())
                    }
                    BestChildCriteria::HighestValue => {
                        child.value() > current.value()
                            || (child.value() == current.value() && child.id() < current.id())
                    }
                },
            };
            if better {
                best = Some(child);
            }
        }

        best.map(FluxNode::id).unwrap_or(NodeId::NONE)
    }

    // ------------------------------------------------------------------
    // Selection and reinforcement
    // ------------------------------------------------------------------

    /// Descends from `start` to a node without children
    ///
    /// At every interior node the selection policy picks a child, by default
    /// the one maximizing
    /// `value + exploration * sqrt(ln(parent_visits + 1) / (child_visits + 1))`.
    /// An unknown start, or one without children, is returned unchanged.
    pub fn select_leaf(&self, start: NodeId, exploration: f64) -> NodeId {
        if !self.contains(start) {
            trace!("select_leaf: unknown start {}", start);
            return start;
        }

        let mut current = start;
        // Every step moves to a strictly larger id, so the arena size bounds
        // the walk even if a custom policy misbehaves.
        for _ in 0..self.nodes.len() {
            match self
                .selection_policy
                .select_child(self, current, exploration)
            {
                Some(next) if next > current && self.contains(next) => {
                    trace!("select_leaf: {} -> {}", current, next);
                    current = next;
                }
                Some(next) => {
                    warn!("select_leaf: policy returned invalid child {}", next);
                    break;
                }
                None => break,
            }
        }
        current
    }

    /// [`select_leaf`](Self::select_leaf) with the configured exploration
    pub fn select(&self, start: NodeId) -> NodeId {
        self.select_leaf(start, self.config.exploration)
    }

    /// Folds `reward` into `leaf` and every ancestor up to its root
    ///
    /// Each node on the path, leaf first, gets one more visit and has its
    /// conductivity pulled toward `reward` by `learning_rate` of the gap.
    /// Returns the number of nodes updated; 0 for an unknown leaf.
    pub fn backprop(&mut self, leaf: NodeId, reward: f64, learning_rate: f64) -> usize {
        let mut updated = 0;
        let mut current = leaf;

        while let Some(index) = current.index().filter(|&i| i < self.nodes.len()) {
            let node = &mut self.nodes[index];
            self.backpropagation_policy
                .update_stats(node, reward, learning_rate);
            updated += 1;
            current = node.parent();
        }

        if updated == 0 {
            trace!("backprop: unknown leaf {}", leaf);
        }
        updated
    }

    /// [`backprop`](Self::backprop) with the configured learning rate
    pub fn reinforce(&mut self, leaf: NodeId, reward: f64) -> usize {
        self.backprop(leaf, reward, self.config.learning_rate)
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Computes shape statistics for the whole arena
    pub fn statistics(&self) -> TreeStatistics {
        // Parents always precede their children, so one pass in id order
        // sees every parent's depth first.
        let mut depths = vec![0usize; self.nodes.len()];
        let mut stats = TreeStatistics {
            node_count: self.nodes.len(),
            root_count: 0,
            leaf_count: 0,
            max_depth: 0,
            total_root_visits: 0,
            link_count: 0,
        };

        for (i, node) in self.nodes.iter().enumerate() {
            match node.parent().index() {
                Some(p) => depths[i] = depths[p] + 1,
                None => {
                    stats.root_count += 1;
                    stats.total_root_visits += u64::from(node.visits());
                }
            }
            if node.is_leaf() {
                stats.leaf_count += 1;
            }
            stats.link_count += node.children().len();
            stats.max_depth = stats.max_depth.max(depths[i]);
        }

        stats
    }

    /// Renders the subtree under `start` as indented text
    pub fn visualize(&self, start: NodeId) -> String {
        let mut output = String::new();
        if self.contains(start) {
            self.visualize_node(start, 0, &mut output);
        }
        output
    }

    fn visualize_node(&self, id: NodeId, depth: usize, output: &mut String) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            output,
            "{}{} (visits: {}, value: {:.3})",
            indent,
            id,
            self.get_visits(id),
            self.get_value(id)
        );

        for &child in self.get_children(id) {
            self.visualize_node(child, depth + 1, output);
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Encodes the arena in the persisted binary format
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(&self.nodes)
    }

    /// Replaces the arena with a decoded one
    ///
    /// On error the current nodes are kept unchanged.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let nodes = codec::decode(bytes)?;
        self.replace_nodes(nodes);
        Ok(())
    }

    /// Builds a default-configured tree from persisted bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut tree = Self::new();
        tree.load_bytes(bytes)?;
        Ok(tree)
    }

    /// Writes the arena to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        codec::write_file(path.as_ref(), &self.nodes)
    }

    /// Replaces the arena with the one stored at `path`
    ///
    /// A missing, unreadable or malformed file leaves the tree untouched and
    /// returns the error.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        match codec::read_file(path) {
            Ok(nodes) => {
                self.replace_nodes(nodes);
                Ok(())
            }
            Err(err) => {
                warn!("load from {} failed: {}", path.display(), err);
                Err(err)
            }
        }
    }

    fn replace_nodes(&mut self, nodes: Vec<FluxNode>) {
        debug!("replacing {} nodes with {}", self.nodes.len(), nodes.len());
        self.nodes = nodes;
    }
}

impl Default for FluidTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FluidTree {
    fn clone(&self) -> Self {
        FluidTree {
            nodes: self.nodes.clone(),
            config: self.config.clone(),
            selection_policy: self.selection_policy.clone_box(),
            backpropagation_policy: self.backpropagation_policy.clone_box(),
        }
    }
}

impl std::fmt::Debug for FluidTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluidTree")
            .field("nodes", &self.nodes.len())
            .field("config", &self.config)
            .finish()
    }
}
