//! Selection policies for descending the fluid tree
//!
//! A selection policy picks one child of an interior node. The tree calls it
//! repeatedly from the start node until it reaches a node without children.

use std::sync::Mutex;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{node::NodeId, tree::FluidTree};

/// Trait for policies that choose which child to descend into
pub trait SelectionPolicy: Send + Sync {
    /// Picks a child of `parent`, or `None` if it has no children
    fn select_child(&self, tree: &FluidTree, parent: NodeId, exploration: f64) -> Option<NodeId>;

    /// Create a boxed clone of this policy
    fn clone_box(&self) -> Box<dyn SelectionPolicy>;

    /// Returns the policy as Any to allow downcasting
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Upper confidence selection with offset counts
///
/// ```text
/// score = value + exploration * sqrt(ln(parent_visits + 1) / (child_visits + 1))
/// ```
///
/// The offsets keep the score finite for unvisited children while still
/// favoring them strongly. Equal scores go to the lowest child id, so the
/// policy is fully deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct UcbPolicy;

impl UcbPolicy {
    /// Creates a new UCB policy
    pub fn new() -> Self {
        UcbPolicy
    }

    /// Calculates the selection score for one child
    pub fn score(child_value: f64, child_visits: u32, parent_visits: u32, exploration: f64) -> f64 {
        let numerator = (f64::from(parent_visits) + 1.0).ln();
        let denominator = f64::from(child_visits) + 1.0;
        child_value + exploration * (numerator / denominator).sqrt()
    }
}

impl SelectionPolicy for UcbPolicy {
    fn select_child(&self, tree: &FluidTree, parent: NodeId, exploration: f64) -> Option<NodeId> {
        let parent_visits = tree.get_visits(parent);

        let mut best: Option<(NodeId, f64)> = None;
        for &child in tree.get_children(parent) {
            let score = Self::score(
                tree.get_value(child),
                tree.get_visits(child),
                parent_visits,
                exploration,
            );

            best = match best {
                None => Some((child, score)),
                Some((best_id, best_score))
                    if score > best_score || (score == best_score && child < best_id) =>
                {
                    Some((child, score))
                }
                keep => keep,
            };
        }

        best.map(|(id, _)| id)
    }

    fn clone_box(&self) -> Box<dyn SelectionPolicy> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Stochastic "flow" selection
///
/// Children are sampled with probability proportional to
/// `exp(score / temperature)`, where `score` is the [`UcbPolicy`] score at unit
/// exploration and the temperature is the exploration parameter. Low temperatures approach
/// greedy selection, high ones approach uniform sampling. A non-positive or
/// non-finite temperature falls back to the deterministic UCB choice.
#[derive(Debug)]
pub struct FlowPolicy {
    rng: Mutex<StdRng>,
}

impl FlowPolicy {
    /// Creates a flow policy seeded from system entropy
    pub fn new() -> Self {
        FlowPolicy {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a flow policy with a fixed seed for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        FlowPolicy {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Flow probabilities for a set of scores at the given temperature
    ///
    /// Returns an empty vector when no usable distribution exists.
    pub fn flow_probabilities(scores: &[f64], temperature: f64) -> Vec<f64> {
        if scores.is_empty() || !temperature.is_finite() || temperature <= 0.0 {
            return Vec::new();
        }

        // Shift by the max so the largest weight is exp(0)
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Vec::new();
        }

        let weights: Vec<f64> = scores
            .iter()
            .map(|s| ((s - max) / temperature).exp())
            .collect();
        let total: f64 = weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Vec::new();
        }

        weights.into_iter().map(|w| w / total).collect()
    }
}

impl Default for FlowPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionPolicy for FlowPolicy {
    fn select_child(&self, tree: &FluidTree, parent: NodeId, exploration: f64) -> Option<NodeId> {
        let children = tree.get_children(parent);
        if children.is_empty() {
            return None;
        }

        let parent_visits = tree.get_visits(parent);
        let scores: Vec<f64> = children
            .iter()
            .map(|&c| UcbPolicy::score(tree.get_value(c), tree.get_visits(c), parent_visits, 1.0))
            .collect();

        let probs = Self::flow_probabilities(&scores, exploration);
        let dist = match WeightedIndex::new(&probs) {
            Ok(dist) => dist,
            Err(_) => return UcbPolicy.select_child(tree, parent, exploration),
        };

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(children[dist.sample(&mut *rng)])
    }

    fn clone_box(&self) -> Box<dyn SelectionPolicy> {
        let rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Box::new(FlowPolicy {
            rng: Mutex::new(rng),
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// Implement SelectionPolicy for Box<dyn SelectionPolicy>
impl SelectionPolicy for Box<dyn SelectionPolicy> {
    fn select_child(&self, tree: &FluidTree, parent: NodeId, exploration: f64) -> Option<NodeId> {
        (**self).select_child(tree, parent, exploration)
    }

    fn clone_box(&self) -> Box<dyn SelectionPolicy> {
        (**self).clone_box()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        (**self).as_any()
    }
}
