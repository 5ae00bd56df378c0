//! Backpropagation policies for the fluid tree
//!
//! Backpropagation policies determine how a single node's statistics change
//! when an observed reward flows back through it. The tree applies the
//! policy to every node from the leaf up to its root.

use crate::node::FluxNode;

/// Trait for policies that fold a reward into a node
pub trait BackpropagationPolicy: Send + Sync {
    /// Updates statistics for a node based on an observed reward
    fn update_stats(&self, node: &mut FluxNode, reward: f64, learning_rate: f64);

    /// Create a boxed clone of this policy
    fn clone_box(&self) -> Box<dyn BackpropagationPolicy>;
}

/// Erosion (exponential moving average) policy
///
/// Increments the visit count, then pulls the conductivity toward the reward:
///
/// ```text
/// value += learning_rate * (reward - value)
/// ```
///
/// Recent rewards weigh more than old ones and no running sum is kept. With
/// `learning_rate` in `(0, 1]` and rewards in `[0, 1]` the value stays in
/// `[0, 1]`; other inputs are applied verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErosionPolicy;

impl ErosionPolicy {
    /// Creates a new erosion policy
    pub fn new() -> Self {
        ErosionPolicy
    }
}

impl BackpropagationPolicy for ErosionPolicy {
    fn update_stats(&self, node: &mut FluxNode, reward: f64, learning_rate: f64) {
        node.increment_visits();
        node.erode(reward, learning_rate);
    }

    fn clone_box(&self) -> Box<dyn BackpropagationPolicy> {
        Box::new(*self)
    }
}

// Implement BackpropagationPolicy for Box<dyn BackpropagationPolicy>
impl BackpropagationPolicy for Box<dyn BackpropagationPolicy> {
    fn update_stats(&self, node: &mut FluxNode, reward: f64, learning_rate: f64) {
        (**self).update_stats(node, reward, learning_rate)
    }

    fn clone_box(&self) -> Box<dyn BackpropagationPolicy> {
        (**self).clone_box()
    }
}
