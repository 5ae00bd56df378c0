//! Configuration options for the fluid tree
//!
//! This module defines the parameters a [`FluidTree`](crate::FluidTree)
//! resolves once at construction: default exploration, default learning
//! rate and which selection strategy drives descent.

use crate::{FluxError, Result};

/// Criteria for reporting the best child of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BestChildCriteria {
    /// Select the child with the most visits
    ///
    /// Visit counts are the robust choice: a child only accumulates visits
    /// by being reinforced repeatedly.
    #[default]
    MostVisits,

    /// Select the child with the highest conductivity
    HighestValue,
}

/// Strategy used by the tree to pick a child during descent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Deterministic upper-confidence selection
    #[default]
    Ucb,

    /// Stochastic sampling over softmax-weighted selection scores
    Flow,
}

/// Configuration for a fluid tree
///
/// # Example
///
/// ```
/// use fluxzero::{FluxConfig, config::SelectionStrategy};
///
/// let config = FluxConfig::default()
///     .with_exploration(0.5)
///     .with_learning_rate(0.25)
///     .with_selection(SelectionStrategy::Flow)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FluxConfig {
    /// Exploration weight used by [`FluidTree::select`](crate::FluidTree::select)
    ///
    /// Higher values favor under-visited children. The standard value is
    /// sqrt(2) ≈ 1.414.
    pub exploration: f64,

    /// EMA step size used by [`FluidTree::reinforce`](crate::FluidTree::reinforce)
    pub learning_rate: f64,

    /// Which selection policy the tree installs
    pub selection: SelectionStrategy,

    /// Seed for stochastic selection; `None` seeds from system entropy
    pub seed: Option<u64>,

    /// Criteria used by [`FluidTree::best_child`](crate::FluidTree::best_child)
    pub best_child_criteria: BestChildCriteria,
}

impl Default for FluxConfig {
    fn default() -> Self {
        FluxConfig {
            exploration: 1.414, // sqrt(2)
            learning_rate: 0.1,
            selection: SelectionStrategy::Ucb,
            seed: None,
            best_child_criteria: BestChildCriteria::MostVisits,
        }
    }
}

impl FluxConfig {
    /// Sets the exploration weight
    pub fn with_exploration(mut self, exploration: f64) -> Self {
        self.exploration = exploration;
        self
    }

    /// Sets the learning rate
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the selection strategy
    pub fn with_selection(mut self, selection: SelectionStrategy) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the seed for stochastic selection
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the criteria for reporting the best child
    pub fn with_best_child_criteria(mut self, criteria: BestChildCriteria) -> Self {
        self.best_child_criteria = criteria;
        self
    }

    /// Checks that the parameters are usable
    pub fn validate(&self) -> Result<()> {
        if !self.exploration.is_finite() || self.exploration < 0.0 {
            return Err(FluxError::InvalidConfiguration(format!(
                "exploration must be finite and non-negative, got {}",
                self.exploration
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 || self.learning_rate > 1.0
        {
            return Err(FluxError::InvalidConfiguration(format!(
                "learning rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
