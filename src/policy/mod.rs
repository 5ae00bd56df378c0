//! Policies for the two learning phases of the fluid tree
//!
//! This module contains the pluggable pieces of the engine:
//! - Selection policies: How to choose which child to descend into
//! - Backpropagation policies: How to fold an observed reward into a node

pub mod backpropagation;
pub mod selection;

pub use backpropagation::{BackpropagationPolicy, ErosionPolicy};
pub use selection::{FlowPolicy, SelectionPolicy, UcbPolicy};
