//! Adapters for the domain ports that need no external system.

pub mod in_memory;
pub mod simulated;
