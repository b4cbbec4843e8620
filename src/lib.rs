//! hashpilot - multi-chain mining profitability optimizer
//!
//! This crate decides, continuously and automatically, which chain of a
//! Prime/Region/Zone hierarchy a single hash-power source should mine,
//! without thrashing between near-equal options.

pub mod optimizer;
pub mod types;

// Re-export main types for convenience
pub use types::{ChainDescriptor, ChainId, ChainKey, ChainLevel};
