//! Shared chain identity types.

use serde::{Deserialize, Serialize};

/// Numeric chain identifier used by the mining dispatcher.
pub type ChainId = u32;

/// Stable string key identifying a chain ("prime", "cyprus1", ...).
pub type ChainKey = String;

/// Position of a chain in the Prime/Region/Zone hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainLevel {
    Prime,
    Region,
    Zone,
}

/// Static descriptor of one minable chain.
///
/// Descriptors are immutable for the optimizer's lifetime and owned by the
/// registry; everything downstream refers to chains by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub id: ChainId,
    pub key: ChainKey,
    pub name: String,
    pub level: ChainLevel,
    pub token: String,
    pub enabled: bool,
}

impl ChainDescriptor {
    pub fn new(
        id: ChainId,
        key: &str,
        name: &str,
        level: ChainLevel,
        token: &str,
        enabled: bool,
    ) -> Self {
        Self {
            id,
            key: key.to_string(),
            name: name.to_string(),
            level,
            token: token.to_string(),
            enabled,
        }
    }
}
