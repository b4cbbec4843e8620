//! Chain registry - the catalog of minable chains.
//!
//! Registration order is significant: the scorer breaks score ties in favor
//! of the chain registered first, which keeps decisions deterministic.

use crate::types::{ChainDescriptor, ChainId, ChainLevel};
use std::collections::HashMap;

/// Immutable catalog of chain descriptors.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
    by_key: HashMap<String, usize>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self {
            chains: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    /// Register a chain. Later registrations with a duplicate key are
    /// ignored; the first registration wins.
    pub fn register(&mut self, descriptor: ChainDescriptor) {
        if self.by_key.contains_key(&descriptor.key) {
            return;
        }
        self.by_key
            .insert(descriptor.key.clone(), self.chains.len());
        self.chains.push(descriptor);
    }

    /// All chains in registration order.
    pub fn all(&self) -> &[ChainDescriptor] {
        &self.chains
    }

    /// Enabled chains in registration order.
    pub fn enabled(&self) -> Vec<&ChainDescriptor> {
        self.chains.iter().filter(|c| c.enabled).collect()
    }

    pub fn get(&self, key: &str) -> Option<&ChainDescriptor> {
        self.by_key.get(key).map(|&i| &self.chains[i])
    }

    pub fn id_of(&self, key: &str) -> Option<ChainId> {
        self.get(key).map(|c| c.id)
    }

    /// Position of a chain in registration order, used for tie-breaking.
    pub fn rank_of(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// The stock Quai-style hierarchy: one Prime chain, three Regions, and
    /// three Zones under each Region. Only Prime starts enabled; the rest
    /// are opted in through configuration.
    pub fn quai_mainnet() -> Self {
        let mut registry = Self::new();
        registry.register(ChainDescriptor::new(
            0,
            "prime",
            "Prime",
            ChainLevel::Prime,
            "QUAI",
            true,
        ));
        for (id, key, name) in [
            (1, "cyprus", "Cyprus"),
            (2, "paxos", "Paxos"),
            (3, "hydra", "Hydra"),
        ] {
            registry.register(ChainDescriptor::new(
                id,
                key,
                name,
                ChainLevel::Region,
                "QI",
                false,
            ));
        }
        for (id, key, name) in [
            (4, "cyprus1", "Cyprus Zone 1"),
            (5, "cyprus2", "Cyprus Zone 2"),
            (6, "cyprus3", "Cyprus Zone 3"),
            (7, "paxos1", "Paxos Zone 1"),
            (8, "paxos2", "Paxos Zone 2"),
            (9, "paxos3", "Paxos Zone 3"),
            (10, "hydra1", "Hydra Zone 1"),
            (11, "hydra2", "Hydra Zone 2"),
            (12, "hydra3", "Hydra Zone 3"),
        ] {
            registry.register(ChainDescriptor::new(
                id,
                key,
                name,
                ChainLevel::Zone,
                "QI",
                false,
            ));
        }
        registry
    }

    /// Same catalog with every chain enabled, for real-time switching across
    /// the whole hierarchy.
    pub fn quai_mainnet_all_enabled() -> Self {
        let mut registry = Self::quai_mainnet();
        for chain in &mut registry.chains {
            chain.enabled = true;
        }
        registry
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quai_mainnet_catalog() {
        let registry = ChainRegistry::quai_mainnet();
        assert_eq!(registry.len(), 13);

        let prime = registry.get("prime").unwrap();
        assert_eq!(prime.id, 0);
        assert_eq!(prime.level, ChainLevel::Prime);
        assert_eq!(prime.token, "QUAI");
        assert!(prime.enabled);

        let hydra3 = registry.get("hydra3").unwrap();
        assert_eq!(hydra3.id, 12);
        assert_eq!(hydra3.level, ChainLevel::Zone);
        assert!(!hydra3.enabled);
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let registry = ChainRegistry::quai_mainnet();
        assert_eq!(registry.rank_of("prime"), Some(0));
        assert_eq!(registry.rank_of("cyprus"), Some(1));
        assert_eq!(registry.rank_of("hydra3"), Some(12));
        assert_eq!(registry.rank_of("unknown"), None);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = ChainRegistry::new();
        registry.register(ChainDescriptor::new(
            0,
            "prime",
            "Prime",
            ChainLevel::Prime,
            "QUAI",
            true,
        ));
        registry.register(ChainDescriptor::new(
            99,
            "prime",
            "Impostor",
            ChainLevel::Zone,
            "QI",
            false,
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("prime").unwrap().id, 0);
    }

    #[test]
    fn test_enabled_filter() {
        let registry = ChainRegistry::quai_mainnet();
        let enabled = registry.enabled();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].key, "prime");

        let all_on = ChainRegistry::quai_mainnet_all_enabled();
        assert_eq!(all_on.enabled().len(), 13);
    }
}
