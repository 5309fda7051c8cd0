//! Previous-window flow registry.
//!
//! Holds the snapshot set observed at the previous tick. The whole map is
//! swapped out once per window; there are no per-flow updates, so at tick N
//! the registry holds exactly what tick N-1 observed.

use std::collections::BTreeMap;

use super::types::{FlowKey, FlowSnapshot};

#[derive(Debug, Default)]
pub struct FlowRegistry {
    previous: BTreeMap<FlowKey, FlowSnapshot>,
    /// Number of completed swaps
    generation: u64,
}

impl FlowRegistry {
    pub fn new() -> Self {
        FlowRegistry::default()
    }

    /// Baseline for `key`, or the all-zero snapshot for a flow not seen last window
    pub fn baseline(&self, key: &FlowKey) -> FlowSnapshot {
        self.previous.get(key).copied().unwrap_or_default()
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.previous.contains_key(key)
    }

    /// Install `current` as the new baseline and hand back the old one
    pub fn replace(
        &mut self,
        current: BTreeMap<FlowKey, FlowSnapshot>,
    ) -> BTreeMap<FlowKey, FlowSnapshot> {
        self.generation += 1;
        std::mem::replace(&mut self.previous, current)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::types::PROTO_UDP;
    use std::net::{IpAddr, Ipv4Addr};

    fn key(last: u8) -> FlowKey {
        FlowKey::new(
            IpAddr::V4(Ipv4Addr::new(10, 1, 1, last)),
            IpAddr::V4(Ipv4Addr::new(10, 1, 1, 2)),
            49153,
            1002,
            PROTO_UDP,
        )
    }

    #[test]
    fn test_empty_registry_yields_zero_baseline() {
        let registry = FlowRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), 0);
        assert_eq!(registry.baseline(&key(1)), FlowSnapshot::default());
    }

    #[test]
    fn test_replace_swaps_whole_map() {
        let mut registry = FlowRegistry::new();

        let mut first = BTreeMap::new();
        first.insert(key(1), FlowSnapshot { tx_packets: 10, ..Default::default() });
        first.insert(key(3), FlowSnapshot { tx_packets: 4, ..Default::default() });
        let old = registry.replace(first);
        assert!(old.is_empty());
        assert_eq!(registry.len(), 2);

        // Flow 3 vanished from the second observation and must not linger
        let mut second = BTreeMap::new();
        second.insert(key(1), FlowSnapshot { tx_packets: 12, ..Default::default() });
        let old = registry.replace(second);

        assert_eq!(old.len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(&key(3)));
        assert_eq!(registry.baseline(&key(1)).tx_packets, 12);
        assert_eq!(registry.baseline(&key(3)), FlowSnapshot::default());
        assert_eq!(registry.generation(), 2);
    }
}
