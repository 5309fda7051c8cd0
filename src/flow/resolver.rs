//! Forward/reverse pairing and delta computation.
//!
//! Every key observed this window is treated as the forward direction of a
//! bidirectional flow. Its reverse key is looked up in the current map (absent
//! means no backward traffic this window) and both directions are differenced
//! against the registry baseline (absent means a new flow, zero baseline).

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use super::registry::FlowRegistry;
use super::types::{FlowDelta, FlowKey, FlowSnapshot};

/// How the resolver treats counter regressions and reverse pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaPolicy {
    /// Raise negative counter deltas to zero instead of passing them through
    #[serde(default)]
    pub clamp_negative: bool,
    /// Emit a row for every observed key, even when its reverse was already emitted
    #[serde(default)]
    pub emit_both_directions: bool,
}

/// One forward flow paired with its reverse direction for a single window
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFlow {
    pub key: FlowKey,
    pub forward: FlowDelta,
    pub backward: FlowDelta,
    /// The reverse key was observed this window
    pub reverse_observed: bool,
    /// The forward key was absent from the previous window
    pub is_new: bool,
    /// A counter in either direction went backwards, before any clamping
    pub regressed: bool,
}

impl ResolvedFlow {
    pub fn has_regression(&self) -> bool {
        self.regressed
    }
}

/// Pair and difference every flow in `current` against `registry`.
///
/// Output follows ascending key order. Unless `policy.emit_both_directions`
/// is set, a key whose reverse has already been emitted this window is
/// skipped, so each observed reverse pair yields exactly one row.
pub fn resolve(
    current: &BTreeMap<FlowKey, FlowSnapshot>,
    registry: &FlowRegistry,
    policy: DeltaPolicy,
) -> Vec<ResolvedFlow> {
    let mut emitted: BTreeSet<FlowKey> = BTreeSet::new();
    let mut resolved = Vec::with_capacity(current.len());

    for (key, cur_fwd) in current {
        let reverse_key = key.reverse();

        if !policy.emit_both_directions && emitted.contains(&reverse_key) {
            debug!("Skipping {} (reverse direction already emitted)", key);
            continue;
        }

        let cur_bwd = current.get(&reverse_key).copied();
        let prev_fwd = registry.baseline(key);
        let prev_bwd = registry.baseline(&reverse_key);

        let forward = FlowDelta::between(cur_fwd, &prev_fwd, false);
        let backward = FlowDelta::between(&cur_bwd.unwrap_or_default(), &prev_bwd, false);
        let regressed = forward.has_regression() || backward.has_regression();

        let (forward, backward) = if policy.clamp_negative {
            (forward.clamped(), backward.clamped())
        } else {
            (forward, backward)
        };

        resolved.push(ResolvedFlow {
            key: *key,
            forward,
            backward,
            reverse_observed: cur_bwd.is_some(),
            is_new: !registry.contains(key),
            regressed,
        });
        emitted.insert(*key);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::types::PROTO_UDP;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 1, 1, last))
    }

    fn client_to_server() -> FlowKey {
        FlowKey::new(ip(3), ip(7), 49153, 1006, PROTO_UDP)
    }

    fn snap(pkts: u64, bytes: u64) -> FlowSnapshot {
        FlowSnapshot {
            tx_packets: pkts,
            rx_packets: pkts,
            tx_bytes: bytes,
            rx_bytes: bytes,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_flow_uses_zero_baseline() {
        let registry = FlowRegistry::new();
        let mut current = BTreeMap::new();
        current.insert(client_to_server(), snap(10, 500));

        let rows = resolve(&current, &registry, DeltaPolicy::default());
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_new);
        assert!(!rows[0].reverse_observed);
        assert_eq!(rows[0].forward.tx_packets, 10);
        assert_eq!(rows[0].forward.rx_bytes, 500);
        assert_eq!(rows[0].backward, FlowDelta::default());
    }

    #[test]
    fn test_deltas_against_previous_window() {
        let mut registry = FlowRegistry::new();
        let mut first = BTreeMap::new();
        first.insert(client_to_server(), snap(10, 500));
        first.insert(client_to_server().reverse(), snap(2, 80));
        registry.replace(first);

        let mut current = BTreeMap::new();
        current.insert(client_to_server(), snap(25, 1200));
        current.insert(client_to_server().reverse(), snap(5, 200));

        let rows = resolve(&current, &registry, DeltaPolicy::default());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(!row.is_new);
        assert!(row.reverse_observed);
        assert_eq!(row.forward.tx_packets, 15);
        assert_eq!(row.forward.tx_bytes, 700);
        assert_eq!(row.backward.tx_packets, 3);
        assert_eq!(row.backward.rx_bytes, 120);
    }

    #[test]
    fn test_reverse_pair_emitted_once_by_default() {
        let registry = FlowRegistry::new();
        let mut current = BTreeMap::new();
        current.insert(client_to_server(), snap(10, 500));
        current.insert(client_to_server().reverse(), snap(4, 160));

        let rows = resolve(&current, &registry, DeltaPolicy::default());
        assert_eq!(rows.len(), 1);
        // 10.1.1.3 sorts before 10.1.1.7, so the client side is discovered first
        assert_eq!(rows[0].key, client_to_server());
        assert_eq!(rows[0].backward.tx_packets, 4);
    }

    #[test]
    fn test_emit_both_directions() {
        let registry = FlowRegistry::new();
        let mut current = BTreeMap::new();
        current.insert(client_to_server(), snap(10, 500));
        current.insert(client_to_server().reverse(), snap(4, 160));

        let policy = DeltaPolicy { emit_both_directions: true, ..Default::default() };
        let rows = resolve(&current, &registry, policy);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].key, client_to_server().reverse());
        assert_eq!(rows[1].forward.tx_packets, 4);
        assert_eq!(rows[1].backward.tx_packets, 10);
    }

    #[test]
    fn test_counter_regression_propagates() {
        let mut registry = FlowRegistry::new();
        let mut first = BTreeMap::new();
        first.insert(client_to_server(), snap(100, 5000));
        registry.replace(first);

        let mut current = BTreeMap::new();
        current.insert(client_to_server(), snap(20, 1000));

        let rows = resolve(&current, &registry, DeltaPolicy::default());
        assert_eq!(rows[0].forward.tx_packets, -80);
        assert!(rows[0].has_regression());

        let clamp = DeltaPolicy { clamp_negative: true, ..Default::default() };
        let rows = resolve(&current, &registry, clamp);
        assert_eq!(rows[0].forward.tx_packets, 0);
        // Clamping hides the negative value, not the fact that the counter went back
        assert!(rows[0].has_regression());
        assert!(!rows[0].forward.has_regression());
    }

    #[test]
    fn test_monotonic_counters_never_go_negative() {
        let mut registry = FlowRegistry::new();
        let keys: Vec<FlowKey> = (1..6)
            .map(|i| FlowKey::new(ip(i), ip(10 + i), 49152 + i as u16, 1000 + i as u16, PROTO_UDP))
            .collect();

        for step in 1..5u64 {
            let current: BTreeMap<FlowKey, FlowSnapshot> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (*k, snap(step * (i as u64 + 1), step * 100 * (i as u64 + 1))))
                .collect();

            for row in resolve(&current, &registry, DeltaPolicy::default()) {
                assert!(!row.has_regression(), "negative delta for {}", row.key);
            }
            registry.replace(current);
        }
    }
}
