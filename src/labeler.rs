//! Ground-truth labelling of flow rows.
//!
//! A row is an attack when its forward packet rate is strictly above the rate
//! threshold, or when its source address resolves to a node in the attacker
//! set. Intensity is not measured: for attacker-set flows it comes from the
//! configured attacker send interval, and rate-only detections are always
//! labelled high.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::features::FlowFeatures;
use crate::flow::FlowKey;

/// Forward packets per time unit above which a flow counts as an attack
pub const DEFAULT_RATE_THRESHOLD: f64 = 5000.0;

/// Intensity assigned to flows flagged by rate alone
pub const RATE_ONLY_INTENSITY: Intensity = Intensity::High;

/// Send intervals at or below this are high intensity
pub const HIGH_INTENSITY_INTERVAL: Duration = Duration::from_micros(200);
/// Send intervals at or below this are medium intensity
pub const MEDIUM_INTENSITY_INTERVAL: Duration = Duration::from_micros(500);

/// Coarse attack severity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Intensity {
    /// Not an attack
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Intensity {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Map an attacker inter-packet interval to an intensity class.
///
/// Shorter intervals mean higher send rates. This is a fixed heuristic over
/// the scenario's configured interval, not a statistic of the flow.
pub fn intensity_for_interval(interval: Duration) -> Intensity {
    if interval <= HIGH_INTENSITY_INTERVAL {
        Intensity::High
    } else if interval <= MEDIUM_INTENSITY_INTERVAL {
        Intensity::Medium
    } else {
        Intensity::Low
    }
}

/// How a source address is mapped back to a simulation node id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeIdStrategy {
    /// Addresses carry no node identity; label by rate only
    None,
    /// Node id is the last octet of the address (point-to-point star layouts)
    #[default]
    LastOctet,
}

impl NodeIdStrategy {
    pub fn node_id(&self, addr: &IpAddr) -> Option<u32> {
        match self {
            NodeIdStrategy::None => None,
            NodeIdStrategy::LastOctet => match addr {
                IpAddr::V4(v4) => Some(u32::from(v4.octets()[3])),
                IpAddr::V6(v6) => Some(u32::from(v6.octets()[15])),
            },
        }
    }
}

/// Why a row was labelled an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackReason {
    AttackerNode(u32),
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    pub binary: bool,
    pub intensity: Intensity,
    pub reason: Option<AttackReason>,
}

impl Labels {
    pub fn benign() -> Self {
        Labels {
            binary: false,
            intensity: Intensity::None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Labeler {
    rate_threshold: f64,
    node_ids: NodeIdStrategy,
    attackers: BTreeSet<u32>,
    attack_interval: Duration,
}

impl Labeler {
    pub fn new(
        rate_threshold: f64,
        node_ids: NodeIdStrategy,
        attackers: BTreeSet<u32>,
        attack_interval: Duration,
    ) -> Self {
        Labeler {
            rate_threshold,
            node_ids,
            attackers,
            attack_interval,
        }
    }

    pub fn attacker_count(&self) -> usize {
        self.attackers.len()
    }

    /// Label one forward flow given its window features
    pub fn label(&self, key: &FlowKey, features: &FlowFeatures) -> Labels {
        if let Some(node) = self.node_ids.node_id(&key.src) {
            if self.attackers.contains(&node) {
                return Labels {
                    binary: true,
                    intensity: intensity_for_interval(self.attack_interval),
                    reason: Some(AttackReason::AttackerNode(node)),
                };
            }
        }

        if features.flow_pkts_per_sec > self.rate_threshold {
            return Labels {
                binary: true,
                intensity: RATE_ONLY_INTENSITY,
                reason: Some(AttackReason::Rate),
            };
        }

        Labels::benign()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::PROTO_UDP;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn key_from(last: u8) -> FlowKey {
        FlowKey::new(
            IpAddr::V4(Ipv4Addr::new(10, 1, 1, last)),
            IpAddr::V4(Ipv4Addr::new(10, 1, 1, 2)),
            49153,
            1002,
            PROTO_UDP,
        )
    }

    fn with_rate(rate: f64) -> FlowFeatures {
        FlowFeatures {
            flow_pkts_per_sec: rate,
            ..Default::default()
        }
    }

    fn rate_only() -> Labeler {
        Labeler::new(
            DEFAULT_RATE_THRESHOLD,
            NodeIdStrategy::None,
            BTreeSet::new(),
            Duration::from_millis(20),
        )
    }

    #[test]
    fn test_threshold_is_strict() {
        let labeler = rate_only();
        let at = labeler.label(&key_from(3), &with_rate(5000.0));
        assert!(!at.binary);
        assert_eq!(at.intensity, Intensity::None);

        let above = labeler.label(&key_from(3), &with_rate(5000.1));
        assert!(above.binary);
        assert_eq!(above.reason, Some(AttackReason::Rate));
    }

    #[test]
    fn test_rate_only_detection_is_always_high() {
        // The configured interval is slow, yet rate hits are labelled high
        let labeler = rate_only();
        let labels = labeler.label(&key_from(3), &with_rate(9000.0));
        assert_eq!(labels.intensity, RATE_ONLY_INTENSITY);
        assert_eq!(labels.intensity.as_u8(), 3);
    }

    #[test]
    fn test_attacker_node_uses_configured_interval() {
        let attackers: BTreeSet<u32> = [20, 21, 22, 23, 24].into_iter().collect();
        let labeler = Labeler::new(
            DEFAULT_RATE_THRESHOLD,
            NodeIdStrategy::LastOctet,
            attackers,
            Duration::from_micros(400),
        );

        let labels = labeler.label(&key_from(21), &with_rate(10.0));
        assert!(labels.binary);
        assert_eq!(labels.intensity, Intensity::Medium);
        assert_eq!(labels.reason, Some(AttackReason::AttackerNode(21)));

        let benign = labeler.label(&key_from(4), &with_rate(10.0));
        assert_eq!(benign, Labels::benign());
    }

    #[test]
    fn test_membership_ignored_without_node_ids() {
        let attackers: BTreeSet<u32> = [3].into_iter().collect();
        let labeler = Labeler::new(
            DEFAULT_RATE_THRESHOLD,
            NodeIdStrategy::None,
            attackers,
            Duration::from_micros(100),
        );
        assert!(!labeler.label(&key_from(3), &with_rate(10.0)).binary);
    }

    #[test]
    fn test_intensity_for_interval_boundaries() {
        assert_eq!(intensity_for_interval(Duration::from_micros(100)), Intensity::High);
        assert_eq!(intensity_for_interval(Duration::from_micros(200)), Intensity::High);
        assert_eq!(intensity_for_interval(Duration::from_micros(201)), Intensity::Medium);
        assert_eq!(intensity_for_interval(Duration::from_micros(500)), Intensity::Medium);
        assert_eq!(intensity_for_interval(Duration::from_micros(501)), Intensity::Low);
        assert_eq!(intensity_for_interval(Duration::from_millis(20)), Intensity::Low);
    }

    #[test]
    fn test_last_octet_node_ids() {
        let strategy = NodeIdStrategy::LastOctet;
        assert_eq!(strategy.node_id(&IpAddr::V4(Ipv4Addr::new(10, 1, 1, 24))), Some(24));
        assert_eq!(
            strategy.node_id(&IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x0107))),
            Some(7)
        );
        assert_eq!(NodeIdStrategy::None.node_id(&IpAddr::V4(Ipv4Addr::LOCALHOST)), None);
    }
}
