//! Core value types: flow keys, cumulative snapshots and signed deltas.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// IANA protocol number for TCP
pub const PROTO_TCP: u8 = 6;
/// IANA protocol number for UDP
pub const PROTO_UDP: u8 = 17;

/// Directional five-tuple identifying a flow.
///
/// Ordering is lexicographic over source address, destination address,
/// source port, destination port and protocol, in that order. The resolver
/// relies on this ordering as its discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowKey {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}

impl FlowKey {
    pub fn new(src: IpAddr, dst: IpAddr, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        FlowKey {
            src,
            dst,
            src_port,
            dst_port,
            protocol,
        }
    }

    /// Key of the opposite direction: endpoints and ports swapped, protocol kept
    pub fn reverse(&self) -> FlowKey {
        FlowKey {
            src: self.dst,
            dst: self.src,
            src_port: self.dst_port,
            dst_port: self.src_port,
            protocol: self.protocol,
        }
    }

    /// True if `other` is this key with endpoints and ports swapped
    pub fn is_reverse_of(&self, other: &FlowKey) -> bool {
        self.reverse() == *other
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} ({})",
            self.src, self.src_port, self.dst, self.dst_port, self.protocol
        )
    }
}

/// Cumulative counters for one flow since the start of the simulation.
///
/// A snapshot only means something relative to an earlier one; the
/// all-zero `Default` is the baseline of a flow that was never seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub lost_packets: u64,
    /// Sum of one-way delays of received packets, in seconds
    pub delay_sum: f64,
    /// Sum of jitter samples of received packets, in seconds
    pub jitter_sum: f64,
}

/// Difference between two snapshots of the same flow.
///
/// Counters are signed: a monitor whose counters go backwards produces
/// negative deltas unless the caller asks for clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowDelta {
    pub tx_packets: i64,
    pub rx_packets: i64,
    pub tx_bytes: i64,
    pub rx_bytes: i64,
    pub lost_packets: i64,
    pub delay_sum: f64,
    pub jitter_sum: f64,
}

impl FlowDelta {
    /// Compute `current - previous` field by field
    pub fn between(current: &FlowSnapshot, previous: &FlowSnapshot, clamp_negative: bool) -> Self {
        let delta = FlowDelta {
            tx_packets: signed_delta(current.tx_packets, previous.tx_packets),
            rx_packets: signed_delta(current.rx_packets, previous.rx_packets),
            tx_bytes: signed_delta(current.tx_bytes, previous.tx_bytes),
            rx_bytes: signed_delta(current.rx_bytes, previous.rx_bytes),
            lost_packets: signed_delta(current.lost_packets, previous.lost_packets),
            delay_sum: current.delay_sum - previous.delay_sum,
            jitter_sum: current.jitter_sum - previous.jitter_sum,
        };

        if clamp_negative {
            delta.clamped()
        } else {
            delta
        }
    }

    /// Copy with every negative field raised to zero
    pub fn clamped(&self) -> Self {
        FlowDelta {
            tx_packets: self.tx_packets.max(0),
            rx_packets: self.rx_packets.max(0),
            tx_bytes: self.tx_bytes.max(0),
            rx_bytes: self.rx_bytes.max(0),
            lost_packets: self.lost_packets.max(0),
            delay_sum: self.delay_sum.max(0.0),
            jitter_sum: self.jitter_sum.max(0.0),
        }
    }

    /// Packets seen in either counter, saturating at the `i64` range
    pub fn packets(&self) -> i64 {
        self.tx_packets.saturating_add(self.rx_packets)
    }

    pub fn bytes(&self) -> i64 {
        self.tx_bytes.saturating_add(self.rx_bytes)
    }

    /// True if any counter went backwards
    pub fn has_regression(&self) -> bool {
        self.tx_packets < 0
            || self.rx_packets < 0
            || self.tx_bytes < 0
            || self.rx_bytes < 0
            || self.lost_packets < 0
            || self.delay_sum < 0.0
            || self.jitter_sum < 0.0
    }
}

fn signed_delta(current: u64, previous: u64) -> i64 {
    if current >= previous {
        i64::try_from(current - previous).unwrap_or(i64::MAX)
    } else {
        -i64::try_from(previous - current).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn key(a: u8, b: u8, sp: u16, dp: u16) -> FlowKey {
        FlowKey::new(
            IpAddr::V4(Ipv4Addr::new(10, 1, 1, a)),
            IpAddr::V4(Ipv4Addr::new(10, 1, 1, b)),
            sp,
            dp,
            PROTO_UDP,
        )
    }

    #[test]
    fn test_reverse_swaps_endpoints_and_ports() {
        let k = key(1, 2, 49153, 1001);
        let r = k.reverse();
        assert_eq!(r, key(2, 1, 1001, 49153));
        assert!(k.is_reverse_of(&r));
        assert!(r.is_reverse_of(&k));
        assert_eq!(r.reverse(), k);
    }

    #[test]
    fn test_reverse_requires_same_protocol() {
        let k = key(1, 2, 49153, 1001);
        let mut r = k.reverse();
        r.protocol = PROTO_TCP;
        assert!(!k.is_reverse_of(&r));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        // Source address dominates everything after it
        assert!(key(1, 9, 9, 9) < key(2, 1, 1, 1));
        // Then destination, then ports
        assert!(key(1, 2, 9, 9) < key(1, 3, 1, 1));
        assert!(key(1, 2, 1, 9) < key(1, 2, 2, 1));
        assert!(key(1, 2, 1, 1) < key(1, 2, 1, 2));

        let mut tcp = key(1, 2, 1, 1);
        tcp.protocol = PROTO_TCP;
        assert!(tcp < key(1, 2, 1, 1));
    }

    #[test]
    fn test_delta_from_zero_baseline_equals_raw_counters() {
        let cur = FlowSnapshot {
            tx_packets: 10,
            rx_packets: 9,
            tx_bytes: 500,
            rx_bytes: 450,
            lost_packets: 1,
            delay_sum: 0.02,
            jitter_sum: 0.001,
        };
        let d = FlowDelta::between(&cur, &FlowSnapshot::default(), false);
        assert_eq!(d.tx_packets, 10);
        assert_eq!(d.rx_packets, 9);
        assert_eq!(d.tx_bytes, 500);
        assert_eq!(d.rx_bytes, 450);
        assert_eq!(d.lost_packets, 1);
        assert_eq!(d.delay_sum, 0.02);
        assert_eq!(d.packets(), 19);
        assert_eq!(d.bytes(), 950);
        assert!(!d.has_regression());
    }

    #[test]
    fn test_regression_is_negative_unless_clamped() {
        let prev = FlowSnapshot { tx_packets: 100, tx_bytes: 5000, ..Default::default() };
        let cur = FlowSnapshot { tx_packets: 40, tx_bytes: 2000, ..Default::default() };

        let raw = FlowDelta::between(&cur, &prev, false);
        assert_eq!(raw.tx_packets, -60);
        assert_eq!(raw.tx_bytes, -3000);
        assert!(raw.has_regression());

        let clamped = FlowDelta::between(&cur, &prev, true);
        assert_eq!(clamped.tx_packets, 0);
        assert_eq!(clamped.tx_bytes, 0);
        assert!(!clamped.has_regression());
    }

    #[test]
    fn test_totals_saturate_on_huge_counters() {
        let cur = FlowSnapshot {
            tx_packets: u64::MAX,
            rx_packets: u64::MAX,
            tx_bytes: u64::MAX,
            rx_bytes: u64::MAX,
            ..Default::default()
        };
        let d = FlowDelta::between(&cur, &FlowSnapshot::default(), false);
        assert_eq!(d.packets(), i64::MAX);
        assert_eq!(d.bytes(), i64::MAX);

        let back = FlowDelta::between(&FlowSnapshot::default(), &cur, false);
        assert_eq!(back.packets(), i64::MIN);
    }

    #[test]
    fn test_signed_delta_saturates() {
        assert_eq!(signed_delta(u64::MAX, 0), i64::MAX);
        assert_eq!(signed_delta(0, u64::MAX), -i64::MAX);
        assert_eq!(signed_delta(7, 7), 0);
    }
}
