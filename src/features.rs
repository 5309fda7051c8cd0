//! Per-window feature derivation.
//!
//! Rates divide by the window size. The "flow" rates only count the forward
//! direction, while `pkts_per_sec` and `bytes_per_sec` count both.

use crate::flow::ResolvedFlow;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowFeatures {
    pub total_pkts_fwd: i64,
    pub total_pkts_bwd: i64,
    pub total_bytes_fwd: i64,
    pub total_bytes_bwd: i64,
    pub pkts_per_sec: f64,
    pub bytes_per_sec: f64,
    pub flow_pkts_per_sec: f64,
    pub flow_bytes_per_sec: f64,
    /// Mean one-way delay over packets received in both directions, milliseconds
    pub delay_ms: f64,
    /// Mean jitter over packets received in both directions, milliseconds
    pub jitter_ms: f64,
    /// Mean bytes per packet across both directions
    pub packet_size: f64,
    /// Received packets in both directions, the denominator of the delay means
    pub rx_packets_all: i64,
    pub lost_packets: i64,
}

impl FlowFeatures {
    /// Derive features for one resolved flow over a window of `window_size`.
    ///
    /// `window_size` is validated positive at configuration time.
    pub fn compute(flow: &ResolvedFlow, window_size: f64) -> Self {
        let fwd = &flow.forward;
        let bwd = &flow.backward;

        let total_pkts_fwd = fwd.packets();
        let total_pkts_bwd = bwd.packets();
        let total_bytes_fwd = fwd.bytes();
        let total_bytes_bwd = bwd.bytes();

        let pkts_all = total_pkts_fwd.saturating_add(total_pkts_bwd);
        let bytes_all = total_bytes_fwd.saturating_add(total_bytes_bwd);

        let rx_packets_all = fwd.rx_packets.saturating_add(bwd.rx_packets);
        let delay_delta = fwd.delay_sum + bwd.delay_sum;
        let jitter_delta = fwd.jitter_sum + bwd.jitter_sum;

        let (delay_ms, jitter_ms) = if rx_packets_all > 0 {
            (
                1000.0 * delay_delta / rx_packets_all as f64,
                1000.0 * jitter_delta / rx_packets_all as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let packet_size = if pkts_all > 0 {
            bytes_all as f64 / pkts_all as f64
        } else {
            0.0
        };

        FlowFeatures {
            total_pkts_fwd,
            total_pkts_bwd,
            total_bytes_fwd,
            total_bytes_bwd,
            pkts_per_sec: pkts_all as f64 / window_size,
            bytes_per_sec: bytes_all as f64 / window_size,
            flow_pkts_per_sec: total_pkts_fwd as f64 / window_size,
            flow_bytes_per_sec: total_bytes_fwd as f64 / window_size,
            delay_ms,
            jitter_ms,
            packet_size,
            rx_packets_all,
            lost_packets: fwd.lost_packets.saturating_add(bwd.lost_packets),
        }
    }
}
