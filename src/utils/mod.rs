//! Shared utilities: virtual-time helpers.

pub mod time;

pub use time::{at_or_before, duration_to_sim_time, nanos_to_sim_time, sim_time_to_nanos, SimTime};
