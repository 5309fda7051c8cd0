//! Virtual-time helpers.
//!
//! Window boundaries are accumulated in floating point (`start += size`), so
//! comparing them against sample times exported by a simulator needs a small
//! tolerance: ten windows of 0.1 do not add up to exactly 1.0.

use std::time::Duration;

/// Simulation time in seconds since the start of the run
pub type SimTime = f64;

/// Relative tolerance used when comparing accumulated times
const TIME_EPSILON: f64 = 1e-9;

/// True if `a` is at or before `b`, allowing for accumulated rounding error
pub fn at_or_before(a: SimTime, b: SimTime) -> bool {
    a <= b + TIME_EPSILON * b.abs().max(1.0)
}

/// Convert a configured duration to simulation seconds
pub fn duration_to_sim_time(duration: Duration) -> SimTime {
    duration.as_secs_f64()
}

/// Round a time to whole nanoseconds, the simulator's clock resolution
pub fn sim_time_to_nanos(t: SimTime) -> u64 {
    (t * 1e9).round() as u64
}

pub fn nanos_to_sim_time(nanos: u64) -> SimTime {
    nanos as f64 / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_or_before_tolerates_accumulation() {
        let mut t = 0.0;
        for _ in 0..10 {
            t += 0.1;
        }
        assert_ne!(t, 1.0);
        assert!(at_or_before(1.0, t));
        assert!(at_or_before(t, 1.0));
        assert!(!at_or_before(1.1, 1.0));
        assert!(at_or_before(0.5, 1.0));
    }

    #[test]
    fn test_nanosecond_grid() {
        assert_eq!(sim_time_to_nanos(0.1), 100_000_000);
        assert_eq!(sim_time_to_nanos(1e-10), 0);
        // 3 * 0.1 in floating point is not 0.3, on the grid it is
        assert_ne!(3.0 * 0.1, 0.3);
        assert_eq!(nanos_to_sim_time(3 * sim_time_to_nanos(0.1)), 0.3);
    }

    #[test]
    fn test_duration_to_sim_time() {
        assert_eq!(duration_to_sim_time(Duration::from_secs(20)), 20.0);
        assert_eq!(duration_to_sim_time(Duration::from_millis(250)), 0.25);
    }
}
