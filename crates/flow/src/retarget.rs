//! Difficulty retargeting.
//!
//! The exact formula is a per-network choice, so the flow takes it as a
//! strategy object.  The shipped strategy scales the current target by the
//! observed block interval over a sliding window.

use ethnum::U256;

use gridchain_primitives::params::Params;
use gridchain_primitives::time::Timestamp;
use gridchain_state::header::Target;

pub trait RetargetStrategy: Send + Sync {
    /// Computes the target for the next block from the recent timestamps of
    /// the canonical chain, newest first.
    fn next_target(&self, recent: &[Timestamp], current: Target, params: &Params) -> Target;
}

/// Sliding-window mean interval retargeting, adjustment clamped to 4x in
/// either direction per step.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowedMeanRetarget;

impl RetargetStrategy for WindowedMeanRetarget {
    fn next_target(&self, recent: &[Timestamp], current: Target, params: &Params) -> Target {
        let ceiling = params.max_mining_target();
        let current = current.0.min(ceiling);

        if recent.len() < 2 {
            return Target(current);
        }

        let newest = recent[0];
        let oldest = recent[recent.len() - 1];
        let expected = params.block_target_time_ms() as u128 * (recent.len() as u128 - 1);
        let actual = newest
            .saturating_elapsed_since(oldest)
            .clamp(expected / 4, expected * 4)
            .max(1);

        let scaled = current / U256::from(expected as u64).max(U256::ONE)
            * U256::from(actual as u64);
        Target(scaled.max(U256::ONE).min(ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::group::{BrokerConfig, GroupIndex};

    fn params() -> Params {
        let broker = BrokerConfig::new(0, 2, 2).unwrap();
        Params::standard(2, broker, GroupIndex(0))
    }

    fn window(interval_ms: u64, len: usize) -> Vec<Timestamp> {
        // Newest first.
        (0..len)
            .map(|i| Timestamp(((len - 1 - i) as u64 * interval_ms) as u128 + 1))
            .collect()
    }

    #[test]
    fn test_on_pace_keeps_target() {
        let p = params();
        // Window of 17 entries spans 16 intervals; pick a target the span
        // divides so the scaling is exact.
        let expected_span = p.block_target_time_ms() * 16;
        let current = Target(U256::from(expected_span) << 64);
        let next =
            WindowedMeanRetarget.next_target(&window(p.block_target_time_ms(), 17), current, &p);
        assert_eq!(next, current);
    }

    #[test]
    fn test_fast_blocks_tighten_target() {
        let p = params();
        let current = Target(p.max_mining_target() >> 8);
        let next = WindowedMeanRetarget.next_target(
            &window(p.block_target_time_ms() / 10, 17),
            current,
            &p,
        );
        assert!(next.0 < current.0);
        // Clamped to roughly a quarter at most.
        assert!(next.0 >= current.0 / 5);
    }

    #[test]
    fn test_slow_blocks_loosen_target_within_ceiling() {
        let p = params();
        let current = Target(p.max_mining_target() >> 8);
        let next = WindowedMeanRetarget.next_target(
            &window(p.block_target_time_ms() * 100, 17),
            current,
            &p,
        );
        assert!(next.0 > current.0);
        assert!(next.0 <= p.max_mining_target());
    }

    #[test]
    fn test_short_window_passthrough() {
        let p = params();
        let current = Target(U256::MAX);
        let next = WindowedMeanRetarget.next_target(&[Timestamp(5)], current, &p);
        // Still clamped by the difficulty floor.
        assert_eq!(next.0, p.max_mining_target());
    }
}
