//! Node-wide consensus and operation parameters.
//!
//! One immutable value built at startup and threaded explicitly through
//! construction.  Nothing in the node reads configuration globals.

use ethnum::U256;

use crate::group::{BrokerConfig, GroupError, GroupIndex};

/// Parameters that are fixed per deployment.
#[derive(Clone, Debug)]
pub struct Params {
    /// Group count `G`.  The flow has `G²` chains.
    groups: u8,

    /// The group range this broker owns.
    broker: BrokerConfig,

    /// Group this node mines for.  Must be owned by the broker.
    main_group: GroupIndex,

    /// Target block interval per chain, in milliseconds.
    block_target_time_ms: u64,

    /// Number of recent timestamps the retargeter looks at.
    retarget_window: usize,

    /// Difficulty floor: accepted hashes carry at least this many leading
    /// zero bits.
    num_zeros_at_least_in_hash: u32,

    /// Tip sets are pruned every this many insertions on a chain.
    tips_prune_interval: u64,

    /// Tips older than this are discarded if dominated.
    tips_prune_duration_ms: u64,

    /// Nonces a mining worker scans per slice.
    nonce_step: u64,

    /// Orphan blocks parked waiting for a parent, across all chains.
    orphan_buffer_cap: usize,
}

impl Params {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        groups: u8,
        broker: BrokerConfig,
        main_group: GroupIndex,
        block_target_time_ms: u64,
        retarget_window: usize,
        num_zeros_at_least_in_hash: u32,
        tips_prune_interval: u64,
        nonce_step: u64,
        orphan_buffer_cap: usize,
    ) -> Result<Self, GroupError> {
        if main_group.value() >= groups {
            return Err(GroupError::GroupOutOfRange(main_group.value(), groups));
        }
        assert!(
            broker.contains_group(main_group),
            "params: main group outside broker range"
        );
        Ok(Self {
            groups,
            broker,
            main_group,
            block_target_time_ms,
            retarget_window,
            num_zeros_at_least_in_hash,
            tips_prune_interval,
            tips_prune_duration_ms: block_target_time_ms * tips_prune_interval,
            nonce_step,
            orphan_buffer_cap,
        })
    }

    /// A small-network parameter set used by tests and the dev node.
    pub fn standard(groups: u8, broker: BrokerConfig, main_group: GroupIndex) -> Self {
        Self::new(groups, broker, main_group, 1000, 17, 1, 32, 20_000, 128)
            .expect("params: standard")
    }

    pub fn groups(&self) -> u8 {
        self.groups
    }

    pub fn chain_count(&self) -> usize {
        self.groups as usize * self.groups as usize
    }

    pub fn broker(&self) -> &BrokerConfig {
        &self.broker
    }

    pub fn main_group(&self) -> GroupIndex {
        self.main_group
    }

    pub fn block_target_time_ms(&self) -> u64 {
        self.block_target_time_ms
    }

    pub fn retarget_window(&self) -> usize {
        self.retarget_window
    }

    pub fn num_zeros_at_least_in_hash(&self) -> u32 {
        self.num_zeros_at_least_in_hash
    }

    /// Largest target any chain may mine against, derived from the
    /// difficulty floor.
    pub fn max_mining_target(&self) -> U256 {
        U256::MAX >> self.num_zeros_at_least_in_hash
    }

    pub fn tips_prune_interval(&self) -> u64 {
        self.tips_prune_interval
    }

    pub fn tips_prune_duration_ms(&self) -> u64 {
        self.tips_prune_duration_ms
    }

    pub fn nonce_step(&self) -> u64 {
        self.nonce_step
    }

    pub fn orphan_buffer_cap(&self) -> usize {
        self.orphan_buffer_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_params() {
        let broker = BrokerConfig::new(0, 2, 2).unwrap();
        let params = Params::standard(2, broker, GroupIndex(0));
        assert_eq!(params.chain_count(), 4);
        assert_eq!(
            params.tips_prune_duration_ms(),
            params.block_target_time_ms() * params.tips_prune_interval()
        );
    }

    #[test]
    fn test_max_target_floor() {
        let broker = BrokerConfig::new(0, 2, 2).unwrap();
        let params = Params::standard(2, broker, GroupIndex(1));
        assert_eq!(params.max_mining_target(), U256::MAX >> 1);
    }

    #[test]
    fn test_rejects_main_group_out_of_range() {
        let broker = BrokerConfig::new(0, 2, 2).unwrap();
        assert!(Params::new(2, broker, GroupIndex(5), 1000, 17, 1, 32, 1000, 64).is_err());
    }
}
