//! Sync locators and inventories.
//!
//! Locators walk a chain tip-down with exponentially widening gaps, always
//! ending at genesis.  Inventories answer with the best-chain hashes above
//! the highest locator both sides share.

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::ChainIndex;
use gridchain_state::id::BlockId;

use crate::flow::BlockFlow;

impl BlockFlow {
    /// Per-chain skip lists, canonical row-major order.
    pub fn get_sync_locators(&self) -> Vec<Vec<Buf32>> {
        let groups = self.params().groups();
        ChainIndex::all(groups)
            .map(|chain| self.chain_locators(chain))
            .collect()
    }

    fn chain_locators(&self, chain: ChainIndex) -> Vec<Buf32> {
        let dag = self.dag(chain);
        let tip = self.best_tip(chain);
        let height = dag.height_of(&tip).expect("locator: tip height");

        let mut out = Vec::new();
        let mut distance = 0u64;
        let mut step = 1u64;
        loop {
            if distance >= height {
                break;
            }
            let id = dag
                .ancestor_at(&tip, distance)
                .expect("locator: ancestor walk");
            out.push(*id.inner());
            distance += step;
            step *= 2;
        }
        out.push(*dag.genesis().inner());
        out
    }

    /// For each chain, the hashes the peer is missing, oldest first.  Empty
    /// everywhere means the peer shares our best tips.
    pub fn get_sync_inventories(&self, locators: &[Vec<Buf32>]) -> Vec<Vec<Buf32>> {
        let groups = self.params().groups();
        ChainIndex::all(groups)
            .map(|chain| {
                let peer = locators
                    .get(chain.flat_index(groups))
                    .map(|v| v.as_slice())
                    .unwrap_or(&[]);
                self.chain_inventory(chain, peer)
            })
            .collect()
    }

    fn chain_inventory(&self, chain: ChainIndex, peer_locators: &[Buf32]) -> Vec<Buf32> {
        let dag = self.dag(chain);
        let tip = self.best_tip(chain);

        // Locators arrive tip-down, so the first known one on our best
        // chain is the deepest shared point.
        let shared = peer_locators
            .iter()
            .map(|raw| BlockId(*raw))
            .find(|id| dag.contains(id) && dag.is_ancestor(id, &tip))
            .unwrap_or_else(|| dag.genesis());

        let mut missing = Vec::new();
        let mut at = tip;
        while at != shared {
            missing.push(*at.inner());
            let Some(parent) = dag.entry(&at).and_then(|e| e.parent) else {
                break;
            };
            at = parent;
        }
        missing.reverse();
        missing
    }
}
