//! Bounded buffer for blocks whose parent has not arrived yet.

use std::collections::{HashMap, VecDeque};

use gridchain_primitives::group::ChainIndex;
use gridchain_state::block::Block;
use gridchain_state::header::BlockHeader;
use gridchain_state::id::BlockId;

#[derive(Clone, Debug)]
pub enum OrphanItem {
    Block(ChainIndex, Block),
    Header(ChainIndex, BlockHeader),
}

impl OrphanItem {
    pub fn id(&self) -> BlockId {
        match self {
            Self::Block(_, b) => b.hash(),
            Self::Header(_, h) => h.hash(),
        }
    }
}

/// Parks items keyed by the missing hash.  Oldest entries are evicted first
/// once the cap is reached.
pub struct OrphanBuffer {
    cap: usize,
    by_missing: HashMap<BlockId, Vec<OrphanItem>>,
    arrival: VecDeque<(BlockId, BlockId)>,
}

impl OrphanBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            by_missing: HashMap::new(),
            arrival: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.arrival.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrival.is_empty()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.arrival.iter().any(|(_, oid)| oid == id)
    }

    pub fn insert(&mut self, missing: BlockId, item: OrphanItem) {
        let id = item.id();
        if self.contains(&id) {
            return;
        }

        while self.arrival.len() >= self.cap {
            let Some((evict_missing, evict_id)) = self.arrival.pop_front() else {
                break;
            };
            if let Some(items) = self.by_missing.get_mut(&evict_missing) {
                items.retain(|it| it.id() != evict_id);
                if items.is_empty() {
                    self.by_missing.remove(&evict_missing);
                }
            }
        }

        self.by_missing.entry(missing).or_default().push(item);
        self.arrival.push_back((missing, id));
    }

    /// Removes and returns everything parked on `resolved`.
    pub fn take_dependents(&mut self, resolved: &BlockId) -> Vec<OrphanItem> {
        let Some(items) = self.by_missing.remove(resolved) else {
            return Vec::new();
        };
        self.arrival.retain(|(missing, _)| missing != resolved);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_state::block::genesis_block;

    fn item(n: u8) -> OrphanItem {
        let chain = ChainIndex::new(n % 2, 0, 2).unwrap();
        let mut block = genesis_block(chain);
        block.header.timestamp = gridchain_primitives::time::Timestamp(n as u128);
        OrphanItem::Block(chain, block)
    }

    fn missing(n: u8) -> BlockId {
        BlockId(gridchain_primitives::buf::Buf32::new([n; 32]))
    }

    #[test]
    fn test_park_and_resolve() {
        let mut buf = OrphanBuffer::new(8);
        buf.insert(missing(1), item(1));
        buf.insert(missing(1), item(2));
        buf.insert(missing(2), item(3));

        assert_eq!(buf.len(), 3);
        let resolved = buf.take_dependents(&missing(1));
        assert_eq!(resolved.len(), 2);
        assert_eq!(buf.len(), 1);
        assert!(buf.take_dependents(&missing(1)).is_empty());
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut buf = OrphanBuffer::new(2);
        buf.insert(missing(1), item(1));
        buf.insert(missing(2), item(2));
        buf.insert(missing(3), item(3));

        assert_eq!(buf.len(), 2);
        assert!(buf.take_dependents(&missing(1)).is_empty());
        assert_eq!(buf.take_dependents(&missing(2)).len(), 1);
        assert_eq!(buf.take_dependents(&missing(3)).len(), 1);
    }

    #[test]
    fn test_duplicate_ignored() {
        let mut buf = OrphanBuffer::new(4);
        buf.insert(missing(1), item(1));
        buf.insert(missing(1), item(1));
        assert_eq!(buf.len(), 1);
    }
}
