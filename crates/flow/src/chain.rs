//! Single-chain header DAG.
//!
//! Tracks the tree of headers sharing one chain index.  Forks are allowed;
//! every entry's intra-chain parent is present.  Weights live at the flow
//! level since they reach across chains.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::time::Timestamp;
use gridchain_state::header::Target;
use gridchain_state::id::BlockId;

/// Entry relating a block with its immediate relatives.
pub struct BlockEntry {
    pub parent: Option<BlockId>,
    pub children: HashSet<BlockId>,
    pub height: u64,
    pub timestamp: Timestamp,
    pub target: Target,
}

pub struct ChainDag {
    chain: ChainIndex,
    genesis: BlockId,
    entries: HashMap<BlockId, BlockEntry>,
    tips: HashSet<BlockId>,

    /// Insertions since construction, drives periodic tip pruning.
    insert_count: u64,
}

impl ChainDag {
    pub fn new(chain: ChainIndex, genesis: BlockId, genesis_target: Target) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            genesis,
            BlockEntry {
                parent: None,
                children: HashSet::new(),
                height: 0,
                timestamp: Timestamp::zero(),
                target: genesis_target,
            },
        );

        let mut tips = HashSet::new();
        tips.insert(genesis);
        Self {
            chain,
            genesis,
            entries,
            tips,
            insert_count: 0,
        }
    }

    pub fn chain(&self) -> ChainIndex {
        self.chain
    }

    pub fn genesis(&self) -> BlockId {
        self.genesis
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entry(&self, id: &BlockId) -> Option<&BlockEntry> {
        self.entries.get(id)
    }

    pub fn height_of(&self, id: &BlockId) -> Option<u64> {
        self.entries.get(id).map(|e| e.height)
    }

    pub fn tips_iter(&self) -> impl Iterator<Item = &BlockId> {
        self.tips.iter()
    }

    pub fn insert_count(&self) -> u64 {
        self.insert_count
    }

    /// Attaches a block under its parent.  Returns whether it forked off a
    /// new tip rather than advancing one.
    pub fn attach(
        &mut self,
        id: BlockId,
        parent: BlockId,
        timestamp: Timestamp,
        target: Target,
    ) -> bool {
        if self.entries.contains_key(&id) {
            warn!(%id, chain = %self.chain, "block already attached");
            return false;
        }

        let parent_height = {
            let parent_ent = self
                .entries
                .get_mut(&parent)
                .expect("chain: attach without parent");
            parent_ent.children.insert(id);
            parent_ent.height
        };

        self.entries.insert(
            id,
            BlockEntry {
                parent: Some(parent),
                children: HashSet::new(),
                height: parent_height + 1,
                timestamp,
                target,
            },
        );

        self.insert_count += 1;

        let did_replace = self.tips.remove(&parent);
        self.tips.insert(id);
        !did_replace
    }

    /// Whether `anc` lies on the parent path of `desc` (or equals it).
    pub fn is_ancestor(&self, anc: &BlockId, desc: &BlockId) -> bool {
        let Some(anc_height) = self.height_of(anc) else {
            return false;
        };
        let mut at = *desc;
        loop {
            let Some(ent) = self.entries.get(&at) else {
                return false;
            };
            if ent.height < anc_height {
                return false;
            }
            if ent.height == anc_height {
                return at == *anc;
            }
            let Some(parent) = ent.parent else {
                return false;
            };
            at = parent;
        }
    }

    /// The block at `distance` steps above `from` along parent links.
    pub fn ancestor_at(&self, from: &BlockId, distance: u64) -> Option<BlockId> {
        let mut at = *from;
        for _ in 0..distance {
            at = self.entries.get(&at)?.parent?;
        }
        Some(at)
    }

    /// Drops dominated tips that have aged out.  `best` stays regardless.
    pub fn prune_tips(&mut self, best: BlockId, newest: Timestamp, max_age_ms: u64) {
        let entries = &self.entries;
        self.tips.retain(|tip| {
            if *tip == best {
                return true;
            }
            let Some(ent) = entries.get(tip) else {
                return false;
            };
            ent.timestamp.plus_millis(max_age_ms) >= newest
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::buf::Buf32;

    fn id(n: u8) -> BlockId {
        BlockId(Buf32::new([n; 32]))
    }

    fn dag() -> ChainDag {
        ChainDag::new(
            ChainIndex::new(0, 0, 2).unwrap(),
            id(0),
            Target::max(),
        )
    }

    #[test]
    fn test_attach_advances_tip() {
        let mut dag = dag();
        let forked = dag.attach(id(1), id(0), Timestamp(1), Target::max());
        assert!(!forked);
        assert_eq!(dag.height_of(&id(1)), Some(1));
        assert_eq!(dag.tips_iter().collect::<Vec<_>>(), vec![&id(1)]);
    }

    #[test]
    fn test_fork_creates_second_tip() {
        let mut dag = dag();
        dag.attach(id(1), id(0), Timestamp(1), Target::max());
        let forked = dag.attach(id(2), id(0), Timestamp(1), Target::max());
        assert!(forked);
        assert_eq!(dag.tips_iter().count(), 2);
    }

    #[test]
    fn test_is_ancestor() {
        let mut dag = dag();
        dag.attach(id(1), id(0), Timestamp(1), Target::max());
        dag.attach(id(2), id(1), Timestamp(2), Target::max());
        dag.attach(id(3), id(0), Timestamp(1), Target::max());

        assert!(dag.is_ancestor(&id(0), &id(2)));
        assert!(dag.is_ancestor(&id(1), &id(2)));
        assert!(dag.is_ancestor(&id(2), &id(2)));
        assert!(!dag.is_ancestor(&id(3), &id(2)));
        assert!(!dag.is_ancestor(&id(2), &id(1)));
    }

    #[test]
    fn test_ancestor_at() {
        let mut dag = dag();
        dag.attach(id(1), id(0), Timestamp(1), Target::max());
        dag.attach(id(2), id(1), Timestamp(2), Target::max());
        assert_eq!(dag.ancestor_at(&id(2), 0), Some(id(2)));
        assert_eq!(dag.ancestor_at(&id(2), 2), Some(id(0)));
        assert_eq!(dag.ancestor_at(&id(2), 3), None);
    }

    #[test]
    fn test_prune_tips_drops_stale_fork() {
        let mut dag = dag();
        dag.attach(id(1), id(0), Timestamp(1_000), Target::max());
        dag.attach(id(2), id(0), Timestamp(10_000), Target::max());

        dag.prune_tips(id(2), Timestamp(10_000), 2_000);
        let tips: Vec<_> = dag.tips_iter().collect();
        assert_eq!(tips, vec![&id(2)]);
    }
}
