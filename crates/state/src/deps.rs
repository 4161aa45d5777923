//! Block dependencies across the chain grid.
//!
//! A block on chain `(from, to)` references `2G − 1` parents: one in-dep per
//! foreign from-group (ascending group order) followed by the `G` out-deps,
//! the tips of chains `(from, 0..G)`.  The intra-chain parent is the out-dep
//! at position `to`.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use gridchain_primitives::codec::{CodecError, Decode, Encode};
use gridchain_primitives::group::{ChainIndex, GroupIndex};

use crate::id::BlockId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DepsError {
    #[error("expected {0} deps, got {1}")]
    BadLength(usize, usize),
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary)]
pub struct BlockDeps {
    deps: Vec<BlockId>,
}

impl BlockDeps {
    pub fn expected_len(groups: u8) -> usize {
        2 * groups as usize - 1
    }

    pub fn build(deps: Vec<BlockId>, groups: u8) -> Result<Self, DepsError> {
        let want = Self::expected_len(groups);
        if deps.len() != want {
            return Err(DepsError::BadLength(want, deps.len()));
        }
        Ok(Self { deps })
    }

    /// Genesis blocks reference nothing.
    pub fn genesis() -> Self {
        Self { deps: Vec::new() }
    }

    pub fn is_genesis(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockId> {
        self.deps.iter()
    }

    fn groups(&self) -> u8 {
        ((self.deps.len() + 1) / 2) as u8
    }

    /// In-deps, one per foreign from-group in ascending group order.
    pub fn in_deps(&self) -> &[BlockId] {
        &self.deps[..self.groups() as usize - 1]
    }

    /// Out-deps, the tips of the own-group row `(from, 0..G)`.
    pub fn out_deps(&self) -> &[BlockId] {
        &self.deps[self.groups() as usize - 1..]
    }

    /// The in-dep covering foreign group `group` for a block whose own
    /// from-group is `from`.
    pub fn in_dep_for(&self, group: GroupIndex, from: GroupIndex) -> BlockId {
        debug_assert_ne!(group, from);
        let idx = if group.value() < from.value() {
            group.value()
        } else {
            group.value() - 1
        };
        self.in_deps()[idx as usize]
    }

    pub fn out_dep(&self, to: GroupIndex) -> BlockId {
        self.out_deps()[to.value() as usize]
    }

    /// The intra-chain parent.
    pub fn parent(&self, chain: ChainIndex) -> BlockId {
        self.out_dep(chain.to)
    }
}

impl Encode for BlockDeps {
    fn encode(&self, w: &mut Vec<u8>) {
        self.deps.encode(w);
    }
}

impl Decode for BlockDeps {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            deps: Vec::<BlockId>::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::buf::Buf32;

    fn id(n: u8) -> BlockId {
        BlockId(Buf32::new([n; 32]))
    }

    #[test]
    fn test_layout_two_groups() {
        // G=2: one in-dep then two out-deps.
        let deps = BlockDeps::build(vec![id(1), id(2), id(3)], 2).unwrap();
        assert_eq!(deps.in_deps(), &[id(1)]);
        assert_eq!(deps.out_deps(), &[id(2), id(3)]);

        let chain = ChainIndex::new(0, 1, 2).unwrap();
        assert_eq!(deps.parent(chain), id(3));
        assert_eq!(deps.in_dep_for(GroupIndex(1), GroupIndex(0)), id(1));
    }

    #[test]
    fn test_layout_three_groups() {
        let deps =
            BlockDeps::build((1..=5).map(id).collect(), 3).unwrap();
        // Own from-group 1: foreign groups 0 and 2 in ascending order.
        assert_eq!(deps.in_dep_for(GroupIndex(0), GroupIndex(1)), id(1));
        assert_eq!(deps.in_dep_for(GroupIndex(2), GroupIndex(1)), id(2));
        assert_eq!(deps.out_dep(GroupIndex(2)), id(5));
    }

    #[test]
    fn test_bad_length_rejected() {
        assert_eq!(
            BlockDeps::build(vec![id(1)], 2),
            Err(DepsError::BadLength(3, 1))
        );
    }
}
