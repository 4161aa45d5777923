//! Group and chain index arithmetic for the block flow grid.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use crate::buf::Buf32;
use crate::codec::{read_varint, write_varint, CodecError, Decode, Encode};
use crate::hash;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("group {0} out of range (group count {1})")]
    GroupOutOfRange(u8, u8),

    #[error("broker range {0}..{1} invalid for {2} groups")]
    BadBrokerRange(u8, u8, u8),
}

/// Index of a group, in `[0, group count)`.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct GroupIndex(pub u8);

impl GroupIndex {
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for GroupIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one of the `G²` chains in the flow: the chain carrying
/// transactions from `from` to `to`.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct ChainIndex {
    pub from: GroupIndex,
    pub to: GroupIndex,
}

impl ChainIndex {
    pub fn new(from: u8, to: u8, groups: u8) -> Result<Self, GroupError> {
        if from >= groups {
            return Err(GroupError::GroupOutOfRange(from, groups));
        }
        if to >= groups {
            return Err(GroupError::GroupOutOfRange(to, groups));
        }
        Ok(Self {
            from: GroupIndex(from),
            to: GroupIndex(to),
        })
    }

    /// Canonical row-major position, `from * G + to`.
    pub fn flat_index(&self, groups: u8) -> usize {
        self.from.0 as usize * groups as usize + self.to.0 as usize
    }

    pub fn from_flat_index(idx: usize, groups: u8) -> Self {
        let g = groups as usize;
        Self {
            from: GroupIndex((idx / g) as u8),
            to: GroupIndex((idx % g) as u8),
        }
    }

    pub fn is_intra_group(&self) -> bool {
        self.from == self.to
    }

    /// Iterates all `G²` chain indexes in canonical row-major order.
    pub fn all(groups: u8) -> impl Iterator<Item = ChainIndex> {
        (0..groups).flat_map(move |from| {
            (0..groups).map(move |to| ChainIndex {
                from: GroupIndex(from),
                to: GroupIndex(to),
            })
        })
    }
}

impl std::fmt::Display for ChainIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

impl Encode for ChainIndex {
    fn encode(&self, w: &mut Vec<u8>) {
        write_varint(w, self.from.0 as u64);
        write_varint(w, self.to.0 as u64);
    }
}

impl Decode for ChainIndex {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        let from = read_varint(r)?;
        let to = read_varint(r)?;
        if from > u8::MAX as u64 || to > u8::MAX as u64 {
            return Err(CodecError::InvalidValue("chain index"));
        }
        Ok(Self {
            from: GroupIndex(from as u8),
            to: GroupIndex(to as u8),
        })
    }
}

/// The contiguous group range a broker is responsible for.  A broker stores
/// full blocks exactly for the chains it relates to and headers for the rest.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BrokerConfig {
    broker_from: GroupIndex,
    broker_until: GroupIndex,
}

impl BrokerConfig {
    pub fn new(broker_from: u8, broker_until: u8, groups: u8) -> Result<Self, GroupError> {
        if broker_from >= broker_until || broker_until > groups {
            return Err(GroupError::BadBrokerRange(broker_from, broker_until, groups));
        }
        Ok(Self {
            broker_from: GroupIndex(broker_from),
            broker_until: GroupIndex(broker_until),
        })
    }

    pub fn contains_group(&self, group: GroupIndex) -> bool {
        self.broker_from.0 <= group.0 && group.0 < self.broker_until.0
    }

    /// Whether this broker stores full blocks for the chain.
    pub fn relates_to(&self, chain: ChainIndex) -> bool {
        self.contains_group(chain.from) || self.contains_group(chain.to)
    }
}

/// Maps a public key to its group by the low byte of the key hash.
pub fn pub_key_to_group(pk_bytes: &[u8], groups: u8) -> GroupIndex {
    let digest = hash::blake2b(pk_bytes);
    GroupIndex(digest.as_slice()[Buf32::LEN - 1] % groups)
}
