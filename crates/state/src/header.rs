//! Block headers, mining targets and nonces.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use ethnum::U256;

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{CodecError, Decode, Encode};
use gridchain_primitives::group::ChainIndex;
use gridchain_primitives::hash;
use gridchain_primitives::time::Timestamp;

use crate::deps::BlockDeps;
use crate::id::BlockId;

/// Difficulty target.  A header's hash, read as a big-endian 256-bit
/// integer, must be strictly below it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Target(pub U256);

impl Target {
    pub fn max() -> Self {
        Self(U256::MAX)
    }

    pub fn value(&self) -> U256 {
        self.0
    }
}

impl BorshSerialize for Target {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.0.to_be_bytes())
    }
}

impl BorshDeserialize for Target {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut arr = [0u8; 32];
        reader.read_exact(&mut arr)?;
        Ok(Self(U256::from_be_bytes(arr)))
    }
}

impl Encode for Target {
    fn encode(&self, w: &mut Vec<u8>) {
        self.0.encode(w);
    }
}

impl Decode for Target {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self(U256::decode(r)?))
    }
}

impl<'a> Arbitrary<'a> for Target {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut arr = [0u8; 32];
        u.fill_buffer(&mut arr)?;
        Ok(Self(U256::from_be_bytes(arr)))
    }
}

/// 32-byte mining nonce, scanned as a big-endian counter.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary,
)]
pub struct Nonce(pub Buf32);

impl Nonce {
    pub fn zero() -> Self {
        Self(Buf32::zero())
    }

    pub fn from_u256(v: U256) -> Self {
        Self(Buf32::new(v.to_be_bytes()))
    }

    pub fn to_u256(&self) -> U256 {
        U256::from_be_bytes(*self.0.as_ref())
    }

    pub fn wrapping_next(&self) -> Self {
        Self::from_u256(self.to_u256().wrapping_add(U256::ONE))
    }
}

impl Encode for Nonce {
    fn encode(&self, w: &mut Vec<u8>) {
        self.0.encode(w);
    }
}

impl Decode for Nonce {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self(Buf32::decode(r)?))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary)]
pub struct BlockHeader {
    pub deps: BlockDeps,
    pub tx_merkle_root: Buf32,
    pub timestamp: Timestamp,
    pub target: Target,
    pub nonce: Nonce,
}

impl BlockHeader {
    pub fn hash(&self) -> BlockId {
        BlockId(hash::blake2b(&self.encode_to_vec()))
    }

    pub fn hash_u256(&self) -> U256 {
        U256::from_be_bytes(*self.hash().inner().as_ref())
    }

    /// Mining validity: the header hash is below its own target.
    pub fn pow_ok(&self) -> bool {
        self.hash_u256() < self.target.0
    }

    pub fn is_genesis(&self) -> bool {
        self.deps.is_genesis()
    }

    pub fn parent(&self, chain: ChainIndex) -> Option<BlockId> {
        if self.is_genesis() {
            None
        } else {
            Some(self.deps.parent(chain))
        }
    }
}

impl Encode for BlockHeader {
    fn encode(&self, w: &mut Vec<u8>) {
        self.tx_merkle_root.encode(w);
        self.timestamp.encode(w);
        self.target.encode(w);
        self.nonce.encode(w);
        self.deps.encode(w);
    }
}

impl Decode for BlockHeader {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        let tx_merkle_root = Buf32::decode(r)?;
        let timestamp = Timestamp::decode(r)?;
        let target = Target::decode(r)?;
        let nonce = Nonce::decode(r)?;
        let deps = BlockDeps::decode(r)?;
        Ok(Self {
            deps,
            tx_merkle_root,
            timestamp,
            target,
            nonce,
        })
    }
}
