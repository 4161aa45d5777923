//! Transactions and their wire forms.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{CodecError, Decode, Encode};
use gridchain_primitives::crypto::Signature;
use gridchain_primitives::hash;

use crate::id::TxId;

/// Base coinbase payout, before any fee accounting.
pub const BLOCK_REWARD: u64 = 5_000_000_000;

/// Reference to a spendable output.  The short key leads the wire encoding
/// so trie prefix scans can group outputs by owner cheaply.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary,
)]
pub struct TxOutputPoint {
    pub short_key: u32,
    pub tx_id: Buf32,
    pub output_index: u32,
}

impl Encode for TxOutputPoint {
    fn encode(&self, w: &mut Vec<u8>) {
        self.short_key.encode(w);
        self.tx_id.encode(w);
        self.output_index.encode(w);
    }
}

impl Decode for TxOutputPoint {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            short_key: u32::decode(r)?,
            tx_id: Buf32::decode(r)?,
            output_index: u32::decode(r)?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary)]
pub struct TxOutput {
    pub amount: u64,
    pub lock_script_hash: Buf32,
    pub tokens: Vec<(Buf32, u64)>,
}

impl Encode for TxOutput {
    fn encode(&self, w: &mut Vec<u8>) {
        self.amount.encode(w);
        self.lock_script_hash.encode(w);
        self.tokens.encode(w);
    }
}

impl Decode for TxOutput {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            amount: u64::decode(r)?,
            lock_script_hash: Buf32::decode(r)?,
            tokens: Vec::decode(r)?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary)]
pub struct UnsignedTx {
    pub inputs: Vec<TxOutputPoint>,
    pub outputs: Vec<TxOutput>,
}

impl UnsignedTx {
    /// The tx id hashes only the unsigned part, so signatures never
    /// influence it.
    pub fn id(&self) -> TxId {
        TxId(hash::blake2b(&self.encode_to_vec()))
    }
}

impl Encode for UnsignedTx {
    fn encode(&self, w: &mut Vec<u8>) {
        self.inputs.encode(w);
        self.outputs.encode(w);
    }
}

impl Decode for UnsignedTx {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            inputs: Vec::decode(r)?,
            outputs: Vec::decode(r)?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary)]
pub struct Transaction {
    pub unsigned: UnsignedTx,
    pub signatures: Vec<Signature>,
}

impl Transaction {
    pub fn id(&self) -> TxId {
        self.unsigned.id()
    }

    /// A coinbase spends nothing.
    pub fn is_coinbase(&self) -> bool {
        self.unsigned.inputs.is_empty()
    }

    /// The coinbase paying the block reward to `lock_script_hash`.
    pub fn coinbase(lock_script_hash: Buf32) -> Self {
        Self {
            unsigned: UnsignedTx {
                inputs: Vec::new(),
                outputs: vec![TxOutput {
                    amount: BLOCK_REWARD,
                    lock_script_hash,
                    tokens: Vec::new(),
                }],
            },
            signatures: Vec::new(),
        }
    }
}

impl Encode for Transaction {
    fn encode(&self, w: &mut Vec<u8>) {
        self.unsigned.encode(w);
        self.signatures.encode(w);
    }
}

impl Decode for Transaction {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            unsigned: UnsignedTx::decode(r)?,
            signatures: Vec::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::buf::Buf64;

    fn sample_tx() -> Transaction {
        Transaction {
            unsigned: UnsignedTx {
                inputs: vec![TxOutputPoint {
                    short_key: 7,
                    tx_id: Buf32::new([1; 32]),
                    output_index: 0,
                }],
                outputs: vec![TxOutput {
                    amount: 100,
                    lock_script_hash: Buf32::new([2; 32]),
                    tokens: vec![(Buf32::new([3; 32]), 5)],
                }],
            },
            signatures: vec![Signature(Buf64::new([9; 64]))],
        }
    }

    #[test]
    fn test_wire_roundtrip() {
        let tx = sample_tx();
        assert_eq!(Transaction::decode_exact(&tx.encode_to_vec()).unwrap(), tx);
    }

    #[test]
    fn test_output_point_short_key_leads() {
        let op = TxOutputPoint {
            short_key: 0x01020304,
            tx_id: Buf32::zero(),
            output_index: 0,
        };
        let bytes = op.encode_to_vec();
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        assert_eq!(bytes.len(), 40);
    }

    #[test]
    fn test_id_ignores_signatures() {
        let mut tx = sample_tx();
        let id = tx.id();
        tx.signatures.clear();
        assert_eq!(tx.id(), id);
    }

    #[test]
    fn test_coinbase_has_no_inputs() {
        assert!(Transaction::coinbase(Buf32::zero()).is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }
}
