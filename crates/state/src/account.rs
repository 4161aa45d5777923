//! Account states stored in the world-state trie.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};

use gridchain_primitives::buf::Buf32;

/// One entry of the `address → state` map.  Contract code and fields are
/// kept as opaque bytes at this layer; the VM owns their typed forms.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize, Arbitrary)]
pub enum AccountState {
    Asset {
        amount: u64,
        tokens: Vec<(Buf32, u64)>,
    },

    Contract {
        code_hash: Buf32,
        code: Vec<u8>,
        fields: Vec<u8>,
        amount: u64,
    },
}

impl AccountState {
    pub fn empty_asset() -> Self {
        Self::Asset {
            amount: 0,
            tokens: Vec::new(),
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            Self::Asset { amount, .. } => *amount,
            Self::Contract { amount, .. } => *amount,
        }
    }

    pub fn is_contract(&self) -> bool {
        matches!(self, Self::Contract { .. })
    }
}
