//! Hash-derived identifier newtypes.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{CodecError, Decode, Encode};

macro_rules! impl_hash_id {
    ($(#[$docs:meta])* $name:ident) => {
        $(#[$docs])*
        #[derive(
            Copy,
            Clone,
            Default,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
            BorshSerialize,
            BorshDeserialize,
            Arbitrary,
        )]
        pub struct $name(pub Buf32);

        impl $name {
            pub fn inner(&self) -> &Buf32 {
                &self.0
            }

            pub fn zero() -> Self {
                Self(Buf32::zero())
            }
        }

        impl ::std::convert::From<Buf32> for $name {
            fn from(value: Buf32) -> Self {
                Self(value)
            }
        }

        impl ::std::convert::From<$name> for Buf32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(&self.0, f)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl Encode for $name {
            fn encode(&self, w: &mut Vec<u8>) {
                self.0.encode(w);
            }
        }

        impl Decode for $name {
            fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
                Ok(Self(Buf32::decode(r)?))
            }
        }
    };
}

impl_hash_id!(
    /// ID of a block, equal to its header hash.
    BlockId
);

impl_hash_id!(
    /// ID of a transaction, the hash of its unsigned part.
    TxId
);
