//! Signature scheme wrappers.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use rand::rngs::OsRng;
use secp256k1::{ecdsa, Message, PublicKey, SecretKey, SECP256K1};

use crate::buf::{Buf32, Buf64};
use crate::codec::{CodecError, Decode, Encode};
use crate::group::{pub_key_to_group, GroupIndex};

/// Compact 64-byte ECDSA signature.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, BorshSerialize, BorshDeserialize, Arbitrary,
)]
pub struct Signature(pub Buf64);

impl Encode for Signature {
    fn encode(&self, w: &mut Vec<u8>) {
        self.0.encode(w);
    }
}

impl Decode for Signature {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self(Buf64::decode(r)?))
    }
}

pub fn sign(msg: &Buf32, sk: &SecretKey) -> Signature {
    let message = Message::from_digest(*msg.as_ref());
    let sig = SECP256K1.sign_ecdsa(&message, sk);
    Signature(Buf64::new(sig.serialize_compact()))
}

pub fn verify(msg: &Buf32, sig: &Signature, pk: &PublicKey) -> bool {
    let message = Message::from_digest(*msg.as_ref());
    let Ok(sig) = ecdsa::Signature::from_compact(sig.0.as_slice()) else {
        return false;
    };
    SECP256K1.verify_ecdsa(&message, &sig, pk).is_ok()
}

pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let sk = SecretKey::new(&mut OsRng);
    let pk = PublicKey::from_secret_key(SECP256K1, &sk);
    (sk, pk)
}

/// Grinds keypairs until the public key lands in the wanted group.
pub fn generate_keypair_for_group(group: GroupIndex, groups: u8) -> (SecretKey, PublicKey) {
    loop {
        let (sk, pk) = generate_keypair();
        if pub_key_to_group(&pk.serialize(), groups) == group {
            return (sk, pk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;

    #[test]
    fn test_sign_verify() {
        let (sk, pk) = generate_keypair();
        let msg = hash::blake2b(b"payload");
        let sig = sign(&msg, &sk);
        assert!(verify(&msg, &sig, &pk));

        let other = hash::blake2b(b"other payload");
        assert!(!verify(&other, &sig, &pk));
    }

    #[test]
    fn test_grind_keypair_group() {
        let (_, pk) = generate_keypair_for_group(GroupIndex(1), 2);
        assert_eq!(pub_key_to_group(&pk.serialize(), 2), GroupIndex(1));
    }
}
