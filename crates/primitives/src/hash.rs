//! Common wrappers around the hash functions we use.

use blake2::Blake2b;
use digest::consts::U32;
use digest::Digest;
use sha3::Keccak256;

use crate::buf::Buf32;

type Blake2b256 = Blake2b<U32>;

/// Blake2b-256, the chain's native hash.  Block ids, tx ids and trie nodes
/// all use this.
pub fn blake2b(buf: &[u8]) -> Buf32 {
    Buf32::from(<[u8; 32]>::from(Blake2b256::digest(buf)))
}

/// Keccak-256, exposed to contracts through the hashing instruction.
pub fn keccak256(buf: &[u8]) -> Buf32 {
    Buf32::from(<[u8; 32]>::from(Keccak256::digest(buf)))
}

/// Hashes a value through its borsh encoding.  Used for trie keys and
/// content-addressed node storage.
pub fn hash_borsh<T: borsh::BorshSerialize>(v: &T) -> Buf32 {
    let mut hasher = Blake2b256::new();
    v.serialize(&mut hasher).expect("hash: borsh serialize");
    Buf32::from(<[u8; 32]>::from(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashes_differ_by_function() {
        let data = b"gridchain";
        assert_ne!(blake2b(data), keccak256(data));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(blake2b(b"abc"), blake2b(b"abc"));
    }
}
