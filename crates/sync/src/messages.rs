//! Wire messages of the sync protocol.  Hash lists are indexed by chain in
//! canonical row-major order.

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::codec::{CodecError, Decode, Encode};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequest {
    /// Per-chain locator skip lists.
    pub locators: Vec<Vec<Buf32>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncResponse {
    /// Per-chain hashes the peer should fetch, oldest first.
    pub inventories: Vec<Vec<Buf32>>,
}

impl SyncResponse {
    /// Empty on every chain means the requester is synced.
    pub fn is_all_empty(&self) -> bool {
        self.inventories.iter().all(|inv| inv.is_empty())
    }
}

impl Encode for SyncRequest {
    fn encode(&self, w: &mut Vec<u8>) {
        self.locators.encode(w);
    }
}

impl Decode for SyncRequest {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            locators: Vec::decode(r)?,
        })
    }
}

impl Encode for SyncResponse {
    fn encode(&self, w: &mut Vec<u8>) {
        self.inventories.encode(w);
    }
}

impl Decode for SyncResponse {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            inventories: Vec::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let req = SyncRequest {
            locators: vec![
                vec![Buf32::new([1; 32]), Buf32::new([2; 32])],
                vec![],
                vec![Buf32::new([3; 32])],
                vec![],
            ],
        };
        let bytes = req.encode_to_vec();
        assert_eq!(SyncRequest::decode_exact(&bytes).unwrap(), req);
    }

    #[test]
    fn test_response_roundtrip_and_emptiness() {
        let resp = SyncResponse {
            inventories: vec![vec![], vec![], vec![], vec![]],
        };
        assert!(resp.is_all_empty());
        let bytes = resp.encode_to_vec();
        assert_eq!(SyncResponse::decode_exact(&bytes).unwrap(), resp);

        let busy = SyncResponse {
            inventories: vec![vec![Buf32::zero()], vec![], vec![], vec![]],
        };
        assert!(!busy.is_all_empty());
    }
}
