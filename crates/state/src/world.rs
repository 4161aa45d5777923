//! The authenticated world state.
//!
//! A thin typed layer over the sparse-Merkle-trie: keys are hashes of asset
//! or contract keys, values are borsh-encoded [`AccountState`]s.  Handles
//! are cheap to fork since the trie is persistent; transaction execution
//! works on a fork and the committed root is adopted only on success.

use std::sync::Arc;

use thiserror::Error;

use gridchain_primitives::buf::Buf32;
use gridchain_smt::{empty_root, NodeStore, Smt, SmtError};

use crate::account::AccountState;

#[derive(Debug, Error)]
pub enum WorldStateError {
    #[error("trie: {0}")]
    Trie(#[from] SmtError),

    #[error("undecodable account state under key {0:?}")]
    CorruptAccount(Buf32),
}

pub struct WorldState<S: NodeStore> {
    root: Buf32,
    store: Arc<S>,
}

impl<S: NodeStore> Clone for WorldState<S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root,
            store: self.store.clone(),
        }
    }
}

impl<S: NodeStore> WorldState<S> {
    pub fn empty(store: Arc<S>) -> Self {
        Self {
            root: empty_root(),
            store,
        }
    }

    pub fn at_root(store: Arc<S>, root: Buf32) -> Self {
        Self { root, store }
    }

    pub fn root(&self) -> Buf32 {
        self.root
    }

    /// Rewinds the handle to a previously observed root.  The trie is
    /// persistent, so this is a perfect rollback.
    pub fn set_root(&mut self, root: Buf32) {
        self.root = root;
    }

    /// An independent handle at the same root.  Mutations on the fork never
    /// affect `self`.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn get_account(&self, key: &Buf32) -> Result<Option<AccountState>, WorldStateError> {
        let smt = Smt::new(self.store.as_ref());
        let Some(bytes) = smt.get(&self.root, key)? else {
            return Ok(None);
        };
        borsh::from_slice(&bytes).map(Some).map_err(|_| WorldStateError::CorruptAccount(*key))
    }

    pub fn put_account(
        &mut self,
        key: &Buf32,
        state: &AccountState,
    ) -> Result<(), WorldStateError> {
        let bytes = borsh::to_vec(state).expect("world: encode account");
        let smt = Smt::new(self.store.as_ref());
        self.root = smt.insert(&self.root, key, bytes)?;
        Ok(())
    }

    pub fn remove_account(&mut self, key: &Buf32) -> Result<(), WorldStateError> {
        let smt = Smt::new(self.store.as_ref());
        self.root = smt.remove(&self.root, key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::hash::blake2b;
    use gridchain_smt::MemNodeStore;

    fn world() -> WorldState<MemNodeStore> {
        WorldState::empty(Arc::new(MemNodeStore::new()))
    }

    #[test]
    fn test_put_get() {
        let mut w = world();
        let key = blake2b(b"alice");
        let st = AccountState::Asset {
            amount: 7,
            tokens: vec![],
        };
        w.put_account(&key, &st).unwrap();
        assert_eq!(w.get_account(&key).unwrap(), Some(st));
    }

    #[test]
    fn test_fork_isolation() {
        let mut w = world();
        let key = blake2b(b"alice");
        w.put_account(&key, &AccountState::empty_asset()).unwrap();

        let base_root = w.root();
        let mut fork = w.fork();
        fork.put_account(
            &key,
            &AccountState::Asset {
                amount: 99,
                tokens: vec![],
            },
        )
        .unwrap();

        assert_eq!(w.root(), base_root);
        assert_eq!(w.get_account(&key).unwrap().unwrap().amount(), 0);
        assert_eq!(fork.get_account(&key).unwrap().unwrap().amount(), 99);
    }
}
