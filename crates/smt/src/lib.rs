//! Content-addressed sparse-Merkle-trie used to authenticate world state.
//!
//! Nodes are addressed by the hash of their encoding, so every historical
//! root stays readable until its nodes are pruned.  The trie is radix-16
//! over the nibbles of a 32-byte key.

use std::collections::HashMap;

use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::RwLock;
use thiserror::Error;

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::hash;

#[derive(Debug, Error)]
pub enum SmtError {
    #[error("node {0:?} missing from store")]
    MissingNode(Buf32),

    #[error("undecodable node {0:?}")]
    CorruptNode(Buf32),

    #[error("store: {0}")]
    Store(String),
}

/// Backing store for trie nodes.  Keys are the hash of the encoded node.
pub trait NodeStore {
    fn get_node(&self, hash: &Buf32) -> Result<Option<Vec<u8>>, SmtError>;
    fn put_node(&self, hash: Buf32, bytes: Vec<u8>) -> Result<(), SmtError>;
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
enum Node {
    /// Remaining key nibbles and the stored value.
    Leaf { path: Vec<u8>, value: Vec<u8> },

    /// One child slot per nibble.
    Branch { children: [Option<Buf32>; 16] },
}

fn key_nibbles(key: &Buf32) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    for b in key.as_slice() {
        out.push(b >> 4);
        out.push(b & 0x0f);
    }
    out
}

/// The empty trie root.
pub fn empty_root() -> Buf32 {
    Buf32::zero()
}

/// Trie handle over a node store.  All operations are functional: mutation
/// returns a new root and leaves prior versions intact.
pub struct Smt<'s, S: NodeStore> {
    store: &'s S,
}

impl<'s, S: NodeStore> Smt<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn get(&self, root: &Buf32, key: &Buf32) -> Result<Option<Vec<u8>>, SmtError> {
        if root.is_zero() {
            return Ok(None);
        }
        let mut node = self.load(root)?;
        let nibbles = key_nibbles(key);
        let mut depth = 0usize;
        loop {
            match node {
                Node::Leaf { path, value } => {
                    if path == nibbles[depth..] {
                        return Ok(Some(value));
                    }
                    return Ok(None);
                }
                Node::Branch { children } => {
                    let idx = nibbles[depth] as usize;
                    let Some(child) = children[idx] else {
                        return Ok(None);
                    };
                    node = self.load(&child)?;
                    depth += 1;
                }
            }
        }
    }

    pub fn insert(&self, root: &Buf32, key: &Buf32, value: Vec<u8>) -> Result<Buf32, SmtError> {
        let nibbles = key_nibbles(key);
        let cur = if root.is_zero() { None } else { Some(*root) };
        self.insert_at(cur, &nibbles, value)
    }

    pub fn remove(&self, root: &Buf32, key: &Buf32) -> Result<Buf32, SmtError> {
        if root.is_zero() {
            return Ok(*root);
        }
        let nibbles = key_nibbles(key);
        match self.remove_at(root, &nibbles)? {
            RemoveOutcome::Unchanged => Ok(*root),
            RemoveOutcome::Replaced(node) => self.save(&node),
            RemoveOutcome::Gone => Ok(empty_root()),
        }
    }

    fn load(&self, hash: &Buf32) -> Result<Node, SmtError> {
        let bytes = self
            .store
            .get_node(hash)?
            .ok_or(SmtError::MissingNode(*hash))?;
        Node::try_from_slice(&bytes).map_err(|_| SmtError::CorruptNode(*hash))
    }

    fn save(&self, node: &Node) -> Result<Buf32, SmtError> {
        let bytes = borsh::to_vec(node).expect("smt: encode node");
        let hash = hash::blake2b(&bytes);
        self.store.put_node(hash, bytes)?;
        Ok(hash)
    }

    fn insert_at(
        &self,
        node_hash: Option<Buf32>,
        path: &[u8],
        value: Vec<u8>,
    ) -> Result<Buf32, SmtError> {
        let Some(node_hash) = node_hash else {
            return self.save(&Node::Leaf {
                path: path.to_vec(),
                value,
            });
        };

        match self.load(&node_hash)? {
            Node::Leaf {
                path: old_path,
                value: old_value,
            } => {
                if old_path == path {
                    return self.save(&Node::Leaf {
                        path: path.to_vec(),
                        value,
                    });
                }

                // Split at the first divergent nibble, building one branch
                // per shared prefix nibble.  Keys are equal length so the
                // divergence point always exists.
                let split = old_path
                    .iter()
                    .zip(path.iter())
                    .position(|(a, b)| a != b)
                    .expect("smt: distinct keys share full path");

                let old_leaf = self.save(&Node::Leaf {
                    path: old_path[split + 1..].to_vec(),
                    value: old_value,
                })?;
                let new_leaf = self.save(&Node::Leaf {
                    path: path[split + 1..].to_vec(),
                    value,
                })?;

                let mut children: [Option<Buf32>; 16] = Default::default();
                children[old_path[split] as usize] = Some(old_leaf);
                children[path[split] as usize] = Some(new_leaf);
                let mut hash = self.save(&Node::Branch { children })?;

                for d in (0..split).rev() {
                    let mut children: [Option<Buf32>; 16] = Default::default();
                    children[path[d] as usize] = Some(hash);
                    hash = self.save(&Node::Branch { children })?;
                }
                Ok(hash)
            }
            Node::Branch { mut children } => {
                let idx = path[0] as usize;
                let child = self.insert_at(children[idx], &path[1..], value)?;
                children[idx] = Some(child);
                self.save(&Node::Branch { children })
            }
        }
    }

    fn remove_at(&self, node_hash: &Buf32, path: &[u8]) -> Result<RemoveOutcome, SmtError> {
        match self.load(node_hash)? {
            Node::Leaf { path: old_path, .. } => {
                if old_path == path {
                    Ok(RemoveOutcome::Gone)
                } else {
                    Ok(RemoveOutcome::Unchanged)
                }
            }
            Node::Branch { mut children } => {
                let idx = path[0] as usize;
                let Some(child) = children[idx] else {
                    return Ok(RemoveOutcome::Unchanged);
                };
                match self.remove_at(&child, &path[1..])? {
                    RemoveOutcome::Unchanged => Ok(RemoveOutcome::Unchanged),
                    RemoveOutcome::Replaced(node) => {
                        children[idx] = Some(self.save(&node)?);
                        self.canonicalize(children)
                    }
                    RemoveOutcome::Gone => {
                        children[idx] = None;
                        self.canonicalize(children)
                    }
                }
            }
        }
    }

    /// Restores the shape inserts would have produced: a branch never holds
    /// a lone leaf child.
    fn canonicalize(&self, children: [Option<Buf32>; 16]) -> Result<RemoveOutcome, SmtError> {
        let mut present = children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|h| (i, *h)));
        let first = present.next();
        let second = present.next();
        match (first, second) {
            (None, _) => Ok(RemoveOutcome::Gone),
            (Some((nib, child_hash)), None) => match self.load(&child_hash)? {
                Node::Leaf {
                    path: child_path,
                    value,
                } => {
                    let mut merged = vec![nib as u8];
                    merged.extend_from_slice(&child_path);
                    Ok(RemoveOutcome::Replaced(Node::Leaf {
                        path: merged,
                        value,
                    }))
                }
                Node::Branch { .. } => Ok(RemoveOutcome::Replaced(Node::Branch { children })),
            },
            _ => Ok(RemoveOutcome::Replaced(Node::Branch { children })),
        }
    }
}

enum RemoveOutcome {
    Unchanged,
    Replaced(Node),
    Gone,
}

/// In-memory node store for tests and stateless execution scratch space.
#[derive(Default)]
pub struct MemNodeStore {
    nodes: RwLock<HashMap<Buf32, Vec<u8>>>,
}

impl MemNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }
}

impl NodeStore for MemNodeStore {
    fn get_node(&self, hash: &Buf32) -> Result<Option<Vec<u8>>, SmtError> {
        Ok(self.nodes.read().get(hash).cloned())
    }

    fn put_node(&self, hash: Buf32, bytes: Vec<u8>) -> Result<(), SmtError> {
        self.nodes.write().insert(hash, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_primitives::hash::blake2b;

    fn key(n: u8) -> Buf32 {
        blake2b(&[n])
    }

    #[test]
    fn test_insert_get() {
        let store = MemNodeStore::new();
        let smt = Smt::new(&store);

        let root = smt.insert(&empty_root(), &key(1), b"one".to_vec()).unwrap();
        let root = smt.insert(&root, &key(2), b"two".to_vec()).unwrap();

        assert_eq!(smt.get(&root, &key(1)).unwrap(), Some(b"one".to_vec()));
        assert_eq!(smt.get(&root, &key(2)).unwrap(), Some(b"two".to_vec()));
        assert_eq!(smt.get(&root, &key(3)).unwrap(), None);
    }

    #[test]
    fn test_overwrite_changes_root() {
        let store = MemNodeStore::new();
        let smt = Smt::new(&store);

        let r1 = smt.insert(&empty_root(), &key(1), b"a".to_vec()).unwrap();
        let r2 = smt.insert(&r1, &key(1), b"b".to_vec()).unwrap();
        assert_ne!(r1, r2);
        assert_eq!(smt.get(&r2, &key(1)).unwrap(), Some(b"b".to_vec()));
        // The old version stays readable through its root.
        assert_eq!(smt.get(&r1, &key(1)).unwrap(), Some(b"a".to_vec()));
    }

    #[test]
    fn test_root_independent_of_insert_order() {
        let store = MemNodeStore::new();
        let smt = Smt::new(&store);

        let mut fwd = empty_root();
        for n in 0..8u8 {
            fwd = smt.insert(&fwd, &key(n), vec![n]).unwrap();
        }
        let mut rev = empty_root();
        for n in (0..8u8).rev() {
            rev = smt.insert(&rev, &key(n), vec![n]).unwrap();
        }
        assert_eq!(fwd, rev);
    }

    #[test]
    fn test_remove_restores_prior_root() {
        let store = MemNodeStore::new();
        let smt = Smt::new(&store);

        let r1 = smt.insert(&empty_root(), &key(1), b"a".to_vec()).unwrap();
        let r2 = smt.insert(&r1, &key(2), b"b".to_vec()).unwrap();
        let r3 = smt.remove(&r2, &key(2)).unwrap();
        assert_eq!(r1, r3);
        assert_eq!(smt.get(&r3, &key(2)).unwrap(), None);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let store = MemNodeStore::new();
        let smt = Smt::new(&store);

        let r1 = smt.insert(&empty_root(), &key(1), b"a".to_vec()).unwrap();
        assert_eq!(smt.remove(&r1, &key(9)).unwrap(), r1);
    }
}
