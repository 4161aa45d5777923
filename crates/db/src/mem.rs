//! In-memory database used by tests and the dev node.
//!
//! Everything lives in one keyed map guarded by a single lock, which gives
//! the batch call its all-or-nothing semantics for free.

use std::collections::BTreeMap;
use std::sync::Arc;

use borsh::BorshDeserialize;
use parking_lot::RwLock;

use gridchain_primitives::buf::Buf32;
use gridchain_primitives::group::ChainIndex;
use gridchain_smt::{NodeStore, SmtError};
use gridchain_state::id::BlockId;

use crate::errors::{DbError, DbResult};
use crate::schemas::{ColumnFamily, KeyPostfix};
use crate::traits::{
    BlockRecord, ChainProvider, ChainStateEntry, ChainStore, Database, HeaderRecord, WriteOp,
};

type Key = (u8, Vec<u8>);

#[derive(Default)]
struct Engine {
    map: RwLock<BTreeMap<Key, Vec<u8>>>,
}

impl Engine {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> Option<Vec<u8>> {
        self.map.read().get(&(cf as u8, key.to_vec())).cloned()
    }

    fn put(&self, cf: ColumnFamily, key: Vec<u8>, value: Vec<u8>) {
        self.map.write().insert((cf as u8, key), value);
    }

    fn contains(&self, cf: ColumnFamily, key: &[u8]) -> bool {
        self.map.read().contains_key(&(cf as u8, key.to_vec()))
    }
}

fn chain_key(chain: ChainIndex, postfix: KeyPostfix) -> Vec<u8> {
    vec![chain.from.value(), chain.to.value(), postfix.byte()]
}

fn height_key(chain: ChainIndex, height: u64) -> Vec<u8> {
    let mut key = vec![chain.from.value(), chain.to.value()];
    key.extend_from_slice(&height.to_be_bytes());
    key.push(KeyPostfix::Height.byte());
    key
}

fn decode<T: BorshDeserialize>(bytes: &[u8]) -> DbResult<T> {
    borsh::from_slice(bytes).map_err(|e| DbError::Corruption(e.to_string()))
}

pub struct MemChainStore {
    engine: Arc<Engine>,
}

pub struct MemTrieStore {
    engine: Arc<Engine>,
}

pub struct MemDb {
    chain_store: Arc<MemChainStore>,
    chain_prov: Arc<MemChainStore>,
    trie_store: Arc<MemTrieStore>,
}

impl MemDb {
    pub fn new() -> Self {
        let engine = Arc::new(Engine::default());
        let store = Arc::new(MemChainStore {
            engine: engine.clone(),
        });
        Self {
            chain_prov: store.clone(),
            chain_store: store,
            trie_store: Arc::new(MemTrieStore { engine }),
        }
    }
}

impl Default for MemDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for MemDb {
    type ChainStore = MemChainStore;
    type ChainProv = MemChainStore;
    type TrieStore = MemTrieStore;

    fn chain_store(&self) -> &Arc<MemChainStore> {
        &self.chain_store
    }

    fn chain_provider(&self) -> &Arc<MemChainStore> {
        &self.chain_prov
    }

    fn trie_store(&self) -> &Arc<MemTrieStore> {
        &self.trie_store
    }
}

impl MemChainStore {
    fn apply(&self, map: &mut BTreeMap<Key, Vec<u8>>, op: WriteOp) {
        match op {
            WriteOp::PutBlock(record) => {
                let id = record.block.hash();
                let bytes = borsh::to_vec(&record).expect("db: encode block");
                map.insert((ColumnFamily::Block as u8, id.inner().as_slice().to_vec()), bytes);
            }
            WriteOp::PutHeader(record) => {
                let id = record.header.hash();
                let bytes = borsh::to_vec(&record).expect("db: encode header");
                map.insert(
                    (ColumnFamily::Header as u8, id.inner().as_slice().to_vec()),
                    bytes,
                );
            }
            WriteOp::PutHeightIndex(chain, height, id) => {
                let key = (ColumnFamily::All as u8, height_key(chain, height));
                let mut ids: Vec<BlockId> = map
                    .get(&key)
                    .map(|bytes| borsh::from_slice(bytes).expect("db: decode height index"))
                    .unwrap_or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
                map.insert(key, borsh::to_vec(&ids).expect("db: encode height index"));
            }
            WriteOp::SetChainState(chain, entry) => {
                map.insert(
                    (
                        ColumnFamily::All as u8,
                        chain_key(chain, KeyPostfix::ChainState),
                    ),
                    borsh::to_vec(&entry).expect("db: encode chain state"),
                );
            }
        }
    }
}

impl ChainStore for MemChainStore {
    fn put_block(&self, record: BlockRecord) -> DbResult<()> {
        self.batch(vec![WriteOp::PutBlock(record)])
    }

    fn put_header(&self, record: HeaderRecord) -> DbResult<()> {
        self.batch(vec![WriteOp::PutHeader(record)])
    }

    fn put_height_index(&self, chain: ChainIndex, height: u64, id: BlockId) -> DbResult<()> {
        self.batch(vec![WriteOp::PutHeightIndex(chain, height, id)])
    }

    fn set_chain_state(&self, chain: ChainIndex, entry: ChainStateEntry) -> DbResult<()> {
        self.batch(vec![WriteOp::SetChainState(chain, entry)])
    }

    fn batch(&self, ops: Vec<WriteOp>) -> DbResult<()> {
        // Single lock scope makes the batch atomic against readers.
        let mut map = self.engine.map.write();
        for op in ops {
            self.apply(&mut map, op);
        }
        Ok(())
    }
}

impl ChainProvider for MemChainStore {
    fn get_block(&self, id: &BlockId) -> DbResult<Option<BlockRecord>> {
        match self.engine.get(ColumnFamily::Block, id.inner().as_slice()) {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_header(&self, id: &BlockId) -> DbResult<Option<HeaderRecord>> {
        match self.engine.get(ColumnFamily::Header, id.inner().as_slice()) {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, id: &BlockId) -> DbResult<bool> {
        let key = id.inner().as_slice();
        Ok(self.engine.contains(ColumnFamily::Block, key)
            || self.engine.contains(ColumnFamily::Header, key))
    }

    fn get_hashes_at_height(&self, chain: ChainIndex, height: u64) -> DbResult<Vec<BlockId>> {
        match self.engine.get(ColumnFamily::All, &height_key(chain, height)) {
            Some(bytes) => decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn get_chain_state(&self, chain: ChainIndex) -> DbResult<Option<ChainStateEntry>> {
        match self
            .engine
            .get(ColumnFamily::All, &chain_key(chain, KeyPostfix::ChainState))
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl NodeStore for MemTrieStore {
    fn get_node(&self, hash: &Buf32) -> Result<Option<Vec<u8>>, SmtError> {
        Ok(self.engine.get(ColumnFamily::Trie, hash.as_slice()))
    }

    fn put_node(&self, hash: Buf32, bytes: Vec<u8>) -> Result<(), SmtError> {
        self.engine
            .put(ColumnFamily::Trie, hash.as_slice().to_vec(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchain_state::block::genesis_block;

    fn chain() -> ChainIndex {
        ChainIndex::new(0, 1, 2).unwrap()
    }

    #[test]
    fn test_put_get_block() {
        let db = MemDb::new();
        let block = genesis_block(chain());
        let id = block.hash();
        db.chain_store()
            .put_block(BlockRecord {
                chain: chain(),
                block: block.clone(),
            })
            .unwrap();

        let rec = db.chain_provider().get_block(&id).unwrap().unwrap();
        assert_eq!(rec.block, block);
        assert_eq!(rec.chain, chain());
        assert!(db.chain_provider().contains(&id).unwrap());
    }

    #[test]
    fn test_height_index_multimap() {
        let db = MemDb::new();
        let a = BlockId(Buf32::new([1; 32]));
        let b = BlockId(Buf32::new([2; 32]));
        let store = db.chain_store();
        store.put_height_index(chain(), 5, a).unwrap();
        store.put_height_index(chain(), 5, b).unwrap();
        store.put_height_index(chain(), 5, a).unwrap();

        let ids = db.chain_provider().get_hashes_at_height(chain(), 5).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_batch_applies_all() {
        let db = MemDb::new();
        let block = genesis_block(chain());
        let id = block.hash();
        db.chain_store()
            .batch(vec![
                WriteOp::PutBlock(BlockRecord {
                    chain: chain(),
                    block,
                }),
                WriteOp::PutHeightIndex(chain(), 0, id),
                WriteOp::SetChainState(chain(), ChainStateEntry { tip: id, height: 0 }),
            ])
            .unwrap();

        assert!(db.chain_provider().contains(&id).unwrap());
        let cs = db.chain_provider().get_chain_state(chain()).unwrap().unwrap();
        assert_eq!(cs.tip, id);
    }
}
