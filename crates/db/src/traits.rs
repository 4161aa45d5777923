//! Trait definitions for the low level database interfaces.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};

use gridchain_primitives::group::ChainIndex;
use gridchain_smt::NodeStore;
use gridchain_state::block::Block;
use gridchain_state::header::BlockHeader;
use gridchain_state::id::BlockId;

use crate::errors::DbResult;

/// Common database interface worker tasks are parameterized over.
pub trait Database {
    type ChainStore: ChainStore + Sync + Send + 'static;
    type ChainProv: ChainProvider + Sync + Send + 'static;
    type TrieStore: NodeStore + Sync + Send + 'static;

    fn chain_store(&self) -> &Arc<Self::ChainStore>;
    fn chain_provider(&self) -> &Arc<Self::ChainProv>;
    fn trie_store(&self) -> &Arc<Self::TrieStore>;
}

/// A full block together with the chain it lives on.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockRecord {
    pub chain: ChainIndex,
    pub block: Block,
}

/// A header-only record for chains the broker does not relate to.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct HeaderRecord {
    pub chain: ChainIndex,
    pub header: BlockHeader,
}

/// Cursor of one chain: its current canonical tip and height.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ChainStateEntry {
    pub tip: BlockId,
    pub height: u64,
}

/// One mutation inside an atomic batch.
#[derive(Clone, Debug)]
pub enum WriteOp {
    PutBlock(BlockRecord),
    PutHeader(HeaderRecord),
    PutHeightIndex(ChainIndex, u64, BlockId),
    SetChainState(ChainIndex, ChainStateEntry),
}

/// Storage interface extending chains.  Individual puts are atomic;
/// `batch` applies every op or none.
pub trait ChainStore {
    fn put_block(&self, record: BlockRecord) -> DbResult<()>;

    fn put_header(&self, record: HeaderRecord) -> DbResult<()>;

    /// Registers a block hash at a height.  Forks make this a multimap.
    fn put_height_index(&self, chain: ChainIndex, height: u64, id: BlockId) -> DbResult<()>;

    fn set_chain_state(&self, chain: ChainIndex, entry: ChainStateEntry) -> DbResult<()>;

    fn batch(&self, ops: Vec<WriteOp>) -> DbResult<()>;
}

/// Provider interface to view chain data.
pub trait ChainProvider {
    fn get_block(&self, id: &BlockId) -> DbResult<Option<BlockRecord>>;

    fn get_header(&self, id: &BlockId) -> DbResult<Option<HeaderRecord>>;

    /// Whether the hash is known, as either a block or a header.
    fn contains(&self, id: &BlockId) -> DbResult<bool>;

    fn get_hashes_at_height(&self, chain: ChainIndex, height: u64) -> DbResult<Vec<BlockId>>;

    fn get_chain_state(&self, chain: ChainIndex) -> DbResult<Option<ChainStateEntry>>;
}
