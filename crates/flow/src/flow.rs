//! The grid of chains and everything that reaches across them: views,
//! weights, dependency selection and admission.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use gridchain_primitives::group::{ChainIndex, GroupIndex};
use gridchain_primitives::params::Params;
use gridchain_primitives::time::Timestamp;
use gridchain_state::block::{genesis_block, Block};
use gridchain_state::deps::BlockDeps;
use gridchain_state::header::{BlockHeader, Target};
use gridchain_state::id::BlockId;

use crate::chain::ChainDag;
use crate::errors::{FlowError, ValidationError};
use crate::retarget::RetargetStrategy;

/// Flow-level bookkeeping of one admitted block.
struct FlowMeta {
    chain: ChainIndex,
    weight: u64,

    /// Resolved tip of every chain as this block sees it, row-major.
    view: Vec<BlockId>,
}

/// What the miner needs to start hashing on a chain.
#[derive(Clone, Debug)]
pub struct BlockFlowTemplate {
    pub chain: ChainIndex,
    pub deps: BlockDeps,
    pub target: Target,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedInfo {
    pub id: BlockId,
    pub chain: ChainIndex,
    pub height: u64,
    pub weight: u64,
    pub new_tip: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added(AddedInfo),
    AlreadyKnown,
}

/// Everything validation computes before we mutate anything.
struct Prepared {
    id: BlockId,
    parent: BlockId,
    height: u64,
    weight: u64,
    timestamp: Timestamp,
    target: Target,
    view: Vec<BlockId>,
}

pub struct BlockFlow {
    params: Arc<Params>,
    chains: Vec<ChainDag>,
    meta: HashMap<BlockId, FlowMeta>,
    retarget: Box<dyn RetargetStrategy>,
}

impl BlockFlow {
    pub fn new(params: Arc<Params>, retarget: Box<dyn RetargetStrategy>) -> Self {
        let groups = params.groups();
        let genesis_ids: Vec<BlockId> = ChainIndex::all(groups)
            .map(|chain| genesis_block(chain).hash())
            .collect();

        let mut chains = Vec::with_capacity(genesis_ids.len());
        let mut meta = HashMap::new();
        for chain in ChainIndex::all(groups) {
            let gid = genesis_ids[chain.flat_index(groups)];
            chains.push(ChainDag::new(chain, gid, Target::max()));
            meta.insert(
                gid,
                FlowMeta {
                    chain,
                    weight: 0,
                    view: genesis_ids.clone(),
                },
            );
        }

        Self {
            params,
            chains,
            meta,
            retarget,
        }
    }

    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }

    pub fn dag(&self, chain: ChainIndex) -> &ChainDag {
        &self.chains[chain.flat_index(self.params.groups())]
    }

    fn dag_mut(&mut self, chain: ChainIndex) -> &mut ChainDag {
        let idx = chain.flat_index(self.params.groups());
        &mut self.chains[idx]
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.meta.contains_key(id)
    }

    /// Weight of any known block.
    pub fn weight(&self, id: &BlockId) -> Result<u64, FlowError> {
        self.meta
            .get(id)
            .map(|m| m.weight)
            .ok_or(FlowError::UnknownBlock(*id))
    }

    pub fn chain_of(&self, id: &BlockId) -> Option<ChainIndex> {
        self.meta.get(id).map(|m| m.chain)
    }

    pub fn height_of(&self, id: &BlockId) -> Option<u64> {
        let chain = self.chain_of(id)?;
        self.dag(chain).height_of(id)
    }

    /// The locally preferred tip of a chain: heaviest, smallest hash on a
    /// tie.
    pub fn best_tip(&self, chain: ChainIndex) -> BlockId {
        let dag = self.dag(chain);
        *dag.tips_iter()
            .max_by(|a, b| {
                let wa = self.meta[a].weight;
                let wb = self.meta[b].weight;
                wa.cmp(&wb).then_with(|| b.0.cmp(&a.0))
            })
            .expect("flow: chain without tips")
    }

    /// Whether the two blocks' chain views can live on one consistent cut.
    fn compatible(&self, a: &BlockId, b: &BlockId) -> bool {
        let va = &self.meta[a].view;
        let vb = &self.meta[b].view;
        for (idx, (ta, tb)) in va.iter().zip(vb.iter()).enumerate() {
            if ta == tb {
                continue;
            }
            let dag = &self.chains[idx];
            if !dag.is_ancestor(ta, tb) && !dag.is_ancestor(tb, ta) {
                return false;
            }
        }
        true
    }

    /// Candidates for the group tip of `group`: tips of the whole row,
    /// heaviest first, hash ascending on ties, genesis last as the always
    /// compatible fallback.
    fn group_tip_candidates(&self, group: GroupIndex) -> Vec<BlockId> {
        let groups = self.params.groups();
        let mut cands: Vec<BlockId> = (0..groups)
            .flat_map(|to| {
                let chain = ChainIndex {
                    from: group,
                    to: GroupIndex(to),
                };
                self.dag(chain).tips_iter().copied().collect::<Vec<_>>()
            })
            .collect();
        self.sort_candidates(&mut cands);

        let fallback = self
            .dag(ChainIndex {
                from: group,
                to: group,
            })
            .genesis();
        if !cands.contains(&fallback) {
            cands.push(fallback);
        }
        cands
    }

    fn chain_tip_candidates(&self, chain: ChainIndex) -> Vec<BlockId> {
        let dag = self.dag(chain);
        let mut cands: Vec<BlockId> = dag.tips_iter().copied().collect();
        self.sort_candidates(&mut cands);
        let fallback = dag.genesis();
        if !cands.contains(&fallback) {
            cands.push(fallback);
        }
        cands
    }

    fn sort_candidates(&self, cands: &mut [BlockId]) {
        cands.sort_by(|a, b| {
            let wa = self.meta[a].weight;
            let wb = self.meta[b].weight;
            wb.cmp(&wa).then_with(|| a.0.cmp(&b.0))
        });
    }

    /// Selects the best dependency set for a new block on `chain`: per
    /// foreign group the heaviest compatible group tip, then the heaviest
    /// compatible tip of every own-row chain.
    pub fn get_best_deps(&self, chain: ChainIndex) -> Result<BlockDeps, FlowError> {
        let groups = self.params.groups();
        if chain.flat_index(groups) >= self.chains.len() {
            return Err(FlowError::UnknownChain(chain));
        }

        let mut chosen: Vec<BlockId> = Vec::with_capacity(2 * groups as usize - 1);

        for group in (0..groups).map(GroupIndex) {
            if group == chain.from {
                continue;
            }
            let pick = self
                .group_tip_candidates(group)
                .into_iter()
                .find(|c| chosen.iter().all(|o| self.compatible(c, o)))
                .expect("flow: genesis candidate always compatible");
            chosen.push(pick);
        }

        for to in (0..groups).map(GroupIndex) {
            let sibling = ChainIndex {
                from: chain.from,
                to,
            };
            let pick = self
                .chain_tip_candidates(sibling)
                .into_iter()
                .find(|c| chosen.iter().all(|o| self.compatible(c, o)))
                .expect("flow: genesis candidate always compatible");
            chosen.push(pick);
        }

        Ok(BlockDeps::build(chosen, groups).expect("flow: deps arity"))
    }

    /// Target for the next block on a chain, from the canonical tip's
    /// recent timestamps.
    pub fn next_target(&self, chain: ChainIndex) -> Target {
        let dag = self.dag(chain);
        let tip = self.best_tip(chain);
        let tip_target = dag.entry(&tip).expect("flow: tip entry").target;

        let mut recent = Vec::with_capacity(self.params.retarget_window());
        let mut at = Some(tip);
        while let Some(id) = at {
            let Some(ent) = dag.entry(&id) else {
                break;
            };
            recent.push(ent.timestamp);
            if recent.len() >= self.params.retarget_window() {
                break;
            }
            at = ent.parent;
        }

        self.retarget.next_target(&recent, tip_target, &self.params)
    }

    pub fn prepare_template(&self, chain: ChainIndex) -> Result<BlockFlowTemplate, FlowError> {
        let deps = self.get_best_deps(chain)?;
        let target = self.next_target(chain);
        Ok(BlockFlowTemplate {
            chain,
            deps,
            target,
        })
    }

    /// Validates without mutating.  Chain handlers use this against a
    /// lagging snapshot; the flow handler revalidates before commit.
    pub fn precheck_header(
        &self,
        chain: ChainIndex,
        header: &BlockHeader,
    ) -> Result<(), ValidationError> {
        self.validate_header(chain, header).map(|_| ())
    }

    pub fn add_header(
        &mut self,
        chain: ChainIndex,
        header: &BlockHeader,
    ) -> Result<AddOutcome, ValidationError> {
        if self.contains(&header.hash()) {
            return Ok(AddOutcome::AlreadyKnown);
        }
        let prepared = self.validate_header(chain, header)?;
        Ok(AddOutcome::Added(self.install(chain, prepared)))
    }

    pub fn add_block(
        &mut self,
        chain: ChainIndex,
        block: &Block,
    ) -> Result<AddOutcome, ValidationError> {
        if !block.merkle_root_ok() {
            return Err(ValidationError::BadMerkleRoot);
        }
        self.add_header(chain, &block.header)
    }

    fn validate_header(
        &self,
        chain: ChainIndex,
        header: &BlockHeader,
    ) -> Result<Prepared, ValidationError> {
        let groups = self.params.groups();
        let id = header.hash();

        if header.is_genesis() {
            return Err(ValidationError::BadDeps("unexpected genesis"));
        }
        if header.deps.len() != BlockDeps::expected_len(groups) {
            return Err(ValidationError::BadDeps("wrong arity"));
        }

        // Every dep must be resolvable before anything else; a missing one
        // parks the item rather than rejecting it.
        for dep in header.deps.iter() {
            if !self.contains(dep) {
                return Err(ValidationError::UnknownParent(*dep));
            }
        }

        // Deps must sit on the chains the layout assigns them to.
        for (k, out_dep) in header.deps.out_deps().iter().enumerate() {
            let want = ChainIndex {
                from: chain.from,
                to: GroupIndex(k as u8),
            };
            if self.chain_of(out_dep) != Some(want) {
                return Err(ValidationError::BadDeps("out-dep on wrong chain"));
            }
        }
        for group in (0..groups).map(GroupIndex) {
            if group == chain.from {
                continue;
            }
            let in_dep = header.deps.in_dep_for(group, chain.from);
            match self.chain_of(&in_dep) {
                Some(c) if c.from == group => {}
                _ => return Err(ValidationError::BadDeps("in-dep on wrong group")),
            }
        }

        if header.target.0 > self.params.max_mining_target() || !header.pow_ok() {
            return Err(ValidationError::BadPoW);
        }

        let parent = header.deps.parent(chain);
        let parent_ent = self
            .dag(chain)
            .entry(&parent)
            .ok_or(ValidationError::UnknownParent(parent))?;
        if header.timestamp <= parent_ent.timestamp {
            return Err(ValidationError::BadTimestamp);
        }
        let height = parent_ent.height + 1;

        // No pair of deps may contradict each other's chain views.
        let deps: Vec<BlockId> = header.deps.iter().copied().collect();
        for (i, a) in deps.iter().enumerate() {
            for b in deps.iter().skip(i + 1) {
                if !self.compatible(a, b) {
                    return Err(ValidationError::BadDeps("inconsistent views"));
                }
            }
        }

        let view = self.build_view(chain, header, id);

        // The view must dominate the parent's, which keeps weights strictly
        // monotone along every chain.
        let parent_view = &self.meta[&parent].view;
        for (idx, (old, new)) in parent_view.iter().zip(view.iter()).enumerate() {
            if new == &id {
                continue;
            }
            if !self.chains[idx].is_ancestor(old, new) {
                return Err(ValidationError::BadDeps("view regresses from parent"));
            }
        }

        let weight = self.view_weight(&view, chain, height);

        Ok(Prepared {
            id,
            parent,
            height,
            weight,
            timestamp: header.timestamp,
            target: header.target,
            view,
        })
    }

    fn build_view(&self, chain: ChainIndex, header: &BlockHeader, id: BlockId) -> Vec<BlockId> {
        let groups = self.params.groups();
        let mut view = vec![BlockId::zero(); self.chains.len()];

        for (k, out_dep) in header.deps.out_deps().iter().enumerate() {
            let slot = ChainIndex {
                from: chain.from,
                to: GroupIndex(k as u8),
            };
            view[slot.flat_index(groups)] = *out_dep;
        }
        view[chain.flat_index(groups)] = id;

        for group in (0..groups).map(GroupIndex) {
            if group == chain.from {
                continue;
            }
            let in_dep = header.deps.in_dep_for(group, chain.from);
            let in_view = &self.meta[&in_dep].view;
            for to in 0..groups {
                let slot = ChainIndex {
                    from: group,
                    to: GroupIndex(to),
                };
                view[slot.flat_index(groups)] = in_view[slot.flat_index(groups)];
            }
        }
        view
    }

    /// Weight is the total height of the cut: the sum over all chains of
    /// the view tip's height.
    fn view_weight(&self, view: &[BlockId], own_chain: ChainIndex, own_height: u64) -> u64 {
        let groups = self.params.groups();
        let own_idx = own_chain.flat_index(groups);
        view.iter()
            .enumerate()
            .map(|(idx, tip)| {
                if idx == own_idx {
                    own_height
                } else {
                    self.chains[idx].height_of(tip).expect("flow: view height")
                }
            })
            .sum()
    }

    fn install(&mut self, chain: ChainIndex, prepared: Prepared) -> AddedInfo {
        let Prepared {
            id,
            parent,
            height,
            weight,
            timestamp,
            target,
            view,
        } = prepared;

        let prune_interval = self.params.tips_prune_interval();
        let prune_age = self.params.tips_prune_duration_ms();

        let new_tip = self.dag_mut(chain).attach(id, parent, timestamp, target);
        self.meta.insert(
            id,
            FlowMeta {
                chain,
                weight,
                view,
            },
        );

        if self.dag(chain).insert_count() % prune_interval == 0 {
            let best = self.best_tip(chain);
            self.dag_mut(chain).prune_tips(best, timestamp, prune_age);
        }

        debug!(%id, %chain, %height, %weight, "added block to flow");

        AddedInfo {
            id,
            chain,
            height,
            weight,
            new_tip,
        }
    }
}
