//! Nonce workers: scan a bounded slice of consecutive nonces per task.

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::mpsc;
use tracing::*;

use gridchain_primitives::group::ChainIndex;
use gridchain_state::block::Block;
use gridchain_state::header::Nonce;

use crate::template::BlockTemplate;

#[derive(Debug)]
pub struct MiningTask {
    pub template: BlockTemplate,
    pub epoch: u64,
}

#[derive(Debug)]
pub struct MiningResult {
    pub chain: ChainIndex,
    pub block: Option<Block>,
    pub mining_count: u64,
    pub epoch: u64,
    pub template: BlockTemplate,
}

/// Runs one worker: each task scans up to `nonce_step` nonces from a
/// random start and reports back, found or not.
pub fn worker_task(
    nonce_step: u64,
    mut task_rx: mpsc::Receiver<MiningTask>,
    result_tx: mpsc::Sender<super::coordinator::CoordMsg>,
) {
    while let Some(task) = task_rx.blocking_recv() {
        let result = mine_slice(&task.template, nonce_step, task.epoch);
        if result_tx
            .blocking_send(super::coordinator::CoordMsg::Result(result))
            .is_err()
        {
            break;
        }
    }
    trace!("mining worker exiting");
}

fn mine_slice(template: &BlockTemplate, nonce_step: u64, epoch: u64) -> MiningResult {
    let mut start = [0u8; 32];
    OsRng.fill_bytes(&mut start);
    let mut nonce = Nonce(start.into());

    let mut header = template.header_with_nonce(nonce);
    let mut tried = 0u64;
    while tried < nonce_step {
        header.nonce = nonce;
        tried += 1;
        if header.pow_ok() {
            debug!(chain = %template.chain, %tried, "found valid nonce");
            return MiningResult {
                chain: template.chain,
                block: Some(template.clone().into_block(nonce)),
                mining_count: tried,
                epoch,
                template: template.clone(),
            };
        }
        nonce = nonce.wrapping_next();
    }

    MiningResult {
        chain: template.chain,
        block: None,
        mining_count: tried,
        epoch,
        template: template.clone(),
    }
}
