// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! `getBlock`: walk the block DAG for a slot and materialize the full
//! response.
//!
//! The entry fan-out is the only concurrent stage. One task per entry,
//! bounded by the available parallelism; each task does its blocking
//! archive reads on the blocking pool. Transaction nodes accumulate in
//! arrival order under a mutex, exactly as wide as the fan-out requires.
//! Dropping the request future (client disconnect) drops the `JoinSet`
//! and with it every in-flight entry task.

use super::{join_error, parse_transaction_and_meta, transaction_response};
use crate::db::ArchiveDb;
use crate::error::ArchiveError;
use crate::rpc::error::{internal_error, invalid_params};
use crate::rpc::response::{
    rewrite_keys_lower_camel, GetBlockResponse, GetTransactionResponse,
};
use crate::rpc::RpcState;
use crate::solana;
use jsonrpsee::types::{ErrorObjectOwned, Params};
use parking_lot::Mutex;
use positioned_io::ReadAt;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, warn};

pub(crate) async fn get_block<R>(
    params: Params<'static>,
    state: Arc<RpcState<R>>,
) -> Result<Value, ErrorObjectOwned>
where
    R: ReadAt + Send + Sync + 'static,
{
    let slot = parse_slot(&params)?;
    debug!(slot, "getBlock");
    match assemble_block(state.db.clone(), slot).await {
        Ok(response) => {
            let value = serde_json::to_value(response).map_err(|_| internal_error())?;
            Ok(rewrite_keys_lower_camel(value))
        }
        Err(err) => {
            error!(slot, %err, "failed to get block");
            Err(internal_error())
        }
    }
}

fn parse_slot(params: &Params<'_>) -> Result<u64, ErrorObjectOwned> {
    // Positional params: `[slot, ...]`; trailing config entries are
    // accepted and ignored.
    let list: Vec<Value> = match params.parse() {
        Ok(list) => list,
        Err(_) => return Err(invalid_params()),
    };
    list.first()
        .and_then(Value::as_u64)
        .ok_or_else(invalid_params)
}

/// Materialize the response for one slot. See the module docs for the
/// concurrency shape.
pub async fn assemble_block<R>(
    db: Arc<ArchiveDb<R>>,
    slot: u64,
) -> Result<GetBlockResponse, ArchiveError>
where
    R: ReadAt + Send + Sync + 'static,
{
    let block = {
        let db = db.clone();
        task::spawn_blocking(move || db.get_block_by_slot(slot))
            .await
            .map_err(join_error)??
    };
    if block.entries.is_empty() {
        return Err(ArchiveError::decode("block has no entries"));
    }

    let parallelism = thread::available_parallelism().map_or(1, usize::from);
    let permits = Arc::new(Semaphore::new(parallelism));
    let transaction_nodes = Arc::new(Mutex::new(Vec::new()));

    let mut entry_tasks: JoinSet<Result<Option<[u8; 32]>, ArchiveError>> = JoinSet::new();
    let entry_count = block.entries.len();
    for (entry_index, entry_cid) in block.entries.iter().copied().enumerate() {
        let db = db.clone();
        let permits = permits.clone();
        let transaction_nodes = transaction_nodes.clone();
        let is_last = entry_index + 1 == entry_count;
        entry_tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?;
            task::spawn_blocking(move || {
                let entry = db.get_entry(&entry_cid)?;
                for transaction_cid in &entry.transactions {
                    match db.get_transaction(transaction_cid) {
                        Ok(node) => transaction_nodes.lock().push(node),
                        Err(err) => {
                            warn!(%transaction_cid, %err, "skipping undecodable transaction node");
                        }
                    }
                }
                Ok(is_last.then_some(entry.hash))
            })
            .await
            .map_err(join_error)?
        });
    }

    let mut last_entry_hash = None;
    while let Some(joined) = entry_tasks.join_next().await {
        if let Some(hash) = joined.map_err(join_error)?? {
            last_entry_hash = Some(hash);
        }
    }
    let blockhash =
        last_entry_hash.ok_or_else(|| ArchiveError::decode("block has no entries"))?;

    let rewards = match block.rewards {
        None => None,
        Some(rewards_cid) => {
            let db = db.clone();
            let value = task::spawn_blocking(move || -> Result<Value, ArchiveError> {
                let node = db.get_rewards(&rewards_cid)?;
                let payload = db.read_payload(&node.data)?;
                let decompressed = solana::decompress_zstd(&payload)?;
                let parsed = solana::rewards::parse_rewards(&decompressed)
                    .map_err(|e| ArchiveError::Parser(e.to_string()))?;
                postprocess_rewards(parsed)
            })
            .await
            .map_err(join_error)??;
            Some(value)
        }
    };

    let previous_blockhash = if block.meta.parent_slot != 0 {
        let db = db.clone();
        let parent_slot = block.meta.parent_slot;
        task::spawn_blocking(move || -> Result<String, ArchiveError> {
            let parent = db.get_block_by_slot(parent_slot)?;
            let last_entry_cid = parent
                .entries
                .last()
                .ok_or_else(|| ArchiveError::decode("parent block has no entries"))?;
            let entry = db.get_entry(last_entry_cid)?;
            Ok(solana::Hash(entry.hash).to_string())
        })
        .await
        .map_err(join_error)??
    } else {
        String::new()
    };

    let nodes = std::mem::take(&mut *transaction_nodes.lock());
    let transactions = {
        let db = db.clone();
        task::spawn_blocking(move || -> Result<Vec<GetTransactionResponse>, ArchiveError> {
            let mut out = Vec::with_capacity(nodes.len());
            for node in &nodes {
                let (raw, parsed, meta) = parse_transaction_and_meta(&db, node)?;
                out.push(transaction_response(&raw, &parsed, meta));
            }
            Ok(out)
        })
        .await
        .map_err(join_error)??
    };

    Ok(GetBlockResponse {
        // Not derivable from the archive alone; upstream leaves it unset.
        block_height: 0,
        block_time: block.meta.blocktime,
        blockhash: solana::Hash(blockhash).to_string(),
        parent_slot: block.meta.parent_slot,
        previous_blockhash,
        rewards,
        transactions,
    })
}

/// Shape the parsed rewards payload for the response: unwrap the inner
/// array, rename the balance and type keys, stringify numeric reward
/// types, and pin `commission` to null.
fn postprocess_rewards(parsed: Value) -> Result<Value, ArchiveError> {
    let Value::Object(mut map) = parsed else {
        return Err(ArchiveError::Parser("rewards payload is not an object".into()));
    };
    let Some(Value::Array(mut rewards)) = map.remove("rewards") else {
        return Err(ArchiveError::Parser("rewards payload has no rewards array".into()));
    };
    for reward in &mut rewards {
        let Value::Object(entry) = reward else {
            continue;
        };
        entry.insert("commission".into(), Value::Null);
        if let Some(post_balance) = entry.remove("post_balance") {
            entry.insert("postBalance".into(), post_balance);
        }
        if let Some(reward_type) = entry.remove("reward_type") {
            let reward_type = match reward_type.as_i64() {
                Some(n) => Value::String(reward_type_name(n).into()),
                None => reward_type,
            };
            entry.insert("rewardType".into(), reward_type);
        }
    }
    Ok(Value::Array(rewards))
}

fn reward_type_name(reward_type: i64) -> &'static str {
    match reward_type {
        1 => "Fee",
        2 => "Rent",
        3 => "Staking",
        4 => "Voting",
        _ => "Unknown",
    }
}
