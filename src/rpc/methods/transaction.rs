// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! `getTransaction`: resolve a signature to its transaction node and
//! return the single-transaction response shape.

use super::{join_error, parse_transaction_and_meta, transaction_response};
use crate::db::ArchiveDb;
use crate::error::ArchiveError;
use crate::rpc::error::{internal_error, invalid_params};
use crate::rpc::response::{rewrite_keys_lower_camel, GetTransactionResponse};
use crate::rpc::RpcState;
use crate::solana::Signature;
use jsonrpsee::types::{ErrorObjectOwned, Params};
use positioned_io::ReadAt;
use serde_json::Value;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, error};

pub(crate) async fn get_transaction<R>(
    params: Params<'static>,
    state: Arc<RpcState<R>>,
) -> Result<Value, ErrorObjectOwned>
where
    R: ReadAt + Send + Sync + 'static,
{
    let signature = parse_signature(&params)?;
    debug!(%signature, "getTransaction");
    match fetch_transaction(state.db.clone(), signature).await {
        Ok(response) => {
            let value = serde_json::to_value(response).map_err(|_| internal_error())?;
            Ok(rewrite_keys_lower_camel(value))
        }
        Err(err) => {
            error!(%signature, %err, "failed to get transaction");
            Err(internal_error())
        }
    }
}

fn parse_signature(params: &Params<'_>) -> Result<Signature, ErrorObjectOwned> {
    let list: Vec<Value> = match params.parse() {
        Ok(list) => list,
        Err(_) => return Err(invalid_params()),
    };
    list.first()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid_params)
}

pub async fn fetch_transaction<R>(
    db: Arc<ArchiveDb<R>>,
    signature: Signature,
) -> Result<GetTransactionResponse, ArchiveError>
where
    R: ReadAt + Send + Sync + 'static,
{
    task::spawn_blocking(move || {
        let cid = db.find_cid_from_signature(&signature)?;
        let node = db.get_transaction(&cid)?;
        let (raw, parsed, meta) = parse_transaction_and_meta(&db, &node)?;
        Ok(transaction_response(&raw, &parsed, meta))
    })
    .await
    .map_err(join_error)?
}
