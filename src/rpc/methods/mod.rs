// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod block;
pub mod transaction;

use crate::db::ArchiveDb;
use crate::error::ArchiveError;
use crate::ipld;
use crate::rpc::response::GetTransactionResponse;
use crate::solana::{
    self,
    transaction::{MessageVersion, ParsedTransaction},
};
use base64::{prelude::BASE64_STANDARD, Engine};
use positioned_io::ReadAt;
use serde_json::{json, Value};
use tokio::task::JoinError;
use tracing::warn;

/// Reassemble and parse one transaction node.
///
/// Data-side failures (frame fetch, wire parse, an empty signature list)
/// fail the caller. Metadata is best-effort past the frame fetch: a
/// payload that will not decompress or parse is logged and reported as an
/// absent `meta`.
pub(crate) fn parse_transaction_and_meta<R: ReadAt>(
    db: &ArchiveDb<R>,
    node: &ipld::Transaction,
) -> Result<(Vec<u8>, ParsedTransaction, Option<Value>), ArchiveError> {
    let raw = db.read_payload(&node.data)?;
    let parsed =
        solana::transaction::parse(&raw).map_err(|e| ArchiveError::Parser(e.to_string()))?;
    if parsed.signatures.is_empty() {
        return Err(ArchiveError::EmptySignatures);
    }

    let meta_bytes = db.read_payload(&node.metadata)?;
    let meta = if meta_bytes.is_empty() {
        None
    } else {
        match decode_status_meta(&meta_bytes) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(slot = node.slot, %error, "failed to parse transaction status metadata");
                None
            }
        }
    };
    Ok((raw, parsed, meta))
}

fn decode_status_meta(compressed: &[u8]) -> Result<Value, ArchiveError> {
    let decompressed = solana::decompress_zstd(compressed)?;
    solana::rewards::parse_transaction_status_meta(&decompressed)
        .map_err(|e| ArchiveError::Parser(e.to_string()))
}

pub(crate) fn transaction_response(
    raw: &[u8],
    parsed: &ParsedTransaction,
    meta: Option<Value>,
) -> GetTransactionResponse {
    GetTransactionResponse {
        block_time: None,
        meta,
        slot: None,
        transaction: (BASE64_STANDARD.encode(raw), "base64"),
        version: match parsed.version {
            MessageVersion::Legacy => json!("legacy"),
            MessageVersion::Versioned(version) => json!(version),
        },
    }
}

// Join failures only happen if a worker panicked or the runtime is
// shutting down.
pub(crate) fn join_error(error: JoinError) -> ArchiveError {
    ArchiveError::Io(std::io::Error::other(error))
}
