// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use thiserror::Error;

/// Errors surfaced by the archive access layer.
///
/// Index misses are [`ArchiveError::NotFound`], never a zeroed value. All
/// other variants are deterministic for a given archive: the files are
/// immutable, so retrying a failed request cannot succeed.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("key not present in index")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CID mismatch: expected {expected}, observed {observed}")]
    CidMismatch { expected: Cid, observed: Cid },
    #[error("failed to decode node: {0}")]
    Decode(String),
    #[error("unknown node kind {0}")]
    UnknownKind(u64),
    #[error("frame count mismatch: declared {declared}, assembled {assembled}")]
    FrameCountMismatch { declared: u32, assembled: u32 },
    #[error("transaction has no signatures")]
    EmptySignatures,
    #[error("parser rejected payload: {0}")]
    Parser(String),
}

impl ArchiveError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        ArchiveError::Decode(msg.into())
    }
}
