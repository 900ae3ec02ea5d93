// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Outer Solana wire-format transaction parser.
//!
//! A serialized transaction is a compact-u16 signature count, that many
//! 64-byte signatures, and the message bytes. The first message byte
//! carries the version: high bit set means a versioned message (low bits
//! are the version number), otherwise the message is legacy.
//!
//! Only the surface the RPC responses need is parsed here: signatures and
//! the message version. The raw bytes themselves are what gets re-encoded
//! into responses.

use super::Signature;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("truncated transaction wire data")]
    Truncated,
    #[error("malformed compact-u16 length")]
    BadLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    Versioned(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub signatures: Vec<Signature>,
    pub version: MessageVersion,
}

pub fn parse(bytes: &[u8]) -> Result<ParsedTransaction, WireError> {
    let (count, consumed) = read_compact_u16(bytes)?;
    let mut offset = consumed;
    let mut signatures = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let end = offset.checked_add(64).ok_or(WireError::Truncated)?;
        let bytes: [u8; 64] = bytes
            .get(offset..end)
            .ok_or(WireError::Truncated)?
            .try_into()
            .expect("infallible");
        signatures.push(Signature(bytes));
        offset = end;
    }
    let &prefix = bytes.get(offset).ok_or(WireError::Truncated)?;
    let version = if prefix & 0x80 != 0 {
        MessageVersion::Versioned(prefix & 0x7F)
    } else {
        MessageVersion::Legacy
    };
    Ok(ParsedTransaction {
        signatures,
        version,
    })
}

// Little-endian base-128 with a continuation bit, at most three bytes.
fn read_compact_u16(bytes: &[u8]) -> Result<(u16, usize), WireError> {
    let mut value: u32 = 0;
    for (i, &byte) in bytes.iter().take(3).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            if value > u32::from(u16::MAX) {
                return Err(WireError::BadLength);
            }
            return Ok((value as u16, i + 1));
        }
    }
    if bytes.len() < 3 {
        Err(WireError::Truncated)
    } else {
        Err(WireError::BadLength)
    }
}
