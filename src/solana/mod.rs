// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Collaborators from the Solana side of the fence: base58 byte-string
//! types, the transaction wire parser, the storage protobuf parsers, and
//! Zstandard decompression. The archive access layer treats all of these
//! as opaque byte→struct functions.

pub mod rewards;
pub mod transaction;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An Ed25519 transaction signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0[..]).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

#[derive(Debug, Error)]
#[error("invalid base58 signature")]
pub struct InvalidSignature;

impl FromStr for Signature {
    type Err = InvalidSignature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s).into_vec().map_err(|_| InvalidSignature)?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| InvalidSignature)?;
        Ok(Signature(bytes))
    }
}

/// A 32-byte hash rendered as base58 (entry hashes, blockhashes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Hash(pub [u8; 32]);

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0[..]).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

/// Decompress a complete Zstandard stream into memory.
pub fn decompress_zstd(data: &[u8]) -> std::io::Result<Vec<u8>> {
    zstd::stream::decode_all(data)
}
