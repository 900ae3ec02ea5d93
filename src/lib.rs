// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod db;
pub mod error;
pub mod ipld;
pub mod rpc;
pub mod solana;

pub use error::ArchiveError;
