// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Protobuf parsers for the storage-side reward and transaction-status
//! payloads.
//!
//! The messages mirror the upstream confirmed-block storage protos; the
//! status message carries the subset of fields this service re-emits, and
//! unknown fields are skipped during decode, so richer archives still
//! parse. Values serialize the way an upstream JSON marshal of the
//! generated structs would: snake_case keys, zero-valued fields omitted,
//! enums as numbers. The one exception is the top-level rewards list,
//! which is kept even when empty so consumers can distinguish "no
//! rewards" from a malformed payload.

use prost::Message;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, PartialEq, Message, Serialize)]
pub struct Rewards {
    // Always serialized: a rewards blob with zero entries must still
    // shape into an empty array downstream, not a missing key.
    #[prost(message, repeated, tag = "1")]
    pub rewards: Vec<Reward>,
}

#[derive(Clone, PartialEq, Message, Serialize)]
pub struct Reward {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pubkey: String,
    #[prost(int64, tag = "2")]
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub lamports: i64,
    #[prost(uint64, tag = "3")]
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub post_balance: u64,
    #[prost(enumeration = "RewardType", tag = "4")]
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub reward_type: i32,
    #[prost(string, tag = "5")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub commission: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RewardType {
    Unspecified = 0,
    Fee = 1,
    Rent = 2,
    Staking = 3,
    Voting = 4,
}

#[derive(Clone, PartialEq, Message, Serialize)]
pub struct TransactionStatusMeta {
    #[prost(uint64, tag = "2")]
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub fee: u64,
    #[prost(uint64, repeated, tag = "3")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_balances: Vec<u64>,
    #[prost(uint64, repeated, tag = "4")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_balances: Vec<u64>,
    #[prost(string, repeated, tag = "6")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_messages: Vec<String>,
    #[prost(message, repeated, tag = "9")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rewards: Vec<Reward>,
    #[prost(uint64, optional, tag = "16")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_units_consumed: Option<u64>,
}

fn is_zero_i64(n: &i64) -> bool {
    *n == 0
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

fn is_zero_i32(n: &i32) -> bool {
    *n == 0
}

/// Parse a decompressed rewards payload into its JSON shape.
pub fn parse_rewards(bytes: &[u8]) -> Result<Value, prost::DecodeError> {
    let rewards = Rewards::decode(bytes)?;
    Ok(serde_json::to_value(rewards).expect("reward messages always serialize"))
}

/// Parse a decompressed transaction-status payload into its JSON shape.
pub fn parse_transaction_status_meta(bytes: &[u8]) -> Result<Value, prost::DecodeError> {
    let meta = TransactionStatusMeta::decode(bytes)?;
    Ok(serde_json::to_value(meta).expect("status messages always serialize"))
}
