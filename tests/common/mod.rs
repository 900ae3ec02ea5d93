// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! In-memory archive fixtures: a CAR byte buffer plus the three indexes,
//! built bottom-up the same way the production ingest tooling lays them
//! out.

// Each test binary uses its own subset of the fixture helpers.
#![allow(dead_code)]

use cid::Cid;
use integer_encoding::VarIntWriter as _;
use ipld_core::ipld::Ipld;
use multihash_codetable::{Code, MultihashDigest};
use prost::Message as _;
use rpc_server_car::db::index::CompactIndexBuilder;
use rpc_server_car::db::ArchiveDb;
use rpc_server_car::ipld::placeholder_rewards_cid;
use rpc_server_car::solana::rewards::{Reward, Rewards, RewardType, TransactionStatusMeta};
use serde::Serialize;

const DAG_CBOR: u64 = 0x71;

#[derive(Default)]
pub struct ArchiveBuilder {
    records: Vec<(Cid, Vec<u8>)>,
    slots: Vec<(u64, Cid)>,
    signatures: Vec<([u8; 64], Cid)>,
}

#[derive(Serialize)]
struct CarHeader {
    roots: Vec<Cid>,
    version: u64,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, ipld: &Ipld) -> Cid {
        let bytes = serde_ipld_dagcbor::to_vec(ipld).unwrap();
        let cid = Cid::new_v1(DAG_CBOR, Code::Sha2_256.digest(&bytes));
        self.records.push((cid, bytes));
        cid
    }

    /// Split `payload` into exactly `frames` chunks. Continuation frames
    /// become archive nodes; the returned head is the inline tuple that
    /// gets embedded in a transaction or rewards node.
    pub fn data_frames(&mut self, payload: &[u8], frames: usize) -> Ipld {
        if frames <= 1 {
            return frame_short(payload);
        }
        assert!(payload.len() >= frames, "payload too small to split");
        let chunks = split_n(payload, frames);
        let next: Vec<Cid> = chunks[1..]
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                self.add_node(&frame_full(i as u32 + 1, frames as u32, chunk, &[]))
            })
            .collect();
        frame_full(0, frames as u32, chunks[0], &next)
    }

    pub fn add_transaction(
        &mut self,
        data: Ipld,
        metadata: Ipld,
        slot: u64,
        signature: [u8; 64],
    ) -> Cid {
        let cid = self.add_node(&Ipld::List(vec![
            Ipld::Integer(0),
            data,
            metadata,
            Ipld::Integer(slot as i128),
        ]));
        self.signatures.push((signature, cid));
        cid
    }

    pub fn add_entry(&mut self, hash: [u8; 32], transactions: Vec<Cid>) -> Cid {
        self.add_node(&Ipld::List(vec![
            Ipld::Integer(1),
            Ipld::Bytes(hash.to_vec()),
            Ipld::List(transactions.into_iter().map(Ipld::Link).collect()),
        ]))
    }

    pub fn add_rewards(&mut self, slot: u64, data: Ipld) -> Cid {
        self.add_node(&Ipld::List(vec![
            Ipld::Integer(5),
            Ipld::Integer(slot as i128),
            data,
        ]))
    }

    pub fn add_block(
        &mut self,
        slot: u64,
        parent_slot: u64,
        blocktime: i64,
        entries: Vec<Cid>,
        rewards: Option<Cid>,
    ) -> Cid {
        let cid = self.add_node(&Ipld::List(vec![
            Ipld::Integer(2),
            Ipld::Integer(slot as i128),
            Ipld::List(vec![]),
            Ipld::List(entries.into_iter().map(Ipld::Link).collect()),
            Ipld::List(vec![
                Ipld::Integer(parent_slot as i128),
                Ipld::Integer(blocktime as i128),
            ]),
            Ipld::Link(rewards.unwrap_or_else(placeholder_rewards_cid)),
        ]));
        self.slots.push((slot, cid));
        cid
    }

    pub fn build(self) -> ArchiveDb<Vec<u8>> {
        let (car, cid_index, slot_index, sig_index) = self.build_bytes();
        ArchiveDb::new(car, cid_index, slot_index, sig_index).unwrap()
    }

    /// The raw archive files: CAR, CID→offset, slot→CID, signature→CID.
    pub fn build_bytes(self) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
        let root = self.records.first().expect("fixture has no nodes").0;
        let header = serde_ipld_dagcbor::to_vec(&CarHeader {
            roots: vec![root],
            version: 1,
        })
        .unwrap();
        let mut car = Vec::new();
        car.write_varint(header.len() as u64).unwrap();
        car.extend_from_slice(&header);

        let mut locations = Vec::with_capacity(self.records.len());
        for (cid, payload) in &self.records {
            let offset = car.len() as u64;
            let cid_bytes = cid.to_bytes();
            car.write_varint((cid_bytes.len() + payload.len()) as u64)
                .unwrap();
            car.extend_from_slice(&cid_bytes);
            car.extend_from_slice(payload);
            locations.push((cid_bytes, offset));
        }

        let mut cid_index = Vec::new();
        CompactIndexBuilder::new(
            locations
                .iter()
                .map(|(cid_bytes, offset)| (cid_bytes.as_slice(), offset.to_le_bytes())),
        )
        .write(&mut cid_index)
        .unwrap();

        let mut slot_index = Vec::new();
        CompactIndexBuilder::new(
            self.slots
                .iter()
                .map(|(slot, cid)| (slot.to_le_bytes(), cid_value(cid))),
        )
        .write(&mut slot_index)
        .unwrap();

        let mut sig_index = Vec::new();
        CompactIndexBuilder::new(
            self.signatures
                .iter()
                .map(|(signature, cid)| (signature.as_slice(), cid_value(cid))),
        )
        .write(&mut sig_index)
        .unwrap();

        (car, cid_index, slot_index, sig_index)
    }
}

fn cid_value(cid: &Cid) -> [u8; 36] {
    cid.to_bytes().try_into().expect("fixture CIDs are 36 bytes")
}

fn split_n(payload: &[u8], n: usize) -> Vec<&[u8]> {
    let base = payload.len() / n;
    let extra = payload.len() % n;
    let mut out = Vec::with_capacity(n);
    let mut offset = 0;
    for i in 0..n {
        let len = base + usize::from(i < extra);
        out.push(&payload[offset..offset + len]);
        offset += len;
    }
    out
}

fn frame_short(data: &[u8]) -> Ipld {
    Ipld::List(vec![Ipld::Integer(6), Ipld::Bytes(data.to_vec())])
}

fn frame_full(index: u32, total: u32, data: &[u8], next: &[Cid]) -> Ipld {
    Ipld::List(vec![
        Ipld::Integer(6),
        Ipld::Null,
        Ipld::Integer(index as i128),
        Ipld::Integer(total as i128),
        Ipld::Bytes(data.to_vec()),
        if next.is_empty() {
            Ipld::Null
        } else {
            Ipld::List(next.iter().copied().map(Ipld::Link).collect())
        },
    ])
}

/// A minimal legacy transaction: one signature, then a tiny message.
pub fn wire_transaction(signature: [u8; 64]) -> Vec<u8> {
    let mut out = vec![1];
    out.extend_from_slice(&signature);
    out.extend_from_slice(&[3, 0, 1, 42]);
    out
}

/// Same, with a v0 versioned message.
pub fn wire_transaction_v0(signature: [u8; 64]) -> Vec<u8> {
    let mut out = vec![1];
    out.extend_from_slice(&signature);
    out.extend_from_slice(&[0x80, 3, 0, 1]);
    out
}

pub fn signature(seed: u64) -> [u8; 64] {
    let mut sig = [0xA5; 64];
    sig[..8].copy_from_slice(&seed.to_le_bytes());
    sig
}

/// A compressed transaction-status payload.
pub fn meta_blob(fee: u64) -> Vec<u8> {
    let meta = TransactionStatusMeta {
        fee,
        pre_balances: vec![100, 200],
        post_balances: vec![90, 210],
        log_messages: vec!["Program log: ok".into()],
        rewards: vec![],
        compute_units_consumed: Some(99),
    };
    zstd::stream::encode_all(meta.encode_to_vec().as_slice(), 0).unwrap()
}

/// A compressed rewards payload with one staking reward.
pub fn rewards_blob() -> Vec<u8> {
    let rewards = Rewards {
        rewards: vec![Reward {
            pubkey: "validator111111111111111111111111".into(),
            lamports: 5_000,
            post_balance: 1_000_000,
            reward_type: RewardType::Staking as i32,
            commission: String::new(),
        }],
    };
    zstd::stream::encode_all(rewards.encode_to_vec().as_slice(), 0).unwrap()
}
