// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Typed decoders for the archive's DAG-CBOR node kinds.
//!
//! Every node is a DAG-CBOR tuple whose first element is an integer
//! discriminator. Five kinds appear in the block DAG served here; the
//! ledger format reserves further discriminators for epoch-level nodes
//! that this service never traverses, and those decode as
//! [`ArchiveError::UnknownKind`].
//!
//! Decoders are pure: they read bytes, allocate the returned record, and
//! never touch the archive or the indexes.

pub mod frame;

use crate::error::ArchiveError;
use cid::Cid;
use ipld_core::ipld::Ipld;

/// Node kind discriminators as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Transaction = 0,
    Entry = 1,
    Block = 2,
    Rewards = 5,
    DataFrame = 6,
}

impl Kind {
    fn from_u64(raw: u64) -> Option<Kind> {
        match raw {
            0 => Some(Kind::Transaction),
            1 => Some(Kind::Entry),
            2 => Some(Kind::Block),
            5 => Some(Kind::Rewards),
            6 => Some(Kind::DataFrame),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Transaction => "Transaction",
            Kind::Entry => "Entry",
            Kind::Block => "Block",
            Kind::Rewards => "Rewards",
            Kind::DataFrame => "DataFrame",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Block(Block),
    Entry(Entry),
    Transaction(Transaction),
    Rewards(Rewards),
    DataFrame(DataFrame),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub slot: u64,
    pub entries: Vec<Cid>,
    pub meta: SlotMeta,
    /// `None` when the block carries the placeholder rewards link.
    pub rewards: Option<Cid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMeta {
    pub parent_slot: u64,
    /// `None` when the archive encodes a null blocktime; surfaces as a
    /// null `blockTime` in responses.
    pub blocktime: Option<i64>,
    pub block_height: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub hash: [u8; 32],
    pub transactions: Vec<Cid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub data: DataFrame,
    pub metadata: DataFrame,
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewards {
    pub slot: u64,
    pub data: DataFrame,
}

/// One chunk of a logically larger payload. The head frame of a payload
/// has the same shape; `total == 1` means the head alone is the whole
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub data: Vec<u8>,
    pub total: u32,
    pub index: u32,
    pub next: Vec<Cid>,
}

/// Link value used where a block has no rewards: CIDv1, raw codec,
/// identity hash over the empty string (`bafkqaaa`).
pub fn placeholder_rewards_cid() -> Cid {
    Cid::try_from([0x01, 0x55, 0x00, 0x00].as_slice()).expect("placeholder CID is well-formed")
}

fn is_placeholder(cid: &Cid) -> bool {
    *cid == placeholder_rewards_cid()
}

/// Decode any node, dispatching on the discriminator.
pub fn decode(bytes: &[u8]) -> Result<Node, ArchiveError> {
    let (kind, fields) = parse_tuple(bytes)?;
    Ok(match kind {
        Kind::Block => Node::Block(Block::from_fields(fields)?),
        Kind::Entry => Node::Entry(Entry::from_fields(fields)?),
        Kind::Transaction => Node::Transaction(Transaction::from_fields(fields)?),
        Kind::Rewards => Node::Rewards(Rewards::from_fields(fields)?),
        Kind::DataFrame => Node::DataFrame(DataFrame::from_fields(fields)?),
    })
}

pub fn decode_block(bytes: &[u8]) -> Result<Block, ArchiveError> {
    let fields = parse_tuple_of(bytes, Kind::Block)?;
    Block::from_fields(fields)
}

pub fn decode_entry(bytes: &[u8]) -> Result<Entry, ArchiveError> {
    let fields = parse_tuple_of(bytes, Kind::Entry)?;
    Entry::from_fields(fields)
}

pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, ArchiveError> {
    let fields = parse_tuple_of(bytes, Kind::Transaction)?;
    Transaction::from_fields(fields)
}

pub fn decode_rewards(bytes: &[u8]) -> Result<Rewards, ArchiveError> {
    let fields = parse_tuple_of(bytes, Kind::Rewards)?;
    Rewards::from_fields(fields)
}

pub fn decode_data_frame(bytes: &[u8]) -> Result<DataFrame, ArchiveError> {
    let fields = parse_tuple_of(bytes, Kind::DataFrame)?;
    DataFrame::from_fields(fields)
}

fn parse_tuple(bytes: &[u8]) -> Result<(Kind, Vec<Ipld>), ArchiveError> {
    let ipld: Ipld =
        serde_ipld_dagcbor::from_slice(bytes).map_err(|e| ArchiveError::Decode(e.to_string()))?;
    let Ipld::List(fields) = ipld else {
        return Err(ArchiveError::decode("node is not a tuple"));
    };
    let raw = match fields.first() {
        Some(Ipld::Integer(raw)) => u64::try_from(*raw)
            .map_err(|_| ArchiveError::decode("node discriminator is out of range"))?,
        _ => return Err(ArchiveError::decode("node tuple has no discriminator")),
    };
    let kind = Kind::from_u64(raw).ok_or(ArchiveError::UnknownKind(raw))?;
    Ok((kind, fields))
}

fn parse_tuple_of(bytes: &[u8], expected: Kind) -> Result<Vec<Ipld>, ArchiveError> {
    let (kind, fields) = parse_tuple(bytes)?;
    if kind != expected {
        return Err(ArchiveError::Decode(format!(
            "expected {} node, found {}",
            expected.name(),
            kind.name()
        )));
    }
    Ok(fields)
}

impl Block {
    fn from_fields(fields: Vec<Ipld>) -> Result<Block, ArchiveError> {
        let [_kind, slot, shredding, entries, meta, rewards] = take_fields(fields, "Block")?;
        // Shredding layout is carried by the archive but not consumed
        // here; only its shape is checked.
        as_list(shredding, "Block.shredding")?;
        let rewards = as_link(&rewards, "Block.rewards")?;
        Ok(Block {
            slot: as_u64(&slot, "Block.slot")?,
            entries: as_links(entries, "Block.entries")?,
            meta: SlotMeta::from_ipld(meta)?,
            rewards: (!is_placeholder(&rewards)).then_some(rewards),
        })
    }
}

impl SlotMeta {
    fn from_ipld(ipld: Ipld) -> Result<SlotMeta, ArchiveError> {
        let fields = as_list(ipld, "Block.meta")?;
        let (parent_slot, blocktime, block_height) = match fields.as_slice() {
            [parent_slot, blocktime] => (parent_slot, blocktime, None),
            [parent_slot, blocktime, block_height] => {
                (parent_slot, blocktime, as_optional_u64(block_height, "Block.meta.block_height")?)
            }
            other => {
                return Err(ArchiveError::Decode(format!(
                    "Block.meta must have 2 or 3 fields, found {}",
                    other.len()
                )))
            }
        };
        Ok(SlotMeta {
            parent_slot: as_u64(parent_slot, "Block.meta.parent_slot")?,
            blocktime: as_optional_i64(blocktime, "Block.meta.blocktime")?,
            block_height,
        })
    }
}

impl Entry {
    fn from_fields(fields: Vec<Ipld>) -> Result<Entry, ArchiveError> {
        let [_kind, hash, transactions] = take_fields(fields, "Entry")?;
        let hash = as_bytes(hash, "Entry.hash")?;
        let hash: [u8; 32] = hash
            .try_into()
            .map_err(|_| ArchiveError::decode("Entry.hash must be 32 bytes"))?;
        Ok(Entry {
            hash,
            transactions: as_links(transactions, "Entry.transactions")?,
        })
    }
}

impl Transaction {
    fn from_fields(fields: Vec<Ipld>) -> Result<Transaction, ArchiveError> {
        // The trailing transaction index is optional in the archive
        // layout; it is positional metadata this service does not emit.
        let (data, metadata, slot) = match fields.len() {
            4 => {
                let [_kind, data, metadata, slot] = take_fields(fields, "Transaction")?;
                (data, metadata, slot)
            }
            5 => {
                let [_kind, data, metadata, slot, index]: [Ipld; 5] =
                    take_fields(fields, "Transaction")?;
                as_optional_u64(&index, "Transaction.index")?;
                (data, metadata, slot)
            }
            n => {
                return Err(ArchiveError::Decode(format!(
                    "Transaction node must have 4 or 5 fields, found {n}"
                )))
            }
        };
        Ok(Transaction {
            data: DataFrame::from_ipld(data)?,
            metadata: DataFrame::from_ipld(metadata)?,
            slot: as_u64(&slot, "Transaction.slot")?,
        })
    }
}

impl Rewards {
    fn from_fields(fields: Vec<Ipld>) -> Result<Rewards, ArchiveError> {
        let [_kind, slot, data] = take_fields(fields, "Rewards")?;
        Ok(Rewards {
            slot: as_u64(&slot, "Rewards.slot")?,
            data: DataFrame::from_ipld(data)?,
        })
    }
}

impl DataFrame {
    fn from_fields(fields: Vec<Ipld>) -> Result<DataFrame, ArchiveError> {
        match fields.len() {
            // Short form: a single-frame payload.
            2 => {
                let [_kind, data] = take_fields(fields, "DataFrame")?;
                Ok(DataFrame {
                    data: as_bytes(data, "DataFrame.data")?,
                    total: 1,
                    index: 0,
                    next: Vec::new(),
                })
            }
            6 => {
                let [_kind, hash, index, total, data, next] = take_fields(fields, "DataFrame")?;
                // The frame content hash is a write-side integrity field;
                // shape-checked, not retained.
                as_optional_u64(&hash, "DataFrame.hash")?;
                Ok(DataFrame {
                    data: as_bytes(data, "DataFrame.data")?,
                    total: as_optional_u32(&total, "DataFrame.total")?.unwrap_or(1),
                    index: as_optional_u32(&index, "DataFrame.index")?.unwrap_or(0),
                    next: match next {
                        Ipld::Null => Vec::new(),
                        other => as_links(other, "DataFrame.next")?,
                    },
                })
            }
            n => Err(ArchiveError::Decode(format!(
                "DataFrame node must have 2 or 6 fields, found {n}"
            ))),
        }
    }

    /// Decode a frame embedded in another node (the `data`/`metadata`
    /// heads); embedded frames carry the same tuple shape, discriminator
    /// included.
    fn from_ipld(ipld: Ipld) -> Result<DataFrame, ArchiveError> {
        let fields = as_list(ipld, "DataFrame")?;
        match fields.first() {
            Some(Ipld::Integer(raw)) if *raw == Kind::DataFrame as i128 => {}
            _ => return Err(ArchiveError::decode("embedded frame has a bad discriminator")),
        }
        DataFrame::from_fields(fields)
    }
}

fn take_fields<const N: usize>(fields: Vec<Ipld>, node: &str) -> Result<[Ipld; N], ArchiveError> {
    let found = fields.len();
    fields.try_into().map_err(|_| {
        ArchiveError::Decode(format!("{node} node must have {N} fields, found {found}"))
    })
}

fn as_u64(ipld: &Ipld, what: &str) -> Result<u64, ArchiveError> {
    match ipld {
        Ipld::Integer(n) => {
            u64::try_from(*n).map_err(|_| ArchiveError::Decode(format!("{what} is out of range")))
        }
        _ => Err(ArchiveError::Decode(format!("{what} is not an integer"))),
    }
}

fn as_i64(ipld: &Ipld, what: &str) -> Result<i64, ArchiveError> {
    match ipld {
        Ipld::Integer(n) => {
            i64::try_from(*n).map_err(|_| ArchiveError::Decode(format!("{what} is out of range")))
        }
        _ => Err(ArchiveError::Decode(format!("{what} is not an integer"))),
    }
}

fn as_optional_u64(ipld: &Ipld, what: &str) -> Result<Option<u64>, ArchiveError> {
    match ipld {
        Ipld::Null => Ok(None),
        other => as_u64(other, what).map(Some),
    }
}

fn as_optional_i64(ipld: &Ipld, what: &str) -> Result<Option<i64>, ArchiveError> {
    match ipld {
        Ipld::Null => Ok(None),
        other => as_i64(other, what).map(Some),
    }
}

fn as_optional_u32(ipld: &Ipld, what: &str) -> Result<Option<u32>, ArchiveError> {
    match as_optional_u64(ipld, what)? {
        None => Ok(None),
        Some(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| ArchiveError::Decode(format!("{what} is out of range"))),
    }
}

fn as_bytes(ipld: Ipld, what: &str) -> Result<Vec<u8>, ArchiveError> {
    match ipld {
        Ipld::Bytes(bytes) => Ok(bytes),
        _ => Err(ArchiveError::Decode(format!("{what} is not a byte string"))),
    }
}

fn as_list(ipld: Ipld, what: &str) -> Result<Vec<Ipld>, ArchiveError> {
    match ipld {
        Ipld::List(list) => Ok(list),
        _ => Err(ArchiveError::Decode(format!("{what} is not a list"))),
    }
}

fn as_link(ipld: &Ipld, what: &str) -> Result<Cid, ArchiveError> {
    match ipld {
        Ipld::Link(cid) => Ok(*cid),
        _ => Err(ArchiveError::Decode(format!("{what} is not a link"))),
    }
}

fn as_links(ipld: Ipld, what: &str) -> Result<Vec<Cid>, ArchiveError> {
    as_list(ipld, what)?
        .iter()
        .map(|item| as_link(item, what))
        .collect()
}
