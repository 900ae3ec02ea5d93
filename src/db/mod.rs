// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The open archive: one CAR file and its three lookup indexes.
//!
//! Everything here is opened once at startup and shared immutably for the
//! life of the process; all reads are positional, so an [`ArchiveDb`] is
//! freely shared across request handlers without locking.

pub mod car;
pub mod index;

use crate::error::ArchiveError;
use crate::ipld::{self, frame};
use crate::solana::Signature;
use anyhow::Context as _;
use car::CarFile;
use cid::Cid;
use index::{CompactIndex, CID_WIDTH, OFFSET_WIDTH};
use positioned_io::ReadAt;
use std::fs::File;
use std::path::Path;
use tracing::error;

pub struct ArchiveDb<R> {
    car: CarFile<R>,
    cid_to_offset: CompactIndex<R, OFFSET_WIDTH>,
    slot_to_cid: CompactIndex<R, CID_WIDTH>,
    sig_to_cid: CompactIndex<R, CID_WIDTH>,
}

impl ArchiveDb<File> {
    pub fn open(
        car_path: &Path,
        cid_to_offset_path: &Path,
        slot_to_cid_path: &Path,
        sig_to_cid_path: &Path,
    ) -> anyhow::Result<Self> {
        let open = |path: &Path| {
            File::open(path).with_context(|| format!("failed to open {}", path.display()))
        };
        Ok(ArchiveDb {
            car: CarFile::new(open(car_path)?)
                .with_context(|| format!("failed to open CAR file {}", car_path.display()))?,
            cid_to_offset: CompactIndex::open(open(cid_to_offset_path)?)
                .context("failed to open CID-to-offset index")?,
            slot_to_cid: CompactIndex::open(open(slot_to_cid_path)?)
                .context("failed to open slot-to-CID index")?,
            sig_to_cid: CompactIndex::open(open(sig_to_cid_path)?)
                .context("failed to open signature-to-CID index")?,
        })
    }
}

impl<R: ReadAt> ArchiveDb<R> {
    pub fn new(
        car: R,
        cid_to_offset: R,
        slot_to_cid: R,
        sig_to_cid: R,
    ) -> Result<Self, ArchiveError> {
        Ok(ArchiveDb {
            car: CarFile::new(car)?,
            cid_to_offset: CompactIndex::open(cid_to_offset)?,
            slot_to_cid: CompactIndex::open(slot_to_cid)?,
            sig_to_cid: CompactIndex::open(sig_to_cid)?,
        })
    }

    pub fn find_cid_from_slot(&self, slot: u64) -> Result<Cid, ArchiveError> {
        self.cid_from_candidates(self.slot_to_cid.lookup(&slot.to_le_bytes())?)
    }

    pub fn find_cid_from_signature(&self, signature: &Signature) -> Result<Cid, ArchiveError> {
        self.cid_from_candidates(self.sig_to_cid.lookup(signature.as_bytes())?)
    }

    fn cid_from_candidates(
        &self,
        candidates: smallvec::SmallVec<[[u8; CID_WIDTH]; 1]>,
    ) -> Result<Cid, ArchiveError> {
        let bytes = candidates.first().ok_or(ArchiveError::NotFound)?;
        Cid::try_from(&bytes[..])
            .map_err(|e| ArchiveError::Decode(format!("index holds an invalid CID: {e}")))
    }

    /// Fetch a node's bytes by CID: offset lookup, then a verified CAR
    /// record read. With several candidate offsets (hash collision in the
    /// index), the one naming `cid` wins.
    pub fn get_node(&self, cid: &Cid) -> Result<Vec<u8>, ArchiveError> {
        let candidates = self.cid_to_offset.lookup(&cid.to_bytes())?;
        if candidates.is_empty() {
            return Err(ArchiveError::NotFound);
        }
        let mut mismatch = None;
        for value in candidates {
            match self.car.read_at(u64::from_le_bytes(value), cid) {
                Ok(data) => return Ok(data),
                Err(err @ ArchiveError::CidMismatch { .. }) => mismatch = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(mismatch.unwrap_or(ArchiveError::NotFound))
    }

    pub fn get_block(&self, cid: &Cid) -> Result<ipld::Block, ArchiveError> {
        ipld::decode_block(&self.get_node(cid)?)
    }

    pub fn get_block_by_slot(&self, slot: u64) -> Result<ipld::Block, ArchiveError> {
        let cid = self.find_cid_from_slot(slot)?;
        self.get_block(&cid)
    }

    pub fn get_entry(&self, cid: &Cid) -> Result<ipld::Entry, ArchiveError> {
        ipld::decode_entry(&self.get_node(cid)?)
    }

    pub fn get_transaction(&self, cid: &Cid) -> Result<ipld::Transaction, ArchiveError> {
        ipld::decode_transaction(&self.get_node(cid)?)
    }

    pub fn get_rewards(&self, cid: &Cid) -> Result<ipld::Rewards, ArchiveError> {
        ipld::decode_rewards(&self.get_node(cid)?)
    }

    pub fn get_data_frame(&self, cid: &Cid) -> Result<ipld::DataFrame, ArchiveError> {
        ipld::decode_data_frame(&self.get_node(cid)?)
    }

    /// Reassemble the logical payload behind a head frame, fetching
    /// continuation frames from the archive.
    pub fn read_payload(&self, head: &ipld::DataFrame) -> Result<Vec<u8>, ArchiveError> {
        frame::reassemble(head, |cid| {
            self.get_data_frame(cid).map_err(|err| {
                error!(%cid, %err, "failed to fetch continuation frame");
                err
            })
        })
    }
}
