// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Entry, IndexHeader, KeyHash, Slot};
use std::io::{Result, Write};

/// In-memory construction of a [`super::CompactIndex`] table.
///
/// The service itself never writes indexes; this exists for index creation
/// tooling and for test fixtures.
#[derive(Debug)]
pub struct CompactIndexBuilder<const W: usize> {
    table: Vec<Slot<W>>,
    longest_distance: u64,
    collisions: u64,
    capacity: usize,
}

impl<const W: usize> CompactIndexBuilder<W> {
    /// Table length for a given entry count, leaving headroom so probe
    /// chains stay short.
    pub fn capacity_at(len: usize) -> usize {
        len * 100 / 81
    }

    pub fn new<K: AsRef<[u8]>>(
        values: impl ExactSizeIterator<Item = (K, [u8; W])>,
    ) -> CompactIndexBuilder<W> {
        Self::from_hashes(values.map(|(key, value)| (KeyHash::of(key.as_ref()), value)))
    }

    pub fn from_hashes(
        values: impl ExactSizeIterator<Item = (KeyHash, [u8; W])>,
    ) -> CompactIndexBuilder<W> {
        let size = Self::capacity_at(values.len());
        let mut builder = CompactIndexBuilder {
            table: vec![Slot::Empty; size],
            longest_distance: 0,
            collisions: 0,
            capacity: values.len(),
        };
        for (hash, value) in values {
            builder.insert(Entry { hash, value });
        }
        builder
    }

    // Robin-Hood placement: on a collision the entry further from its
    // bucket keeps the slot, ties broken by hash so layout is
    // input-order-independent.
    fn insert(&mut self, mut new: Entry<W>) {
        assert!(self.capacity > 0, "cannot insert into a full table");
        self.capacity -= 1;

        let len = self.table.len() as u64;
        let mut at = new.hash.bucket(len);
        loop {
            match self.table[at as usize] {
                Slot::Empty => {
                    self.longest_distance = self.longest_distance.max(new.hash.distance(at, len));
                    self.table[at as usize] = Slot::Occupied(new);
                    break;
                }
                Slot::Occupied(found) => {
                    if found.hash == new.hash {
                        self.collisions += 1;
                    }
                    let found_dist = found.hash.distance(at, len);
                    let new_dist = new.hash.distance(at, len);
                    self.longest_distance = self.longest_distance.max(new_dist);

                    if found_dist < new_dist || (found_dist == new_dist && new.hash < found.hash) {
                        self.table[at as usize] = Slot::Occupied(new);
                        new = found;
                    }
                    at = (at + 1) % len;
                }
            }
        }
    }

    fn header(&self) -> IndexHeader {
        IndexHeader {
            magic_number: IndexHeader::MAGIC_NUMBER,
            longest_distance: self.longest_distance,
            collisions: self.collisions,
            buckets: self.table.len() as u64,
            value_width: W as u64,
        }
    }

    /// Header, table, wrap-around copy of the first `longest_distance`
    /// slots, and a terminal empty slot so readers never wrap.
    pub fn write(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&self.header().to_le_bytes())?;
        for slot in &self.table {
            slot.write_to(&mut writer)?;
        }
        for i in 0..self.longest_distance {
            self.table[i as usize].write_to(&mut writer)?;
        }
        Slot::<W>::Empty.write_to(&mut writer)?;
        Ok(())
    }
}
