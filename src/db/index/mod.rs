// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Compact key→value lookup tables over immutable files.
//!
//! The archive ships with three of these: CID→offset (8-byte values),
//! slot→CID and signature→CID (36-byte values). All three share one layout,
//! parameterized by the value width; keys themselves are not stored, only a
//! 64-bit digest of the key bytes.
//!
//! # Layout
//!
//! A fixed-size header is followed by a linear array of equal-length slots:
//!
//! ```text
//! ┌────────┬──────┬──────┬──────┬─────┬──────┐
//! │ header │ slot │ slot │ slot │ ... │ slot │
//! └────────┴──────┴──────┴──────┴─────┴──────┘
//! ```
//!
//! Each slot is the key hash (8 bytes, `u64::MAX` when empty) followed by
//! the value bytes. Entries are placed with Robin-Hood linear probing: a
//! lookup jumps to the hash's bucket and scans forward until it finds the
//! hash, hits an empty slot, or exceeds the worst-case probe distance
//! recorded in the header. The table is followed by a copy of the first
//! `longest_distance` slots and a terminal empty slot, so scans never wrap.
//!
//! Lookups go through [`positioned_io::ReadAt`]: no cursor is shared, so
//! any number of threads may query the same open index.
//!
//! Hash collisions across distinct keys are possible but vanishingly rare
//! (~2^-64); colliding entries are adjacent, and [`CompactIndex::lookup`]
//! returns every candidate. Callers that can verify a candidate (the
//! CID→offset index, via the CID stored in the archive record) must do so.

mod builder;
mod hash;

pub use builder::CompactIndexBuilder;
pub use hash::KeyHash;

use positioned_io::ReadAt;
use smallvec::{smallvec, SmallVec};
use std::io::{Error, ErrorKind, Read, Result};

/// Widths of the three on-disk index value types.
pub const OFFSET_WIDTH: usize = 8;
pub const CID_WIDTH: usize = 36;

pub struct CompactIndex<R, const W: usize> {
    reader: R,
    header: IndexHeader,
}

impl<R: ReadAt, const W: usize> CompactIndex<R, W> {
    /// `O(1)`. Validates the header; a wrong magic number or value width is
    /// an open-time error, lookups afterwards only fail on I/O.
    pub fn open(reader: R) -> Result<Self> {
        let mut cursor = positioned_io::Cursor::new(&reader);
        let header = IndexHeader::read_from(&mut cursor)?;
        if header.magic_number != IndexHeader::MAGIC_NUMBER {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "invalid index magic number: {:#x}, expected {:#x}",
                    header.magic_number,
                    IndexHeader::MAGIC_NUMBER
                ),
            ));
        }
        if header.value_width != W as u64 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "index holds {}-byte values, expected {W}-byte values",
                    header.value_width
                ),
            ));
        }
        Ok(CompactIndex { reader, header })
    }

    /// `O(1)`. Look up candidate values for a key. An empty result means the
    /// key is not present; it is never an I/O failure. Does not allocate
    /// unless two or more key hashes have collided.
    pub fn lookup(&self, key: &[u8]) -> Result<SmallVec<[[u8; W]; 1]>> {
        self.lookup_hash(KeyHash::of(key))
    }

    // Jump to the bucket and scan downstream. Every entry with our hash is
    // guaranteed to appear before the first empty slot.
    pub(crate) fn lookup_hash(&self, needle: KeyHash) -> Result<SmallVec<[[u8; W]; 1]>> {
        if self.header.buckets == 0 {
            return Ok(smallvec![]);
        }
        let start =
            IndexHeader::SIZE as u64 + needle.bucket(self.header.buckets) * Slot::<W>::SIZE as u64;
        let mut cursor = positioned_io::Cursor::new_pos(&self.reader, start);

        let mut limit = self.header.longest_distance;
        while let Slot::Occupied(entry) = Slot::<W>::read_from(&mut cursor)? {
            if entry.hash == needle {
                let mut found = smallvec![entry.value];
                // Entries with equal hashes are adjacent; collect them all.
                loop {
                    match Slot::<W>::read_from(&mut cursor)? {
                        Slot::Occupied(next) if next.hash == needle => found.push(next.value),
                        _ => return Ok(found),
                    }
                }
            }
            if limit == 0 {
                // Even the fullest bucket does not probe this far.
                return Ok(smallvec![]);
            }
            limit -= 1;
        }
        Ok(smallvec![])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexHeader {
    pub magic_number: u64,
    /// Worst-case distance between an entry and its bucket.
    pub longest_distance: u64,
    /// Number of key-hash collisions. Not consulted by lookups.
    pub collisions: u64,
    /// Number of buckets. The table additionally carries wrap-around
    /// padding after the last bucket.
    pub buckets: u64,
    /// Value width in bytes; checked against the type parameter at open.
    pub value_width: u64,
}

impl IndexHeader {
    pub const SIZE: usize = 40;
    pub const MAGIC_NUMBER: u64 = u64::from_le_bytes(*b"caridx01");

    pub fn read_from(reader: &mut impl Read) -> Result<IndexHeader> {
        let mut buffer = [0; Self::SIZE];
        reader.read_exact(&mut buffer)?;
        Ok(IndexHeader::from_le_bytes(buffer))
    }

    pub fn to_le_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.magic_number.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.longest_distance.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.collisions.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.buckets.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.value_width.to_le_bytes());
        bytes
    }

    pub fn from_le_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let word = |range: std::ops::Range<usize>| {
            u64::from_le_bytes(bytes[range].try_into().expect("infallible"))
        };
        IndexHeader {
            magic_number: word(0..8),
            longest_distance: word(8..16),
            collisions: word(16..24),
            buckets: word(24..32),
            value_width: word(32..40),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry<const W: usize> {
    pub hash: KeyHash,
    pub value: [u8; W],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot<const W: usize> {
    Empty,
    Occupied(Entry<W>),
}

impl<const W: usize> Slot<W> {
    pub const SIZE: usize = 8 + W;

    pub fn read_from(reader: &mut impl Read) -> Result<Slot<W>> {
        let mut hash_bytes = [0; 8];
        reader.read_exact(&mut hash_bytes)?;
        let mut value = [0; W];
        reader.read_exact(&mut value)?;
        Ok(match KeyHash::from_le_bytes(hash_bytes) {
            None => Slot::Empty,
            Some(hash) => Slot::Occupied(Entry { hash, value }),
        })
    }

    pub fn write_to(self, writer: &mut impl std::io::Write) -> Result<()> {
        match self {
            Slot::Empty => {
                writer.write_all(&u64::MAX.to_le_bytes())?;
                writer.write_all(&[0xFF; W])?;
            }
            Slot::Occupied(entry) => {
                writer.write_all(&entry.hash.to_le_bytes())?;
                writer.write_all(&entry.value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use std::collections::{HashMap, HashSet};

    impl Arbitrary for IndexHeader {
        fn arbitrary(g: &mut Gen) -> IndexHeader {
            IndexHeader {
                magic_number: u64::arbitrary(g),
                longest_distance: u64::arbitrary(g),
                collisions: u64::arbitrary(g),
                buckets: u64::arbitrary(g),
                value_width: u64::arbitrary(g),
            }
        }
    }

    #[quickcheck]
    fn header_roundtrip(header: IndexHeader) {
        assert_eq!(header, IndexHeader::from_le_bytes(header.to_le_bytes()));
    }

    fn mk_table(entries: &[(KeyHash, [u8; 8])]) -> CompactIndex<Vec<u8>, 8> {
        let builder = CompactIndexBuilder::from_hashes(entries.iter().copied());
        let mut store = Vec::new();
        builder.write(&mut store).unwrap();
        CompactIndex::open(store).unwrap()
    }

    fn mk_map(entries: &[(KeyHash, [u8; 8])]) -> HashMap<KeyHash, HashSet<[u8; 8]>> {
        let mut map: HashMap<KeyHash, HashSet<[u8; 8]>> = HashMap::new();
        for (hash, value) in entries.iter().copied() {
            map.entry(hash).or_default().insert(value);
        }
        map
    }

    fn values(entries: &[(u64, u64)]) -> Vec<(KeyHash, [u8; 8])> {
        entries
            .iter()
            .map(|&(hash, value)| (KeyHash::fit(hash), value.to_le_bytes()))
            .collect()
    }

    #[quickcheck]
    fn lookup_singleton(hash: KeyHash, value: u64) {
        let table = mk_table(&[(hash, value.to_le_bytes())]);
        assert_eq!(table.lookup_hash(hash).unwrap().to_vec(), vec![value.to_le_bytes()]);
    }

    // Identical to a hash map, modulo hash collisions (which only ever add
    // candidates, never drop them).
    #[quickcheck]
    fn lookup_wide(entries: Vec<(u64, u64)>) {
        let entries = values(&entries);
        let map = mk_map(&entries);
        let table = mk_table(&entries);
        for (&hash, expected) in map.iter() {
            let found: HashSet<[u8; 8]> = table.lookup_hash(hash).unwrap().into_iter().collect();
            assert!(expected.is_subset(&found));
        }
    }

    // Same, with a tiny hash domain so buckets clash constantly.
    #[quickcheck]
    fn lookup_narrow(entries: Vec<(u64, u64)>) {
        let entries: Vec<_> = values(&entries)
            .into_iter()
            .map(|(hash, value)| (KeyHash::fit(u64::from_le_bytes(hash.to_le_bytes()) % 10), value))
            .collect();
        let map = mk_map(&entries);
        let table = mk_table(&entries);
        for (&hash, expected) in map.iter() {
            let found: HashSet<[u8; 8]> = table.lookup_hash(hash).unwrap().into_iter().collect();
            assert!(expected.is_subset(&found));
        }
    }

    #[quickcheck]
    fn missing_keys_are_not_found(entries: Vec<(u64, u64)>) {
        let entries = values(&entries);
        let map = mk_map(&entries);
        let table = mk_table(&entries);
        for probe in 0..64u64 {
            let hash = KeyHash::of(&probe.to_le_bytes());
            if !map.contains_key(&hash) {
                assert!(table.lookup_hash(hash).unwrap().is_empty());
            }
        }
    }

    #[test]
    fn empty_index_finds_nothing() {
        let table = mk_table(&[]);
        assert!(table.lookup(b"anything").unwrap().is_empty());
    }

    #[test]
    fn wrong_value_width_is_an_open_error() {
        let builder = CompactIndexBuilder::<8>::new([(b"key".as_slice(), 7u64.to_le_bytes())].into_iter());
        let mut store = Vec::new();
        builder.write(&mut store).unwrap();
        assert!(CompactIndex::<_, 36>::open(store).is_err());
    }

    #[test]
    fn garbage_is_an_open_error() {
        assert!(CompactIndex::<_, 8>::open(vec![0u8; 64]).is_err());
        assert!(CompactIndex::<_, 8>::open(vec![0u8; 3]).is_err());
    }
}
