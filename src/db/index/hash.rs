// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

/// 64-bit FNV-1a key digest stored in index slots.
///
/// `u64::MAX` marks an empty slot on disk, so hashes are clamped to be
/// non-maximal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyHash(u64);

impl KeyHash {
    pub fn of(key: &[u8]) -> KeyHash {
        const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = OFFSET_BASIS;
        for &byte in key {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(PRIME);
        }
        KeyHash::fit(hash)
    }

    /// Clamp an arbitrary `u64` into the valid (non-maximal) range.
    pub fn fit(raw: u64) -> KeyHash {
        KeyHash(raw.min(u64::MAX - 1))
    }

    /// Read a slot hash; `None` is the empty-slot sentinel.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Option<KeyHash> {
        let raw = u64::from_le_bytes(bytes);
        if raw == u64::MAX {
            None
        } else {
            Some(KeyHash(raw))
        }
    }

    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    // See: https://lemire.me/blog/2016/06/27/a-fast-alternative-to-the-modulo-reduction/
    /// Desired bucket for this hash in a table with `buckets` buckets.
    pub fn bucket(self, buckets: u64) -> u64 {
        ((self.0 as u128 * buckets as u128) >> 64) as u64
    }

    /// Walking distance between `at` and this hash's bucket, modulo the
    /// table length.
    pub fn distance(self, at: u64, buckets: u64) -> u64 {
        let bucket = self.bucket(buckets);
        if bucket > at {
            buckets - bucket + at
        } else {
            at - bucket
        }
    }
}
