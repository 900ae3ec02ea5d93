// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Reassembly of payloads split across multiple data frames.
//!
//! Payloads too large for a single node are chunked flat: one head
//! frame plus a chain of continuation frames listed, in order, in the
//! head's `next` links. There is no nesting.

use super::DataFrame;
use crate::error::ArchiveError;
use cid::Cid;

/// Reconstitute the logical payload behind a head frame.
///
/// `fetch` resolves a continuation link to its decoded frame (and is the
/// seam where kind verification happens: a node that is not a `DataFrame`
/// must fail decoding there). The number of frames consumed, head
/// included, must match the head's declared `total`.
pub fn reassemble<F>(head: &DataFrame, mut fetch: F) -> Result<Vec<u8>, ArchiveError>
where
    F: FnMut(&Cid) -> Result<DataFrame, ArchiveError>,
{
    let mut payload = head.data.clone();
    let mut assembled: u32 = 1;
    if head.total > 1 {
        for cid in &head.next {
            let frame = fetch(cid)?;
            payload.extend_from_slice(&frame.data);
            assembled += 1;
        }
    }
    if assembled != head.total {
        return Err(ArchiveError::FrameCountMismatch {
            declared: head.total,
            assembled,
        });
    }
    Ok(payload)
}
