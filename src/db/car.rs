// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Random access to records of a content-addressable archive.
//!
//! CARs are concatenations of varint frames. Each frame is the _body
//! length_ as a varint followed by the frame body, which for a record is a
//! [`Cid`] and the node data addressed by that CID:
//!
//! ```text
//! record ►│
//! offset  │  =body length
//!         │◄────────────►│
//!  ┌──────┼───┬──────────┤
//!  │length│cid│node data │
//!  └──────┴───┴──────────┘
//! ```
//!
//! The first frame of a CARv1 stream is a header frame (a DAG-CBOR map
//! with `version` and `roots`). A CARv2 file wraps a complete CARv1
//! payload in a container: an 11-byte pragma (itself a varint frame whose
//! body is `{version: 2}`), a 40-byte fixed header locating the inner
//! payload, the CARv1 bytes, and an optional index. Record offsets used by
//! the archive indexes are relative to the inner CARv1 payload, so
//! [`CarFile::read_at`] anchors every read at that payload's start.
//!
//! Reads are positional ([`ReadAt`]); an open [`CarFile`] has no cursor
//! and is freely shared across threads.

use crate::error::ArchiveError;
use cid::Cid;
use integer_encoding::VarIntReader;
use positioned_io::ReadAt;
use serde::{Deserialize, Serialize};
use std::io::{
    self,
    ErrorKind::{InvalidData, Unsupported},
    Read,
};
use tracing::debug;

const CARV2_PRAGMA_SIZE: u64 = 11;
const CARV2_HEADER_SIZE: usize = 40;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct CarHeader {
    #[serde(default)]
    roots: Vec<Cid>,
    version: u64,
}

pub struct CarFile<R> {
    reader: R,
    /// Start of the inner CARv1 payload; 0 for a bare CARv1 file.
    data_offset: u64,
    roots: Vec<Cid>,
}

impl<R: ReadAt> CarFile<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        let mut cursor = positioned_io::Cursor::new(&reader);
        let outer = read_header(&mut cursor)?;
        let container_version = outer.version;
        let (data_offset, header) = match outer.version {
            1 => (0, outer),
            2 => {
                let mut v2_header = [0; CARV2_HEADER_SIZE];
                reader.read_exact_at(CARV2_PRAGMA_SIZE, &mut v2_header)?;
                // characteristics (16 bytes), then the inner payload offset.
                let data_offset =
                    u64::from_le_bytes(v2_header[16..24].try_into().expect("infallible"));
                let mut inner = positioned_io::Cursor::new_pos(&reader, data_offset);
                let header = read_header(&mut inner)?;
                if header.version != 1 {
                    return Err(io::Error::new(
                        Unsupported,
                        "CARv2 container must wrap a CARv1 payload",
                    ));
                }
                (data_offset, header)
            }
            other => {
                return Err(io::Error::new(
                    Unsupported,
                    format!("unsupported CAR version {other}"),
                ))
            }
        };
        if header.roots.is_empty() {
            return Err(io::Error::new(InvalidData, "CAR header has no roots"));
        }
        debug!(version = container_version, data_offset, "opened CAR archive");
        Ok(CarFile {
            reader,
            data_offset,
            roots: header.roots,
        })
    }

    pub fn roots(&self) -> &[Cid] {
        &self.roots
    }

    /// Read the record at `offset` (relative to the CARv1 payload) and
    /// return its node data.
    ///
    /// The record's CID is compared byte-for-byte against `expected`; a
    /// difference means the index and the archive have diverged and is
    /// reported as [`ArchiveError::CidMismatch`].
    pub fn read_at(&self, offset: u64, expected: &Cid) -> Result<Vec<u8>, ArchiveError> {
        let mut cursor = positioned_io::Cursor::new_pos(&self.reader, self.data_offset + offset);
        let body_length: u64 = cursor.read_varint()?;

        let cid_start = cursor.position();
        let observed = Cid::read_bytes(&mut cursor).map_err(cid_error_to_archive_error)?;
        let cid_length = cursor.position() - cid_start;

        if observed != *expected {
            return Err(ArchiveError::CidMismatch {
                expected: *expected,
                observed,
            });
        }

        let data_length = body_length.checked_sub(cid_length).ok_or_else(|| {
            ArchiveError::decode("CAR record length is shorter than its CID")
        })?;
        let mut data = vec![0; usize::try_from(data_length).map_err(|_| {
            ArchiveError::decode("CAR record length does not fit in memory")
        })?];
        cursor.read_exact(&mut data)?;
        Ok(data)
    }
}

fn cid_error_to_archive_error(cid_error: cid::Error) -> ArchiveError {
    match cid_error {
        cid::Error::Io(io_error) => ArchiveError::Io(io_error),
        other => ArchiveError::Decode(other.to_string()),
    }
}

/// ```text
/// start ►│          reader end ►│
///        ├───────────┬──────────┤
///        │body length│car header│
///        └───────────┴──────────┘
/// ```
fn read_header(reader: &mut impl Read) -> io::Result<CarHeader> {
    let header_length: u64 = reader.read_varint()?;
    let mut buffer = vec![0; usize::try_from(header_length).map_err(io_invalid)?];
    reader.read_exact(&mut buffer)?;
    serde_ipld_dagcbor::from_slice(&buffer).map_err(io_invalid)
}

fn io_invalid(e: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(InvalidData, e)
}
