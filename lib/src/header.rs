// Relay finality
// Copyright (C) 2019-2022  Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Parsing and encoding of block headers.
//!
//! Each block of a relay chain or of a parachain has a header containing, amongst other things,
//! the hash of its parent and the Merkle root of the state after the block has been applied.
//!
//! The hash of a block is the blake2b-256 hash of its SCALE-encoded header. Consequently, the
//! hash of the parent that is found in a header links this block to the rest of the chain.
//!
//! Block numbers are encoded in the SCALE-compact format and must fit in a `u32`, which is the
//! block number type of all the chains a relayer interacts with.
//!
//! # Example
//!
//! ```
//! use relay_finality::header;
//!
//! let header = header::Header {
//!     parent_hash: [0; 32],
//!     number: 12,
//!     state_root: [1; 32],
//!     extrinsics_root: [2; 32],
//!     digest: vec![header::DigestItem::PreRuntime(*b"aura", vec![1, 2, 3])],
//! };
//!
//! let encoded = header.scale_encoding_vec();
//! assert_eq!(header::decode(&encoded).unwrap(), header);
//! assert_eq!(header::hash_from_scale_encoded_header(&encoded), header.hash());
//! ```

use crate::{codec, util};

use alloc::vec::Vec;

/// Returns a hash of a SCALE-encoded header.
///
/// Does not verify the validity of the header.
pub fn hash_from_scale_encoded_header(header: impl AsRef<[u8]>) -> [u8; 32] {
    let mut out = [0; 32];
    out.copy_from_slice(blake2_rfc::blake2b::blake2b(32, &[], header.as_ref()).as_bytes());
    out
}

/// Attempt to decode the given SCALE-encoded header.
pub fn decode(scale_encoded: &[u8]) -> Result<Header, codec::DecodeError> {
    codec::decode_all(scale_encoded, "header", nom_header)
}

/// Attempt to decode the given SCALE-encoded header.
///
/// Contrary to [`decode`], doesn't return an error if the slice is too long but returns the
/// remainder.
pub fn decode_partial(scale_encoded: &[u8]) -> Result<(Header, &[u8]), codec::DecodeError> {
    codec::decode_partial(scale_encoded, "header", nom_header)
}

/// Header of a block, after being decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Hash of the parent block stored in the header.
    pub parent_hash: [u8; 32],
    /// Block number stored in the header.
    pub number: u32,
    /// The state trie Merkle root.
    pub state_root: [u8; 32],
    /// The Merkle root of the extrinsics.
    pub extrinsics_root: [u8; 32],
    /// List of auxiliary data appended to the block header.
    pub digest: Vec<DigestItem>,
}

impl Header {
    /// Builds the hash of the header.
    pub fn hash(&self) -> [u8; 32] {
        hash_from_scale_encoded_header(self.scale_encoding_vec())
    }

    /// Returns the SCALE encoding of the header.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 5 + 32 + 32 + 1);
        self.encode_into(&mut out);
        out
    }

    /// Appends the SCALE encoding of the header to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.parent_hash);
        out.extend_from_slice(util::encode_scale_compact_u64(u64::from(self.number)).as_ref());
        out.extend_from_slice(&self.state_root);
        out.extend_from_slice(&self.extrinsics_root);
        out.extend_from_slice(util::encode_scale_compact_usize(self.digest.len()).as_ref());
        for item in &self.digest {
            item.encode_into(out);
        }
    }

    /// Returns the first item of the digest that is a consensus log of the given engine.
    pub fn consensus_log(&self, engine: &[u8; 4]) -> Option<&[u8]> {
        self.digest.iter().find_map(|item| match item {
            DigestItem::Consensus(e, data) if e == engine => Some(&data[..]),
            _ => None,
        })
    }
}

/// Item of the digest of a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestItem {
    /// Opaque data not interpreted by the chain's consensus.
    Other(Vec<u8>),
    /// Message from the runtime to the consensus engine whose identifier is the first field.
    Consensus([u8; 4], Vec<u8>),
    /// Seal of the block producer.
    Seal([u8; 4], Vec<u8>),
    /// Information about the block producer, inserted before the runtime runs.
    PreRuntime([u8; 4], Vec<u8>),
    /// The runtime code or the heap pages have been modified by this block.
    RuntimeEnvironmentUpdated,
}

impl DigestItem {
    /// Appends the SCALE encoding of the item to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            DigestItem::Other(data) => {
                out.push(0);
                util::encode_scale_bytes(data, out);
            }
            DigestItem::Consensus(engine, data) => {
                out.push(4);
                out.extend_from_slice(engine);
                util::encode_scale_bytes(data, out);
            }
            DigestItem::Seal(engine, data) => {
                out.push(5);
                out.extend_from_slice(engine);
                util::encode_scale_bytes(data, out);
            }
            DigestItem::PreRuntime(engine, data) => {
                out.push(6);
                out.extend_from_slice(engine);
                util::encode_scale_bytes(data, out);
            }
            DigestItem::RuntimeEnvironmentUpdated => out.push(8),
        }
    }

    /// Decodes a single SCALE-encoded digest item, for example a log returned by a JSON-RPC
    /// server.
    pub fn decode(scale_encoded: &[u8]) -> Result<DigestItem, codec::DecodeError> {
        codec::decode_all(scale_encoded, "digest item", nom_digest_item)
    }
}

/// `nom` parser of a SCALE-encoded header.
pub(crate) fn nom_header(bytes: &[u8]) -> codec::IResult<Header> {
    let (bytes, parent_hash) = codec::context("parent hash", util::nom_array::<32>)(bytes)?;
    let (bytes, number) = codec::context("block number", util::nom_scale_compact_u32)(bytes)?;
    let (bytes, state_root) = codec::context("state root", util::nom_array::<32>)(bytes)?;
    let (bytes, extrinsics_root) =
        codec::context("extrinsics root", util::nom_array::<32>)(bytes)?;
    let (bytes, digest) = codec::context("digest", util::nom_scale_vec(nom_digest_item))(bytes)?;

    Ok((
        bytes,
        Header {
            parent_hash,
            number,
            state_root,
            extrinsics_root,
            digest,
        },
    ))
}

fn nom_digest_item(bytes: &[u8]) -> codec::IResult<DigestItem> {
    let (bytes, discriminant) = nom::number::complete::u8(bytes)?;
    match discriminant {
        0 => {
            let (bytes, data) = util::nom_scale_bytes(bytes)?;
            Ok((bytes, DigestItem::Other(data.to_vec())))
        }
        4..=6 => {
            let (bytes, engine) = util::nom_array::<4>(bytes)?;
            let (bytes, data) = util::nom_scale_bytes(bytes)?;
            let data = data.to_vec();
            let item = match discriminant {
                4 => DigestItem::Consensus(engine, data),
                5 => DigestItem::Seal(engine, data),
                _ => DigestItem::PreRuntime(engine, data),
            };
            Ok((bytes, item))
        }
        8 => Ok((bytes, DigestItem::RuntimeEnvironmentUpdated)),
        other => Err(codec::ParseError::failure(
            codec::DecodeErrorKind::InvalidDiscriminant(other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{DigestItem, Header};
    use crate::codec::{DecodeError, DecodeErrorKind};

    fn example_header() -> Header {
        Header {
            parent_hash: [0xaa; 32],
            number: 1_000_000,
            state_root: [0xbb; 32],
            extrinsics_root: [0xcc; 32],
            digest: vec![
                DigestItem::PreRuntime(*b"BABE", vec![1, 2, 3, 4]),
                DigestItem::Consensus(*b"FRNK", vec![5; 70]),
                DigestItem::Other(Vec::new()),
                DigestItem::RuntimeEnvironmentUpdated,
                DigestItem::Seal(*b"BABE", vec![6; 64]),
            ],
        }
    }

    #[test]
    fn encode_decode_header() {
        let header = example_header();
        let encoded = header.scale_encoding_vec();
        assert_eq!(super::decode(&encoded).unwrap(), header);
        assert_eq!(super::hash_from_scale_encoded_header(&encoded), header.hash());
    }

    #[test]
    fn known_encoding() {
        let header = Header {
            parent_hash: [1; 32],
            number: 5,
            state_root: [2; 32],
            extrinsics_root: [3; 32],
            digest: Vec::new(),
        };

        let mut expected = vec![1; 32];
        expected.push(5 << 2);
        expected.extend_from_slice(&[2; 32]);
        expected.extend_from_slice(&[3; 32]);
        expected.push(0);

        assert_eq!(header.scale_encoding_vec(), expected);
    }

    #[test]
    fn trailing_data_refused() {
        let mut encoded = example_header().scale_encoding_vec();
        encoded.extend_from_slice(&[0, 0, 0]);

        assert_eq!(
            super::decode(&encoded),
            Err(DecodeError {
                context: "header",
                kind: DecodeErrorKind::TrailingData(3)
            })
        );

        let (header, remainder) = super::decode_partial(&encoded).unwrap();
        assert_eq!(header, example_header());
        assert_eq!(remainder, &[0, 0, 0]);
    }

    #[test]
    fn truncated_refused() {
        let encoded = example_header().scale_encoding_vec();
        for len in [0, 10, 32, 33, 100, encoded.len() - 1] {
            let err = super::decode(&encoded[..len]).unwrap_err();
            assert_eq!(err.kind, DecodeErrorKind::UnexpectedEof);
        }
    }

    #[test]
    fn unknown_digest_item_refused() {
        let mut header = example_header();
        header.digest.clear();
        let mut encoded = header.scale_encoding_vec();
        *encoded.last_mut().unwrap() = 1 << 2;
        encoded.push(3);

        let err = super::decode(&encoded).unwrap_err();
        assert_eq!(err.context, "digest");
        assert_eq!(err.kind, DecodeErrorKind::InvalidDiscriminant(3));
    }

    #[test]
    fn consensus_log_lookup() {
        let header = example_header();
        assert_eq!(header.consensus_log(b"FRNK"), Some(&[5; 70][..]));
        assert_eq!(header.consensus_log(b"BABE"), None);
    }
}
