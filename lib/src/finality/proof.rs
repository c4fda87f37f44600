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

//! Finality proofs sent to a foreign light client.
//!
//! Finality of a block B is proven by providing:
//!
//! - The justification of a descendant block F.
//! - The headers of the range (B, F], so that the light client can link its latest known block
//! to F.
//!
//! Since the light client tracks a parachain, the proof is accompanied by the headers of the
//! parachain that the relay chain has included in the blocks of that range.

use super::justification::GrandpaJustification;
use crate::{codec, header, util};

use alloc::vec::Vec;

/// Proof that the block [`FinalityProof::block`] is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalityProof {
    /// Hash of the block F whose justification is provided.
    pub block: [u8; 32],
    /// SCALE-encoded Grandpa justification of F.
    pub justification: Vec<u8>,
    /// Headers of the range (B, F] that the receiver is assumed not to know about, ordered from
    /// the oldest to the most recent.
    pub unknown_headers: Vec<header::Header>,
}

impl FinalityProof {
    /// Decodes the justification embedded in the proof.
    pub fn decode_justification(&self) -> Result<GrandpaJustification, codec::DecodeError> {
        GrandpaJustification::decode(&self.justification)
    }

    /// Checks that [`FinalityProof::unknown_headers`] is a chain of headers whose most recent
    /// element is [`FinalityProof::block`].
    pub fn verify_unknown_headers(&self) -> Result<(), BadHeaderChainError> {
        let mut previous: Option<&header::Header> = None;
        let mut last_hash = None;

        for (index, header) in self.unknown_headers.iter().enumerate() {
            if let Some(previous) = previous {
                if header.parent_hash != previous.hash()
                    || Some(header.number) != previous.number.checked_add(1)
                {
                    return Err(BadHeaderChainError::Disconnected { index });
                }
            }
            previous = Some(header);
            last_hash = Some(header.hash());
        }

        match last_hash {
            None => Err(BadHeaderChainError::Empty),
            Some(hash) if hash != self.block => Err(BadHeaderChainError::WrongTip),
            Some(_) => Ok(()),
        }
    }

    /// Returns the SCALE encoding of the proof.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 5 + self.justification.len() + 1);
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.block);
        util::encode_scale_bytes(&self.justification, out);
        out.extend_from_slice(
            util::encode_scale_compact_usize(self.unknown_headers.len()).as_ref(),
        );
        for header in &self.unknown_headers {
            header.encode_into(out);
        }
    }

    /// Attempt to decode the given SCALE-encoded proof.
    pub fn decode(scale_encoded: &[u8]) -> Result<Self, codec::DecodeError> {
        codec::decode_all(scale_encoded, "finality proof", nom_finality_proof)
    }
}

/// Error returned by [`FinalityProof::verify_unknown_headers`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum BadHeaderChainError {
    /// The proof doesn't contain any header.
    #[display("No unknown header")]
    Empty,
    /// The header at the given index isn't the child of the previous one.
    #[display("Header #{index} isn't a child of the previous header")]
    Disconnected { index: usize },
    /// The most recent header isn't the block of the proof.
    #[display("Most recent header doesn't match the finalized block")]
    WrongTip,
}

/// Header of a parachain, and the hash of the relay chain block that includes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParachainHeaderWithRelayHash {
    /// Identifier of the parachain within the relay chain.
    pub para_id: u32,
    pub parachain_header: header::Header,
    /// Hash of the relay chain block whose state contains [`Self::parachain_header`] as the
    /// head of the parachain.
    pub relay_hash: [u8; 32],
}

impl ParachainHeaderWithRelayHash {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.para_id.to_le_bytes());
        // The header is wrapped in a list of bytes, like the head data stored by the relay chain.
        util::encode_scale_bytes(&self.parachain_header.scale_encoding_vec(), out);
        out.extend_from_slice(&self.relay_hash);
    }
}

/// Bundle sent to the light client: a finality proof of the relay chain and the parachain
/// headers that can be considered as finalized as a consequence.
///
/// Built once and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParachainHeadersWithFinalityProof {
    pub finality_proof: FinalityProof,
    /// Ordered by relay chain block, from the oldest to the most recent.
    pub parachain_headers: Vec<ParachainHeaderWithRelayHash>,
}

impl ParachainHeadersWithFinalityProof {
    /// Returns the parachain header at the given index.
    pub fn parachain_header(
        &self,
        index: usize,
    ) -> Result<&ParachainHeaderWithRelayHash, IndexOutOfBoundsError> {
        self.parachain_headers
            .get(index)
            .ok_or(IndexOutOfBoundsError {
                index,
                len: self.parachain_headers.len(),
            })
    }

    /// Returns the parachain headers of the given parachain.
    pub fn headers_of(
        &self,
        para_id: u32,
    ) -> impl Iterator<Item = &ParachainHeaderWithRelayHash> + '_ {
        self.parachain_headers
            .iter()
            .filter(move |h| h.para_id == para_id)
    }

    /// Returns the highest parachain block number found in the bundle, if any.
    pub fn latest_parachain_height(&self) -> Option<u32> {
        self.parachain_headers
            .iter()
            .map(|h| h.parachain_header.number)
            .max()
    }

    /// Returns the SCALE encoding of the bundle.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.finality_proof.encode_into(&mut out);
        out.extend_from_slice(
            util::encode_scale_compact_usize(self.parachain_headers.len()).as_ref(),
        );
        for header in &self.parachain_headers {
            header.encode_into(&mut out);
        }
        out
    }

    /// Attempt to decode the given SCALE-encoded bundle.
    pub fn decode(scale_encoded: &[u8]) -> Result<Self, codec::DecodeError> {
        codec::decode_all(
            scale_encoded,
            "parachain headers with finality proof",
            nom_parachain_headers_with_finality_proof,
        )
    }
}

/// Error returned by [`ParachainHeadersWithFinalityProof::parachain_header`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Index {index} out of bounds of {len} parachain headers")]
pub struct IndexOutOfBoundsError {
    pub index: usize,
    pub len: usize,
}

fn nom_finality_proof(bytes: &[u8]) -> codec::IResult<FinalityProof> {
    let (bytes, block) = codec::context("block hash", util::nom_array::<32>)(bytes)?;
    let (bytes, justification) = codec::context("justification", util::nom_scale_bytes)(bytes)?;
    let (bytes, unknown_headers) =
        codec::context("unknown headers", util::nom_scale_vec(header::nom_header))(bytes)?;

    Ok((
        bytes,
        FinalityProof {
            block,
            justification: justification.to_vec(),
            unknown_headers,
        },
    ))
}

fn nom_parachain_header_with_relay_hash(
    bytes: &[u8],
) -> codec::IResult<ParachainHeaderWithRelayHash> {
    let (bytes, para_id) = codec::context("para id", nom::number::complete::le_u32)(bytes)?;
    let (bytes, head_data) = codec::context("parachain header", util::nom_scale_bytes)(bytes)?;
    let (bytes, relay_hash) = codec::context("relay hash", util::nom_array::<32>)(bytes)?;

    let parachain_header = match header::decode(head_data) {
        Ok(h) => h,
        Err(err) => {
            return Err(nom::Err::Failure(codec::ParseError {
                context: Some("parachain header"),
                kind: err.kind,
            }))
        }
    };

    Ok((
        bytes,
        ParachainHeaderWithRelayHash {
            para_id,
            parachain_header,
            relay_hash,
        },
    ))
}

fn nom_parachain_headers_with_finality_proof(
    bytes: &[u8],
) -> codec::IResult<ParachainHeadersWithFinalityProof> {
    let (bytes, finality_proof) = nom_finality_proof(bytes)?;
    let (bytes, parachain_headers) = codec::context(
        "parachain headers",
        util::nom_scale_vec(nom_parachain_header_with_relay_hash),
    )(bytes)?;

    Ok((
        bytes,
        ParachainHeadersWithFinalityProof {
            finality_proof,
            parachain_headers,
        },
    ))
}
