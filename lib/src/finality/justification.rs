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

//! Grandpa justifications.
//!
//! A justification proves that a block has been finalized during a certain round of the Grandpa
//! protocol. It contains a [`Commit`], which is the list of precommits signed by the authorities,
//! and the headers of the blocks that are between the finalized block and the blocks targeted by
//! these precommits.
//!
//! Justifications are found in the `FRNK` justifications of relay chain blocks.

use crate::{codec, header, util};

use alloc::vec::Vec;

/// Number of bytes of a SCALE-encoded [`SignedPrecommit`].
pub const PRECOMMIT_ENCODED_LEN: usize = 32 + 4 + 64 + 32;

/// Number of bytes of the message signed by an authority when emitting a precommit.
pub const PRECOMMIT_SIGNED_MESSAGE_LEN: usize = 1 + 32 + 4 + 8 + 8;

/// Vote of an authority for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precommit {
    /// Hash of the block the vote is for.
    pub target_hash: [u8; 32],
    /// Height of the block the vote is for.
    pub target_number: u32,
}

impl Precommit {
    /// Returns the message that the authorities sign when emitting this precommit during the
    /// given round of the given authorities set.
    pub fn signed_message(&self, round: u64, set_id: u64) -> [u8; PRECOMMIT_SIGNED_MESSAGE_LEN] {
        let mut msg = [0; PRECOMMIT_SIGNED_MESSAGE_LEN];
        msg[0] = 1; // This `1` indicates which kind of message is being signed.
        msg[1..33].copy_from_slice(&self.target_hash);
        msg[33..37].copy_from_slice(&self.target_number.to_le_bytes());
        msg[37..45].copy_from_slice(&round.to_le_bytes());
        msg[45..53].copy_from_slice(&set_id.to_le_bytes());
        msg
    }

    /// Returns the SCALE encoding of the precommit.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 4);
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target_hash);
        out.extend_from_slice(&self.target_number.to_le_bytes());
    }

    /// Attempt to decode the given SCALE-encoded precommit.
    pub fn decode(scale_encoded: &[u8]) -> Result<Self, codec::DecodeError> {
        codec::decode_all(scale_encoded, "precommit", nom_precommit)
    }
}

/// Precommit and the signature of the authority that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPrecommit {
    pub precommit: Precommit,
    /// Ed25519 signature of [`Precommit::signed_message`].
    pub signature: [u8; 64],
    /// Ed25519 public key of the authority.
    pub id: [u8; 32],
}

impl SignedPrecommit {
    /// Returns the SCALE encoding of the signed precommit.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PRECOMMIT_ENCODED_LEN);
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        self.precommit.encode_into(out);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.id);
    }

    /// Attempt to decode the given SCALE-encoded signed precommit.
    pub fn decode(scale_encoded: &[u8]) -> Result<Self, codec::DecodeError> {
        codec::decode_all(scale_encoded, "signed precommit", nom_signed_precommit)
    }
}

/// Set of precommits for a target block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Hash of the block being finalized.
    pub target_hash: [u8; 32],
    /// Height of the block being finalized.
    pub target_number: u32,
    /// Votes of the authorities. Each precommit targets either the target block or one of its
    /// descendants.
    pub precommits: Vec<SignedPrecommit>,
}

impl Commit {
    /// Returns the SCALE encoding of the commit.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(32 + 4 + 1 + self.precommits.len() * PRECOMMIT_ENCODED_LEN);
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target_hash);
        out.extend_from_slice(&self.target_number.to_le_bytes());
        out.extend_from_slice(util::encode_scale_compact_usize(self.precommits.len()).as_ref());
        for precommit in &self.precommits {
            precommit.encode_into(out);
        }
    }

    /// Attempt to decode the given SCALE-encoded commit.
    pub fn decode(scale_encoded: &[u8]) -> Result<Self, codec::DecodeError> {
        codec::decode_all(scale_encoded, "commit", nom_commit)
    }
}

/// Decoded justification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrandpaJustification {
    /// Grandpa round during which the commit has been produced.
    pub round: u64,
    pub commit: Commit,
    /// Headers that link the targets of the precommits to the target of the commit.
    pub votes_ancestries: Vec<header::Header>,
}

impl GrandpaJustification {
    /// Returns the hash and height of the block finalized by this justification.
    pub fn target(&self) -> ([u8; 32], u32) {
        (self.commit.target_hash, self.commit.target_number)
    }

    /// Returns the SCALE encoding of the justification.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            8 + 32 + 4 + 1 + self.commit.precommits.len() * PRECOMMIT_ENCODED_LEN + 1,
        );
        out.extend_from_slice(&self.round.to_le_bytes());
        self.commit.encode_into(&mut out);
        out.extend_from_slice(
            util::encode_scale_compact_usize(self.votes_ancestries.len()).as_ref(),
        );
        for header in &self.votes_ancestries {
            header.encode_into(&mut out);
        }
        out
    }

    /// Attempt to decode the given SCALE-encoded justification.
    pub fn decode(scale_encoded: &[u8]) -> Result<Self, codec::DecodeError> {
        codec::decode_all(scale_encoded, "justification", nom_justification)
    }

    /// Attempt to decode the given SCALE-encoded justification.
    ///
    /// Contrary to [`GrandpaJustification::decode`], doesn't return an error if the slice is too
    /// long but returns the remainder.
    pub fn decode_partial(scale_encoded: &[u8]) -> Result<(Self, &[u8]), codec::DecodeError> {
        codec::decode_partial(scale_encoded, "justification", nom_justification)
    }
}

fn nom_justification(bytes: &[u8]) -> codec::IResult<GrandpaJustification> {
    let (bytes, round) = codec::context("round", nom::number::complete::le_u64)(bytes)?;
    let (bytes, commit) = nom_commit(bytes)?;
    let (bytes, votes_ancestries) =
        codec::context("votes ancestries", util::nom_scale_vec(header::nom_header))(bytes)?;

    Ok((
        bytes,
        GrandpaJustification {
            round,
            commit,
            votes_ancestries,
        },
    ))
}

fn nom_commit(bytes: &[u8]) -> codec::IResult<Commit> {
    let (bytes, target_hash) =
        codec::context("commit target hash", util::nom_array::<32>)(bytes)?;
    let (bytes, target_number) =
        codec::context("commit target number", nom::number::complete::le_u32)(bytes)?;
    let (bytes, precommits) =
        codec::context("precommits", util::nom_scale_vec(nom_signed_precommit))(bytes)?;

    Ok((
        bytes,
        Commit {
            target_hash,
            target_number,
            precommits,
        },
    ))
}

fn nom_signed_precommit(bytes: &[u8]) -> codec::IResult<SignedPrecommit> {
    let (bytes, precommit) = nom_precommit(bytes)?;
    let (bytes, signature) = codec::context("signature", util::nom_array::<64>)(bytes)?;
    let (bytes, id) = codec::context("authority id", util::nom_array::<32>)(bytes)?;

    Ok((
        bytes,
        SignedPrecommit {
            precommit,
            signature,
            id,
        },
    ))
}

fn nom_precommit(bytes: &[u8]) -> codec::IResult<Precommit> {
    let (bytes, target_hash) =
        codec::context("precommit target hash", util::nom_array::<32>)(bytes)?;
    let (bytes, target_number) =
        codec::context("precommit target number", nom::number::complete::le_u32)(bytes)?;

    Ok((
        bytes,
        Precommit {
            target_hash,
            target_number,
        },
    ))
}
