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

//! Relay chain storage items needed to build finality proofs.
//!
//! The storage of a Substrate chain is a key-value database. The key of an item is made of the
//! `twox128` hashes of its pallet name and of its item name. Items that are maps append a hash of
//! the map key followed, for the hashers that allow it, by the map key itself.
//!
//! The relay chain storage items used by a relayer are:
//!
//! - `Paras::Parachains`, the list of the registered parachains.
//! - `Paras::Heads`, a map from a parachain id to the SCALE-encoded header of the latest
//! parachain block included in the relay chain. Uses the `Twox64Concat` hasher.
//! - `Grandpa::Authorities` and `Grandpa::CurrentSetId`, the current Grandpa authorities set.
//! Older runtimes store the authorities under the well-known `:grandpa_authorities` key instead.

use crate::{codec, finality::verify::Authority, header, util};

use alloc::vec::Vec;

/// Name of the pallet that tracks the parachains.
pub const PARAS_PALLET: &str = "Paras";
/// Storage item of [`PARAS_PALLET`] containing the head of each parachain.
pub const HEADS_ITEM: &str = "Heads";
/// Storage item of [`PARAS_PALLET`] containing the list of parachains.
pub const PARACHAINS_ITEM: &str = "Parachains";
/// Name of the pallet of the Grandpa finality gadget.
pub const GRANDPA_PALLET: &str = "Grandpa";
/// Storage item of [`GRANDPA_PALLET`] containing the current authorities.
pub const AUTHORITIES_ITEM: &str = "Authorities";
/// Storage item of [`GRANDPA_PALLET`] containing the identifier of the current authorities set.
pub const CURRENT_SET_ID_ITEM: &str = "CurrentSetId";

/// Well-known key under which older runtimes store the Grandpa authorities.
pub const GRANDPA_AUTHORITIES_WELL_KNOWN_KEY: &[u8] = b":grandpa_authorities";

/// Version byte found in front of the value stored at [`GRANDPA_AUTHORITIES_WELL_KNOWN_KEY`].
pub const GRANDPA_AUTHORITIES_VERSION: u8 = 1;

/// Consensus engine identifier of Grandpa, used to tag justifications and digest items.
pub const GRANDPA_ENGINE_ID: [u8; 4] = *b"FRNK";

/// Returns the `twox128` hash of the given data.
pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0; 16];
    out[..8].copy_from_slice(&twox_hash::XxHash64::oneshot(0, data).to_le_bytes());
    out[8..].copy_from_slice(&twox_hash::XxHash64::oneshot(1, data).to_le_bytes());
    out
}

/// Returns the `twox64` hash of the given data.
pub fn twox_64(data: &[u8]) -> [u8; 8] {
    twox_hash::XxHash64::oneshot(0, data).to_le_bytes()
}

/// Returns the key of a storage value.
pub fn value_key(pallet: &str, item: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&twox_128(pallet.as_bytes()));
    key.extend_from_slice(&twox_128(item.as_bytes()));
    key
}

/// Returns the key of an entry of a storage map that uses the `Twox64Concat` hasher.
pub fn twox64_concat_map_key(pallet: &str, item: &str, map_key: &[u8]) -> Vec<u8> {
    let mut key = value_key(pallet, item);
    key.extend_from_slice(&twox_64(map_key));
    key.extend_from_slice(map_key);
    key
}

/// Returns the key of `Paras::Heads` for the given parachain.
pub fn para_head_key(para_id: u32) -> Vec<u8> {
    twox64_concat_map_key(PARAS_PALLET, HEADS_ITEM, &para_id.to_le_bytes())
}

/// Returns the key of `Paras::Parachains`.
pub fn parachains_key() -> Vec<u8> {
    value_key(PARAS_PALLET, PARACHAINS_ITEM)
}

/// Returns the key of `Grandpa::Authorities`.
pub fn grandpa_authorities_key() -> Vec<u8> {
    value_key(GRANDPA_PALLET, AUTHORITIES_ITEM)
}

/// Returns the key of `Grandpa::CurrentSetId`.
pub fn grandpa_current_set_id_key() -> Vec<u8> {
    value_key(GRANDPA_PALLET, CURRENT_SET_ID_ITEM)
}

/// Decodes the value of `Paras::Parachains`.
pub fn decode_parachains(value: &[u8]) -> Result<Vec<u32>, codec::DecodeError> {
    codec::decode_all(
        value,
        "parachains",
        util::nom_scale_vec(nom::number::complete::le_u32),
    )
}

/// Encodes a value of `Paras::Parachains`.
pub fn encode_parachains(para_ids: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + para_ids.len() * 4);
    out.extend_from_slice(util::encode_scale_compact_usize(para_ids.len()).as_ref());
    for para_id in para_ids {
        out.extend_from_slice(&para_id.to_le_bytes());
    }
    out
}

/// Decodes a value of `Paras::Heads`, which is a header wrapped in a list of bytes.
pub fn decode_head_data(value: &[u8]) -> Result<header::Header, codec::DecodeError> {
    let head_data = codec::decode_all(value, "head data", util::nom_scale_bytes)?;
    header::decode(head_data).map_err(|err| codec::DecodeError {
        context: "head data",
        kind: err.kind,
    })
}

/// Encodes a value of `Paras::Heads`.
pub fn encode_head_data(header: &header::Header) -> Vec<u8> {
    let mut out = Vec::new();
    util::encode_scale_bytes(&header.scale_encoding_vec(), &mut out);
    out
}

/// Decodes the value of `Grandpa::Authorities`.
pub fn decode_authorities(value: &[u8]) -> Result<Vec<Authority>, codec::DecodeError> {
    codec::decode_all(value, "authorities", nom_authorities)
}

/// Decodes the value stored at [`GRANDPA_AUTHORITIES_WELL_KNOWN_KEY`].
pub fn decode_versioned_authorities(value: &[u8]) -> Result<Vec<Authority>, codec::DecodeError> {
    codec::decode_all(value, "versioned authorities", |bytes| {
        let (bytes, version) = nom::number::complete::u8(bytes)?;
        if version != GRANDPA_AUTHORITIES_VERSION {
            return Err(codec::ParseError::failure(
                codec::DecodeErrorKind::InvalidDiscriminant(version),
            ));
        }
        nom_authorities(bytes)
    })
}

/// Encodes a value of `Grandpa::Authorities`.
pub fn encode_authorities(authorities: &[Authority]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + authorities.len() * 40);
    out.extend_from_slice(util::encode_scale_compact_usize(authorities.len()).as_ref());
    for authority in authorities {
        out.extend_from_slice(&authority.public_key);
        out.extend_from_slice(&authority.weight.to_le_bytes());
    }
    out
}

/// Decodes the value of `Grandpa::CurrentSetId`.
pub fn decode_set_id(value: &[u8]) -> Result<u64, codec::DecodeError> {
    codec::decode_all(value, "set id", nom::number::complete::le_u64)
}

pub(crate) fn nom_authorities(bytes: &[u8]) -> codec::IResult<Vec<Authority>> {
    util::nom_scale_vec(|bytes| {
        let (bytes, public_key) = util::nom_array::<32>(bytes)?;
        let (bytes, weight) = nom::number::complete::le_u64(bytes)?;
        Ok((bytes, Authority { public_key, weight }))
    })(bytes)
}
