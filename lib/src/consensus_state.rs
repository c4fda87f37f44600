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

//! Consensus state of the foreign light client at a given parachain block.
//!
//! The consensus state contains the Merkle root of the parachain state, against which proofs of
//! storage are verified, and the timestamp of the block.
//!
//! The timestamp is found in the first extrinsic of each parachain block, which is the
//! `Timestamp::set` inherent. Its layout is:
//!
//! - The length of the extrinsic, SCALE-compact-encoded.
//! - The version byte: `4` for an unsigned extrinsic of version 4, or `5` for a bare extrinsic
//! of version 5.
//! - The index of the pallet within the runtime, then the index of the call within the pallet.
//! - The timestamp in milliseconds, SCALE-compact-encoded.

use crate::{codec, header, util};

/// Position of the `Timestamp::set` call within the runtime of the parachain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TimestampCall {
    /// Index of the `Timestamp` pallet.
    pub pallet_index: u8,
    /// Index of the `set` call within the pallet.
    pub call_index: u8,
}

impl Default for TimestampCall {
    fn default() -> Self {
        TimestampCall {
            pallet_index: 2,
            call_index: 0,
        }
    }
}

/// Decodes the SCALE-encoded `Timestamp::set` inherent and returns the timestamp in
/// milliseconds.
pub fn decode_timestamp_extrinsic(
    extrinsic: &[u8],
    call: TimestampCall,
) -> Result<u64, TimestampExtrinsicError> {
    let body = codec::decode_all(extrinsic, "extrinsic", util::nom_scale_bytes)
        .map_err(TimestampExtrinsicError::Decode)?;

    let (version, pallet_index, call_index, moment) = codec::decode_all(
        body,
        "timestamp call",
        |bytes| {
            let (bytes, version) = nom::number::complete::u8(bytes)?;
            let (bytes, pallet_index) = nom::number::complete::u8(bytes)?;
            let (bytes, call_index) = nom::number::complete::u8(bytes)?;
            let (bytes, moment) = codec::context("moment", util::nom_scale_compact_u64)(bytes)?;
            Ok((bytes, (version, pallet_index, call_index, moment)))
        },
    )
    .map_err(TimestampExtrinsicError::Decode)?;

    match version {
        4 | 5 => {}
        v if v & 0x80 != 0 => return Err(TimestampExtrinsicError::Signed),
        v => return Err(TimestampExtrinsicError::UnsupportedVersion(v)),
    }

    if pallet_index != call.pallet_index || call_index != call.call_index {
        return Err(TimestampExtrinsicError::WrongCall {
            pallet_index,
            call_index,
        });
    }

    if moment == 0 {
        return Err(TimestampExtrinsicError::ZeroTimestamp);
    }

    Ok(moment)
}

/// Error potentially returned by [`decode_timestamp_extrinsic`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum TimestampExtrinsicError {
    #[display("{_0}")]
    Decode(codec::DecodeError),
    /// The extrinsic is signed, while inherents never are.
    #[display("Timestamp extrinsic is signed")]
    Signed,
    #[display("Unsupported extrinsic version {_0}")]
    UnsupportedVersion(#[error(not(source))] u8),
    /// The extrinsic isn't a call to `Timestamp::set`.
    #[display("Extrinsic calls {pallet_index}:{call_index} instead of the timestamp")]
    WrongCall { pallet_index: u8, call_index: u8 },
    #[display("Timestamp is zero")]
    ZeroTimestamp,
}

/// Consensus state at a parachain block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusState {
    /// UNIX timestamp of the block, in milliseconds.
    pub timestamp_ms: u64,
    /// State root of the parachain block.
    pub root: [u8; 32],
}

impl ConsensusState {
    /// Builds the consensus state of a parachain block from its header and body.
    pub fn from_parachain_block<E: AsRef<[u8]>>(
        header: &header::Header,
        extrinsics: &[E],
        call: TimestampCall,
    ) -> Result<Self, ConsensusStateError> {
        let first = extrinsics.first().ok_or(ConsensusStateError::NoExtrinsic)?;
        let timestamp_ms = decode_timestamp_extrinsic(first.as_ref(), call)
            .map_err(ConsensusStateError::Timestamp)?;

        let state = ConsensusState {
            timestamp_ms,
            root: header.state_root,
        };
        state.validate_basic()?;
        Ok(state)
    }

    /// Returns [`crate::client_state::CLIENT_TYPE`].
    pub fn client_type(&self) -> &'static str {
        crate::client_state::CLIENT_TYPE
    }

    /// Returns the timestamp in nanoseconds, saturating if it doesn't fit.
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ms.saturating_mul(1_000_000)
    }

    /// Checks that the root isn't empty and that the timestamp is strictly positive.
    pub fn validate_basic(&self) -> Result<(), ConsensusStateError> {
        if self.root == [0; 32] {
            return Err(ConsensusStateError::EmptyRoot);
        }
        if self.timestamp_ms == 0 {
            return Err(ConsensusStateError::ZeroTimestamp);
        }
        Ok(())
    }
}

/// Error potentially returned when building or validating a [`ConsensusState`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ConsensusStateError {
    #[display("Parachain block has no extrinsic")]
    NoExtrinsic,
    #[display("Invalid timestamp extrinsic: {_0}")]
    Timestamp(TimestampExtrinsicError),
    #[display("Root cannot be empty")]
    EmptyRoot,
    #[display("Timestamp must be a positive Unix time")]
    ZeroTimestamp,
}

#[cfg(test)]
mod tests {
    use super::{ConsensusState, ConsensusStateError, TimestampCall, TimestampExtrinsicError};
    use crate::{codec::DecodeErrorKind, header::Header};

    const TIMESTAMP_EXTRINSIC: &str = "280402000b30d3d47c8901";

    fn header() -> Header {
        Header {
            parent_hash: [1; 32],
            number: 10,
            state_root: [2; 32],
            extrinsics_root: [3; 32],
            digest: Vec::new(),
        }
    }

    #[test]
    fn decode_known_extrinsic() {
        let extrinsic = hex::decode(TIMESTAMP_EXTRINSIC).unwrap();
        assert_eq!(
            super::decode_timestamp_extrinsic(&extrinsic, TimestampCall::default()),
            Ok(1_690_016_469_808)
        );
    }

    #[test]
    fn wrong_call_refused() {
        let extrinsic = hex::decode(TIMESTAMP_EXTRINSIC).unwrap();
        let call = TimestampCall {
            pallet_index: 3,
            call_index: 0,
        };
        assert_eq!(
            super::decode_timestamp_extrinsic(&extrinsic, call),
            Err(TimestampExtrinsicError::WrongCall {
                pallet_index: 2,
                call_index: 0
            })
        );
    }

    #[test]
    fn signed_refused() {
        let mut extrinsic = hex::decode(TIMESTAMP_EXTRINSIC).unwrap();
        extrinsic[1] = 0x84;
        assert_eq!(
            super::decode_timestamp_extrinsic(&extrinsic, TimestampCall::default()),
            Err(TimestampExtrinsicError::Signed)
        );

        extrinsic[1] = 0x03;
        assert_eq!(
            super::decode_timestamp_extrinsic(&extrinsic, TimestampCall::default()),
            Err(TimestampExtrinsicError::UnsupportedVersion(3))
        );
    }

    #[test]
    fn malformed_refused() {
        // Length prefix announces more bytes than available.
        let extrinsic = hex::decode("2c0402000b30d3d47c8901").unwrap();
        assert!(matches!(
            super::decode_timestamp_extrinsic(&extrinsic, TimestampCall::default()),
            Err(TimestampExtrinsicError::Decode(err)) if err.kind == DecodeErrorKind::UnexpectedEof
        ));

        // Extra byte after the moment.
        let extrinsic = hex::decode("140402000400").unwrap();
        assert!(matches!(
            super::decode_timestamp_extrinsic(&extrinsic, TimestampCall::default()),
            Err(TimestampExtrinsicError::Decode(err)) if err.kind == DecodeErrorKind::TrailingData(1)
        ));

        let extrinsic = hex::decode("1004020000").unwrap();
        assert_eq!(
            super::decode_timestamp_extrinsic(&extrinsic, TimestampCall::default()),
            Err(TimestampExtrinsicError::ZeroTimestamp)
        );
    }

    #[test]
    fn from_parachain_block() {
        let extrinsics = vec![
            hex::decode(TIMESTAMP_EXTRINSIC).unwrap(),
            vec![0x08, 0x04, 0x01],
        ];
        let state = ConsensusState::from_parachain_block(
            &header(),
            &extrinsics[..],
            TimestampCall::default(),
        )
        .unwrap();
        assert_eq!(state.timestamp_ms, 1_690_016_469_808);
        assert_eq!(state.root, [2; 32]);
        assert_eq!(state.timestamp_ns(), 1_690_016_469_808_000_000);
        assert_eq!(state.client_type(), "ics10-grandpa");

        assert_eq!(
            ConsensusState::from_parachain_block::<Vec<u8>>(
                &header(),
                &[],
                TimestampCall::default()
            ),
            Err(ConsensusStateError::NoExtrinsic)
        );
    }

    #[test]
    fn validate_basic() {
        let state = ConsensusState {
            timestamp_ms: 5,
            root: [0; 32],
        };
        assert_eq!(state.validate_basic(), Err(ConsensusStateError::EmptyRoot));

        let state = ConsensusState {
            timestamp_ms: 0,
            root: [1; 32],
        };
        assert_eq!(
            state.validate_basic(),
            Err(ConsensusStateError::ZeroTimestamp)
        );
    }
}
