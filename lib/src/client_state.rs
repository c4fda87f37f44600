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

//! State of a foreign light client tracking a parachain through Grandpa finality proofs.
//!
//! The [`ClientState`] is what a relayer submits when creating the light client on the foreign
//! chain, and it is derived again from the relay chain every time it is needed. It contains the
//! authorities set that the light client trusts, and the latest relay chain and parachain blocks
//! it knows about.
//!
//! The light client logic itself runs on the foreign chain. The callbacks of the light client
//! interface that this crate doesn't implement return an [`UnsupportedCallbackError`].

use crate::{
    codec, consensus_state::ConsensusState, finality::verify::Authority, storage, util,
};

use alloc::vec::Vec;
use core::str;

/// Identifier of the light client type on the foreign chain.
pub const CLIENT_TYPE: &str = "ics10-grandpa";

/// Relay chain that the tracked parachain is connected to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RelayChain {
    #[display("polkadot")]
    Polkadot = 0,
    #[display("kusama")]
    Kusama = 1,
    #[display("rococo")]
    Rococo = 2,
}

impl TryFrom<i32> for RelayChain {
    type Error = UnknownRelayChainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RelayChain::Polkadot),
            1 => Ok(RelayChain::Kusama),
            2 => Ok(RelayChain::Rococo),
            _ => Err(UnknownRelayChainError),
        }
    }
}

impl str::FromStr for RelayChain {
    type Err = UnknownRelayChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "polkadot" => Ok(RelayChain::Polkadot),
            "kusama" => Ok(RelayChain::Kusama),
            "rococo" => Ok(RelayChain::Rococo),
            _ => Err(UnknownRelayChainError),
        }
    }
}

/// Error when converting a value to a [`RelayChain`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Unknown relay chain")]
pub struct UnknownRelayChainError;

/// State of the light client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    /// Identifier of the tracked parachain.
    pub para_id: u32,
    /// Identifier of the authorities set of [`ClientState::current_authorities`].
    pub current_set_id: u64,
    /// Grandpa authorities that the light client trusts.
    pub current_authorities: Vec<Authority>,
    /// Hash of the latest finalized relay chain block known by the light client.
    pub latest_relay_hash: [u8; 32],
    /// Height of [`ClientState::latest_relay_hash`].
    pub latest_relay_height: u32,
    /// Height of the parachain head found in the state of [`ClientState::latest_relay_hash`].
    pub latest_para_height: u32,
    pub relay_chain: RelayChain,
}

impl ClientState {
    /// Returns [`CLIENT_TYPE`].
    pub fn client_type(&self) -> &'static str {
        CLIENT_TYPE
    }

    /// Returns the latest height of the tracked chain, which is the parachain height.
    pub fn latest_height(&self) -> u64 {
        u64::from(self.latest_para_height)
    }

    /// Checks the consistency of the state.
    pub fn validate(&self) -> Result<(), InvalidClientStateError> {
        if self.current_authorities.is_empty() {
            return Err(InvalidClientStateError::NoAuthority);
        }
        if let Some(authority) = self.current_authorities.iter().find(|a| a.weight == 0) {
            return Err(InvalidClientStateError::ZeroWeight(authority.public_key));
        }
        if self.latest_relay_hash == [0; 32] {
            return Err(InvalidClientStateError::EmptyRelayHash);
        }
        Ok(())
    }

    /// Returns the status of the client on the foreign chain.
    pub fn status(&self) -> Result<ClientStatus, UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::Status,
        })
    }

    /// Verifies a proof of the presence of `value` at `path` in the parachain state at the
    /// given height.
    pub fn verify_membership(
        &self,
        _height: u64,
        _proof: &[u8],
        _path: &[u8],
        _value: &[u8],
    ) -> Result<(), UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::VerifyMembership,
        })
    }

    /// Verifies a proof of the absence of `path` in the parachain state at the given height.
    pub fn verify_non_membership(
        &self,
        _height: u64,
        _proof: &[u8],
        _path: &[u8],
    ) -> Result<(), UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::VerifyNonMembership,
        })
    }

    pub fn verify_client_message(&self, _message: &[u8]) -> Result<(), UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::VerifyClientMessage,
        })
    }

    pub fn check_for_misbehaviour(
        &self,
        _message: &[u8],
    ) -> Result<bool, UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::CheckForMisbehaviour,
        })
    }

    pub fn update_state(&mut self, _message: &[u8]) -> Result<Vec<u64>, UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::UpdateState,
        })
    }

    pub fn update_state_on_misbehaviour(
        &mut self,
        _message: &[u8],
    ) -> Result<(), UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::UpdateStateOnMisbehaviour,
        })
    }

    pub fn check_substitute_and_update_state(
        &mut self,
        _substitute: &ClientState,
    ) -> Result<(), UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::CheckSubstituteAndUpdateState,
        })
    }

    pub fn verify_upgrade_and_update_state(
        &mut self,
        _new_client: &ClientState,
        _proof_upgrade_client: &[u8],
        _proof_upgrade_consensus_state: &[u8],
    ) -> Result<(), UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::VerifyUpgradeAndUpdateState,
        })
    }

    pub fn timestamp_at_height(&self, _height: u64) -> Result<u64, UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::GetTimestampAtHeight,
        })
    }

    /// Stores the initial consensus state of the client.
    pub fn initialize(
        &mut self,
        _consensus_state: &ConsensusState,
    ) -> Result<(), UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::Initialize,
        })
    }

    /// Returns the key-value pairs that the client exports when the foreign chain is restarted
    /// from a genesis.
    pub fn export_metadata(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::ExportMetadata,
        })
    }

    /// Returns a copy of the state where the fields that are specific to a single instance of
    /// the client are cleared.
    pub fn zero_custom_fields(&self) -> Result<ClientState, UnsupportedCallbackError> {
        Err(UnsupportedCallbackError {
            callback: Callback::ZeroCustomFields,
        })
    }

    /// Returns the SCALE encoding of the state.
    pub fn scale_encoding_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 8 + 1 + self.current_authorities.len() * 40 + 41);
        out.extend_from_slice(&self.para_id.to_le_bytes());
        out.extend_from_slice(&self.current_set_id.to_le_bytes());
        out.extend_from_slice(&storage::encode_authorities(&self.current_authorities));
        out.extend_from_slice(&self.latest_relay_hash);
        out.extend_from_slice(&self.latest_relay_height.to_le_bytes());
        out.extend_from_slice(&self.latest_para_height.to_le_bytes());
        out.push(self.relay_chain as u8);
        out
    }

    /// Attempt to decode the given SCALE-encoded state.
    pub fn decode(scale_encoded: &[u8]) -> Result<Self, codec::DecodeError> {
        codec::decode_all(scale_encoded, "client state", nom_client_state)
    }
}

/// Status of a light client on the foreign chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ClientStatus {
    Active,
    Frozen,
    Expired,
}

/// Error returned by [`ClientState::validate`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum InvalidClientStateError {
    #[display("Client state has no authority")]
    NoAuthority,
    #[display("Authority has a weight of zero")]
    ZeroWeight(#[error(not(source))] [u8; 32]),
    #[display("Latest relay chain hash is empty")]
    EmptyRelayHash,
}

/// Callback of the light client interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Callback {
    #[display("status")]
    Status,
    #[display("export_metadata")]
    ExportMetadata,
    #[display("zero_custom_fields")]
    ZeroCustomFields,
    #[display("get_timestamp_at_height")]
    GetTimestampAtHeight,
    #[display("initialize")]
    Initialize,
    #[display("verify_membership")]
    VerifyMembership,
    #[display("verify_non_membership")]
    VerifyNonMembership,
    #[display("verify_client_message")]
    VerifyClientMessage,
    #[display("check_for_misbehaviour")]
    CheckForMisbehaviour,
    #[display("update_state_on_misbehaviour")]
    UpdateStateOnMisbehaviour,
    #[display("update_state")]
    UpdateState,
    #[display("check_substitute_and_update_state")]
    CheckSubstituteAndUpdateState,
    #[display("verify_upgrade_and_update_state")]
    VerifyUpgradeAndUpdateState,
}

/// A light client callback isn't implemented by this client type.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Light client callback {callback} isn't supported by ics10-grandpa")]
pub struct UnsupportedCallbackError {
    pub callback: Callback,
}

fn nom_client_state(bytes: &[u8]) -> codec::IResult<ClientState> {
    let (bytes, para_id) = codec::context("para id", nom::number::complete::le_u32)(bytes)?;
    let (bytes, current_set_id) =
        codec::context("current set id", nom::number::complete::le_u64)(bytes)?;
    let (bytes, current_authorities) =
        codec::context("current authorities", storage::nom_authorities)(bytes)?;
    let (bytes, latest_relay_hash) =
        codec::context("latest relay hash", util::nom_array::<32>)(bytes)?;
    let (bytes, latest_relay_height) =
        codec::context("latest relay height", nom::number::complete::le_u32)(bytes)?;
    let (bytes, latest_para_height) =
        codec::context("latest para height", nom::number::complete::le_u32)(bytes)?;
    let (bytes, relay_chain) = codec::context("relay chain", |bytes| {
        let (bytes, discriminant) = nom::number::complete::u8(bytes)?;
        match RelayChain::try_from(i32::from(discriminant)) {
            Ok(relay_chain) => Ok((bytes, relay_chain)),
            Err(_) => Err(codec::ParseError::failure(
                codec::DecodeErrorKind::InvalidDiscriminant(discriminant),
            )),
        }
    })(bytes)?;

    Ok((
        bytes,
        ClientState {
            para_id,
            current_set_id,
            current_authorities,
            latest_relay_hash,
            latest_relay_height,
            latest_para_height,
            relay_chain,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::{
        Callback, ClientState, InvalidClientStateError, RelayChain, UnknownRelayChainError,
        UnsupportedCallbackError,
    };
    use crate::{codec::DecodeErrorKind, finality::verify::Authority};

    fn client_state() -> ClientState {
        ClientState {
            para_id: 2000,
            current_set_id: 42,
            current_authorities: (0..3)
                .map(|n| Authority {
                    public_key: [n; 32],
                    weight: 1,
                })
                .collect(),
            latest_relay_hash: [0xab; 32],
            latest_relay_height: 9_000_000,
            latest_para_height: 1_500_000,
            relay_chain: RelayChain::Kusama,
        }
    }

    #[test]
    fn relay_chain_conversions() {
        assert_eq!(RelayChain::try_from(0), Ok(RelayChain::Polkadot));
        assert_eq!(RelayChain::try_from(2), Ok(RelayChain::Rococo));
        assert_eq!(RelayChain::try_from(3), Err(UnknownRelayChainError));
        assert_eq!(RelayChain::try_from(-1), Err(UnknownRelayChainError));
        assert_eq!("kusama".parse::<RelayChain>(), Ok(RelayChain::Kusama));
        assert!("westend".parse::<RelayChain>().is_err());
        assert_eq!(RelayChain::Polkadot.to_string(), "polkadot");
        assert_eq!(
            serde_json::from_str::<RelayChain>("\"rococo\"").unwrap(),
            RelayChain::Rococo
        );
        assert!(serde_json::from_str::<RelayChain>("\"Rococo\"").is_err());
    }

    #[test]
    fn encode_decode() {
        let state = client_state();
        let encoded = state.scale_encoding_vec();
        assert_eq!(ClientState::decode(&encoded).unwrap(), state);

        let mut bad_chain = encoded.clone();
        *bad_chain.last_mut().unwrap() = 7;
        let err = ClientState::decode(&bad_chain).unwrap_err();
        assert_eq!(err.context, "relay chain");
        assert_eq!(err.kind, DecodeErrorKind::InvalidDiscriminant(7));

        let mut trailing = encoded;
        trailing.push(0);
        assert_eq!(
            ClientState::decode(&trailing).unwrap_err().kind,
            DecodeErrorKind::TrailingData(1)
        );
    }

    #[test]
    fn authorities_encoded_like_storage() {
        let state = client_state();
        let encoded = state.scale_encoding_vec();
        let authorities = crate::storage::encode_authorities(&state.current_authorities);
        assert_eq!(&encoded[12..12 + authorities.len()], &authorities[..]);

        // Authority list cut in the middle of the last public key.
        let err = ClientState::decode(&encoded[..12 + authorities.len() - 20]).unwrap_err();
        assert_eq!(err.context, "current authorities");
        assert_eq!(err.kind, DecodeErrorKind::UnexpectedEof);
    }

    #[test]
    fn validation() {
        let state = client_state();
        assert_eq!(state.client_type(), "ics10-grandpa");
        assert_eq!(state.latest_height(), 1_500_000);
        assert_eq!(state.validate(), Ok(()));

        let mut no_authority = state.clone();
        no_authority.current_authorities.clear();
        assert_eq!(
            no_authority.validate(),
            Err(InvalidClientStateError::NoAuthority)
        );

        let mut zero_weight = state;
        zero_weight.current_authorities[1].weight = 0;
        assert_eq!(
            zero_weight.validate(),
            Err(InvalidClientStateError::ZeroWeight([1; 32]))
        );
    }

    #[test]
    fn callbacks_unsupported() {
        let mut state = client_state();
        assert_eq!(
            state.verify_membership(1, &[], b"path", b"value"),
            Err(UnsupportedCallbackError {
                callback: Callback::VerifyMembership
            })
        );
        assert!(state.update_state(&[]).is_err());
        assert_eq!(
            state.status().unwrap_err().to_string(),
            "Light client callback status isn't supported by ics10-grandpa"
        );
    }
}
