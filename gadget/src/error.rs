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

//! Errors returned by the finality gadgets.
//!
//! All the failures of a gadget are reported through the closed [`Error`] enum. Its
//! [`Error::kind`] groups the variants into categories that tell the caller what to do with the
//! failure:
//!
//! - [`ErrorKind::Transport`] and [`ErrorKind::Availability`] failures can be retried later.
//! - [`ErrorKind::Decode`] and [`ErrorKind::Consensus`] failures concern data that will never
//! become valid. Retrying is pointless, and [`ErrorKind::Consensus`] failures might indicate a
//! misbehaviour of the remote.
//! - The other kinds are mistakes of the caller or of the configuration.

use relay_finality::{
    client_state::InvalidClientStateError, codec::DecodeError,
    consensus_state::ConsensusStateError,
    finality::{proof::BadHeaderChainError, verify::JustificationVerifyError},
    informant::HashDisplay,
};

use crate::{chain::QueryError, config::ConfigError, gadget::GadgetKind, metadata::MetadataError};

/// Error potentially returned by a finality gadget.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum Error {
    /// Failed to query one of the chains.
    #[display("{_0}")]
    Query(QueryError),
    /// The requested relay chain block isn't finalized yet.
    #[display("Block #{requested} isn't finalized yet, finalized block is #{finalized}")]
    #[from(ignore)]
    NotYetFinalized { requested: u32, finalized: u32 },
    /// The chain doesn't know any block at the given height.
    #[display("No block at height #{_0}")]
    #[from(ignore)]
    BlockNotFound(#[error(not(source))] u32),
    /// The chain doesn't know the block with the given hash.
    #[display("Unknown block {}", HashDisplay(_0))]
    #[from(ignore)]
    UnknownBlock(#[error(not(source))] [u8; 32]),
    /// The block exists but doesn't carry any Grandpa justification.
    #[display("Block #{_0} has no Grandpa justification")]
    #[from(ignore)]
    MissingJustification(#[error(not(source))] u32),
    #[display("parachain set not found")]
    #[from(ignore)]
    ParachainSetNotFound,
    #[display("parachain header not found")]
    #[from(ignore)]
    ParachainHeaderNotFound,
    #[display("authority set not found")]
    #[from(ignore)]
    AuthoritySetNotFound,
    #[display("current set id not found")]
    #[from(ignore)]
    CurrentSetIdNotFound,
    #[display("there is no beefy justification at this height")]
    #[from(ignore)]
    MissingBeefyJustification,
    /// Data returned by a chain couldn't be decoded.
    #[display("{_0}")]
    Decode(DecodeError),
    /// The metadata of a chain is invalid.
    #[display("Invalid metadata: {_0}")]
    Metadata(MetadataError),
    /// The consensus state of a parachain block can't be built.
    #[display("{_0}")]
    ConsensusState(ConsensusStateError),
    /// The justification of the relay chain is invalid.
    #[display("Invalid justification: {_0}")]
    Justification(JustificationVerifyError),
    /// The justification is valid, but finalizes another block than the requested one.
    #[display(
        "Justification finalizes {} instead of {}",
        HashDisplay(got),
        HashDisplay(expected)
    )]
    #[from(ignore)]
    TargetMismatch { expected: [u8; 32], got: [u8; 32] },
    /// The headers between the previously finalized block and the finalized one don't form a
    /// chain.
    #[display("Invalid relay chain headers: {_0}")]
    BadHeaderChain(BadHeaderChainError),
    /// The finalized block isn't above the previously finalized block.
    #[display("Finalized block #{finalized} isn't above #{previously_finalized}")]
    #[from(ignore)]
    InvalidRange {
        finalized: u32,
        previously_finalized: u32,
    },
    /// The client state derived from the chains is invalid.
    #[display("Invalid client state: {_0}")]
    InvalidClientState(InvalidClientStateError),
    /// A header produced by a gadget has been passed to a gadget of another kind.
    #[display("Got a {got} header but expected a {expected} header")]
    #[from(ignore)]
    TypeMismatch {
        expected: GadgetKind,
        got: GadgetKind,
    },
    /// The gadget doesn't support the operation.
    #[display("Operation {operation} isn't supported by the {gadget} gadget")]
    #[from(ignore)]
    Unsupported {
        gadget: GadgetKind,
        operation: &'static str,
    },
    #[display("{_0}")]
    Configuration(ConfigError),
}

impl Error {
    /// Returns the category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Query(QueryError::InvalidResponse(_)) => ErrorKind::Decode,
            Error::Query(
                QueryError::Transport(_) | QueryError::Timeout | QueryError::Rpc { .. },
            ) => ErrorKind::Transport,
            Error::NotYetFinalized { .. }
            | Error::BlockNotFound(_)
            | Error::UnknownBlock(_)
            | Error::MissingJustification(_)
            | Error::ParachainSetNotFound
            | Error::ParachainHeaderNotFound
            | Error::AuthoritySetNotFound
            | Error::CurrentSetIdNotFound
            | Error::MissingBeefyJustification => ErrorKind::Availability,
            Error::Decode(_) | Error::Metadata(_) | Error::ConsensusState(_) => ErrorKind::Decode,
            Error::Justification(_)
            | Error::TargetMismatch { .. }
            | Error::BadHeaderChain(_)
            | Error::InvalidRange { .. }
            | Error::InvalidClientState(_) => ErrorKind::Consensus,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Returns `true` if the same request might succeed if it is attempted again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Availability)
    }
}

/// See [`Error::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorKind {
    /// A chain couldn't be reached or answered with an error.
    #[display("transport")]
    Transport,
    /// The requested data doesn't exist yet.
    #[display("availability")]
    Availability,
    /// Data returned by a chain is malformed.
    #[display("decode")]
    Decode,
    /// Data returned by a chain breaks a rule of the consensus.
    #[display("consensus")]
    Consensus,
    #[display("type mismatch")]
    TypeMismatch,
    #[display("unsupported")]
    Unsupported,
    #[display("configuration")]
    Configuration,
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};
    use crate::{chain::QueryError, gadget::GadgetKind};

    #[test]
    fn sentinels_display() {
        assert_eq!(
            Error::ParachainSetNotFound.to_string(),
            "parachain set not found"
        );
        assert_eq!(
            Error::AuthoritySetNotFound.to_string(),
            "authority set not found"
        );
        assert_eq!(
            Error::MissingBeefyJustification.to_string(),
            "there is no beefy justification at this height"
        );
        assert_eq!(
            Error::ParachainHeaderNotFound.to_string(),
            "parachain header not found"
        );
        assert_eq!(
            Error::CurrentSetIdNotFound.to_string(),
            "current set id not found"
        );
    }

    #[test]
    fn retryable() {
        assert!(Error::Query(QueryError::Timeout).is_retryable());
        assert!(Error::Query(QueryError::Transport("connection reset".into())).is_retryable());
        assert!(Error::Query(QueryError::Rpc {
            code: -32000,
            message: "busy".into()
        })
        .is_retryable());

        // A node that sends undecodable data keeps sending it.
        let invalid = Error::Query(QueryError::InvalidResponse("invalid digest log".into()));
        assert_eq!(invalid.kind(), ErrorKind::Decode);
        assert!(!invalid.is_retryable());

        assert!(Error::MissingJustification(5).is_retryable());
        assert!(Error::AuthoritySetNotFound.is_retryable());

        let mismatch = Error::TypeMismatch {
            expected: GadgetKind::Grandpa,
            got: GadgetKind::Beefy,
        };
        assert_eq!(mismatch.kind(), ErrorKind::TypeMismatch);
        assert!(!mismatch.is_retryable());

        let range = Error::InvalidRange {
            finalized: 3,
            previously_finalized: 5,
        };
        assert_eq!(range.kind(), ErrorKind::Consensus);
        assert!(!range.is_retryable());
    }
}
