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

//! Read-only access to a chain.
//!
//! The [`ChainClient`] trait is what a finality gadget needs from a chain. Every method is a
//! single request/response exchange with a node of the chain. Dropping the returned future
//! cancels the request.

use core::{future::Future, time::Duration};
use futures_lite::FutureExt as _;
use relay_finality::header::Header;

/// Block of a chain, as returned by [`ChainClient::block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    /// SCALE-encoded extrinsics of the block, in order.
    pub extrinsics: Vec<Vec<u8>>,
    /// Justifications of the block, each tagged with the identifier of the consensus engine that
    /// has produced it.
    pub justifications: Vec<([u8; 4], Vec<u8>)>,
}

impl Block {
    /// Returns the justification produced by the given consensus engine, if any.
    pub fn justification(&self, engine_id: &[u8; 4]) -> Option<&[u8]> {
        self.justifications
            .iter()
            .find(|(id, _)| id == engine_id)
            .map(|(_, justification)| &justification[..])
    }
}

/// Access to a node of a chain.
///
/// Methods return `Ok(None)` when the node answers that the requested item doesn't exist.
pub trait ChainClient: Send + Sync {
    /// Returns the hash of the latest finalized block.
    fn finalized_head(&self) -> impl Future<Output = Result<[u8; 32], QueryError>> + Send;

    /// Returns the hash of the block of the canonical chain at the given height.
    fn block_hash(
        &self,
        number: u32,
    ) -> impl Future<Output = Result<Option<[u8; 32]>, QueryError>> + Send;

    /// Returns the header of the block with the given hash.
    fn header(
        &self,
        hash: [u8; 32],
    ) -> impl Future<Output = Result<Option<Header>, QueryError>> + Send;

    /// Returns the header, body and justifications of the block with the given hash.
    fn block(
        &self,
        hash: [u8; 32],
    ) -> impl Future<Output = Result<Option<Block>, QueryError>> + Send;

    /// Returns the value of the given storage key in the state of the given block.
    fn storage(
        &self,
        key: Vec<u8>,
        at: [u8; 32],
    ) -> impl Future<Output = Result<Option<Vec<u8>>, QueryError>> + Send;

    /// Returns the SCALE-encoded metadata of the runtime of the given block, or of the best
    /// block if `None`.
    fn metadata(
        &self,
        at: Option<[u8; 32]>,
    ) -> impl Future<Output = Result<Vec<u8>, QueryError>> + Send;

    /// Returns the specification version of the runtime of the given block, or of the best
    /// block if `None`.
    fn runtime_spec_version(
        &self,
        at: Option<[u8; 32]>,
    ) -> impl Future<Output = Result<u32, QueryError>> + Send;
}

/// Error potentially returned by a [`ChainClient`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum QueryError {
    /// The node couldn't be reached.
    #[display("Transport error: {_0}")]
    Transport(#[error(not(source))] String),
    /// The node didn't answer in time.
    #[display("Request timeout")]
    Timeout,
    /// The answer of the node isn't valid.
    #[display("Invalid response from node: {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// The node has answered with an error.
    #[display("Node returned error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Runs the given query, and fails with [`QueryError::Timeout`] if it doesn't finish within
/// `timeout`. No time limit applies if `timeout` is `None`.
pub async fn with_timeout<T>(
    timeout: Option<Duration>,
    query: impl Future<Output = Result<T, QueryError>>,
) -> Result<T, QueryError> {
    match timeout {
        None => query.await,
        Some(timeout) => {
            query
                .or(async move {
                    smol::Timer::after(timeout).await;
                    Err(QueryError::Timeout)
                })
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Block, QueryError};
    use core::time::Duration;
    use relay_finality::header::Header;

    #[test]
    fn justification_by_engine() {
        let block = Block {
            header: Header {
                parent_hash: [0; 32],
                number: 1,
                state_root: [0; 32],
                extrinsics_root: [0; 32],
                digest: Vec::new(),
            },
            extrinsics: Vec::new(),
            justifications: vec![(*b"BEEF", vec![1, 2]), (*b"FRNK", vec![3])],
        };
        assert_eq!(block.justification(b"FRNK"), Some(&[3][..]));
        assert_eq!(block.justification(b"BABE"), None);
    }

    #[test]
    fn timeout_fires() {
        let result = smol::block_on(super::with_timeout(
            Some(Duration::from_millis(10)),
            futures_lite::future::pending::<Result<(), QueryError>>(),
        ));
        assert_eq!(result, Err(QueryError::Timeout));
    }

    #[test]
    fn no_timeout() {
        let result = smol::block_on(super::with_timeout(None, async { Ok::<_, QueryError>(5) }));
        assert_eq!(result, Ok(5));
    }
}
