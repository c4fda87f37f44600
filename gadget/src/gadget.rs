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

//! Interface shared by the finality gadgets.
//!
//! A relay chain finalizes its blocks through Grandpa, and optionally also through BEEFY. Each
//! consensus mechanism has its own finality gadget, that implements [`FinalityGadget`]. Callers
//! that need to choose the gadget at runtime can use [`AnyFinalityGadget`].

use crate::{beefy::Beefy, chain::ChainClient, error::Error, grandpa::Grandpa};

use core::future::Future;
use relay_finality::{
    client_state::ClientState, consensus_state::ConsensusState,
    finality::proof::ParachainHeadersWithFinalityProof,
};

/// Consensus mechanism of a gadget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GadgetKind {
    #[display("grandpa")]
    Grandpa,
    #[display("beefy")]
    Beefy,
}

/// Header built by a gadget, proving that some parachain blocks are finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalityHeader {
    Grandpa(ParachainHeadersWithFinalityProof),
    /// SCALE-encoded BEEFY header. Never built, as BEEFY isn't supported.
    Beefy(Vec<u8>),
}

impl FinalityHeader {
    /// Returns the kind of the gadget that has built this header.
    pub fn kind(&self) -> GadgetKind {
        match self {
            FinalityHeader::Grandpa(_) => GadgetKind::Grandpa,
            FinalityHeader::Beefy(_) => GadgetKind::Beefy,
        }
    }
}

/// Header in the format expected by the relayer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbcHeader {
    /// Height of the most recent parachain block proven by the header.
    pub height: u64,
    pub payload: FinalityHeader,
}

/// Source of finality proofs of the blocks of a parachain.
pub trait FinalityGadget: Send + Sync {
    /// Returns the consensus mechanism of the gadget.
    fn kind(&self) -> GadgetKind;

    /// Returns the height of the latest finalized block of the parachain and of the relay chain,
    /// in that order.
    fn query_latest_height(&self) -> impl Future<Output = Result<(u32, u32), Error>> + Send;

    /// Returns a header that proves the finality of the relay chain block at the given height,
    /// and of the parachain blocks included in it.
    fn query_header_at(
        &self,
        relay_height: u32,
    ) -> impl Future<Output = Result<FinalityHeader, Error>> + Send;

    /// Returns a header that lets a light client that knows the relay chain block at height
    /// `previously_finalized` advance to the block at height `finalized`.
    fn query_header_over_blocks(
        &self,
        finalized: u32,
        previously_finalized: u32,
    ) -> impl Future<Output = Result<FinalityHeader, Error>> + Send;

    /// Converts a header built by this gadget to the format expected by the relayer.
    fn ibc_header(&self, header: FinalityHeader) -> Result<IbcHeader, Error>;

    /// Builds the state of a light client that has verified the given header.
    fn client_state(
        &self,
        header: &IbcHeader,
    ) -> impl Future<Output = Result<ClientState, Error>> + Send;

    /// Builds the consensus state of the parachain block proven by the given header.
    fn consensus_state(
        &self,
        header: &IbcHeader,
    ) -> impl Future<Output = Result<ConsensusState, Error>> + Send;
}

/// Any of the finality gadgets.
pub enum AnyFinalityGadget<R, P> {
    Grandpa(Grandpa<R, P>),
    Beefy(Beefy),
}

impl<R: ChainClient, P: ChainClient> FinalityGadget for AnyFinalityGadget<R, P> {
    fn kind(&self) -> GadgetKind {
        match self {
            AnyFinalityGadget::Grandpa(gadget) => gadget.kind(),
            AnyFinalityGadget::Beefy(gadget) => gadget.kind(),
        }
    }

    async fn query_latest_height(&self) -> Result<(u32, u32), Error> {
        match self {
            AnyFinalityGadget::Grandpa(gadget) => gadget.query_latest_height().await,
            AnyFinalityGadget::Beefy(gadget) => gadget.query_latest_height().await,
        }
    }

    async fn query_header_at(&self, relay_height: u32) -> Result<FinalityHeader, Error> {
        match self {
            AnyFinalityGadget::Grandpa(gadget) => gadget.query_header_at(relay_height).await,
            AnyFinalityGadget::Beefy(gadget) => gadget.query_header_at(relay_height).await,
        }
    }

    async fn query_header_over_blocks(
        &self,
        finalized: u32,
        previously_finalized: u32,
    ) -> Result<FinalityHeader, Error> {
        match self {
            AnyFinalityGadget::Grandpa(gadget) => {
                gadget
                    .query_header_over_blocks(finalized, previously_finalized)
                    .await
            }
            AnyFinalityGadget::Beefy(gadget) => {
                gadget
                    .query_header_over_blocks(finalized, previously_finalized)
                    .await
            }
        }
    }

    fn ibc_header(&self, header: FinalityHeader) -> Result<IbcHeader, Error> {
        match self {
            AnyFinalityGadget::Grandpa(gadget) => gadget.ibc_header(header),
            AnyFinalityGadget::Beefy(gadget) => gadget.ibc_header(header),
        }
    }

    async fn client_state(&self, header: &IbcHeader) -> Result<ClientState, Error> {
        match self {
            AnyFinalityGadget::Grandpa(gadget) => gadget.client_state(header).await,
            AnyFinalityGadget::Beefy(gadget) => gadget.client_state(header).await,
        }
    }

    async fn consensus_state(&self, header: &IbcHeader) -> Result<ConsensusState, Error> {
        match self {
            AnyFinalityGadget::Grandpa(gadget) => gadget.consensus_state(header).await,
            AnyFinalityGadget::Beefy(gadget) => gadget.consensus_state(header).await,
        }
    }
}
