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

//! BEEFY finality gadget.
//!
//! BEEFY isn't supported. [`Beefy`] exists so that callers can select a gadget at runtime, and
//! refuses every request with [`Error::Unsupported`].

use crate::{
    error::Error,
    gadget::{FinalityGadget, FinalityHeader, GadgetKind, IbcHeader},
};

use relay_finality::{client_state::ClientState, consensus_state::ConsensusState};

/// BEEFY finality gadget. See [the module-level documentation](self).
#[derive(Debug, Default, Clone)]
pub struct Beefy;

fn unsupported(operation: &'static str) -> Error {
    Error::Unsupported {
        gadget: GadgetKind::Beefy,
        operation,
    }
}

impl FinalityGadget for Beefy {
    fn kind(&self) -> GadgetKind {
        GadgetKind::Beefy
    }

    async fn query_latest_height(&self) -> Result<(u32, u32), Error> {
        Err(unsupported("query_latest_height"))
    }

    async fn query_header_at(&self, _: u32) -> Result<FinalityHeader, Error> {
        Err(unsupported("query_header_at"))
    }

    async fn query_header_over_blocks(&self, _: u32, _: u32) -> Result<FinalityHeader, Error> {
        Err(unsupported("query_header_over_blocks"))
    }

    fn ibc_header(&self, _: FinalityHeader) -> Result<IbcHeader, Error> {
        Err(unsupported("ibc_header"))
    }

    async fn client_state(&self, _: &IbcHeader) -> Result<ClientState, Error> {
        Err(unsupported("client_state"))
    }

    async fn consensus_state(&self, _: &IbcHeader) -> Result<ConsensusState, Error> {
        Err(unsupported("consensus_state"))
    }
}

#[cfg(test)]
mod tests {
    use super::Beefy;
    use crate::{
        error::ErrorKind,
        gadget::{FinalityGadget as _, FinalityHeader, GadgetKind, IbcHeader},
    };

    #[test]
    fn everything_unsupported() {
        let gadget = Beefy;
        assert_eq!(gadget.kind(), GadgetKind::Beefy);

        smol::block_on(async {
            let header = IbcHeader {
                height: 1,
                payload: FinalityHeader::Beefy(Vec::new()),
            };

            for err in [
                gadget.query_latest_height().await.unwrap_err(),
                gadget.query_header_at(5).await.unwrap_err(),
                gadget.query_header_over_blocks(5, 4).await.unwrap_err(),
                gadget.ibc_header(header.payload.clone()).unwrap_err(),
                gadget.client_state(&header).await.unwrap_err(),
                gadget.consensus_state(&header).await.unwrap_err(),
            ] {
                assert_eq!(err.kind(), ErrorKind::Unsupported);
                assert!(!err.is_retryable());
            }
        });

        let err = smol::block_on(gadget.query_header_at(5)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operation query_header_at isn't supported by the beefy gadget"
        );
    }
}
