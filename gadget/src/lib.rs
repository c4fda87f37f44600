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

//! Finality gadgets of a cross-chain relayer.
//!
//! A finality gadget queries a relay chain and one of its parachains, and builds the headers that
//! a foreign light client needs in order to consider a parachain block as finalized. Two
//! consensus mechanisms exist on the relay chain side: Grandpa, implemented by [`Grandpa`], and
//! BEEFY, for which only [`Beefy`], a placeholder that refuses all the requests, exists.
//!
//! # Usage
//!
//! The chains are accessed through the [`chain::ChainClient`] trait. [`json_rpc::JsonRpcClient`]
//! implements this trait on top of any transport that can send JSON-RPC requests to a
//! Substrate node.
//!
//! ```no_run
//! # async fn foo(
//! #     relay: impl relay_finality_gadget::chain::ChainClient,
//! #     para: impl relay_finality_gadget::chain::ChainClient,
//! # ) -> Result<(), relay_finality_gadget::Error> {
//! use relay_finality_gadget::{FinalityGadget as _, Grandpa, GrandpaConfig};
//!
//! let config = GrandpaConfig::from_json(r#"{"para_id": 2000, "relay_chain": "rococo"}"#)?;
//! let gadget = Grandpa::new(config, relay, para, None).await?;
//!
//! let (para_height, relay_height) = gadget.query_latest_height().await?;
//! let header = gadget.query_header_at(relay_height).await?;
//! let client_state = gadget.client_state(&gadget.ibc_header(header)?).await?;
//! # let _ = (para_height, client_state);
//! # Ok(())
//! # }
//! ```
//!
//! All the operations of a gadget take `&self` and can be called concurrently. Failures are
//! reported through [`Error`], whose [`Error::is_retryable`] indicates whether the same request
//! might succeed later.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod beefy;
pub mod chain;
pub mod config;
pub mod error;
pub mod gadget;
pub mod grandpa;
pub mod json_rpc;
pub mod metadata;

pub use beefy::Beefy;
pub use config::GrandpaConfig;
pub use error::{Error, ErrorKind};
pub use gadget::{AnyFinalityGadget, FinalityGadget, FinalityHeader, GadgetKind, IbcHeader};
pub use grandpa::Grandpa;
