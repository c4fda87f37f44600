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

//! Finality consists in declaring a block as irreversible. It is now forever part of the chain.
//!
//! On a relay chain, finality is reached through the Grandpa protocol: the authorities of the
//! current authorities set vote in rounds, and a block is finalized once more than two thirds of
//! the total weight of the authorities have emitted a signed precommit for it or for one of its
//! descendants. The set of these signed precommits, together with the headers that link the
//! precommit targets to the finalized block, is called a *justification*.
//!
//! A relayer proves the finality of a block to a foreign light client by providing a
//! [`proof::FinalityProof`], which embeds a justification, and the parachain headers that the
//! relay chain has included up to that block.
//!
//! See:
//!
//! - [`justification`] for the format of Grandpa justifications.
//! - [`verify`] for the verification of a justification against an authorities set.
//! - [`proof`] for the data structures that are sent to the foreign light client.

pub mod justification;
pub mod proof;
pub mod verify;
