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

//! Primitives to prove that a block of a relay chain, and transitively the parachain blocks
//! anchored to it, are finalized.
//!
//! This library contains the pure part of a cross-chain relayer's finality layer: the data
//! structures exchanged with a foreign light client, their SCALE encoding, and the verification
//! of Grandpa justifications. It doesn't perform any networking or I/O, and doesn't emit logs.
//!
//! # Overview
//!
//! - [`header`] decodes and encodes Substrate block headers and calculates their hash.
//! - [`finality`] contains the Grandpa justification format, the finality proof that wraps it,
//! and the verification of a justification against an authorities set.
//! - [`storage`] builds the storage keys of the relay chain items that are needed to build a
//! proof, and decodes their values.
//! - [`client_state`] and [`consensus_state`] describe the state of the foreign light client
//! that tracks a parachain through these proofs.
//!
//! All the decoding functions of this library never panic, and report the problematic field
//! through a [`codec::DecodeError`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
// TODO: the `unused_crate_dependencies` lint is disabled because of dev-dependencies, see <https://github.com/rust-lang/rust/issues/95513>
// #![deny(unused_crate_dependencies)]

extern crate alloc;

pub mod client_state;
pub mod codec;
pub mod consensus_state;
pub mod finality;
pub mod header;
pub mod informant;
pub mod storage;

mod util;
