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

//! Verification of Grandpa justifications.
//!
//! A justification is valid if:
//!
//! - Its round isn't older than the last round accepted by the verifier.
//! - Each of its precommits is signed by a member of the authorities set.
//! - Each precommit targets either the target of the commit or one of its descendants, and the
//! headers of `votes_ancestries` link these descendants to the target. No header of
//! `votes_ancestries` can be left unused.
//! - The sum of the weights of the signers is strictly above two thirds of the total weight of
//! the authorities set. An authority that signs several precommits is only counted once.
//! - All the signatures are valid.
//!
//! A justification that fails one of these checks is entirely refused.

use super::justification::GrandpaJustification;
use crate::util;

use alloc::vec::Vec;
use rand_chacha::{
    rand_core::{RngCore as _, SeedableRng as _},
    ChaCha20Rng,
};

/// Member of a Grandpa authorities set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Authority {
    /// Ed25519 public key of the authority.
    pub public_key: [u8; 32],
    /// Voting weight of the authority. Almost always equal to 1 in practice.
    pub weight: u64,
}

/// Authorities allowed to emit precommits, and the identifier of their set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritySet {
    /// Identifier of the set, incremented by one at each change of authorities.
    pub set_id: u64,
    pub authorities: Vec<Authority>,
}

impl AuthoritySet {
    /// Returns the sum of the weights of all the authorities.
    pub fn total_weight(&self) -> u128 {
        self.authorities
            .iter()
            .map(|a| u128::from(a.weight))
            .sum()
    }
}

/// Position of a Grandpa round within the history of the chain.
///
/// Ordered first by authorities set, then by round number, as rounds restart at each set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("round {round} of set {set_id}")]
pub struct RoundPosition {
    pub set_id: u64,
    pub round: u64,
}

/// Configuration for a justification verification process.
#[derive(Debug)]
pub struct JustificationVerifyConfig<'a> {
    /// Justification to verify.
    pub justification: &'a GrandpaJustification,

    /// Identifier of the authorities set that has produced the justification. Part of the
    /// messages signed by the authorities.
    pub authorities_set_id: u64,

    /// List of authorities that are allowed to emit pre-commits for the block referred to by
    /// the justification.
    pub authorities: &'a [Authority],

    /// Position of the last justification accepted by the caller, if any. Justifications of an
    /// older round are refused.
    pub last_accepted: Option<RoundPosition>,

    /// Seed for a PRNG used for various purposes during the verification.
    ///
    /// > **Note**: The verification is nonetheless deterministic.
    pub randomness_seed: [u8; 32],
}

/// Verifies that a justification is valid.
pub fn verify_justification(
    config: JustificationVerifyConfig<'_>,
) -> Result<(), JustificationVerifyError> {
    let justification = config.justification;
    let position = RoundPosition {
        set_id: config.authorities_set_id,
        round: justification.round,
    };

    RoundTracker {
        last_accepted: config.last_accepted,
    }
    .check(position)?;

    let mut randomness = ChaCha20Rng::from_seed(config.randomness_seed);

    // Collect the authorities in a map in order to be able to determine with a low complexity
    // whether a public key is an authority.
    // For each authority, contains its weight and a boolean indicating whether the authority has
    // been seen before in the list of pre-commits.
    // Weights are summed as `u128`, which can't overflow for less than 2^64 authorities.
    let mut authorities_list = {
        let mut list = hashbrown::HashMap::<&[u8; 32], (u128, bool), _>::with_capacity_and_hasher(
            config.authorities.len(),
            util::SipHasherBuild::new({
                let mut seed = [0; 16];
                randomness.fill_bytes(&mut seed);
                seed
            }),
        );
        for authority in config.authorities {
            let entry = list.entry(&authority.public_key).or_insert((0, false));
            entry.0 += u128::from(authority.weight);
        }
        list
    };

    let total_weight = authorities_list
        .values()
        .map(|(weight, _)| *weight)
        .sum::<u128>();
    if total_weight == 0 {
        return Err(JustificationVerifyError::EmptyAuthoritySet);
    }

    // An authority that equivocates has several precommits in the justification. Its signatures
    // are all verified, but its weight only counts once.
    let mut signed_weight = 0u128;
    for signed in &justification.commit.precommits {
        match authorities_list.get_mut(&signed.id) {
            Some((_, true)) => {}
            Some((weight, seen)) => {
                *seen = true;
                signed_weight += *weight;
            }
            None => return Err(JustificationVerifyError::NotAuthority(signed.id)),
        }
    }

    verify_ancestry(justification, &mut randomness)?;

    // Check that the signers weigh strictly more than 2/3rd of the total weight.
    if signed_weight * 3 <= total_weight * 2 {
        return Err(JustificationVerifyError::NotEnoughSignatures {
            signed_weight,
            total_weight,
        });
    }

    // Verifying all the signatures together brings better performances than verifying them one
    // by one.
    // Note that batched ed25519 verification has some issues. The code below uses a special
    // flavour of ed25519 where ambiguities are removed.
    // See https://docs.rs/ed25519-zebra/2.2.0/ed25519_zebra/batch/index.html and
    // https://github.com/zcash/zips/blob/master/zip-0215.rst
    let mut batch = ed25519_zebra::batch::Verifier::new();

    for signed in &justification.commit.precommits {
        let msg = signed
            .precommit
            .signed_message(justification.round, config.authorities_set_id);

        batch.queue(ed25519_zebra::batch::Item::from((
            ed25519_zebra::VerificationKeyBytes::from(signed.id),
            ed25519_zebra::Signature::from(signed.signature),
            &msg,
        )));
    }

    // Actual signatures verification performed here.
    batch
        .verify(&mut randomness)
        .map_err(|_| JustificationVerifyError::BadSignature)?;

    Ok(())
}

/// Checks that the target of every precommit is the target of the commit or one of its
/// descendants, and that all the headers of `votes_ancestries` are needed to prove it.
fn verify_ancestry(
    justification: &GrandpaJustification,
    randomness: &mut ChaCha20Rng,
) -> Result<(), JustificationVerifyError> {
    let (target_hash, target_number) = justification.target();

    let mut hasher_seed = [0; 16];
    randomness.fill_bytes(&mut hasher_seed);

    let ancestries = {
        let mut map = hashbrown::HashMap::with_capacity_and_hasher(
            justification.votes_ancestries.len(),
            util::SipHasherBuild::new(hasher_seed),
        );
        for header in &justification.votes_ancestries {
            map.insert(header.hash(), header);
        }
        map
    };

    let mut visited = hashbrown::HashSet::with_capacity_and_hasher(
        ancestries.len(),
        util::SipHasherBuild::new(hasher_seed),
    );

    for signed in &justification.commit.precommits {
        let mut current_hash = signed.precommit.target_hash;
        let mut current_number = signed.precommit.target_number;

        loop {
            if current_hash == target_hash {
                if current_number != target_number {
                    return Err(JustificationVerifyError::BadAncestry(
                        signed.precommit.target_hash,
                    ));
                }
                break;
            }

            let header = match ancestries.get(&current_hash) {
                Some(h) if h.number == current_number && current_number > target_number => h,
                _ => {
                    return Err(JustificationVerifyError::BadAncestry(
                        signed.precommit.target_hash,
                    ))
                }
            };

            // Headers already walked through by a previous precommit link to the target.
            if !visited.insert(current_hash) {
                break;
            }

            current_hash = header.parent_hash;
            current_number -= 1;
        }
    }

    if visited.len() != justification.votes_ancestries.len() {
        return Err(JustificationVerifyError::UnusedAncestries {
            num_unused: justification.votes_ancestries.len() - visited.len(),
        });
    }

    Ok(())
}

/// Keeps track of the last round whose justification has been accepted.
///
/// Justifications must be accepted in a non-decreasing order of [`RoundPosition`].
#[derive(Debug, Clone, Default)]
pub struct RoundTracker {
    last_accepted: Option<RoundPosition>,
}

impl RoundTracker {
    /// Builds a new tracker that hasn't accepted any round yet.
    pub fn new() -> Self {
        RoundTracker::default()
    }

    /// Returns the last round passed to [`RoundTracker::accept`].
    pub fn last_accepted(&self) -> Option<RoundPosition> {
        self.last_accepted
    }

    /// Returns an error if a justification of the given round can't be accepted anymore.
    pub fn check(&self, position: RoundPosition) -> Result<(), JustificationVerifyError> {
        match self.last_accepted {
            Some(last) if position < last => Err(JustificationVerifyError::RoundRegression {
                last,
                got: position,
            }),
            _ => Ok(()),
        }
    }

    /// Marks the given round as accepted. Returns an error, and leaves the tracker untouched, if
    /// [`RoundTracker::check`] fails.
    pub fn accept(&mut self, position: RoundPosition) -> Result<(), JustificationVerifyError> {
        self.check(position)?;
        self.last_accepted = Some(position);
        Ok(())
    }
}

/// Verifies a stream of justifications against an authorities set, the way a light client does.
#[derive(Debug, Clone)]
pub struct JustificationVerifier {
    authorities: AuthoritySet,
    rounds: RoundTracker,
    randomness_seed: [u8; 32],
}

impl JustificationVerifier {
    /// Builds a verifier that trusts the given authorities set.
    pub fn new(authorities: AuthoritySet, randomness_seed: [u8; 32]) -> Self {
        JustificationVerifier {
            authorities,
            rounds: RoundTracker::new(),
            randomness_seed,
        }
    }

    /// Returns the authorities set that justifications are verified against.
    pub fn authorities(&self) -> &AuthoritySet {
        &self.authorities
    }

    /// Returns the last accepted round.
    pub fn last_accepted(&self) -> Option<RoundPosition> {
        self.rounds.last_accepted()
    }

    /// Switches to a new authorities set. The set id must not be lower than the current one.
    pub fn set_authorities(
        &mut self,
        authorities: AuthoritySet,
    ) -> Result<(), JustificationVerifyError> {
        if authorities.set_id < self.authorities.set_id {
            return Err(JustificationVerifyError::SetIdRegression {
                current: self.authorities.set_id,
                got: authorities.set_id,
            });
        }
        self.authorities = authorities;
        Ok(())
    }

    /// Verifies the justification and, on success, records its round as the last accepted one.
    pub fn verify_and_accept(
        &mut self,
        justification: &GrandpaJustification,
    ) -> Result<(), JustificationVerifyError> {
        verify_justification(JustificationVerifyConfig {
            justification,
            authorities_set_id: self.authorities.set_id,
            authorities: &self.authorities.authorities,
            last_accepted: self.rounds.last_accepted(),
            randomness_seed: self.randomness_seed,
        })?;

        self.rounds.accept(RoundPosition {
            set_id: self.authorities.set_id,
            round: justification.round,
        })
    }
}

/// Error that can happen while verifying a justification.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum JustificationVerifyError {
    /// The round of the justification is older than the last accepted one.
    #[display("Justification of {got} is older than the last accepted {last}")]
    RoundRegression {
        last: RoundPosition,
        got: RoundPosition,
    },
    /// The authorities set is older than the current one.
    #[display("Authorities set {got} is older than the current set {current}")]
    SetIdRegression { current: u64, got: u64 },
    /// The authorities set is empty or all its weights are zero.
    #[display("Authorities set has a total weight of zero")]
    EmptyAuthoritySet,
    /// One of the signatures can't be verified.
    #[display("Invalid precommit signature")]
    BadSignature,
    /// One of the public keys isn't in the list of authorities.
    #[display("One of the public keys isn't in the list of authorities")]
    NotAuthority(#[error(not(source))] [u8; 32]),
    /// A precommit targets a block that can't be linked to the target of the commit through
    /// the votes ancestries.
    #[display("Precommit targets a block that isn't a known descendant of the commit target")]
    BadAncestry(#[error(not(source))] [u8; 32]),
    /// Some headers of the votes ancestries aren't used to link any precommit to the target.
    #[display("{num_unused} votes ancestries are unused")]
    UnusedAncestries { num_unused: usize },
    /// Justification doesn't contain enough authorities signatures to be valid.
    #[display("Signers weigh {signed_weight} out of {total_weight}, which isn't above 2/3rd")]
    NotEnoughSignatures {
        signed_weight: u128,
        total_weight: u128,
    },
}
