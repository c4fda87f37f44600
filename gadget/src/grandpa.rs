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

//! Grandpa finality gadget.
//!
//! The [`Grandpa`] gadget builds proofs that parachain blocks are finalized by reading the
//! state of the relay chain, where the head of each parachain is stored, and the Grandpa
//! justifications of the relay chain blocks.
//!
//! # Proof construction
//!
//! In order to prove that the relay chain block at height `F` is finalized, the gadget:
//!
//! - Downloads the block at height `F` and extracts its Grandpa justification. Not all blocks
//! have a justification, in which case [`Error::MissingJustification`] is returned and the
//! caller should try again with another block.
//! - Verifies the justification against the authorities set found in the state of the parent of
//! the block. An invalid justification is refused with [`Error::Justification`].
//! - Downloads the headers of the relay chain blocks between the block already known by the
//! light client, excluded, and `F`, included.
//! - Reads the list of parachains and the head of each parachain in the state of each of these
//! relay chain blocks.
//!
//! The gadget doesn't keep any state other than the metadata of the chains, which is downloaded
//! when the gadget is created.

use crate::{
    chain::{self, ChainClient, QueryError},
    config::GrandpaConfig,
    error::Error,
    gadget::{FinalityGadget, FinalityHeader, GadgetKind, IbcHeader},
    metadata::{self, Metadata, MetadataCache},
};

use core::{future::Future, time::Duration};
use relay_finality::{
    client_state::{ClientState, RelayChain},
    consensus_state::{ConsensusState, TimestampCall},
    finality::{
        justification::GrandpaJustification,
        proof::{FinalityProof, ParachainHeaderWithRelayHash, ParachainHeadersWithFinalityProof},
        verify::{self, AuthoritySet},
    },
    header::Header,
    informant::HashDisplay,
    storage,
};
use std::sync::Arc;

/// Grandpa finality gadget. See [the module-level documentation](self).
pub struct Grandpa<R, P> {
    relay_chain: R,
    parachain: P,
    para_id: u32,
    relay_chain_id: RelayChain,
    timestamp_call: TimestampCall,
    request_timeout: Option<Duration>,
    log_target: String,
    relay_metadata: Arc<Metadata>,
    para_metadata: Arc<Metadata>,
}

impl<R: ChainClient, P: ChainClient> Grandpa<R, P> {
    /// Initializes the gadget by downloading the metadata of both chains.
    ///
    /// The metadata is looked up in `metadata_cache` first, if any, and inserted in it after
    /// having been downloaded.
    pub async fn new(
        config: GrandpaConfig,
        relay_chain: R,
        parachain: P,
        metadata_cache: Option<&MetadataCache>,
    ) -> Result<Self, Error> {
        let log_target = config.log_target();
        let request_timeout = config.request_timeout();

        let relay_metadata =
            metadata::fetch(&relay_chain, metadata_cache, request_timeout, &log_target).await?;
        let para_metadata =
            metadata::fetch(&parachain, metadata_cache, request_timeout, &log_target).await?;

        log::info!(
            target: &*log_target,
            "Initialized Grandpa gadget of parachain {} on {}. Metadata versions: relay chain v{}, \
            parachain v{}",
            config.para_id,
            config.relay_chain,
            relay_metadata.version(),
            para_metadata.version(),
        );

        Ok(Grandpa {
            relay_chain,
            parachain,
            para_id: config.para_id,
            relay_chain_id: config.relay_chain,
            timestamp_call: config.timestamp_call,
            request_timeout,
            log_target,
            relay_metadata,
            para_metadata,
        })
    }

    /// Returns the identifier of the parachain within the relay chain.
    pub fn para_id(&self) -> u32 {
        self.para_id
    }

    pub fn relay_chain(&self) -> RelayChain {
        self.relay_chain_id
    }

    /// Returns the metadata of the relay chain downloaded at initialization.
    pub fn relay_metadata(&self) -> &Metadata {
        &self.relay_metadata
    }

    /// Returns the metadata of the parachain downloaded at initialization.
    pub fn para_metadata(&self) -> &Metadata {
        &self.para_metadata
    }

    async fn timed<T>(
        &self,
        query: impl Future<Output = Result<T, QueryError>>,
    ) -> Result<T, Error> {
        Ok(chain::with_timeout(self.request_timeout, query).await?)
    }

    async fn relay_hash_at(&self, number: u32) -> Result<[u8; 32], Error> {
        self.timed(self.relay_chain.block_hash(number))
            .await?
            .ok_or(Error::BlockNotFound(number))
    }

    async fn relay_header(&self, hash: [u8; 32]) -> Result<Header, Error> {
        self.timed(self.relay_chain.header(hash))
            .await?
            .ok_or(Error::UnknownBlock(hash))
    }

    async fn finalized_relay_header(&self) -> Result<([u8; 32], Header), Error> {
        let hash = self.timed(self.relay_chain.finalized_head()).await?;
        let header = self.relay_header(hash).await?;
        Ok((hash, header))
    }

    /// Reads the Grandpa authorities set in the state of the given relay chain block.
    async fn authority_set_at(&self, at: [u8; 32]) -> Result<AuthoritySet, Error> {
        let authorities = match self
            .timed(self.relay_chain.storage(storage::grandpa_authorities_key(), at))
            .await?
        {
            Some(value) => storage::decode_authorities(&value)?,
            None => {
                let value = self
                    .timed(self.relay_chain.storage(
                        storage::GRANDPA_AUTHORITIES_WELL_KNOWN_KEY.to_vec(),
                        at,
                    ))
                    .await?
                    .ok_or(Error::AuthoritySetNotFound)?;
                storage::decode_versioned_authorities(&value)?
            }
        };

        let set_id = self
            .timed(
                self.relay_chain
                    .storage(storage::grandpa_current_set_id_key(), at),
            )
            .await?
            .ok_or(Error::CurrentSetIdNotFound)?;

        Ok(AuthoritySet {
            set_id: storage::decode_set_id(&set_id)?,
            authorities,
        })
    }

    /// Reads the head of the given parachain in the state of the given relay chain block.
    async fn para_head_at(&self, relay_hash: [u8; 32], para_id: u32) -> Result<Header, Error> {
        let head_data = self
            .timed(
                self.relay_chain
                    .storage(storage::para_head_key(para_id), relay_hash),
            )
            .await?
            .ok_or(Error::ParachainHeaderNotFound)?;
        Ok(storage::decode_head_data(&head_data)?)
    }

    /// Reads the head of every parachain in the state of the given relay chain block.
    async fn para_heads_at(&self, relay_hash: [u8; 32]) -> Result<Vec<(u32, Header)>, Error> {
        let para_ids = self
            .timed(self.relay_chain.storage(storage::parachains_key(), relay_hash))
            .await?
            .ok_or(Error::ParachainSetNotFound)?;
        let para_ids = storage::decode_parachains(&para_ids)?;

        let mut heads = Vec::with_capacity(para_ids.len());
        for para_id in para_ids {
            heads.push((para_id, self.para_head_at(relay_hash, para_id).await?));
        }
        Ok(heads)
    }

    /// Builds the proof that the relay chain block at height `finalized` is finalized, for a
    /// light client that knows the block at height `previously_finalized`, or that only needs
    /// the header of `finalized` if `None`.
    async fn build_proof(
        &self,
        finalized: u32,
        previously_finalized: Option<u32>,
    ) -> Result<ParachainHeadersWithFinalityProof, Error> {
        if let Some(previously_finalized) = previously_finalized {
            if finalized <= previously_finalized {
                return Err(Error::InvalidRange {
                    finalized,
                    previously_finalized,
                });
            }
        }

        let (_, finalized_head) = self.finalized_relay_header().await?;
        if finalized > finalized_head.number {
            return Err(Error::NotYetFinalized {
                requested: finalized,
                finalized: finalized_head.number,
            });
        }

        let target_hash = self.relay_hash_at(finalized).await?;
        let block = self
            .timed(self.relay_chain.block(target_hash))
            .await?
            .ok_or(Error::UnknownBlock(target_hash))?;

        let Some(justification_bytes) = block
            .justification(&storage::GRANDPA_ENGINE_ID)
            .map(|j| j.to_vec())
        else {
            log::debug!(
                target: &*self.log_target,
                "No justification in block #{} ({})",
                finalized,
                HashDisplay(&target_hash)
            );
            return Err(Error::MissingJustification(finalized));
        };

        let justification = GrandpaJustification::decode(&justification_bytes)?;
        self.verify_justification(&justification, &block.header, target_hash)
            .await?;

        // Headers of the range `(previously_finalized, finalized]`, oldest first.
        let mut relay_blocks = Vec::new();
        if let Some(previously_finalized) = previously_finalized {
            for number in (previously_finalized + 1)..finalized {
                let hash = self.relay_hash_at(number).await?;
                relay_blocks.push((hash, self.relay_header(hash).await?));
            }
        }
        relay_blocks.push((target_hash, block.header));

        let finality_proof = FinalityProof {
            block: target_hash,
            justification: justification_bytes,
            unknown_headers: relay_blocks.iter().map(|(_, h)| h.clone()).collect(),
        };
        finality_proof.verify_unknown_headers()?;

        let mut parachain_headers = Vec::new();
        let mut last_heads = hashbrown::HashMap::<u32, [u8; 32], fnv::FnvBuildHasher>::default();
        for (relay_hash, relay_header) in &relay_blocks {
            let heads = self.para_heads_at(*relay_hash).await?;
            log::debug!(
                target: &*self.log_target,
                "Relay chain block #{} ({}) contains {} parachain heads",
                relay_header.number,
                HashDisplay(relay_hash),
                heads.len()
            );

            for (para_id, parachain_header) in heads {
                let head_hash = parachain_header.hash();
                if last_heads.insert(para_id, head_hash) == Some(head_hash) {
                    continue;
                }
                parachain_headers.push(ParachainHeaderWithRelayHash {
                    para_id,
                    parachain_header,
                    relay_hash: *relay_hash,
                });
            }
        }

        log::info!(
            target: &*self.log_target,
            "Built finality proof of relay chain block #{} ({}), round {}, with {} unknown \
            headers and {} parachain headers",
            finalized,
            HashDisplay(&target_hash),
            justification.round,
            finality_proof.unknown_headers.len(),
            parachain_headers.len()
        );

        Ok(ParachainHeadersWithFinalityProof {
            finality_proof,
            parachain_headers,
        })
    }

    /// Verifies the justification of the given block against the authorities set found in the
    /// state of its parent.
    async fn verify_justification(
        &self,
        justification: &GrandpaJustification,
        header: &Header,
        hash: [u8; 32],
    ) -> Result<(), Error> {
        let (target_hash, _) = justification.target();
        if target_hash != hash {
            return Err(Error::TargetMismatch {
                expected: hash,
                got: target_hash,
            });
        }

        // The justification of a block that enacts an authorities set change is signed by the
        // previous set.
        let state_block = if header.number == 0 {
            hash
        } else {
            header.parent_hash
        };
        let authority_set = self.authority_set_at(state_block).await?;

        let result = verify::verify_justification(verify::JustificationVerifyConfig {
            justification,
            authorities_set_id: authority_set.set_id,
            authorities: &authority_set.authorities,
            last_accepted: None,
            randomness_seed: rand::random(),
        });

        if let Err(err) = result {
            log::warn!(
                target: &*self.log_target,
                "Refused justification of block #{} ({}) in round {} of set {}: {}. The relay \
                chain might be misbehaving.",
                header.number,
                HashDisplay(&hash),
                justification.round,
                authority_set.set_id,
                err
            );
            return Err(Error::Justification(err));
        }

        Ok(())
    }

    fn grandpa_proof<'a>(
        &self,
        header: &'a IbcHeader,
    ) -> Result<&'a ParachainHeadersWithFinalityProof, Error> {
        match &header.payload {
            FinalityHeader::Grandpa(proof) => Ok(proof),
            other => Err(Error::TypeMismatch {
                expected: GadgetKind::Grandpa,
                got: other.kind(),
            }),
        }
    }
}

impl<R: ChainClient, P: ChainClient> FinalityGadget for Grandpa<R, P> {
    fn kind(&self) -> GadgetKind {
        GadgetKind::Grandpa
    }

    async fn query_latest_height(&self) -> Result<(u32, u32), Error> {
        let para_height = async {
            let hash = self.timed(self.parachain.finalized_head()).await?;
            let header = self
                .timed(self.parachain.header(hash))
                .await?
                .ok_or(Error::UnknownBlock(hash))?;
            Ok::<_, Error>(header.number)
        };
        let relay_height = async {
            let (_, header) = self.finalized_relay_header().await?;
            Ok::<_, Error>(header.number)
        };

        let (para_height, relay_height) =
            futures_lite::future::try_zip(para_height, relay_height).await?;
        log::debug!(
            target: &*self.log_target,
            "Latest heights: parachain #{}, relay chain #{}",
            para_height,
            relay_height
        );
        Ok((para_height, relay_height))
    }

    async fn query_header_at(&self, relay_height: u32) -> Result<FinalityHeader, Error> {
        log::debug!(target: &*self.log_target, "Querying header at #{}", relay_height);
        let proof = self.build_proof(relay_height, None).await?;
        Ok(FinalityHeader::Grandpa(proof))
    }

    async fn query_header_over_blocks(
        &self,
        finalized: u32,
        previously_finalized: u32,
    ) -> Result<FinalityHeader, Error> {
        log::debug!(
            target: &*self.log_target,
            "Querying header over blocks #{}..=#{}",
            previously_finalized,
            finalized
        );
        let proof = self
            .build_proof(finalized, Some(previously_finalized))
            .await?;
        Ok(FinalityHeader::Grandpa(proof))
    }

    fn ibc_header(&self, header: FinalityHeader) -> Result<IbcHeader, Error> {
        let proof = match header {
            FinalityHeader::Grandpa(proof) => proof,
            other => {
                return Err(Error::TypeMismatch {
                    expected: GadgetKind::Grandpa,
                    got: other.kind(),
                })
            }
        };

        let height = proof
            .headers_of(self.para_id)
            .map(|h| h.parachain_header.number)
            .max()
            .or_else(|| proof.latest_parachain_height())
            .or_else(|| proof.finality_proof.unknown_headers.last().map(|h| h.number))
            .unwrap_or(0);

        Ok(IbcHeader {
            height: u64::from(height),
            payload: FinalityHeader::Grandpa(proof),
        })
    }

    async fn client_state(&self, header: &IbcHeader) -> Result<ClientState, Error> {
        let proof = self.grandpa_proof(header)?;
        let authority_set = self.authority_set_at(proof.finality_proof.block).await?;
        let (latest_relay_hash, latest_relay_header) = self.finalized_relay_header().await?;
        let para_header = self.para_head_at(latest_relay_hash, self.para_id).await?;

        let client_state = ClientState {
            para_id: self.para_id,
            current_set_id: authority_set.set_id,
            current_authorities: authority_set.authorities,
            latest_relay_hash,
            latest_relay_height: latest_relay_header.number,
            latest_para_height: para_header.number,
            relay_chain: self.relay_chain_id,
        };
        client_state.validate()?;

        log::debug!(
            target: &*self.log_target,
            "Client state at relay chain block #{} ({}): set {} of {} authorities, parachain \
            block #{}",
            client_state.latest_relay_height,
            HashDisplay(&client_state.latest_relay_hash),
            client_state.current_set_id,
            client_state.current_authorities.len(),
            client_state.latest_para_height
        );

        Ok(client_state)
    }

    async fn consensus_state(&self, header: &IbcHeader) -> Result<ConsensusState, Error> {
        let proof = self.grandpa_proof(header)?;
        let para_header = proof
            .headers_of(self.para_id)
            .max_by_key(|h| h.parachain_header.number)
            .ok_or(Error::ParachainHeaderNotFound)?;

        let hash = para_header.parachain_header.hash();
        let block = self
            .timed(self.parachain.block(hash))
            .await?
            .ok_or(Error::UnknownBlock(hash))?;

        let consensus_state = ConsensusState::from_parachain_block(
            &block.header,
            &block.extrinsics[..],
            self.timestamp_call,
        )?;
        log::debug!(
            target: &*self.log_target,
            "Consensus state of parachain block #{} ({}): timestamp {} ms",
            block.header.number,
            HashDisplay(&hash),
            consensus_state.timestamp_ms
        );
        Ok(consensus_state)
    }
}
