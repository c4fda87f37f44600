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

//! Runtime metadata of the chains.
//!
//! The metadata describes the pallets and storage items of a runtime. A gadget fetches the
//! metadata of both of its chains when it is created and never updates it afterwards. If the
//! runtime of a chain is upgraded, the gadget must be created again.
//!
//! Since the metadata of a runtime can weigh several hundred kiBs, the metadata can be shared
//! between gadgets through a [`MetadataCache`].

use crate::{
    chain::{self, ChainClient},
    error::Error,
};

use core::time::Duration;
use parking_lot::RwLock;
use relay_finality::informant::HashDisplay;
use std::sync::Arc;

/// Magic number found at the start of the SCALE-encoded metadata.
pub const METADATA_MAGIC: [u8; 4] = *b"meta";

/// Metadata of a runtime, whose header has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    scale_encoded: Vec<u8>,
}

impl Metadata {
    /// Checks the magic number and the version of the given metadata.
    pub fn from_scale_encoded(scale_encoded: Vec<u8>) -> Result<Self, MetadataError> {
        if scale_encoded.len() < 5 {
            return Err(MetadataError::TooShort);
        }
        if scale_encoded[..4] != METADATA_MAGIC {
            return Err(MetadataError::BadMagic);
        }
        if !(14..=16).contains(&scale_encoded[4]) {
            return Err(MetadataError::UnsupportedVersion(scale_encoded[4]));
        }
        Ok(Metadata { scale_encoded })
    }

    /// Returns the version of the format of the metadata.
    pub fn version(&self) -> u8 {
        self.scale_encoded[4]
    }

    pub fn as_scale_encoded(&self) -> &[u8] {
        &self.scale_encoded
    }
}

/// Error potentially returned by [`Metadata::from_scale_encoded`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum MetadataError {
    #[display("Metadata is too short")]
    TooShort,
    #[display("Metadata doesn't start with the magic number")]
    BadMagic,
    #[display("Unsupported metadata version {_0}")]
    UnsupportedVersion(#[error(not(source))] u8),
}

/// Metadata of runtimes, indexed by genesis hash of the chain and specification version of the
/// runtime.
///
/// Inserting the same entry multiple times is harmless, as the metadata of a runtime never
/// changes.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<hashbrown::HashMap<([u8; 32], u32), Arc<Metadata>, fnv::FnvBuildHasher>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata of the given runtime, if known.
    pub fn get(&self, genesis_hash: &[u8; 32], spec_version: u32) -> Option<Arc<Metadata>> {
        self.entries
            .read()
            .get(&(*genesis_hash, spec_version))
            .cloned()
    }

    /// Inserts the metadata of a runtime, overwriting the existing entry if any.
    pub fn insert(&self, genesis_hash: [u8; 32], spec_version: u32, metadata: Arc<Metadata>) {
        self.entries
            .write()
            .insert((genesis_hash, spec_version), metadata);
    }

    /// Returns the number of runtimes in the cache.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns the metadata of the best block of the given chain, from the cache if possible.
pub async fn fetch(
    client: &impl ChainClient,
    cache: Option<&MetadataCache>,
    timeout: Option<Duration>,
    log_target: &str,
) -> Result<Arc<Metadata>, Error> {
    let genesis_hash = chain::with_timeout(timeout, client.block_hash(0))
        .await?
        .ok_or(Error::BlockNotFound(0))?;
    let spec_version = chain::with_timeout(timeout, client.runtime_spec_version(None)).await?;

    if let Some(metadata) = cache.and_then(|c| c.get(&genesis_hash, spec_version)) {
        log::debug!(
            target: log_target,
            "Metadata of genesis {} version {} found in cache",
            HashDisplay(&genesis_hash),
            spec_version
        );
        return Ok(metadata);
    }

    let scale_encoded = chain::with_timeout(timeout, client.metadata(None)).await?;
    let metadata = Arc::new(Metadata::from_scale_encoded(scale_encoded)?);
    log::debug!(
        target: log_target,
        "Downloaded metadata of genesis {} version {} (v{}, {} bytes)",
        HashDisplay(&genesis_hash),
        spec_version,
        metadata.version(),
        metadata.as_scale_encoded().len()
    );

    if let Some(cache) = cache {
        cache.insert(genesis_hash, spec_version, metadata.clone());
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::{Metadata, MetadataCache, MetadataError};
    use std::sync::Arc;

    #[test]
    fn header_checks() {
        let metadata = Metadata::from_scale_encoded(b"meta\x0e\x00".to_vec()).unwrap();
        assert_eq!(metadata.version(), 14);
        assert_eq!(
            Metadata::from_scale_encoded(b"meta".to_vec()),
            Err(MetadataError::TooShort)
        );
        assert_eq!(
            Metadata::from_scale_encoded(b"mota\x0e".to_vec()),
            Err(MetadataError::BadMagic)
        );
        assert_eq!(
            Metadata::from_scale_encoded(b"meta\x0c".to_vec()),
            Err(MetadataError::UnsupportedVersion(12))
        );
    }

    #[test]
    fn cache_last_write_wins() {
        let cache = MetadataCache::new();
        assert!(cache.get(&[1; 32], 5).is_none());

        let first = Arc::new(Metadata::from_scale_encoded(b"meta\x0e".to_vec()).unwrap());
        let second = Arc::new(Metadata::from_scale_encoded(b"meta\x0f".to_vec()).unwrap());
        cache.insert([1; 32], 5, first.clone());
        cache.insert([1; 32], 5, first.clone());
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.get(&[1; 32], 5).unwrap(), &first));

        cache.insert([1; 32], 5, second.clone());
        assert_eq!(cache.get(&[1; 32], 5).unwrap().version(), 15);
        assert!(cache.get(&[1; 32], 6).is_none());
        assert!(cache.get(&[2; 32], 5).is_none());
    }

    #[test]
    fn concurrent_access() {
        let cache = Arc::new(MetadataCache::new());
        let threads = (0..4u32)
            .map(|n| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for version in 0..50 {
                        let metadata = Metadata::from_scale_encoded(b"meta\x0e".to_vec()).unwrap();
                        cache.insert([0; 32], version, Arc::new(metadata));
                        assert!(cache.get(&[0; 32], version).is_some());
                    }
                    n
                })
            })
            .collect::<Vec<_>>();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(cache.len(), 50);
    }
}
