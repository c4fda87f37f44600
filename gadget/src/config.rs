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

//! Configuration of a [`Grandpa`](crate::Grandpa) gadget.

use core::time::Duration;
use relay_finality::{client_state::RelayChain, consensus_state::TimestampCall};

/// Configuration of a [`Grandpa`](crate::Grandpa) gadget.
///
/// Can be deserialized from JSON, for example:
///
/// ```
/// # use relay_finality_gadget::GrandpaConfig;
/// let config = GrandpaConfig::from_json(r#"{
///     "para_id": 2000,
///     "relay_chain": "polkadot",
///     "request_timeout_ms": 30000,
///     "timestamp_call": { "pallet_index": 3, "call_index": 0 }
/// }"#).unwrap();
/// assert_eq!(config.para_id, 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrandpaConfig {
    /// Identifier of the parachain within the relay chain.
    pub para_id: u32,

    /// Relay chain the parachain is connected to.
    pub relay_chain: RelayChain,

    /// Maximum duration of a single query to a chain, in milliseconds. No limit if `None`.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Position of the timestamp inherent in the runtime of the parachain.
    #[serde(default)]
    pub timestamp_call: TimestampCall,

    /// Target of the logs of the gadget. Defaults to `grandpa-<relay chain>-<para id>`.
    #[serde(default)]
    pub log_target: Option<String>,
}

impl GrandpaConfig {
    /// Builds a configuration with the default values for the optional fields.
    pub fn new(para_id: u32, relay_chain: RelayChain) -> Self {
        GrandpaConfig {
            para_id,
            relay_chain,
            request_timeout_ms: None,
            timestamp_call: TimestampCall::default(),
            log_target: None,
        }
    }

    /// Parses a JSON-encoded configuration.
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        serde_json::from_str(json).map_err(|err| crate::Error::Configuration(ConfigError(err)))
    }

    /// Returns the maximum duration of a query.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the target of the logs of the gadget.
    pub fn log_target(&self) -> String {
        match &self.log_target {
            Some(target) => target.clone(),
            None => format!("grandpa-{}-{}", self.relay_chain, self.para_id),
        }
    }
}

/// Error while parsing a [`GrandpaConfig`].
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Invalid configuration: {_0}")]
pub struct ConfigError(serde_json::Error);

#[cfg(test)]
mod tests {
    use super::GrandpaConfig;
    use crate::ErrorKind;
    use core::time::Duration;
    use relay_finality::{client_state::RelayChain, consensus_state::TimestampCall};

    #[test]
    fn minimal() {
        let config =
            GrandpaConfig::from_json(r#"{"para_id": 2004, "relay_chain": "kusama"}"#).unwrap();
        assert_eq!(config, GrandpaConfig::new(2004, RelayChain::Kusama));
        assert_eq!(config.timestamp_call, TimestampCall::default());
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.log_target(), "grandpa-kusama-2004");
    }

    #[test]
    fn full() {
        let config = GrandpaConfig::from_json(
            r#"{
                "para_id": 1000,
                "relay_chain": "rococo",
                "request_timeout_ms": 1500,
                "timestamp_call": {"pallet_index": 3, "call_index": 1},
                "log_target": "statemint"
            }"#,
        )
        .unwrap();
        assert_eq!(config.relay_chain, RelayChain::Rococo);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(
            config.timestamp_call,
            TimestampCall {
                pallet_index: 3,
                call_index: 1
            }
        );
        assert_eq!(config.log_target(), "statemint");
    }

    #[test]
    fn unknown_relay_chain_refused() {
        for json in [
            r#"{"para_id": 1000, "relay_chain": "westend"}"#,
            r#"{"para_id": 1000, "relay_chain": 0}"#,
            r#"{"para_id": 1000}"#,
            r#"{"para_id": 1000, "relay_chain": "polkadot", "foo": 1}"#,
            "not json",
        ] {
            let err = GrandpaConfig::from_json(json).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert!(!err.is_retryable());
        }
    }
}
