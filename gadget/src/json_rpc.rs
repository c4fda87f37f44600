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

//! Implementation of [`ChainClient`] on top of the JSON-RPC interface of Substrate nodes.
//!
//! The [`JsonRpcClient`] turns each query into one request of the legacy JSON-RPC API
//! (`chain_*` and `state_*` functions), and sends it through an [`RpcTransport`]. Connecting to
//! the node, for example through a WebSocket, is the responsibility of the transport.

use crate::chain::{Block, ChainClient, QueryError};

use core::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};
use relay_finality::header::{DigestItem, Header};

pub mod parse;

/// Sends JSON-RPC requests to a node.
pub trait RpcTransport: Send + Sync {
    /// Sends the given JSON-RPC request and waits for the response.
    fn request(
        &self,
        request_json: String,
    ) -> impl Future<Output = Result<String, QueryError>> + Send;
}

/// Access to a chain through the JSON-RPC API of one of its nodes.
pub struct JsonRpcClient<T> {
    transport: T,
    next_request_id: AtomicU64,
}

impl<T: RpcTransport> JsonRpcClient<T> {
    /// Builds a new client that sends its requests through the given transport.
    pub fn new(transport: T) -> Self {
        JsonRpcClient {
            transport,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Returns the transport passed at initialization.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn request<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<R, QueryError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let response_json = self
            .transport
            .request(parse::build_request(request_id, method, params))
            .await?;

        let response = parse::parse_response(&response_json)
            .map_err(|err| QueryError::InvalidResponse(err.to_string()))?;

        let result_json = match response {
            parse::Response::Success {
                id: parse::Id::Num(id),
                result_json,
            } if id == request_id => result_json,
            parse::Response::Success { .. } => {
                return Err(QueryError::InvalidResponse(
                    "response doesn't match the request".into(),
                ))
            }
            parse::Response::Error {
                error_code,
                error_message,
                ..
            }
            | parse::Response::ParseError {
                error_code,
                error_message,
            } => {
                return Err(QueryError::Rpc {
                    code: error_code,
                    message: error_message.into_owned(),
                })
            }
        };

        serde_json::from_str(result_json).map_err(|err| {
            QueryError::InvalidResponse(format!("{method} returned unexpected data: {err}"))
        })
    }
}

impl<T: RpcTransport> ChainClient for JsonRpcClient<T> {
    async fn finalized_head(&self) -> Result<[u8; 32], QueryError> {
        let hash: HashHexString = self.request("chain_getFinalizedHead", Vec::new()).await?;
        Ok(hash.0)
    }

    async fn block_hash(&self, number: u32) -> Result<Option<[u8; 32]>, QueryError> {
        let hash: Option<HashHexString> = self
            .request("chain_getBlockHash", vec![number.into()])
            .await?;
        Ok(hash.map(|h| h.0))
    }

    async fn header(&self, hash: [u8; 32]) -> Result<Option<Header>, QueryError> {
        let header: Option<RpcHeader> = self
            .request("chain_getHeader", vec![hex_param(&hash)])
            .await?;
        header.map(RpcHeader::into_header).transpose()
    }

    async fn block(&self, hash: [u8; 32]) -> Result<Option<Block>, QueryError> {
        let Some(signed_block) = self
            .request::<Option<RpcSignedBlock>>("chain_getBlock", vec![hex_param(&hash)])
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(Block {
            header: signed_block.block.header.into_header()?,
            extrinsics: signed_block
                .block
                .extrinsics
                .into_iter()
                .map(|e| e.0)
                .collect(),
            justifications: signed_block
                .justifications
                .unwrap_or_default()
                .into_iter()
                .map(|(engine_id, justification)| (engine_id, justification.0))
                .collect(),
        }))
    }

    async fn storage(&self, key: Vec<u8>, at: [u8; 32]) -> Result<Option<Vec<u8>>, QueryError> {
        let value: Option<HexString> = self
            .request("state_getStorage", vec![hex_param(&key), hex_param(&at)])
            .await?;
        Ok(value.map(|v| v.0))
    }

    async fn metadata(&self, at: Option<[u8; 32]>) -> Result<Vec<u8>, QueryError> {
        let metadata: HexString = self
            .request("state_getMetadata", at_param(at.as_ref()))
            .await?;
        Ok(metadata.0)
    }

    async fn runtime_spec_version(&self, at: Option<[u8; 32]>) -> Result<u32, QueryError> {
        let version: RuntimeVersion = self
            .request("state_getRuntimeVersion", at_param(at.as_ref()))
            .await?;
        Ok(version.spec_version)
    }
}

fn hex_param(bytes: &[u8]) -> serde_json::Value {
    serde_json::Value::String(format!("0x{}", hex::encode(bytes)))
}

fn at_param(at: Option<&[u8; 32]>) -> Vec<serde_json::Value> {
    at.map(|hash| hex_param(hash)).into_iter().collect()
}

/// Bytes encoded as a `0x`-prefixed hexadecimal string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HexString(Vec<u8>);

impl<'a> serde::Deserialize<'a> for HexString {
    fn deserialize<D>(deserializer: D) -> Result<HexString, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let string = String::deserialize(deserializer)?;

        let Some(hex) = string.strip_prefix("0x") else {
            return Err(serde::de::Error::custom(
                "hexadecimal string doesn't start with 0x",
            ));
        };

        let bytes = hex::decode(hex).map_err(serde::de::Error::custom)?;
        Ok(HexString(bytes))
    }
}

/// Same as [`HexString`], but must be 32 bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HashHexString([u8; 32]);

impl<'a> serde::Deserialize<'a> for HashHexString {
    fn deserialize<D>(deserializer: D) -> Result<HashHexString, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let HexString(bytes) = HexString::deserialize(deserializer)?;
        <[u8; 32]>::try_from(bytes)
            .map(HashHexString)
            .map_err(|_| serde::de::Error::custom("invalid hash length"))
    }
}

/// Block number encoded as a `0x`-prefixed hexadecimal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HexNumber(u32);

impl<'a> serde::Deserialize<'a> for HexNumber {
    fn deserialize<D>(deserializer: D) -> Result<HexNumber, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let string = String::deserialize(deserializer)?;
        let Some(hex) = string.strip_prefix("0x") else {
            return Err(serde::de::Error::custom("number doesn't start with 0x"));
        };
        u32::from_str_radix(hex, 16)
            .map(HexNumber)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcHeader {
    parent_hash: HashHexString,
    number: HexNumber,
    state_root: HashHexString,
    extrinsics_root: HashHexString,
    digest: RpcDigest,
}

#[derive(Debug, serde::Deserialize)]
struct RpcDigest {
    logs: Vec<HexString>,
}

impl RpcHeader {
    fn into_header(self) -> Result<Header, QueryError> {
        let digest = self
            .digest
            .logs
            .iter()
            .map(|log| DigestItem::decode(&log.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| QueryError::InvalidResponse(format!("invalid digest log: {err}")))?;

        Ok(Header {
            parent_hash: self.parent_hash.0,
            number: self.number.0,
            state_root: self.state_root.0,
            extrinsics_root: self.extrinsics_root.0,
            digest,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct RpcSignedBlock {
    block: RpcBlock,
    justifications: Option<Vec<([u8; 4], HexString)>>,
}

#[derive(Debug, serde::Deserialize)]
struct RpcBlock {
    header: RpcHeader,
    extrinsics: Vec<HexString>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeVersion {
    spec_version: u32,
}

#[cfg(test)]
mod tests {
    use super::{JsonRpcClient, RpcTransport};
    use crate::chain::{ChainClient as _, QueryError};

    use core::future::Future;
    use parking_lot::Mutex;
    use relay_finality::header::{DigestItem, Header};

    /// Answers every request with the next canned result, and records the requests.
    struct CannedTransport {
        results: Mutex<Vec<String>>,
        requests: Mutex<Vec<serde_json::Value>>,
    }

    impl CannedTransport {
        fn new(results: &[&str]) -> Self {
            CannedTransport {
                results: Mutex::new(results.iter().rev().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl RpcTransport for CannedTransport {
        fn request(
            &self,
            request_json: String,
        ) -> impl Future<Output = Result<String, QueryError>> + Send {
            let request: serde_json::Value = serde_json::from_str(&request_json).unwrap();
            let id = request["id"].clone();
            self.requests.lock().push(request);
            let result = self.results.lock().pop().unwrap();
            async move {
                if result.starts_with("error:") {
                    return Ok(format!(
                        r#"{{"jsonrpc":"2.0","id":{id},"error":{{"code":-32000,"message":"{}"}}}}"#,
                        &result[6..]
                    ));
                }
                Ok(format!(r#"{{"jsonrpc":"2.0","id":{id},"result":{result}}}"#))
            }
        }
    }

    fn hash_json(byte: u8) -> String {
        format!("\"0x{}\"", hex::encode([byte; 32]))
    }

    #[test]
    fn finalized_head_and_block_hash() {
        let client = JsonRpcClient::new(CannedTransport::new(&[&hash_json(7), "null"]));
        smol::block_on(async {
            assert_eq!(client.finalized_head().await.unwrap(), [7; 32]);
            assert_eq!(client.block_hash(12).await.unwrap(), None);
        });

        let requests = client.transport().requests.lock();
        assert_eq!(requests[0]["method"], "chain_getFinalizedHead");
        assert_eq!(requests[1]["method"], "chain_getBlockHash");
        assert_eq!(requests[1]["params"][0], 12);
        assert_ne!(requests[0]["id"], requests[1]["id"]);
    }

    #[test]
    fn header_and_block() {
        let digest_item = DigestItem::Consensus(*b"FRNK", vec![1, 2, 3]);
        let mut encoded_item = Vec::new();
        digest_item.encode_into(&mut encoded_item);

        let header_json = format!(
            r#"{{"parentHash":{},"number":"0x1f4","stateRoot":{},"extrinsicsRoot":{},"digest":{{"logs":["0x{}"]}}}}"#,
            hash_json(1),
            hash_json(2),
            hash_json(3),
            hex::encode(&encoded_item)
        );
        let block_json = format!(
            r#"{{"block":{{"header":{header_json},"extrinsics":["0x0102"]}},"justifications":[[[70,82,78,75],"0xaabb"]]}}"#
        );

        let client = JsonRpcClient::new(CannedTransport::new(&[&header_json, &block_json]));
        let expected_header = Header {
            parent_hash: [1; 32],
            number: 500,
            state_root: [2; 32],
            extrinsics_root: [3; 32],
            digest: vec![digest_item],
        };

        smol::block_on(async {
            assert_eq!(
                client.header([9; 32]).await.unwrap(),
                Some(expected_header.clone())
            );

            let block = client.block([9; 32]).await.unwrap().unwrap();
            assert_eq!(block.header, expected_header);
            assert_eq!(block.extrinsics, vec![vec![1, 2]]);
            assert_eq!(block.justification(b"FRNK"), Some(&[0xaa, 0xbb][..]));
        });

        let requests = client.transport().requests.lock();
        assert_eq!(
            requests[0]["params"][0],
            format!("0x{}", hex::encode([9; 32]))
        );
    }

    #[test]
    fn storage_and_runtime() {
        let client = JsonRpcClient::new(CannedTransport::new(&[
            "\"0x2a00000000000000\"",
            "null",
            r#"{"specName":"rococo","specVersion":1002000,"apis":[]}"#,
            "\"0x6d6574610e00\"",
        ]));

        smol::block_on(async {
            assert_eq!(
                client.storage(vec![0xab], [4; 32]).await.unwrap(),
                Some(vec![42, 0, 0, 0, 0, 0, 0, 0])
            );
            assert_eq!(client.storage(vec![0xcd], [4; 32]).await.unwrap(), None);
            assert_eq!(client.runtime_spec_version(None).await.unwrap(), 1002000);
            assert_eq!(
                client.metadata(Some([5; 32])).await.unwrap(),
                b"meta\x0e\x00".to_vec()
            );
        });

        let requests = client.transport().requests.lock();
        assert_eq!(requests[0]["params"][0], "0xab");
        assert_eq!(requests[2]["params"].as_array().unwrap().len(), 0);
        assert_eq!(requests[3]["params"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn errors() {
        let client = JsonRpcClient::new(CannedTransport::new(&[
            "error:state already discarded",
            "\"1234\"",
            "\"0x1234\"",
        ]));

        smol::block_on(async {
            assert_eq!(
                client.finalized_head().await,
                Err(QueryError::Rpc {
                    code: -32000,
                    message: "state already discarded".into()
                })
            );
            assert!(matches!(
                client.finalized_head().await,
                Err(QueryError::InvalidResponse(_))
            ));
            // Hash of the wrong length.
            assert!(matches!(
                client.finalized_head().await,
                Err(QueryError::InvalidResponse(_))
            ));
        });
    }
}
