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
//! Build JSON-RPC requests and parse the responses sent back by a node.
//!
//! Requests built by this module always carry a numeric identifier. Responses are nonetheless
//! accepted with any identifier, so that a mismatch can be reported by the caller.

use serde::Deserialize as _;
use std::borrow::Cow;

/// Builds a JSON request.
///
/// `params` must be the list of parameters of the request.
///
/// # Example
///
/// ```
/// # use relay_finality_gadget::json_rpc::parse;
/// let request = parse::build_request(27, "chain_getBlockHash", vec![serde_json::json!(5)]);
/// # let _ = request;
/// ```
///
pub fn build_request(id: u64, method: &str, params: Vec<serde_json::Value>) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

/// Parses a JSON-encoded RPC response.
pub fn parse_response(response_json: &str) -> Result<Response, ParseError> {
    let envelope =
        serde_json::from_str::<Envelope>(response_json).map_err(ParseError::Json)?;
    if envelope.jsonrpc != "2.0" {
        return Err(ParseError::Version);
    }

    match (envelope.id, envelope.result, envelope.error) {
        (Some(id), Some(result), None) => Ok(Response::Success {
            id,
            result_json: result.get(),
        }),
        (Some(id), None, Some(error)) => Ok(Response::Error {
            id,
            error_code: error.code,
            error_message: error.message,
        }),
        // A node that can't parse a request doesn't know its identifier.
        (None, None, Some(error)) => Ok(Response::ParseError {
            error_code: error.code,
            error_message: error.message,
        }),
        _ => Err(ParseError::Malformed),
    }
}

/// Decoded JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<'a> {
    /// Successful request.
    Success {
        /// Identifier of the request the response corresponds to.
        id: Id<'a>,
        /// JSON-formatted result. Can be `null`.
        result_json: &'a str,
    },

    /// Request has failed.
    Error {
        /// Identifier of the request the response corresponds to.
        id: Id<'a>,
        /// Integer indicating the nature of the error, as defined by JSON-RPC 2.0.
        error_code: i64,
        error_message: Cow<'a, str>,
    },

    /// The node couldn't parse the request.
    ParseError {
        error_code: i64,
        error_message: Cow<'a, str>,
    },
}

/// Identifier of a request, as found in a response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(untagged)]
pub enum Id<'a> {
    Num(u64),
    Str(Cow<'a, str>),
}

/// Error while parsing a response.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParseError {
    /// Response isn't a valid JSON object of the expected shape.
    #[display("{_0}")]
    Json(serde_json::Error),
    /// The `jsonrpc` field isn't `"2.0"`.
    #[display("Unsupported JSON-RPC version")]
    Version,
    /// Response contains neither a result nor an error, or contains both.
    #[display("Response must contain exactly one of a result or an error")]
    Malformed,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope<'a> {
    #[serde(borrow)]
    jsonrpc: Cow<'a, str>,
    #[serde(default)]
    id: Option<Id<'a>>,
    #[serde(borrow, default, deserialize_with = "raw_including_null")]
    result: Option<&'a serde_json::value::RawValue>,
    #[serde(borrow, default)]
    error: Option<ErrorObject<'a>>,
}

// The `data` field is accepted but ignored.
#[derive(serde::Deserialize)]
struct ErrorObject<'a> {
    code: i64,
    #[serde(borrow)]
    message: Cow<'a, str>,
}

// `Option<&RawValue>` would turn a `null` result into `None`, while `null` is a legitimate
// result (for example a storage item that doesn't exist).
fn raw_including_null<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<&'de serde_json::value::RawValue>, D::Error> {
    <&'de serde_json::value::RawValue>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::{Id, ParseError, Response};

    #[test]
    fn success() {
        let response =
            super::parse_response(r#"{"jsonrpc":"2.0","id":5,"result":"0x1234"}"#).unwrap();
        assert_eq!(
            response,
            Response::Success {
                id: Id::Num(5),
                result_json: r#""0x1234""#,
            }
        );
    }

    #[test]
    fn null_result_is_success() {
        let response =
            super::parse_response(r#"{"jsonrpc":"2.0","id":"a","result":null}"#).unwrap();
        assert!(matches!(
            response,
            Response::Success { id: Id::Str(id), result_json: "null" } if id == "a"
        ));
    }

    #[test]
    fn error_response() {
        let response = super::parse_response(
            r#"{"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found", "data": 1}, "id": 1}"#,
        )
        .unwrap();

        let Response::Error {
            id,
            error_code,
            error_message,
        } = response
        else {
            panic!()
        };

        assert_eq!(id, Id::Num(1));
        assert_eq!(error_code, -32601);
        assert_eq!(error_message, "Method not found");
    }

    #[test]
    fn error_without_id() {
        let response = super::parse_response(
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#,
        )
        .unwrap();
        assert!(matches!(
            response,
            Response::ParseError {
                error_code: -32700,
                ..
            }
        ));
    }

    #[test]
    fn invalid_responses() {
        assert!(matches!(
            super::parse_response(r#"{"jsonrpc":"1.0","id":1,"result":5}"#),
            Err(ParseError::Version)
        ));
        assert!(matches!(
            super::parse_response(r#"{"jsonrpc":"2.0","id":1}"#),
            Err(ParseError::Malformed)
        ));
        assert!(matches!(
            super::parse_response(
                r#"{"jsonrpc":"2.0","id":1,"result":5,"error":{"code":1,"message":""}}"#
            ),
            Err(ParseError::Malformed)
        ));
        assert!(matches!(
            super::parse_response(r#"{"jsonrpc":"2.0","id":[1],"result":5}"#),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            super::parse_response(r#"{"jsonrpc":"2.0","id":1,"result":5,"foo":2}"#),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            super::parse_response("not json"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn build_request_shape() {
        let request = super::build_request(3, "state_getStorage", vec!["0x00".into()]);
        let value: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 3);
        assert_eq!(value["method"], "state_getStorage");
        assert_eq!(value["params"][0], "0x00");
    }
}
