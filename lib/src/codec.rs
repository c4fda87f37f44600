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

//! Errors of the SCALE decoders of this crate.
//!
//! All the data structures of this crate are encoded with the SCALE codec: integers of fixed
//! width are little endian, arrays are concatenated as-is, and lists are prefixed with their
//! length in the SCALE-compact encoding.
//!
//! Each data structure provides a `decode` function that requires the input to be fully
//! consumed, and a `decode_partial` function that returns the bytes that follow the data
//! structure.

/// Error potentially returned when decoding a SCALE-encoded data structure.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Failed to decode {context}: {kind}")]
pub struct DecodeError {
    /// Name of the field or data structure that couldn't be decoded.
    pub context: &'static str,
    /// What went wrong.
    pub kind: DecodeErrorKind,
}

/// See [`DecodeError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum DecodeErrorKind {
    /// The input ends before the data structure is complete.
    #[display("Unexpected end of input")]
    UnexpectedEof,
    /// A SCALE-compact integer isn't in its canonical form.
    #[display("Invalid compact integer")]
    InvalidCompact,
    /// A numeric value is too large for the type it is decoded into.
    #[display("Number overflow")]
    NumberOverflow,
    /// An enum discriminant isn't recognized.
    #[display("Invalid discriminant {_0}")]
    InvalidDiscriminant(#[error(not(source))] u8),
    /// The data structure is followed by this number of unexpected bytes.
    #[display("{_0} bytes of trailing data")]
    TrailingData(#[error(not(source))] usize),
    /// The value has a valid encoding but breaks a rule of the data structure.
    #[display("Malformed value")]
    Malformed,
}

/// Error type of the `nom` parsers of this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub(crate) context: Option<&'static str>,
    pub(crate) kind: DecodeErrorKind,
}

impl ParseError {
    /// Builds a non-recoverable `nom` error of the given kind.
    pub(crate) fn failure(kind: DecodeErrorKind) -> nom::Err<ParseError> {
        nom::Err::Failure(ParseError {
            context: None,
            kind,
        })
    }
}

impl<'a> nom::error::ParseError<&'a [u8]> for ParseError {
    fn from_error_kind(_: &'a [u8], kind: nom::error::ErrorKind) -> Self {
        ParseError {
            context: None,
            kind: match kind {
                nom::error::ErrorKind::Eof | nom::error::ErrorKind::Complete => {
                    DecodeErrorKind::UnexpectedEof
                }
                _ => DecodeErrorKind::Malformed,
            },
        }
    }

    fn append(_: &'a [u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

pub(crate) type IResult<'a, T> = nom::IResult<&'a [u8], T, ParseError>;

/// Wraps around a parser and attaches `name` to the errors it returns, unless a more precise
/// name has already been attached by an inner parser.
pub(crate) fn context<'a, T>(
    name: &'static str,
    mut inner: impl FnMut(&'a [u8]) -> IResult<'a, T>,
) -> impl FnMut(&'a [u8]) -> IResult<'a, T> {
    move |bytes| {
        inner(bytes).map_err(|err| {
            err.map(|mut err| {
                err.context.get_or_insert(name);
                err
            })
        })
    }
}

/// Runs the given parser and makes sure that the input has been entirely consumed.
pub(crate) fn decode_all<'a, T>(
    scale_encoded: &'a [u8],
    name: &'static str,
    parser: impl FnMut(&'a [u8]) -> IResult<'a, T>,
) -> Result<T, DecodeError> {
    let (value, remainder) = decode_partial(scale_encoded, name, parser)?;
    if !remainder.is_empty() {
        return Err(DecodeError {
            context: name,
            kind: DecodeErrorKind::TrailingData(remainder.len()),
        });
    }
    Ok(value)
}

/// Runs the given parser and returns the value and the bytes that follow it.
pub(crate) fn decode_partial<'a, T>(
    scale_encoded: &'a [u8],
    name: &'static str,
    mut parser: impl FnMut(&'a [u8]) -> IResult<'a, T>,
) -> Result<(T, &'a [u8]), DecodeError> {
    match parser(scale_encoded) {
        Ok((remainder, value)) => Ok((value, remainder)),
        Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(DecodeError {
            context: err.context.unwrap_or(name),
            kind: err.kind,
        }),
        Err(nom::Err::Incomplete(_)) => Err(DecodeError {
            context: name,
            kind: DecodeErrorKind::UnexpectedEof,
        }),
    }
}
