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

//! Internal helpers shared by the SCALE encoders and decoders of this crate.

use crate::codec::{DecodeErrorKind, IResult, ParseError};

use alloc::vec::Vec;

/// Returns a buffer containing the SCALE-compact encoding of the parameter.
pub(crate) fn encode_scale_compact_u64(mut value: u64) -> arrayvec::ArrayVec<u8, 9> {
    let mut array = arrayvec::ArrayVec::new();

    if value < 64 {
        array.push(u8::try_from(value << 2).unwrap_or(0));
    } else if value < (1 << 14) {
        let value = u16::try_from(value << 2).unwrap_or(0) | 0b01;
        array.extend(value.to_le_bytes());
    } else if value < (1 << 30) {
        let value = u32::try_from(value << 2).unwrap_or(0) | 0b10;
        array.extend(value.to_le_bytes());
    } else {
        let mut num_bytes = 0u8;
        array.push(0);
        while value != 0 {
            array.push(u8::try_from(value & 0xff).unwrap_or(0));
            value >>= 8;
            num_bytes += 1;
        }
        array[0] = ((num_bytes - 4) << 2) | 0b11;
    }

    array
}

/// Returns a buffer containing the SCALE-compact encoding of the parameter.
pub(crate) fn encode_scale_compact_usize(value: usize) -> arrayvec::ArrayVec<u8, 9> {
    encode_scale_compact_u64(u64::try_from(value).unwrap_or(u64::MAX))
}

/// Appends to `out` a SCALE-encoded list of bytes: the compact length then the bytes themselves.
pub(crate) fn encode_scale_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(encode_scale_compact_usize(bytes.len()).as_ref());
    out.extend_from_slice(bytes);
}

/// Decodes a SCALE-compact-encoded integer.
///
/// Encodings that aren't the shortest possible representation of the value are refused.
pub(crate) fn nom_scale_compact_u64(bytes: &[u8]) -> IResult<u64> {
    let (rest, first) = nom::number::complete::u8(bytes)?;

    match first & 0b11 {
        0b00 => Ok((rest, u64::from(first >> 2))),
        0b01 => {
            let (rest, second) = nom::number::complete::u8(rest)?;
            let value = u64::from(u16::from_le_bytes([first, second]) >> 2);
            if value < (1 << 6) {
                return Err(ParseError::failure(DecodeErrorKind::InvalidCompact));
            }
            Ok((rest, value))
        }
        0b10 => {
            let (rest, others) = nom::bytes::complete::take(3u32)(rest)?;
            let value = u64::from(
                u32::from_le_bytes([first, others[0], others[1], others[2]]) >> 2,
            );
            if value < (1 << 14) {
                return Err(ParseError::failure(DecodeErrorKind::InvalidCompact));
            }
            Ok((rest, value))
        }
        _ => {
            let num_bytes = usize::from(first >> 2) + 4;
            if num_bytes > 8 {
                return Err(ParseError::failure(DecodeErrorKind::NumberOverflow));
            }

            let (rest, value_bytes) = nom::bytes::complete::take(num_bytes)(rest)?;
            // The most significant byte being zero means that the encoding could have been
            // shorter.
            if value_bytes.last() == Some(&0) {
                return Err(ParseError::failure(DecodeErrorKind::InvalidCompact));
            }

            let mut buffer = [0u8; 8];
            buffer[..num_bytes].copy_from_slice(value_bytes);
            let value = u64::from_le_bytes(buffer);
            if value < (1 << 30) {
                return Err(ParseError::failure(DecodeErrorKind::InvalidCompact));
            }
            Ok((rest, value))
        }
    }
}

/// Decodes a SCALE-compact-encoded integer that must fit in a `u32`.
pub(crate) fn nom_scale_compact_u32(bytes: &[u8]) -> IResult<u32> {
    let (rest, value) = nom_scale_compact_u64(bytes)?;
    match u32::try_from(value) {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(ParseError::failure(DecodeErrorKind::NumberOverflow)),
    }
}

/// Decodes a SCALE-compact-encoded length.
pub(crate) fn nom_scale_compact_usize(bytes: &[u8]) -> IResult<usize> {
    let (rest, value) = nom_scale_compact_u64(bytes)?;
    match usize::try_from(value) {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(ParseError::failure(DecodeErrorKind::NumberOverflow)),
    }
}

/// Decodes a SCALE-encoded list of bytes.
pub(crate) fn nom_scale_bytes(bytes: &[u8]) -> IResult<&[u8]> {
    let (rest, len) = nom_scale_compact_usize(bytes)?;
    nom::bytes::complete::take(len)(rest)
}

/// Decodes a fixed-size array of bytes.
pub(crate) fn nom_array<const N: usize>(bytes: &[u8]) -> IResult<[u8; N]> {
    let (rest, slice) = nom::bytes::complete::take(N)(bytes)?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok((rest, out))
}

/// Builds a parser of a SCALE-encoded list whose items are decoded by `item`.
pub(crate) fn nom_scale_vec<'a, T>(
    mut item: impl FnMut(&'a [u8]) -> IResult<'a, T>,
) -> impl FnMut(&'a [u8]) -> IResult<'a, Vec<T>> {
    move |bytes| {
        let (rest, num_elems) = nom_scale_compact_usize(bytes)?;
        nom::Parser::parse(
            &mut nom::multi::many_m_n(num_elems, num_elems, &mut item),
            rest,
        )
    }
}

/// Implementation of the `BuildHasher` trait for the sip hasher.
///
/// Contrary to the one in the standard library, a seed is explicitly passed here, making the
/// hashing predictable. This is a good thing for tests and no-std compatibility.
pub(crate) struct SipHasherBuild([u8; 16]);

impl SipHasherBuild {
    pub(crate) fn new(seed: [u8; 16]) -> SipHasherBuild {
        SipHasherBuild(seed)
    }
}

impl core::hash::BuildHasher for SipHasherBuild {
    type Hasher = siphasher::sip::SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        siphasher::sip::SipHasher::new_with_key(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::DecodeErrorKind;

    fn compact(bytes: &[u8]) -> Result<u64, DecodeErrorKind> {
        match super::nom_scale_compact_u64(bytes) {
            Ok((rest, value)) => {
                assert!(rest.is_empty());
                Ok(value)
            }
            Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(err.kind),
            Err(nom::Err::Incomplete(_)) => unreachable!(),
        }
    }

    #[test]
    fn compact_encode_matches_known_values() {
        assert_eq!(&super::encode_scale_compact_u64(0)[..], &[0x00]);
        assert_eq!(&super::encode_scale_compact_u64(1)[..], &[0x04]);
        assert_eq!(&super::encode_scale_compact_u64(42)[..], &[0xa8]);
        assert_eq!(&super::encode_scale_compact_u64(69)[..], &[0x15, 0x01]);
        assert_eq!(
            &super::encode_scale_compact_u64(65535)[..],
            &[0xfe, 0xff, 0x03, 0x00]
        );
        assert_eq!(
            &super::encode_scale_compact_u64(1 << 30)[..],
            &[0x03, 0x00, 0x00, 0x00, 0x40]
        );
        assert_eq!(
            &super::encode_scale_compact_u64(u64::MAX)[..],
            &[0x13, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn compact_decode_all_modes() {
        for value in [0, 63, 64, 16383, 16384, (1 << 30) - 1, 1 << 30, u64::MAX] {
            let encoded = super::encode_scale_compact_u64(value);
            assert_eq!(compact(&encoded), Ok(value));
        }
    }

    #[test]
    fn compact_non_canonical_refused() {
        // `1` encoded in two bytes.
        assert_eq!(compact(&[0x05, 0x00]), Err(DecodeErrorKind::InvalidCompact));
        // `1` encoded in four bytes.
        assert_eq!(
            compact(&[0x06, 0x00, 0x00, 0x00]),
            Err(DecodeErrorKind::InvalidCompact)
        );
        // Big integer mode with a trailing zero byte.
        assert_eq!(
            compact(&[0x07, 0x00, 0x00, 0x00, 0x40, 0x00]),
            Err(DecodeErrorKind::InvalidCompact)
        );
    }

    #[test]
    fn compact_overflow_refused() {
        let mut encoded = vec![0x17];
        encoded.extend_from_slice(&[0xff; 10]);
        assert_eq!(compact(&encoded), Err(DecodeErrorKind::NumberOverflow));

        let encoded = super::encode_scale_compact_u64(u64::from(u32::MAX) + 1);
        assert!(matches!(
            super::nom_scale_compact_u32(&encoded),
            Err(nom::Err::Failure(err)) if err.kind == DecodeErrorKind::NumberOverflow
        ));
    }

    #[test]
    fn compact_truncated() {
        assert_eq!(compact(&[]), Err(DecodeErrorKind::UnexpectedEof));
        assert_eq!(compact(&[0x01]), Err(DecodeErrorKind::UnexpectedEof));
        assert_eq!(compact(&[0x02, 0x00]), Err(DecodeErrorKind::UnexpectedEof));
    }
}
