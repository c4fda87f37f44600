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

//! Helpers to print information about blocks in logs.

use core::fmt;

/// Implements `fmt::Display` for a hash, printed as `0x` followed by its hexadecimal
/// representation.
pub struct HashDisplay<'a>(pub &'a [u8]);

impl<'a> fmt::Display for HashDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", *byte)?;
        }
        Ok(())
    }
}

impl<'a> fmt::Debug for HashDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::HashDisplay;

    #[test]
    fn hash_display() {
        assert_eq!(HashDisplay(&[0x12, 0xab, 0x00]).to_string(), "0x12ab00");
        assert_eq!(format!("{:?}", HashDisplay(&[])), "0x");
    }
}
