// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A read-only, endianness-aware cursor over an in-memory byte buffer.
//!
//! [`BinaryView`] is the one place in this crate that turns "read N bytes at
//! offset O" into a checked operation. Every higher-level parser (the Mach-O
//! header, load commands, segments, the fat-arch table) goes through it so
//! that running off the end of the buffer always surfaces as
//! [`SigningError::TruncatedInput`] rather than a panic.

use crate::error::{SigningError, SigningResult};
use scroll::{Pread, BE, LE};

/// Byte order of the slice under view, chosen once at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    fn scroll(self) -> scroll::Endian {
        match self {
            Endian::Little => LE,
            Endian::Big => BE,
        }
    }
}

/// A checked, non-owning view over a byte slice.
pub struct BinaryView<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> BinaryView<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        BinaryView { data, endian }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Peek the raw 32-bit magic at the front of the buffer without
    /// committing to an endianness (magic values are self-describing).
    pub fn peek_magic(&self) -> SigningResult<u32> {
        self.require(0, 4, "magic")?;
        Ok(u32::from_be_bytes([
            self.data[0],
            self.data[1],
            self.data[2],
            self.data[3],
        ]))
    }

    pub fn read_u8(&self, offset: usize) -> SigningResult<u8> {
        self.require(offset, 1, "u8")?;
        Ok(self.data[offset])
    }

    pub fn read_u16(&self, offset: usize) -> SigningResult<u16> {
        self.require(offset, 2, "u16")?;
        self.data
            .pread_with::<u16>(offset, self.endian.scroll())
            .map_err(|_| SigningError::truncated("u16"))
    }

    pub fn read_u32(&self, offset: usize) -> SigningResult<u32> {
        self.require(offset, 4, "u32")?;
        self.data
            .pread_with::<u32>(offset, self.endian.scroll())
            .map_err(|_| SigningError::truncated("u32"))
    }

    pub fn read_u64(&self, offset: usize) -> SigningResult<u64> {
        self.require(offset, 8, "u64")?;
        self.data
            .pread_with::<u64>(offset, self.endian.scroll())
            .map_err(|_| SigningError::truncated("u64"))
    }

    /// Reads a big-endian u32, regardless of the view's chosen endianness.
    /// Used for fat headers and code-signature blobs, which are always
    /// network byte order irrespective of the contained slice's Mach-O
    /// byte order.
    pub fn read_u32_be(&self, offset: usize) -> SigningResult<u32> {
        self.require(offset, 4, "u32 (big-endian)")?;
        self.data
            .pread_with::<u32>(offset, BE)
            .map_err(|_| SigningError::truncated("u32 (big-endian)"))
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> SigningResult<&'a [u8]> {
        self.require(offset, len, "fixed bytes")?;
        Ok(&self.data[offset..offset + len])
    }

    pub fn read_fixed_16(&self, offset: usize) -> SigningResult<[u8; 16]> {
        let bytes = self.read_bytes(offset, 16)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn require(&self, offset: usize, len: usize, context: &str) -> SigningResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(SigningError::truncated(context)),
        }
    }
}

/// Magic-sniffs `data` to determine the byte order a Mach-O parser should
/// use. `peek_magic` always reads big-endian, so a little-endian file's
/// magic comes back byte-swapped — i.e. as a CIGAM constant, not a MAGIC
/// one. Per §4.1, endianness is chosen once, at header-parse time, from the
/// 32-bit magic: CIGAM means "swapped from big-endian" (the file is little-
/// endian); MAGIC means the BE read already matched (the file is big-endian).
pub fn endian_for_magic(magic: u32) -> Endian {
    match magic {
        0xcefaedfe | 0xcffaedfe => Endian::Little,
        _ => Endian::Big,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_read_is_an_error() {
        let data = [0u8, 1, 2, 3];
        let view = BinaryView::new(&data, Endian::Little);
        assert!(view.read_u32(1).is_err());
        assert!(view.read_u32(0).is_ok());
    }

    #[test]
    fn big_endian_read_matches_network_order() {
        let data = [0xfa, 0xde, 0x0c, 0x02];
        let view = BinaryView::new(&data, Endian::Little);
        assert_eq!(view.read_u32_be(0).unwrap(), 0xfade0c02);
    }

    #[test]
    fn endian_selection_follows_magic() {
        assert_eq!(endian_for_magic(0xcffaedfe), Endian::Little);
        assert_eq!(endian_for_magic(0xfeedfacf), Endian::Big);
    }
}
