// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detection and slice selection for fat (universal) Mach-O containers.
//!
//! Per §4.2, a fat file does not get re-assembled after signing: the core
//! narrows to one architecture slice and the caller is responsible for
//! reassembling a universal binary, if it wants one, from the signed slices.

use crate::binary_view::{BinaryView, Endian};
use crate::error::{SigningError, SigningResult};
use crate::macho::constants::*;

/// One architecture entry read from a fat header, before slicing.
struct FatArch {
    cputype: u32,
    offset: u64,
    size: u64,
}

/// Selects the architecture slice to operate on from `data`.
///
/// If `data` does not begin with a fat magic, it is assumed to already be a
/// single-architecture Mach-O and is returned unchanged. Otherwise the
/// arch-entry table is read and one slice is chosen by the fixed preference
/// order from §4.2: ARM64, then x86-64, then the first structurally valid
/// entry. Fails with [`SigningError::NoSuitableArch`] if the table is empty
/// or every entry is out of bounds.
pub fn select_slice(data: &[u8]) -> SigningResult<&[u8]> {
    let view = BinaryView::new(data, Endian::Big);
    let magic = view.peek_magic()?;

    let is_64 = match magic {
        FAT_MAGIC | FAT_CIGAM => false,
        FAT_MAGIC_64 | FAT_CIGAM_64 => true,
        _ => return Ok(data),
    };

    let nfat_arch = view.read_u32_be(4)?;
    if nfat_arch > MAX_FAT_ARCHES {
        return Err(SigningError::malformed(format!(
            "fat header claims {nfat_arch} architectures, exceeding the sanity cap of {MAX_FAT_ARCHES}"
        )));
    }

    let entry_size = if is_64 { 32 } else { 20 };
    let mut arches = Vec::with_capacity(nfat_arch as usize);

    for index in 0..nfat_arch {
        let entry_offset = 8 + index as usize * entry_size;
        let cputype = view.read_u32_be(entry_offset)?;
        let (offset, size) = if is_64 {
            (
                view.read_u64(entry_offset + 8)?,
                view.read_u64(entry_offset + 16)?,
            )
        } else {
            (
                view.read_u32_be(entry_offset + 8)? as u64,
                view.read_u32_be(entry_offset + 12)? as u64,
            )
        };

        let end = offset.checked_add(size).ok_or_else(|| {
            SigningError::malformed("fat arch entry offset + size overflows u64")
        })?;
        if end > data.len() as u64 {
            // Out-of-bounds entries are skipped rather than rejecting the
            // whole file; some tools pad fat headers with entries that are
            // not meant to be loaded on this host.
            continue;
        }

        arches.push(FatArch {
            cputype,
            offset,
            size,
        });
    }

    let preferred = arches
        .iter()
        .find(|a| a.cputype == CPU_TYPE_ARM64)
        .or_else(|| arches.iter().find(|a| a.cputype == CPU_TYPE_X86_64))
        .or_else(|| arches.first())
        .ok_or(SigningError::NoSuitableArch)?;

    Ok(&data[preferred.offset as usize..(preferred.offset + preferred.size) as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::test_support::build_minimal_macho;

    fn build_fat(slices: &[(u32, &[u8])]) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&FAT_MAGIC.to_be_bytes());
        header.extend_from_slice(&(slices.len() as u32).to_be_bytes());

        let mut offset = 8 + slices.len() * 20;
        let mut body = Vec::new();
        for (cputype, slice) in slices {
            header.extend_from_slice(&cputype.to_be_bytes());
            header.extend_from_slice(&0u32.to_be_bytes()); // cpusubtype
            header.extend_from_slice(&(offset as u32).to_be_bytes());
            header.extend_from_slice(&(slice.len() as u32).to_be_bytes());
            header.extend_from_slice(&0x4000u32.to_be_bytes()); // align
            body.extend_from_slice(slice);
            offset += slice.len();
        }

        header.extend_from_slice(&body);
        header
    }

    #[test]
    fn non_fat_input_passes_through() {
        let thin = build_minimal_macho(4096, 2048, None);
        assert_eq!(select_slice(&thin).unwrap(), thin.as_slice());
    }

    #[test]
    fn prefers_arm64_over_x86_64() {
        let x86 = build_minimal_macho(4096, 2048, None);
        let arm = build_minimal_macho(4096, 4096, None);
        let fat = build_fat(&[(CPU_TYPE_X86_64, &x86), (CPU_TYPE_ARM64, &arm)]);

        let selected = select_slice(&fat).unwrap();
        assert_eq!(selected.len(), arm.len());
        assert_eq!(selected, arm.as_slice());
    }

    #[test]
    fn falls_back_to_first_valid_entry() {
        let ppc = build_minimal_macho(4096, 2048, None);
        let fat = build_fat(&[(0x0000_0012, &ppc)]);

        let selected = select_slice(&fat).unwrap();
        assert_eq!(selected, ppc.as_slice());
    }

    #[test]
    fn empty_arch_table_fails() {
        let fat = build_fat(&[]);
        assert!(matches!(
            select_slice(&fat).unwrap_err(),
            SigningError::NoSuitableArch
        ));
    }
}
