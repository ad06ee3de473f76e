// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hand-built minimal Mach-O binaries for unit and scenario tests. These are
//! not golden files lifted from a real toolchain; they are the smallest
//! byte layout that satisfies the parser's invariants, built field-by-field
//! so tests can assert on exact derived values (codeLimit, nCodeSlots, the
//! position of `LC_CODE_SIGNATURE`, and so on).

#![cfg(test)]

use crate::macho::constants::*;

/// Builds a minimal little-endian, 64-bit, `MH_EXECUTE` Mach-O binary with
/// a `__TEXT` segment of `text_size` bytes at file offset 0, followed by a
/// `__LINKEDIT` segment covering `linkedit_extra` bytes of "real" linkedit
/// data plus, if `existing_signature_size` is `Some`, a trailing signature
/// region of that many bytes (filled with `0xAA` so tests can see it get
/// overwritten). Neither segment declares any sections.
pub fn build_minimal_macho(
    text_size: u64,
    linkedit_extra: u64,
    existing_signature_size: Option<u64>,
) -> Vec<u8> {
    let has_signature = existing_signature_size.is_some();
    let ncmds: u32 = if has_signature { 3 } else { 2 };
    let sizeofcmds: u32 = (SIZEOF_SEGMENT_COMMAND_64 * 2
        + if has_signature {
            SIZEOF_LINKEDIT_DATA_COMMAND
        } else {
            0
        }) as u32;

    let linkedit_fileoff = text_size;
    let sig_size = existing_signature_size.unwrap_or(0);
    let linkedit_filesize = linkedit_extra + sig_size;
    let total_size = text_size + linkedit_filesize;

    let mut data = vec![0u8; total_size as usize];

    // mach_header_64
    data[0..4].copy_from_slice(&MH_MAGIC_64.to_le_bytes());
    data[4..8].copy_from_slice(&CPU_TYPE_ARM64.to_le_bytes());
    data[8..12].copy_from_slice(&0u32.to_le_bytes()); // cpusubtype
    data[12..16].copy_from_slice(&2u32.to_le_bytes()); // MH_EXECUTE
    data[16..20].copy_from_slice(&ncmds.to_le_bytes());
    data[20..24].copy_from_slice(&sizeofcmds.to_le_bytes());
    data[24..28].copy_from_slice(&0u32.to_le_bytes()); // flags
    data[28..32].copy_from_slice(&0u32.to_le_bytes()); // reserved

    let mut offset = 32usize;
    write_segment64(
        &mut data,
        offset,
        "__TEXT",
        0,
        text_size,
        0,
        text_size,
        5,
        5,
    );
    offset += SIZEOF_SEGMENT_COMMAND_64;

    write_segment64(
        &mut data,
        offset,
        "__LINKEDIT",
        linkedit_fileoff,
        linkedit_filesize,
        linkedit_fileoff,
        linkedit_filesize,
        1,
        1,
    );
    offset += SIZEOF_SEGMENT_COMMAND_64;

    if let Some(sig_size) = existing_signature_size {
        let dataoff = linkedit_fileoff + linkedit_extra;
        data[offset..offset + 4].copy_from_slice(&LC_CODE_SIGNATURE.to_le_bytes());
        data[offset + 4..offset + 8]
            .copy_from_slice(&(SIZEOF_LINKEDIT_DATA_COMMAND as u32).to_le_bytes());
        data[offset + 8..offset + 12].copy_from_slice(&(dataoff as u32).to_le_bytes());
        data[offset + 12..offset + 16].copy_from_slice(&(sig_size as u32).to_le_bytes());

        let sig_region = &mut data[dataoff as usize..(dataoff + sig_size) as usize];
        sig_region.fill(0xAA);
    }

    data
}

#[allow(clippy::too_many_arguments)]
fn write_segment64(
    data: &mut [u8],
    offset: usize,
    name: &str,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    maxprot: u32,
    initprot: u32,
) {
    data[offset..offset + 4].copy_from_slice(&LC_SEGMENT_64.to_le_bytes());
    data[offset + 4..offset + 8]
        .copy_from_slice(&(SIZEOF_SEGMENT_COMMAND_64 as u32).to_le_bytes());
    let mut segname = [0u8; 16];
    segname[..name.len()].copy_from_slice(name.as_bytes());
    data[offset + 8..offset + 24].copy_from_slice(&segname);
    data[offset + 24..offset + 32].copy_from_slice(&vmaddr.to_le_bytes());
    data[offset + 32..offset + 40].copy_from_slice(&vmsize.to_le_bytes());
    data[offset + 40..offset + 48].copy_from_slice(&fileoff.to_le_bytes());
    data[offset + 48..offset + 56].copy_from_slice(&filesize.to_le_bytes());
    data[offset + 56..offset + 60].copy_from_slice(&maxprot.to_le_bytes());
    data[offset + 60..offset + 64].copy_from_slice(&initprot.to_le_bytes());
    data[offset + 64..offset + 68].copy_from_slice(&0u32.to_le_bytes()); // nsects
    data[offset + 68..offset + 72].copy_from_slice(&0u32.to_le_bytes()); // flags
}
