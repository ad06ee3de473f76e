// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::binary_view::BinaryView;
use crate::error::{SigningError, SigningResult};
use crate::macho::constants::*;

/// A `LC_SEGMENT`/`LC_SEGMENT_64` load command and its inlined sections.
#[derive(Debug, Clone)]
pub struct SegmentCommand {
    pub segname: String,
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: u32,
    pub initprot: u32,
    pub flags: u32,
    pub is_64: bool,
    pub sections: Vec<Section>,
}

/// A section record inlined after a segment's fixed fields.
#[derive(Debug, Clone)]
pub struct Section {
    pub sectname: String,
    pub segname: String,
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
}

/// Trims the trailing NULs from a fixed 16-byte Mach-O name field. Per
/// §4.3, a name that isn't exactly NUL-padded to 16 bytes is still
/// accepted; we just compare the trimmed form.
fn decode_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl SegmentCommand {
    /// Parses a segment command (and its sections) starting at
    /// `cmd_offset` within `data`. `body_offset` is `cmd_offset + 8`, the
    /// position right after the generic `cmd`/`cmdsize` fields.
    pub fn parse(
        view: &BinaryView,
        data: &[u8],
        cmd_offset: usize,
        cmdsize: u32,
        is_64: bool,
    ) -> SigningResult<Self> {
        let body = cmd_offset + 8;

        let segname = decode_name(&view.read_fixed_16(body)?);

        let (vmaddr, vmsize, fileoff, filesize, maxprot, initprot, nsects, flags, header_len) =
            if is_64 {
                (
                    view.read_u64(body + 16)?,
                    view.read_u64(body + 24)?,
                    view.read_u64(body + 32)?,
                    view.read_u64(body + 40)?,
                    view.read_u32(body + 48)?,
                    view.read_u32(body + 52)?,
                    view.read_u32(body + 56)?,
                    view.read_u32(body + 60)?,
                    SIZEOF_SEGMENT_COMMAND_64,
                )
            } else {
                (
                    view.read_u32(body + 16)? as u64,
                    view.read_u32(body + 20)? as u64,
                    view.read_u32(body + 24)? as u64,
                    view.read_u32(body + 28)? as u64,
                    view.read_u32(body + 32)?,
                    view.read_u32(body + 36)?,
                    view.read_u32(body + 40)?,
                    view.read_u32(body + 44)?,
                    SIZEOF_SEGMENT_COMMAND_32,
                )
            };

        if (fileoff as usize).saturating_add(filesize as usize) > data.len() {
            return Err(SigningError::malformed(format!(
                "segment {segname} file range [{fileoff}, {}) exceeds file length {}",
                fileoff + filesize,
                data.len()
            )));
        }

        let section_size = if is_64 {
            SIZEOF_SECTION_64
        } else {
            SIZEOF_SECTION_32
        };

        let sections_start = cmd_offset + header_len;
        let sections_needed = sections_start + section_size * nsects as usize;
        if sections_needed > cmd_offset + cmdsize as usize {
            return Err(SigningError::malformed(format!(
                "segment {segname} declares {nsects} sections that overflow its own cmdsize"
            )));
        }

        let mut sections = Vec::with_capacity(nsects as usize);
        for i in 0..nsects as usize {
            let off = sections_start + i * section_size;
            let section = Section::parse(view, off, is_64)?;

            // Zerofill sections (S_ZEROFILL, e.g. `__bss`) occupy no file
            // space and report offset 0; skip the file-range check for them.
            const S_ZEROFILL: u32 = 1;
            let is_zerofill = section.flags & 0xff == S_ZEROFILL;
            if section.size > 0 && !is_zerofill {
                let section_end = (section.offset as u64).saturating_add(section.size);
                if (section.offset as u64) < fileoff || section_end > fileoff + filesize {
                    return Err(SigningError::malformed(format!(
                        "section {} of segment {segname} lies outside its segment's file range",
                        section.sectname
                    )));
                }
            }

            sections.push(section);
        }

        Ok(SegmentCommand {
            segname,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot,
            initprot,
            flags,
            is_64,
            sections,
        })
    }

    pub fn is_linkedit(&self) -> bool {
        self.segname == SEG_LINKEDIT
    }

    pub fn is_pagezero(&self) -> bool {
        self.segname == SEG_PAGEZERO
    }

    pub fn file_end(&self) -> u64 {
        self.fileoff + self.filesize
    }
}

impl Section {
    fn parse(view: &BinaryView, offset: usize, is_64: bool) -> SigningResult<Self> {
        let sectname = decode_name(&view.read_fixed_16(offset)?);
        let segname = decode_name(&view.read_fixed_16(offset + 16)?);

        if is_64 {
            Ok(Section {
                sectname,
                segname,
                addr: view.read_u64(offset + 32)?,
                size: view.read_u64(offset + 40)?,
                offset: view.read_u32(offset + 48)?,
                align: view.read_u32(offset + 52)?,
                reloff: view.read_u32(offset + 56)?,
                nreloc: view.read_u32(offset + 60)?,
                flags: view.read_u32(offset + 64)?,
            })
        } else {
            Ok(Section {
                sectname,
                segname,
                addr: view.read_u32(offset + 32)? as u64,
                size: view.read_u32(offset + 36)? as u64,
                offset: view.read_u32(offset + 40)?,
                align: view.read_u32(offset + 44)?,
                reloff: view.read_u32(offset + 48)?,
                nreloc: view.read_u32(offset + 52)?,
                flags: view.read_u32(offset + 56)?,
            })
        }
    }
}
