// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The parsed, validated view of a single-architecture Mach-O file: header,
//! load commands, segments and their sections, plus the handful of derived
//! facts ([`MachOModel::linkedit`], [`MachOModel::existing_signature_region`],
//! [`MachOModel::code_limit`]) the rest of the signing engine consults.

use crate::binary_view::BinaryView;
use crate::error::{SigningError, SigningResult};
use crate::macho::constants::*;
use crate::macho::header::MachHeader;
use crate::macho::load_command::{LinkeditDataCommand, LoadCommandEntry, LoadCommandKind};
use crate::macho::segment::SegmentCommand;

/// A parsed, single-architecture Mach-O binary.
///
/// Construction (`parse`) is the only fallible step; everything else is a
/// read of already-validated data. A model never outlives the buffer it
/// borrows, and it is never mutated in place — the two transformations the
/// crate supports ([`crate::signing::rewriter`] and
/// [`crate::signing::dylib`]) each take a model and produce a brand new
/// byte buffer.
pub struct MachOModel<'a> {
    pub data: &'a [u8],
    pub header: MachHeader,
    pub load_commands: Vec<LoadCommandEntry>,
}

impl<'a> MachOModel<'a> {
    pub fn parse(data: &'a [u8]) -> SigningResult<Self> {
        let header = MachHeader::parse(data)?;
        let view = BinaryView::new(data, header.endian);

        let mut load_commands = Vec::with_capacity(header.ncmds as usize);
        let mut offset = header.size();
        let commands_end = header.size() + header.sizeofcmds as usize;
        let mut seen_code_signature = false;

        for index in 0..header.ncmds {
            if offset + 8 > commands_end {
                return Err(SigningError::malformed(format!(
                    "load command index {index} extends past the declared command table bounds"
                )));
            }

            let cmd = view.read_u32(offset)?;
            let cmdsize = view.read_u32(offset + 4)?;

            if cmdsize < 8 {
                return Err(SigningError::malformed(format!(
                    "load command index {index} has cmdsize {cmdsize} < 8"
                )));
            }
            if offset + cmdsize as usize > commands_end {
                return Err(SigningError::malformed(format!(
                    "load command index {index} extends past the declared command table bounds"
                )));
            }

            let kind = match cmd {
                LC_SEGMENT => LoadCommandKind::Segment(SegmentCommand::parse(
                    &view, data, offset, cmdsize, false,
                )?),
                LC_SEGMENT_64 => LoadCommandKind::Segment(SegmentCommand::parse(
                    &view, data, offset, cmdsize, true,
                )?),
                LC_CODE_SIGNATURE => {
                    if seen_code_signature {
                        return Err(SigningError::malformed(
                            "more than one LC_CODE_SIGNATURE load command",
                        ));
                    }
                    seen_code_signature = true;
                    LoadCommandKind::CodeSignature(LinkeditDataCommand {
                        dataoff: view.read_u32(offset + 8)?,
                        datasize: view.read_u32(offset + 12)?,
                    })
                }
                _ => LoadCommandKind::Other,
            };

            load_commands.push(LoadCommandEntry {
                file_offset: offset,
                cmd,
                cmdsize,
                kind,
            });

            offset += cmdsize as usize;
        }

        let model = MachOModel {
            data,
            header,
            load_commands,
        };

        if let Some((offset, size)) = model.existing_signature_region() {
            let linkedit = model.linkedit()?;
            let region_end = offset + size;
            if offset < linkedit.fileoff || region_end > linkedit.file_end() {
                return Err(SigningError::malformed(
                    "LC_CODE_SIGNATURE region does not lie within __LINKEDIT",
                ));
            }
        }

        Ok(model)
    }

    /// All segments in load-command order.
    pub fn segments(&self) -> impl Iterator<Item = &SegmentCommand> {
        self.load_commands.iter().filter_map(|lc| lc.as_segment())
    }

    /// Segments sorted by their file offset, for rewriting the file
    /// tail-to-head-safe. Ties (e.g. `__PAGEZERO` and `__TEXT` both at a
    /// nominal offset of 0) preserve load-command order.
    pub fn segments_by_file_offset(&self) -> Vec<&SegmentCommand> {
        let mut segments: Vec<&SegmentCommand> = self.segments().collect();
        segments.sort_by_key(|s| s.fileoff);
        segments
    }

    pub fn linkedit(&self) -> SigningResult<&SegmentCommand> {
        self.segments()
            .find(|s| s.is_linkedit())
            .ok_or(SigningError::MissingLinkedit)
    }

    /// Fails with [`SigningError::LinkeditNotLast`] unless `__LINKEDIT`'s
    /// file range ends at or after every other file-resident segment's,
    /// per the §3 invariant that growth-mode rewriting depends on.
    pub fn check_linkedit_is_last(&self) -> SigningResult<()> {
        let linkedit = self.linkedit()?;
        for segment in self.segments() {
            if segment.is_linkedit() || segment.is_pagezero() {
                continue;
            }
            if segment.file_end() > linkedit.file_end() {
                return Err(SigningError::LinkeditNotLast);
            }
        }
        Ok(())
    }

    pub fn code_signature_command(&self) -> Option<&LoadCommandEntry> {
        self.load_commands.iter().find(|lc| lc.is_code_signature())
    }

    /// (offset, size) of the currently embedded signature region, if any.
    pub fn existing_signature_region(&self) -> Option<(u64, u64)> {
        self.code_signature_command()
            .and_then(|lc| lc.as_code_signature())
            .map(|cs| (cs.dataoff as u64, cs.datasize as u64))
    }

    /// The file offset at which code digests stop: the start of any
    /// existing signature region, or the end of the file when unsigned.
    pub fn code_limit(&self) -> u64 {
        match self.existing_signature_region() {
            Some((offset, _)) => offset,
            None => self.data.len() as u64,
        }
    }

    /// `MH_EXECUTE` is filetype 0x2.
    pub fn is_executable(&self) -> bool {
        self.header.filetype == 0x2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::test_support::build_minimal_macho;

    #[test]
    fn parses_minimal_unsigned_binary() {
        let data = build_minimal_macho(4096, 2048, None);
        let model = MachOModel::parse(&data).unwrap();
        assert_eq!(model.header.ncmds, 2);
        assert!(model.existing_signature_region().is_none());
        assert_eq!(model.code_limit(), data.len() as u64);
        assert!(model.linkedit().is_ok());
    }

    #[test]
    fn rejects_commands_overrunning_declared_table() {
        let mut data = build_minimal_macho(4096, 2048, None);
        // Corrupt ncmds to claim more commands than actually fit.
        let ncmds_offset = 16;
        data[ncmds_offset..ncmds_offset + 4].copy_from_slice(&10u32.to_le_bytes());
        let err = MachOModel::parse(&data).unwrap_err();
        assert!(matches!(err, SigningError::MalformedMachO { .. }));
    }
}
