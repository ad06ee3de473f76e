// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splices a freshly built super-blob back into a Mach-O buffer: either in
//! place, reusing the existing `__LINKEDIT` slack, or by growing the file
//! and fixing up the `LC_CODE_SIGNATURE` command and `__LINKEDIT` bounds.

use crate::binary_view::Endian;
use crate::error::{SigningError, SigningResult};
use crate::macho::constants::*;
use crate::macho::load_command::LoadCommandKind;
use crate::macho::model::MachOModel;

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

fn write_u32_at(buf: &mut [u8], offset: usize, value: u32, endian: Endian) {
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    buf[offset..offset + 4].copy_from_slice(&bytes);
}

fn write_u64_at(buf: &mut [u8], offset: usize, value: u64, endian: Endian) {
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    buf[offset..offset + 8].copy_from_slice(&bytes);
}

/// Replaces or appends the embedded signature of a Mach-O binary.
pub struct BinaryRewriter;

impl BinaryRewriter {
    /// Chooses replace-in-place when the existing signature region is at
    /// least as large as `super_blob`, otherwise grows the file, per §4.8.
    pub fn rewrite(
        data: &[u8],
        model: &MachOModel,
        super_blob: &[u8],
    ) -> SigningResult<Vec<u8>> {
        match model.existing_signature_region() {
            Some((offset, size)) if size >= super_blob.len() as u64 => {
                Ok(Self::replace_in_place(data, offset, size, super_blob))
            }
            _ => Self::grow(data, model, super_blob),
        }
    }

    /// Writes `super_blob` at `offset`, zero-filling the remainder of the
    /// `size`-byte region it previously occupied. Fails with
    /// [`SigningError::SignatureLargerThanAvailable`] if it doesn't fit.
    pub fn replace_in_place_checked(
        data: &[u8],
        offset: u64,
        size: u64,
        super_blob: &[u8],
    ) -> SigningResult<Vec<u8>> {
        if super_blob.len() as u64 > size {
            return Err(SigningError::SignatureLargerThanAvailable {
                new: super_blob.len(),
                available: size as usize,
            });
        }
        Ok(Self::replace_in_place(data, offset, size, super_blob))
    }

    fn replace_in_place(data: &[u8], offset: u64, size: u64, super_blob: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        let start = offset as usize;
        out[start..start + super_blob.len()].copy_from_slice(super_blob);
        for byte in &mut out[start + super_blob.len()..start + size as usize] {
            *byte = 0;
        }
        out
    }

    /// Extends the file so the new super-blob lies past the current
    /// `__LINKEDIT` content, per the grow algorithm in §4.8. When an
    /// existing (too-small) signature is present, its region is reclaimed
    /// rather than left in the file as dead weight: the new super-blob is
    /// placed starting from the *old* signature's offset, not past the end
    /// of all `__LINKEDIT` content (which would just leave the stale bytes
    /// orphaned ahead of the new blob).
    fn grow(data: &[u8], model: &MachOModel, super_blob: &[u8]) -> SigningResult<Vec<u8>> {
        model.check_linkedit_is_last()?;
        let linkedit = model.linkedit()?;

        let reclaim_from = match model.existing_signature_region() {
            Some((offset, _)) => offset,
            None => linkedit.fileoff + linkedit.filesize,
        };
        let sig_offset = align_up(reclaim_from, 16);
        let gap = (sig_offset - reclaim_from) as usize;

        let new_linkedit_filesize = (sig_offset - linkedit.fileoff) + super_blob.len() as u64;
        let new_linkedit_vmsize = align_up(new_linkedit_filesize, 16384);

        let has_code_signature = model.code_signature_command().is_some();
        let extra_cmd_size = if has_code_signature {
            0
        } else {
            SIZEOF_LINKEDIT_DATA_COMMAND as u32
        };

        if !has_code_signature {
            let free_space = command_table_free_space(model)?;
            if free_space < extra_cmd_size as u64 {
                return Err(SigningError::NoRoomForLoadCommand);
            }
        }

        let endian = model.header.endian;
        let mut out = Vec::with_capacity(
            data.len() + gap + super_blob.len() + extra_cmd_size as usize,
        );

        let header_size = model.header.size();
        out.extend_from_slice(&data[0..header_size]);
        write_u32_at(&mut out, 16, model.header.ncmds + u32::from(!has_code_signature), endian);
        write_u32_at(
            &mut out,
            20,
            model.header.sizeofcmds + extra_cmd_size,
            endian,
        );

        let mut wrote_code_signature = false;
        for lc in &model.load_commands {
            let raw = &data[lc.file_offset..lc.file_offset + lc.cmdsize as usize];
            match &lc.kind {
                LoadCommandKind::CodeSignature(_) => {
                    wrote_code_signature = true;
                    write_code_signature_command(&mut out, endian, sig_offset, super_blob.len() as u64);
                }
                LoadCommandKind::Segment(segment) if segment.is_linkedit() => {
                    let mut command = raw.to_vec();
                    patch_segment_sizes(
                        &mut command,
                        segment.is_64,
                        new_linkedit_filesize,
                        new_linkedit_vmsize,
                        endian,
                    );
                    out.extend_from_slice(&command);
                }
                _ => out.extend_from_slice(raw),
            }
        }

        if !wrote_code_signature {
            write_code_signature_command(&mut out, endian, sig_offset, super_blob.len() as u64);
        }

        let mut wrote_non_empty_segment = false;
        for segment in model.segments_by_file_offset() {
            if segment.is_pagezero() {
                continue;
            }

            let cursor = out.len() as u64;
            if cursor < segment.fileoff {
                out.extend_from_slice(&data[cursor as usize..segment.fileoff as usize]);
            } else if cursor > segment.fileoff && (segment.fileoff != 0 || wrote_non_empty_segment) {
                return Err(SigningError::malformed(
                    "Mach-O segment layout overlaps previously written data during rewrite",
                ));
            }

            if segment.is_linkedit() {
                out.extend_from_slice(&data[segment.fileoff as usize..reclaim_from as usize]);
                out.extend(std::iter::repeat(0u8).take(gap));
                out.extend_from_slice(super_blob);
            } else {
                let write_start = (out.len() as u64).max(segment.fileoff) as usize;
                let segment_end = (segment.fileoff + segment.filesize) as usize;
                if write_start < segment_end {
                    out.extend_from_slice(&data[write_start..segment_end]);
                }
            }

            wrote_non_empty_segment = true;
        }

        Ok(out)
    }
}

fn write_code_signature_command(out: &mut Vec<u8>, endian: Endian, dataoff: u64, datasize: u64) {
    let mut command = [0u8; SIZEOF_LINKEDIT_DATA_COMMAND];
    write_u32_at(&mut command, 0, LC_CODE_SIGNATURE, endian);
    write_u32_at(&mut command, 4, SIZEOF_LINKEDIT_DATA_COMMAND as u32, endian);
    write_u32_at(&mut command, 8, dataoff as u32, endian);
    write_u32_at(&mut command, 12, datasize as u32, endian);
    out.extend_from_slice(&command);
}

fn patch_segment_sizes(
    command: &mut [u8],
    is_64: bool,
    new_filesize: u64,
    new_vmsize: u64,
    endian: Endian,
) {
    let body = 8;
    if is_64 {
        write_u64_at(command, body + 24, new_vmsize, endian);
        write_u64_at(command, body + 40, new_filesize, endian);
    } else {
        write_u32_at(command, body + 20, new_vmsize as u32, endian);
        write_u32_at(command, body + 28, new_filesize as u32, endian);
    }
}

/// Bytes of slack between the end of the declared load-command table and the
/// first byte of real section content (or `__LINKEDIT`'s start, if the
/// binary has no sections at all).
fn command_table_free_space(model: &MachOModel) -> SigningResult<u64> {
    let commands_end = (model.header.size() + model.header.sizeofcmds as usize) as u64;

    let first_section_offset = model
        .segments()
        .flat_map(|s| s.sections.iter())
        .filter(|section| section.size > 0)
        .map(|section| section.offset as u64)
        .min();

    let limit = match first_section_offset {
        Some(offset) => offset,
        None => model.linkedit()?.fileoff,
    };

    Ok(limit.saturating_sub(commands_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::test_support::build_minimal_macho;

    #[test]
    fn replace_in_place_preserves_length() {
        let data = build_minimal_macho(4096, 2048, Some(256));
        let model = MachOModel::parse(&data).unwrap();
        let (offset, size) = model.existing_signature_region().unwrap();

        let new_sig = vec![0x11u8; 100];
        let out = BinaryRewriter::rewrite(&data, &model, &new_sig).unwrap();

        assert_eq!(out.len(), data.len());
        assert_eq!(&out[offset as usize..offset as usize + new_sig.len()], &new_sig[..]);
        assert!(out[offset as usize + new_sig.len()..(offset + size) as usize]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn replace_in_place_rejects_oversized_signature() {
        let data = build_minimal_macho(4096, 2048, Some(64));
        let model = MachOModel::parse(&data).unwrap();
        let (offset, size) = model.existing_signature_region().unwrap();

        let too_big = vec![0u8; 128];
        let err = BinaryRewriter::replace_in_place_checked(&data, offset, size, &too_big).unwrap_err();
        assert!(matches!(err, SigningError::SignatureLargerThanAvailable { .. }));
    }

    #[test]
    fn grow_without_existing_signature_adds_load_command() {
        let data = build_minimal_macho(4096, 2048, None);
        let model = MachOModel::parse(&data).unwrap();

        let new_sig = vec![0xAAu8; 8192];
        let out = BinaryRewriter::rewrite(&data, &model, &new_sig).unwrap();

        let new_model = MachOModel::parse(&out).unwrap();
        assert_eq!(new_model.header.ncmds, model.header.ncmds + 1);
        let (offset, size) = new_model.existing_signature_region().unwrap();
        assert_eq!(size, new_sig.len() as u64);
        assert_eq!(
            &out[offset as usize..offset as usize + new_sig.len()],
            &new_sig[..]
        );

        let new_linkedit = new_model.linkedit().unwrap();
        assert_eq!(offset + size, new_linkedit.file_end());
        assert_eq!(new_linkedit.vmsize % 16384, 0);
    }

    #[test]
    fn grow_with_undersized_existing_signature_extends_file() {
        let data = build_minimal_macho(4096, 2048, Some(32));
        let model = MachOModel::parse(&data).unwrap();
        let (old_offset, old_size) = model.existing_signature_region().unwrap();

        let new_sig = vec![0xBBu8; 4096];
        let out = BinaryRewriter::rewrite(&data, &model, &new_sig).unwrap();

        let new_model = MachOModel::parse(&out).unwrap();
        assert_eq!(new_model.header.ncmds, model.header.ncmds);
        let (offset, size) = new_model.existing_signature_region().unwrap();
        assert_eq!(size, new_sig.len() as u64);
        assert_eq!(&out[offset as usize..offset as usize + new_sig.len()], &new_sig[..]);

        // P6/S3: the old signature region must be reclaimed, not left as
        // dead weight ahead of the new blob, so growth is bounded by
        // (new - old) + alignment padding rather than (new + old data size).
        let max_expected_len = data.len() - old_size as usize + new_sig.len() + 16;
        assert!(
            out.len() <= max_expected_len,
            "grow left stale signature bytes in place: out.len()={}, max_expected={}",
            out.len(),
            max_expected_len
        );
        assert!(offset < old_offset + old_size);
    }
}
