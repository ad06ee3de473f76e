// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inserts an `LC_LOAD_DYLIB`/`LC_LOAD_WEAK_DYLIB` load command into the
//! slack between a binary's command table and its first section, per §4.9.
//! Any signature already present is left untouched on disk but is no longer
//! valid; callers must re-sign after injecting.

use crate::error::{SigningError, SigningResult};
use crate::macho::constants::*;
use crate::macho::model::MachOModel;

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

pub struct DylibInjector;

impl DylibInjector {
    /// Builds a new binary with an additional dylib load command for
    /// `path`, `weak` selecting `LC_LOAD_WEAK_DYLIB` over `LC_LOAD_DYLIB`.
    pub fn inject(data: &[u8], model: &MachOModel, path: &str, weak: bool) -> SigningResult<Vec<u8>> {
        if !path.is_ascii() {
            return Err(SigningError::malformed(
                "dylib path for LC_LOAD_DYLIB must be ASCII",
            ));
        }

        let mut path_bytes = path.as_bytes().to_vec();
        path_bytes.push(0);
        let unpadded_len = SIZEOF_DYLIB_COMMAND_PREFIX + path_bytes.len();
        let cmdsize = align_up(unpadded_len, 8);
        path_bytes.resize(cmdsize - SIZEOF_DYLIB_COMMAND_PREFIX, 0);

        let commands_end = model.header.size() + model.header.sizeofcmds as usize;

        let first_section_offset = model
            .segments()
            .flat_map(|s| s.sections.iter())
            .filter(|section| section.size > 0)
            .map(|section| section.offset as usize)
            .min();

        let limit = match first_section_offset {
            Some(offset) => offset,
            None => model.linkedit()?.fileoff as usize,
        };

        if limit < commands_end || limit - commands_end < cmdsize {
            return Err(SigningError::NoRoomForLoadCommand);
        }

        let cmd = if weak {
            LC_LOAD_WEAK_DYLIB
        } else {
            LC_LOAD_DYLIB
        };

        let endian = model.header.endian;
        let mut command = Vec::with_capacity(cmdsize);
        write_u32(&mut command, cmd, endian);
        write_u32(&mut command, cmdsize as u32, endian);
        write_u32(&mut command, SIZEOF_DYLIB_COMMAND_PREFIX as u32, endian); // name offset
        write_u32(&mut command, 2, endian); // timestamp
        write_u32(&mut command, 0x0001_0000, endian); // current_version
        write_u32(&mut command, 0x0001_0000, endian); // compatibility_version
        command.extend_from_slice(&path_bytes);
        debug_assert_eq!(command.len(), cmdsize);

        let mut out = Vec::with_capacity(data.len());
        let header_size = model.header.size();
        out.extend_from_slice(&data[0..header_size]);
        write_u32_at(&mut out, 16, model.header.ncmds + 1, endian);
        write_u32_at(&mut out, 20, model.header.sizeofcmds + cmdsize as u32, endian);

        out.extend_from_slice(&data[header_size..commands_end]);
        out.extend_from_slice(&command);
        // The inserted command occupies bytes that were free slack in the
        // original file (already accounted for by the free-space check
        // above), so the rest of the file is unchanged and unshifted: skip
        // over that slack rather than appending after it.
        out.extend_from_slice(&data[commands_end + cmdsize..]);

        Ok(out)
    }
}

fn write_u32(buf: &mut Vec<u8>, value: u32, endian: crate::binary_view::Endian) {
    let bytes = match endian {
        crate::binary_view::Endian::Little => value.to_le_bytes(),
        crate::binary_view::Endian::Big => value.to_be_bytes(),
    };
    buf.extend_from_slice(&bytes);
}

fn write_u32_at(buf: &mut [u8], offset: usize, value: u32, endian: crate::binary_view::Endian) {
    let bytes = match endian {
        crate::binary_view::Endian::Little => value.to_le_bytes(),
        crate::binary_view::Endian::Big => value.to_be_bytes(),
    };
    buf[offset..offset + 4].copy_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::test_support::build_minimal_macho;

    #[test]
    fn injects_dylib_load_command_and_updates_header() {
        let data = build_minimal_macho(4096, 2048, None);
        let model = MachOModel::parse(&data).unwrap();

        let out = DylibInjector::inject(&data, &model, "@rpath/Frozen.framework/Frozen", false).unwrap();
        assert_eq!(out.len(), data.len());

        let new_model = MachOModel::parse(&out).unwrap();
        assert_eq!(new_model.header.ncmds, model.header.ncmds + 1);
        assert!(new_model.header.sizeofcmds > model.header.sizeofcmds);

        let last = new_model.load_commands.last().unwrap();
        assert_eq!(last.cmd, LC_LOAD_DYLIB);

        let name_start = last.file_offset + SIZEOF_DYLIB_COMMAND_PREFIX;
        let name_bytes = &out[name_start..last.file_offset + last.cmdsize as usize];
        let name = std::str::from_utf8(name_bytes)
            .unwrap()
            .trim_end_matches('\0');
        assert_eq!(name, "@rpath/Frozen.framework/Frozen");
    }

    #[test]
    fn weak_flag_selects_weak_dylib_command() {
        let data = build_minimal_macho(4096, 2048, None);
        let model = MachOModel::parse(&data).unwrap();

        let out = DylibInjector::inject(&data, &model, "/usr/lib/libfoo.dylib", true).unwrap();
        let new_model = MachOModel::parse(&out).unwrap();
        let last = new_model.load_commands.last().unwrap();
        assert_eq!(last.cmd, LC_LOAD_WEAK_DYLIB);
    }

    #[test]
    fn fails_when_no_room_before_first_section() {
        let data = build_minimal_macho(200, 2048, None);
        let model = MachOModel::parse(&data).unwrap();

        let err = DylibInjector::inject(&data, &model, "/usr/lib/libfoo.dylib", false).unwrap_err();
        assert!(matches!(err, SigningError::NoRoomForLoadCommand));
    }
}
