// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::binary_view::{endian_for_magic, BinaryView, Endian};
use crate::error::{SigningError, SigningResult};
use crate::macho::constants::*;

/// The fixed-size Mach-O header, either 32- or 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub is_64: bool,
    pub endian: Endian,
}

impl MachHeader {
    /// Size in bytes of the on-disk header, including the trailing
    /// `reserved` field present only in the 64-bit variant.
    pub fn size(&self) -> usize {
        if self.is_64 {
            SIZEOF_MACH_HEADER_64
        } else {
            SIZEOF_MACH_HEADER_32
        }
    }

    pub fn parse(data: &[u8]) -> SigningResult<Self> {
        let probe = BinaryView::new(data, Endian::Little);
        let magic = probe.peek_magic()?;

        let is_64 = match magic {
            MH_MAGIC_64 | MH_CIGAM_64 => true,
            MH_MAGIC | MH_CIGAM => false,
            other => {
                return Err(SigningError::malformed(format!(
                    "unrecognized Mach-O magic 0x{other:08x}"
                )))
            }
        };
        let endian = endian_for_magic(magic);
        let view = BinaryView::new(data, endian);

        let header = MachHeader {
            magic,
            cputype: view.read_u32(4)?,
            cpusubtype: view.read_u32(8)?,
            filetype: view.read_u32(12)?,
            ncmds: view.read_u32(16)?,
            sizeofcmds: view.read_u32(20)?,
            flags: view.read_u32(24)?,
            is_64,
            endian,
        };

        if header.ncmds > MAX_LOAD_COMMANDS {
            return Err(SigningError::malformed(format!(
                "ncmds {} exceeds sanity cap of {MAX_LOAD_COMMANDS}",
                header.ncmds
            )));
        }

        let commands_end = header
            .size()
            .checked_add(header.sizeofcmds as usize)
            .ok_or_else(|| SigningError::malformed("sizeofcmds overflows header size"))?;
        if commands_end > data.len() {
            return Err(SigningError::malformed(format!(
                "header claims {} bytes of load commands but the file is only {} bytes",
                commands_end,
                data.len()
            )));
        }

        Ok(header)
    }
}
