// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mach-O and fat-header magic numbers and load-command constants used by
//! the signing engine. Only the subset the engine touches is defined here;
//! see `goblin`/`otool` for an exhaustive listing.

pub const MH_MAGIC: u32 = 0xfeedface;
pub const MH_CIGAM: u32 = 0xcefaedfe;
pub const MH_MAGIC_64: u32 = 0xfeedfacf;
pub const MH_CIGAM_64: u32 = 0xcffaedfe;

pub const FAT_MAGIC: u32 = 0xcafebabe;
pub const FAT_CIGAM: u32 = 0xbebafeca;
pub const FAT_MAGIC_64: u32 = 0xcafebabf;
pub const FAT_CIGAM_64: u32 = 0xbfbafeca;

pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_CODE_SIGNATURE: u32 = 0x1d;
pub const LC_LOAD_DYLIB: u32 = 0x0c;
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | 0x8000_0000;

pub const SEG_LINKEDIT: &str = "__LINKEDIT";
pub const SEG_PAGEZERO: &str = "__PAGEZERO";

/// CPU type constants, used only for fat-arch architecture preference.
pub const CPU_TYPE_X86_64: u32 = 0x0100_0007;
pub const CPU_TYPE_ARM64: u32 = 0x0100_000c;

/// Sanity cap on the number of load commands a header may declare; parsing
/// stops and fails with [`crate::error::SigningError::MalformedMachO`]
/// beyond this, per §3.
pub const MAX_LOAD_COMMANDS: u32 = 1024;

/// Sanity cap on the number of architecture slices a fat header may declare.
pub const MAX_FAT_ARCHES: u32 = 64;

pub const SIZEOF_MACH_HEADER_32: usize = 28;
pub const SIZEOF_MACH_HEADER_64: usize = 32;

pub const SIZEOF_SEGMENT_COMMAND_32: usize = 56;
pub const SIZEOF_SEGMENT_COMMAND_64: usize = 72;
pub const SIZEOF_SECTION_32: usize = 68;
pub const SIZEOF_SECTION_64: usize = 80;

/// `linkedit_data_command`: cmd, cmdsize, dataoff, datasize.
pub const SIZEOF_LINKEDIT_DATA_COMMAND: usize = 16;

/// `dylib_command` fixed prefix before the trailing path string: cmd,
/// cmdsize, name offset, timestamp, current_version, compatibility_version.
pub const SIZEOF_DYLIB_COMMAND_PREFIX: usize = 24;

/// CodeDirectory magic (`CSMAGIC_CODEDIRECTORY`).
pub const CS_MAGIC_CODEDIRECTORY: u32 = 0xfade0c02;
/// Embedded-signature SuperBlob magic (`CSMAGIC_EMBEDDED_SIGNATURE`).
pub const CS_MAGIC_EMBEDDED_SIGNATURE: u32 = 0xfade0cc0;
/// Generic blob-wrapper magic (`CSMAGIC_BLOBWRAPPER`), used to carry the CMS
/// signature as an opaque sub-blob.
pub const CS_MAGIC_BLOBWRAPPER: u32 = 0xfade0b01;

/// CodeDirectory version this crate emits; fixed per design note §9.1.
pub const CD_VERSION: u32 = 0x20400;
/// Fixed on-disk size of the CodeDirectory header for [`CD_VERSION`].
pub const CD_HEADER_SIZE: usize = 64;

pub const CS_HASHTYPE_SHA256: u8 = 2;
pub const CS_HASH_SIZE_SHA256: u8 = 32;

pub const CS_ADHOC: u32 = 0x0000_0002;
pub const CS_GET_TASK_ALLOW: u32 = 0x0000_0004;

/// SuperBlob sub-blob slot-type constants the core emits.
pub const CSSLOT_CODEDIRECTORY: u32 = 0;
pub const CSSLOT_ENTITLEMENTS: u32 = 5;
pub const CSSLOT_SIGNATURESLOT: u32 = 0x0001_0000;
