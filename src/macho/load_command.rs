// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::macho::constants::LC_CODE_SIGNATURE;
use crate::macho::segment::SegmentCommand;

/// `linkedit_data_command`: the generic shape used by `LC_CODE_SIGNATURE`
/// and several other linkedit-adjacent commands this crate doesn't touch.
#[derive(Debug, Clone, Copy)]
pub struct LinkeditDataCommand {
    pub dataoff: u32,
    pub datasize: u32,
}

/// The interpreted payload of one load command. Unknown kinds are recorded
/// as [`LoadCommandKind::Other`] and left untouched by the rewriter, which
/// copies their bytes through from the original file unmodified.
#[derive(Debug, Clone)]
pub enum LoadCommandKind {
    Segment(SegmentCommand),
    CodeSignature(LinkeditDataCommand),
    Other,
}

/// One load command as recorded by the parser: where it lives in the file,
/// its generic header fields, and its interpreted payload.
#[derive(Debug, Clone)]
pub struct LoadCommandEntry {
    pub file_offset: usize,
    pub cmd: u32,
    pub cmdsize: u32,
    pub kind: LoadCommandKind,
}

impl LoadCommandEntry {
    pub fn is_code_signature(&self) -> bool {
        self.cmd == LC_CODE_SIGNATURE
    }

    pub fn as_segment(&self) -> Option<&SegmentCommand> {
        match &self.kind {
            LoadCommandKind::Segment(segment) => Some(segment),
            _ => None,
        }
    }

    pub fn as_code_signature(&self) -> Option<&LinkeditDataCommand> {
        match &self.kind {
            LoadCommandKind::CodeSignature(cmd) => Some(cmd),
            _ => None,
        }
    }
}
