// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wraps typed sub-blobs (CodeDirectory, optional entitlements, CMS
//! signature) into the embedded-signature SuperBlob container.

use crate::macho::constants::*;

/// One sub-blob destined for a SuperBlob: its slot type and raw bytes.
pub struct BlobEntry {
    pub slot_type: u32,
    pub data: Vec<u8>,
}

impl BlobEntry {
    pub fn code_directory(data: Vec<u8>) -> Self {
        BlobEntry {
            slot_type: CSSLOT_CODEDIRECTORY,
            data,
        }
    }

    pub fn entitlements(data: Vec<u8>) -> Self {
        BlobEntry {
            slot_type: CSSLOT_ENTITLEMENTS,
            data,
        }
    }

    /// Wraps raw CMS DER bytes in a `CSMAGIC_BLOBWRAPPER` blob and assigns
    /// it the CMS signature slot.
    pub fn cms_signature(der: Vec<u8>) -> Self {
        let mut wrapped = Vec::with_capacity(8 + der.len());
        wrapped.extend_from_slice(&CS_MAGIC_BLOBWRAPPER.to_be_bytes());
        wrapped.extend_from_slice(&((der.len() + 8) as u32).to_be_bytes());
        wrapped.extend_from_slice(&der);

        BlobEntry {
            slot_type: CSSLOT_SIGNATURESLOT,
            data: wrapped,
        }
    }
}

pub struct SuperBlobBuilder;

impl SuperBlobBuilder {
    /// Lays out `entries` (sorted by slot type) consecutively after the
    /// header+index region and returns the complete SuperBlob bytes, per
    /// §4.6.
    pub fn build(mut entries: Vec<BlobEntry>) -> Vec<u8> {
        entries.sort_by_key(|e| e.slot_type);

        let count = entries.len();
        let index_region_size = 12 + 8 * count;

        let mut offsets = Vec::with_capacity(count);
        let mut cursor = index_region_size;
        for entry in &entries {
            offsets.push(cursor);
            cursor += entry.data.len();
        }
        let total_length = cursor;

        let mut out = Vec::with_capacity(total_length);
        out.extend_from_slice(&CS_MAGIC_EMBEDDED_SIGNATURE.to_be_bytes());
        out.extend_from_slice(&(total_length as u32).to_be_bytes());
        out.extend_from_slice(&(count as u32).to_be_bytes());

        for (entry, offset) in entries.iter().zip(&offsets) {
            out.extend_from_slice(&entry.slot_type.to_be_bytes());
            out.extend_from_slice(&(*offset as u32).to_be_bytes());
        }

        for entry in &entries {
            out.extend_from_slice(&entry.data);
        }

        out
    }
}
