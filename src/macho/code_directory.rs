// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serializes the CodeDirectory blob: the structure that enumerates a
//! binary's page hashes and the identity it claims.
//!
//! Per design note §9.1, this crate supports exactly one CodeDirectory
//! version ([`CD_VERSION`]) with a fixed 64-byte header
//! ([`CD_HEADER_SIZE`]); the source material's older, divergent builders are
//! not carried forward.

use crate::error::{SigningError, SigningResult};
use crate::macho::constants::*;

/// Everything [`CodeDirectoryBuilder`] needs to serialize one CodeDirectory.
pub struct CodeDirectoryInput<'a> {
    pub identifier: &'a str,
    pub code_limit: u64,
    pub page_size_exponent: u32,
    /// Per-page content hashes, in page order. Length must equal
    /// `ceil(code_limit / 2^page_size_exponent)`.
    pub code_hashes: &'a [[u8; 32]],
    /// Special-slot hashes in ascending slot-number order (slot 1 first,
    /// closest to `hashOffset`); empty when there are no special slots.
    pub special_hashes: &'a [[u8; 32]],
    pub flags: u32,
}

/// Builds CodeDirectory blobs. Stateless: every method is a pure function
/// of its input, so identical inputs always produce identical bytes
/// (invariant P10, identifier-only resign idempotence).
pub struct CodeDirectoryBuilder;

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

impl CodeDirectoryBuilder {
    /// Serializes `input` into a version-[`CD_VERSION`] CodeDirectory, per
    /// the layout algorithm in §4.5. All multi-byte integer fields are
    /// big-endian regardless of the signed Mach-O's own byte order.
    pub fn build(input: &CodeDirectoryInput) -> SigningResult<Vec<u8>> {
        if input.identifier.is_empty() {
            return Err(SigningError::NoIdentifier);
        }
        if !input.identifier.is_ascii() {
            return Err(SigningError::malformed(
                "CodeDirectory identifier must be ASCII",
            ));
        }

        let page_size = 1u64 << input.page_size_exponent;
        let expected_code_slots = input.code_limit.div_ceil(page_size);
        if input.code_hashes.len() as u64 != expected_code_slots {
            return Err(SigningError::malformed(format!(
                "CodeDirectory code-hash count {} does not match ceil(codeLimit/pageSize) = {}",
                input.code_hashes.len(),
                expected_code_slots
            )));
        }

        let ident_offset = CD_HEADER_SIZE;
        let mut ident_bytes = input.identifier.as_bytes().to_vec();
        ident_bytes.push(0);

        let after_ident = ident_offset + ident_bytes.len();
        let special_region_start = align_up(after_ident, 4);
        let special_slot_count = input.special_hashes.len();
        let hash_offset = special_region_start + special_slot_count * CS_HASH_SIZE_SHA256 as usize;

        let n_code_slots = input.code_hashes.len();
        let length = hash_offset + n_code_slots * CS_HASH_SIZE_SHA256 as usize;

        let mut out = Vec::with_capacity(length);
        out.extend_from_slice(&CS_MAGIC_CODEDIRECTORY.to_be_bytes());
        out.extend_from_slice(&(length as u32).to_be_bytes());
        out.extend_from_slice(&CD_VERSION.to_be_bytes());
        out.extend_from_slice(&input.flags.to_be_bytes());
        out.extend_from_slice(&(hash_offset as u32).to_be_bytes());
        out.extend_from_slice(&(ident_offset as u32).to_be_bytes());
        out.extend_from_slice(&(special_slot_count as u32).to_be_bytes());
        out.extend_from_slice(&(n_code_slots as u32).to_be_bytes());
        out.extend_from_slice(
            &(if input.code_limit > u32::MAX as u64 {
                0
            } else {
                input.code_limit as u32
            })
            .to_be_bytes(),
        );
        out.push(CS_HASH_SIZE_SHA256);
        out.push(CS_HASHTYPE_SHA256);
        out.push(0); // platform
        out.push(input.page_size_exponent as u8);
        out.extend_from_slice(&0u32.to_be_bytes()); // spare2
        out.extend_from_slice(&0u32.to_be_bytes()); // scatterOffset
        out.extend_from_slice(&0u32.to_be_bytes()); // teamOffset
        out.extend_from_slice(&0u32.to_be_bytes()); // spare3
        out.extend_from_slice(&input.code_limit.to_be_bytes()); // codeLimit64

        debug_assert_eq!(out.len(), ident_offset);

        out.extend_from_slice(&ident_bytes);
        out.resize(special_region_start, 0);

        debug_assert_eq!(out.len(), special_region_start);
        for hash in input.special_hashes.iter().rev() {
            out.extend_from_slice(hash);
        }

        debug_assert_eq!(out.len(), hash_offset);
        for hash in input.code_hashes {
            out.extend_from_slice(hash);
        }

        debug_assert_eq!(out.len(), length);
        Ok(out)
    }
}
