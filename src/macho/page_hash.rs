// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-page content hashing of a binary's signable prefix.

use sha2::{Digest, Sha256};

/// Default page-size exponent (2^12 = 4096 bytes), matching `codesign`.
pub const DEFAULT_PAGE_SIZE_EXPONENT: u32 = 12;

/// Produces `ceil(code_limit / 2^page_size_exponent)` SHA-256 digests, one
/// per page of `data[0..code_limit)`. The final page, if shorter than a full
/// page, is hashed over its actual remaining bytes rather than zero-padded —
/// this is load-bearing per §4.4 and differs from the padded-last-page
/// behavior of some reference implementations.
pub fn page_hashes(data: &[u8], code_limit: u64, page_size_exponent: u32) -> Vec<[u8; 32]> {
    let page_size = 1u64 << page_size_exponent;
    let code_limit = code_limit.min(data.len() as u64);
    let page_count = code_limit.div_ceil(page_size);

    let mut hashes = Vec::with_capacity(page_count as usize);
    for page in 0..page_count {
        let start = (page * page_size) as usize;
        let end = ((page + 1) * page_size).min(code_limit) as usize;

        let mut hasher = Sha256::new();
        hasher.update(&data[start..end]);
        hashes.push(hasher.finalize().into());
    }

    hashes
}

/// `ceil(code_limit / 2^page_size_exponent)`, the code-slot count a
/// CodeDirectory for this `code_limit` must declare (invariant P4).
pub fn code_slot_count(code_limit: u64, page_size_exponent: u32) -> u64 {
    let page_size = 1u64 << page_size_exponent;
    code_limit.div_ceil(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_matches_ceil_division() {
        let data = vec![0u8; 6144];
        let hashes = page_hashes(&data, 6144, DEFAULT_PAGE_SIZE_EXPONENT);
        assert_eq!(hashes.len(), 2);
        assert_eq!(code_slot_count(6144, DEFAULT_PAGE_SIZE_EXPONENT), 2);
    }

    #[test]
    fn final_short_page_is_not_zero_padded() {
        let mut data = vec![0xFFu8; 4096];
        data.extend_from_slice(&[0xAAu8; 100]);

        let hashes = page_hashes(&data, data.len() as u64, DEFAULT_PAGE_SIZE_EXPONENT);
        assert_eq!(hashes.len(), 2);

        let mut expected = Sha256::new();
        expected.update(&data[4096..4196]);
        let expected: [u8; 32] = expected.finalize().into();
        assert_eq!(hashes[1], expected);

        // A hash over the same short tail zero-padded to a full page must
        // differ, proving we did not pad.
        let mut padded_tail = data[4096..4196].to_vec();
        padded_tail.resize(4096, 0);
        let mut padded_hash = Sha256::new();
        padded_hash.update(&padded_tail);
        let padded_hash: [u8; 32] = padded_hash.finalize().into();
        assert_ne!(hashes[1], padded_hash);
    }

    #[test]
    fn exact_multiple_of_page_size_has_no_trailing_empty_page() {
        let data = vec![0u8; 8192];
        let hashes = page_hashes(&data, 8192, DEFAULT_PAGE_SIZE_EXPONENT);
        assert_eq!(hashes.len(), 2);
    }
}
