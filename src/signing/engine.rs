// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ties the per-binary pieces together in the fixed order §5 requires:
//! parse → hash → build CodeDirectory → sign → build SuperBlob → rewrite.
//! This is the one entry point the bundle-signing pipeline calls per
//! executable; everything upstream of it (fat-slice selection already
//! applied by the caller) and downstream (writing bytes back to the
//! bundle) lives outside the core.

use sha2::{Digest, Sha256};

use crate::error::SigningResult;
use crate::macho::code_directory::{CodeDirectoryBuilder, CodeDirectoryInput};
use crate::macho::constants::{CS_ADHOC, CS_GET_TASK_ALLOW, CSSLOT_ENTITLEMENTS};
use crate::macho::model::MachOModel;
use crate::macho::page_hash::{page_hashes, DEFAULT_PAGE_SIZE_EXPONENT};
use crate::macho::super_blob::{BlobEntry, SuperBlobBuilder};
use crate::signing::dylib::DylibInjector;
use crate::signing::rewriter::BinaryRewriter;
use crate::signing::signer::{SignatureSigner, SigningIdentity};

/// One special slot per conventional Apple slot number; only slot
/// [`CSSLOT_ENTITLEMENTS`] is ever populated by this crate (no
/// requirements blob is built), so the array is sized to cover it and the
/// unused lower slots stay zeroed.
fn special_slot_hashes(entitlements: Option<&[u8]>) -> Vec<[u8; 32]> {
    match entitlements {
        None => Vec::new(),
        Some(data) => {
            let mut slots = vec![[0u8; 32]; CSSLOT_ENTITLEMENTS as usize];
            let mut hasher = Sha256::new();
            hasher.update(data);
            slots[CSSLOT_ENTITLEMENTS as usize - 1] = hasher.finalize().into();
            slots
        }
    }
}

/// Options controlling one binary's signing pass. `inject_dylib` is applied
/// to `data` before hashing, per §4.9 ("the caller is responsible for
/// ordering inject-then-sign").
pub struct SignOptions<'a> {
    pub identifier: &'a str,
    pub entitlements: Option<&'a [u8]>,
    pub inject_dylib: Option<(&'a str, bool)>,
}

/// Signs a single-architecture Mach-O buffer, returning the new bytes.
/// `data` must already be the selected slice for fat/universal input — see
/// [`crate::macho::select_slice`].
pub fn sign_macho_slice(
    data: &[u8],
    identity: &SigningIdentity,
    options: &SignOptions,
) -> SigningResult<Vec<u8>> {
    let working;
    let working_ref: &[u8] = match options.inject_dylib {
        Some((path, weak)) => {
            let model = MachOModel::parse(data)?;
            working = DylibInjector::inject(data, &model, path, weak)?;
            &working
        }
        None => data,
    };

    let model = MachOModel::parse(working_ref)?;
    let code_limit = model.code_limit();
    let code_hashes = page_hashes(working_ref, code_limit, DEFAULT_PAGE_SIZE_EXPONENT);
    let special_hashes = special_slot_hashes(options.entitlements);

    let cd_input = CodeDirectoryInput {
        identifier: options.identifier,
        code_limit,
        page_size_exponent: DEFAULT_PAGE_SIZE_EXPONENT,
        code_hashes: &code_hashes,
        special_hashes: &special_hashes,
        flags: CS_ADHOC | CS_GET_TASK_ALLOW,
    };
    let code_directory = CodeDirectoryBuilder::build(&cd_input)?;

    let cms = SignatureSigner::sign(&code_directory, identity)?;
    log::trace!(
        "CMS signature blob ({} bytes, base64): {}",
        cms.len(),
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &cms)
    );

    let mut entries = vec![BlobEntry::code_directory(code_directory)];
    if let Some(entitlements) = options.entitlements {
        entries.push(BlobEntry::entitlements(entitlements.to_vec()));
    }
    entries.push(BlobEntry::cms_signature(cms));

    let super_blob = SuperBlobBuilder::build(entries);
    BinaryRewriter::rewrite(working_ref, &model, &super_blob)
}
