// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The end-to-end orchestration for re-signing one IPA: expand the
//! archive, walk the bundle, apply the optional mutations, sign each
//! executable, rebuild the archive. See §2's "Dataflow for re-signing one
//! IPA".

use std::fs;
use std::path::Path;

use uuid::Uuid;

use crate::archive::IpaArchive;
use crate::bundle::BundleWalker;
use crate::config::SignConfig;
use crate::error::{AppError, Result};
use crate::identity::IdentityLoader;
use crate::macho::select_slice;
use crate::plist_editor::{InfoPlistEditor, PlistEdits};
use crate::provisioning::ProvisioningStamper;
use crate::signing::{sign_macho_slice, SignOptions, SigningIdentity};

/// Runs one full re-signing pass described by `config`, reading the
/// passphrase from wherever the caller already resolved it (the CLI layer
/// owns the password-file-vs-prompt decision; this function just wants the
/// final string).
pub fn run_sign(config: &SignConfig, p12_password: &str) -> Result<()> {
    let run_id = Uuid::new_v4();
    log::info!("starting signing run {run_id} for {}", config.ipa.display());

    let pkcs12_bytes = fs::read(&config.p12).map_err(AppError::Io)?;
    let identity = IdentityLoader::load(&pkcs12_bytes, p12_password)?;

    let workdir = tempfile::tempdir().map_err(AppError::Io)?;
    let expand_dir = workdir.path().join("expanded");
    fs::create_dir_all(&expand_dir).map_err(AppError::Io)?;

    let archive = IpaArchive::expand(&config.ipa, &expand_dir)?;
    let bundle = BundleWalker::discover(archive.root())?;

    if let Some(profile_path) = &config.provisioning_profile {
        log::info!("stamping provisioning profile from {}", profile_path.display());
        ProvisioningStamper::stamp(&bundle.app_dir, profile_path)?;
    }

    let info_plist_path = bundle.app_dir.join("Info.plist");
    if config.identifier.is_some() && info_plist_path.is_file() {
        InfoPlistEditor::apply(
            &info_plist_path,
            &PlistEdits {
                bundle_identifier: config.identifier.clone(),
                bundle_display_name: None,
            },
        )?;
    }

    let identifier = resolve_identifier(config, &info_plist_path)?;
    let entitlements = match &config.entitlements {
        Some(path) => Some(fs::read(path).map_err(AppError::Io)?),
        None => None,
    };

    for executable in BundleWalker::executables(&bundle) {
        let result = sign_one_executable(
            &executable.path,
            &identity,
            &identifier,
            entitlements.as_deref(),
            config.inject_dylib.as_deref(),
            config.weak_dylib,
            executable.is_main,
        );

        match (executable.is_main, result) {
            (_, Ok(())) => {
                log::info!("signed {}", executable.path.display());
            }
            (true, Err(err)) => return Err(err),
            (false, Err(err)) => {
                log::warn!(
                    "skipping {} after signing failure: {err}",
                    executable.path.display()
                );
            }
        }
    }

    archive.rebuild(&config.output)?;
    log::info!("wrote resigned archive to {}", config.output.display());
    Ok(())
}

fn resolve_identifier(config: &SignConfig, info_plist_path: &Path) -> Result<String> {
    if let Some(identifier) = &config.identifier {
        return Ok(identifier.clone());
    }
    if info_plist_path.is_file() {
        if let Some(identifier) = InfoPlistEditor::read_bundle_identifier(info_plist_path)? {
            return Ok(identifier);
        }
    }
    Err(AppError::Config(
        "no --identifier given and Info.plist has no CFBundleIdentifier".to_string(),
    ))
}

#[allow(clippy::too_many_arguments)]
fn sign_one_executable(
    path: &Path,
    identity: &SigningIdentity,
    identifier: &str,
    entitlements: Option<&[u8]>,
    inject_dylib: Option<&Path>,
    weak_dylib: bool,
    is_main: bool,
) -> Result<()> {
    let original = fs::read(path).map_err(AppError::Io)?;
    let slice = select_slice(&original)?;

    let dylib_path_string = inject_dylib
        .filter(|_| is_main)
        .map(|p| p.to_string_lossy().into_owned());
    let options = SignOptions {
        identifier,
        entitlements,
        inject_dylib: dylib_path_string.as_deref().map(|p| (p, weak_dylib)),
    };

    let signed = sign_macho_slice(slice, identity, &options)?;
    fs::write(path, signed).map_err(AppError::Io)?;
    Ok(())
}
