// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Locates the executables inside an expanded `.app` bundle: the main
//! executable, nested framework/plugin executables, and any embedded
//! provisioning profile, per §4.11.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// One executable discovered inside a bundle, along with whether it's the
/// bundle's main executable (always fatal to fail) or a nested
/// framework/plugin executable (skipped with a warning on failure).
pub struct BundleExecutable {
    pub path: PathBuf,
    pub is_main: bool,
}

pub struct Bundle {
    pub app_dir: PathBuf,
    pub main_executable: PathBuf,
    pub nested_executables: Vec<PathBuf>,
    pub provisioning_profile: Option<PathBuf>,
}

pub struct BundleWalker;

impl BundleWalker {
    /// Finds the single `Payload/*.app` directory under `ipa_root` and
    /// walks it. Fails with [`AppError::Archive`] if there isn't exactly
    /// one `.app` bundle.
    pub fn discover(ipa_root: &Path) -> Result<Bundle> {
        let pattern = ipa_root.join("Payload").join("*.app");
        let mut matches: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| AppError::Archive(format!("invalid bundle glob pattern: {e}")))?
            .filter_map(std::result::Result::ok)
            .collect();

        let app_dir = match matches.len() {
            0 => {
                return Err(AppError::Archive(
                    "no Payload/*.app bundle found in archive".to_string(),
                ))
            }
            1 => matches.remove(0),
            n => {
                return Err(AppError::Archive(format!(
                    "expected exactly one Payload/*.app bundle, found {n}"
                )))
            }
        };

        Self::walk(&app_dir)
    }

    /// Walks an already-located `.app` directory.
    pub fn walk(app_dir: &Path) -> Result<Bundle> {
        let bundle_name = app_dir
            .file_stem()
            .ok_or_else(|| AppError::Archive(format!("bundle path {} has no name", app_dir.display())))?
            .to_string_lossy()
            .into_owned();

        let main_executable = app_dir.join(&bundle_name);
        if !is_probably_macho(&main_executable) {
            return Err(AppError::Archive(format!(
                "main executable {} is missing or not a Mach-O file",
                main_executable.display()
            )));
        }

        let mut nested_executables = Vec::new();
        for (container_glob, extension) in [("Frameworks/*.framework", None), ("PlugIns/*.appex", None)] {
            let pattern = app_dir.join(container_glob);
            let entries = glob::glob(&pattern.to_string_lossy())
                .map_err(|e| AppError::Archive(format!("invalid nested bundle glob: {e}")))?;
            for container in entries.filter_map(std::result::Result::ok) {
                let _ = extension;
                if let Some(exe) = nested_executable_path(&container) {
                    if is_probably_macho(&exe) {
                        nested_executables.push(exe);
                    } else {
                        log::warn!(
                            "skipping {}: not a Mach-O executable",
                            exe.display()
                        );
                    }
                }
            }
        }

        let provisioning_profile = {
            let candidate = app_dir.join("embedded.mobileprovision");
            candidate.is_file().then_some(candidate)
        };

        Ok(Bundle {
            app_dir: app_dir.to_path_buf(),
            main_executable,
            nested_executables,
            provisioning_profile,
        })
    }

    /// All executables in the order they should be signed: main last, so
    /// frameworks and plugins are already final by the time the main
    /// executable (which may embed a dylib load command referencing them)
    /// is itself signed.
    pub fn executables(bundle: &Bundle) -> Vec<BundleExecutable> {
        let mut out: Vec<BundleExecutable> = bundle
            .nested_executables
            .iter()
            .map(|path| BundleExecutable {
                path: path.clone(),
                is_main: false,
            })
            .collect();
        out.push(BundleExecutable {
            path: bundle.main_executable.clone(),
            is_main: true,
        });
        out
    }
}

/// A `.framework` directory's executable shares the bundle's name, sans
/// extension; a `.appex` plugin follows the same convention.
fn nested_executable_path(container: &Path) -> Option<PathBuf> {
    let name = container.file_stem()?.to_string_lossy().into_owned();
    Some(container.join(name))
}

/// Sniffs the first four bytes for a Mach-O or fat magic; cheaper than a
/// full parse and good enough to decide whether to attempt signing at all.
fn is_probably_macho(path: &Path) -> bool {
    let Ok(bytes) = fs::read(path) else {
        return false;
    };
    if bytes.len() < 4 {
        return false;
    }
    let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    matches!(
        magic,
        0xfeedface | 0xcefaedfe | 0xfeedfacf | 0xcffaedfe | 0xcafebabe | 0xbebafeca | 0xcafebabf | 0xbfbafeca
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self as stdfs, File};
    use std::io::Write;

    fn write_macho(path: &Path) {
        if let Some(parent) = path.parent() {
            stdfs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(&0xfeedfacfu32.to_le_bytes()).unwrap();
        file.write_all(&[0u8; 60]).unwrap();
    }

    #[test]
    fn walks_main_executable_and_frameworks() {
        let tmp = tempfile::tempdir().unwrap();
        let app_dir = tmp.path().join("Payload/Demo.app");
        write_macho(&app_dir.join("Demo"));
        write_macho(&app_dir.join("Frameworks/Widget.framework/Widget"));
        stdfs::write(app_dir.join("embedded.mobileprovision"), b"profile").unwrap();

        let bundle = BundleWalker::walk(&app_dir).unwrap();
        assert_eq!(bundle.main_executable, app_dir.join("Demo"));
        assert_eq!(bundle.nested_executables.len(), 1);
        assert!(bundle.provisioning_profile.is_some());

        let all = BundleWalker::executables(&bundle);
        assert_eq!(all.len(), 2);
        assert!(all.last().unwrap().is_main);
    }

    #[test]
    fn missing_main_executable_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let app_dir = tmp.path().join("Payload/Empty.app");
        stdfs::create_dir_all(&app_dir).unwrap();

        let err = BundleWalker::walk(&app_dir).unwrap_err();
        assert!(matches!(err, AppError::Archive(_)));
    }

    #[test]
    fn malformed_framework_executable_is_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let app_dir = tmp.path().join("Payload/Demo.app");
        write_macho(&app_dir.join("Demo"));
        stdfs::create_dir_all(app_dir.join("Frameworks/Broken.framework")).unwrap();
        stdfs::write(app_dir.join("Frameworks/Broken.framework/Broken"), b"not-macho").unwrap();

        let bundle = BundleWalker::walk(&app_dir).unwrap();
        assert!(bundle.nested_executables.is_empty());
    }
}
