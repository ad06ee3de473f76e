// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Expands an `.ipa` (a zip file) to a working directory and rebuilds one
//! from a directory tree, per §4.12. Neither direction interprets bundle
//! structure — that's [`crate::bundle::BundleWalker`]'s job once the tree
//! is on disk.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{AppError, Result};

/// An IPA expanded onto disk. Dropping this does not clean up the
/// directory; callers that want automatic cleanup should root `root` in a
/// [`tempfile::TempDir`] and keep that handle alive alongside this value.
pub struct IpaArchive {
    root: PathBuf,
}

impl IpaArchive {
    /// Expands `ipa_path` into `dest_dir`, which must already exist and be
    /// empty. Preserves each entry's Unix permission bits (so executables
    /// stay executable) and modification time.
    pub fn expand(ipa_path: &Path, dest_dir: &Path) -> Result<Self> {
        let file = File::open(ipa_path).map_err(AppError::Io)?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| AppError::Archive(format!("{} is not a valid zip archive: {e}", ipa_path.display())))?;

        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| AppError::Archive(format!("failed reading zip entry {index}: {e}")))?;

            let relative = match entry.enclosed_name() {
                Some(path) => path,
                None => {
                    log::warn!("skipping zip entry with unsafe path: {:?}", entry.name());
                    continue;
                }
            };
            let out_path = dest_dir.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(AppError::Io)?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(AppError::Io)?;
            }

            let mut out_file = File::create(&out_path).map_err(AppError::Io)?;
            io::copy(&mut entry, &mut out_file).map_err(AppError::Io)?;
            drop(out_file);

            apply_unix_mode(&out_path, entry.unix_mode());
            if let Some(mtime) = zip_datetime_to_filetime(entry.last_modified()) {
                let _ = filetime::set_file_mtime(&out_path, mtime);
            }
        }

        let payload = dest_dir.join("Payload");
        let has_app = glob::glob(&payload.join("*.app").to_string_lossy())
            .map_err(|e| AppError::Archive(format!("invalid bundle glob pattern: {e}")))?
            .filter_map(std::result::Result::ok)
            .next()
            .is_some();
        if !has_app {
            return Err(AppError::Archive(format!(
                "{} contains no Payload/*.app bundle",
                ipa_path.display()
            )));
        }

        Ok(IpaArchive {
            root: dest_dir.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rebuilds a zip archive at `output_path` from the current contents of
    /// [`Self::root`]. Entries are written in sorted relative-path order
    /// (independent of host path-separator conventions) so repeated runs on
    /// an unmodified tree are byte-stable modulo the signature's own CMS
    /// randomness.
    pub fn rebuild(&self, output_path: &Path) -> Result<()> {
        let mut relative_paths: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .expect("walkdir entries are rooted under self.root")
                    .to_path_buf()
            })
            .collect();
        relative_paths.sort();

        let out_file = File::create(output_path).map_err(AppError::Io)?;
        let mut writer = ZipWriter::new(out_file);
        let base_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for relative in relative_paths {
            let absolute = self.root.join(&relative);
            let unix_mode = unix_mode_of(&absolute);
            let name = zip_entry_name(&relative);

            let options = match unix_mode {
                Some(mode) => base_options.unix_permissions(mode),
                None => base_options,
            };
            writer
                .start_file(name, options)
                .map_err(|e| AppError::Archive(format!("failed starting zip entry: {e}")))?;

            let data = fs::read(&absolute).map_err(AppError::Io)?;
            writer.write_all(&data).map_err(AppError::Io)?;
        }

        writer
            .finish()
            .map_err(|e| AppError::Archive(format!("failed finalizing zip archive: {e}")))?;
        Ok(())
    }
}

/// Joins a relative path's components with `/`, regardless of the host's
/// native separator, matching the zip format's on-disk convention.
fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
    }
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) {}

#[cfg(unix)]
fn unix_mode_of(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|m| m.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode_of(_path: &Path) -> Option<u32> {
    None
}

/// Converts a zip entry's DOS-era timestamp to a [`FileTime`], returning
/// `None` for the handful of dates the DOS format cannot represent (years
/// before 1980).
fn zip_datetime_to_filetime(dt: zip::DateTime) -> Option<FileTime> {
    let naive = chrono::NaiveDate::from_ymd_opt(dt.year() as i32, dt.month() as u32, dt.day() as u32)?
        .and_hms_opt(dt.hour() as u32, dt.minute() as u32, dt.second() as u32)?;
    Some(FileTime::from_unix_time(naive.and_utc().timestamp(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_test_ipa(path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("Payload/Test.app/Test", options).unwrap();
        zip.write_all(b"fake-macho-bytes").unwrap();
        zip.start_file("Payload/Test.app/Info.plist", options)
            .unwrap();
        zip.write_all(b"<plist/>").unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn expand_finds_payload_app() {
        let tmp = tempfile::tempdir().unwrap();
        let ipa_path = tmp.path().join("test.ipa");
        write_test_ipa(&ipa_path);

        let dest = tmp.path().join("expanded");
        fs::create_dir_all(&dest).unwrap();
        let archive = IpaArchive::expand(&ipa_path, &dest).unwrap();

        assert!(archive.root().join("Payload/Test.app/Test").exists());
        assert!(archive.root().join("Payload/Test.app/Info.plist").exists());
    }

    #[test]
    fn expand_rejects_archive_without_app_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let ipa_path = tmp.path().join("empty.ipa");
        let file = File::create(&ipa_path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file(
            "README.txt",
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )
        .unwrap();
        zip.write_all(b"not an app").unwrap();
        zip.finish().unwrap();

        let dest = tmp.path().join("expanded");
        fs::create_dir_all(&dest).unwrap();
        let err = IpaArchive::expand(&ipa_path, &dest).unwrap_err();
        assert!(matches!(err, AppError::Archive(_)));
    }

    #[test]
    fn rebuild_produces_readable_zip_with_same_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let ipa_path = tmp.path().join("test.ipa");
        write_test_ipa(&ipa_path);

        let dest = tmp.path().join("expanded");
        fs::create_dir_all(&dest).unwrap();
        let archive = IpaArchive::expand(&ipa_path, &dest).unwrap();

        let rebuilt_path = tmp.path().join("rebuilt.ipa");
        archive.rebuild(&rebuilt_path).unwrap();

        let file = File::open(&rebuilt_path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let mut names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["Payload/Test.app/Info.plist", "Payload/Test.app/Test"]
        );
    }
}
