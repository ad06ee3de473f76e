// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stamps a caller-supplied provisioning profile into a bundle, per §4.14.
//! The profile is an opaque CMS-wrapped plist blob; this crate copies it
//! byte for byte and never parses its contents.

use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};

const EMBEDDED_PROFILE_NAME: &str = "embedded.mobileprovision";

pub struct ProvisioningStamper;

impl ProvisioningStamper {
    /// Copies `profile_path` to `<app_dir>/embedded.mobileprovision`,
    /// overwriting any existing profile.
    pub fn stamp(app_dir: &Path, profile_path: &Path) -> Result<()> {
        let bytes = fs::read(profile_path).map_err(AppError::Io)?;
        if bytes.is_empty() {
            return Err(AppError::Archive(format!(
                "provisioning profile {} is empty",
                profile_path.display()
            )));
        }
        let dest = app_dir.join(EMBEDDED_PROFILE_NAME);
        fs::write(&dest, &bytes).map_err(AppError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_profile_to_embedded_name() {
        let tmp = tempfile::tempdir().unwrap();
        let app_dir = tmp.path().join("Demo.app");
        fs::create_dir_all(&app_dir).unwrap();

        let profile_path = tmp.path().join("my.mobileprovision");
        fs::write(&profile_path, b"cms-wrapped-plist-bytes").unwrap();

        ProvisioningStamper::stamp(&app_dir, &profile_path).unwrap();

        let embedded = app_dir.join(EMBEDDED_PROFILE_NAME);
        assert_eq!(fs::read(&embedded).unwrap(), b"cms-wrapped-plist-bytes");
    }

    #[test]
    fn rejects_empty_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let app_dir = tmp.path().join("Demo.app");
        fs::create_dir_all(&app_dir).unwrap();

        let profile_path = tmp.path().join("empty.mobileprovision");
        fs::write(&profile_path, b"").unwrap();

        let err = ProvisioningStamper::stamp(&app_dir, &profile_path).unwrap_err();
        assert!(matches!(err, AppError::Archive(_)));
    }

    #[test]
    fn overwrites_existing_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let app_dir = tmp.path().join("Demo.app");
        fs::create_dir_all(&app_dir).unwrap();
        fs::write(app_dir.join(EMBEDDED_PROFILE_NAME), b"old").unwrap();

        let profile_path = tmp.path().join("new.mobileprovision");
        fs::write(&profile_path, b"new-bytes").unwrap();

        ProvisioningStamper::stamp(&app_dir, &profile_path).unwrap();

        assert_eq!(
            fs::read(app_dir.join(EMBEDDED_PROFILE_NAME)).unwrap(),
            b"new-bytes"
        );
    }
}
