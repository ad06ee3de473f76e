// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rewrites the identifying keys of an `Info.plist`, preserving whichever
//! of the binary or XML plist encodings the file already used, per §4.13.

use std::fs;
use std::path::Path;

use plist::Value;

use crate::error::{AppError, Result};

const BINARY_MAGIC: &[u8] = b"bplist00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlistEncoding {
    Binary,
    Xml,
}

/// Optional rewrites to apply to `Info.plist`. Any field left `None` is
/// passed through untouched.
#[derive(Debug, Default, Clone)]
pub struct PlistEdits {
    pub bundle_identifier: Option<String>,
    pub bundle_display_name: Option<String>,
}

pub struct InfoPlistEditor;

impl InfoPlistEditor {
    /// Applies `edits` to the plist at `path` in place. If `edits` is empty
    /// the file is left untouched (not even re-serialized), so a no-op
    /// signing run doesn't perturb file bytes of bundles it didn't change.
    pub fn apply(path: &Path, edits: &PlistEdits) -> Result<()> {
        if edits.bundle_identifier.is_none() && edits.bundle_display_name.is_none() {
            return Ok(());
        }

        let raw = fs::read(path).map_err(AppError::Io)?;
        let encoding = detect_encoding(&raw);

        let mut value = Value::from_reader(std::io::Cursor::new(&raw))
            .map_err(|e| AppError::Plist(format!("failed parsing {}: {e}", path.display())))?;

        let dict = value
            .as_dictionary_mut()
            .ok_or_else(|| AppError::Plist(format!("{} is not a plist dictionary", path.display())))?;

        if let Some(identifier) = &edits.bundle_identifier {
            dict.insert(
                "CFBundleIdentifier".to_string(),
                Value::String(identifier.clone()),
            );
        }
        if let Some(display_name) = &edits.bundle_display_name {
            dict.insert(
                "CFBundleDisplayName".to_string(),
                Value::String(display_name.clone()),
            );
        }

        write_with_encoding(path, &value, encoding)
    }

    /// Reads `CFBundleIdentifier` without mutating anything, for callers
    /// that need to know the current value (e.g. to default `--identifier`
    /// on the signing CLI when the caller didn't supply one explicitly).
    pub fn read_bundle_identifier(path: &Path) -> Result<Option<String>> {
        let raw = fs::read(path).map_err(AppError::Io)?;
        let value = Value::from_reader(std::io::Cursor::new(&raw))
            .map_err(|e| AppError::Plist(format!("failed parsing {}: {e}", path.display())))?;
        Ok(value
            .as_dictionary()
            .and_then(|dict| dict.get("CFBundleIdentifier"))
            .and_then(|v| v.as_string())
            .map(str::to_string))
    }
}

fn detect_encoding(raw: &[u8]) -> PlistEncoding {
    if raw.starts_with(BINARY_MAGIC) {
        PlistEncoding::Binary
    } else {
        PlistEncoding::Xml
    }
}

fn write_with_encoding(path: &Path, value: &Value, encoding: PlistEncoding) -> Result<()> {
    let file = fs::File::create(path).map_err(AppError::Io)?;
    let result = match encoding {
        PlistEncoding::Binary => value.to_writer_binary(file),
        PlistEncoding::Xml => value.to_writer_xml(file),
    };
    result.map_err(|e| AppError::Plist(format!("failed writing {}: {e}", path.display())))
}
