// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layered configuration for the `sign` operation: CLI flags win over
//! `IPARESIGN_`-prefixed environment variables, which win over an optional
//! `ipa-resign.toml` file's `[sign]` table, per §4.15/§6.

use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Fully resolved settings for one `sign` invocation. Every field here is
/// either required on the CLI or has a sensible figment-level default, so
/// by the time [`SignConfig::resolve`] returns, no further prompting is
/// needed except for the password, which is handled at the CLI boundary
/// and never layered through config providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignConfig {
    pub ipa: PathBuf,
    pub output: PathBuf,
    pub p12: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p12_password_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_profile: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inject_dylib: Option<PathBuf>,
    #[serde(default)]
    pub weak_dylib: bool,
}

/// The overlay a CLI invocation contributes; every field is optional here
/// because an unset flag should fall through to env/file/default rather
/// than overwrite a lower layer with `None`.
#[derive(Debug, Default, Serialize)]
pub struct SignConfigOverlay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipa: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p12: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p12_password_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_profile: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inject_dylib: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weak_dylib: Option<bool>,
}

impl SignConfig {
    /// Merges, highest precedence first: `overlay` (CLI flags actually
    /// passed), `IPARESIGN_*` environment variables, an optional
    /// `config_path` TOML file's `[sign]` table.
    pub fn resolve(overlay: &SignConfigOverlay, config_path: Option<&std::path::Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            if path.is_file() {
                figment = figment.merge(Toml::file(path).nested());
            }
        }

        figment = figment
            .merge(Env::prefixed("IPARESIGN_").map(|key| key.as_str().replace('-', "_").into()))
            .merge(Serialized::defaults(overlay))
            .select("sign");

        figment
            .extract()
            .map_err(|e| AppError::Config(format!("failed resolving configuration: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_wins_over_env_and_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("IPARESIGN_IPA", "/env/app.ipa");
            jail.set_env("IPARESIGN_OUTPUT", "/env/out.ipa");
            jail.set_env("IPARESIGN_P12", "/env/identity.p12");

            let overlay = SignConfigOverlay {
                ipa: Some(PathBuf::from("/cli/app.ipa")),
                ..Default::default()
            };

            let config = SignConfig::resolve(&overlay, None).unwrap();
            assert_eq!(config.ipa, PathBuf::from("/cli/app.ipa"));
            assert_eq!(config.output, PathBuf::from("/env/out.ipa"));
            assert_eq!(config.p12, PathBuf::from("/env/identity.p12"));
            Ok(())
        });
    }

    #[test]
    fn file_layer_is_lowest_precedence() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "ipa-resign.toml",
                r#"
                [sign]
                ipa = "/file/app.ipa"
                output = "/file/out.ipa"
                p12 = "/file/identity.p12"
                identifier = "com.example.file"
                "#,
            )?;
            jail.set_env("IPARESIGN_IDENTIFIER", "com.example.env");

            let overlay = SignConfigOverlay::default();
            let config =
                SignConfig::resolve(&overlay, Some(&jail.directory().join("ipa-resign.toml"))).unwrap();

            assert_eq!(config.ipa, PathBuf::from("/file/app.ipa"));
            assert_eq!(config.identifier, Some("com.example.env".to_string()));
            Ok(())
        });
    }

    #[test]
    fn missing_required_field_is_a_config_error() {
        figment::Jail::expect_with(|jail| {
            let _ = jail;
            let overlay = SignConfigOverlay::default();
            let err = SignConfig::resolve(&overlay, None).unwrap_err();
            assert!(matches!(err, AppError::Config(_)));
            Ok(())
        });
    }
}
