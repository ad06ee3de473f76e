// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line surface, per §4.15/§6.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::SignConfigOverlay;

#[derive(Parser, Debug)]
#[command(name = "ipa-resign", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Increase verbosity (-v for debug output, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to an optional `ipa-resign.toml` config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-sign an IPA with a PKCS#12 identity
    Sign(SignArgs),
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Path to the input .ipa
    #[arg(long)]
    pub ipa: Option<PathBuf>,

    /// Path to write the resigned .ipa
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Path to the PKCS#12 (.p12/.pfx) identity
    #[arg(long)]
    pub p12: Option<PathBuf>,

    /// PKCS#12 passphrase (prefer --p12-password-file; this is visible in
    /// shell history and process listings)
    #[arg(long, conflicts_with = "p12_password_file")]
    pub p12_password: Option<String>,

    /// Path to a file containing the PKCS#12 passphrase
    #[arg(long, conflicts_with = "p12_password")]
    pub p12_password_file: Option<PathBuf>,

    /// Override CFBundleIdentifier (and the CodeDirectory identifier)
    #[arg(long)]
    pub identifier: Option<String>,

    /// Path to an entitlements plist to embed as a special slot
    #[arg(long)]
    pub entitlements: Option<PathBuf>,

    /// Path to a .mobileprovision to stamp into the bundle
    #[arg(long)]
    pub provisioning_profile: Option<PathBuf>,

    /// Path to a dylib to inject into the main executable before signing
    #[arg(long)]
    pub inject_dylib: Option<PathBuf>,

    /// Inject as LC_LOAD_WEAK_DYLIB instead of LC_LOAD_DYLIB
    #[arg(long, requires = "inject_dylib")]
    pub weak: bool,
}

impl SignArgs {
    pub fn into_overlay(self) -> SignConfigOverlay {
        SignConfigOverlay {
            ipa: self.ipa,
            output: self.output,
            p12: self.p12,
            p12_password_file: self.p12_password_file,
            identifier: self.identifier,
            entitlements: self.entitlements,
            provisioning_profile: self.provisioning_profile,
            inject_dylib: self.inject_dylib,
            weak_dylib: self.weak.then_some(true),
        }
    }
}

/// Maps `-v`/`-vv` onto `log`'s level filter; zero occurrences keeps the
/// `env_logger` default (warnings and above, or `RUST_LOG` if set).
pub fn verbosity_to_level_filter(count: u8) -> Option<log::LevelFilter> {
    match count {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}
