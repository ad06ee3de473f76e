// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use ipa_resign::cli::{verbosity_to_level_filter, CliArgs, Commands};
use ipa_resign::config::SignConfig;
use ipa_resign::error::AppError;
use ipa_resign::pipeline::run_sign;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = verbosity_to_level_filter(args.verbose) {
        builder.filter_level(level);
    }
    builder.init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> ipa_resign::error::Result<()> {
    let config_path = args.config.clone();
    match args.command {
        Commands::Sign(sign_args) => {
            let password = resolve_password(&sign_args)?;
            let overlay = sign_args.into_overlay();
            let config = SignConfig::resolve(&overlay, config_path.as_deref())?;
            run_sign(&config, &password)
        }
    }
}

/// Resolves the PKCS#12 passphrase: an explicit `--p12-password`, else the
/// contents of `--p12-password-file`, else an interactive prompt. Never
/// logged, never round-tripped through the config layering.
fn resolve_password(sign_args: &ipa_resign::cli::SignArgs) -> ipa_resign::error::Result<String> {
    if let Some(password) = &sign_args.p12_password {
        return Ok(password.clone());
    }
    if let Some(path) = &sign_args.p12_password_file {
        let contents = fs::read_to_string(path).map_err(AppError::Io)?;
        return Ok(contents.trim_end_matches(['\r', '\n']).to_string());
    }
    dialoguer::Password::new()
        .with_prompt("PKCS#12 passphrase")
        .interact()
        .map_err(|e| AppError::Config(format!("failed reading passphrase: {e}")))
}
