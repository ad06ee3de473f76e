// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The crate-wide error taxonomy.
//!
//! [`SigningError`] is the closed set of failures the Mach-O signing engine
//! can produce. [`AppError`] wraps it for the ambient layers (archive
//! handling, identity loading, plist editing, CLI) so callers who only care
//! about the core can still match on [`SigningError`] through
//! [`AppError::Signing`].

use thiserror::Error;

/// Errors produced by the core Mach-O parsing and signing engine.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("truncated input: attempted to read past end of buffer ({context})")]
    TruncatedInput { context: String },

    #[error("malformed Mach-O: {reason}")]
    MalformedMachO { reason: String },

    #[error("universal binary contains no slice for a supported architecture")]
    NoSuitableArch,

    #[error("__LINKEDIT segment is not the last file-resident segment")]
    LinkeditNotLast,

    #[error("insufficient free space before the first section to add a load command")]
    NoRoomForLoadCommand,

    #[error("unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    #[error("new signature ({new} bytes) does not fit in the existing region ({available} bytes)")]
    SignatureLargerThanAvailable { new: usize, available: usize },

    #[error("cryptographic operation failed: {reason}")]
    CryptoFailure { reason: String },

    #[error("the binary has no __LINKEDIT segment; signing requires one")]
    MissingLinkedit,

    #[error("no binary identifier was supplied for the CodeDirectory")]
    NoIdentifier,
}

impl SigningError {
    pub(crate) fn truncated(context: impl Into<String>) -> Self {
        SigningError::TruncatedInput {
            context: context.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SigningError::MalformedMachO {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the ambient layers wrapping the core engine.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("plist error: {0}")]
    Plist(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
pub type SigningResult<T> = std::result::Result<T, SigningError>;
