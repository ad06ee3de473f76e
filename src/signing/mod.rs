// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transformations that turn a parsed [`crate::macho::MachOModel`] into
//! a new, signed byte buffer: computing and embedding a code signature
//! ([`rewriter`], [`signer`]) and injecting a dylib load command
//! ([`dylib`]).

pub mod dylib;
pub mod engine;
pub mod rewriter;
pub mod signer;

pub use dylib::DylibInjector;
pub use engine::{sign_macho_slice, SignOptions};
pub use rewriter::BinaryRewriter;
pub use signer::{SignatureSigner, SigningIdentity};
