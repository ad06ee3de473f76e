// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mach-O parsing and the byte-level structures of the embedded code
//! signature: fat-binary slice selection, the header/load-command/segment
//! model, page hashing, the CodeDirectory, and the SuperBlob container.
//!
//! This module only reads and describes a Mach-O file. The transformations
//! that produce a new, signed byte buffer live in [`crate::signing`].

pub mod code_directory;
pub mod constants;
pub mod fat;
pub mod header;
pub mod load_command;
pub mod model;
pub mod page_hash;
pub mod segment;
pub mod super_blob;

#[cfg(test)]
pub mod test_support;

pub use code_directory::CodeDirectoryBuilder;
pub use fat::select_slice;
pub use header::MachHeader;
pub use model::MachOModel;
pub use page_hash::page_hashes;
pub use super_blob::{BlobEntry, SuperBlobBuilder};
