/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Persistence for script object graphs: subroutines, data containers and
//! suspended processes, saved as binary object files or as assembler
//! listings.
#[macro_use]
pub mod utils;
pub mod error;
pub mod options;
pub mod snapshot;
pub mod vm;

pub use error::{Error, Result};
