/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Error type shared by every save and load path.
//!
//! All operations are all-or-nothing: an error aborts the whole request and
//! whatever was written or loaded so far must be discarded.

use std::{fmt, io};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The save context cannot represent this object or value.
    #[error("operation not supported: {what}")]
    Unsupported { what: &'static str },

    /// Underlying stream failure, including truncated input.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("formatting error")]
    Fmt(#[from] fmt::Error),

    /// Object file does not start with the expected signature.
    #[error("invalid object file signature")]
    BadMagic,

    #[error("unsupported object file version {0}")]
    UnsupportedVersion(u32),

    /// Structurally invalid record content.
    #[error("invalid object file: {0}")]
    Format(String),

    /// A process violates its stack invariants and cannot be saved.
    #[error("inconsistent process '{name}': {reason}")]
    InvalidProcess { name: String, reason: String },
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// True if this error was caused by the input ending early.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
