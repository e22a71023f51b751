// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while compiling a snippet.

use std::fmt;

/// Which stage rejected the snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundErrorKind {
    /// Lexing or parsing failed
    Parse,
    /// Unknown names, shape mismatches, unassigned outputs
    Type,
    /// Valid code with no data-flow equivalent
    Unsupported,
}

impl fmt::Display for CompoundErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parse => "parse error",
            Self::Type => "type error",
            Self::Unsupported => "unsupported construct",
        })
    }
}

/// A snippet compilation failure located at a byte offset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at byte {offset}: {message}")]
pub struct CompoundError {
    /// Failing stage
    pub kind: CompoundErrorKind,
    /// Byte offset into the snippet text
    pub offset: usize,
    /// Description
    pub message: String,
}

impl CompoundError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self { kind: CompoundErrorKind::Parse, offset, message: message.into() }
    }

    pub(crate) fn type_error(offset: usize, message: impl Into<String>) -> Self {
        Self { kind: CompoundErrorKind::Type, offset, message: message.into() }
    }

    pub(crate) fn unsupported(offset: usize, message: impl Into<String>) -> Self {
        Self { kind: CompoundErrorKind::Unsupported, offset, message: message.into() }
    }
}
