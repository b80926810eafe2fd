// Copyright (c) 2013-2015 Sandstorm Development Group, Inc. and contributors
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! # Capstone runtime
//!
//! Lazy, zero-copy readers for messages in the
//! [Cap'n Proto encoding](https://capnproto.org/encoding.html).
//!
//! A message is framed off a byte stream by [`serialize`] into a set of
//! segments. Reading starts from a [`message::Session`], which owns the
//! traversal budget for every reader derived from it:
//!
//! ```no_run
//! # fn main() -> capstone_runtime::Result<()> {
//! use capstone_runtime::{message, serialize, StructReader};
//!
//! let mut stdin = std::io::stdin().lock();
//! let message = serialize::read_message(&mut stdin, message::ReaderOptions::new())?;
//! let session = message.session();
//! let root: StructReader = session.get_root()?.get_as()?;
//! let id = root.read_data::<u64>(0, 0);
//! # let _ = id;
//! # Ok(())
//! # }
//! ```
//!
//! Data fields never fail: reading past the end of a struct's data section
//! yields the field's default. Structural problems (bad pointers, exhausted
//! budgets) are reported as [`Error`]s from the traversal that hit them.

pub mod any_pointer;
pub mod any_pointer_list;
pub mod message;
pub mod pointer;
pub mod primitive_list;
pub mod serialize;
pub mod struct_list;
pub mod traits;

#[doc(hidden)]
pub mod private;

pub use crate::private::arena::SegmentSlice;
pub use crate::private::layout::{ListReader, NullReader, StructReader};
pub use crate::private::units::{WordIndex, WordRange};

use crate::pointer::{ElementSize, PointerKind};

/// Eight bytes of memory, the addressable unit of a message. Segments hold
/// words already converted from their little-endian wire representation.
pub type Word = u64;

/// Number of words reachable from a struct, as reported by
/// [`StructReader::total_size`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageSize {
    pub word_count: u64,
}

impl MessageSize {
    pub fn plus_eq(&mut self, other: MessageSize) {
        self.word_count += other.word_count;
    }
}

/// Because messages are lazily validated, the return type of any method that reads a pointer
/// field must be wrapped in a Result.
pub type Result<T> = ::core::result::Result<T, Error>;

/// Describes an arbitrary error that prevented an operation from completing.
#[derive(Debug, Clone)]
pub struct Error {
    /// The general kind of the error.
    pub kind: ErrorKind,

    /// Extra context about the error, such as where in the message it happened.
    pub extra: String,
}

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            extra: String::new(),
        }
    }

    pub fn failed(description: String) -> Self {
        Self {
            kind: ErrorKind::Failed,
            extra: description,
        }
    }

    /// Attaches extra context to this error.
    pub fn context(mut self, extra: impl Into<String>) -> Self {
        let extra = extra.into();
        if self.extra.is_empty() {
            self.extra = extra;
        } else {
            self.extra = format!("{extra}: {}", self.extra);
        }
        self
    }
}

/// The kinds of errors that can occur while framing or decoding a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The low two bits of a word did not carry the pointer tag the reader required.
    #[error("expected a {expected:?} pointer, found a {found:?} pointer")]
    TypeTagMismatch {
        expected: PointerKind,
        found: PointerKind,
    },

    /// A pointer resolved to a location outside of its segment.
    #[error("pointer target {target} is outside segment {segment_id} of {segment_len} words")]
    PointerOffsetOutOfRange {
        segment_id: u32,
        target: i64,
        segment_len: usize,
    },

    /// A list's element size did not match the list reader being constructed.
    #[error("expected a list of {expected:?} elements, found {found:?} elements")]
    InvalidListKind {
        expected: ElementSize,
        found: ElementSize,
    },

    /// A far pointer landing pad did not have the required shape.
    #[error("invalid far pointer landing pad")]
    InvalidPointerType,

    /// The session has visited more words than its traversal limit allows.
    #[error("traversal limit of {limit} words exceeded")]
    TraversalLimitExceeded { limit: u64 },

    /// Traversal of this kind of pointer is not implemented.
    #[error("traversal of {0:?} pointers is not supported")]
    UnsupportedPointerKind(PointerKind),

    /// An inline composite list's tag disagrees with the word count of its list pointer.
    #[error(
        "composite list of {element_count} elements of {words_per_element} words \
         does not fill its {word_count} words"
    )]
    CompositeListSizeMismatch {
        element_count: u32,
        words_per_element: u32,
        word_count: u32,
    },

    /// A struct's pointer section was indexed past its end.
    #[error("pointer index {index} is past the end of a pointer section of {pointer_count}")]
    PointerIndexOutOfRange { index: u32, pointer_count: u16 },

    /// A list was indexed past its last element.
    #[error("element index {index} is past the end of a list of {element_count}")]
    ElementIndexOutOfRange { index: u32, element_count: u32 },

    /// A far pointer named a segment that the message does not have.
    #[error("invalid segment id {0}")]
    InvalidSegmentId(u32),

    /// Message is too deeply nested or contains cycles.
    #[error("message is too deeply nested or contains cycles")]
    NestingLimitExceeded,

    /// The byte stream ended in the middle of a message.
    #[error("premature end of file")]
    PrematureEndOfFile,

    /// The underlying byte stream reported an error.
    #[error("I/O error: {0:?}")]
    Io(std::io::ErrorKind),

    /// Something went wrong.
    #[error("failed")]
    Failed,
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        if self.extra.is_empty() {
            write!(fmt, "{}", self.kind)
        } else {
            write!(fmt, "{}: {}", self.kind, self.extra)
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::UnexpectedEof => ErrorKind::PrematureEndOfFile,
            kind => ErrorKind::Io(kind),
        };
        Self {
            kind,
            extra: format!("{err}"),
        }
    }
}
