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

//! Dynamically typed value.

use crate::pointer::{ElementSize, PointerKind};
use crate::private::layout::{ListReader, NullReader, StructReader};
use crate::traits::FromAnyReader;
use crate::{Error, ErrorKind, MessageSize, Result};

/// The result of traversing a pointer: nothing, a struct, or a list.
#[derive(Clone, Copy)]
pub enum Reader<'a> {
    Null(NullReader<'a>),
    Struct(StructReader<'a>),
    List(ListReader<'a>),
}

impl<'a> Reader<'a> {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Reader::Null(_))
    }

    /// The tag of the pointer this was decoded from. Null reads as a struct pointer.
    pub fn kind(&self) -> PointerKind {
        match self {
            Reader::Null(_) | Reader::Struct(_) => PointerKind::Struct,
            Reader::List(_) => PointerKind::List,
        }
    }

    /// Gets the total size of the target and all of its children. Does not count far pointer overhead.
    pub fn total_size(&self) -> Result<MessageSize> {
        match self {
            Reader::Null(_) => Ok(MessageSize::default()),
            Reader::Struct(reader) => reader.total_size(),
            Reader::List(reader) => reader.total_size(),
        }
    }

    #[inline]
    pub fn get_as<T: FromAnyReader<'a>>(self) -> Result<T> {
        T::from_any_reader(self)
    }
}

fn mismatch(expected: PointerKind, found: PointerKind) -> Error {
    Error::from_kind(ErrorKind::TypeTagMismatch { expected, found })
}

impl<'a> FromAnyReader<'a> for Reader<'a> {
    fn from_any_reader(reader: Reader<'a>) -> Result<Self> {
        Ok(reader)
    }
}

impl<'a> FromAnyReader<'a> for StructReader<'a> {
    fn from_any_reader(reader: Reader<'a>) -> Result<Self> {
        match reader {
            Reader::Null(null) => Ok(null.into_struct()),
            Reader::Struct(reader) => Ok(reader),
            Reader::List(_) => Err(mismatch(PointerKind::Struct, PointerKind::List)),
        }
    }
}

/// Any list, whatever its element encoding. A null pointer reads as an empty
/// list of `Void`.
impl<'a> FromAnyReader<'a> for ListReader<'a> {
    fn from_any_reader(reader: Reader<'a>) -> Result<Self> {
        match reader {
            Reader::Null(null) => Ok(null.into_list(ElementSize::Void)),
            Reader::List(reader) => Ok(reader),
            Reader::Struct(_) => Err(mismatch(PointerKind::List, PointerKind::Struct)),
        }
    }
}

/// Converts to a list reader whose elements must be encoded as `element_size`.
pub(crate) fn list_of_size(reader: Reader<'_>, element_size: ElementSize) -> Result<ListReader<'_>> {
    match reader {
        Reader::Null(null) => Ok(null.into_list(element_size)),
        Reader::List(reader) => reader.expect_element_size(element_size),
        Reader::Struct(_) => Err(mismatch(PointerKind::List, PointerKind::Struct)),
    }
}
