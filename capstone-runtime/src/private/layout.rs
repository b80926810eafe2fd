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

use crate::any_pointer;
use crate::pointer::{ElementSize, ListPointer, StructPointer};
use crate::private::arena::{ReaderArena, SegmentId, SegmentSlice};
use crate::private::mask::Mask;
use crate::private::primitive::Primitive;
use crate::private::units::{ElementCount, BITS_PER_WORD};
use crate::{Error, ErrorKind, MessageSize, Result, Word};

pub(crate) mod wire_helpers {
    use tracing::trace;

    use crate::any_pointer;
    use crate::pointer::{FarPointer, PointerKind, WirePointer};
    use crate::private::arena::{ReaderArena, SegmentId};
    use crate::private::layout::{ListReader, NullReader, StructReader};
    use crate::{Error, ErrorKind, Result};

    /// Decodes the pointer at `index` of a segment and traverses it.
    pub fn read_pointer<'a>(
        arena: &'a ReaderArena<'a>,
        segment_id: SegmentId,
        index: usize,
        nesting_limit: i32,
    ) -> Result<any_pointer::Reader<'a>> {
        let word = arena.word(segment_id, index)?;
        if word == 0 {
            return Ok(any_pointer::Reader::Null(NullReader {
                arena,
                segment_id,
                nesting_limit,
            }));
        }

        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }

        let pointer = WirePointer::decode(word);
        trace!(
            segment_id,
            index,
            ?pointer,
            traversed = arena.traversed_words(),
            "following pointer"
        );

        match pointer {
            WirePointer::Struct(p) => Ok(any_pointer::Reader::Struct(StructReader::new(
                arena,
                segment_id,
                index,
                p,
                nesting_limit - 1,
            )?)),
            WirePointer::List(p) => Ok(any_pointer::Reader::List(ListReader::new(
                arena,
                segment_id,
                index,
                p,
                nesting_limit - 1,
            )?)),
            WirePointer::Far(far) => follow_far(arena, far, nesting_limit),
            WirePointer::Capability(_) => Err(Error::from_kind(
                ErrorKind::UnsupportedPointerKind(PointerKind::Capability),
            )),
        }
    }

    fn follow_far<'a>(
        arena: &'a ReaderArena<'a>,
        far: FarPointer,
        nesting_limit: i32,
    ) -> Result<any_pointer::Reader<'a>> {
        let segment_id = far.segment_id;
        let landing = far.offset as usize;

        if !far.is_double_far {
            arena.can_read(1)?;

            // The landing pad is an ordinary pointer in the target segment.
            let pad = arena.word(segment_id, landing)?;
            if pad == 0 {
                return Ok(any_pointer::Reader::Null(NullReader {
                    arena,
                    segment_id,
                    nesting_limit,
                }));
            }
            trace!(segment_id, landing, pad, "landed single far pointer");
            match WirePointer::decode(pad) {
                WirePointer::Struct(p) => Ok(any_pointer::Reader::Struct(StructReader::new(
                    arena,
                    segment_id,
                    landing,
                    p,
                    nesting_limit - 1,
                )?)),
                WirePointer::List(p) => Ok(any_pointer::Reader::List(ListReader::new(
                    arena,
                    segment_id,
                    landing,
                    p,
                    nesting_limit - 1,
                )?)),
                WirePointer::Far(_) => Err(Error::from_kind(ErrorKind::InvalidPointerType)
                    .context("single far pointer landed on another far pointer")),
                WirePointer::Capability(_) => Err(Error::from_kind(
                    ErrorKind::UnsupportedPointerKind(PointerKind::Capability),
                )),
            }
        } else {
            arena.can_read(2)?;

            // Two words: a far pointer to the content, then a tag describing it.
            let pad = arena.slice_at(segment_id, landing, 2)?;
            let (first, tag) = match *pad.words() {
                [first, tag] => (first, tag),
                _ => return Err(Error::from_kind(ErrorKind::InvalidPointerType)),
            };
            let content = FarPointer::decode(first)?;
            if content.is_double_far {
                return Err(Error::from_kind(ErrorKind::InvalidPointerType)
                    .context("double far landing pad holds another double far pointer"));
            }
            let content_segment = content.segment_id;
            let target = content.offset as usize;
            trace!(
                segment_id,
                landing,
                content_segment,
                target,
                tag,
                "landed double far pointer"
            );
            match WirePointer::decode(tag) {
                WirePointer::Struct(p) => {
                    let target = arena.check_target(content_segment, target)?;
                    Ok(any_pointer::Reader::Struct(StructReader::at_target(
                        arena,
                        content_segment,
                        target,
                        p,
                        nesting_limit - 1,
                    )?))
                }
                WirePointer::List(p) => {
                    let target = arena.check_target(content_segment, target)?;
                    Ok(any_pointer::Reader::List(ListReader::at_target(
                        arena,
                        content_segment,
                        target,
                        p,
                        nesting_limit - 1,
                    )?))
                }
                other => Err(Error::from_kind(ErrorKind::InvalidPointerType).context(format!(
                    "double far tag must be a struct or list pointer, found {:?}",
                    other.kind()
                ))),
            }
        }
    }
}

/// What a null pointer reads as: an empty struct or an empty list of any kind.
#[derive(Clone, Copy)]
pub struct NullReader<'a> {
    arena: &'a ReaderArena<'a>,
    segment_id: SegmentId,
    nesting_limit: i32,
}

impl<'a> NullReader<'a> {
    pub fn into_struct(self) -> StructReader<'a> {
        StructReader::empty(self.arena, self.segment_id, self.nesting_limit)
    }

    pub fn into_list(self, element_size: ElementSize) -> ListReader<'a> {
        ListReader::empty(self.arena, self.segment_id, element_size, self.nesting_limit)
    }
}

/// Field access over the data and pointer sections of one struct.
#[derive(Clone, Copy)]
pub struct StructReader<'a> {
    arena: &'a ReaderArena<'a>,
    data: SegmentSlice<'a>,
    pointers: SegmentSlice<'a>,
    nesting_limit: i32,
}

impl<'a> StructReader<'a> {
    /// Reads the struct that the pointer at `pointer_index` refers to, billing its size.
    pub fn new(
        arena: &'a ReaderArena<'a>,
        segment_id: SegmentId,
        pointer_index: usize,
        pointer: StructPointer,
        nesting_limit: i32,
    ) -> Result<Self> {
        let target = arena.check_offset(segment_id, pointer_index, pointer.offset)?;
        Self::at_target(arena, segment_id, target, pointer, nesting_limit)
    }

    /// Like `new`, for a struct whose first word is already known.
    pub fn at_target(
        arena: &'a ReaderArena<'a>,
        segment_id: SegmentId,
        target: usize,
        pointer: StructPointer,
        nesting_limit: i32,
    ) -> Result<Self> {
        let body = arena.slice_at(segment_id, target, pointer.word_size() as usize)?;
        arena.can_read(u64::from(pointer.word_size()))?;
        let (data, pointers) = body.split_at(pointer.data_size as usize);
        Ok(Self {
            arena,
            data,
            pointers,
            nesting_limit,
        })
    }

    /// An element of an inline composite list. The list already billed its
    /// whole body, so this does not bill again.
    pub fn new_element(
        arena: &'a ReaderArena<'a>,
        data: SegmentSlice<'a>,
        pointers: SegmentSlice<'a>,
        nesting_limit: i32,
    ) -> Self {
        Self {
            arena,
            data,
            pointers,
            nesting_limit,
        }
    }

    pub fn empty(arena: &'a ReaderArena<'a>, segment_id: SegmentId, nesting_limit: i32) -> Self {
        Self {
            arena,
            data: SegmentSlice::empty(segment_id, 0),
            pointers: SegmentSlice::empty(segment_id, 0),
            nesting_limit,
        }
    }

    /// Reads the `offset`th value of type `T`, counted in units of `T`'s own
    /// width (bits for `bool`). Offsets past the data section yield `default`.
    #[inline]
    pub fn read_data<T: Primitive + Mask>(&self, offset: u32, default: T) -> T {
        let bit_offset = offset as usize * T::BITS;
        match self.data.read_bits(bit_offset, T::BITS) {
            Some(bits) => T::mask(T::from_bits(bits), default),
            None => default,
        }
    }

    #[inline]
    pub fn read_bool(&self, offset: u32, default: bool) -> bool {
        self.read_data(offset, default)
    }

    /// Void fields occupy no storage but still cost one word of traversal.
    /// `_index` names the field for symmetry with the other accessors.
    #[inline]
    pub fn read_void(&self, _index: u32) -> Result<()> {
        self.arena.can_read(1)
    }

    /// Decodes and traverses the `index`th pointer of the pointer section.
    pub fn read_pointer(&self, index: u32) -> Result<any_pointer::Reader<'a>> {
        if index as usize >= self.pointers.len() {
            return Err(Error::from_kind(ErrorKind::PointerIndexOutOfRange {
                index,
                pointer_count: self.pointer_section_size(),
            }));
        }
        wire_helpers::read_pointer(
            self.arena,
            self.pointers.segment_id(),
            self.pointers.offset() + index as usize,
            self.nesting_limit,
        )
    }

    pub fn data_section_words(&self) -> &'a [Word] {
        self.data.words()
    }

    pub fn data_section_size(&self) -> u16 {
        self.data.len() as u16
    }

    pub fn pointer_section_size(&self) -> u16 {
        self.pointers.len() as u16
    }

    /// Words reachable from this struct, including its own sections.
    /// Traverses every pointer, so the result is billed to the session.
    pub fn total_size(&self) -> Result<MessageSize> {
        let mut result = MessageSize {
            word_count: (self.data.len() + self.pointers.len()) as u64,
        };
        for index in 0..u32::from(self.pointer_section_size()) {
            result.plus_eq(self.read_pointer(index)?.total_size()?);
        }
        Ok(result)
    }
}

/// A list of any element encoding.
#[derive(Clone, Copy)]
pub struct ListReader<'a> {
    arena: &'a ReaderArena<'a>,
    body: SegmentSlice<'a>,
    element_count: ElementCount,
    element_size: ElementSize,
    step: u32,
    struct_data_size: u16,
    struct_pointer_count: u16,
    nesting_limit: i32,
}

impl<'a> ListReader<'a> {
    /// Reads the list that the pointer at `pointer_index` refers to, billing it.
    pub fn new(
        arena: &'a ReaderArena<'a>,
        segment_id: SegmentId,
        pointer_index: usize,
        pointer: ListPointer,
        nesting_limit: i32,
    ) -> Result<Self> {
        let target = arena.check_offset(segment_id, pointer_index, pointer.offset)?;
        Self::at_target(arena, segment_id, target, pointer, nesting_limit)
    }

    /// Like `new`, for a list whose first word (the tag, for composite lists) is already known.
    pub fn at_target(
        arena: &'a ReaderArena<'a>,
        segment_id: SegmentId,
        target: usize,
        pointer: ListPointer,
        nesting_limit: i32,
    ) -> Result<Self> {
        match pointer.element_size {
            ElementSize::InlineComposite => {
                let word_count = pointer.size;
                let tag = StructPointer::decode(arena.word(segment_id, target)?)?;
                let body = arena.slice_at(segment_id, target + 1, word_count as usize)?;

                let element_count = tag.inline_composite_element_count();
                let words_per_element = tag.word_size();
                if u64::from(element_count) * u64::from(words_per_element) != u64::from(word_count)
                {
                    return Err(Error::from_kind(ErrorKind::CompositeListSizeMismatch {
                        element_count,
                        words_per_element,
                        word_count,
                    }));
                }

                arena.can_read(u64::from(word_count))?;
                if words_per_element == 0 {
                    // Zero-sized elements take no words, so bill the count instead.
                    arena.can_read(u64::from(element_count))?;
                }

                Ok(Self {
                    arena,
                    body,
                    element_count,
                    element_size: ElementSize::InlineComposite,
                    step: words_per_element * BITS_PER_WORD as u32,
                    struct_data_size: tag.data_size,
                    struct_pointer_count: tag.pointer_size,
                    nesting_limit,
                })
            }
            ElementSize::Void => {
                arena.can_read(u64::from(pointer.size))?;
                Ok(Self {
                    arena,
                    body: SegmentSlice::empty(segment_id, target),
                    element_count: pointer.size,
                    element_size: ElementSize::Void,
                    step: 0,
                    struct_data_size: 0,
                    struct_pointer_count: 0,
                    nesting_limit,
                })
            }
            element_size => {
                let word_count = pointer.size_in_words();
                let body = arena.slice_at(segment_id, target, word_count as usize)?;
                arena.can_read(word_count)?;
                Ok(Self {
                    arena,
                    body,
                    element_count: pointer.size,
                    element_size,
                    step: element_size.data_bits_per_element()
                        + element_size.pointers_per_element() * BITS_PER_WORD as u32,
                    struct_data_size: 0,
                    struct_pointer_count: element_size.pointers_per_element() as u16,
                    nesting_limit,
                })
            }
        }
    }

    pub fn empty(
        arena: &'a ReaderArena<'a>,
        segment_id: SegmentId,
        element_size: ElementSize,
        nesting_limit: i32,
    ) -> Self {
        Self {
            arena,
            body: SegmentSlice::empty(segment_id, 0),
            element_count: 0,
            element_size,
            step: 0,
            struct_data_size: 0,
            struct_pointer_count: 0,
            nesting_limit,
        }
    }

    #[inline]
    pub fn len(&self) -> ElementCount {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    pub fn element_size(&self) -> ElementSize {
        self.element_size
    }

    /// Fails with `InvalidListKind` unless the elements are encoded as `expected`.
    pub fn expect_element_size(self, expected: ElementSize) -> Result<Self> {
        if self.element_size == expected {
            Ok(self)
        } else {
            Err(Error::from_kind(ErrorKind::InvalidListKind {
                expected,
                found: self.element_size,
            }))
        }
    }

    fn check_element(&self, expected: ElementSize, index: ElementCount) -> Result<()> {
        if self.element_size != expected {
            return Err(Error::from_kind(ErrorKind::InvalidListKind {
                expected,
                found: self.element_size,
            }));
        }
        if index >= self.element_count {
            return Err(Error::from_kind(ErrorKind::ElementIndexOutOfRange {
                index,
                element_count: self.element_count,
            }));
        }
        Ok(())
    }

    /// Reads the `index`th element of a list of `T`.
    pub fn get_primitive<T: Primitive>(&self, index: ElementCount) -> Result<T> {
        self.check_element(T::element_size(), index)?;
        Ok(self.primitive_at(index))
    }

    /// Decodes and traverses the `index`th pointer of a pointer list.
    pub fn get_pointer_element(&self, index: ElementCount) -> Result<any_pointer::Reader<'a>> {
        self.check_element(ElementSize::Pointer, index)?;
        self.pointer_at(index)
    }

    /// The `index`th struct of a composite list.
    pub fn get_struct_element(&self, index: ElementCount) -> Result<StructReader<'a>> {
        self.check_element(ElementSize::InlineComposite, index)?;
        Ok(self.struct_at(index))
    }

    // The `*_at` accessors trust the caller to have checked the element
    // size and the index, as the typed list readers do on construction.

    #[inline]
    pub(crate) fn primitive_at<T: Primitive>(&self, index: ElementCount) -> T {
        let bit_offset = index as usize * self.step as usize;
        T::from_bits(self.body.read_bits(bit_offset, T::BITS).unwrap_or(0))
    }

    pub(crate) fn pointer_at(&self, index: ElementCount) -> Result<any_pointer::Reader<'a>> {
        wire_helpers::read_pointer(
            self.arena,
            self.body.segment_id(),
            self.body.offset() + index as usize,
            self.nesting_limit,
        )
    }

    pub(crate) fn struct_at(&self, index: ElementCount) -> StructReader<'a> {
        let words_per_element = self.step as usize / BITS_PER_WORD;
        let (_, rest) = self.body.split_at(index as usize * words_per_element);
        let (element, _) = rest.split_at(words_per_element);
        let (data, pointers) = element.split_at(self.struct_data_size as usize);
        StructReader::new_element(self.arena, data, pointers, self.nesting_limit - 1)
    }

    /// Words reachable from this list, including its body and any composite tag.
    pub fn total_size(&self) -> Result<MessageSize> {
        let mut result = MessageSize {
            word_count: self.body.len() as u64,
        };
        match self.element_size {
            ElementSize::Pointer => {
                for index in 0..self.len() {
                    result.plus_eq(self.pointer_at(index)?.total_size()?);
                }
            }
            ElementSize::InlineComposite => {
                result.word_count += 1;
                if self.struct_pointer_count > 0 {
                    for index in 0..self.len() {
                        let element = self.struct_at(index);
                        for pointer in 0..u32::from(self.struct_pointer_count) {
                            result.plus_eq(element.read_pointer(pointer)?.total_size()?);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(result)
    }
}
