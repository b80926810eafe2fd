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

//! Decoding and encoding of the 64-bit wire pointers.
//!
//! The low two bits of every pointer word are a tag selecting one of four
//! layouts. The typed decoders (`StructPointer::decode` and friends) insist on
//! their own tag; [`WirePointer::decode`] accepts any word and dispatches on
//! the tag. Nothing in this module knows about segment lengths, so bounds are
//! checked by the caller once a target is known.

use crate::private::units::round_bits_up_to_words;
use crate::{Error, ErrorKind, Result, Word};

/// The pointer tag carried in the low two bits of a word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Capability = 3,
}

impl PointerKind {
    #[inline]
    pub fn of(word: Word) -> Self {
        match word & 3 {
            0 => Self::Struct,
            1 => Self::List,
            2 => Self::Far,
            _ => Self::Capability,
        }
    }

    #[inline]
    fn tag(self) -> Word {
        self as Word
    }
}

#[inline]
fn expect_kind(word: Word, expected: PointerKind) -> Result<()> {
    let found = PointerKind::of(word);
    if found == expected {
        Ok(())
    } else {
        Err(Error::from_kind(ErrorKind::TypeTagMismatch { expected, found }))
    }
}

/// Signed 30-bit offset stored in bits 2..32.
#[inline]
fn signed_offset(word: Word) -> i32 {
    ((word as u32) as i32) >> 2
}

#[inline]
fn encode_signed_offset(offset: i32) -> Word {
    ((offset as u32) << 2) as Word
}

/// Encoding of the elements of a list, from the 3-bit field of a list pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    /// Every 3-bit value names an encoding, so this only looks at the low three bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Void,
            1 => Self::Bit,
            2 => Self::Byte,
            3 => Self::TwoBytes,
            4 => Self::FourBytes,
            5 => Self::EightBytes,
            6 => Self::Pointer,
            _ => Self::InlineComposite,
        }
    }

    pub fn data_bits_per_element(self) -> u32 {
        match self {
            Self::Void => 0,
            Self::Bit => 1,
            Self::Byte => 8,
            Self::TwoBytes => 16,
            Self::FourBytes => 32,
            Self::EightBytes => 64,
            Self::Pointer => 0,
            Self::InlineComposite => 0,
        }
    }

    pub fn pointers_per_element(self) -> u32 {
        match self {
            Self::Pointer => 1,
            _ => 0,
        }
    }
}

/// A pointer to a struct: where it starts and how big its two sections are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructPointer {
    /// Words from the end of the pointer to the start of the data section.
    pub offset: i32,
    /// Size of the data section in words.
    pub data_size: u16,
    /// Size of the pointer section in words.
    pub pointer_size: u16,
}

impl StructPointer {
    pub fn decode(word: Word) -> Result<Self> {
        expect_kind(word, PointerKind::Struct)?;
        Ok(Self::unpack(word))
    }

    fn unpack(word: Word) -> Self {
        Self {
            offset: signed_offset(word),
            data_size: (word >> 32) as u16,
            pointer_size: (word >> 48) as u16,
        }
    }

    pub fn encode(&self) -> Word {
        encode_signed_offset(self.offset)
            | PointerKind::Struct.tag()
            | (self.data_size as Word) << 32
            | (self.pointer_size as Word) << 48
    }

    /// Total words occupied by the struct body.
    #[inline]
    pub fn word_size(&self) -> u32 {
        self.data_size as u32 + self.pointer_size as u32
    }

    /// The offset field of an inline composite tag, read as an unsigned element count.
    #[inline]
    pub fn inline_composite_element_count(&self) -> u32 {
        (self.offset as u32) & 0x3fff_ffff
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListPointer {
    pub offset: i32,
    pub element_size: ElementSize,
    /// Element count, or for `InlineComposite` the body's word count not counting the tag.
    pub size: u32,
}

impl ListPointer {
    pub fn decode(word: Word) -> Result<Self> {
        expect_kind(word, PointerKind::List)?;
        Ok(Self::unpack(word))
    }

    fn unpack(word: Word) -> Self {
        Self {
            offset: signed_offset(word),
            element_size: ElementSize::from_bits((word >> 32) as u8),
            size: (word >> 35) as u32,
        }
    }

    pub fn encode(&self) -> Word {
        encode_signed_offset(self.offset)
            | PointerKind::List.tag()
            | (self.element_size as Word) << 32
            | ((self.size & 0x1fff_ffff) as Word) << 35
    }

    /// Number of words the list body occupies, excluding a composite tag word.
    pub fn size_in_words(&self) -> u64 {
        match self.element_size {
            ElementSize::InlineComposite => self.size as u64,
            size => {
                let bits_per_element = size.data_bits_per_element() as u64
                    + size.pointers_per_element() as u64 * 64;
                round_bits_up_to_words(self.size as u64 * bits_per_element)
            }
        }
    }
}

/// A pointer into another segment, through one or two landing words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FarPointer {
    pub is_double_far: bool,
    /// Words from the start of the target segment to the landing pad.
    pub offset: u32,
    pub segment_id: u32,
}

impl FarPointer {
    pub fn decode(word: Word) -> Result<Self> {
        expect_kind(word, PointerKind::Far)?;
        Ok(Self::unpack(word))
    }

    fn unpack(word: Word) -> Self {
        Self {
            is_double_far: word & 4 != 0,
            offset: (word as u32) >> 3,
            segment_id: (word >> 32) as u32,
        }
    }

    pub fn encode(&self) -> Word {
        ((self.offset as Word) << 3) & 0xffff_ffff
            | (self.is_double_far as Word) << 2
            | PointerKind::Far.tag()
            | (self.segment_id as Word) << 32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapabilityPointer {
    pub index: u32,
}

impl CapabilityPointer {
    pub fn decode(word: Word) -> Result<Self> {
        expect_kind(word, PointerKind::Capability)?;
        Ok(Self::unpack(word))
    }

    fn unpack(word: Word) -> Self {
        Self {
            index: (word >> 32) as u32,
        }
    }

    pub fn encode(&self) -> Word {
        PointerKind::Capability.tag() | (self.index as Word) << 32
    }
}

/// Any pointer, decoded according to its own tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WirePointer {
    Struct(StructPointer),
    List(ListPointer),
    Far(FarPointer),
    Capability(CapabilityPointer),
}

impl WirePointer {
    pub fn decode(word: Word) -> Self {
        match PointerKind::of(word) {
            PointerKind::Struct => Self::Struct(StructPointer::unpack(word)),
            PointerKind::List => Self::List(ListPointer::unpack(word)),
            PointerKind::Far => Self::Far(FarPointer::unpack(word)),
            PointerKind::Capability => Self::Capability(CapabilityPointer::unpack(word)),
        }
    }

    pub fn encode(&self) -> Word {
        match self {
            Self::Struct(p) => p.encode(),
            Self::List(p) => p.encode(),
            Self::Far(p) => p.encode(),
            Self::Capability(p) => p.encode(),
        }
    }

    pub fn kind(&self) -> PointerKind {
        match self {
            Self::Struct(_) => PointerKind::Struct,
            Self::List(_) => PointerKind::List,
            Self::Far(_) => PointerKind::Far,
            Self::Capability(_) => PointerKind::Capability,
        }
    }
}
