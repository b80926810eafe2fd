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

use core::ops::Range;

pub type BitCount = usize;
pub type WordCount = usize;
pub type ElementCount = u32;

pub const BITS_PER_WORD: BitCount = 64;
pub const BYTES_PER_WORD: usize = 8;

/// A mask selecting the low `bits` bits of a word.
#[inline]
pub fn bit_mask(bits: BitCount) -> u64 {
    if bits >= BITS_PER_WORD {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

#[inline]
pub fn round_bits_up_to_words(bits: u64) -> u64 {
    (bits + 63) / BITS_PER_WORD as u64
}

/// A position within a segment, counted from either end.
///
/// `FromEnd(0)` is one past the last word. Offsets move both kinds towards
/// higher addresses, so adding to a `FromEnd` index shrinks its magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordIndex {
    FromStart(usize),
    FromEnd(usize),
}

impl WordIndex {
    /// Moves the index by `offset` words. `None` if that would cross the
    /// end the index is counted from.
    pub fn add_offset(self, offset: i64) -> Option<Self> {
        match self {
            Self::FromStart(n) => {
                let n = i64::try_from(n).ok()?.checked_add(offset)?;
                usize::try_from(n).ok().map(Self::FromStart)
            }
            Self::FromEnd(n) => {
                let n = i64::try_from(n).ok()?.checked_sub(offset)?;
                usize::try_from(n).ok().map(Self::FromEnd)
            }
        }
    }

    /// Absolute position in a segment of `len` words, which may equal `len`.
    pub fn resolve(self, len: usize) -> Option<usize> {
        match self {
            Self::FromStart(n) if n <= len => Some(n),
            Self::FromEnd(n) if n <= len => Some(len - n),
            _ => None,
        }
    }
}

/// A half-open range of word indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WordRange {
    pub start: WordIndex,
    pub end: WordIndex,
}

impl WordRange {
    pub fn new(start: WordIndex, end: WordIndex) -> Self {
        Self { start, end }
    }

    /// `len` words beginning at `start`.
    pub fn starting_at(start: usize, len: usize) -> Self {
        Self::new(WordIndex::FromStart(start), WordIndex::FromStart(start + len))
    }

    /// Concrete bounds within `len` words, or `None` if the range does not fit.
    pub fn resolve(self, len: usize) -> Option<Range<usize>> {
        let start = self.start.resolve(len)?;
        let end = self.end.resolve(len)?;
        if start <= end {
            Some(start..end)
        } else {
            None
        }
    }
}
