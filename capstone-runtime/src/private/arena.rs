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

use crate::message::{ReaderOptions, ReaderSegments};
use crate::private::read_limiter::ReadLimiter;
use crate::private::units::{bit_mask, BitCount, WordIndex, WordRange, BITS_PER_WORD};
use crate::{Error, ErrorKind, Result, Word};

pub type SegmentId = u32;

/// The segments of one message together with the budgets of one session.
///
/// Every reader produced during a session borrows the same arena, so all of
/// their traversals are billed to a single counter.
pub struct ReaderArena<'a> {
    segments: &'a dyn ReaderSegments,
    read_limiter: ReadLimiter,
    nesting_limit: i32,
}

impl<'a> ReaderArena<'a> {
    pub fn new(segments: &'a dyn ReaderSegments, options: ReaderOptions) -> Self {
        Self {
            segments,
            read_limiter: ReadLimiter::new(options.traversal_limit_in_words),
            nesting_limit: options.nesting_limit,
        }
    }

    pub fn get_segment(&self, id: SegmentId) -> Result<&'a [Word]> {
        self.segments
            .get_segment(id)
            .ok_or_else(|| Error::from_kind(ErrorKind::InvalidSegmentId(id)))
    }

    /// Resolves the target of a pointer at `pointer_index` with the given
    /// offset. The target is counted from the word after the pointer and must
    /// lie strictly inside the segment.
    pub fn check_offset(
        &self,
        segment_id: SegmentId,
        pointer_index: usize,
        offset: i32,
    ) -> Result<usize> {
        let target = WordIndex::FromStart(pointer_index).add_offset(i64::from(offset) + 1);
        match target {
            Some(WordIndex::FromStart(target)) => self.check_target(segment_id, target),
            _ => Err(self.out_of_range(
                segment_id,
                pointer_index as i64 + i64::from(offset) + 1,
            )?),
        }
    }

    /// Checks an absolute word index within a segment.
    pub fn check_target(&self, segment_id: SegmentId, target: usize) -> Result<usize> {
        let segment_len = self.get_segment(segment_id)?.len();
        if target >= segment_len {
            Err(self.out_of_range(segment_id, target as i64)?)
        } else {
            Ok(target)
        }
    }

    fn out_of_range(&self, segment_id: SegmentId, target: i64) -> Result<Error> {
        let segment_len = self.get_segment(segment_id)?.len();
        Ok(Error::from_kind(ErrorKind::PointerOffsetOutOfRange {
            segment_id,
            target,
            segment_len,
        }))
    }

    /// A view of `range` within a segment.
    pub fn slice(&self, segment_id: SegmentId, range: WordRange) -> Result<SegmentSlice<'a>> {
        let segment = self.get_segment(segment_id)?;
        match range.resolve(segment.len()) {
            Some(bounds) => Ok(SegmentSlice {
                segment_id,
                offset: bounds.start,
                words: &segment[bounds],
            }),
            None => {
                let target = match range.end {
                    WordIndex::FromStart(end) => end as i64,
                    WordIndex::FromEnd(end) => segment.len() as i64 - end as i64,
                };
                Err(self.out_of_range(segment_id, target)?)
            }
        }
    }

    /// `len` words starting at `start`.
    pub fn slice_at(
        &self,
        segment_id: SegmentId,
        start: usize,
        len: usize,
    ) -> Result<SegmentSlice<'a>> {
        self.slice(segment_id, WordRange::starting_at(start, len))
    }

    pub fn word(&self, segment_id: SegmentId, index: usize) -> Result<Word> {
        let segment = self.get_segment(segment_id)?;
        match segment.get(index) {
            Some(word) => Ok(*word),
            None => Err(self.out_of_range(segment_id, index as i64)?),
        }
    }

    /// Bills `amount` words to the session.
    #[inline]
    pub fn can_read(&self, amount: u64) -> Result<()> {
        self.read_limiter.can_read(amount)
    }

    pub fn traversed_words(&self) -> u64 {
        self.read_limiter.traversed()
    }

    pub fn traversal_limit(&self) -> u64 {
        self.read_limiter.limit()
    }

    pub fn nesting_limit(&self) -> i32 {
        self.nesting_limit
    }
}

/// A borrowed run of words within one segment. Never copies.
#[derive(Clone, Copy, Debug)]
pub struct SegmentSlice<'a> {
    segment_id: SegmentId,
    offset: usize,
    words: &'a [Word],
}

impl<'a> SegmentSlice<'a> {
    /// A zero-length slice at `offset`.
    pub fn empty(segment_id: SegmentId, offset: usize) -> Self {
        Self {
            segment_id,
            offset,
            words: &[],
        }
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Index of the first word within its segment.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &'a [Word] {
        self.words
    }

    pub fn get(&self, index: usize) -> Option<Word> {
        self.words.get(index).copied()
    }

    /// Splits at `mid`, clamped to the length of the slice.
    pub fn split_at(&self, mid: usize) -> (SegmentSlice<'a>, SegmentSlice<'a>) {
        let (head, tail) = self.words.split_at(mid.min(self.words.len()));
        (
            SegmentSlice {
                segment_id: self.segment_id,
                offset: self.offset,
                words: head,
            },
            SegmentSlice {
                segment_id: self.segment_id,
                offset: self.offset + head.len(),
                words: tail,
            },
        )
    }

    /// Reads `bits` bits at `bit_offset`, which must be aligned so the value
    /// does not cross a word boundary. `None` past the end of the slice.
    #[inline]
    pub fn read_bits(&self, bit_offset: usize, bits: BitCount) -> Option<u64> {
        if bits == 0 {
            return Some(0);
        }
        let word = self.get(bit_offset / BITS_PER_WORD)?;
        Some((word >> (bit_offset % BITS_PER_WORD)) & bit_mask(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::{ReaderArena, SegmentSlice};
    use crate::message::ReaderOptions;
    use crate::ErrorKind;

    #[test]
    fn check_offset_bounds() {
        let segments: Vec<Vec<u64>> = vec![vec![0; 4]];
        let arena = ReaderArena::new(&segments, ReaderOptions::new());

        assert_eq!(arena.check_offset(0, 0, 0).unwrap(), 1);
        assert_eq!(arena.check_offset(0, 0, 2).unwrap(), 3);
        assert_eq!(arena.check_offset(0, 3, -4).unwrap(), 0);
        assert_eq!(arena.check_offset(0, 0, -1).unwrap(), 0);

        // A target equal to the segment length is already out of range.
        assert_eq!(
            arena.check_offset(0, 0, 3).unwrap_err().kind,
            ErrorKind::PointerOffsetOutOfRange {
                segment_id: 0,
                target: 4,
                segment_len: 4
            }
        );
        assert_eq!(
            arena.check_offset(0, 0, -2).unwrap_err().kind,
            ErrorKind::PointerOffsetOutOfRange {
                segment_id: 0,
                target: -1,
                segment_len: 4
            }
        );
        assert_eq!(
            arena.check_offset(1, 0, 0).unwrap_err().kind,
            ErrorKind::InvalidSegmentId(1)
        );
    }

    #[test]
    fn slices_do_not_copy() {
        let segments: Vec<Vec<u64>> = vec![vec![10, 11, 12, 13]];
        let arena = ReaderArena::new(&segments, ReaderOptions::new());

        let slice = arena.slice_at(0, 1, 2).unwrap();
        assert_eq!(slice.offset(), 1);
        assert_eq!(slice.words(), &[11, 12]);
        assert!(std::ptr::eq(slice.words(), &segments[0][1..3]));

        let (head, tail) = slice.split_at(1);
        assert_eq!(head.words(), &[11]);
        assert_eq!(tail.offset(), 2);
        assert_eq!(tail.words(), &[12]);
        assert!(slice.split_at(5).1.is_empty());

        assert!(arena.slice_at(0, 3, 2).is_err());
        assert!(arena.slice_at(0, 4, 0).is_ok());
    }

    #[test]
    fn read_bits_stops_at_end() {
        let words = [0x0000_0002_0000_0001u64];
        let slice = SegmentSlice {
            segment_id: 0,
            offset: 0,
            words: &words,
        };
        assert_eq!(slice.read_bits(0, 32), Some(1));
        assert_eq!(slice.read_bits(32, 32), Some(2));
        assert_eq!(slice.read_bits(33, 1), Some(1));
        assert_eq!(slice.read_bits(64, 32), None);
        assert_eq!(SegmentSlice::empty(0, 0).read_bits(0, 0), Some(0));
    }
}
