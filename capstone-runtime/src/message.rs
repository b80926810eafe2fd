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

//! Untyped root container for a framed message, and the sessions that read it.

use std::sync::Arc;

use crate::any_pointer;
use crate::private::arena::ReaderArena;
use crate::private::layout::wire_helpers;
use crate::{Result, Word};

/// Options controlling how data is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Limits how many total words of data are allowed to be traversed in one session. Traversal
    /// is counted when a new struct or list reader is obtained, e.g. from `read_pointer()`. This
    /// means that reading the same pointer multiple times will cause it to be double-counted.
    /// Once the traversal limit is reached, an error will be reported.
    ///
    /// This limit exists for security reasons. It is possible for an attacker to construct a
    /// message in which multiple pointers point at the same location. Using such a message, an
    /// attacker could cause a message which is small on the wire to appear much larger when
    /// actually traversed, possibly exhausting server resources.
    ///
    /// The framer also refuses to allocate a message whose segments add up to more than this
    /// many words.
    pub traversal_limit_in_words: u64,

    /// Limits how deeply nested a message structure can be, e.g. structs containing other
    /// structs or lists of structs.
    ///
    /// Since it is common to use recursive code to traverse recursive data structures, an
    /// attacker could cause a stack overflow by sending a very deeply nested (or even cyclic)
    /// message. The default limit of 64 is low enough to prevent that and high enough that it is
    /// never a problem in practice.
    pub nesting_limit: i32,

    /// Largest number of segments the framer accepts in one message.
    pub segment_limit: u32,
}

pub const DEFAULT_READER_OPTIONS: ReaderOptions = ReaderOptions {
    traversal_limit_in_words: 8 * 1024 * 1024,
    nesting_limit: 64,
    segment_limit: 512,
};

impl Default for ReaderOptions {
    fn default() -> ReaderOptions {
        DEFAULT_READER_OPTIONS
    }
}

impl ReaderOptions {
    pub fn new() -> ReaderOptions {
        DEFAULT_READER_OPTIONS
    }

    pub fn nesting_limit(&mut self, value: i32) -> &mut ReaderOptions {
        self.nesting_limit = value;
        self
    }

    pub fn traversal_limit_in_words(&mut self, value: u64) -> &mut ReaderOptions {
        self.traversal_limit_in_words = value;
        self
    }

    pub fn segment_limit(&mut self, value: u32) -> &mut ReaderOptions {
        self.segment_limit = value;
        self
    }
}

/// An object that manages the buffers underlying a message reader.
pub trait ReaderSegments {
    /// Gets the segment with index `idx`. Returns `None` if `idx` is out of range.
    fn get_segment(&self, idx: u32) -> Option<&[Word]>;

    /// Gets the number of segments.
    fn len(&self) -> usize {
        (0..)
            .take_while(|i| self.get_segment(*i).is_some())
            .count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> ReaderSegments for &S
where
    S: ReaderSegments + ?Sized,
{
    fn get_segment(&self, idx: u32) -> Option<&[Word]> {
        (**self).get_segment(idx)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<S> ReaderSegments for Arc<S>
where
    S: ReaderSegments + ?Sized,
{
    fn get_segment(&self, idx: u32) -> Option<&[Word]> {
        (**self).get_segment(idx)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// An array of borrowed segments.
pub struct SegmentArray<'a> {
    segments: &'a [&'a [Word]],
}

impl<'a> SegmentArray<'a> {
    pub fn new(segments: &'a [&'a [Word]]) -> SegmentArray<'a> {
        SegmentArray { segments }
    }
}

impl<'b> ReaderSegments for SegmentArray<'b> {
    fn get_segment(&self, id: u32) -> Option<&[Word]> {
        self.segments.get(id as usize).copied()
    }

    fn len(&self) -> usize {
        self.segments.len()
    }
}

impl<'b> ReaderSegments for [&'b [Word]] {
    fn get_segment(&self, id: u32) -> Option<&[Word]> {
        self.get(id as usize).copied()
    }

    fn len(&self) -> usize {
        <[&[Word]]>::len(self)
    }
}

impl ReaderSegments for Vec<Vec<Word>> {
    fn get_segment(&self, id: u32) -> Option<&[Word]> {
        self.get(id as usize).map(Vec::as_slice)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// A container used to read a message.
///
/// The segments are immutable, so one `Reader` may be shared between threads
/// as long as `S` is `Sync`. Each thread opens its own [`Session`].
pub struct Reader<S>
where
    S: ReaderSegments,
{
    segments: S,
    options: ReaderOptions,
}

impl<S> Reader<S>
where
    S: ReaderSegments,
{
    pub fn new(segments: S, options: ReaderOptions) -> Self {
        Reader { segments, options }
    }

    /// Starts a traversal with a fresh budget.
    pub fn session(&self) -> Session<'_> {
        Session {
            arena: ReaderArena::new(&self.segments, self.options),
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn segments(&self) -> &S {
        &self.segments
    }

    pub fn into_segments(self) -> S {
        self.segments
    }
}

/// One traversal of a message. Every reader obtained from a session is billed
/// against the session's traversal limit.
pub struct Session<'a> {
    arena: ReaderArena<'a>,
}

impl<'a> Session<'a> {
    /// Decodes the root pointer, the first word of segment 0.
    pub fn get_root(&self) -> Result<any_pointer::Reader<'_>> {
        self.arena.check_target(0, 0)?;
        wire_helpers::read_pointer(&self.arena, 0, 0, self.arena.nesting_limit())
    }

    /// Words billed so far.
    pub fn traversed_words(&self) -> u64 {
        self.arena.traversed_words()
    }

    pub fn traversal_limit(&self) -> u64 {
        self.arena.traversal_limit()
    }
}

#[cfg(test)]
mod tests {
    use super::{Reader, ReaderOptions, ReaderSegments, SegmentArray};
    use crate::{ErrorKind, Word};

    #[test]
    fn segment_counts() {
        let a: &[Word] = &[1, 2];
        let b: &[Word] = &[3];
        let borrowed = [a, b];
        assert_eq!(SegmentArray::new(&borrowed).len(), 2);
        assert_eq!(ReaderSegments::len(&borrowed[..]), 2);
        assert_eq!(
            ReaderSegments::len(&vec![vec![0u64; 3], vec![], vec![1]]),
            3
        );
        assert_eq!(
            std::sync::Arc::new(vec![vec![0u64]]).get_segment(0),
            Some(&[0u64][..])
        );
    }

    #[test]
    fn options_builder() {
        let mut options = ReaderOptions::new();
        options.traversal_limit_in_words(16).nesting_limit(2).segment_limit(3);
        assert_eq!(options.traversal_limit_in_words, 16);
        assert_eq!(options.nesting_limit, 2);
        assert_eq!(options.segment_limit, 3);
        assert_eq!(ReaderOptions::default().segment_limit, 512);
    }

    #[test]
    fn root_of_empty_message() {
        let message = Reader::new(vec![Vec::<Word>::new()], ReaderOptions::new());
        let session = message.session();
        assert!(matches!(
            session.get_root().err().unwrap().kind,
            ErrorKind::PointerOffsetOutOfRange { .. }
        ));

        let message = Reader::new(Vec::<Vec<Word>>::new(), ReaderOptions::new());
        assert_eq!(
            message.session().get_root().err().unwrap().kind,
            ErrorKind::InvalidSegmentId(0)
        );
    }

    #[test]
    fn sessions_have_separate_budgets() {
        // Root struct with one data word holding 7.
        let message = Reader::new(vec![vec![0x0000_0001_0000_0000, 7]], ReaderOptions::new());
        let first = message.session();
        let second = message.session();
        first.get_root().unwrap();
        first.get_root().unwrap();
        assert_eq!(first.traversed_words(), 2);
        assert_eq!(second.traversed_words(), 0);
    }
}
