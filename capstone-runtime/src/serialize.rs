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

//! Reading messages framed with the
//! [standard stream encoding](https://capnproto.org/encoding.html#serialization-over-a-stream).
//!
//! Each frame is a table of segment lengths followed by the segments
//! themselves. Frames that exceed the segment-count or size limits of the
//! [`ReaderOptions`] are consumed and dropped without allocating their
//! segments, so one oversized message does not end a stream.

use std::io::{self, Read};

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace, warn};

use crate::message::{self, ReaderOptions, ReaderSegments};
use crate::private::units::BYTES_PER_WORD;
use crate::{Error, ErrorKind, Result, Word};

/// Segment lengths are read in chunks of this many when a frame is skipped.
const SKIP_CHUNK_LENGTHS: usize = 512;

/// Segments read off a stream, stored back to back in one allocation.
pub struct OwnedSegments {
    segment_slices: Vec<(usize, usize)>,
    owned_space: Vec<Word>,
}

impl OwnedSegments {
    /// Converts the little-endian body of a frame described by `table`.
    pub fn from_le_bytes(table: &SegmentTable, bytes: &[u8]) -> Result<Self> {
        if bytes.len() as u64 != table.total_words() * BYTES_PER_WORD as u64 {
            return Err(Error::failed(format!(
                "segment table describes {} words, body holds {} bytes",
                table.total_words(),
                bytes.len()
            )));
        }
        let mut owned_space: Vec<Word> = vec![0; bytes.len() / BYTES_PER_WORD];
        LittleEndian::read_u64_into(bytes, &mut owned_space);

        let mut segment_slices = Vec::with_capacity(table.segment_count());
        let mut start = 0;
        for (segment, length) in table.lengths().iter().enumerate() {
            let end = start + *length as usize;
            trace!(segment, words = length, "read segment");
            segment_slices.push((start, end));
            start = end;
        }

        Ok(OwnedSegments {
            segment_slices,
            owned_space,
        })
    }
}

impl ReaderSegments for OwnedSegments {
    fn get_segment(&self, id: u32) -> Option<&[Word]> {
        let (a, b) = *self.segment_slices.get(id as usize)?;
        Some(&self.owned_space[a..b])
    }

    fn len(&self) -> usize {
        self.segment_slices.len()
    }
}

/// The segment lengths of one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentTable {
    lengths: Vec<u32>,
    total_words: u64,
}

impl SegmentTable {
    /// Parses a run of little-endian `u32` lengths.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let lengths: Vec<u32> = bytes.chunks_exact(4).map(LittleEndian::read_u32).collect();
        let total_words = lengths.iter().map(|l| u64::from(*l)).sum();
        debug!(segment_count = lengths.len(), total_words, "read segment table");
        SegmentTable {
            lengths,
            total_words,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    pub fn total_words(&self) -> u64 {
        self.total_words
    }

    /// Byte length of the frame body.
    pub fn body_len(&self) -> Result<usize> {
        usize::try_from(self.total_words * BYTES_PER_WORD as u64).map_err(|_| {
            Error::failed(format!("message of {} words does not fit in memory", self.total_words))
        })
    }

    /// Whether the frame is too big to read under `options`.
    pub fn check_size(&self, options: &ReaderOptions) -> Option<SkipReason> {
        if self.total_words > options.traversal_limit_in_words {
            warn!(
                total_words = self.total_words,
                limit = options.traversal_limit_in_words,
                "message too large, skipping"
            );
            Some(SkipReason::TooManyWords {
                total_words: self.total_words,
                limit: options.traversal_limit_in_words,
            })
        } else {
            None
        }
    }
}

/// Why a frame was consumed without producing a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    TooManySegments { segment_count: u64, limit: u32 },
    TooManyWords { total_words: u64, limit: u64 },
}

/// One frame off the stream.
pub enum Frame<S: ReaderSegments> {
    Message(message::Reader<S>),
    Skipped(SkipReason),
}

/// The segment count stored, minus one, in the first four bytes of a frame.
pub fn segment_count(first: [u8; 4]) -> u64 {
    u64::from(LittleEndian::read_u32(&first)) + 1
}

/// Whether a frame of `segment_count` segments must be skipped under `options`.
pub fn check_segment_count(segment_count: u64, options: &ReaderOptions) -> Option<SkipReason> {
    if segment_count > u64::from(options.segment_limit) {
        warn!(
            segment_count,
            limit = options.segment_limit,
            "segment count exceeds limit, skipping message"
        );
        Some(SkipReason::TooManySegments {
            segment_count,
            limit: options.segment_limit,
        })
    } else {
        None
    }
}

/// Bytes of padding after the lengths, keeping the segments word aligned.
pub fn padding_len(segment_count: u64) -> usize {
    if segment_count % 2 == 0 {
        4
    } else {
        0
    }
}

/// Padding should be zero, but anything else is only worth a warning.
pub fn check_padding(padding: &[u8]) {
    if padding.iter().any(|b| *b != 0) {
        warn!(?padding, "non-zero segment table padding");
    } else if !padding.is_empty() {
        debug!(bytes = padding.len(), "skipped segment table padding");
    }
}

/// Sums `u32` lengths out of a chunk of the table of a skipped frame.
pub fn sum_lengths(bytes: &[u8]) -> u64 {
    bytes
        .chunks_exact(4)
        .map(|c| u64::from(LittleEndian::read_u32(c)))
        .sum()
}

/// Fills `buf`, or returns `false` if the stream was already at its end.
fn read_exact_or_eof<R: Read>(read: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match read.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(Error::from_kind(ErrorKind::PrematureEndOfFile)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn skip_words<R: Read>(read: &mut R, words: u64) -> Result<()> {
    let bytes = words.saturating_mul(BYTES_PER_WORD as u64);
    let skipped = io::copy(&mut read.by_ref().take(bytes), &mut io::sink())?;
    if skipped < bytes {
        Err(Error::from_kind(ErrorKind::PrematureEndOfFile))
    } else {
        Ok(())
    }
}

/// Reads one frame from `read`. Returns `None` if the stream ends cleanly
/// before the frame starts.
pub fn read_frame<R>(read: &mut R, options: ReaderOptions) -> Result<Option<Frame<OwnedSegments>>>
where
    R: Read,
{
    let mut first = [0u8; 4];
    if !read_exact_or_eof(read, &mut first)? {
        return Ok(None);
    }
    let segment_count = segment_count(first);

    if let Some(reason) = check_segment_count(segment_count, &options) {
        // The lengths still have to be summed to find the end of the frame.
        let mut chunk = [0u8; 4 * SKIP_CHUNK_LENGTHS];
        let mut remaining = segment_count;
        let mut total_words = 0u64;
        while remaining > 0 {
            let n = remaining.min(SKIP_CHUNK_LENGTHS as u64) as usize;
            read.read_exact(&mut chunk[..n * 4])?;
            total_words += sum_lengths(&chunk[..n * 4]);
            remaining -= n as u64;
        }
        let mut padding = [0u8; 4];
        read.read_exact(&mut padding[..padding_len(segment_count)])?;
        skip_words(read, total_words)?;
        return Ok(Some(Frame::Skipped(reason)));
    }

    let mut lengths = vec![0u8; segment_count as usize * 4];
    read.read_exact(&mut lengths)?;
    let table = SegmentTable::from_le_bytes(&lengths);

    let mut padding = [0u8; 4];
    let padding = &mut padding[..padding_len(segment_count)];
    read.read_exact(padding)?;
    check_padding(padding);

    if let Some(reason) = table.check_size(&options) {
        skip_words(read, table.total_words())?;
        return Ok(Some(Frame::Skipped(reason)));
    }

    let mut body = vec![0u8; table.body_len()?];
    read.read_exact(&mut body)?;
    let segments = OwnedSegments::from_le_bytes(&table, &body)?;
    Ok(Some(Frame::Message(message::Reader::new(segments, options))))
}

/// Reads the next message from `read`, skipping frames that exceed the limits
/// in `options`. Returns `None` at a clean end of stream.
///
/// For optimal performance, `read` should be a buffered reader type.
pub fn try_read_message<R>(
    read: &mut R,
    options: ReaderOptions,
) -> Result<Option<message::Reader<OwnedSegments>>>
where
    R: Read,
{
    loop {
        match read_frame(read, options)? {
            None => return Ok(None),
            Some(Frame::Message(message)) => return Ok(Some(message)),
            Some(Frame::Skipped(_)) => continue,
        }
    }
}

/// Like [`try_read_message`], but an end of stream is an error.
pub fn read_message<R>(read: &mut R, options: ReaderOptions) -> Result<message::Reader<OwnedSegments>>
where
    R: Read,
{
    match try_read_message(read, options)? {
        Some(message) => Ok(message),
        None => Err(Error::from_kind(ErrorKind::PrematureEndOfFile)
            .context("stream ended before a message")),
    }
}
