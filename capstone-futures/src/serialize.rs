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

//! Asynchronous reading of messages in the standard stream framing.
//!
//! The frame layout and its limits are those of
//! [`capstone_runtime::serialize`]; only the I/O is asynchronous.

use futures::{AsyncRead, AsyncReadExt};
use tracing::trace;

use capstone_runtime::message;
use capstone_runtime::private::units::BYTES_PER_WORD;
use capstone_runtime::serialize::{
    check_padding, check_segment_count, padding_len, segment_count, sum_lengths, Frame,
    OwnedSegments, SegmentTable,
};
use capstone_runtime::{Error, ErrorKind, Result};

/// Segment lengths are read in chunks of this many when a frame is skipped.
const SKIP_CHUNK_LENGTHS: usize = 512;

/// Fills `buf`, or returns `false` if the stream was already at its end.
async fn read_exact_or_eof<R>(read: &mut R, buf: &mut [u8]) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match read.read(&mut buf[filled..]).await? {
            0 if filled == 0 => return Ok(false),
            0 => return Err(Error::from_kind(ErrorKind::PrematureEndOfFile)),
            n => filled += n,
        }
    }
    Ok(true)
}

async fn skip_words<R>(read: &mut R, words: u64) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let bytes = words.saturating_mul(BYTES_PER_WORD as u64);
    let skipped = futures::io::copy(read.take(bytes), &mut futures::io::sink()).await?;
    trace!(bytes = skipped, "skipped frame body");
    if skipped < bytes {
        Err(Error::from_kind(ErrorKind::PrematureEndOfFile))
    } else {
        Ok(())
    }
}

/// Asynchronously reads one frame from `read`. Returns `None` if the stream
/// ends cleanly before the frame starts.
pub async fn read_frame<R>(
    read: &mut R,
    options: message::ReaderOptions,
) -> Result<Option<Frame<OwnedSegments>>>
where
    R: AsyncRead + Unpin,
{
    let mut first = [0u8; 4];
    if !read_exact_or_eof(read, &mut first).await? {
        return Ok(None);
    }
    let segment_count = segment_count(first);

    if let Some(reason) = check_segment_count(segment_count, &options) {
        let mut chunk = vec![0u8; 4 * SKIP_CHUNK_LENGTHS];
        let mut remaining = segment_count;
        let mut total_words = 0u64;
        while remaining > 0 {
            let n = remaining.min(SKIP_CHUNK_LENGTHS as u64) as usize;
            read.read_exact(&mut chunk[..n * 4]).await?;
            total_words += sum_lengths(&chunk[..n * 4]);
            remaining -= n as u64;
        }
        let mut padding = [0u8; 4];
        read.read_exact(&mut padding[..padding_len(segment_count)])
            .await?;
        skip_words(read, total_words).await?;
        return Ok(Some(Frame::Skipped(reason)));
    }

    let mut lengths = vec![0u8; segment_count as usize * 4];
    read.read_exact(&mut lengths).await?;
    let table = SegmentTable::from_le_bytes(&lengths);

    let mut padding = [0u8; 4];
    let padding = &mut padding[..padding_len(segment_count)];
    read.read_exact(padding).await?;
    check_padding(padding);

    if let Some(reason) = table.check_size(&options) {
        skip_words(read, table.total_words()).await?;
        return Ok(Some(Frame::Skipped(reason)));
    }

    let mut body = vec![0u8; table.body_len()?];
    read.read_exact(&mut body).await?;
    let segments = OwnedSegments::from_le_bytes(&table, &body)?;
    Ok(Some(Frame::Message(message::Reader::new(segments, options))))
}

/// Asynchronously reads the next message from `read`, skipping frames that
/// exceed the limits in `options`. Returns `None` at a clean end of stream.
pub async fn try_read_message<R>(
    read: &mut R,
    options: message::ReaderOptions,
) -> Result<Option<message::Reader<OwnedSegments>>>
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(read, options).await? {
            None => return Ok(None),
            Some(Frame::Message(message)) => return Ok(Some(message)),
            Some(Frame::Skipped(_)) => continue,
        }
    }
}

/// Like [`try_read_message`], but an end of stream is an error.
pub async fn read_message<R>(
    read: &mut R,
    options: message::ReaderOptions,
) -> Result<message::Reader<OwnedSegments>>
where
    R: AsyncRead + Unpin,
{
    match try_read_message(read, options).await? {
        Some(message) => Ok(message),
        None => Err(Error::from_kind(ErrorKind::PrematureEndOfFile)
            .context("stream ended before a message")),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use byteorder::{LittleEndian, WriteBytesExt};
    use futures::io::Cursor;
    use futures::AsyncRead;
    use quickcheck::{quickcheck, TestResult};

    use super::{read_frame, read_message, try_read_message};
    use capstone_runtime::message::{ReaderOptions, ReaderSegments};
    use capstone_runtime::serialize::{Frame, SkipReason};
    use capstone_runtime::{ErrorKind, Word};

    /// Wraps an `AsyncRead` and returns `Pending` every `frequency` bytes.
    pub(crate) struct BlockingRead<R>
    where
        R: AsyncRead + Unpin,
    {
        read: R,

        /// Number of bytes to read before blocking
        frequency: usize,

        /// Number of bytes left before the next block
        idx: usize,
    }

    impl<R> BlockingRead<R>
    where
        R: AsyncRead + Unpin,
    {
        pub(crate) fn new(read: R, frequency: usize) -> BlockingRead<R> {
            BlockingRead {
                read,
                frequency,
                idx: frequency,
            }
        }
    }

    impl<R> AsyncRead for BlockingRead<R>
    where
        R: AsyncRead + Unpin,
    {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut [u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.idx == 0 {
                self.idx = self.frequency;
                cx.waker().wake_by_ref();
                Poll::Pending
            } else {
                let len = std::cmp::min(self.idx, buf.len());
                let BlockingRead { read, idx, .. } = &mut *self;
                match Pin::new(read).poll_read(cx, &mut buf[..len]) {
                    Poll::Ready(Ok(n)) => {
                        *idx -= n;
                        Poll::Ready(Ok(n))
                    }
                    other => other,
                }
            }
        }
    }

    pub(crate) fn write_frame(buf: &mut Vec<u8>, segments: &[Vec<Word>]) {
        buf.write_u32::<LittleEndian>(segments.len() as u32 - 1).unwrap();
        for segment in segments {
            buf.write_u32::<LittleEndian>(segment.len() as u32).unwrap();
        }
        if segments.len() % 2 == 0 {
            buf.write_u32::<LittleEndian>(0).unwrap();
        }
        for segment in segments {
            for word in segment {
                buf.write_u64::<LittleEndian>(*word).unwrap();
            }
        }
    }

    #[test]
    fn two_segments_with_padding() {
        let buf: [u8; 32] = [1,0,0,0, // 2 segments
                             1,0,0,0, // 1 length
                             1,0,0,0, // 1 length
                             0,0,0,0, // padding
                             1,0,0,0,0,0,0,0,
                             2,0,0,0,0,0,0,0];
        for frequency in [1, 3, 32] {
            let mut read = BlockingRead::new(Cursor::new(&buf[..]), frequency);
            let message =
                futures::executor::block_on(read_message(&mut read, ReaderOptions::new()))
                    .unwrap();
            let segments = message.into_segments();
            assert_eq!(segments.len(), 2);
            assert_eq!(segments.get_segment(0), Some(&[1u64][..]));
            assert_eq!(segments.get_segment(1), Some(&[2u64][..]));
        }
    }

    #[test]
    fn too_many_segments_is_skipped() {
        let mut buf: Vec<u8> = vec![];
        buf.extend([0, 2, 0, 0]); // 513 segments
        buf.extend([1, 0, 0, 0].repeat(513));
        buf.extend([0; 513 * 8]);
        let skipped_len = buf.len() as u64;
        write_frame(&mut buf, &[vec![42]]);

        let mut cursor = Cursor::new(&buf[..]);
        futures::executor::block_on(async {
            match read_frame(&mut cursor, ReaderOptions::new()).await.unwrap() {
                Some(Frame::Skipped(reason)) => assert_eq!(
                    reason,
                    SkipReason::TooManySegments {
                        segment_count: 513,
                        limit: 512
                    }
                ),
                _ => panic!("expected a skipped frame"),
            }
            assert_eq!(cursor.position(), skipped_len);

            let message = try_read_message(&mut cursor, ReaderOptions::new())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(message.segments().get_segment(0), Some(&[42u64][..]));
            assert!(try_read_message(&mut cursor, ReaderOptions::new())
                .await
                .unwrap()
                .is_none());
        });
    }

    #[test]
    fn too_many_words_is_skipped() {
        let mut buf = vec![];
        write_frame(&mut buf, &[vec![1, 2, 3], vec![4]]);
        write_frame(&mut buf, &[vec![5]]);

        let mut options = ReaderOptions::new();
        options.traversal_limit_in_words(3);
        let mut read = BlockingRead::new(Cursor::new(&buf[..]), 5);
        let message = futures::executor::block_on(read_message(&mut read, options)).unwrap();
        assert_eq!(message.segments().get_segment(0), Some(&[5u64][..]));
    }

    #[test]
    fn truncated_frames() {
        let mut cursor = Cursor::new(&b""[..]);
        assert!(
            futures::executor::block_on(try_read_message(&mut cursor, ReaderOptions::new()))
                .unwrap()
                .is_none()
        );

        for buf in [
            &[0u8, 0][..],
            &[1, 0, 0, 0, 0, 0, 0, 0][..],
            &[0, 0, 0, 0, 1, 0, 0, 0, 9, 9][..],
            &[0, 2, 0, 0, 1, 0, 0, 0][..],
        ] {
            let mut read = BlockingRead::new(Cursor::new(buf), 2);
            let result =
                futures::executor::block_on(try_read_message(&mut read, ReaderOptions::new()));
            assert_eq!(result.err().unwrap().kind, ErrorKind::PrematureEndOfFile);
        }
    }

    #[test]
    fn check_round_trip_async() {
        fn round_trip(read_block_frequency: usize, segments: Vec<Vec<Word>>) -> TestResult {
            if segments.is_empty() || segments.len() > 512 || read_block_frequency == 0 {
                return TestResult::discard();
            }
            let mut buf = vec![];
            write_frame(&mut buf, &segments);

            let mut read = BlockingRead::new(Cursor::new(&buf[..]), read_block_frequency);
            let message =
                futures::executor::block_on(read_message(&mut read, ReaderOptions::new()))
                    .unwrap();
            let result_segments = message.into_segments();

            TestResult::from_bool(
                result_segments.len() == segments.len()
                    && segments.iter().enumerate().all(|(i, segment)| {
                        &segment[..] == result_segments.get_segment(i as u32).unwrap()
                    }),
            )
        }

        quickcheck(round_trip as fn(usize, Vec<Vec<Word>>) -> TestResult);
    }
}
