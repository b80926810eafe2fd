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

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{Future, LocalBoxFuture};
use futures::stream::Stream;
use futures::AsyncRead;
use tracing::debug;

use capstone_runtime::message;
use capstone_runtime::serialize::OwnedSegments;
use capstone_runtime::Result;

type NextMessage<R> = (R, Option<message::Reader<OwnedSegments>>);

async fn next_message<R>(mut read: R, options: message::ReaderOptions) -> Result<NextMessage<R>>
where
    R: AsyncRead + Unpin,
{
    let message = crate::serialize::try_read_message(&mut read, options).await?;
    Ok((read, message))
}

/// The messages of a byte stream, in order. Over-limit frames are skipped.
///
/// The stream ends after the input ends cleanly or after the first error.
#[must_use = "streams do nothing unless polled"]
pub struct ReadStream<'a, R>
where
    R: AsyncRead + Unpin + 'a,
{
    options: message::ReaderOptions,
    read: Option<LocalBoxFuture<'a, Result<NextMessage<R>>>>,
}

impl<'a, R> Unpin for ReadStream<'a, R> where R: AsyncRead + Unpin + 'a {}

impl<'a, R> ReadStream<'a, R>
where
    R: AsyncRead + Unpin + 'a,
{
    pub fn new(reader: R, options: message::ReaderOptions) -> ReadStream<'a, R> {
        ReadStream {
            read: Some(Box::pin(next_message(reader, options))),
            options,
        }
    }
}

impl<'a, R> Stream for ReadStream<'a, R>
where
    R: AsyncRead + Unpin + 'a,
{
    type Item = Result<message::Reader<OwnedSegments>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(read) = self.read.as_mut() else {
            return Poll::Ready(None);
        };
        let (r, m) = match Future::poll(read.as_mut(), cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => {
                debug!(error = %e, "message stream failed");
                self.read = None;
                return Poll::Ready(Some(Err(e)));
            }
            Poll::Ready(Ok(x)) => x,
        };
        match m {
            Some(message) => {
                let options = self.options;
                self.read = Some(Box::pin(next_message(r, options)));
                Poll::Ready(Some(Ok(message)))
            }
            None => {
                self.read = None;
                Poll::Ready(None)
            }
        }
    }
}

/// Shorthand for [`ReadStream::new`].
pub fn read_stream<'a, R>(reader: R, options: message::ReaderOptions) -> ReadStream<'a, R>
where
    R: AsyncRead + Unpin + 'a,
{
    ReadStream::new(reader, options)
}

#[cfg(test)]
mod test {
    use futures::io::Cursor;
    use futures::TryStreamExt;

    use super::read_stream;
    use crate::serialize::test::{write_frame, BlockingRead};
    use capstone_runtime::message::{ReaderOptions, ReaderSegments};
    use capstone_runtime::ErrorKind;

    #[test]
    fn reads_each_message_then_ends() {
        let mut buf = vec![];
        write_frame(&mut buf, &[vec![1]]);
        write_frame(&mut buf, &[vec![2, 3], vec![4]]);
        write_frame(&mut buf, &[vec![5]]);

        let mut options = ReaderOptions::new();
        options.segment_limit(1);
        let stream = read_stream(BlockingRead::new(Cursor::new(buf), 3), options);
        let messages = futures::executor::block_on(stream.try_collect::<Vec<_>>()).unwrap();

        let firsts: Vec<u64> = messages
            .iter()
            .map(|m| m.segments().get_segment(0).unwrap()[0])
            .collect();
        assert_eq!(firsts, vec![1, 5]);
    }

    #[test]
    fn ends_after_an_error() {
        let mut buf = vec![];
        write_frame(&mut buf, &[vec![1]]);
        buf.extend([0, 0, 0, 0, 1, 0, 0, 0]);

        let mut stream = read_stream(Cursor::new(buf), ReaderOptions::new());
        futures::executor::block_on(async {
            assert!(stream.try_next().await.unwrap().is_some());
            assert_eq!(
                stream.try_next().await.err().unwrap().kind,
                ErrorKind::PrematureEndOfFile
            );
            assert!(stream.try_next().await.unwrap().is_none());
        });
    }

    #[test]
    fn empty_input_is_an_empty_stream() {
        let stream = read_stream(Cursor::new(Vec::new()), ReaderOptions::new());
        let messages = futures::executor::block_on(stream.try_collect::<Vec<_>>()).unwrap();
        assert!(messages.is_empty());
    }
}
