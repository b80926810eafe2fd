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

use capstone_runtime::Word;

/// A root struct with one `u64` field (42), a `List(UInt16)` holding
/// `[1, 2, 3]` and a list of two structs whose `u64` fields are 10 and 20.
pub fn tree() -> Vec<Word> {
    vec![
        0x0002_0001_0000_0000, // root: 1 data word, 2 pointers
        42,
        1 | (1 << 2) | (3 << 32) | (3 << 35), // -> word 4, TwoBytes x 3
        1 | (2 << 2) | (7 << 32) | (4 << 35), // -> word 6, composite, 4 words
        1 | (2 << 16) | (3 << 32),
        0,
        (2 << 2) | (1 << 32) | (1 << 48), // tag: 2 elements of 1 data + 1 pointer
        10,
        0,
        20,
        0,
    ]
}

/// Frames `segments` for the stream encoding.
pub fn frame(segments: &[Vec<Word>]) -> Vec<u8> {
    let mut buf = vec![];
    buf.extend((segments.len() as u32 - 1).to_le_bytes());
    for segment in segments {
        buf.extend((segment.len() as u32).to_le_bytes());
    }
    if segments.len() % 2 == 0 {
        buf.extend([0; 4]);
    }
    for segment in segments {
        for word in segment {
            buf.extend(word.to_le_bytes());
        }
    }
    buf
}
