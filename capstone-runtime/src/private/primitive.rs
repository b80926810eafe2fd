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

use crate::pointer::ElementSize;

/// A value stored directly in a data section or a list body.
///
/// Values are `BITS` wide and aligned to their own width, so a value never
/// straddles two words.
pub trait Primitive: Copy {
    const BITS: usize;

    fn element_size() -> ElementSize;

    /// Converts the low `BITS` bits of a word.
    fn from_bits(bits: u64) -> Self;
}

macro_rules! primitive_impl(
    ($typ:ty, $bits:expr, $size:ident) => (
        impl Primitive for $typ {
            const BITS: usize = $bits;

            #[inline]
            fn element_size() -> ElementSize {
                ElementSize::$size
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                bits as $typ
            }
        }
        );
    );

primitive_impl!(u8, 8, Byte);
primitive_impl!(i8, 8, Byte);
primitive_impl!(u16, 16, TwoBytes);
primitive_impl!(i16, 16, TwoBytes);
primitive_impl!(u32, 32, FourBytes);
primitive_impl!(i32, 32, FourBytes);
primitive_impl!(u64, 64, EightBytes);
primitive_impl!(i64, 64, EightBytes);

impl Primitive for f32 {
    const BITS: usize = 32;

    fn element_size() -> ElementSize {
        ElementSize::FourBytes
    }

    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl Primitive for f64 {
    const BITS: usize = 64;

    fn element_size() -> ElementSize {
        ElementSize::EightBytes
    }

    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl Primitive for bool {
    const BITS: usize = 1;

    fn element_size() -> ElementSize {
        ElementSize::Bit
    }

    fn from_bits(bits: u64) -> Self {
        bits & 1 != 0
    }
}

impl Primitive for () {
    const BITS: usize = 0;

    fn element_size() -> ElementSize {
        ElementSize::Void
    }

    fn from_bits(_bits: u64) -> Self {}
}
