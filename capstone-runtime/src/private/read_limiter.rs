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

use core::cell::Cell;

use crate::{Error, ErrorKind, Result};

/// The traversal budget of one session.
///
/// Counts upwards and only ever by unsigned amounts, so the count cannot
/// decrease. Not `Sync`: readers sharing a limiter stay on one thread.
pub struct ReadLimiter {
    limit: u64,
    traversed: Cell<u64>,
}

impl ReadLimiter {
    pub fn new(limit: u64) -> ReadLimiter {
        ReadLimiter {
            limit,
            traversed: Cell::new(0),
        }
    }

    /// Bills `amount` words. Fails, leaving the count untouched, if that
    /// would take the count past the limit.
    #[inline]
    pub fn can_read(&self, amount: u64) -> Result<()> {
        let current = self.traversed.get();
        match current.checked_add(amount) {
            Some(next) if next <= self.limit => {
                self.traversed.set(next);
                Ok(())
            }
            _ => Err(Error::from_kind(ErrorKind::TraversalLimitExceeded {
                limit: self.limit,
            })
            .context(format!("{current} words read, {amount} more requested"))),
        }
    }

    pub fn traversed(&self) -> u64 {
        self.traversed.get()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::ReadLimiter;
    use crate::ErrorKind;

    #[test]
    fn fails_only_past_limit() {
        let limiter = ReadLimiter::new(10);
        limiter.can_read(4).unwrap();
        limiter.can_read(6).unwrap();
        assert_eq!(limiter.traversed(), 10);
        limiter.can_read(0).unwrap();

        let err = limiter.can_read(1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TraversalLimitExceeded { limit: 10 });
        assert_eq!(limiter.traversed(), 10);
    }

    #[test]
    fn overflow_is_exceeded() {
        let limiter = ReadLimiter::new(u64::MAX);
        limiter.can_read(u64::MAX - 1).unwrap();
        assert!(limiter.can_read(2).is_err());
        assert_eq!(limiter.traversed(), u64::MAX - 1);
    }
}
