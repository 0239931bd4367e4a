// Copyright © 2018 Cormac O'Brien
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
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Byte-level cursors over message buffers.

use crate::common::net::{NetError, NetErrorKind, StreamDirection};

/// Origin for `MessageStream::seek`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekPos {
    Begin,
    Current,
    End,
}

/// A readable and writable byte cursor.
///
/// Reads never go past `length()`; writes extend `length()` as they go.
pub trait MessageStream {
    fn read(&mut self, dst: &mut [u8]) -> Result<(), NetError>;

    fn write(&mut self, src: &[u8]) -> Result<(), NetError>;

    fn seek(&mut self, offset: isize, from: SeekPos) -> Result<(), NetError>;

    fn position(&self) -> usize;

    fn length(&self) -> usize;

    /// The bytes written so far, `[0, length())`.
    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];

    /// Number of bytes left before the read cursor hits `length()`.
    fn remaining(&self) -> usize {
        self.length().saturating_sub(self.position())
    }
}

fn seek_target(position: usize, length: usize, offset: isize, from: SeekPos) -> Option<usize> {
    let base = match from {
        SeekPos::Begin => 0,
        SeekPos::Current => position as isize,
        SeekPos::End => length as isize,
    };

    let target = base + offset;
    if target < 0 {
        None
    } else {
        Some(target as usize)
    }
}

/// A stream over a caller-owned buffer of fixed capacity.
pub struct FixedStream<'a> {
    buf: &'a mut [u8],
    len: usize,
    pos: usize,
}

impl<'a> FixedStream<'a> {
    /// Create an empty stream for writing into `buf`.
    pub fn new(buf: &'a mut [u8]) -> FixedStream<'a> {
        FixedStream { buf, len: 0, pos: 0 }
    }

    /// Create a stream for reading the whole of `buf`.
    pub fn for_reading(buf: &'a mut [u8]) -> FixedStream<'a> {
        let len = buf.len();
        FixedStream { buf, len, pos: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<'a> MessageStream for FixedStream<'a> {
    fn read(&mut self, dst: &mut [u8]) -> Result<(), NetError> {
        let end = self.pos + dst.len();
        if end > self.len {
            return Err(NetErrorKind::StreamOverflow {
                direction: StreamDirection::Reading,
            }
            .into());
        }

        dst.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn write(&mut self, src: &[u8]) -> Result<(), NetError> {
        let end = self.pos + src.len();
        if end > self.buf.len() {
            return Err(NetErrorKind::StreamOverflow {
                direction: StreamDirection::Writing,
            }
            .into());
        }

        self.buf[self.pos..end].copy_from_slice(src);
        self.pos = end;
        if end > self.len {
            self.len = end;
        }

        Ok(())
    }

    fn seek(&mut self, offset: isize, from: SeekPos) -> Result<(), NetError> {
        match seek_target(self.pos, self.len, offset, from) {
            Some(target) if target <= self.len => {
                self.pos = target;
                Ok(())
            }
            _ => Err(NetErrorKind::StreamOverflow {
                direction: StreamDirection::Reading,
            }
            .into()),
        }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn length(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }
}

/// A self-growing stream.
///
/// Writes never overflow. Seeking past the end extends the stream with zeros.
pub struct DynamicStream {
    buf: Vec<u8>,
    pos: usize,
}

impl DynamicStream {
    pub fn new() -> DynamicStream {
        DynamicStream {
            buf: Vec::new(),
            pos: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> DynamicStream {
        DynamicStream {
            buf: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Create a stream positioned at the start of existing data.
    pub fn from_vec(buf: Vec<u8>) -> DynamicStream {
        DynamicStream { buf, pos: 0 }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn grow_to(&mut self, len: usize) {
        if len > self.buf.capacity() {
            let extra = self.buf.capacity() * 2 + (len - self.buf.len());
            self.buf.reserve(extra);
        }

        if len > self.buf.len() {
            self.buf.resize(len, 0);
        }
    }
}

impl MessageStream for DynamicStream {
    fn read(&mut self, dst: &mut [u8]) -> Result<(), NetError> {
        let end = self.pos + dst.len();
        if end > self.buf.len() {
            return Err(NetErrorKind::StreamOverflow {
                direction: StreamDirection::Reading,
            }
            .into());
        }

        dst.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn write(&mut self, src: &[u8]) -> Result<(), NetError> {
        let end = self.pos + src.len();
        self.grow_to(end);
        self.buf[self.pos..end].copy_from_slice(src);
        self.pos = end;
        Ok(())
    }

    fn seek(&mut self, offset: isize, from: SeekPos) -> Result<(), NetError> {
        let target = seek_target(self.pos, self.buf.len(), offset, from).ok_or(
            NetErrorKind::StreamOverflow {
                direction: StreamDirection::Reading,
            },
        )?;

        self.grow_to(target);
        self.pos = target;
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn length(&self) -> usize {
        self.buf.len()
    }

    fn data(&self) -> &[u8] {
        &self.buf
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
