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

//! Bit-level codecs layered over a `MessageStream`.
//!
//! In-band traffic is bit packed, least significant bit first. Connectionless traffic and packet
//! headers are byte aligned and go through `OobCodec`, which shares the same call sites.

use crate::common::{
    msg::stream::MessageStream,
    net::{NetError, NetErrorKind},
};

use byteorder::{ByteOrder, LittleEndian};

pub trait BitCodec {
    /// Write the low `bits` bits of `data`.
    fn encode(
        &mut self,
        stream: &mut dyn MessageStream,
        data: u64,
        bits: u32,
    ) -> Result<(), NetError>;

    /// Read `bits` bits, returned in the low bits of the result.
    fn decode(&mut self, stream: &mut dyn MessageStream, bits: u32) -> Result<u64, NetError>;

    /// Write out any partially filled byte.
    fn flush(&mut self, stream: &mut dyn MessageStream) -> Result<(), NetError>;

    /// Discard any bits left over from a partially consumed byte.
    fn align(&mut self);

    /// Number of bits buffered but not yet flushed (writing) or not yet consumed (reading).
    fn pending_bits(&self) -> u32;
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        !0
    } else {
        (1 << bits) - 1
    }
}

/// Packs values of 1-64 bits into a byte accumulator.
///
/// Only one direction may be in progress at a time: mixing reads and writes without a `flush` or
/// `align` in between corrupts the accumulator.
#[derive(Clone, Debug, Default)]
pub struct BitPackCodec {
    acc: u64,
    count: u32,
}

impl BitPackCodec {
    pub fn new() -> BitPackCodec {
        BitPackCodec::default()
    }
}

impl BitCodec for BitPackCodec {
    fn encode(
        &mut self,
        stream: &mut dyn MessageStream,
        data: u64,
        bits: u32,
    ) -> Result<(), NetError> {
        if bits == 0 || bits > 64 {
            return Err(NetErrorKind::BadBits { bits }.into());
        }

        let mut done = 0;
        while done < bits {
            // at most 7 bits are pending, so a 32-bit chunk always fits
            let n = (bits - done).min(32);
            self.acc |= ((data >> done) & mask(n)) << self.count;
            self.count += n;
            done += n;

            while self.count >= 8 {
                stream.write(&[self.acc as u8])?;
                self.acc >>= 8;
                self.count -= 8;
            }
        }

        Ok(())
    }

    fn decode(&mut self, stream: &mut dyn MessageStream, bits: u32) -> Result<u64, NetError> {
        if bits == 0 || bits > 64 {
            return Err(NetErrorKind::BadBits { bits }.into());
        }

        let mut value = 0;
        let mut done = 0;
        while done < bits {
            let n = (bits - done).min(32);
            while self.count < n {
                let mut byte = [0u8];
                stream.read(&mut byte)?;
                self.acc |= (byte[0] as u64) << self.count;
                self.count += 8;
            }

            value |= (self.acc & mask(n)) << done;
            self.acc >>= n;
            self.count -= n;
            done += n;
        }

        Ok(value)
    }

    fn flush(&mut self, stream: &mut dyn MessageStream) -> Result<(), NetError> {
        if self.count > 0 {
            stream.write(&[self.acc as u8])?;
        }

        self.acc = 0;
        self.count = 0;
        Ok(())
    }

    fn align(&mut self) {
        self.acc = 0;
        self.count = 0;
    }

    fn pending_bits(&self) -> u32 {
        self.count
    }
}

/// Byte-aligned little-endian codec for out-of-band data.
#[derive(Clone, Copy, Debug, Default)]
pub struct OobCodec;

impl BitCodec for OobCodec {
    fn encode(
        &mut self,
        stream: &mut dyn MessageStream,
        data: u64,
        bits: u32,
    ) -> Result<(), NetError> {
        let mut buf = [0u8; 8];
        match bits {
            8 => buf[0] = data as u8,
            16 => LittleEndian::write_u16(&mut buf, data as u16),
            32 => LittleEndian::write_u32(&mut buf, data as u32),
            64 => LittleEndian::write_u64(&mut buf, data),
            _ => return Err(NetErrorKind::BadBits { bits }.into()),
        }

        stream.write(&buf[..bits as usize / 8])
    }

    fn decode(&mut self, stream: &mut dyn MessageStream, bits: u32) -> Result<u64, NetError> {
        let mut buf = [0u8; 8];
        match bits {
            8 | 16 | 32 | 64 => stream.read(&mut buf[..bits as usize / 8])?,
            _ => return Err(NetErrorKind::BadBits { bits }.into()),
        }

        Ok(match bits {
            8 => buf[0] as u64,
            16 => LittleEndian::read_u16(&buf) as u64,
            32 => LittleEndian::read_u32(&buf) as u64,
            _ => LittleEndian::read_u64(&buf),
        })
    }

    fn flush(&mut self, _stream: &mut dyn MessageStream) -> Result<(), NetError> {
        Ok(())
    }

    fn align(&mut self) {}

    fn pending_bits(&self) -> u32 {
        0
    }
}
