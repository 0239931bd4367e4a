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

pub mod codec;
pub mod coord;
pub mod stream;

use crate::common::{
    msg::{
        codec::{BitCodec, BitPackCodec, OobCodec},
        stream::MessageStream,
    },
    net::{NetError, NetErrorKind},
};

/// Maximum length of a string read from a message, terminator excluded.
pub const MAX_STRING_CHARS: usize = 1024;

/// Maximum length of a big string (gamestate config strings).
pub const BIG_INFO_STRING: usize = 8192;

const FLOAT_INT_BITS: u32 = 13;
const FLOAT_INT_BIAS: i32 = 1 << (FLOAT_INT_BITS - 1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CodecMode {
    Bitstream,
    Oob,
}

/// A reader/writer over a message stream.
///
/// The same call sites serve both bit-packed in-band data and byte-aligned out-of-band data; the
/// active codec decides how values are laid out.
pub struct Msg<'s> {
    stream: &'s mut dyn MessageStream,
    bits: BitPackCodec,
    oob: OobCodec,
    mode: CodecMode,
}

impl<'s> Msg<'s> {
    /// Create a bit-packed message over `stream`.
    pub fn new(stream: &'s mut dyn MessageStream) -> Msg<'s> {
        Msg {
            stream,
            bits: BitPackCodec::new(),
            oob: OobCodec,
            mode: CodecMode::Bitstream,
        }
    }

    /// Create a byte-aligned message over `stream`.
    pub fn oob(stream: &'s mut dyn MessageStream) -> Msg<'s> {
        Msg {
            mode: CodecMode::Oob,
            ..Msg::new(stream)
        }
    }

    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    /// Switch codecs, writing out or discarding any partial byte first.
    pub fn set_mode(&mut self, mode: CodecMode, writing: bool) -> Result<(), NetError> {
        if mode != self.mode {
            if writing {
                self.bits.flush(&mut *self.stream)?;
            } else {
                self.bits.align();
            }
            self.mode = mode;
        }

        Ok(())
    }

    pub fn stream(&mut self) -> &mut dyn MessageStream {
        &mut *self.stream
    }

    /// Bytes consumed or produced so far, counting a partial byte as a whole one.
    pub fn byte_position(&self) -> usize {
        self.stream.position()
    }

    fn codec(&mut self) -> (&mut dyn BitCodec, &mut dyn MessageStream) {
        match self.mode {
            CodecMode::Bitstream => (&mut self.bits, &mut *self.stream),
            CodecMode::Oob => (&mut self.oob, &mut *self.stream),
        }
    }

    /// Write any partially filled byte to the stream.
    pub fn flush(&mut self) -> Result<(), NetError> {
        let (codec, stream) = self.codec();
        codec.flush(stream)
    }

    /// Drop the remainder of a partially read byte.
    pub fn align(&mut self) {
        self.bits.align();
    }

    /// Write `bits` bits of `value`. A negative width writes a signed value.
    pub fn write_bits(&mut self, value: i64, bits: i32) -> Result<(), NetError> {
        let width = bits.abs() as u32;
        let (codec, stream) = self.codec();
        codec.encode(stream, value as u64, width)
    }

    /// Read `bits` bits. A negative width sign-extends the result.
    pub fn read_bits(&mut self, bits: i32) -> Result<i64, NetError> {
        let width = bits.abs() as u32;
        let raw = {
            let (codec, stream) = self.codec();
            codec.decode(stream, width)?
        };

        if bits < 0 && width < 64 && raw & (1 << (width - 1)) != 0 {
            Ok((raw | !((1u64 << width) - 1)) as i64)
        } else {
            Ok(raw as i64)
        }
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), NetError> {
        self.write_bits(value as i64, 1)
    }

    pub fn read_bool(&mut self) -> Result<bool, NetError> {
        Ok(self.read_bits(1)? != 0)
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), NetError> {
        self.write_bits(value as i64, 8)
    }

    pub fn read_byte(&mut self) -> Result<u8, NetError> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn write_short(&mut self, value: i16) -> Result<(), NetError> {
        self.write_bits(value as u16 as i64, 16)
    }

    pub fn read_short(&mut self) -> Result<i16, NetError> {
        Ok(self.read_bits(16)? as u16 as i16)
    }

    pub fn write_long(&mut self, value: i32) -> Result<(), NetError> {
        self.write_bits(value as u32 as i64, 32)
    }

    pub fn read_long(&mut self) -> Result<i32, NetError> {
        Ok(self.read_bits(32)? as u32 as i32)
    }

    pub fn write_float(&mut self, value: f32) -> Result<(), NetError> {
        self.write_bits(value.to_bits() as i64, 32)
    }

    pub fn read_float(&mut self) -> Result<f32, NetError> {
        Ok(f32::from_bits(self.read_bits(32)? as u32))
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<(), NetError> {
        for b in data {
            self.write_byte(*b)?;
        }

        Ok(())
    }

    pub fn read_data(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(self.read_byte()?);
        }

        Ok(data)
    }

    /// Write a null-terminated byte string of at most `max` characters.
    pub fn write_raw_string(&mut self, s: &[u8], max: usize) -> Result<(), NetError> {
        if s.len() >= max {
            return Err(NetErrorKind::StringTooLong { max }.into());
        }

        self.write_data(s)?;
        self.write_byte(0)
    }

    /// Read a null-terminated byte string, failing if it runs past `max` characters.
    pub fn read_raw_string(&mut self, max: usize) -> Result<Vec<u8>, NetError> {
        let mut s = Vec::new();
        loop {
            let c = self.read_byte()?;
            if c == 0 {
                break;
            }

            if s.len() >= max {
                return Err(NetErrorKind::StringTooLong { max }.into());
            }

            s.push(c);
        }

        Ok(s)
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), NetError> {
        self.write_raw_string(s.as_bytes(), MAX_STRING_CHARS)
    }

    /// Read a string, replacing invalid UTF-8 sequences.
    pub fn read_string(&mut self) -> Result<String, NetError> {
        let raw = self.read_raw_string(MAX_STRING_CHARS)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Write an unconstrained float: zero, a small truncated integer, or the full 32 bits.
    pub fn write_float_compressed(&mut self, value: f32) -> Result<(), NetError> {
        let trunc = value as i32;
        if value == 0.0 && value.is_sign_positive() {
            self.write_bool(false)
        } else if trunc as f32 == value
            && trunc + FLOAT_INT_BIAS >= 0
            && trunc + FLOAT_INT_BIAS < 1 << FLOAT_INT_BITS
            && !(trunc == 0 && value.is_sign_negative())
        {
            self.write_bool(true)?;
            self.write_bool(false)?;
            self.write_bits((trunc + FLOAT_INT_BIAS) as i64, FLOAT_INT_BITS as i32)
        } else {
            self.write_bool(true)?;
            self.write_bool(true)?;
            self.write_float(value)
        }
    }

    pub fn read_float_compressed(&mut self) -> Result<f32, NetError> {
        if !self.read_bool()? {
            return Ok(0.0);
        }

        if !self.read_bool()? {
            let trunc = self.read_bits(FLOAT_INT_BITS as i32)? as i32 - FLOAT_INT_BIAS;
            Ok(trunc as f32)
        } else {
            self.read_float()
        }
    }

    /// Write `to` xor-ed with `key` if it differs from `from`, preceded by a changed bit.
    pub fn write_delta_key(&mut self, key: u32, from: u32, to: u32, bits: i32) -> Result<(), NetError> {
        if from == to {
            return self.write_bool(false);
        }

        self.write_bool(true)?;
        self.write_bits((to ^ key) as i64, bits)
    }

    pub fn read_delta_key(&mut self, key: u32, from: u32, bits: i32) -> Result<u32, NetError> {
        if !self.read_bool()? {
            return Ok(from);
        }

        let width = bits.abs() as u32;
        let key_mask = if width >= 32 { !0 } else { (1u32 << width) - 1 };
        Ok((self.read_bits(width as i32)? as u32 ^ (key & key_mask)) & key_mask)
    }
}
