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

//! Fixed-point helpers for coordinates and angles.

/// A fixed-point coordinate quantizer over `[min, max]`.
///
/// Values are scaled by `precision = 2^bits / (max - min)`, rounded to the nearest step and
/// clamped to the representable range. `unpack` is the exact algebraic inverse, so a round trip is
/// lossless modulo one quantization step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetCoord {
    pub bits: u32,
    pub min: i32,
    pub max: i32,
}

pub const MIN_COORD: i32 = -8192;
pub const MAX_COORD: i32 = 8192;

impl NetCoord {
    /// The 16-bit coordinate used by protocols 5-8.
    pub const STANDARD: NetCoord = NetCoord {
        bits: 16,
        min: MIN_COORD,
        max: MAX_COORD,
    };

    /// The 18-bit coordinate used by protocols 15 and later.
    pub const EXTRA: NetCoord = NetCoord {
        bits: 18,
        min: MIN_COORD,
        max: MAX_COORD,
    };

    pub fn with_bits(bits: u32) -> NetCoord {
        NetCoord {
            bits,
            min: MIN_COORD,
            max: MAX_COORD,
        }
    }

    pub fn precision(&self) -> f32 {
        (1u64 << self.bits) as f32 / (self.max - self.min) as f32
    }

    /// The largest error `unpack(pack(v))` can introduce for in-range values.
    pub fn step(&self) -> f32 {
        1.0 / self.precision()
    }

    pub fn pack(&self, value: f32) -> u32 {
        let max_packed = ((1u64 << self.bits) - 1) as f32;
        let scaled = ((value - self.min as f32) * self.precision()).round();

        if scaled.is_nan() || scaled < 0.0 {
            0
        } else if scaled > max_packed {
            max_packed as u32
        } else {
            scaled as u32
        }
    }

    pub fn unpack(&self, packed: u32) -> f32 {
        packed as f32 / self.precision() + self.min as f32
    }
}

/// Convert an angle in degrees to its 8-bit wire form.
pub fn angle_to_byte(angle: f32) -> u8 {
    ((angle * 256.0 / 360.0) as i32 & 0xFF) as u8
}

pub fn byte_to_angle(b: u8) -> f32 {
    b as f32 * (360.0 / 256.0)
}

/// Convert an angle in degrees to its 16-bit wire form.
pub fn angle_to_short(angle: f32) -> u16 {
    ((angle * 65536.0 / 360.0) as i32 & 0xFFFF) as u16
}

pub fn short_to_angle(s: u16) -> f32 {
    s as f32 * (360.0 / 65536.0)
}

/// Quantize an angle to `bits` bits of a full circle.
pub fn pack_angle(angle: f32, bits: u32) -> u32 {
    let steps = (1u64 << bits) as f32;
    ((angle * steps / 360.0) as i64 & ((1i64 << bits) - 1)) as u32
}

pub fn unpack_angle(packed: u32, bits: u32) -> f32 {
    packed as f32 * (360.0 / (1u64 << bits) as f32)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_net_coord_standard_precision() {
        assert_eq!(NetCoord::STANDARD.precision(), 4.0);
        assert_eq!(NetCoord::EXTRA.precision(), 16.0);
    }

    #[test]
    fn test_net_coord_standard_within_one_step() {
        let coord = NetCoord::STANDARD;
        let mut v = -8192.0f32;
        while v < 8192.0 {
            let back = coord.unpack(coord.pack(v));
            assert!((back - v).abs() <= 0.25, "{} -> {}", v, back);
            v += 3.17;
        }
    }

    #[test]
    fn test_net_coord_extra_within_one_step() {
        let coord = NetCoord::EXTRA;
        for &v in &[-8192.0f32, -1000.03, -0.01, 0.0, 0.5, 17.3, 4095.99, 8191.9] {
            let back = coord.unpack(coord.pack(v));
            assert!((back - v).abs() <= coord.step(), "{} -> {}", v, back);
        }
    }

    #[test]
    fn test_net_coord_clamps_out_of_range() {
        let coord = NetCoord::STANDARD;
        assert_eq!(coord.pack(-10000.0), 0);
        assert_eq!(coord.pack(10000.0), 0xFFFF);
        assert_eq!(coord.unpack(0), -8192.0);
    }

    #[test]
    fn test_angle_byte_round_trip() {
        for b in 0..=255u8 {
            assert_eq!(angle_to_byte(byte_to_angle(b)), b);
        }
        assert_eq!(angle_to_byte(-90.0), 192);
    }

    #[test]
    fn test_angle_short_round_trip() {
        for &s in &[0u16, 1, 16384, 32768, 65535] {
            assert_eq!(angle_to_short(short_to_angle(s)), s);
        }
    }
}
