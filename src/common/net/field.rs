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

//! Table-driven delta compression.
//!
//! A field table lists the members of a state type in wire order. A delta starts with the number
//! of fields up to and including the last changed one, followed by a changed bit per field and the
//! value of each changed field. Fields after the last changed one are copied from the source.

use crate::common::{
    msg::{
        coord::{pack_angle, unpack_angle, NetCoord},
        Msg,
    },
    net::{NetError, NetErrorKind},
};

const FLOAT_INT_BITS: i32 = 13;
const FLOAT_INT_BIAS: i32 = 1 << (FLOAT_INT_BITS - 1);

/// How a field's value is mapped to bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// Integers are sent at the table width (negative for signed); floats use the compact form.
    Regular,
    /// Fraction of a full circle at the table width.
    Angle,
    /// Seconds in hundredths.
    AnimTime,
    /// `[0, 1]` in 255ths.
    AnimWeight,
    /// Hundredths.
    Scale,
    /// `[0, 1]` in 255ths.
    Alpha,
    /// `NetCoord` at the table width.
    Coord,
    /// Eighths of a unit, signed.
    Velocity,
}

pub enum Access<T> {
    Int(fn(&T) -> i32, fn(&mut T, i32)),
    Float(fn(&T) -> f32, fn(&mut T, f32)),
}

pub struct NetField<T> {
    pub name: &'static str,
    pub bits: i32,
    pub kind: FieldKind,
    pub access: Access<T>,
}

impl<T> NetField<T> {
    fn differs(&self, a: &T, b: &T) -> bool {
        match self.access {
            Access::Int(get, _) => get(a) != get(b),
            Access::Float(get, _) => get(a).to_bits() != get(b).to_bits(),
        }
    }

    fn copy(&self, src: &T, dst: &mut T) {
        match self.access {
            Access::Int(get, set) => set(dst, get(src)),
            Access::Float(get, set) => set(dst, get(src)),
        }
    }
}

/// An ordered, closed list of fields. Reordering it changes the wire format.
pub struct FieldTable<T: 'static> {
    pub name: &'static str,
    pub fields: &'static [NetField<T>],

    /// Precede every changed value with a bit telling whether it is zero.
    pub zero_shortcut: bool,
}

/// Declare an integer field: `int_field!(Type, bits, path.to.member)`.
#[macro_export]
macro_rules! int_field {
    ($t:ty, $bits:expr, $($f:tt)+) => {
        $crate::common::net::field::NetField {
            name: stringify!($($f)+),
            bits: $bits,
            kind: $crate::common::net::field::FieldKind::Regular,
            access: $crate::common::net::field::Access::Int(
                |s: &$t| s.$($f)+ as i32,
                |s: &mut $t, v: i32| s.$($f)+ = v as _,
            ),
        }
    };
}

/// Declare a float field: `float_field!(Type, Kind, bits, path.to.member)`.
#[macro_export]
macro_rules! float_field {
    ($t:ty, $kind:ident, $bits:expr, $($f:tt)+) => {
        $crate::common::net::field::NetField {
            name: stringify!($($f)+),
            bits: $bits,
            kind: $crate::common::net::field::FieldKind::$kind,
            access: $crate::common::net::field::Access::Float(
                |s: &$t| s.$($f)+,
                |s: &mut $t, v: f32| s.$($f)+ = v,
            ),
        }
    };
}

/// Number of fields up to and including the last one that differs between `from` and `to`.
pub fn last_changed<T>(table: &FieldTable<T>, from: &T, to: &T) -> usize {
    table
        .fields
        .iter()
        .rposition(|f| f.differs(from, to))
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Write the delta from `from` (or the default state) to `to`.
///
/// Returns false without writing anything if nothing changed and `force` is not set.
pub fn write_delta_fields<T>(
    msg: &mut Msg,
    table: &FieldTable<T>,
    from: Option<&T>,
    to: &T,
    force: bool,
) -> Result<bool, NetError>
where
    T: Default,
{
    let default;
    let from = match from {
        Some(f) => f,
        None => {
            default = T::default();
            &default
        }
    };

    let lc = last_changed(table, from, to);
    if lc == 0 && !force {
        return Ok(false);
    }

    msg.write_byte(lc as u8)?;
    for field in table.fields[..lc].iter() {
        if !field.differs(from, to) {
            msg.write_bool(false)?;
            continue;
        }

        msg.write_bool(true)?;
        write_field(msg, field, to, table.zero_shortcut)?;
    }

    Ok(true)
}

/// Read a delta against `from` (or the default state) and return the resulting state.
pub fn read_delta_fields<T>(
    msg: &mut Msg,
    table: &FieldTable<T>,
    from: Option<&T>,
) -> Result<T, NetError>
where
    T: Clone + Default,
{
    let mut to = match from {
        Some(f) => f.clone(),
        None => T::default(),
    };

    let lc = msg.read_byte()? as usize;
    if lc > table.fields.len() {
        return Err(NetErrorKind::BadFieldCount {
            count: lc,
            max: table.fields.len(),
        }
        .into());
    }

    for field in table.fields[..lc].iter() {
        if msg.read_bool()? {
            read_field(msg, field, &mut to, table.zero_shortcut)?;
        }
    }

    Ok(to)
}

/// Copy every field of `table` from `src` into `dst`.
pub fn copy_fields<T>(table: &FieldTable<T>, src: &T, dst: &mut T) {
    for field in table.fields.iter() {
        field.copy(src, dst);
    }
}

fn scale_for(kind: FieldKind) -> f32 {
    match kind {
        FieldKind::AnimTime | FieldKind::Scale => 100.0,
        FieldKind::AnimWeight | FieldKind::Alpha => 255.0,
        FieldKind::Velocity => 8.0,
        _ => 1.0,
    }
}

fn write_field<T>(
    msg: &mut Msg,
    field: &NetField<T>,
    to: &T,
    zero_shortcut: bool,
) -> Result<(), NetError> {
    match field.access {
        Access::Int(get, _) => {
            let v = get(to);
            trace!("{}: {}", field.name, v);
            if zero_shortcut {
                if v == 0 {
                    return msg.write_bool(false);
                }
                msg.write_bool(true)?;
            }

            msg.write_bits(v as i64, field.bits)
        }

        Access::Float(get, _) => {
            let v = get(to);
            trace!("{}: {}", field.name, v);
            if zero_shortcut {
                if v.to_bits() == 0 {
                    return msg.write_bool(false);
                }
                msg.write_bool(true)?;
            }

            write_float_value(msg, field, v)
        }
    }
}

fn write_float_value<T>(msg: &mut Msg, field: &NetField<T>, v: f32) -> Result<(), NetError> {
    let width = field.bits.abs();
    match field.kind {
        FieldKind::Regular => {
            let trunc = v as i32;
            if trunc as f32 == v
                && trunc + FLOAT_INT_BIAS >= 0
                && trunc + FLOAT_INT_BIAS < 1 << FLOAT_INT_BITS
                && v.to_bits() != (-0.0f32).to_bits()
            {
                msg.write_bool(false)?;
                msg.write_bits((trunc + FLOAT_INT_BIAS) as i64, FLOAT_INT_BITS)
            } else {
                msg.write_bool(true)?;
                msg.write_float(v)
            }
        }

        FieldKind::Angle => msg.write_bits(pack_angle(v, width as u32) as i64, width),

        FieldKind::Coord => msg.write_bits(
            NetCoord::with_bits(width as u32).pack(v) as i64,
            width,
        ),

        FieldKind::AnimWeight | FieldKind::Alpha => {
            let max = ((1i64 << width) - 1) as f32;
            let q = (v * scale_for(field.kind)).round().max(0.0).min(max);
            msg.write_bits(q as i64, width)
        }

        FieldKind::AnimTime | FieldKind::Scale | FieldKind::Velocity => {
            // clamp to what the field can hold, signed when bits < 0
            let (min, max) = match field.bits < 0 {
                true => (-(1i64 << (width - 1)), (1i64 << (width - 1)) - 1),
                false => (0, (1i64 << width) - 1),
            };
            let q = ((v * scale_for(field.kind)).round() as i64).max(min).min(max);
            msg.write_bits(q, field.bits)
        }
    }
}

fn read_field<T>(
    msg: &mut Msg,
    field: &NetField<T>,
    to: &mut T,
    zero_shortcut: bool,
) -> Result<(), NetError> {
    let nonzero = if zero_shortcut { msg.read_bool()? } else { true };

    match field.access {
        Access::Int(_, set) => {
            let v = if nonzero {
                msg.read_bits(field.bits)? as i32
            } else {
                0
            };

            trace!("{}: {}", field.name, v);
            set(to, v);
        }

        Access::Float(_, set) => {
            let v = if nonzero {
                read_float_value(msg, field)?
            } else {
                0.0
            };

            trace!("{}: {}", field.name, v);
            set(to, v);
        }
    }

    Ok(())
}

fn read_float_value<T>(msg: &mut Msg, field: &NetField<T>) -> Result<f32, NetError> {
    let width = field.bits.abs();
    Ok(match field.kind {
        FieldKind::Regular => {
            if msg.read_bool()? {
                msg.read_float()?
            } else {
                (msg.read_bits(FLOAT_INT_BITS)? as i32 - FLOAT_INT_BIAS) as f32
            }
        }

        FieldKind::Angle => unpack_angle(msg.read_bits(width)? as u32, width as u32),

        FieldKind::Coord => NetCoord::with_bits(width as u32).unpack(msg.read_bits(width)? as u32),

        FieldKind::AnimWeight | FieldKind::Alpha => {
            msg.read_bits(width)? as f32 / scale_for(field.kind)
        }

        FieldKind::AnimTime | FieldKind::Scale | FieldKind::Velocity => {
            msg.read_bits(field.bits)? as f32 / scale_for(field.kind)
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::msg::stream::{DynamicStream, MessageStream, SeekPos};

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Sample {
        count: i32,
        delta: i32,
        flags: u16,
        origin: [f32; 3],
        yaw: f32,
        weight: f32,
        time: f32,
        speed: f32,
        mass: f32,
    }

    static SAMPLE_FIELDS: [NetField<Sample>; 11] = [
        int_field!(Sample, 10, count),
        int_field!(Sample, -12, delta),
        int_field!(Sample, 16, flags),
        float_field!(Sample, Coord, 16, origin[0]),
        float_field!(Sample, Coord, 18, origin[1]),
        float_field!(Sample, Coord, 16, origin[2]),
        float_field!(Sample, Angle, 12, yaw),
        float_field!(Sample, AnimWeight, 8, weight),
        float_field!(Sample, AnimTime, 15, time),
        float_field!(Sample, Velocity, -16, speed),
        float_field!(Sample, Regular, 0, mass),
    ];

    static SAMPLE_TABLE: FieldTable<Sample> = FieldTable {
        name: "sample",
        fields: &SAMPLE_FIELDS,
        zero_shortcut: true,
    };

    static SAMPLE_TABLE_PLAIN: FieldTable<Sample> = FieldTable {
        name: "sample (plain)",
        fields: &SAMPLE_FIELDS,
        zero_shortcut: false,
    };

    fn round_trip(table: &FieldTable<Sample>, from: Option<&Sample>, to: &Sample) -> Sample {
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            assert!(write_delta_fields(&mut msg, table, from, to, true).unwrap());
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        read_delta_fields(&mut msg, table, from).unwrap()
    }

    fn boundary_sample() -> Sample {
        Sample {
            count: 1023,
            delta: -2048,
            flags: 0xFFFF,
            origin: [-8192.0, 8191.9375, 0.25],
            yaw: 270.0,
            weight: 1.0,
            time: 327.67,
            speed: -4096.0,
            mass: 1.0e-3,
        }
    }

    #[test]
    fn test_field_table_read_write_eq() {
        for table in [&SAMPLE_TABLE, &SAMPLE_TABLE_PLAIN].iter() {
            let to = boundary_sample();
            assert_eq!(round_trip(table, None, &to), to);

            let from = Sample {
                count: 1,
                mass: -12.0,
                ..Default::default()
            };
            let to = Sample {
                delta: 2047,
                mass: -4096.0,
                ..from.clone()
            };
            assert_eq!(round_trip(table, Some(&from), &to), to);
        }
    }

    #[test]
    fn test_field_unchanged_copies_from() {
        let from = boundary_sample();
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            assert!(!write_delta_fields(&mut msg, &SAMPLE_TABLE, Some(&from), &from, false).unwrap());
            assert!(write_delta_fields(&mut msg, &SAMPLE_TABLE, Some(&from), &from, true).unwrap());
            msg.flush().unwrap();
        }

        // a forced empty delta is just the field count
        assert_eq!(stream.length(), 1);

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        assert_eq!(
            read_delta_fields(&mut msg, &SAMPLE_TABLE, Some(&from)).unwrap(),
            from
        );
    }

    #[test]
    fn test_field_last_changed() {
        let from = Sample::default();
        let mut to = from.clone();
        assert_eq!(last_changed(&SAMPLE_TABLE, &from, &to), 0);

        to.flags = 3;
        assert_eq!(last_changed(&SAMPLE_TABLE, &from, &to), 3);

        to.speed = 1.0;
        assert_eq!(last_changed(&SAMPLE_TABLE, &from, &to), 10);
    }

    #[test]
    fn test_field_coord_quantized() {
        let to = Sample {
            origin: [100.1, -3000.03, 17.0],
            ..Default::default()
        };
        let got = round_trip(&SAMPLE_TABLE, None, &to);
        assert!((got.origin[0] - 100.1).abs() <= NetCoord::STANDARD.step());
        assert!((got.origin[1] + 3000.03).abs() <= NetCoord::EXTRA.step());
        assert_eq!(got.origin[2], 17.0);
    }

    #[test]
    fn test_field_scaled_clamped() {
        let to = Sample {
            time: -1.5,
            speed: 9000.0,
            ..Default::default()
        };
        let got = round_trip(&SAMPLE_TABLE, None, &to);
        assert_eq!(got.time, 0.0);
        assert_eq!(got.speed, 32767.0 / 8.0);

        let to = Sample {
            time: 400.0,
            speed: -9000.0,
            ..Default::default()
        };
        let got = round_trip(&SAMPLE_TABLE, None, &to);
        assert_eq!(got.time, 32767.0 / 100.0);
        assert_eq!(got.speed, -4096.0);
    }

    #[test]
    fn test_field_bad_count() {
        let mut stream = DynamicStream::from_vec(vec![200]);
        let mut msg = Msg::new(&mut stream);
        let err = read_delta_fields(&mut msg, &SAMPLE_TABLE, None::<&Sample>).unwrap_err();
        assert_eq!(
            err.kind(),
            NetErrorKind::BadFieldCount {
                count: 200,
                max: 11
            }
        );
    }
}
