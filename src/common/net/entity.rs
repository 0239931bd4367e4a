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

use cgmath::Vector3;

use crate::{
    common::{
        msg::Msg,
        net::{
            field::{last_changed, read_delta_fields, write_delta_fields, FieldTable, NetField},
            protocol::{EntityParsing, ProtocolRange, Versioned},
            NetError, NetErrorKind,
        },
    },
    float_field, int_field,
};

pub const MAX_FRAMEINFOS: usize = 16;
pub const NUM_BONE_CONTROLLERS: usize = 5;

/// Bits in an entity number for protocols 5-8.
pub const GENTITYNUM_BITS_8: i32 = 10;

/// Bits in an entity number for protocols 15 and later.
pub const GENTITYNUM_BITS_17: i32 = 11;

/// Bits in a sound channel.
pub const SOUND_CHANNEL_BITS: i32 = 7;

/// Bits in a sound config string offset.
pub const SOUND_INDEX_BITS: i32 = 9;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameInfo {
    pub index: i32,
    pub time: f32,
    pub weight: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Trajectory {
    pub tr_time: i32,
    pub tr_delta: [f32; 3],
}

/// A networked entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityState {
    pub number: i32,
    pub e_type: i32,
    pub e_flags: i32,

    pub pos: Trajectory,

    pub net_origin: [f32; 3],
    pub origin2: [f32; 3],
    pub net_angles: [f32; 3],

    pub constant_light: i32,

    pub loop_sound: i32,
    pub loop_sound_volume: f32,
    pub loop_sound_min_dist: f32,
    pub loop_sound_max_dist: f32,
    pub loop_sound_pitch: f32,
    pub loop_sound_flags: i32,

    pub parent: i32,
    pub tag_num: i32,
    pub attach_use_angles: i32,
    pub attach_offset: [f32; 3],

    pub beam_entnum: i32,

    pub model_index: i32,
    pub usage_index: i32,
    pub skin_num: i32,
    pub was_frame: i32,
    pub frame_info: [FrameInfo; MAX_FRAMEINFOS],
    pub action_weight: f32,

    pub bone_tag: [i32; NUM_BONE_CONTROLLERS],
    pub bone_angles: [[f32; 3]; NUM_BONE_CONTROLLERS],

    pub client_num: i32,
    pub ground_entity_num: i32,
    pub solid: i32,

    pub scale: f32,
    pub alpha: f32,
    pub render_fx: i32,
    pub shader_data: [f32; 2],
    pub shader_time: f32,
}

impl EntityState {
    pub fn origin(&self) -> Vector3<f32> {
        self.net_origin.into()
    }

    pub fn angles(&self) -> Vector3<f32> {
        self.net_angles.into()
    }
}

#[rustfmt::skip]
static ENTITY_FIELDS_8: [NetField<EntityState>; 111] = [
    int_field!(EntityState, 32, pos.tr_time),
    float_field!(EntityState, Regular, 0, pos.tr_delta[0]),
    float_field!(EntityState, Regular, 0, pos.tr_delta[1]),
    float_field!(EntityState, Regular, 0, pos.tr_delta[2]),
    float_field!(EntityState, Coord, 16, net_origin[0]),
    float_field!(EntityState, Coord, 16, net_origin[1]),
    float_field!(EntityState, Coord, 16, net_origin[2]),
    float_field!(EntityState, Angle, 12, net_angles[0]),
    float_field!(EntityState, Angle, 12, net_angles[1]),
    float_field!(EntityState, Angle, 12, net_angles[2]),
    int_field!(EntityState, 12, frame_info[0].index),
    float_field!(EntityState, AnimTime, 15, frame_info[0].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[0].weight),
    int_field!(EntityState, 12, frame_info[1].index),
    float_field!(EntityState, AnimTime, 15, frame_info[1].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[1].weight),
    int_field!(EntityState, 12, frame_info[2].index),
    float_field!(EntityState, AnimTime, 15, frame_info[2].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[2].weight),
    int_field!(EntityState, 12, frame_info[3].index),
    float_field!(EntityState, AnimTime, 15, frame_info[3].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[3].weight),
    int_field!(EntityState, 12, frame_info[4].index),
    float_field!(EntityState, AnimTime, 15, frame_info[4].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[4].weight),
    int_field!(EntityState, 12, frame_info[5].index),
    float_field!(EntityState, AnimTime, 15, frame_info[5].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[5].weight),
    int_field!(EntityState, 12, frame_info[6].index),
    float_field!(EntityState, AnimTime, 15, frame_info[6].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[6].weight),
    int_field!(EntityState, 12, frame_info[7].index),
    float_field!(EntityState, AnimTime, 15, frame_info[7].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[7].weight),
    int_field!(EntityState, 12, frame_info[8].index),
    float_field!(EntityState, AnimTime, 15, frame_info[8].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[8].weight),
    int_field!(EntityState, 12, frame_info[9].index),
    float_field!(EntityState, AnimTime, 15, frame_info[9].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[9].weight),
    int_field!(EntityState, 12, frame_info[10].index),
    float_field!(EntityState, AnimTime, 15, frame_info[10].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[10].weight),
    int_field!(EntityState, 12, frame_info[11].index),
    float_field!(EntityState, AnimTime, 15, frame_info[11].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[11].weight),
    int_field!(EntityState, 12, frame_info[12].index),
    float_field!(EntityState, AnimTime, 15, frame_info[12].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[12].weight),
    int_field!(EntityState, 12, frame_info[13].index),
    float_field!(EntityState, AnimTime, 15, frame_info[13].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[13].weight),
    int_field!(EntityState, 12, frame_info[14].index),
    float_field!(EntityState, AnimTime, 15, frame_info[14].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[14].weight),
    int_field!(EntityState, 12, frame_info[15].index),
    float_field!(EntityState, AnimTime, 15, frame_info[15].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[15].weight),
    float_field!(EntityState, AnimWeight, 8, action_weight),
    int_field!(EntityState, -8, bone_tag[0]),
    int_field!(EntityState, -8, bone_tag[1]),
    int_field!(EntityState, -8, bone_tag[2]),
    int_field!(EntityState, -8, bone_tag[3]),
    int_field!(EntityState, -8, bone_tag[4]),
    float_field!(EntityState, Angle, 12, bone_angles[0][0]),
    float_field!(EntityState, Angle, 12, bone_angles[0][1]),
    float_field!(EntityState, Angle, 12, bone_angles[0][2]),
    float_field!(EntityState, Angle, 12, bone_angles[1][0]),
    float_field!(EntityState, Angle, 12, bone_angles[1][1]),
    float_field!(EntityState, Angle, 12, bone_angles[1][2]),
    float_field!(EntityState, Angle, 12, bone_angles[2][0]),
    float_field!(EntityState, Angle, 12, bone_angles[2][1]),
    float_field!(EntityState, Angle, 12, bone_angles[2][2]),
    float_field!(EntityState, Angle, 12, bone_angles[3][0]),
    float_field!(EntityState, Angle, 12, bone_angles[3][1]),
    float_field!(EntityState, Angle, 12, bone_angles[3][2]),
    float_field!(EntityState, Angle, 12, bone_angles[4][0]),
    float_field!(EntityState, Angle, 12, bone_angles[4][1]),
    float_field!(EntityState, Angle, 12, bone_angles[4][2]),
    int_field!(EntityState, 32, constant_light),
    int_field!(EntityState, 16, loop_sound),
    float_field!(EntityState, Regular, 0, loop_sound_volume),
    float_field!(EntityState, Regular, 0, loop_sound_min_dist),
    float_field!(EntityState, Regular, 0, loop_sound_max_dist),
    float_field!(EntityState, Regular, 0, loop_sound_pitch),
    int_field!(EntityState, 8, loop_sound_flags),
    int_field!(EntityState, 10, parent),
    int_field!(EntityState, 10, tag_num),
    int_field!(EntityState, 1, attach_use_angles),
    float_field!(EntityState, Regular, 0, attach_offset[0]),
    float_field!(EntityState, Regular, 0, attach_offset[1]),
    float_field!(EntityState, Regular, 0, attach_offset[2]),
    int_field!(EntityState, 10, beam_entnum),
    int_field!(EntityState, 16, model_index),
    int_field!(EntityState, 16, usage_index),
    int_field!(EntityState, 8, skin_num),
    int_field!(EntityState, 10, was_frame),
    int_field!(EntityState, 8, e_type),
    int_field!(EntityState, 16, e_flags),
    int_field!(EntityState, 8, client_num),
    int_field!(EntityState, 10, ground_entity_num),
    int_field!(EntityState, 32, solid),
    float_field!(EntityState, Scale, 10, scale),
    float_field!(EntityState, Alpha, 8, alpha),
    int_field!(EntityState, 32, render_fx),
    float_field!(EntityState, Regular, 0, shader_data[0]),
    float_field!(EntityState, Regular, 0, shader_data[1]),
    float_field!(EntityState, Regular, 0, shader_time),
    float_field!(EntityState, Regular, 0, origin2[0]),
    float_field!(EntityState, Regular, 0, origin2[1]),
    float_field!(EntityState, Regular, 0, origin2[2]),
];

#[rustfmt::skip]
static ENTITY_FIELDS_17: [NetField<EntityState>; 111] = [
    int_field!(EntityState, 32, pos.tr_time),
    float_field!(EntityState, Velocity, -17, pos.tr_delta[0]),
    float_field!(EntityState, Velocity, -17, pos.tr_delta[1]),
    float_field!(EntityState, Velocity, -17, pos.tr_delta[2]),
    float_field!(EntityState, Coord, 18, net_origin[0]),
    float_field!(EntityState, Coord, 18, net_origin[1]),
    float_field!(EntityState, Coord, 18, net_origin[2]),
    float_field!(EntityState, Angle, 16, net_angles[0]),
    float_field!(EntityState, Angle, 16, net_angles[1]),
    float_field!(EntityState, Angle, 16, net_angles[2]),
    int_field!(EntityState, 12, frame_info[0].index),
    float_field!(EntityState, AnimTime, 15, frame_info[0].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[0].weight),
    int_field!(EntityState, 12, frame_info[1].index),
    float_field!(EntityState, AnimTime, 15, frame_info[1].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[1].weight),
    int_field!(EntityState, 12, frame_info[2].index),
    float_field!(EntityState, AnimTime, 15, frame_info[2].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[2].weight),
    int_field!(EntityState, 12, frame_info[3].index),
    float_field!(EntityState, AnimTime, 15, frame_info[3].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[3].weight),
    int_field!(EntityState, 12, frame_info[4].index),
    float_field!(EntityState, AnimTime, 15, frame_info[4].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[4].weight),
    int_field!(EntityState, 12, frame_info[5].index),
    float_field!(EntityState, AnimTime, 15, frame_info[5].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[5].weight),
    int_field!(EntityState, 12, frame_info[6].index),
    float_field!(EntityState, AnimTime, 15, frame_info[6].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[6].weight),
    int_field!(EntityState, 12, frame_info[7].index),
    float_field!(EntityState, AnimTime, 15, frame_info[7].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[7].weight),
    int_field!(EntityState, 12, frame_info[8].index),
    float_field!(EntityState, AnimTime, 15, frame_info[8].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[8].weight),
    int_field!(EntityState, 12, frame_info[9].index),
    float_field!(EntityState, AnimTime, 15, frame_info[9].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[9].weight),
    int_field!(EntityState, 12, frame_info[10].index),
    float_field!(EntityState, AnimTime, 15, frame_info[10].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[10].weight),
    int_field!(EntityState, 12, frame_info[11].index),
    float_field!(EntityState, AnimTime, 15, frame_info[11].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[11].weight),
    int_field!(EntityState, 12, frame_info[12].index),
    float_field!(EntityState, AnimTime, 15, frame_info[12].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[12].weight),
    int_field!(EntityState, 12, frame_info[13].index),
    float_field!(EntityState, AnimTime, 15, frame_info[13].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[13].weight),
    int_field!(EntityState, 12, frame_info[14].index),
    float_field!(EntityState, AnimTime, 15, frame_info[14].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[14].weight),
    int_field!(EntityState, 12, frame_info[15].index),
    float_field!(EntityState, AnimTime, 15, frame_info[15].time),
    float_field!(EntityState, AnimWeight, 8, frame_info[15].weight),
    float_field!(EntityState, AnimWeight, 8, action_weight),
    int_field!(EntityState, -8, bone_tag[0]),
    int_field!(EntityState, -8, bone_tag[1]),
    int_field!(EntityState, -8, bone_tag[2]),
    int_field!(EntityState, -8, bone_tag[3]),
    int_field!(EntityState, -8, bone_tag[4]),
    float_field!(EntityState, Angle, 16, bone_angles[0][0]),
    float_field!(EntityState, Angle, 16, bone_angles[0][1]),
    float_field!(EntityState, Angle, 16, bone_angles[0][2]),
    float_field!(EntityState, Angle, 16, bone_angles[1][0]),
    float_field!(EntityState, Angle, 16, bone_angles[1][1]),
    float_field!(EntityState, Angle, 16, bone_angles[1][2]),
    float_field!(EntityState, Angle, 16, bone_angles[2][0]),
    float_field!(EntityState, Angle, 16, bone_angles[2][1]),
    float_field!(EntityState, Angle, 16, bone_angles[2][2]),
    float_field!(EntityState, Angle, 16, bone_angles[3][0]),
    float_field!(EntityState, Angle, 16, bone_angles[3][1]),
    float_field!(EntityState, Angle, 16, bone_angles[3][2]),
    float_field!(EntityState, Angle, 16, bone_angles[4][0]),
    float_field!(EntityState, Angle, 16, bone_angles[4][1]),
    float_field!(EntityState, Angle, 16, bone_angles[4][2]),
    int_field!(EntityState, 32, constant_light),
    int_field!(EntityState, 16, loop_sound),
    float_field!(EntityState, Regular, 0, loop_sound_volume),
    float_field!(EntityState, Regular, 0, loop_sound_min_dist),
    float_field!(EntityState, Regular, 0, loop_sound_max_dist),
    float_field!(EntityState, Regular, 0, loop_sound_pitch),
    int_field!(EntityState, 8, loop_sound_flags),
    int_field!(EntityState, 11, parent),
    int_field!(EntityState, 10, tag_num),
    int_field!(EntityState, 1, attach_use_angles),
    float_field!(EntityState, Regular, 0, attach_offset[0]),
    float_field!(EntityState, Regular, 0, attach_offset[1]),
    float_field!(EntityState, Regular, 0, attach_offset[2]),
    int_field!(EntityState, 11, beam_entnum),
    int_field!(EntityState, 16, model_index),
    int_field!(EntityState, 16, usage_index),
    int_field!(EntityState, 8, skin_num),
    int_field!(EntityState, 10, was_frame),
    int_field!(EntityState, 8, e_type),
    int_field!(EntityState, 16, e_flags),
    int_field!(EntityState, 8, client_num),
    int_field!(EntityState, 11, ground_entity_num),
    int_field!(EntityState, 32, solid),
    float_field!(EntityState, Scale, 10, scale),
    float_field!(EntityState, Alpha, 8, alpha),
    int_field!(EntityState, 32, render_fx),
    float_field!(EntityState, Regular, 0, shader_data[0]),
    float_field!(EntityState, Regular, 0, shader_data[1]),
    float_field!(EntityState, Regular, 0, shader_time),
    float_field!(EntityState, Coord, 18, origin2[0]),
    float_field!(EntityState, Coord, 18, origin2[1]),
    float_field!(EntityState, Coord, 18, origin2[2]),
];

pub static ENTITY_TABLE_8: FieldTable<EntityState> = FieldTable {
    name: "entity (8)",
    fields: &ENTITY_FIELDS_8,
    zero_shortcut: true,
};

pub static ENTITY_TABLE_17: FieldTable<EntityState> = FieldTable {
    name: "entity (17)",
    fields: &ENTITY_FIELDS_17,
    zero_shortcut: true,
};

/// Write an entity update: its number, a removal bit, a changed bit and the field delta.
///
/// Nothing is written for an unchanged entity unless `force` is set. `to` of `None` removes
/// `from`.
pub fn write_delta_entity(
    msg: &mut Msg,
    table: &FieldTable<EntityState>,
    number_bits: i32,
    from: Option<&EntityState>,
    to: Option<&EntityState>,
    force: bool,
) -> Result<(), NetError> {
    let max = 1i64 << number_bits;

    let to = match to {
        Some(t) => t,
        None => {
            let number = match from {
                Some(f) => f.number,
                None => return Err(NetError::invalid_data("removal without a source entity")),
            };

            msg.write_bits(number as i64, number_bits)?;
            return msg.write_bool(true);
        }
    };

    if to.number < 0 || to.number as i64 >= max - 1 {
        return Err(NetErrorKind::BadEntityNumber {
            number: to.number as u32,
        }
        .into());
    }

    let default;
    let base = match from {
        Some(f) => f,
        None => {
            default = EntityState::default();
            &default
        }
    };

    if last_changed(table, base, to) == 0 {
        if !force {
            return Ok(());
        }

        msg.write_bits(to.number as i64, number_bits)?;
        msg.write_bool(false)?;
        return msg.write_bool(false);
    }

    msg.write_bits(to.number as i64, number_bits)?;
    msg.write_bool(false)?;
    msg.write_bool(true)?;
    write_delta_fields(msg, table, Some(base), to, true)?;
    Ok(())
}

/// Read an entity update whose number has already been read.
pub fn read_delta_entity(
    msg: &mut Msg,
    table: &FieldTable<EntityState>,
    from: Option<&EntityState>,
    number: u32,
) -> Result<Option<EntityState>, NetError> {
    if msg.read_bool()? {
        trace!("{}: remove {}", table.name, number);
        return Ok(None);
    }

    let mut to = if !msg.read_bool()? {
        match from {
            Some(f) => f.clone(),
            None => EntityState::default(),
        }
    } else {
        read_delta_fields(msg, table, from)?
    };

    to.number = number as i32;
    Ok(Some(to))
}

/// A sound started or stopped by the server during a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct SoundEvent {
    pub stop: bool,
    pub streamed: bool,
    pub origin: Option<Vector3<f32>>,
    pub entity_num: u32,
    pub channel: u8,
    pub sound_index: u16,
    pub volume: Option<f32>,
    pub min_dist: Option<f32>,
    pub max_dist: Option<f32>,
    pub pitch: Option<f32>,
}

impl SoundEvent {
    pub fn stop(entity_num: u32, channel: u8) -> SoundEvent {
        SoundEvent {
            stop: true,
            streamed: false,
            origin: None,
            entity_num,
            channel,
            sound_index: 0,
            volume: None,
            min_dist: None,
            max_dist: None,
            pitch: None,
        }
    }

    pub fn start(entity_num: u32, channel: u8, sound_index: u16) -> SoundEvent {
        SoundEvent {
            stop: false,
            sound_index,
            ..SoundEvent::stop(entity_num, channel)
        }
    }
}

fn write_optional_float(msg: &mut Msg, value: Option<f32>) -> Result<(), NetError> {
    match value {
        Some(v) => {
            msg.write_bool(true)?;
            msg.write_float(v)
        }
        None => msg.write_bool(false),
    }
}

fn read_optional_float(msg: &mut Msg) -> Result<Option<f32>, NetError> {
    if msg.read_bool()? {
        Ok(Some(msg.read_float()?))
    } else {
        Ok(None)
    }
}

fn write_sound_base(msg: &mut Msg, number_bits: i32, sound: &SoundEvent) -> Result<(), NetError> {
    msg.write_bool(sound.stop)?;
    if sound.stop {
        msg.write_bits(sound.entity_num as i64, number_bits)?;
        return msg.write_bits(sound.channel as i64, SOUND_CHANNEL_BITS);
    }

    msg.write_bool(sound.streamed)?;
    match sound.origin {
        Some(o) => {
            msg.write_bool(true)?;
            msg.write_float(o.x)?;
            msg.write_float(o.y)?;
            msg.write_float(o.z)?;
        }
        None => msg.write_bool(false)?,
    }

    msg.write_bits(sound.entity_num as i64, number_bits)?;
    msg.write_bits(sound.channel as i64, SOUND_CHANNEL_BITS)?;
    msg.write_bits(sound.sound_index as i64, SOUND_INDEX_BITS)?;
    write_optional_float(msg, sound.volume)?;
    write_optional_float(msg, sound.min_dist)?;
    write_optional_float(msg, sound.pitch)
}

fn read_sound_base(msg: &mut Msg, number_bits: i32) -> Result<SoundEvent, NetError> {
    if msg.read_bool()? {
        let entity_num = msg.read_bits(number_bits)? as u32;
        let channel = msg.read_bits(SOUND_CHANNEL_BITS)? as u8;
        return Ok(SoundEvent::stop(entity_num, channel));
    }

    let streamed = msg.read_bool()?;
    let origin = if msg.read_bool()? {
        Some(Vector3::new(
            msg.read_float()?,
            msg.read_float()?,
            msg.read_float()?,
        ))
    } else {
        None
    };

    let entity_num = msg.read_bits(number_bits)? as u32;
    let channel = msg.read_bits(SOUND_CHANNEL_BITS)? as u8;
    let sound_index = msg.read_bits(SOUND_INDEX_BITS)? as u16;
    let volume = read_optional_float(msg)?;
    let min_dist = read_optional_float(msg)?;
    let pitch = read_optional_float(msg)?;

    Ok(SoundEvent {
        stop: false,
        streamed,
        origin,
        entity_num,
        channel,
        sound_index,
        volume,
        min_dist,
        max_dist: None,
        pitch,
    })
}

/// Entity strategy for protocols 5-8.
pub struct Entity8 {
    pub range: ProtocolRange,
}

impl Versioned for Entity8 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl EntityParsing for Entity8 {
    fn number_bits(&self) -> i32 {
        GENTITYNUM_BITS_8
    }

    fn table(&self) -> &'static FieldTable<EntityState> {
        &ENTITY_TABLE_8
    }

    fn read_sound(&self, msg: &mut Msg) -> Result<SoundEvent, NetError> {
        read_sound_base(msg, self.number_bits())
    }

    fn write_sound(&self, msg: &mut Msg, sound: &SoundEvent) -> Result<(), NetError> {
        write_sound_base(msg, self.number_bits(), sound)
    }
}

/// Entity strategy for protocols 15-17: wider entity numbers, finer coordinates and sounds with a
/// maximum distance.
pub struct Entity17 {
    pub range: ProtocolRange,
}

impl Versioned for Entity17 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl EntityParsing for Entity17 {
    fn number_bits(&self) -> i32 {
        GENTITYNUM_BITS_17
    }

    fn table(&self) -> &'static FieldTable<EntityState> {
        &ENTITY_TABLE_17
    }

    fn read_sound(&self, msg: &mut Msg) -> Result<SoundEvent, NetError> {
        let mut sound = read_sound_base(msg, self.number_bits())?;
        if !sound.stop {
            sound.max_dist = read_optional_float(msg)?;
        }

        Ok(sound)
    }

    fn write_sound(&self, msg: &mut Msg, sound: &SoundEvent) -> Result<(), NetError> {
        write_sound_base(msg, self.number_bits(), sound)?;
        if !sound.stop {
            write_optional_float(msg, sound.max_dist)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::msg::stream::{DynamicStream, MessageStream, SeekPos};

    static ENTITY_8: Entity8 = Entity8 {
        range: ProtocolRange::new(5, 8),
    };

    static ENTITY_17: Entity17 = Entity17 {
        range: ProtocolRange::new(15, 17),
    };

    fn soldier() -> EntityState {
        let mut ent = EntityState {
            number: 5,
            e_type: 1,
            e_flags: 0x20,
            net_origin: [128.0, -1024.25, 64.5],
            net_angles: [0.0, 90.0, 0.0],
            model_index: 12,
            parent: 1023,
            ground_entity_num: 1022,
            scale: 1.0,
            alpha: 1.0,
            bone_tag: [-1, 3, 0, 0, 0],
            loop_sound_volume: 0.5,
            ..Default::default()
        };
        ent.frame_info[0] = FrameInfo {
            index: 4,
            time: 0.35,
            weight: 1.0,
        };
        ent.pos.tr_delta = [16.0, -8.0, 0.0];
        ent
    }

    fn write_read(
        strategy: &dyn EntityParsing,
        from: Option<&EntityState>,
        to: Option<&EntityState>,
        force: bool,
    ) -> (usize, Option<Option<EntityState>>) {
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            strategy.write_delta_entity(&mut msg, from, to, force).unwrap();
            msg.flush().unwrap();
        }

        let len = stream.length();
        if len == 0 {
            return (0, None);
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        let number = strategy.read_number(&mut msg).unwrap();
        (
            len,
            Some(strategy.read_delta_entity(&mut msg, from, number).unwrap()),
        )
    }

    #[test]
    fn test_entity_tables_read_write_eq() {
        let to = soldier();
        for strategy in [&ENTITY_8 as &dyn EntityParsing, &ENTITY_17].iter() {
            let (_, got) = write_read(*strategy, None, Some(&to), false);
            assert_eq!(got, Some(Some(to.clone())));

            let mut moved = to.clone();
            moved.net_origin[0] += 4.0;
            moved.frame_info[0].time = 0.4;
            let (_, got) = write_read(*strategy, Some(&to), Some(&moved), false);
            assert_eq!(got, Some(Some(moved)));
        }
    }

    #[test]
    fn test_entity_unchanged_writes_nothing_unless_forced() {
        let ent = soldier();
        let (len, _) = write_read(&ENTITY_8, Some(&ent), Some(&ent), false);
        assert_eq!(len, 0);

        // number, removal bit and changed bit
        let (len, got) = write_read(&ENTITY_8, Some(&ent), Some(&ent), true);
        assert_eq!(len, 2);
        assert_eq!(got, Some(Some(ent)));
    }

    #[test]
    fn test_entity_remove() {
        let ent = soldier();
        let (_, got) = write_read(&ENTITY_17, Some(&ent), None, false);
        assert_eq!(got, Some(None));
    }

    #[test]
    fn test_entity_number_out_of_range() {
        let mut ent = soldier();
        ent.number = 1023;

        let mut stream = DynamicStream::new();
        let mut msg = Msg::new(&mut stream);
        let err = ENTITY_8
            .write_delta_entity(&mut msg, None, Some(&ent), true)
            .unwrap_err();
        assert_eq!(err.kind(), NetErrorKind::BadEntityNumber { number: 1023 });

        // protocol 17 has room for it
        ENTITY_17
            .write_delta_entity(&mut msg, None, Some(&ent), true)
            .unwrap();
    }

    #[test]
    fn test_entity_coord_precision_differs() {
        let mut ent = soldier();
        ent.net_origin = [0.0625, 0.0, 0.0];

        let (_, got8) = write_read(&ENTITY_8, None, Some(&ent), false);
        let (_, got17) = write_read(&ENTITY_17, None, Some(&ent), false);
        assert_eq!(got8.unwrap().unwrap().net_origin[0], 0.0);
        assert_eq!(got17.unwrap().unwrap().net_origin[0], 0.0625);
    }

    #[test]
    fn test_sound_read_write_eq() {
        let mut start = SoundEvent::start(7, 3, 300);
        start.origin = Some(Vector3::new(1.0, 2.0, -3.5));
        start.volume = Some(0.8);
        start.pitch = Some(1.1);
        start.max_dist = Some(2048.0);
        let stop = SoundEvent::stop(9, 1);

        for strategy in [&ENTITY_8 as &dyn EntityParsing, &ENTITY_17].iter() {
            let mut stream = DynamicStream::new();
            {
                let mut msg = Msg::new(&mut stream);
                strategy.write_sound(&mut msg, &start).unwrap();
                strategy.write_sound(&mut msg, &stop).unwrap();
                msg.flush().unwrap();
            }

            stream.seek(0, SeekPos::Begin).unwrap();
            let mut msg = Msg::new(&mut stream);
            let got = strategy.read_sound(&mut msg).unwrap();
            if strategy.range().max >= 15 {
                assert_eq!(got, start);
            } else {
                // protocol 8 has no maximum distance
                assert_eq!(got.max_dist, None);
                assert_eq!(got.sound_index, 300);
            }
            assert_eq!(strategy.read_sound(&mut msg).unwrap(), stop);
        }
    }
}
