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
            field::{read_delta_fields, write_delta_fields, FieldTable, NetField},
            protocol::{PlayerStateParsing, ProtocolRange, PvsParsing, Versioned},
            NetError,
        },
    },
    float_field, int_field,
};

pub const MAX_STATS: usize = 32;
pub const MAX_ACTIVEITEMS: usize = 8;
pub const MAX_AMMO: usize = 16;
pub const MAX_AMMO_AMOUNT: usize = 16;

/// Indices into `PlayerState::stats`.
#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum Stat {
    Health = 0,
    MaxHealth = 1,
    Weapons = 2,
    Equipped = 3,
    Ammo = 4,
    MaxAmmo = 5,
    ClipAmmo = 6,
    MaxClipAmmo = 7,
    InZoom = 8,
    CrosshairMode = 9,
    LastPain = 10,
    Kills = 11,
    Deaths = 12,
    Highest = 13,
    AttackerClient = 14,
    InfoClient = 15,
    InfoClientHealth = 16,
    DamageDir = 17,
    Objectives = 18,
    Team = 19,
    CompassNorth = 20,
}

/// The local player's simulated state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerState {
    pub command_time: i32,
    pub pm_type: i32,
    pub bob_cycle: i32,
    pub pm_flags: i32,
    pub pm_runtime: i32,

    pub origin: [f32; 3],
    pub velocity: [f32; 3],
    pub gravity: i32,
    pub speed: i32,
    pub delta_angles: [i32; 3],

    pub ground_entity_num: i32,
    pub walking: i32,
    pub ground_plane: i32,
    pub feet_falling: i32,
    pub fall_dir: [f32; 3],

    pub client_num: i32,
    pub view_angles: [f32; 3],
    pub view_height: i32,
    pub lean_angle: f32,
    pub view_model_anim: i32,
    pub view_model_anim_changed: i32,

    pub stats: [i32; MAX_STATS],
    pub active_items: [i32; MAX_ACTIVEITEMS],
    pub ammo_name_index: [i32; MAX_AMMO],
    pub ammo_amount: [i32; MAX_AMMO_AMOUNT],
    pub max_ammo_amount: [i32; MAX_AMMO_AMOUNT],

    pub current_music_mood: i32,
    pub fallback_music_mood: i32,
    pub music_volume: f32,
    pub music_volume_fade_time: f32,
    pub reverb_type: i32,
    pub reverb_level: f32,
    pub blend: [f32; 4],
    pub fov: f32,

    pub camera_origin: [f32; 3],
    pub camera_angles: [f32; 3],
    pub camera_time: f32,
    pub camera_offset: [f32; 3],
    pub camera_posofs: [f32; 3],
    pub camera_flags: i32,
    pub damage_angles: [f32; 3],

    /// Packed radar blip, protocols 15 and later.
    pub radar_info: i32,
    pub voted: i32,
}

impl PlayerState {
    pub fn origin(&self) -> Vector3<f32> {
        self.origin.into()
    }

    pub fn stat(&self, stat: Stat) -> i32 {
        self.stats[stat as usize]
    }
}

#[rustfmt::skip]
static PLAYER_FIELDS_8: [NetField<PlayerState>; 59] = [
    int_field!(PlayerState, 32, command_time),
    float_field!(PlayerState, Regular, 0, origin[0]),
    float_field!(PlayerState, Regular, 0, origin[1]),
    float_field!(PlayerState, Regular, 0, origin[2]),
    float_field!(PlayerState, Regular, 0, velocity[0]),
    float_field!(PlayerState, Regular, 0, velocity[1]),
    float_field!(PlayerState, Regular, 0, velocity[2]),
    float_field!(PlayerState, Regular, 0, view_angles[0]),
    float_field!(PlayerState, Regular, 0, view_angles[1]),
    float_field!(PlayerState, Regular, 0, view_angles[2]),
    int_field!(PlayerState, 8, bob_cycle),
    int_field!(PlayerState, 16, pm_flags),
    int_field!(PlayerState, 16, pm_runtime),
    int_field!(PlayerState, 16, delta_angles[0]),
    int_field!(PlayerState, 16, delta_angles[1]),
    int_field!(PlayerState, 16, delta_angles[2]),
    int_field!(PlayerState, 10, ground_entity_num),
    int_field!(PlayerState, 1, walking),
    int_field!(PlayerState, 1, ground_plane),
    int_field!(PlayerState, 8, feet_falling),
    float_field!(PlayerState, Regular, 0, fall_dir[0]),
    float_field!(PlayerState, Regular, 0, fall_dir[1]),
    float_field!(PlayerState, Regular, 0, fall_dir[2]),
    int_field!(PlayerState, 8, client_num),
    int_field!(PlayerState, -8, view_height),
    float_field!(PlayerState, Regular, 0, lean_angle),
    int_field!(PlayerState, 8, view_model_anim),
    int_field!(PlayerState, 2, view_model_anim_changed),
    int_field!(PlayerState, 16, gravity),
    int_field!(PlayerState, 16, speed),
    int_field!(PlayerState, 8, pm_type),
    int_field!(PlayerState, 8, current_music_mood),
    int_field!(PlayerState, 8, fallback_music_mood),
    float_field!(PlayerState, Regular, 0, music_volume),
    float_field!(PlayerState, Regular, 0, music_volume_fade_time),
    int_field!(PlayerState, 6, reverb_type),
    float_field!(PlayerState, Regular, 0, reverb_level),
    float_field!(PlayerState, Regular, 0, blend[0]),
    float_field!(PlayerState, Regular, 0, blend[1]),
    float_field!(PlayerState, Regular, 0, blend[2]),
    float_field!(PlayerState, Regular, 0, blend[3]),
    float_field!(PlayerState, Regular, 0, fov),
    float_field!(PlayerState, Regular, 0, camera_origin[0]),
    float_field!(PlayerState, Regular, 0, camera_origin[1]),
    float_field!(PlayerState, Regular, 0, camera_origin[2]),
    float_field!(PlayerState, Regular, 0, camera_angles[0]),
    float_field!(PlayerState, Regular, 0, camera_angles[1]),
    float_field!(PlayerState, Regular, 0, camera_angles[2]),
    float_field!(PlayerState, Regular, 0, camera_time),
    float_field!(PlayerState, Regular, 0, camera_offset[0]),
    float_field!(PlayerState, Regular, 0, camera_offset[1]),
    float_field!(PlayerState, Regular, 0, camera_offset[2]),
    float_field!(PlayerState, Regular, 0, camera_posofs[0]),
    float_field!(PlayerState, Regular, 0, camera_posofs[1]),
    float_field!(PlayerState, Regular, 0, camera_posofs[2]),
    int_field!(PlayerState, 16, camera_flags),
    float_field!(PlayerState, Regular, 0, damage_angles[0]),
    float_field!(PlayerState, Regular, 0, damage_angles[1]),
    float_field!(PlayerState, Regular, 0, damage_angles[2]),
];

#[rustfmt::skip]
static PLAYER_FIELDS_17: [NetField<PlayerState>; 61] = [
    int_field!(PlayerState, 32, command_time),
    float_field!(PlayerState, Coord, 18, origin[0]),
    float_field!(PlayerState, Coord, 18, origin[1]),
    float_field!(PlayerState, Coord, 18, origin[2]),
    float_field!(PlayerState, Velocity, -17, velocity[0]),
    float_field!(PlayerState, Velocity, -17, velocity[1]),
    float_field!(PlayerState, Velocity, -17, velocity[2]),
    float_field!(PlayerState, Regular, 0, view_angles[0]),
    float_field!(PlayerState, Regular, 0, view_angles[1]),
    float_field!(PlayerState, Regular, 0, view_angles[2]),
    int_field!(PlayerState, 8, bob_cycle),
    int_field!(PlayerState, 16, pm_flags),
    int_field!(PlayerState, 16, pm_runtime),
    int_field!(PlayerState, 16, delta_angles[0]),
    int_field!(PlayerState, 16, delta_angles[1]),
    int_field!(PlayerState, 16, delta_angles[2]),
    int_field!(PlayerState, 11, ground_entity_num),
    int_field!(PlayerState, 1, walking),
    int_field!(PlayerState, 1, ground_plane),
    int_field!(PlayerState, 8, feet_falling),
    float_field!(PlayerState, Regular, 0, fall_dir[0]),
    float_field!(PlayerState, Regular, 0, fall_dir[1]),
    float_field!(PlayerState, Regular, 0, fall_dir[2]),
    int_field!(PlayerState, 8, client_num),
    int_field!(PlayerState, -8, view_height),
    float_field!(PlayerState, Regular, 0, lean_angle),
    int_field!(PlayerState, 8, view_model_anim),
    int_field!(PlayerState, 2, view_model_anim_changed),
    int_field!(PlayerState, 16, gravity),
    int_field!(PlayerState, 16, speed),
    int_field!(PlayerState, 8, pm_type),
    int_field!(PlayerState, 8, current_music_mood),
    int_field!(PlayerState, 8, fallback_music_mood),
    float_field!(PlayerState, Regular, 0, music_volume),
    float_field!(PlayerState, Regular, 0, music_volume_fade_time),
    int_field!(PlayerState, 6, reverb_type),
    float_field!(PlayerState, Regular, 0, reverb_level),
    float_field!(PlayerState, Regular, 0, blend[0]),
    float_field!(PlayerState, Regular, 0, blend[1]),
    float_field!(PlayerState, Regular, 0, blend[2]),
    float_field!(PlayerState, Regular, 0, blend[3]),
    float_field!(PlayerState, Regular, 0, fov),
    float_field!(PlayerState, Regular, 0, camera_origin[0]),
    float_field!(PlayerState, Regular, 0, camera_origin[1]),
    float_field!(PlayerState, Regular, 0, camera_origin[2]),
    float_field!(PlayerState, Regular, 0, camera_angles[0]),
    float_field!(PlayerState, Regular, 0, camera_angles[1]),
    float_field!(PlayerState, Regular, 0, camera_angles[2]),
    float_field!(PlayerState, Regular, 0, camera_time),
    float_field!(PlayerState, Regular, 0, camera_offset[0]),
    float_field!(PlayerState, Regular, 0, camera_offset[1]),
    float_field!(PlayerState, Regular, 0, camera_offset[2]),
    float_field!(PlayerState, Regular, 0, camera_posofs[0]),
    float_field!(PlayerState, Regular, 0, camera_posofs[1]),
    float_field!(PlayerState, Regular, 0, camera_posofs[2]),
    int_field!(PlayerState, 16, camera_flags),
    float_field!(PlayerState, Regular, 0, damage_angles[0]),
    float_field!(PlayerState, Regular, 0, damage_angles[1]),
    float_field!(PlayerState, Regular, 0, damage_angles[2]),
    int_field!(PlayerState, 26, radar_info),
    int_field!(PlayerState, 1, voted),
];

pub static PLAYER_TABLE_8: FieldTable<PlayerState> = FieldTable {
    name: "playerstate (8)",
    fields: &PLAYER_FIELDS_8,
    zero_shortcut: false,
};

pub static PLAYER_TABLE_17: FieldTable<PlayerState> = FieldTable {
    name: "playerstate (17)",
    fields: &PLAYER_FIELDS_17,
    zero_shortcut: false,
};

// stats, active items, ammo names, ammo amounts, max ammo amounts
const ARRAY_COUNT: usize = 5;

fn arrays(ps: &PlayerState) -> [&[i32]; ARRAY_COUNT] {
    [
        &ps.stats,
        &ps.active_items,
        &ps.ammo_name_index,
        &ps.ammo_amount,
        &ps.max_ammo_amount,
    ]
}

fn arrays_mut(ps: &mut PlayerState) -> [&mut [i32]; ARRAY_COUNT] {
    [
        &mut ps.stats,
        &mut ps.active_items,
        &mut ps.ammo_name_index,
        &mut ps.ammo_amount,
        &mut ps.max_ammo_amount,
    ]
}

fn changed_mask(from: &[i32], to: &[i32]) -> u32 {
    from.iter()
        .zip(to.iter())
        .enumerate()
        .filter(|(_, (f, t))| f != t)
        .fold(0, |mask, (i, _)| mask | 1 << i)
}

/// Write a player state delta: the field table followed by the changed array elements.
pub fn write_delta_player_state(
    msg: &mut Msg,
    table: &FieldTable<PlayerState>,
    from: Option<&PlayerState>,
    to: &PlayerState,
) -> Result<(), NetError> {
    let default;
    let from = match from {
        Some(f) => f,
        None => {
            default = PlayerState::default();
            &default
        }
    };

    write_delta_fields(msg, table, Some(from), to, true)?;

    let from_arrays = arrays(from);
    let to_arrays = arrays(to);
    let masks: Vec<u32> = from_arrays
        .iter()
        .zip(to_arrays.iter())
        .map(|(f, t)| changed_mask(f, t))
        .collect();

    if masks.iter().all(|m| *m == 0) {
        return msg.write_bool(false);
    }

    msg.write_bool(true)?;
    for (mask, values) in masks.iter().zip(to_arrays.iter()) {
        if *mask == 0 {
            msg.write_bool(false)?;
            continue;
        }

        msg.write_bool(true)?;
        msg.write_bits(*mask as i64, values.len() as i32)?;
        for (i, v) in values.iter().enumerate() {
            if mask & 1 << i != 0 {
                msg.write_bits(*v as i64, -16)?;
            }
        }
    }

    Ok(())
}

/// Read a player state delta against `from`, or the default state.
pub fn read_delta_player_state(
    msg: &mut Msg,
    table: &FieldTable<PlayerState>,
    from: Option<&PlayerState>,
) -> Result<PlayerState, NetError> {
    let mut to = read_delta_fields(msg, table, from)?;

    if msg.read_bool()? {
        for values in arrays_mut(&mut to).iter_mut() {
            if !msg.read_bool()? {
                continue;
            }

            let mask = msg.read_bits(values.len() as i32)? as u32;
            for (i, v) in values.iter_mut().enumerate() {
                if mask & 1 << i != 0 {
                    *v = msg.read_bits(-16)? as i32;
                }
            }
        }
    }

    Ok(to)
}

/// Player state strategy for protocols 5-8.
pub struct Player8 {
    pub range: ProtocolRange,
}

impl Versioned for Player8 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl PlayerStateParsing for Player8 {
    fn table(&self) -> &'static FieldTable<PlayerState> {
        &PLAYER_TABLE_8
    }
}

/// Player state strategy for protocols 15-17.
pub struct Player17 {
    pub range: ProtocolRange,
}

impl Versioned for Player17 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl PlayerStateParsing for Player17 {
    fn table(&self) -> &'static FieldTable<PlayerState> {
        &PLAYER_TABLE_17
    }
}

const RADAR_CLIENT_BITS: u32 = 6;
const RADAR_COORD_BITS: u32 = 7;
const RADAR_YAW_BITS: u32 = 5;
const RADAR_VALID: i32 = 1 << 25;

/// A teammate's position on the compass, relative to the local player.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RadarBlip {
    pub client_num: u8,
    pub x: i8,
    pub y: i8,
    pub yaw: u8,
}

impl RadarBlip {
    pub fn yaw_degrees(&self) -> f32 {
        self.yaw as f32 * 360.0 / (1 << RADAR_YAW_BITS) as f32
    }
}

fn sign_extend(value: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value << shift) >> shift
}

/// Radar strategy for protocols 5-8, which carry no radar information.
pub struct Pvs8 {
    pub range: ProtocolRange,
}

impl Versioned for Pvs8 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl PvsParsing for Pvs8 {
    fn read_radar(&self, _radar_info: i32) -> Option<RadarBlip> {
        None
    }

    fn write_radar(&self, _blip: &RadarBlip) -> Option<i32> {
        None
    }
}

/// Radar strategy for protocols 15-17.
pub struct Pvs17 {
    pub range: ProtocolRange,
}

impl Versioned for Pvs17 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl PvsParsing for Pvs17 {
    fn read_radar(&self, radar_info: i32) -> Option<RadarBlip> {
        if radar_info & RADAR_VALID == 0 {
            return None;
        }

        let coord_mask = (1 << RADAR_COORD_BITS) - 1;
        let mut shift = 0;
        let client_num = radar_info & ((1 << RADAR_CLIENT_BITS) - 1);
        shift += RADAR_CLIENT_BITS;
        let x = sign_extend((radar_info >> shift) & coord_mask, RADAR_COORD_BITS);
        shift += RADAR_COORD_BITS;
        let y = sign_extend((radar_info >> shift) & coord_mask, RADAR_COORD_BITS);
        shift += RADAR_COORD_BITS;
        let yaw = (radar_info >> shift) & ((1 << RADAR_YAW_BITS) - 1);

        Some(RadarBlip {
            client_num: client_num as u8,
            x: x as i8,
            y: y as i8,
            yaw: yaw as u8,
        })
    }

    fn write_radar(&self, blip: &RadarBlip) -> Option<i32> {
        let coord_min = -(1 << (RADAR_COORD_BITS - 1));
        let coord_max = (1 << (RADAR_COORD_BITS - 1)) - 1;
        if blip.client_num as i32 >= 1 << RADAR_CLIENT_BITS
            || (blip.x as i32) < coord_min
            || blip.x as i32 > coord_max
            || (blip.y as i32) < coord_min
            || blip.y as i32 > coord_max
            || blip.yaw as i32 >= 1 << RADAR_YAW_BITS
        {
            return None;
        }

        let coord_mask = (1 << RADAR_COORD_BITS) - 1;
        let mut packed = blip.client_num as i32;
        packed |= (blip.x as i32 & coord_mask) << RADAR_CLIENT_BITS;
        packed |= (blip.y as i32 & coord_mask) << (RADAR_CLIENT_BITS + RADAR_COORD_BITS);
        packed |= (blip.yaw as i32) << (RADAR_CLIENT_BITS + 2 * RADAR_COORD_BITS);
        Some(packed | RADAR_VALID)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::msg::stream::{DynamicStream, MessageStream, SeekPos};

    static PLAYER_8: Player8 = Player8 {
        range: ProtocolRange::new(5, 8),
    };

    static PLAYER_17: Player17 = Player17 {
        range: ProtocolRange::new(15, 17),
    };

    static PVS_17: Pvs17 = Pvs17 {
        range: ProtocolRange::new(15, 17),
    };

    fn running_player() -> PlayerState {
        let mut ps = PlayerState {
            command_time: 123_456,
            origin: [512.0, -256.5, 40.125],
            velocity: [250.0, 0.0, -8.0],
            view_angles: [-10.5, 180.0, 0.0],
            delta_angles: [0, 16384, 0],
            ground_entity_num: 1022,
            walking: 1,
            client_num: 3,
            view_height: -8,
            fov: 80.0,
            gravity: 800,
            speed: 250,
            ..Default::default()
        };
        ps.stats[Stat::Health as usize] = 100;
        ps.stats[Stat::Kills as usize] = -2;
        ps.stats[31] = 32767;
        ps.active_items[1] = 4;
        ps.ammo_amount[0] = 60;
        ps.max_ammo_amount[15] = -32768;
        ps
    }

    fn round_trip(
        strategy: &dyn PlayerStateParsing,
        from: Option<&PlayerState>,
        to: &PlayerState,
    ) -> PlayerState {
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            strategy.write_delta_player(&mut msg, from, to).unwrap();
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        strategy.read_delta_player(&mut msg, from).unwrap()
    }

    #[test]
    fn test_player_tables_read_write_eq() {
        let ps = running_player();
        for strategy in [&PLAYER_8 as &dyn PlayerStateParsing, &PLAYER_17].iter() {
            assert_eq!(round_trip(*strategy, None, &ps), ps);

            let mut next = ps.clone();
            next.command_time += 50;
            next.stats[Stat::Health as usize] = 75;
            next.ammo_amount[0] = 59;
            assert_eq!(round_trip(*strategy, Some(&ps), &next), next);
        }
    }

    #[test]
    fn test_player_radar_field_only_in_17() {
        let mut ps = PlayerState::default();
        ps.radar_info = PVS_17
            .write_radar(&RadarBlip {
                client_num: 2,
                x: -5,
                y: 17,
                yaw: 9,
            })
            .unwrap();

        assert_eq!(round_trip(&PLAYER_17, None, &ps), ps);
        assert_eq!(round_trip(&PLAYER_8, None, &ps).radar_info, 0);
    }

    #[test]
    fn test_radar_read_write_eq() {
        let blips = [
            RadarBlip {
                client_num: 0,
                x: 0,
                y: 0,
                yaw: 0,
            },
            RadarBlip {
                client_num: 63,
                x: -64,
                y: 63,
                yaw: 31,
            },
        ];

        for blip in blips.iter() {
            let packed = PVS_17.write_radar(blip).unwrap();
            assert!(packed < 1 << 26);
            assert_eq!(PVS_17.read_radar(packed), Some(*blip));
        }

        assert_eq!(PVS_17.read_radar(0), None);
        assert_eq!(
            PVS_17.write_radar(&RadarBlip {
                client_num: 64,
                x: 0,
                y: 0,
                yaw: 0
            }),
            None
        );
    }

    #[test]
    fn test_radar_absent_before_15() {
        let pvs = Pvs8 {
            range: ProtocolRange::new(5, 8),
        };
        let blip = RadarBlip {
            client_num: 1,
            x: 1,
            y: 1,
            yaw: 1,
        };
        assert_eq!(pvs.write_radar(&blip), None);
        assert_eq!(pvs.read_radar(0x3FF_FFFF), None);
    }
}
