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

//! Protocol version dispatch.
//!
//! Each serialization concern has a small set of strategies, one per protocol family, each
//! claiming a range of protocol numbers. The 15+ strategies delegate to the 5-8 code for the parts
//! that did not change. A strategy with the `[0, 0]` range is the default for versions no other
//! strategy claims.

use std::fmt;

use crate::common::{
    msg::Msg,
    net::{
        encoding::{String17, String8},
        entity::{Entity17, Entity8, EntityState, SoundEvent},
        field::FieldTable,
        gamestate::GameStateLimits,
        configstring::{Header17, Header8},
        player::{Player17, Player8, PlayerState, Pvs17, Pvs8, RadarBlip},
        usercmd::{Hash17, Hash8, Input17, Input8, UserCmd, UserEyes},
        NetError, NetErrorKind,
    },
};

/// Lowest protocol number any strategy understands.
pub const MIN_PROTOCOL: u32 = 5;

/// Protocol of the first retail release.
pub const PROTOCOL_AA: u32 = 8;

/// Protocol of the later expansion releases.
pub const PROTOCOL_SH: u32 = 15;
pub const PROTOCOL_BT: u32 = 17;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProtocolRange {
    pub min: u32,
    pub max: u32,
}

impl ProtocolRange {
    /// Matches any version no other strategy claims.
    pub const ANY: ProtocolRange = ProtocolRange { min: 0, max: 0 };

    pub const fn new(min: u32, max: u32) -> ProtocolRange {
        ProtocolRange { min, max }
    }

    pub fn is_default(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    pub fn contains(&self, version: u32) -> bool {
        self.min <= version && version <= self.max
    }
}

impl fmt::Display for ProtocolRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_default() {
            write!(f, "[default]")
        } else {
            write!(f, "[{}, {}]", self.min, self.max)
        }
    }
}

pub trait Versioned {
    fn range(&self) -> ProtocolRange;
}

/// Pick the first strategy whose range contains `version`, falling back to the default.
pub fn select<T>(candidates: &[&'static T], version: u32) -> Option<&'static T>
where
    T: Versioned + ?Sized,
{
    candidates
        .iter()
        .find(|c| !c.range().is_default() && c.range().contains(version))
        .or_else(|| candidates.iter().find(|c| c.range().is_default()))
        .cloned()
}

/// Entity numbering, entity field tables and sound events.
pub trait EntityParsing: Versioned + Sync {
    fn number_bits(&self) -> i32;

    fn table(&self) -> &'static FieldTable<EntityState>;

    fn max_entities(&self) -> usize {
        1 << self.number_bits()
    }

    /// Entity number terminating a packet entity list.
    fn none_number(&self) -> u32 {
        self.max_entities() as u32 - 1
    }

    fn read_number(&self, msg: &mut Msg) -> Result<u32, NetError> {
        Ok(msg.read_bits(self.number_bits())? as u32)
    }

    fn write_number(&self, msg: &mut Msg, number: u32) -> Result<(), NetError> {
        if number as usize >= self.max_entities() {
            return Err(NetErrorKind::BadEntityNumber { number }.into());
        }

        msg.write_bits(number as i64, self.number_bits())
    }

    /// Read an entity update after its number. Returns `None` if the entity was removed.
    fn read_delta_entity(
        &self,
        msg: &mut Msg,
        from: Option<&EntityState>,
        number: u32,
    ) -> Result<Option<EntityState>, NetError> {
        crate::common::net::entity::read_delta_entity(msg, self.table(), from, number)
    }

    /// Write an entity update including its number. `to` of `None` removes the entity.
    fn write_delta_entity(
        &self,
        msg: &mut Msg,
        from: Option<&EntityState>,
        to: Option<&EntityState>,
        force: bool,
    ) -> Result<(), NetError> {
        crate::common::net::entity::write_delta_entity(
            msg,
            self.table(),
            self.number_bits(),
            from,
            to,
            force,
        )
    }

    fn read_sound(&self, msg: &mut Msg) -> Result<SoundEvent, NetError>;

    fn write_sound(&self, msg: &mut Msg, sound: &SoundEvent) -> Result<(), NetError>;
}

/// Player state field tables.
pub trait PlayerStateParsing: Versioned + Sync {
    fn table(&self) -> &'static FieldTable<PlayerState>;

    fn read_delta_player(
        &self,
        msg: &mut Msg,
        from: Option<&PlayerState>,
    ) -> Result<PlayerState, NetError> {
        crate::common::net::player::read_delta_player_state(msg, self.table(), from)
    }

    fn write_delta_player(
        &self,
        msg: &mut Msg,
        from: Option<&PlayerState>,
        to: &PlayerState,
    ) -> Result<(), NetError> {
        crate::common::net::player::write_delta_player_state(msg, self.table(), from, to)
    }
}

/// Radar blip packing.
pub trait PvsParsing: Versioned + Sync {
    fn read_radar(&self, radar_info: i32) -> Option<RadarBlip>;

    fn write_radar(&self, blip: &RadarBlip) -> Option<i32>;
}

/// String encoding on the wire.
pub trait StringParsing: Versioned + Sync {
    fn read_string(&self, msg: &mut Msg, max: usize) -> Result<String, NetError>;

    fn write_string(&self, msg: &mut Msg, s: &str, max: usize) -> Result<(), NetError>;
}

/// Command string hashing for the user command key.
pub trait HashParsing: Versioned + Sync {
    fn max_len(&self) -> usize;

    fn hash_key(&self, s: &[u8]) -> u32 {
        let mut hash: i32 = 0;
        for (i, &c) in s.iter().take(self.max_len()).enumerate() {
            if c == 0 {
                break;
            }

            let c = if c & 0x80 != 0 || c == b'%' { b'.' } else { c };
            hash = hash.wrapping_add((c as i32).wrapping_mul(119 + i as i32));
        }

        (hash ^ (hash >> 10) ^ (hash >> 20)) as u32
    }
}

/// User command and eye info deltas.
pub trait InputWriting: Versioned + Sync {
    fn button_bits(&self) -> i32;

    fn write_usercmd(
        &self,
        msg: &mut Msg,
        key: u32,
        from: &UserCmd,
        to: &UserCmd,
    ) -> Result<(), NetError> {
        crate::common::net::usercmd::write_delta_usercmd(msg, self.button_bits(), key, from, to)
    }

    fn read_usercmd(&self, msg: &mut Msg, key: u32, from: &UserCmd) -> Result<UserCmd, NetError> {
        crate::common::net::usercmd::read_delta_usercmd(msg, self.button_bits(), key, from)
    }

    fn write_eyes(&self, msg: &mut Msg, from: &UserEyes, to: &UserEyes) -> Result<(), NetError>;

    fn read_eyes(&self, msg: &mut Msg, from: &UserEyes) -> Result<UserEyes, NetError>;
}

/// Game state header layout and config string numbering.
pub trait HeaderParsing: Versioned + Sync {
    fn limits(&self, entity: &dyn EntityParsing) -> GameStateLimits;

    /// Map a wire config string index to the internal numbering.
    fn config_string_from_net(&self, index: usize) -> usize;

    /// Map an internal config string index to the wire, or `None` if it has no wire slot.
    fn config_string_to_net(&self, index: usize) -> Option<usize>;

    fn read_frame_time(&self, msg: &mut Msg) -> Result<Option<f32>, NetError>;

    fn write_frame_time(&self, msg: &mut Msg, frame_time: Option<f32>) -> Result<(), NetError>;
}

static ENTITY_PARSERS: [&dyn EntityParsing; 3] = [
    &Entity8 {
        range: ProtocolRange::new(5, 8),
    },
    &Entity17 {
        range: ProtocolRange::new(15, 17),
    },
    &Entity17 {
        range: ProtocolRange::ANY,
    },
];

static PLAYER_PARSERS: [&dyn PlayerStateParsing; 3] = [
    &Player8 {
        range: ProtocolRange::new(5, 8),
    },
    &Player17 {
        range: ProtocolRange::new(15, 17),
    },
    &Player17 {
        range: ProtocolRange::ANY,
    },
];

static PVS_PARSERS: [&dyn PvsParsing; 3] = [
    &Pvs8 {
        range: ProtocolRange::new(5, 8),
    },
    &Pvs17 {
        range: ProtocolRange::new(15, 17),
    },
    &Pvs17 {
        range: ProtocolRange::ANY,
    },
];

static STRING_PARSERS: [&dyn StringParsing; 3] = [
    &String8 {
        range: ProtocolRange::new(5, 8),
    },
    &String17 {
        range: ProtocolRange::new(15, 17),
    },
    &String17 {
        range: ProtocolRange::ANY,
    },
];

static HASH_PARSERS: [&dyn HashParsing; 3] = [
    &Hash8 {
        range: ProtocolRange::new(5, 8),
    },
    &Hash17 {
        range: ProtocolRange::new(15, 17),
    },
    &Hash17 {
        range: ProtocolRange::ANY,
    },
];

static INPUT_WRITERS: [&dyn InputWriting; 3] = [
    &Input8 {
        range: ProtocolRange::new(5, 8),
    },
    &Input17 {
        range: ProtocolRange::new(15, 17),
    },
    &Input17 {
        range: ProtocolRange::ANY,
    },
];

static HEADER_PARSERS: [&dyn HeaderParsing; 3] = [
    &Header8 {
        range: ProtocolRange::new(5, 8),
    },
    &Header17 {
        range: ProtocolRange::new(15, 17),
    },
    &Header17 {
        range: ProtocolRange::ANY,
    },
];

/// The strategies negotiated for one connection.
#[derive(Clone, Copy)]
pub struct Protocol {
    pub version: u32,
    pub entity: &'static dyn EntityParsing,
    pub player: &'static dyn PlayerStateParsing,
    pub pvs: &'static dyn PvsParsing,
    pub string: &'static dyn StringParsing,
    pub hash: &'static dyn HashParsing,
    pub input: &'static dyn InputWriting,
    pub header: &'static dyn HeaderParsing,
}

fn pick<T>(candidates: &[&'static T], version: u32) -> Result<&'static T, NetError>
where
    T: Versioned + ?Sized,
{
    select(candidates, version).ok_or_else(|| NetErrorKind::UnsupportedProtocol { version }.into())
}

impl Protocol {
    /// Select every concern's strategy for `version`.
    pub fn for_version(version: u32) -> Result<Protocol, NetError> {
        if version < MIN_PROTOCOL {
            return Err(NetErrorKind::UnsupportedProtocol { version }.into());
        }

        let protocol = Protocol {
            version,
            entity: pick(&ENTITY_PARSERS, version)?,
            player: pick(&PLAYER_PARSERS, version)?,
            pvs: pick(&PVS_PARSERS, version)?,
            string: pick(&STRING_PARSERS, version)?,
            hash: pick(&HASH_PARSERS, version)?,
            input: pick(&INPUT_WRITERS, version)?,
            header: pick(&HEADER_PARSERS, version)?,
        };

        if protocol.entity.range().is_default() {
            debug!("No strategy claims protocol {}, using defaults", version);
        }

        Ok(protocol)
    }

    pub fn limits(&self) -> GameStateLimits {
        self.header.limits(self.entity)
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("version", &self.version)
            .field("entity", &self.entity.range())
            .field("player", &self.player.range())
            .field("string", &self.string.range())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Named {
        range: ProtocolRange,
        name: &'static str,
    }

    impl Versioned for Named {
        fn range(&self) -> ProtocolRange {
            self.range
        }
    }

    static CANDIDATES: [&Named; 3] = [
        &Named {
            range: ProtocolRange::new(5, 8),
            name: "aa",
        },
        &Named {
            range: ProtocolRange::new(15, 17),
            name: "sh/bt",
        },
        &Named {
            range: ProtocolRange::ANY,
            name: "default",
        },
    ];

    #[test]
    fn test_select_claimed_range() {
        assert_eq!(select(&CANDIDATES, 16).unwrap().name, "sh/bt");
        assert_eq!(select(&CANDIDATES, 5).unwrap().name, "aa");
        assert_eq!(select(&CANDIDATES, 8).unwrap().name, "aa");
    }

    #[test]
    fn test_select_unclaimed_falls_back_to_default() {
        assert_eq!(select(&CANDIDATES, 99).unwrap().name, "default");
        assert_eq!(select(&CANDIDATES, 0).unwrap().name, "default");
    }

    #[test]
    fn test_select_without_default() {
        let candidates: [&Named; 1] = [CANDIDATES[0]];
        assert!(select(&candidates, 16).is_none());
    }

    #[test]
    fn test_protocol_for_version() {
        let aa = Protocol::for_version(8).unwrap();
        assert_eq!(aa.entity.number_bits(), 10);
        assert_eq!(aa.hash.max_len(), 32);

        let sh = Protocol::for_version(15).unwrap();
        assert_eq!(sh.entity.number_bits(), 11);
        assert_eq!(sh.entity.range(), ProtocolRange::new(15, 17));
        assert_eq!(sh.hash.max_len(), 64);

        let future = Protocol::for_version(99).unwrap();
        assert!(future.entity.range().is_default());
        assert_eq!(future.entity.number_bits(), 11);
    }

    #[test]
    fn test_protocol_too_old() {
        let err = Protocol::for_version(4).unwrap_err();
        assert_eq!(err.kind(), NetErrorKind::UnsupportedProtocol { version: 4 });
    }

    #[test]
    fn test_hash_key_stops_at_terminator() {
        let aa = Protocol::for_version(8).unwrap();
        assert_eq!(aa.hash.hash_key(b"abc\0def"), aa.hash.hash_key(b"abc"));
        assert_eq!(aa.hash.hash_key(b""), 0);
        assert_ne!(aa.hash.hash_key(b"abc"), aa.hash.hash_key(b"abd"));

        // protocol 8 only hashes the first 32 characters
        let long_a = [b'a'; 40];
        let mut long_b = long_a;
        long_b[35] = b'b';
        assert_eq!(aa.hash.hash_key(&long_a), aa.hash.hash_key(&long_b));

        let bt = Protocol::for_version(17).unwrap();
        assert_ne!(bt.hash.hash_key(&long_a), bt.hash.hash_key(&long_b));
    }
}
