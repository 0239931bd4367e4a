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

//! Config string numbering.
//!
//! Config strings are slots of a single table partitioned into fixed ranges. Protocols 5-8 number
//! the slots differently on the wire, so indices are translated when read and written and never
//! stored in wire form.

use crate::common::{
    msg::Msg,
    net::{
        gamestate::{GameStateLimits, MAX_GAMESTATE_CHARS},
        protocol::{EntityParsing, HeaderParsing, ProtocolRange, Versioned},
        NetError,
    },
};

pub const CS_SERVERINFO: usize = 0;
pub const CS_SYSTEMINFO: usize = 1;
pub const CS_MESSAGE: usize = 2;
pub const CS_SAVENAME: usize = 3;
pub const CS_MOTD: usize = 4;
pub const CS_WARMUP: usize = 5;
pub const CS_MUSIC: usize = 8;
pub const CS_FOGINFO: usize = 9;
pub const CS_SKYINFO: usize = 10;
pub const CS_GAME_VERSION: usize = 11;
pub const CS_LEVEL_START_TIME: usize = 12;
pub const CS_CURRENT_OBJECTIVE: usize = 13;
pub const CS_RAIN_DENSITY: usize = 14;
pub const CS_MATCHEND: usize = 26;

pub const MAX_MODELS: usize = 1024;
pub const MAX_OBJECTIVES: usize = 20;
pub const MAX_SOUNDS: usize = 512;
pub const MAX_IMAGES: usize = 64;
pub const MAX_LIGHTSTYLES: usize = 32;
pub const MAX_CLIENTS: usize = 64;
pub const MAX_WEAPONS: usize = 48;
pub const MAX_TEAMS: usize = 64;
pub const MAX_GENERAL_STRINGS: usize = 64;

pub const CS_MODELS: usize = 32;
pub const CS_OBJECTIVES: usize = CS_MODELS + MAX_MODELS;
pub const CS_SOUNDS: usize = CS_OBJECTIVES + MAX_OBJECTIVES;
pub const CS_IMAGES: usize = CS_SOUNDS + MAX_SOUNDS;
pub const CS_LIGHTSTYLES: usize = CS_IMAGES + MAX_IMAGES;
pub const CS_PLAYERS: usize = CS_LIGHTSTYLES + MAX_LIGHTSTYLES;
pub const CS_WEAPONS: usize = CS_PLAYERS + MAX_CLIENTS;
pub const CS_TEAMS: usize = CS_WEAPONS + MAX_WEAPONS;
pub const CS_GENERAL_STRINGS: usize = CS_TEAMS + MAX_TEAMS;
pub const CS_SPECTATORS: usize = CS_GENERAL_STRINGS + MAX_GENERAL_STRINGS;
pub const CS_ALLIES: usize = CS_SPECTATORS + 1;
pub const CS_AXIS: usize = CS_ALLIES + 1;
pub const CS_SOUNDTRACK: usize = CS_AXIS + 1;

pub const MAX_CONFIGSTRINGS: usize = 2736;

/// What a config string slot holds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigStringKind {
    ServerInfo,
    SystemInfo,
    Fixed(usize),
    Model(usize),
    Objective(usize),
    Sound(usize),
    Image(usize),
    LightStyle(usize),
    Player(usize),
    Weapon(usize),
    Team(usize),
    GeneralString(usize),
    Spectators,
    Allies,
    Axis,
    Soundtrack,
    Other(usize),
}

impl ConfigStringKind {
    /// Classify an internal config string index.
    pub fn of(index: usize) -> ConfigStringKind {
        use self::ConfigStringKind::*;

        match index {
            CS_SERVERINFO => ServerInfo,
            CS_SYSTEMINFO => SystemInfo,
            i if i < CS_MODELS => Fixed(i),
            i if i < CS_OBJECTIVES => Model(i - CS_MODELS),
            i if i < CS_SOUNDS => Objective(i - CS_OBJECTIVES),
            i if i < CS_IMAGES => Sound(i - CS_SOUNDS),
            i if i < CS_LIGHTSTYLES => Image(i - CS_IMAGES),
            i if i < CS_PLAYERS => LightStyle(i - CS_LIGHTSTYLES),
            i if i < CS_WEAPONS => Player(i - CS_PLAYERS),
            i if i < CS_TEAMS => Weapon(i - CS_WEAPONS),
            i if i < CS_GENERAL_STRINGS => Team(i - CS_TEAMS),
            i if i < CS_SPECTATORS => GeneralString(i - CS_GENERAL_STRINGS),
            CS_SPECTATORS => Spectators,
            CS_ALLIES => Allies,
            CS_AXIS => Axis,
            CS_SOUNDTRACK => Soundtrack,
            i => Other(i),
        }
    }

    /// Returns true if the slot names an asset the client may need to load.
    pub fn is_asset(&self) -> bool {
        match *self {
            ConfigStringKind::Model(_)
            | ConfigStringKind::Sound(_)
            | ConfigStringKind::Image(_) => true,
            _ => false,
        }
    }
}

/// Header strategy for protocols 5-8.
///
/// These protocols lack the two slots following the system info, so wire index `n >= 2` is
/// internal index `n + 2`.
pub struct Header8 {
    pub range: ProtocolRange,
}

impl Versioned for Header8 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl HeaderParsing for Header8 {
    fn limits(&self, entity: &dyn EntityParsing) -> GameStateLimits {
        GameStateLimits {
            max_config_strings: MAX_CONFIGSTRINGS,
            max_chars: MAX_GAMESTATE_CHARS,
            max_baselines: entity.max_entities(),
        }
    }

    fn config_string_from_net(&self, index: usize) -> usize {
        if index < 2 {
            index
        } else {
            index + 2
        }
    }

    fn config_string_to_net(&self, index: usize) -> Option<usize> {
        match index {
            0 | 1 => Some(index),
            2 | 3 => None,
            i => Some(i - 2),
        }
    }

    fn read_frame_time(&self, _msg: &mut Msg) -> Result<Option<f32>, NetError> {
        Ok(None)
    }

    fn write_frame_time(&self, _msg: &mut Msg, _frame_time: Option<f32>) -> Result<(), NetError> {
        Ok(())
    }
}

/// Header strategy for protocols 15-17: untranslated indices and the server frame time.
pub struct Header17 {
    pub range: ProtocolRange,
}

impl Versioned for Header17 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl HeaderParsing for Header17 {
    fn limits(&self, entity: &dyn EntityParsing) -> GameStateLimits {
        GameStateLimits {
            max_config_strings: MAX_CONFIGSTRINGS,
            max_chars: MAX_GAMESTATE_CHARS,
            max_baselines: entity.max_entities(),
        }
    }

    fn config_string_from_net(&self, index: usize) -> usize {
        index
    }

    fn config_string_to_net(&self, index: usize) -> Option<usize> {
        Some(index)
    }

    fn read_frame_time(&self, msg: &mut Msg) -> Result<Option<f32>, NetError> {
        Ok(Some(msg.read_float()?))
    }

    fn write_frame_time(&self, msg: &mut Msg, frame_time: Option<f32>) -> Result<(), NetError> {
        msg.write_float(frame_time.unwrap_or(0.05))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_string_ranges() {
        assert_eq!(CS_OBJECTIVES, 1056);
        assert_eq!(CS_SOUNDS, 1076);
        assert_eq!(CS_IMAGES, 1588);
        assert_eq!(CS_LIGHTSTYLES, 1652);
        assert_eq!(CS_PLAYERS, 1684);
        assert_eq!(CS_WEAPONS, 1748);
        assert_eq!(CS_TEAMS, 1796);
        assert_eq!(CS_GENERAL_STRINGS, 1860);
        assert_eq!(CS_SOUNDTRACK, 1927);
        assert!(CS_SOUNDTRACK < MAX_CONFIGSTRINGS);
    }

    #[test]
    fn test_config_string_kind() {
        assert_eq!(ConfigStringKind::of(1), ConfigStringKind::SystemInfo);
        assert_eq!(ConfigStringKind::of(CS_MODELS), ConfigStringKind::Model(0));
        assert_eq!(ConfigStringKind::of(CS_SOUNDS + 3), ConfigStringKind::Sound(3));
        assert_eq!(ConfigStringKind::of(CS_PLAYERS + 63), ConfigStringKind::Player(63));
        assert_eq!(ConfigStringKind::of(CS_AXIS), ConfigStringKind::Axis);
        assert!(ConfigStringKind::of(CS_IMAGES).is_asset());
        assert!(!ConfigStringKind::of(CS_MESSAGE).is_asset());
    }

    #[test]
    fn test_translation_before_15() {
        let header = Header8 {
            range: ProtocolRange::new(5, 8),
        };

        assert_eq!(header.config_string_from_net(0), CS_SERVERINFO);
        assert_eq!(header.config_string_from_net(1), CS_SYSTEMINFO);
        assert_eq!(header.config_string_from_net(2), 4);
        assert_eq!(header.config_string_from_net(30), CS_MODELS);

        assert_eq!(header.config_string_to_net(CS_MESSAGE), None);
        assert_eq!(header.config_string_to_net(CS_MODELS), Some(30));
        for net in 0..100 {
            let index = header.config_string_from_net(net);
            assert_eq!(header.config_string_to_net(index), Some(net));
        }
    }

    #[test]
    fn test_no_translation_from_15() {
        let header = Header17 {
            range: ProtocolRange::new(15, 17),
        };
        assert_eq!(header.config_string_from_net(CS_MODELS), CS_MODELS);
        assert_eq!(header.config_string_to_net(CS_MESSAGE), Some(CS_MESSAGE));
    }
}
