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

use num::FromPrimitive;

use crate::common::{
    info::{self, InfoString},
    msg::{Msg, BIG_INFO_STRING},
    net::{
        configstring::{CS_SERVERINFO, CS_SYSTEMINFO},
        entity::EntityState,
        protocol::Protocol,
        NetError, NetErrorKind, ServerOp,
    },
};

/// Total characters, terminators included, all config strings may occupy.
pub const MAX_GAMESTATE_CHARS: usize = 40000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GameStateLimits {
    pub max_config_strings: usize,
    pub max_chars: usize,
    pub max_baselines: usize,
}

/// Config strings and entity baselines as last declared by the server.
#[derive(Clone, Debug)]
pub struct GameState {
    limits: GameStateLimits,
    config_strings: Vec<String>,
    data_count: usize,
    baselines: Vec<Option<EntityState>>,

    pub server_command_sequence: u32,
    pub client_num: i32,
    pub checksum_feed: i32,

    /// Seconds per server frame, protocols 15 and later.
    pub server_frame_time: Option<f32>,
}

impl GameState {
    pub fn new(limits: GameStateLimits) -> GameState {
        GameState {
            limits,
            config_strings: vec![String::new(); limits.max_config_strings],
            data_count: 0,
            baselines: vec![None; limits.max_baselines],
            server_command_sequence: 0,
            client_num: 0,
            checksum_feed: 0,
            server_frame_time: None,
        }
    }

    pub fn limits(&self) -> GameStateLimits {
        self.limits
    }

    /// Parse the body of a game state message, following its opcode.
    pub fn parse(msg: &mut Msg, protocol: &Protocol) -> Result<GameState, NetError> {
        let mut gs = GameState::new(protocol.limits());
        gs.server_command_sequence = msg.read_long()? as u32;

        loop {
            let code = msg.read_byte()?;
            match ServerOp::from_u8(code) {
                Some(ServerOp::Eof) => break,

                Some(ServerOp::ConfigString) => {
                    let net_index = msg.read_short()? as u16 as usize;
                    let index = protocol.header.config_string_from_net(net_index);
                    let value = protocol.string.read_string(msg, BIG_INFO_STRING)?;
                    trace!("gamestate config string {}: {}", index, value);
                    gs.set_config_string(index, value)?;
                }

                Some(ServerOp::Baseline) => {
                    let number = protocol.entity.read_number(msg)?;
                    if number as usize >= gs.limits.max_baselines {
                        return Err(NetErrorKind::BadEntityNumber { number }.into());
                    }

                    let baseline = protocol.entity.read_delta_entity(msg, None, number)?;
                    gs.baselines[number as usize] = Some(baseline.unwrap_or_else(|| EntityState {
                        number: number as i32,
                        ..Default::default()
                    }));
                }

                _ => return Err(NetErrorKind::BadOpcode { code }.into()),
            }
        }

        gs.client_num = msg.read_long()?;
        gs.checksum_feed = msg.read_long()?;
        gs.server_frame_time = protocol.header.read_frame_time(msg)?;

        debug!(
            "Game state: {} config strings, {} chars, client {}",
            gs.non_empty().count(),
            gs.data_count,
            gs.client_num
        );

        Ok(gs)
    }

    /// Write the body of a game state message, as the server does.
    pub fn write(&self, msg: &mut Msg, protocol: &Protocol) -> Result<(), NetError> {
        msg.write_long(self.server_command_sequence as i32)?;

        for (index, value) in self.non_empty() {
            let net_index = match protocol.header.config_string_to_net(index) {
                Some(n) => n,
                None => {
                    warn!(
                        "Config string {} has no slot in protocol {}",
                        index, protocol.version
                    );
                    continue;
                }
            };

            msg.write_byte(ServerOp::ConfigString as u8)?;
            msg.write_short(net_index as i16)?;
            protocol.string.write_string(msg, value, BIG_INFO_STRING)?;
        }

        for baseline in self.baselines.iter().filter_map(|b| b.as_ref()) {
            msg.write_byte(ServerOp::Baseline as u8)?;
            protocol
                .entity
                .write_delta_entity(msg, None, Some(baseline), true)?;
        }

        msg.write_byte(ServerOp::Eof as u8)?;
        msg.write_long(self.client_num)?;
        msg.write_long(self.checksum_feed)?;
        protocol.header.write_frame_time(msg, self.server_frame_time)
    }

    pub fn config_string(&self, index: usize) -> Option<&str> {
        self.config_strings.get(index).map(|s| s.as_str())
    }

    /// Replace a config string, keeping the total within the character budget.
    pub fn set_config_string<S>(&mut self, index: usize, value: S) -> Result<(), NetError>
    where
        S: Into<String>,
    {
        if index >= self.limits.max_config_strings {
            return Err(NetErrorKind::BadConfigString { index }.into());
        }

        let value = value.into();
        let old_len = match self.config_strings[index].len() {
            0 => 0,
            n => n + 1,
        };
        let new_len = match value.len() {
            0 => 0,
            n => n + 1,
        };

        let data_count = self.data_count - old_len + new_len;
        if data_count > self.limits.max_chars {
            return Err(NetErrorKind::GameStateOverflow {
                max: self.limits.max_chars,
            }
            .into());
        }

        self.data_count = data_count;
        self.config_strings[index] = value;
        Ok(())
    }

    /// All non-empty config strings in index order.
    pub fn non_empty(&self) -> impl Iterator<Item = (usize, &str)> {
        self.config_strings
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, s)| (i, s.as_str()))
    }

    pub fn data_count(&self) -> usize {
        self.data_count
    }

    pub fn baseline(&self, number: usize) -> Option<&EntityState> {
        self.baselines.get(number).and_then(|b| b.as_ref())
    }

    pub fn set_baseline(&mut self, state: EntityState) -> Result<(), NetError> {
        let number = state.number;
        if number < 0 || number as usize >= self.limits.max_baselines {
            return Err(NetErrorKind::BadEntityNumber {
                number: number as u32,
            }
            .into());
        }

        self.baselines[number as usize] = Some(state);
        Ok(())
    }

    pub fn server_info(&self) -> InfoString {
        InfoString::parse(&self.config_strings[CS_SERVERINFO])
    }

    pub fn system_info(&self) -> InfoString {
        InfoString::parse(&self.config_strings[CS_SYSTEMINFO])
    }

    /// The server id declared in the system info, which changes on every map load.
    pub fn server_id(&self) -> Option<u32> {
        info::value_for_key(&self.config_strings[CS_SYSTEMINFO], "sv_serverid")
            .and_then(|v| v.trim().parse::<i32>().ok())
            .map(|v| v as u32)
    }
}

/// Reassembles config strings too long for a single server command.
///
/// `bcs0` starts a string, `bcs1` continues it and `bcs2` completes it.
#[derive(Clone, Debug, Default)]
pub struct BigConfigString {
    index: Option<usize>,
    buf: String,
}

impl BigConfigString {
    pub fn new() -> BigConfigString {
        BigConfigString::default()
    }

    pub fn begin(&mut self, index: usize, part: &str) {
        self.index = Some(index);
        self.buf.clear();
        self.buf.push_str(part);
    }

    pub fn append(&mut self, index: usize, part: &str) {
        if self.index != Some(index) {
            warn!("bcs1 for config string {} without bcs0", index);
            return;
        }

        self.buf.push_str(part);
    }

    /// Complete the string, returning it if it was started with the same index.
    pub fn finish(&mut self, index: usize, part: &str) -> Option<String> {
        if self.index.take() != Some(index) {
            warn!("bcs2 for config string {} without bcs0", index);
            self.buf.clear();
            return None;
        }

        self.buf.push_str(part);
        Some(std::mem::replace(&mut self.buf, String::new()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::{
        msg::stream::{DynamicStream, MessageStream, SeekPos},
        net::configstring::{CS_MESSAGE, CS_MODELS, CS_SOUNDS},
    };

    fn sample(protocol: &Protocol) -> GameState {
        let mut gs = GameState::new(protocol.limits());
        gs.server_command_sequence = 12;
        gs.client_num = 3;
        gs.checksum_feed = -559038737;
        gs.server_frame_time = if protocol.version >= 15 { Some(0.05) } else { None };
        gs.set_config_string(CS_SERVERINFO, "\\mapname\\dm/mohdm6\\g_gametype\\2")
            .unwrap();
        gs.set_config_string(CS_SYSTEMINFO, "\\sv_serverid\\1234\\sv_pure\\0")
            .unwrap();
        gs.set_config_string(CS_MODELS + 1, "*1").unwrap();
        gs.set_config_string(CS_SOUNDS + 2, "sound/weapons/fire/KarFire1.wav")
            .unwrap();
        gs.set_baseline(EntityState {
            number: 42,
            model_index: 7,
            net_origin: [16.0, 32.0, -64.0],
            scale: 1.0,
            ..Default::default()
        })
        .unwrap();
        gs
    }

    fn write_parse(protocol: &Protocol, gs: &GameState) -> GameState {
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            gs.write(&mut msg, protocol).unwrap();
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        GameState::parse(&mut msg, protocol).unwrap()
    }

    #[test]
    fn test_gamestate_read_write_eq() {
        for version in [8, 17].iter() {
            let protocol = Protocol::for_version(*version).unwrap();
            let gs = sample(&protocol);
            let got = write_parse(&protocol, &gs);

            assert_eq!(
                got.non_empty().collect::<Vec<_>>(),
                gs.non_empty().collect::<Vec<_>>()
            );
            assert_eq!(got.data_count(), gs.data_count());
            assert_eq!(got.baseline(42), gs.baseline(42));
            assert_eq!(got.baseline(41), None);
            assert_eq!(got.server_command_sequence, 12);
            assert_eq!(got.client_num, 3);
            assert_eq!(got.checksum_feed, -559038737);
            assert_eq!(got.server_frame_time, gs.server_frame_time);
            assert_eq!(got.server_id(), Some(1234));
            assert_eq!(got.server_info().get("mapname"), Some("dm/mohdm6"));
        }
    }

    #[test]
    fn test_gamestate_message_slot_missing_before_15() {
        let protocol = Protocol::for_version(8).unwrap();
        let mut gs = sample(&protocol);
        gs.set_config_string(CS_MESSAGE, "Loading...").unwrap();

        let got = write_parse(&protocol, &gs);
        assert_eq!(got.config_string(CS_MESSAGE), Some(""));
        assert_eq!(got.config_string(CS_MODELS + 1), Some("*1"));
    }

    #[test]
    fn test_gamestate_char_budget() {
        let protocol = Protocol::for_version(17).unwrap();
        let mut gs = GameState::new(GameStateLimits {
            max_chars: 10,
            ..protocol.limits()
        });

        gs.set_config_string(5, "abcd").unwrap();
        gs.set_config_string(6, "efgh").unwrap();
        assert_eq!(gs.data_count(), 10);
        assert_eq!(
            gs.set_config_string(7, "i").unwrap_err().kind(),
            NetErrorKind::GameStateOverflow { max: 10 }
        );

        // replacing a string frees its space
        gs.set_config_string(6, "").unwrap();
        gs.set_config_string(7, "ijk").unwrap();
        assert_eq!(gs.data_count(), 9);
    }

    #[test]
    fn test_gamestate_bad_index() {
        let protocol = Protocol::for_version(17).unwrap();
        let mut gs = GameState::new(protocol.limits());
        assert_eq!(
            gs.set_config_string(5000, "x").unwrap_err().kind(),
            NetErrorKind::BadConfigString { index: 5000 }
        );
    }

    #[test]
    fn test_gamestate_bad_opcode() {
        let protocol = Protocol::for_version(17).unwrap();
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            msg.write_long(0).unwrap();
            msg.write_byte(ServerOp::Snapshot as u8).unwrap();
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        let err = GameState::parse(&mut msg, &protocol).unwrap_err();
        assert_eq!(
            err.kind(),
            NetErrorKind::BadOpcode {
                code: ServerOp::Snapshot as u8
            }
        );
    }

    #[test]
    fn test_big_config_string() {
        let mut bcs = BigConfigString::new();
        bcs.begin(0, "\\mapname\\");
        bcs.append(0, "dm/");
        assert_eq!(bcs.finish(0, "mohdm1"), Some("\\mapname\\dm/mohdm1".to_owned()));
        assert_eq!(bcs.finish(0, "again"), None);

        bcs.begin(3, "a");
        bcs.append(4, "b");
        assert_eq!(bcs.finish(4, "c"), None);
    }
}
