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

//! User commands and eye info sent from client to server.

use crate::common::{
    msg::{
        coord::{angle_to_short, short_to_angle},
        Msg,
    },
    net::{
        protocol::{HashParsing, InputWriting, ProtocolRange, Versioned},
        NetError,
    },
};

bitflags! {
    pub struct ButtonFlags: u16 {
        const ATTACK_PRIMARY = 1 << 0;
        const ATTACK_SECONDARY = 1 << 1;
        const RUN = 1 << 2;
        const USE = 1 << 3;
        const LEAN_LEFT = 1 << 4;
        const LEAN_RIGHT = 1 << 5;
        const TALK = 1 << 6;
        const ANY = 1 << 7;
        const MOUSE = 1 << 8;
    }
}

/// One frame of player input.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UserCmd {
    pub server_time: i32,
    pub buttons: u16,
    pub angles: [u16; 3],
    pub forward_move: i8,
    pub right_move: i8,
    pub up_move: i8,
}

impl UserCmd {
    pub fn set_view_angles(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.angles = [angle_to_short(pitch), angle_to_short(yaw), angle_to_short(roll)];
    }

    pub fn view_angles(&self) -> [f32; 3] {
        [
            short_to_angle(self.angles[0]),
            short_to_angle(self.angles[1]),
            short_to_angle(self.angles[2]),
        ]
    }

    pub fn button_flags(&self) -> ButtonFlags {
        ButtonFlags::from_bits_truncate(self.buttons)
    }

    fn same_input(&self, other: &UserCmd) -> bool {
        self.angles == other.angles
            && self.forward_move == other.forward_move
            && self.right_move == other.right_move
            && self.up_move == other.up_move
            && self.buttons == other.buttons
    }
}

/// Where the player's eyes are relative to the origin and where they look.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UserEyes {
    pub ofs: [i8; 3],
    pub angles: [f32; 2],
}

/// Write `to` as a delta from `from`, keyed with `key` and the command's server time.
pub fn write_delta_usercmd(
    msg: &mut Msg,
    button_bits: i32,
    key: u32,
    from: &UserCmd,
    to: &UserCmd,
) -> Result<(), NetError> {
    let dt = to.server_time.wrapping_sub(from.server_time);
    if dt >= 0 && dt < 256 {
        msg.write_bool(true)?;
        msg.write_bits(dt as i64, 8)?;
    } else {
        msg.write_bool(false)?;
        msg.write_bits(to.server_time as u32 as i64, 32)?;
    }

    if from.same_input(to) {
        return msg.write_bool(false);
    }

    let key = key ^ to.server_time as u32;
    msg.write_bool(true)?;
    for i in 0..3 {
        msg.write_delta_key(key, from.angles[i] as u32, to.angles[i] as u32, 16)?;
    }
    msg.write_delta_key(key, from.forward_move as u8 as u32, to.forward_move as u8 as u32, 8)?;
    msg.write_delta_key(key, from.right_move as u8 as u32, to.right_move as u8 as u32, 8)?;
    msg.write_delta_key(key, from.up_move as u8 as u32, to.up_move as u8 as u32, 8)?;
    msg.write_delta_key(key, from.buttons as u32, to.buttons as u32, button_bits)?;

    Ok(())
}

pub fn read_delta_usercmd(
    msg: &mut Msg,
    button_bits: i32,
    key: u32,
    from: &UserCmd,
) -> Result<UserCmd, NetError> {
    let mut to = *from;
    to.server_time = if msg.read_bool()? {
        from.server_time.wrapping_add(msg.read_bits(8)? as i32)
    } else {
        msg.read_bits(32)? as u32 as i32
    };

    if !msg.read_bool()? {
        return Ok(to);
    }

    let key = key ^ to.server_time as u32;
    for i in 0..3 {
        to.angles[i] = msg.read_delta_key(key, from.angles[i] as u32, 16)? as u16;
    }
    to.forward_move = msg.read_delta_key(key, from.forward_move as u8 as u32, 8)? as u8 as i8;
    to.right_move = msg.read_delta_key(key, from.right_move as u8 as u32, 8)? as u8 as i8;
    to.up_move = msg.read_delta_key(key, from.up_move as u8 as u32, 8)? as u8 as i8;
    to.buttons = msg.read_delta_key(key, from.buttons as u32, button_bits)? as u16;

    Ok(to)
}

fn write_eyes_base(msg: &mut Msg, from: &UserEyes, to: &UserEyes) -> Result<(), NetError> {
    if from == to {
        return msg.write_bool(false);
    }

    msg.write_bool(true)?;
    for i in 0..3 {
        if from.ofs[i] == to.ofs[i] {
            msg.write_bool(false)?;
        } else {
            msg.write_bool(true)?;
            msg.write_bits(to.ofs[i] as i64, -8)?;
        }
    }

    for i in 0..2 {
        if from.angles[i].to_bits() == to.angles[i].to_bits() {
            msg.write_bool(false)?;
        } else {
            msg.write_bool(true)?;
            msg.write_float(to.angles[i])?;
        }
    }

    Ok(())
}

fn read_eyes_base(msg: &mut Msg, from: &UserEyes) -> Result<UserEyes, NetError> {
    let mut to = *from;
    if !msg.read_bool()? {
        return Ok(to);
    }

    for i in 0..3 {
        if msg.read_bool()? {
            to.ofs[i] = msg.read_bits(-8)? as i8;
        }
    }

    for i in 0..2 {
        if msg.read_bool()? {
            to.angles[i] = msg.read_float()?;
        }
    }

    Ok(to)
}

/// Input strategy for protocols 5-8: 8 bits of buttons.
pub struct Input8 {
    pub range: ProtocolRange,
}

impl Versioned for Input8 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl InputWriting for Input8 {
    fn button_bits(&self) -> i32 {
        8
    }

    fn write_eyes(&self, msg: &mut Msg, from: &UserEyes, to: &UserEyes) -> Result<(), NetError> {
        write_eyes_base(msg, from, to)
    }

    fn read_eyes(&self, msg: &mut Msg, from: &UserEyes) -> Result<UserEyes, NetError> {
        read_eyes_base(msg, from)
    }
}

/// Input strategy for protocols 15-17: 16 bits of buttons, eye info unchanged.
pub struct Input17 {
    pub range: ProtocolRange,
}

impl Versioned for Input17 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl InputWriting for Input17 {
    fn button_bits(&self) -> i32 {
        16
    }

    fn write_eyes(&self, msg: &mut Msg, from: &UserEyes, to: &UserEyes) -> Result<(), NetError> {
        write_eyes_base(msg, from, to)
    }

    fn read_eyes(&self, msg: &mut Msg, from: &UserEyes) -> Result<UserEyes, NetError> {
        read_eyes_base(msg, from)
    }
}

pub struct Hash8 {
    pub range: ProtocolRange,
}

impl Versioned for Hash8 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl HashParsing for Hash8 {
    fn max_len(&self) -> usize {
        32
    }
}

pub struct Hash17 {
    pub range: ProtocolRange,
}

impl Versioned for Hash17 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl HashParsing for Hash17 {
    fn max_len(&self) -> usize {
        64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::msg::stream::{DynamicStream, MessageStream, SeekPos};

    static INPUT_8: Input8 = Input8 {
        range: ProtocolRange::new(5, 8),
    };

    static INPUT_17: Input17 = Input17 {
        range: ProtocolRange::new(15, 17),
    };

    fn strafe(server_time: i32) -> UserCmd {
        let mut cmd = UserCmd {
            server_time,
            buttons: (ButtonFlags::ATTACK_PRIMARY | ButtonFlags::RUN).bits(),
            forward_move: 127,
            right_move: -128,
            up_move: 0,
            ..Default::default()
        };
        cmd.set_view_angles(-10.0, 90.0, 0.0);
        cmd
    }

    #[test]
    fn test_usercmd_read_write_eq() {
        let key = 0x1357_9BDF;
        let base = UserCmd::default();
        let first = strafe(1000);
        let mut second = strafe(1016);
        second.forward_move = -3;
        let idle = UserCmd {
            server_time: 5000,
            ..second
        };

        for input in [&INPUT_8 as &dyn InputWriting, &INPUT_17].iter() {
            let mut stream = DynamicStream::new();
            {
                let mut msg = Msg::new(&mut stream);
                input.write_usercmd(&mut msg, key, &base, &first).unwrap();
                input.write_usercmd(&mut msg, key, &first, &second).unwrap();
                input.write_usercmd(&mut msg, key, &second, &idle).unwrap();
                msg.flush().unwrap();
            }

            stream.seek(0, SeekPos::Begin).unwrap();
            let mut msg = Msg::new(&mut stream);
            let got = input.read_usercmd(&mut msg, key, &base).unwrap();
            assert_eq!(got, first);
            let got = input.read_usercmd(&mut msg, key, &got).unwrap();
            assert_eq!(got, second);
            let got = input.read_usercmd(&mut msg, key, &got).unwrap();
            assert_eq!(got, idle);
        }
    }

    #[test]
    fn test_usercmd_wrong_key_garbles() {
        let cmd = strafe(2000);
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            INPUT_17
                .write_usercmd(&mut msg, 1, &UserCmd::default(), &cmd)
                .unwrap();
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        let got = INPUT_17
            .read_usercmd(&mut msg, 2, &UserCmd::default())
            .unwrap();
        assert_eq!(got.server_time, 2000);
        assert_ne!(got, cmd);
    }

    #[test]
    fn test_buttons_truncated_before_15() {
        let mut cmd = strafe(10);
        cmd.buttons = ButtonFlags::MOUSE.bits() | ButtonFlags::USE.bits();

        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            INPUT_8
                .write_usercmd(&mut msg, 0, &UserCmd::default(), &cmd)
                .unwrap();
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        let got = INPUT_8
            .read_usercmd(&mut msg, 0, &UserCmd::default())
            .unwrap();
        assert_eq!(got.button_flags(), ButtonFlags::USE);
    }

    #[test]
    fn test_eyes_read_write_eq() {
        let from = UserEyes::default();
        let to = UserEyes {
            ofs: [0, -4, 80],
            angles: [12.5, -90.0],
        };

        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            INPUT_17.write_eyes(&mut msg, &from, &to).unwrap();
            INPUT_17.write_eyes(&mut msg, &to, &to).unwrap();
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        let got = INPUT_17.read_eyes(&mut msg, &from).unwrap();
        assert_eq!(got, to);
        assert_eq!(INPUT_17.read_eyes(&mut msg, &got).unwrap(), to);
    }
}
