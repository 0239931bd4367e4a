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

//! Channel obfuscation.
//!
//! In-band payloads are xor-ed with a running key seeded from the connection challenge and a
//! sequence number and perturbed by the characters of a reliable command both sides hold. The
//! transform is its own inverse. Protocols 15 and up additionally pass strings through a fixed
//! byte substitution table.

use crate::common::{
    msg::Msg,
    net::{
        protocol::{ProtocolRange, StringParsing, Versioned},
        NetError,
    },
};

/// First payload byte covered by the outgoing transform: server id, message acknowledge and
/// command acknowledge are sent in the clear.
pub const ENCODE_START: usize = 12;

/// Incoming payload bytes sent in the clear after the netchan header (the reliable acknowledge).
pub const DECODE_START: usize = 4;

#[rustfmt::skip]
static SCRAMBLE: [u8; 256] = [
    0x00, 0x2a, 0x8b, 0xec, 0x4e, 0xaf, 0x11, 0x72, 0xd3, 0x35, 0x96, 0xf7, 0x59, 0xba, 0x1c, 0x7d,
    0xde, 0x40, 0xa1, 0x03, 0x64, 0xc5, 0x27, 0x88, 0xe9, 0x4b, 0xac, 0x0e, 0x6f, 0xd0, 0x32, 0x93,
    0xf4, 0x56, 0xb7, 0x19, 0x7a, 0xdb, 0x3d, 0x9e, 0xff, 0x61, 0xc2, 0x24, 0x85, 0xe6, 0x48, 0xa9,
    0x0b, 0x6c, 0xcd, 0x2f, 0x90, 0xf1, 0x53, 0xb4, 0x16, 0x77, 0xd8, 0x3a, 0x9b, 0xfc, 0x5e, 0xbf,
    0x21, 0x82, 0xe3, 0x45, 0xa6, 0x08, 0x69, 0xca, 0x2c, 0x8d, 0xee, 0x50, 0xb1, 0x13, 0x74, 0xd5,
    0x37, 0x98, 0xf9, 0x5b, 0xbc, 0x1e, 0x7f, 0xe0, 0x42, 0xa3, 0x05, 0x66, 0xc7, 0x29, 0x8a, 0xeb,
    0x4d, 0xae, 0x10, 0x71, 0xd2, 0x34, 0x95, 0xf6, 0x58, 0xb9, 0x1b, 0x7c, 0xdd, 0x3f, 0xa0, 0x02,
    0x63, 0xc4, 0x26, 0x87, 0xe8, 0x4a, 0xab, 0x0d, 0x6e, 0xcf, 0x31, 0x92, 0xf3, 0x55, 0xb6, 0x18,
    0x79, 0xda, 0x3c, 0x9d, 0xfe, 0x60, 0xc1, 0x23, 0x84, 0xe5, 0x47, 0xa8, 0x0a, 0x6b, 0xcc, 0x2e,
    0x8f, 0xf0, 0x52, 0xb3, 0x15, 0x76, 0xd7, 0x39, 0x9a, 0xfb, 0x5d, 0xbe, 0x20, 0x81, 0xe2, 0x44,
    0xa5, 0x07, 0x68, 0xc9, 0x2b, 0x8c, 0xed, 0x4f, 0xb0, 0x12, 0x73, 0xd4, 0x36, 0x97, 0xf8, 0x5a,
    0xbb, 0x1d, 0x7e, 0xdf, 0x41, 0xa2, 0x04, 0x65, 0xc6, 0x28, 0x89, 0xea, 0x4c, 0xad, 0x0f, 0x70,
    0xd1, 0x33, 0x94, 0xf5, 0x57, 0xb8, 0x1a, 0x7b, 0xdc, 0x3e, 0x9f, 0x01, 0x62, 0xc3, 0x25, 0x86,
    0xe7, 0x49, 0xaa, 0x0c, 0x6d, 0xce, 0x30, 0x91, 0xf2, 0x54, 0xb5, 0x17, 0x78, 0xd9, 0x3b, 0x9c,
    0xfd, 0x5f, 0xc0, 0x22, 0x83, 0xe4, 0x46, 0xa7, 0x09, 0x6a, 0xcb, 0x2d, 0x8e, 0xef, 0x51, 0xb2,
    0x14, 0x75, 0xd6, 0x38, 0x99, 0xfa, 0x5c, 0xbd, 0x1f, 0x80, 0xe1, 0x43, 0xa4, 0x06, 0x67, 0xc8,
];

lazy_static! {
    static ref UNSCRAMBLE: [u8; 256] = {
        let mut inverse = [0u8; 256];
        for (plain, scrambled) in SCRAMBLE.iter().enumerate() {
            inverse[*scrambled as usize] = plain as u8;
        }
        inverse
    };
}

pub fn scramble_byte(b: u8) -> u8 {
    SCRAMBLE[b as usize]
}

pub fn unscramble_byte(b: u8) -> u8 {
    UNSCRAMBLE[b as usize]
}

/// Per-connection xor transform.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChannelEncoding {
    challenge: u32,
}

impl ChannelEncoding {
    pub fn new(challenge: u32) -> ChannelEncoding {
        ChannelEncoding { challenge }
    }

    pub fn challenge(&self) -> u32 {
        self.challenge
    }

    /// Transform a client-to-server payload in place from `first` to the end of `data`.
    ///
    /// `command` is the last server command the client received, which the server looks up by the
    /// command acknowledge in the packet header.
    pub fn apply_outgoing(
        &self,
        server_id: u32,
        message_ack: u32,
        command: &[u8],
        data: &mut [u8],
        first: usize,
    ) {
        apply(
            self.challenge ^ server_id ^ message_ack,
            command,
            data,
            first,
        );
    }

    /// Transform a server-to-client message in place from `first` to the end of `data`.
    ///
    /// `sequence` is the netchan sequence of the message and `command` is the client's reliable
    /// command at the acknowledge the server sent.
    pub fn apply_incoming(&self, sequence: u32, command: &[u8], data: &mut [u8], first: usize) {
        apply(self.challenge ^ sequence, command, data, first);
    }
}

fn apply(mut key: u32, command: &[u8], data: &mut [u8], first: usize) {
    let mut index = 0;
    for i in first..data.len() {
        // wrap around the command string
        if index >= command.len() || command[index] == 0 {
            index = 0;
        }

        let mut c = command.get(index).cloned().unwrap_or(0);
        if c > 127 || c == b'%' {
            c = b'.';
        }

        key ^= (c as u32) << (i & 1);
        data[i] ^= key as u8;
        index += 1;
    }
}

/// Plain strings, protocols 5-8.
pub struct String8 {
    pub range: ProtocolRange,
}

impl Versioned for String8 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl StringParsing for String8 {
    fn read_string(&self, msg: &mut Msg, max: usize) -> Result<String, NetError> {
        let raw = msg.read_raw_string(max)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    fn write_string(&self, msg: &mut Msg, s: &str, max: usize) -> Result<(), NetError> {
        msg.write_raw_string(s.as_bytes(), max)
    }
}

/// Scrambled strings, protocols 15-17.
pub struct String17 {
    pub range: ProtocolRange,
}

impl Versioned for String17 {
    fn range(&self) -> ProtocolRange {
        self.range
    }
}

impl StringParsing for String17 {
    fn read_string(&self, msg: &mut Msg, max: usize) -> Result<String, NetError> {
        let raw: Vec<u8> = msg
            .read_raw_string(max)?
            .into_iter()
            .map(unscramble_byte)
            .collect();
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    fn write_string(&self, msg: &mut Msg, s: &str, max: usize) -> Result<(), NetError> {
        let scrambled: Vec<u8> = s.bytes().map(scramble_byte).collect();
        msg.write_raw_string(&scrambled, max)
    }
}
