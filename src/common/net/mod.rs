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

pub mod chan;
pub mod configstring;
pub mod connect;
pub mod encoding;
pub mod entity;
mod error;
pub mod field;
pub mod gamestate;
pub mod player;
pub mod protocol;
pub mod reliable;
pub mod snapshot;
pub mod usercmd;

pub use self::error::{NetError, NetErrorKind, StreamDirection};

/// Largest datagram the client will send or accept.
pub const MAX_PACKETLEN: usize = 1400;

/// Largest reassembled message.
pub const MAX_MSGLEN: usize = 49152;

/// Number of snapshots kept for delta decompression.
pub const PACKET_BACKUP: usize = 32;
pub const PACKET_MASK: usize = PACKET_BACKUP - 1;

/// Number of user commands kept for prediction and resending.
pub const CMD_BACKUP: usize = 128;
pub const CMD_MASK: usize = CMD_BACKUP - 1;

/// Default size of the reliable command rings.
pub const MAX_RELIABLE_COMMANDS: usize = 64;

/// Size of the ring holding entities referenced by snapshots.
pub const MAX_PARSE_ENTITIES: usize = 2048;

/// Maximum number of user commands in a single move message.
pub const MAX_PACKET_USERCMDS: usize = 32;

/// Maximum number of sound events carried by a single snapshot.
pub const MAX_SERVER_SOUNDS: usize = 64;

/// Sequence number marking a connectionless packet.
pub const CONNECTIONLESS_MARKER: u32 = 0xFFFF_FFFF;

pub const PORT_SERVER: u16 = 12203;

/// Server-to-client message operations.
#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum ServerOp {
    Bad = 0,
    Nop = 1,
    GameState = 2,
    ConfigString = 3,
    Baseline = 4,
    ServerCommand = 5,
    Download = 6,
    Snapshot = 7,
    CenterPrint = 8,
    LocPrint = 9,
    CgameMessage = 10,
    Eof = 11,
}

/// Client-to-server message operations.
#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum ClientOp {
    Bad = 0,
    Nop = 1,
    Move = 2,
    MoveNoDelta = 3,
    ClientCommand = 4,
    Eof = 5,
}

bitflags! {
    #[derive(Default)]
    pub struct SnapFlags: u8 {
        /// The server withheld this snapshot to respect the client's rate.
        const RATE_DELAYED = 1 << 0;
        const NOT_ACTIVE = 1 << 1;
        /// Toggled every time the server restarts the map.
        const SERVERCOUNT = 1 << 2;
    }
}

