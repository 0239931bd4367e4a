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

use crate::common::{
    info::InfoString,
    msg::Msg,
    net::{connect::StatusPlayer, gamestate::GameState, snapshot::Snapshot, NetError},
};

/// Receives the events a session decodes. Every method defaults to doing nothing.
pub trait ClientHandler {
    /// A new game state arrived. Config string notifications follow.
    fn on_gamestate(&mut self, _gamestate: &GameState) {}

    fn on_config_string_modified(&mut self, _index: usize, _value: &str) {}

    /// The server id changed: a new map was loaded.
    fn on_server_id_changed(&mut self, _old: u32, _new: u32) {}

    fn on_snapshot(&mut self, _snapshot: &Snapshot) {}

    /// The server count flag toggled: the map was restarted in place.
    fn on_server_restart(&mut self) {}

    /// A server command the session does not handle itself, split into arguments.
    fn on_server_command(&mut self, _args: &[String]) {}

    /// Console text pushed by the server with `stufftext`.
    fn on_stufftext(&mut self, _text: &str) {}

    fn on_print(&mut self, _text: &str) {}

    fn on_center_print(&mut self, _text: &str) {}

    fn on_location_print(&mut self, _x: i16, _y: i16, _text: &str) {}

    fn on_download_complete(&mut self, _name: &str, _data: &[u8]) {}

    fn on_download_failed(&mut self, _name: &str, _reason: &str) {}

    fn on_disconnect(&mut self, _reason: &str) {}

    fn on_info_response(&mut self, _info: &InfoString) {}

    fn on_status_response(&mut self, _info: &InfoString, _players: &[StatusPlayer]) {}

    /// Decode a game-specific message. Its layout is only known to the game module.
    fn parse_cgame_message(&mut self, _msg: &mut Msg) -> Result<(), NetError> {
        Err(NetError::invalid_data("game message with no handler"))
    }
}

/// A handler that ignores everything.
pub struct NullHandler;

impl ClientHandler for NullHandler {}
