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

//! Connectionless packets exchanged before and outside of a netchan session.
//!
//! Every connectionless packet starts with `CONNECTIONLESS_MARKER` in place of a sequence
//! number and a byte giving its direction, followed by a line of command text.

use byteorder::{ByteOrder, LittleEndian};

use crate::common::{
    info::InfoString,
    net::{NetError, NetErrorKind, CONNECTIONLESS_MARKER},
    util,
};

/// Direction byte of packets sent by the server.
pub const DIRECTION_SERVER: u8 = 0x01;

/// Direction byte of packets sent by the client.
pub const DIRECTION_CLIENT: u8 = 0x02;

const HEADER_LEN: usize = 5;

/// Returns true if `packet` starts with the connectionless marker.
pub fn is_connectionless(packet: &[u8]) -> bool {
    packet.len() >= 4 && LittleEndian::read_u32(&packet[0..4]) == CONNECTIONLESS_MARKER
}

/// Split a connectionless packet into its direction byte and command text.
pub fn split_packet(packet: &[u8]) -> Result<(u8, String), NetError> {
    if !is_connectionless(packet) {
        return Err(NetErrorKind::BadHeader {
            message: "missing connectionless marker".to_owned(),
        }
        .into());
    }

    if packet.len() < HEADER_LEN {
        return Err(NetErrorKind::BadHeader {
            message: "missing direction byte".to_owned(),
        }
        .into());
    }

    let text = &packet[HEADER_LEN..];
    let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
    Ok((
        packet[4],
        String::from_utf8_lossy(&text[..end]).into_owned(),
    ))
}

fn check_direction(found: u8, expected: u8) -> Result<(), NetError> {
    if found != expected {
        return Err(NetErrorKind::BadHeader {
            message: format!("direction byte {:#04x}, expected {:#04x}", found, expected),
        }
        .into());
    }

    Ok(())
}

/// Everything after the first line of `text`.
fn after_first_line(text: &str) -> &str {
    match text.find('\n') {
        Some(i) => &text[i + 1..],
        None => "",
    }
}

pub trait ConnectPacket {
    /// Direction byte this packet is sent with.
    fn direction(&self) -> u8;

    /// The command text following the header.
    fn text(&self) -> String;

    /// Generates the byte representation of this packet for transmission.
    fn to_bytes(&self) -> Vec<u8> {
        let text = self.text();
        let mut packet = vec![0; HEADER_LEN];
        LittleEndian::write_u32(&mut packet[0..4], CONNECTIONLESS_MARKER);
        packet[4] = self.direction();
        packet.extend_from_slice(text.as_bytes());
        packet
    }
}

/// A request from a client to retrieve information from or connect to the server.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    GetChallenge,
    Connect { userinfo: InfoString },
    GetInfo,
    GetStatus,
}

impl Request {
    pub fn connect(userinfo: InfoString) -> Request {
        Request::Connect { userinfo }
    }

    pub fn from_bytes(packet: &[u8]) -> Result<Request, NetError> {
        let (direction, text) = split_packet(packet)?;
        check_direction(direction, DIRECTION_CLIENT)?;

        let args = util::tokenize(&text);
        let command = match args.first() {
            Some(c) => c.as_str(),
            None => return Err(NetError::invalid_data("empty connectionless request")),
        };

        match command {
            "getchallenge" => Ok(Request::GetChallenge),
            "connect" => Ok(Request::Connect {
                userinfo: InfoString::parse(args.get(1).map(|s| s.as_str()).unwrap_or("")),
            }),
            "getinfo" => Ok(Request::GetInfo),
            "getstatus" => Ok(Request::GetStatus),
            c => Err(NetError::invalid_data(format!("unknown request \"{}\"", c))),
        }
    }
}

impl ConnectPacket for Request {
    fn direction(&self) -> u8 {
        DIRECTION_CLIENT
    }

    fn text(&self) -> String {
        match *self {
            Request::GetChallenge => "getchallenge".to_owned(),
            Request::Connect { ref userinfo } => format!("connect \"{}\"", userinfo),
            Request::GetInfo => "getinfo".to_owned(),
            Request::GetStatus => "getstatus".to_owned(),
        }
    }
}

/// A player line of a status response.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusPlayer {
    pub score: i32,
    pub ping: i32,
    pub name: String,
}

/// A server's answer to a connectionless request.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Challenge { challenge: u32 },
    Connect,
    Print { message: String },
    DropError { message: String },
    Info { info: InfoString },
    Status {
        info: InfoString,
        players: Vec<StatusPlayer>,
    },
    Disconnect,
}

impl Response {
    pub fn from_bytes(packet: &[u8]) -> Result<Response, NetError> {
        let (direction, text) = split_packet(packet)?;
        check_direction(direction, DIRECTION_SERVER)?;

        let args = util::tokenize(&text);
        let command = match args.first() {
            Some(c) => c.to_owned(),
            None => return Err(NetError::invalid_data("empty connectionless response")),
        };

        let response = match command.as_str() {
            "challengeResponse" => {
                let challenge = args
                    .get(1)
                    .and_then(|c| c.parse::<i64>().ok())
                    .ok_or_else(|| NetError::invalid_data("challenge response without a number"))?;
                Response::Challenge {
                    challenge: challenge as u32,
                }
            }

            "connectResponse" => Response::Connect,

            "print" => Response::Print {
                message: after_first_line(&text).to_owned(),
            },

            "droperror" => Response::DropError {
                message: util::args_from(&text, 1),
            },

            "infoResponse" => Response::Info {
                info: InfoString::parse(after_first_line(&text).trim_end()),
            },

            "statusResponse" => {
                let mut lines = after_first_line(&text).lines();
                let info = InfoString::parse(lines.next().unwrap_or(""));
                let players = lines
                    .filter_map(|line| {
                        let args = util::tokenize(line);
                        Some(StatusPlayer {
                            score: args.get(0)?.parse().ok()?,
                            ping: args.get(1)?.parse().ok()?,
                            name: args.get(2).cloned().unwrap_or_default(),
                        })
                    })
                    .collect();
                Response::Status { info, players }
            }

            "disconnect" => Response::Disconnect,

            c => {
                return Err(NetError::invalid_data(format!(
                    "unknown response \"{}\"",
                    c
                )))
            }
        };

        Ok(response)
    }
}

impl ConnectPacket for Response {
    fn direction(&self) -> u8 {
        DIRECTION_SERVER
    }

    fn text(&self) -> String {
        match *self {
            Response::Challenge { challenge } => format!("challengeResponse {}", challenge),
            Response::Connect => "connectResponse".to_owned(),
            Response::Print { ref message } => format!("print\n{}", message),
            Response::DropError { ref message } => format!("droperror {}", message),
            Response::Info { ref info } => format!("infoResponse\n{}", info),
            Response::Status {
                ref info,
                ref players,
            } => {
                let mut text = format!("statusResponse\n{}\n", info);
                for p in players.iter() {
                    text.push_str(&format!("{} {} \"{}\"\n", p.score, p.ping, p.name));
                }
                text
            }
            Response::Disconnect => "disconnect".to_owned(),
        }
    }
}
