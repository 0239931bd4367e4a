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

use byteorder::{ByteOrder, LittleEndian};

use crate::common::net::{NetError, NetErrorKind, MAX_MSGLEN, MAX_PACKETLEN};

/// Largest payload carried by one fragment.
pub const FRAGMENT_SIZE: usize = MAX_PACKETLEN - 100;

/// Set in the sequence number of fragmented messages.
pub const FRAGMENT_BIT: u32 = 1 << 31;

/// Length of the sequence header on reassembled messages.
pub const SEQUENCE_LEN: usize = 4;

/// Which end of the connection a channel belongs to. Clients send their qport, servers
/// expect it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetSide {
    Client,
    Server,
}

/// Sequencing and fragmentation for in-band messages.
pub struct Netchan {
    side: NetSide,
    qport: u16,

    outgoing_sequence: u32,
    incoming_sequence: u32,
    dropped: u32,
    stale: u32,

    fragment_sequence: u32,
    fragment_buffer: Vec<u8>,
}

impl Netchan {
    pub fn new(side: NetSide, qport: u16) -> Netchan {
        Netchan {
            side,
            qport,
            outgoing_sequence: 1,
            incoming_sequence: 0,
            dropped: 0,
            stale: 0,
            fragment_sequence: 0,
            fragment_buffer: Vec::new(),
        }
    }

    pub fn side(&self) -> NetSide {
        self.side
    }

    pub fn qport(&self) -> u16 {
        self.qport
    }

    /// Sequence number the next transmitted message will carry.
    pub fn outgoing_sequence(&self) -> u32 {
        self.outgoing_sequence
    }

    /// Sequence number of the last accepted message.
    pub fn incoming_sequence(&self) -> u32 {
        self.incoming_sequence
    }

    /// Number of messages skipped by the last accepted message.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Total number of duplicate or out-of-order datagrams discarded.
    pub fn stale(&self) -> u32 {
        self.stale
    }

    fn header(&self, sequence: u32) -> Vec<u8> {
        let mut header = vec![0; 6];
        LittleEndian::write_u32(&mut header[0..4], sequence);
        match self.side {
            NetSide::Client => LittleEndian::write_u16(&mut header[4..6], self.qport),
            NetSide::Server => header.truncate(4),
        }

        header
    }

    /// Wrap `data` in one or more datagrams and advance the outgoing sequence.
    pub fn transmit(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, NetError> {
        if data.len() > MAX_MSGLEN {
            return Err(NetError::invalid_data(format!(
                "message of {} bytes exceeds {}",
                data.len(),
                MAX_MSGLEN
            )));
        }

        let sequence = self.outgoing_sequence;
        self.outgoing_sequence = self.outgoing_sequence.wrapping_add(1);

        if data.len() < FRAGMENT_SIZE {
            let mut packet = self.header(sequence);
            packet.extend_from_slice(data);
            return Ok(vec![packet]);
        }

        // a message that is an exact multiple of the fragment size ends with an empty fragment
        let mut packets = Vec::new();
        let mut start = 0;
        loop {
            let len = (data.len() - start).min(FRAGMENT_SIZE);
            let mut packet = self.header(sequence | FRAGMENT_BIT);
            let mut lens = [0; 4];
            LittleEndian::write_u16(&mut lens[0..2], start as u16);
            LittleEndian::write_u16(&mut lens[2..4], len as u16);
            packet.extend_from_slice(&lens);
            packet.extend_from_slice(&data[start..start + len]);
            packets.push(packet);

            start += len;
            if len < FRAGMENT_SIZE {
                break;
            }
        }

        debug!("Message {} sent in {} fragments", sequence, packets.len());
        Ok(packets)
    }

    /// Accept a datagram. Returns the complete message, prefixed with its sequence number,
    /// once all of it has arrived. Stale and incomplete datagrams yield `None`.
    pub fn process(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>, NetError> {
        let header_len = match self.side {
            NetSide::Client => 4,
            NetSide::Server => 6,
        };

        if packet.len() < header_len {
            return Err(NetErrorKind::BadHeader {
                message: format!("{} byte datagram", packet.len()),
            }
            .into());
        }

        let raw_sequence = LittleEndian::read_u32(&packet[0..4]);
        let fragmented = raw_sequence & FRAGMENT_BIT != 0;
        let sequence = raw_sequence & !FRAGMENT_BIT;

        if self.side == NetSide::Server {
            let qport = LittleEndian::read_u16(&packet[4..6]);
            if qport != self.qport {
                debug!("Datagram for qport {} on channel {}", qport, self.qport);
                return Ok(None);
            }
        }

        let mut payload = &packet[header_len..];
        let mut fragment = None;
        if fragmented {
            if payload.len() < 4 {
                return Err(NetErrorKind::BadHeader {
                    message: "truncated fragment header".to_owned(),
                }
                .into());
            }

            let start = LittleEndian::read_u16(&payload[0..2]) as usize;
            let len = LittleEndian::read_u16(&payload[2..4]) as usize;
            payload = &payload[4..];
            if len != payload.len() {
                return Err(NetErrorKind::BadHeader {
                    message: format!("fragment length {} but {} bytes", len, payload.len()),
                }
                .into());
            }

            fragment = Some(start);
        }

        if (sequence.wrapping_sub(self.incoming_sequence) as i32) <= 0 {
            debug!(
                "Out of order datagram {} (last {})",
                sequence, self.incoming_sequence
            );
            self.stale += 1;
            return Ok(None);
        }

        self.dropped = sequence.wrapping_sub(self.incoming_sequence) - 1;
        if self.dropped > 0 {
            debug!(
                "Dropped {} datagram(s) before {}",
                self.dropped, sequence
            );
        }

        let message = match fragment {
            None => payload.to_vec(),
            Some(start) => {
                if sequence != self.fragment_sequence {
                    self.fragment_sequence = sequence;
                    self.fragment_buffer.clear();
                }

                if start != self.fragment_buffer.len() {
                    debug!(
                        "Lost a fragment of message {} (expected offset {}, got {})",
                        sequence,
                        self.fragment_buffer.len(),
                        start
                    );
                    return Ok(None);
                }

                if self.fragment_buffer.len() + payload.len() > MAX_MSGLEN {
                    self.fragment_buffer.clear();
                    return Err(NetError::invalid_data(format!(
                        "reassembled message exceeds {} bytes",
                        MAX_MSGLEN
                    )));
                }

                self.fragment_buffer.extend_from_slice(payload);
                if payload.len() == FRAGMENT_SIZE {
                    return Ok(None);
                }

                std::mem::replace(&mut self.fragment_buffer, Vec::new())
            }
        };

        self.incoming_sequence = sequence;

        let mut out = vec![0; SEQUENCE_LEN];
        LittleEndian::write_u32(&mut out[0..4], sequence);
        out.extend_from_slice(&message);
        Ok(Some(out))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pair() -> (Netchan, Netchan) {
        (
            Netchan::new(NetSide::Client, 27960),
            Netchan::new(NetSide::Server, 27960),
        )
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_netchan_short_message() {
        let (mut client, mut server) = pair();
        let data = b"hello".to_vec();

        let packets = client.transmit(&data).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 6 + data.len());

        let msg = server.process(&packets[0]).unwrap().unwrap();
        assert_eq!(LittleEndian::read_u32(&msg[0..4]), 1);
        assert_eq!(&msg[SEQUENCE_LEN..], &data[..]);
        assert_eq!(server.incoming_sequence(), 1);

        // replies carry no qport
        let packets = server.transmit(b"ok").unwrap();
        assert_eq!(packets[0].len(), 4 + 2);
        let msg = client.process(&packets[0]).unwrap().unwrap();
        assert_eq!(&msg[SEQUENCE_LEN..], b"ok");
    }

    #[test]
    fn test_netchan_fragments() {
        let (mut client, mut server) = pair();
        let data = payload(3000);

        let packets = server.transmit(&data).unwrap();
        assert_eq!(packets.len(), 3);

        assert!(client.process(&packets[0]).unwrap().is_none());
        assert!(client.process(&packets[1]).unwrap().is_none());
        let msg = client.process(&packets[2]).unwrap().unwrap();
        assert_eq!(&msg[SEQUENCE_LEN..], &data[..]);
        assert_eq!(client.incoming_sequence(), 1);
    }

    #[test]
    fn test_netchan_fragment_exact_multiple() {
        let (mut client, mut server) = pair();
        let data = payload(FRAGMENT_SIZE * 2);

        let packets = server.transmit(&data).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[2].len(), 4 + 4);

        let mut msg = None;
        for p in packets.iter() {
            msg = client.process(p).unwrap();
        }
        assert_eq!(&msg.unwrap()[SEQUENCE_LEN..], &data[..]);
    }

    #[test]
    fn test_netchan_lost_fragment() {
        let (mut client, mut server) = pair();
        let packets = server.transmit(&payload(3000)).unwrap();

        assert!(client.process(&packets[0]).unwrap().is_none());
        assert!(client.process(&packets[2]).unwrap().is_none());
        assert_eq!(client.incoming_sequence(), 0);

        // the next message still gets through
        let packets = server.transmit(b"next").unwrap();
        let msg = client.process(&packets[0]).unwrap().unwrap();
        assert_eq!(&msg[SEQUENCE_LEN..], b"next");
        assert_eq!(client.dropped(), 1);
    }

    #[test]
    fn test_netchan_duplicates_and_gaps() {
        let (mut client, mut server) = pair();

        let first = client.transmit(b"1").unwrap();
        let _lost = client.transmit(b"2").unwrap();
        let third = client.transmit(b"3").unwrap();

        assert!(server.process(&first[0]).unwrap().is_some());
        assert!(server.process(&first[0]).unwrap().is_none());
        assert_eq!(server.stale(), 1);

        assert!(server.process(&third[0]).unwrap().is_some());
        assert_eq!(server.dropped(), 1);
        assert!(server.process(&first[0]).unwrap().is_none());
        assert_eq!(server.stale(), 2);
    }

    #[test]
    fn test_netchan_wrong_qport() {
        let mut client = Netchan::new(NetSide::Client, 1);
        let mut server = Netchan::new(NetSide::Server, 2);
        let packets = client.transmit(b"x").unwrap();
        assert!(server.process(&packets[0]).unwrap().is_none());
    }

    #[test]
    fn test_netchan_short_datagram() {
        let (_, mut server) = pair();
        assert!(server.process(&[1, 0, 0]).is_err());
    }
}
