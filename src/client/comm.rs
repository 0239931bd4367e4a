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

use std::{
    cell::RefCell,
    collections::VecDeque,
    io::{self, ErrorKind},
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    rc::Rc,
};

use chrono::Duration;

use crate::common::net::MAX_MSGLEN;

/// Datagram transport between the client and one server.
pub trait Communicator {
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Receive one datagram if one is waiting.
    fn receive(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Block for at most `timeout` until a datagram is available. Returns whether one is.
    fn wait(&mut self, timeout: Duration) -> io::Result<bool>;
}

/// A UDP socket talking to a single remote address.
pub struct UdpCommunicator {
    socket: UdpSocket,
    remote: SocketAddr,
    recv_buf: Vec<u8>,
}

impl UdpCommunicator {
    pub fn connect<A>(local: A, remote: SocketAddr) -> io::Result<UdpCommunicator>
    where
        A: ToSocketAddrs,
    {
        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(UdpCommunicator {
            socket,
            remote,
            recv_buf: vec![0; MAX_MSGLEN],
        })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }
}

impl Communicator for UdpCommunicator {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.socket.send_to(data, self.remote)?;
        Ok(())
    }

    fn receive(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            let (len, src_addr) = match self.socket.recv_from(&mut self.recv_buf) {
                Ok(x) => x,
                Err(e) => match e.kind() {
                    // expected in nonblocking mode
                    ErrorKind::WouldBlock | ErrorKind::TimedOut => return Ok(None),
                    _ => return Err(e),
                },
            };

            if src_addr != self.remote {
                debug!(
                    "forged packet (src_addr was {}, should be {})",
                    src_addr, self.remote
                );
                continue;
            }

            return Ok(Some(self.recv_buf[..len].to_vec()));
        }
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<bool> {
        let timeout = match timeout.to_std() {
            Ok(t) if t.as_millis() > 0 => t,
            // negative or zero: just poll
            _ => {
                let mut peek = [0u8; 1];
                return match self.socket.peek_from(&mut peek) {
                    Ok(_) => Ok(true),
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
                    Err(e) => Err(e),
                };
            }
        };

        self.socket.set_nonblocking(false)?;
        self.socket.set_read_timeout(Some(timeout))?;

        let mut peek = [0u8; 1];
        let result = match self.socket.peek_from(&mut peek) {
            Ok(_) => Ok(true),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Ok(false)
            }
            // a datagram larger than the peek buffer still counts as available
            Err(ref e) if e.kind() == ErrorKind::InvalidData => Ok(true),
            Err(e) => Err(e),
        };

        self.socket.set_read_timeout(None)?;
        self.socket.set_nonblocking(true)?;
        result
    }
}

type Queue = Rc<RefCell<VecDeque<Vec<u8>>>>;

/// One end of an in-memory datagram pipe.
pub struct Loopback {
    incoming: Queue,
    outgoing: Queue,
}

impl Loopback {
    pub fn pair() -> (Loopback, Loopback) {
        let a: Queue = Rc::new(RefCell::new(VecDeque::new()));
        let b: Queue = Rc::new(RefCell::new(VecDeque::new()));
        (
            Loopback {
                incoming: a.clone(),
                outgoing: b.clone(),
            },
            Loopback {
                incoming: b,
                outgoing: a,
            },
        )
    }

    pub fn pending(&self) -> usize {
        self.incoming.borrow().len()
    }
}

impl Communicator for Loopback {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.outgoing.borrow_mut().push_back(data.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.incoming.borrow_mut().pop_front())
    }

    fn wait(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.incoming.borrow().is_empty())
    }
}
