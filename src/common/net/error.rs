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

use std::fmt::{self, Display};

use failure::{Backtrace, Context, Fail};

/// Which side of a stream ran out of room.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamDirection {
    Reading,
    Writing,
}

impl Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StreamDirection::Reading => write!(f, "reading"),
            StreamDirection::Writing => write!(f, "writing"),
        }
    }
}

#[derive(Debug)]
pub struct NetError {
    inner: Context<NetErrorKind>,
}

impl NetError {
    pub fn kind(&self) -> NetErrorKind {
        self.inner.get_context().clone()
    }

    /// Returns true if this error was caused by running off the end of a message.
    pub fn is_overflow(&self) -> bool {
        match *self.inner.get_context() {
            NetErrorKind::StreamOverflow { .. } => true,
            _ => false,
        }
    }

    pub fn invalid_data<S>(msg: S) -> NetError
    where
        S: AsRef<str>,
    {
        NetError::from(NetErrorKind::InvalidData {
            message: msg.as_ref().to_owned(),
        })
    }
}

impl From<NetErrorKind> for NetError {
    fn from(kind: NetErrorKind) -> Self {
        NetError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<NetErrorKind>> for NetError {
    fn from(inner: Context<NetErrorKind>) -> Self {
        NetError { inner }
    }
}

impl Fail for NetError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum NetErrorKind {
    #[fail(display = "Stream overflow while {}", direction)]
    StreamOverflow { direction: StreamDirection },
    #[fail(display = "Bad bit count for byte-aligned codec: {}", bits)]
    BadBits { bits: u32 },
    #[fail(display = "Illegal message opcode: {}", code)]
    BadOpcode { code: u8 },
    #[fail(display = "Bad packet header: {}", message)]
    BadHeader { message: String },
    #[fail(display = "Unsupported protocol version {}", version)]
    UnsupportedProtocol { version: u32 },
    #[fail(display = "Bad entity number {}", number)]
    BadEntityNumber { number: u32 },
    #[fail(display = "Invalid field count {} (max {})", count, max)]
    BadFieldCount { count: usize, max: usize },
    #[fail(display = "Config string index out of range: {}", index)]
    BadConfigString { index: usize },
    #[fail(display = "Game state exceeds {} characters", max)]
    GameStateOverflow { max: usize },
    #[fail(display = "Download block out of sequence: expected {}, got {}", expected, received)]
    DownloadBlock { expected: u16, received: u16 },
    #[fail(display = "String exceeds {} characters", max)]
    StringTooLong { max: usize },
    #[fail(display = "Invalid data: {}", message)]
    InvalidData { message: String },
}
