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

use crate::common::{console::CvarError, net::NetError};

use failure::{Backtrace, Context, Fail};

#[derive(Debug)]
pub struct ClientError {
    inner: Context<ClientErrorKind>,
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        self.inner.get_context().clone()
    }
}

impl From<ClientErrorKind> for ClientError {
    fn from(kind: ClientErrorKind) -> Self {
        ClientError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ClientErrorKind>> for ClientError {
    fn from(inner: Context<ClientErrorKind>) -> Self {
        ClientError { inner }
    }
}

impl From<NetError> for ClientError {
    fn from(error: NetError) -> Self {
        error.context(ClientErrorKind::Net).into()
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        error.context(ClientErrorKind::Io).into()
    }
}

impl From<CvarError> for ClientError {
    fn from(error: CvarError) -> Self {
        error.context(ClientErrorKind::Cvar).into()
    }
}

impl Fail for ClientError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ClientErrorKind {
    #[fail(display = "Network error")]
    Net,
    #[fail(display = "I/O error")]
    Io,
    #[fail(display = "Couldn't read cvar value")]
    Cvar,
    #[fail(display = "Server time went backward ({} -> {})", old, new)]
    ServerTimeBackward { old: i32, new: i32 },
    #[fail(display = "Connection rejected: \"{}\"", message)]
    ConnectionRejected { message: String },
    #[fail(display = "Server sent an inappropriate connect response")]
    InvalidConnectResponse,
    #[fail(display = "No response from server")]
    NoResponse,
    #[fail(display = "Disconnected: {}", reason)]
    Disconnected { reason: String },
    #[fail(display = "Not connected to a server")]
    NotConnected,
}
