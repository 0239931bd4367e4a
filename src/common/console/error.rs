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

//! Errors raised by the cvar registry.

use std::fmt::{self, Display};

use failure::{Backtrace, Context, Fail};

#[derive(Debug)]
pub struct CvarError {
    inner: Context<CvarErrorKind>,
}

impl CvarError {
    pub fn kind(&self) -> CvarErrorKind {
        self.inner.get_context().clone()
    }
}

impl From<CvarErrorKind> for CvarError {
    fn from(kind: CvarErrorKind) -> Self {
        CvarError {
            inner: Context::new(kind),
        }
    }
}

impl Fail for CvarError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for CvarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum CvarErrorKind {
    /// Neither the value nor the default of a cvar read as a number parses as one.
    #[fail(display = "Cvar {} is not a number (\"{}\")", name, value)]
    NotANumber { name: String, value: String },

    /// `register` was called twice for the same name.
    #[fail(display = "Cvar {} is already registered", name)]
    AlreadyRegistered { name: String },

    /// The cvar was never registered.
    #[fail(display = "Unknown cvar {}", name)]
    Unregistered { name: String },

    /// A userinfo value holds a character that would break the info string framing.
    #[fail(display = "Userinfo cvar {} cannot hold \"{}\"", name, value)]
    InvalidUserinfo { name: String, value: String },
}
