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

pub mod error;

use std::{cell::RefCell, collections::HashMap};

pub use self::error::{CvarError, CvarErrorKind};

use crate::common::info::InfoString;

/// A configuration variable.
struct Cvar {
    // Value of this variable
    val: String,

    // If true, this variable is sent to the server as part of the userinfo string
    userinfo: bool,

    // The default value of this variable
    default: String,
}

/// Stores client configuration.
///
/// Cvars flagged as userinfo are collected into the info string sent with the connect request;
/// changing one of them marks the userinfo as modified so the session can resend it.
pub struct CvarRegistry {
    cvars: RefCell<HashMap<String, Cvar>>,
    userinfo_modified: RefCell<bool>,
}

impl CvarRegistry {
    /// Construct a new empty `CvarRegistry`.
    pub fn new() -> CvarRegistry {
        CvarRegistry {
            cvars: RefCell::new(HashMap::new()),
            userinfo_modified: RefCell::new(false),
        }
    }

    fn register_impl<S>(&self, name: S, default: S, userinfo: bool) -> Result<(), CvarError>
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let default = default.as_ref();

        let mut cvars = self.cvars.borrow_mut();
        if cvars.contains_key(name) {
            return Err(CvarErrorKind::AlreadyRegistered {
                name: name.to_owned(),
            }
            .into());
        }

        cvars.insert(
            name.to_owned(),
            Cvar {
                val: default.to_owned(),
                userinfo,
                default: default.to_owned(),
            },
        );

        Ok(())
    }

    /// Register a new `Cvar` with the given name.
    pub fn register<S>(&self, name: S, default: S) -> Result<(), CvarError>
    where
        S: AsRef<str>,
    {
        self.register_impl(name, default, false)
    }

    /// Register a new userinfo `Cvar` with the given name.
    pub fn register_userinfo<S>(&self, name: S, default: S) -> Result<(), CvarError>
    where
        S: AsRef<str>,
    {
        self.register_impl(name, default, true)
    }

    pub fn get<S>(&self, name: S) -> Result<String, CvarError>
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        match self.cvars.borrow().get(name) {
            Some(cvar) => Ok(cvar.val.clone()),
            None => Err(CvarErrorKind::Unregistered {
                name: name.to_owned(),
            }
            .into()),
        }
    }

    pub fn get_value<S>(&self, name: S) -> Result<f32, CvarError>
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let mut cvars = self.cvars.borrow_mut();
        let cvar = cvars
            .get_mut(name)
            .ok_or_else(|| CvarErrorKind::Unregistered {
                name: name.to_owned(),
            })?;

        // try parsing as f32
        let val_string = cvar.val.clone();
        let val = match val_string.parse::<f32>() {
            Ok(v) => Ok(v),
            // if parse fails, reset to default value and try again
            Err(_) => {
                cvar.val = cvar.default.clone();
                cvar.val.parse::<f32>()
            }
        }
        .or(Err(CvarErrorKind::NotANumber {
            name: name.to_owned(),
            value: val_string.clone(),
        }))?;

        Ok(val)
    }

    pub fn set<S>(&self, name: S, value: S) -> Result<(), CvarError>
    where
        S: AsRef<str>,
    {
        trace!("cvar assignment: {} {}", name.as_ref(), value.as_ref());
        let mut cvars = self.cvars.borrow_mut();
        let cvar = cvars
            .get_mut(name.as_ref())
            .ok_or_else(|| CvarErrorKind::Unregistered {
                name: name.as_ref().to_owned(),
            })?;

        // these would break the info string framing or the connect command
        if cvar.userinfo && value.as_ref().contains(|c: char| c == '\\' || c == '"' || c == ';') {
            return Err(CvarErrorKind::InvalidUserinfo {
                name: name.as_ref().to_owned(),
                value: value.as_ref().to_owned(),
            }
            .into());
        }

        if cvar.val != value.as_ref() {
            cvar.val = value.as_ref().to_owned();
            if cvar.userinfo {
                *self.userinfo_modified.borrow_mut() = true;
            }
        }

        Ok(())
    }

    pub fn contains<S>(&self, name: S) -> bool
    where
        S: AsRef<str>,
    {
        self.cvars.borrow().contains_key(name.as_ref())
    }

    /// Build the userinfo string from all userinfo cvars, sorted by name.
    pub fn userinfo(&self) -> InfoString {
        let cvars = self.cvars.borrow();
        let mut names: Vec<&String> = cvars
            .iter()
            .filter(|(_, c)| c.userinfo)
            .map(|(n, _)| n)
            .collect();
        names.sort();

        let mut info = InfoString::new();
        for name in names {
            info.set(name, &cvars[name].val);
        }

        info
    }

    /// Returns true if a userinfo cvar changed since the last call, clearing the flag.
    pub fn take_userinfo_modified(&self) -> bool {
        self.userinfo_modified.replace(false)
    }
}
