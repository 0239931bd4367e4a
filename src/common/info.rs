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

//! Backslash-delimited key/value strings.
//!
//! Server and system info config strings, as well as the client's userinfo, are encoded as
//! `\key1\value1\key2\value2`.

use std::fmt::{self, Display};

pub const MAX_INFO_STRING: usize = 1024;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InfoString {
    pairs: Vec<(String, String)>,
}

impl InfoString {
    pub fn new() -> InfoString {
        InfoString::default()
    }

    /// Parse an info string. Malformed trailing keys without values are dropped.
    pub fn parse<S>(src: S) -> InfoString
    where
        S: AsRef<str>,
    {
        let src = src.as_ref();
        let src = if src.starts_with('\\') { &src[1..] } else { src };

        let mut pairs = Vec::new();
        let mut parts = src.split('\\');
        while let (Some(k), Some(v)) = (parts.next(), parts.next()) {
            pairs.push((k.to_owned(), v.to_owned()));
        }

        InfoString { pairs }
    }

    pub fn get<S>(&self, key: S) -> Option<&str>
    where
        S: AsRef<str>,
    {
        let key = key.as_ref();
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set `key` to `value`, replacing any existing entry. An empty value removes the key.
    ///
    /// Keys and values may not contain backslashes, quotes or semicolons; such characters are
    /// stripped.
    pub fn set<S, T>(&mut self, key: S, value: T)
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let clean = |s: &str| -> String {
            s.chars()
                .filter(|c| !matches!(c, '\\' | '"' | ';'))
                .collect()
        };

        let key = clean(key.as_ref());
        let value = clean(value.as_ref());
        self.remove(&key);
        if !value.is_empty() {
            self.pairs.push((key, value));
        }
    }

    pub fn remove<S>(&mut self, key: S)
    where
        S: AsRef<str>,
    {
        let key = key.as_ref();
        self.pairs.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Display for InfoString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (k, v) in self.pairs.iter() {
            write!(f, "\\{}\\{}", k, v)?;
        }

        Ok(())
    }
}

/// Look up a single key without building an `InfoString`.
pub fn value_for_key<'a>(src: &'a str, key: &str) -> Option<&'a str> {
    let src = if src.starts_with('\\') { &src[1..] } else { src };
    let mut parts = src.split('\\');
    while let (Some(k), Some(v)) = (parts.next(), parts.next()) {
        if k.eq_ignore_ascii_case(key) {
            return Some(v);
        }
    }

    None
}
