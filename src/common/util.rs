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

/// Read a null-terminated sequence of bytes and convert it into a `String`.
///
/// The zero byte is consumed. Returns `None` if the input ends before a zero byte is found.
pub fn read_cstring<R>(src: &mut R) -> std::io::Result<Option<String>>
where
    R: std::io::BufRead,
{
    let mut bytes: Vec<u8> = Vec::new();
    src.read_until(0, &mut bytes)?;
    match bytes.pop() {
        Some(0) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        _ => Ok(None),
    }
}

/// Split a command line into arguments.
///
/// Arguments are separated by whitespace. Double quotes group an argument containing spaces, and
/// `//` outside of quotes ends the line.
pub fn tokenize<S>(line: S) -> Vec<String>
where
    S: AsRef<str>,
{
    let mut args = Vec::new();
    let mut chars = line.as_ref().chars().peekable();

    loop {
        while let Some(c) = chars.peek() {
            if c.is_whitespace() || c.is_control() {
                chars.next();
            } else {
                break;
            }
        }

        let mut arg = String::new();
        match chars.peek() {
            None => break,
            Some(&'"') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '"' {
                        break;
                    }
                    arg.push(c);
                }

                args.push(arg);
                continue;
            }

            Some(_) => (),
        }

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c.is_control() {
                break;
            }

            if c == '/' {
                let mut ahead = chars.clone();
                ahead.next();
                if ahead.peek() == Some(&'/') {
                    if !arg.is_empty() {
                        args.push(arg);
                    }
                    return args;
                }
            }

            arg.push(c);
            chars.next();
        }

        args.push(arg);
    }

    args
}

/// Returns the remainder of `line` after skipping `n` arguments, preserving its spacing.
pub fn args_from<S>(line: S, n: usize) -> String
where
    S: AsRef<str>,
{
    let mut rest = line.as_ref().trim_start();
    for _ in 0..n {
        if rest.starts_with('"') {
            rest = match rest[1..].find('"') {
                Some(end) => &rest[end + 2..],
                None => "",
            };
        } else {
            rest = match rest.find(char::is_whitespace) {
                Some(end) => &rest[end..],
                None => "",
            };
        }

        rest = rest.trim_start();
    }

    rest.to_owned()
}
