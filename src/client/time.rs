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

//! Reconciles the local clock with server time.
//!
//! The client renders slightly behind the latest snapshot. `server_time_delta` tracks the
//! offset between the local real time and server time; it is reset on large jumps,
//! averaged on moderate ones and otherwise drifts by a millisecond per snapshot, backing
//! off whenever the client had to extrapolate past the newest snapshot.

use chrono::Duration;

use crate::client::error::{ClientError, ClientErrorKind};

/// A delta error beyond this many milliseconds resets the clock.
const RESET_TIME: i32 = 500;

/// A delta error beyond this many milliseconds is averaged in.
const FAST_ADJUST_TIME: i32 = 100;

#[derive(Clone, Debug, Default)]
pub struct ClientTime {
    real_time: i32,
    server_time: i32,
    old_server_time: i32,
    server_time_delta: i32,
    old_frame_server_time: i32,
    extrapolated_snapshot: bool,
}

fn millis(d: Duration) -> i32 {
    d.num_milliseconds() as i32
}

impl ClientTime {
    pub fn new() -> ClientTime {
        ClientTime::default()
    }

    /// Estimated server time the client is currently displaying, in milliseconds.
    pub fn server_time(&self) -> i32 {
        self.server_time
    }

    pub fn server_time_delta(&self) -> i32 {
        self.server_time_delta
    }

    pub fn extrapolated(&self) -> bool {
        self.extrapolated_snapshot
    }

    /// Synchronize to the first snapshot after a game state.
    pub fn first_snapshot(&mut self, real_time: Duration, snap_server_time: i32) {
        self.real_time = millis(real_time);
        self.server_time_delta = snap_server_time - self.real_time;
        self.old_server_time = snap_server_time;
        self.server_time = snap_server_time;
        self.old_frame_server_time = snap_server_time;
        self.extrapolated_snapshot = false;
    }

    /// Advance the clock to `real_time` given the latest snapshot's server time.
    ///
    /// Fails if the snapshot is older than the one seen on the previous frame.
    pub fn advance(
        &mut self,
        real_time: Duration,
        snap_server_time: i32,
        new_snapshot: bool,
        time_nudge: i32,
    ) -> Result<(), ClientError> {
        self.real_time = millis(real_time);

        if snap_server_time < self.old_frame_server_time {
            return Err(ClientErrorKind::ServerTimeBackward {
                old: self.old_frame_server_time,
                new: snap_server_time,
            }
            .into());
        }
        self.old_frame_server_time = snap_server_time;

        self.server_time = self.real_time + self.server_time_delta - time_nudge;

        // never go backward, even if the delta shrank
        if self.server_time < self.old_server_time {
            self.server_time = self.old_server_time;
        }
        self.old_server_time = self.server_time;

        if self.real_time + self.server_time_delta >= snap_server_time - 5 {
            self.extrapolated_snapshot = true;
        }

        if new_snapshot {
            self.adjust_delta(snap_server_time);
        }

        Ok(())
    }

    fn adjust_delta(&mut self, snap_server_time: i32) {
        let new_delta = snap_server_time - self.real_time;
        let delta_delta = (new_delta - self.server_time_delta).abs();

        if delta_delta > RESET_TIME {
            debug!("Time delta reset ({} ms off)", delta_delta);
            self.server_time_delta = new_delta;
            self.old_server_time = snap_server_time;
            self.server_time = snap_server_time;
        } else if delta_delta > FAST_ADJUST_TIME {
            debug!("Time delta fast adjust ({} ms off)", delta_delta);
            self.server_time_delta = (self.server_time_delta + new_delta) >> 1;
        } else if self.extrapolated_snapshot {
            self.extrapolated_snapshot = false;
            self.server_time_delta -= 2;
        } else {
            self.server_time_delta += 1;
        }

        trace!("server time delta: {}", self.server_time_delta);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    #[test]
    fn test_first_snapshot() {
        let mut time = ClientTime::new();
        time.first_snapshot(ms(1000), 50000);
        assert_eq!(time.server_time(), 50000);
        assert_eq!(time.server_time_delta(), 49000);
    }

    #[test]
    fn test_slow_drift() {
        let mut time = ClientTime::new();
        time.first_snapshot(ms(1000), 50000);

        // snapshot well ahead of the display time: drift forward
        time.advance(ms(1010), 50100, true, 0).unwrap();
        assert_eq!(time.server_time(), 50010);
        assert!(!time.extrapolated());
        assert_eq!(time.server_time_delta(), 49001);
    }

    #[test]
    fn test_extrapolation_backs_off() {
        let mut time = ClientTime::new();
        time.first_snapshot(ms(1000), 50000);

        // displaying past the newest snapshot
        time.advance(ms(1050), 50040, true, 0).unwrap();
        assert_eq!(time.server_time_delta(), 48998);
        assert!(!time.extrapolated());
    }

    #[test]
    fn test_fast_adjust_and_reset() {
        let mut time = ClientTime::new();
        time.first_snapshot(ms(1000), 50000);

        // 200 ms off: average
        time.advance(ms(1000), 50200, true, 0).unwrap();
        assert_eq!(time.server_time_delta(), 49100);

        // 1000 ms off: reset
        time.advance(ms(1000), 51300, true, 0).unwrap();
        assert_eq!(time.server_time_delta(), 50300);
        assert_eq!(time.server_time(), 51300);
    }

    #[test]
    fn test_server_time_never_decreases() {
        let mut time = ClientTime::new();
        time.first_snapshot(ms(1000), 50000);
        time.advance(ms(1100), 50200, false, 0).unwrap();
        let t = time.server_time();

        time.advance(ms(1100), 50200, false, 30).unwrap();
        assert_eq!(time.server_time(), t);
    }

    #[test]
    fn test_server_time_backward() {
        let mut time = ClientTime::new();
        time.first_snapshot(ms(1000), 50000);
        time.advance(ms(1050), 50050, true, 0).unwrap();

        let err = time.advance(ms(1100), 50000, true, 0).unwrap_err();
        assert_eq!(
            err.kind(),
            ClientErrorKind::ServerTimeBackward {
                old: 50050,
                new: 50000
            }
        );
    }
}
