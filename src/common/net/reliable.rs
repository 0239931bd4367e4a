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

//! Reliable command channels.
//!
//! Commands travel as strings over the unreliable channel and are resent with every packet until
//! the remote side acknowledges them. Both rings are indexed by `sequence & (capacity - 1)`.

/// Outgoing client commands awaiting acknowledgement.
#[derive(Clone, Debug)]
pub struct ReliableSequence {
    commands: Vec<String>,
    sequence: u32,
    acknowledge: u32,
}

fn ring_capacity(capacity: usize) -> usize {
    let cap = capacity.max(1).next_power_of_two();
    if cap != capacity {
        warn!(
            "Reliable ring capacity {} is not a power of two, using {}",
            capacity, cap
        );
    }
    cap
}

impl ReliableSequence {
    pub fn new(capacity: usize) -> ReliableSequence {
        ReliableSequence {
            commands: vec![String::new(); ring_capacity(capacity)],
            sequence: 0,
            acknowledge: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.commands.len()
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn acknowledge(&self) -> u32 {
        self.acknowledge
    }

    fn mask(&self) -> u32 {
        self.commands.len() as u32 - 1
    }

    /// Queue a command for transmission.
    ///
    /// Returns false and drops the command if the ring holds `capacity` unacknowledged commands.
    pub fn add_command<S>(&mut self, cmd: S) -> bool
    where
        S: AsRef<str>,
    {
        if (self.sequence - self.acknowledge) as usize >= self.capacity() {
            warn!(
                "Reliable command overflow, dropping \"{}\" (sequence {}, acknowledge {})",
                cmd.as_ref(),
                self.sequence,
                self.acknowledge
            );
            return false;
        }

        self.sequence += 1;
        let slot = (self.sequence & self.mask()) as usize;
        self.commands[slot] = cmd.as_ref().to_owned();
        true
    }

    /// Record the remote acknowledge.
    ///
    /// A value beyond `sequence` is clamped to it. If the acknowledge has fallen so far behind that
    /// the ring wrapped over it, it snaps forward to `sequence`.
    pub fn update_acknowledge(&mut self, acknowledge: u32) {
        let mut acknowledge = acknowledge;
        if acknowledge > self.sequence {
            debug!(
                "Acknowledge {} exceeds sequence {}, clamping",
                acknowledge, self.sequence
            );
            acknowledge = self.sequence;
        }

        if (self.sequence - acknowledge) as usize > self.capacity() {
            warn!(
                "Acknowledge {} fell out of the command ring, resynchronizing to {}",
                acknowledge, self.sequence
            );
            acknowledge = self.sequence;
        }

        if acknowledge > self.acknowledge {
            self.acknowledge = acknowledge;
        }
    }

    /// Raw ring lookup, used for pending commands and as obfuscation key material.
    ///
    /// Only sequences within `capacity` of `sequence()` name the command sent with them;
    /// an older one returns whatever later command reused the slot. The session looks up
    /// the acknowledge the server sent, which `update_acknowledge` keeps in that window.
    pub fn command_at(&self, sequence: u32) -> &str {
        &self.commands[(sequence & self.mask()) as usize]
    }

    /// Commands not yet acknowledged, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = (u32, &str)> {
        (self.acknowledge + 1..=self.sequence).map(move |s| (s, self.command_at(s)))
    }

    /// Restart both counters at `sequence`, as when a new game state declares it.
    pub fn reset(&mut self, sequence: u32) {
        self.sequence = sequence;
        self.acknowledge = sequence;
        for cmd in self.commands.iter_mut() {
            cmd.clear();
        }
    }
}

/// Incoming server commands awaiting execution.
#[derive(Clone, Debug)]
pub struct CommandSequence {
    commands: Vec<String>,
    /// Sequence each slot was last stored with.
    stored: Vec<u32>,
    sequence: u32,
    executed: u32,
}

impl CommandSequence {
    pub fn new(capacity: usize) -> CommandSequence {
        CommandSequence {
            commands: vec![String::new(); ring_capacity(capacity)],
            stored: vec![0; ring_capacity(capacity)],
            sequence: 0,
            executed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.commands.len()
    }

    /// Highest sequence received.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Highest sequence handed out by `next_pending`.
    pub fn executed(&self) -> u32 {
        self.executed
    }

    fn mask(&self) -> u32 {
        self.commands.len() as u32 - 1
    }

    /// Store a received command. Duplicates and commands older than the newest are ignored.
    ///
    /// Sequences skipped by a jump are cleared and never executed.
    pub fn store<S>(&mut self, sequence: u32, cmd: S) -> bool
    where
        S: AsRef<str>,
    {
        if sequence <= self.sequence {
            return false;
        }

        if sequence > self.sequence + 1 {
            warn!(
                "Server commands {} through {} were never received",
                self.sequence + 1,
                sequence - 1
            );

            let skipped = (sequence - self.sequence - 1).min(self.capacity() as u32);
            for s in sequence - skipped..sequence {
                let slot = (s & self.mask()) as usize;
                self.commands[slot].clear();
                self.stored[slot] = 0;
            }
        }

        self.sequence = sequence;
        let slot = (sequence & self.mask()) as usize;
        self.commands[slot] = cmd.as_ref().to_owned();
        self.stored[slot] = sequence;
        true
    }

    /// Ring lookup for a sequence still held, i.e. one of the last `capacity` received.
    pub fn command_at(&self, sequence: u32) -> Option<&str> {
        if sequence > self.sequence || (self.sequence - sequence) as usize >= self.capacity() {
            return None;
        }

        let slot = (sequence & self.mask()) as usize;
        match self.stored[slot] == sequence {
            true => Some(&self.commands[slot]),
            false => None,
        }
    }

    /// Ring lookup without range checking, used as obfuscation key material.
    ///
    /// The caller must pass a sequence within `capacity` of `sequence()`, which the
    /// session guarantees by passing `sequence()` itself. Anything else yields whatever
    /// the slot holds from another lap of the ring.
    pub fn raw_command_at(&self, sequence: u32) -> &str {
        &self.commands[(sequence & self.mask()) as usize]
    }

    /// The next command to execute, in strict sequence order.
    pub fn next_pending(&mut self) -> Option<(u32, String)> {
        if self.executed >= self.sequence {
            return None;
        }

        if (self.sequence - self.executed) as usize > self.capacity() {
            let skip_to = self.sequence - self.capacity() as u32;
            warn!(
                "Server commands {} through {} were overwritten before execution",
                self.executed + 1,
                skip_to
            );
            self.executed = skip_to;
        }

        while self.executed < self.sequence {
            self.executed += 1;
            let slot = (self.executed & self.mask()) as usize;
            if self.stored[slot] == self.executed {
                return Some((self.executed, self.commands[slot].clone()));
            }
        }

        None
    }

    /// Restart at `sequence` with nothing pending.
    pub fn reset(&mut self, sequence: u32) {
        self.sequence = sequence;
        self.executed = sequence;
    }
}
