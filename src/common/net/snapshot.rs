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

//! Snapshot history and packet entity delta decoding.
//!
//! Every `svc_snapshot` is stored in a ring of `PACKET_BACKUP` slots keyed by the message
//! sequence it arrived in. Entity states live in a separate ring of `MAX_PARSE_ENTITIES`
//! entries; a snapshot records where its entities start and how many it has. A snapshot
//! whose delta source is missing is still parsed, to keep the message aligned, but is
//! stored as invalid.

use crate::common::{
    msg::Msg,
    net::{
        entity::{EntityState, SoundEvent},
        gamestate::GameState,
        player::PlayerState,
        protocol::Protocol,
        NetError, NetErrorKind, SnapFlags, MAX_PARSE_ENTITIES, MAX_SERVER_SOUNDS, PACKET_BACKUP,
        PACKET_MASK,
    },
};

pub const MAX_MAP_AREA_BYTES: usize = 32;

const SOUND_COUNT_BITS: i32 = 7;

/// Deltas from a source whose entities are this close to being overwritten are refused.
const PARSE_ENTITIES_MARGIN: usize = 128;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SnapshotState {
    /// No valid snapshot since the last game state.
    Inactive,
    Active,
    /// The latest snapshot toggled the server count flag: the map was restarted.
    Restarted,
}

/// The contents of one server frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub server_time: i32,
    pub snap_flags: SnapFlags,
    pub areamask: Vec<u8>,
    pub ps: PlayerState,
    /// Sorted by entity number.
    pub entities: Vec<EntityState>,
    pub sounds: Vec<SoundEvent>,
}

/// A snapshot as stored in the history ring.
#[derive(Clone, Debug, Default)]
pub struct RawSnapshot {
    pub valid: bool,
    pub snap_flags: SnapFlags,
    pub server_time: i32,
    pub message_num: u32,
    /// Message the snapshot was delta compressed from, if any.
    pub delta_num: Option<u32>,
    pub ping: i32,
    pub areamask: Vec<u8>,
    pub ps: PlayerState,
    pub num_entities: usize,
    pub parse_entities_num: usize,
    pub server_command_num: u32,
    pub sounds: Vec<SoundEvent>,
}

/// A snapshot with its entities resolved out of the ring.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub message_num: u32,
    pub delta_num: Option<u32>,
    pub ping: i32,
    pub server_command_num: u32,
    pub frame: Frame,
}

pub struct SnapshotManager {
    state: SnapshotState,
    current: RawSnapshot,
    snapshots: Vec<RawSnapshot>,
    parse_entities: Vec<EntityState>,
    parse_entities_num: usize,
}

impl SnapshotManager {
    pub fn new() -> SnapshotManager {
        SnapshotManager {
            state: SnapshotState::Inactive,
            current: RawSnapshot::default(),
            snapshots: vec![RawSnapshot::default(); PACKET_BACKUP],
            parse_entities: vec![EntityState::default(); MAX_PARSE_ENTITIES],
            parse_entities_num: 0,
        }
    }

    /// Forget all history, as on a new game state.
    pub fn reset(&mut self) {
        debug!("Snapshot history cleared");
        *self = SnapshotManager::new();
    }

    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// The most recent valid snapshot.
    pub fn current(&self) -> Option<&RawSnapshot> {
        match self.state {
            SnapshotState::Inactive => None,
            _ => Some(&self.current),
        }
    }

    pub fn current_number(&self) -> u32 {
        self.current.message_num
    }

    pub fn parse_entities_num(&self) -> usize {
        self.parse_entities_num
    }

    /// Record the round trip time measured for the current snapshot.
    pub fn set_ping(&mut self, ping: i32) {
        self.current.ping = ping;
        let slot = self.current.message_num as usize & PACKET_MASK;
        if self.snapshots[slot].message_num == self.current.message_num {
            self.snapshots[slot].ping = ping;
        }
    }

    fn delta_source(&self, delta_num: u32) -> Result<&RawSnapshot, &'static str> {
        let old = &self.snapshots[delta_num as usize & PACKET_MASK];
        if !old.valid {
            Err("delta from invalid frame")
        } else if old.message_num != delta_num {
            Err("delta frame too old")
        } else if self.parse_entities_num - old.parse_entities_num
            > MAX_PARSE_ENTITIES - PARSE_ENTITIES_MARGIN
        {
            Err("delta parse entities too old")
        } else {
            Ok(old)
        }
    }

    /// Parse the body of a snapshot message received in packet `message_num`.
    ///
    /// Returns whether the snapshot was valid. Invalid snapshots are consumed from the
    /// message but leave the history untouched.
    pub fn parse_snapshot(
        &mut self,
        msg: &mut Msg,
        protocol: &Protocol,
        gamestate: &GameState,
        message_num: u32,
        server_command_num: u32,
    ) -> Result<bool, NetError> {
        let mut snap = RawSnapshot {
            server_command_num,
            message_num,
            ..Default::default()
        };

        snap.server_time = msg.read_long()?;
        snap.delta_num = match msg.read_byte()? {
            0 => None,
            n => Some(message_num.wrapping_sub(n as u32)),
        };
        snap.snap_flags = SnapFlags::from_bits_truncate(msg.read_byte()?);

        let old = match snap.delta_num {
            None => {
                snap.valid = true;
                None
            }
            Some(n) => {
                match self.delta_source(n) {
                    Ok(_) => snap.valid = true,
                    Err(why) => warn!("Snapshot {}: {} ({})", message_num, why, n),
                }
                Some(self.snapshots[n as usize & PACKET_MASK].clone())
            }
        };

        let len = msg.read_byte()? as usize;
        if len > MAX_MAP_AREA_BYTES {
            return Err(NetErrorKind::BadFieldCount {
                count: len,
                max: MAX_MAP_AREA_BYTES,
            }
            .into());
        }
        snap.areamask = msg.read_data(len)?;

        snap.ps = protocol
            .player
            .read_delta_player(msg, old.as_ref().map(|o| &o.ps))?;
        self.parse_packet_entities(msg, protocol, gamestate, old.as_ref(), &mut snap)?;
        snap.sounds = read_sounds(msg, protocol)?;

        if !snap.valid {
            return Ok(false);
        }

        self.invalidate_gap(snap.message_num);

        self.state = match self.state {
            SnapshotState::Inactive => SnapshotState::Active,
            _ if (snap.snap_flags ^ self.current.snap_flags).contains(SnapFlags::SERVERCOUNT) => {
                debug!("Server count toggled at snapshot {}", snap.message_num);
                SnapshotState::Restarted
            }
            _ => SnapshotState::Active,
        };

        trace!(
            "snapshot {}: time {} delta {:?} {} entities",
            snap.message_num,
            snap.server_time,
            snap.delta_num,
            snap.num_entities
        );

        self.snapshots[snap.message_num as usize & PACKET_MASK] = snap.clone();
        self.current = snap;
        Ok(true)
    }

    /// Clear the slots of messages skipped between the current snapshot and `message_num`.
    fn invalidate_gap(&mut self, message_num: u32) {
        let mut old = self.current.message_num.wrapping_add(1);
        if message_num.wrapping_sub(old) as i32 >= PACKET_BACKUP as i32 {
            old = message_num.wrapping_sub(PACKET_BACKUP as u32 - 1);
        }

        while (message_num.wrapping_sub(old) as i32) > 0 {
            self.snapshots[old as usize & PACKET_MASK].valid = false;
            old = old.wrapping_add(1);
        }
    }

    fn push_entity(&mut self, snap: &mut RawSnapshot, state: EntityState) {
        self.parse_entities[self.parse_entities_num & (MAX_PARSE_ENTITIES - 1)] = state;
        self.parse_entities_num += 1;
        snap.num_entities += 1;
    }

    fn old_entity(&self, old: Option<&RawSnapshot>, index: usize) -> Option<EntityState> {
        let old = old?;
        if index >= old.num_entities {
            return None;
        }

        Some(self.parse_entities[(old.parse_entities_num + index) & (MAX_PARSE_ENTITIES - 1)].clone())
    }

    fn parse_packet_entities(
        &mut self,
        msg: &mut Msg,
        protocol: &Protocol,
        gamestate: &GameState,
        old: Option<&RawSnapshot>,
        snap: &mut RawSnapshot,
    ) -> Result<(), NetError> {
        snap.parse_entities_num = self.parse_entities_num;
        snap.num_entities = 0;

        let mut old_index = 0;
        let mut old_state = self.old_entity(old, old_index);
        let none = protocol.entity.none_number();

        loop {
            let number = protocol.entity.read_number(msg)?;
            if number == none {
                break;
            }

            // entities absent from the update are carried over unchanged
            while let Some(o) = old_state.take() {
                if o.number as u32 >= number {
                    old_state = Some(o);
                    break;
                }

                self.push_entity(snap, o);
                old_index += 1;
                old_state = self.old_entity(old, old_index);
            }

            let from = if old_state.as_ref().map_or(false, |o| o.number as u32 == number) {
                let from = old_state.take();
                old_index += 1;
                old_state = self.old_entity(old, old_index);
                from
            } else {
                Some(
                    gamestate
                        .baseline(number as usize)
                        .cloned()
                        .unwrap_or_else(|| EntityState {
                            number: number as i32,
                            ..Default::default()
                        }),
                )
            };

            if let Some(state) = protocol
                .entity
                .read_delta_entity(msg, from.as_ref(), number)?
            {
                self.push_entity(snap, state);
            }
        }

        while let Some(o) = old_state.take() {
            self.push_entity(snap, o);
            old_index += 1;
            old_state = self.old_entity(old, old_index);
        }

        Ok(())
    }

    /// Look up a stored snapshot. `None` if it is too old, invalid, or its entities have
    /// since been overwritten.
    pub fn get_snapshot(&self, message_num: u32) -> Option<Snapshot> {
        if self.state == SnapshotState::Inactive {
            return None;
        }

        let age = self.current.message_num.wrapping_sub(message_num) as i32;
        if age < 0 {
            debug!("Snapshot {} is newer than the current one", message_num);
            return None;
        }

        if age as usize >= PACKET_BACKUP {
            return None;
        }

        let raw = &self.snapshots[message_num as usize & PACKET_MASK];
        if !raw.valid || raw.message_num != message_num {
            return None;
        }

        if self.parse_entities_num - raw.parse_entities_num >= MAX_PARSE_ENTITIES {
            return None;
        }

        let entities = (0..raw.num_entities)
            .map(|i| self.parse_entities[(raw.parse_entities_num + i) & (MAX_PARSE_ENTITIES - 1)].clone())
            .collect();

        Some(Snapshot {
            message_num: raw.message_num,
            delta_num: raw.delta_num,
            ping: raw.ping,
            server_command_num: raw.server_command_num,
            frame: Frame {
                server_time: raw.server_time,
                snap_flags: raw.snap_flags,
                areamask: raw.areamask.clone(),
                ps: raw.ps.clone(),
                entities,
                sounds: raw.sounds.clone(),
            },
        })
    }
}

fn read_sounds(msg: &mut Msg, protocol: &Protocol) -> Result<Vec<SoundEvent>, NetError> {
    if !msg.read_bool()? {
        return Ok(Vec::new());
    }

    let count = msg.read_bits(SOUND_COUNT_BITS)? as usize;
    if count > MAX_SERVER_SOUNDS {
        return Err(NetErrorKind::BadFieldCount {
            count,
            max: MAX_SERVER_SOUNDS,
        }
        .into());
    }

    let mut sounds = Vec::with_capacity(count);
    for _ in 0..count {
        sounds.push(protocol.entity.read_sound(msg)?);
    }

    Ok(sounds)
}

fn write_sounds(msg: &mut Msg, protocol: &Protocol, sounds: &[SoundEvent]) -> Result<(), NetError> {
    if sounds.is_empty() {
        return msg.write_bool(false);
    }

    if sounds.len() > MAX_SERVER_SOUNDS {
        return Err(NetErrorKind::BadFieldCount {
            count: sounds.len(),
            max: MAX_SERVER_SOUNDS,
        }
        .into());
    }

    msg.write_bool(true)?;
    msg.write_bits(sounds.len() as i64, SOUND_COUNT_BITS)?;
    for sound in sounds {
        protocol.entity.write_sound(msg, sound)?;
    }

    Ok(())
}

/// Write the body of a snapshot message, as the server does.
///
/// `from` is the frame sent `delta_num` packets earlier, or `None` for an uncompressed
/// snapshot.
pub fn write_snapshot(
    msg: &mut Msg,
    protocol: &Protocol,
    gamestate: &GameState,
    from: Option<(&Frame, u8)>,
    to: &Frame,
) -> Result<(), NetError> {
    if to.areamask.len() > MAX_MAP_AREA_BYTES {
        return Err(NetErrorKind::BadFieldCount {
            count: to.areamask.len(),
            max: MAX_MAP_AREA_BYTES,
        }
        .into());
    }

    msg.write_long(to.server_time)?;
    msg.write_byte(from.map(|(_, n)| n).unwrap_or(0))?;
    msg.write_byte(to.snap_flags.bits())?;
    msg.write_byte(to.areamask.len() as u8)?;
    msg.write_data(&to.areamask)?;

    let from = from.map(|(f, _)| f);
    protocol
        .player
        .write_delta_player(msg, from.map(|f| &f.ps), &to.ps)?;

    let old: &[EntityState] = from.map(|f| f.entities.as_slice()).unwrap_or(&[]);
    let new = to.entities.as_slice();
    let (mut old_index, mut new_index) = (0, 0);

    while old_index < old.len() || new_index < new.len() {
        let new_num = new.get(new_index).map(|e| e.number).unwrap_or(i32::max_value());
        let old_num = old.get(old_index).map(|e| e.number).unwrap_or(i32::max_value());

        if new_num == old_num {
            protocol
                .entity
                .write_delta_entity(msg, Some(&old[old_index]), Some(&new[new_index]), false)?;
            old_index += 1;
            new_index += 1;
        } else if new_num < old_num {
            let default;
            let base = match gamestate.baseline(new_num as usize) {
                Some(b) => b,
                None => {
                    default = EntityState {
                        number: new_num,
                        ..Default::default()
                    };
                    &default
                }
            };

            protocol
                .entity
                .write_delta_entity(msg, Some(base), Some(&new[new_index]), true)?;
            new_index += 1;
        } else {
            protocol
                .entity
                .write_delta_entity(msg, Some(&old[old_index]), None, true)?;
            old_index += 1;
        }
    }

    protocol
        .entity
        .write_number(msg, protocol.entity.none_number())?;

    write_sounds(msg, protocol, &to.sounds)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::msg::stream::{DynamicStream, MessageStream, SeekPos};

    fn entity(number: i32, x: f32) -> EntityState {
        EntityState {
            number,
            model_index: number,
            net_origin: [x, 0.0, 0.0],
            ..Default::default()
        }
    }

    fn frame(server_time: i32, entities: Vec<EntityState>) -> Frame {
        Frame {
            server_time,
            areamask: vec![0xFF, 0x01],
            ps: PlayerState {
                command_time: server_time,
                origin: [server_time as f32, 8.0, -8.0],
                ..Default::default()
            },
            entities,
            ..Default::default()
        }
    }

    fn parse(
        manager: &mut SnapshotManager,
        protocol: &Protocol,
        gamestate: &GameState,
        message_num: u32,
        from: Option<(&Frame, u8)>,
        to: &Frame,
    ) -> bool {
        let mut stream = DynamicStream::new();
        {
            let mut msg = Msg::new(&mut stream);
            write_snapshot(&mut msg, protocol, gamestate, from, to).unwrap();
            msg.flush().unwrap();
        }

        stream.seek(0, SeekPos::Begin).unwrap();
        let mut msg = Msg::new(&mut stream);
        manager
            .parse_snapshot(&mut msg, protocol, gamestate, message_num, 0)
            .unwrap()
    }

    #[test]
    fn test_snapshot_read_write_eq() {
        for version in [8, 17].iter() {
            let protocol = Protocol::for_version(*version).unwrap();
            let gamestate = GameState::new(protocol.limits());
            let mut manager = SnapshotManager::new();

            let mut to = frame(1000, vec![entity(1, 8.0), entity(5, 16.0)]);
            to.sounds.push(SoundEvent::start(5, 2, 31));
            to.sounds.push(SoundEvent::stop(1, 0));

            assert!(parse(&mut manager, &protocol, &gamestate, 1, None, &to));
            assert_eq!(manager.state(), SnapshotState::Active);

            let snap = manager.get_snapshot(1).unwrap();
            assert_eq!(snap.delta_num, None);
            assert_eq!(snap.frame, to);
        }
    }

    #[test]
    fn test_snapshot_delta_merge() {
        let protocol = Protocol::for_version(17).unwrap();
        let mut gamestate = GameState::new(protocol.limits());
        gamestate.set_baseline(entity(7, 64.0)).unwrap();
        let mut manager = SnapshotManager::new();

        let first = frame(1000, vec![entity(1, 8.0), entity(3, 16.0), entity(9, 24.0)]);
        assert!(parse(&mut manager, &protocol, &gamestate, 1, None, &first));

        // 1 unchanged, 3 removed, 7 new from baseline, 9 moved, 12 new
        let mut moved = entity(9, 32.0);
        moved.frame_info[0].index = 3;
        let second = frame(
            1050,
            vec![entity(1, 8.0), entity(7, 72.0), moved, entity(12, 0.0)],
        );
        assert!(parse(&mut manager, &protocol, &gamestate, 2, Some((&first, 1)), &second));

        let snap = manager.get_snapshot(2).unwrap();
        assert_eq!(snap.delta_num, Some(1));
        assert_eq!(snap.frame.entities, second.entities);
        assert_eq!(snap.frame.ps, second.ps);

        // the source is still intact
        assert_eq!(manager.get_snapshot(1).unwrap().frame.entities, first.entities);
    }

    #[test]
    fn test_snapshot_delta_from_invalid() {
        let protocol = Protocol::for_version(17).unwrap();
        let gamestate = GameState::new(protocol.limits());
        let mut manager = SnapshotManager::new();

        let first = frame(1000, vec![entity(1, 8.0)]);
        assert!(parse(&mut manager, &protocol, &gamestate, 1, None, &first));

        // claims a delta from message 3, which was never received
        let second = frame(1100, vec![entity(1, 16.0)]);
        assert!(!parse(&mut manager, &protocol, &gamestate, 5, Some((&first, 2)), &second));
        assert_eq!(manager.current_number(), 1);
        assert!(manager.get_snapshot(5).is_none());
        assert!(manager.get_snapshot(1).is_some());
    }

    #[test]
    fn test_snapshot_ring() {
        let protocol = Protocol::for_version(17).unwrap();
        let gamestate = GameState::new(protocol.limits());
        let mut manager = SnapshotManager::new();

        for n in 1..=40 {
            let to = frame(n as i32 * 50, vec![entity(n as i32, n as f32)]);
            assert!(parse(&mut manager, &protocol, &gamestate, n, None, &to));
        }

        for n in 1..=40 {
            let snap = manager.get_snapshot(n);
            if 40 - n >= PACKET_BACKUP as u32 {
                assert!(snap.is_none(), "snapshot {} should be gone", n);
            } else {
                let snap = snap.unwrap();
                assert_eq!(snap.message_num, n);
                assert_eq!(snap.frame.server_time, n as i32 * 50);
                assert_eq!(snap.frame.entities[0].number, n as i32);
            }
        }

        assert!(manager.get_snapshot(41).is_none());
    }

    #[test]
    fn test_snapshot_gap_invalidates() {
        let protocol = Protocol::for_version(8).unwrap();
        let gamestate = GameState::new(protocol.limits());
        let mut manager = SnapshotManager::new();

        for n in 1..=36 {
            assert!(parse(&mut manager, &protocol, &gamestate, n, None, &frame(n as i32, vec![])));
        }

        // messages 37 to 39 were lost
        assert!(parse(&mut manager, &protocol, &gamestate, 40, None, &frame(40, vec![])));
        assert!(manager.get_snapshot(40).is_some());
        assert!(manager.get_snapshot(36).is_some());
        assert!(manager.get_snapshot(37).is_none());
        assert!(manager.get_snapshot(39).is_none());

        // a jump past the whole ring leaves only the new snapshot
        assert!(parse(&mut manager, &protocol, &gamestate, 100, None, &frame(100, vec![])));
        assert!((69..100).all(|n| manager.get_snapshot(n).is_none()));
        assert!(manager.get_snapshot(100).is_some());
    }

    #[test]
    fn test_snapshot_parse_entities_overwritten() {
        let protocol = Protocol::for_version(17).unwrap();
        let gamestate = GameState::new(protocol.limits());
        let mut manager = SnapshotManager::new();

        let frames: Vec<Frame> = (1..=3)
            .map(|n| {
                let entities = (0..1000).map(|e| entity(e, (n * 8) as f32)).collect();
                frame(n * 50, entities)
            })
            .collect();
        for (n, f) in frames.iter().enumerate() {
            assert!(parse(&mut manager, &protocol, &gamestate, n as u32 + 1, None, f));
        }
        assert_eq!(manager.parse_entities_num(), 3000);

        // snapshot 3 reused the parse entities of snapshot 1
        assert!(manager.get_snapshot(1).is_none());
        assert_eq!(manager.get_snapshot(2).unwrap().frame, frames[1]);
        assert_eq!(manager.get_snapshot(3).unwrap().frame, frames[2]);

        // so snapshot 1 can no longer be a delta source
        let next = frame(200, vec![entity(1, 8.0)]);
        assert!(!parse(&mut manager, &protocol, &gamestate, 4, Some((&frames[0], 3)), &next));
        assert!(manager.get_snapshot(4).is_none());
        assert_eq!(manager.current_number(), 3);
    }

    #[test]
    fn test_snapshot_server_count_restart() {
        let protocol = Protocol::for_version(17).unwrap();
        let gamestate = GameState::new(protocol.limits());
        let mut manager = SnapshotManager::new();
        assert_eq!(manager.state(), SnapshotState::Inactive);
        assert!(manager.current().is_none());

        let mut f = frame(100, vec![]);
        assert!(parse(&mut manager, &protocol, &gamestate, 1, None, &f));
        assert_eq!(manager.state(), SnapshotState::Active);

        f.snap_flags = SnapFlags::SERVERCOUNT;
        assert!(parse(&mut manager, &protocol, &gamestate, 2, None, &f));
        assert_eq!(manager.state(), SnapshotState::Restarted);

        assert!(parse(&mut manager, &protocol, &gamestate, 3, None, &f));
        assert_eq!(manager.state(), SnapshotState::Active);

        manager.reset();
        assert_eq!(manager.state(), SnapshotState::Inactive);
        assert!(manager.get_snapshot(3).is_none());
    }

    #[test]
    fn test_snapshot_too_many_sounds() {
        let protocol = Protocol::for_version(17).unwrap();
        let gamestate = GameState::new(protocol.limits());
        let mut f = frame(100, vec![]);
        f.sounds = vec![SoundEvent::stop(1, 0); MAX_SERVER_SOUNDS + 1];

        let mut stream = DynamicStream::new();
        let mut msg = Msg::new(&mut stream);
        let err = write_snapshot(&mut msg, &protocol, &gamestate, None, &f).unwrap_err();
        assert_eq!(
            err.kind(),
            NetErrorKind::BadFieldCount {
                count: MAX_SERVER_SOUNDS + 1,
                max: MAX_SERVER_SOUNDS
            }
        );
    }
}
