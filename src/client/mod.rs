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

//! Client connection state machine.
//!
//! A `ClientSession` owns everything needed to talk to one server: the connect handshake,
//! the netchan, both reliable command rings, the game state, the snapshot history and the
//! clock. It is driven by calling `frame` with the current real time; decoded events are
//! delivered to a `ClientHandler`.

pub mod assets;
pub mod comm;
pub mod cvars;
pub mod download;
mod error;
pub mod handler;
pub mod time;

pub use self::error::{ClientError, ClientErrorKind};

use std::time::Instant;

use byteorder::{ByteOrder, LittleEndian};
use chrono::Duration;
use failure::Fail;
use num::FromPrimitive;

use crate::{
    client::{
        comm::Communicator,
        cvars::ClientSettings,
        download::{Download, DownloadEvent},
        handler::ClientHandler,
        time::ClientTime,
    },
    common::{
        console::CvarRegistry,
        info::InfoString,
        msg::{
            stream::{DynamicStream, FixedStream},
            Msg, MAX_STRING_CHARS,
        },
        net::{
            chan::{NetSide, Netchan, SEQUENCE_LEN},
            configstring::CS_SYSTEMINFO,
            connect::{self, ConnectPacket, Request, Response},
            encoding::{ChannelEncoding, DECODE_START, ENCODE_START},
            gamestate::{BigConfigString, GameState},
            player::RadarBlip,
            protocol::Protocol,
            reliable::{CommandSequence, ReliableSequence},
            snapshot::{Snapshot, SnapshotManager, SnapshotState},
            usercmd::{UserCmd, UserEyes},
            ClientOp, NetError, NetErrorKind, ServerOp, CMD_BACKUP, CMD_MASK,
            MAX_PACKET_USERCMDS, MAX_RELIABLE_COMMANDS, PACKET_BACKUP, PACKET_MASK,
        },
        util,
    },
};

/// Milliseconds between connection request retransmissions.
const RETRANSMIT_TIMEOUT: i64 = 3000;

const MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Milliseconds between packets while connected but not yet primed.
const HEARTBEAT_TIME: i32 = 1000;

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ConnectionState {
    Disconnected,
    /// Waiting for a challenge response.
    Challenging,
    /// Waiting for a connect response.
    Connecting,
    /// Netchan established, waiting for a game state.
    Connected,
    /// Game state received, waiting for the first valid snapshot.
    Primed,
    Active,
}

#[derive(Clone, Copy, Debug)]
struct OutPacket {
    real_time: i32,
    server_time: i32,
    cmd_number: u32,
}

pub struct ClientSession<C>
where
    C: Communicator,
{
    comm: C,
    settings: ClientSettings,
    protocol: Protocol,
    state: ConnectionState,
    userinfo: InfoString,

    real_time: Duration,
    connect_time: Option<Duration>,
    connect_attempts: u32,
    challenge: u32,

    chan: Netchan,
    encoding: ChannelEncoding,
    reliable: ReliableSequence,
    server_commands: CommandSequence,
    server_message_sequence: u32,
    last_packet_sent: Option<Duration>,

    gamestate: GameState,
    server_id: u32,
    big_config_string: BigConfigString,
    snapshots: SnapshotManager,
    new_snapshots: bool,
    time: ClientTime,

    input: (UserCmd, UserEyes),
    cmds: Vec<UserCmd>,
    eyes: Vec<UserEyes>,
    cmd_number: u32,
    out_packets: Vec<Option<OutPacket>>,

    download: Option<Download>,
}

fn millis(d: Duration) -> i32 {
    d.num_milliseconds() as i32
}

impl<C> ClientSession<C>
where
    C: Communicator,
{
    pub fn new(
        comm: C,
        settings: ClientSettings,
        userinfo: InfoString,
    ) -> Result<ClientSession<C>, ClientError> {
        let protocol = Protocol::for_version(settings.protocol)?;
        debug!("Client session using {:?}", protocol);

        Ok(ClientSession {
            comm,
            chan: Netchan::new(NetSide::Client, settings.qport),
            settings,
            gamestate: GameState::new(protocol.limits()),
            protocol,
            state: ConnectionState::Disconnected,
            userinfo,

            real_time: Duration::zero(),
            connect_time: None,
            connect_attempts: 0,
            challenge: 0,

            encoding: ChannelEncoding::default(),
            reliable: ReliableSequence::new(MAX_RELIABLE_COMMANDS),
            server_commands: CommandSequence::new(MAX_RELIABLE_COMMANDS),
            server_message_sequence: 0,
            last_packet_sent: None,

            server_id: 0,
            big_config_string: BigConfigString::new(),
            snapshots: SnapshotManager::new(),
            new_snapshots: false,
            time: ClientTime::new(),

            input: (UserCmd::default(), UserEyes::default()),
            cmds: vec![UserCmd::default(); CMD_BACKUP],
            eyes: vec![UserEyes::default(); CMD_BACKUP],
            cmd_number: 0,
            out_packets: vec![None; PACKET_BACKUP],

            download: None,
        })
    }

    /// Create a session configured from the client cvars.
    pub fn from_cvars(comm: C, cvars: &CvarRegistry) -> Result<ClientSession<C>, ClientError> {
        let settings = ClientSettings::from_cvars(cvars)?;
        ClientSession::new(comm, settings, cvars.userinfo())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn gamestate(&self) -> &GameState {
        &self.gamestate
    }

    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    pub fn client_num(&self) -> i32 {
        self.gamestate.client_num
    }

    /// Estimated server time currently displayed.
    pub fn server_time(&self) -> i32 {
        self.time.server_time()
    }

    pub fn reliable(&self) -> &ReliableSequence {
        &self.reliable
    }

    pub fn server_commands(&self) -> &CommandSequence {
        &self.server_commands
    }

    pub fn netchan(&self) -> &Netchan {
        &self.chan
    }

    pub fn snapshot(&self, message_num: u32) -> Option<Snapshot> {
        self.snapshots.get_snapshot(message_num)
    }

    /// The newest valid snapshot.
    pub fn current_snapshot(&self) -> Option<Snapshot> {
        self.snapshots.current()?;
        self.snapshots.get_snapshot(self.snapshots.current_number())
    }

    /// The radar blip carried by the current player state, if the protocol has one.
    pub fn radar(&self) -> Option<RadarBlip> {
        let current = self.snapshots.current()?;
        self.protocol.pvs.read_radar(current.ps.radar_info)
    }

    fn real_ms(&self) -> i32 {
        millis(self.real_time)
    }

    /// Start connecting. Requests go out on the next frame.
    pub fn connect(&mut self) {
        info!("Connecting with protocol {}", self.protocol.version);
        self.reset_connection();
        self.state = ConnectionState::Challenging;
    }

    fn reset_connection(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.connect_time = None;
        self.connect_attempts = 0;
        self.challenge = 0;
        self.chan = Netchan::new(NetSide::Client, self.settings.qport);
        self.encoding = ChannelEncoding::default();
        self.reliable = ReliableSequence::new(MAX_RELIABLE_COMMANDS);
        self.server_commands = CommandSequence::new(MAX_RELIABLE_COMMANDS);
        self.server_message_sequence = 0;
        self.last_packet_sent = None;
        self.gamestate = GameState::new(self.protocol.limits());
        self.server_id = 0;
        self.big_config_string = BigConfigString::new();
        self.snapshots.reset();
        self.new_snapshots = false;
        self.time = ClientTime::new();
        self.cmd_number = 0;
        self.out_packets = vec![None; PACKET_BACKUP];
        self.download = None;
    }

    /// Leave the server, telling it so if a netchan is up.
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        if self.state >= ConnectionState::Connected {
            self.reliable.add_command("disconnect");
            // no acknowledgement will come, so send it a few times
            for _ in 0..3 {
                self.write_packet()?;
            }
        }

        self.reset_connection();
        Ok(())
    }

    /// Queue a command for reliable delivery. Returns false if the ring is full.
    pub fn add_reliable_command<S>(&mut self, cmd: S) -> bool
    where
        S: AsRef<str>,
    {
        self.reliable.add_command(cmd)
    }

    pub fn set_userinfo(&mut self, userinfo: InfoString) {
        self.userinfo = userinfo;
        if self.state >= ConnectionState::Connected {
            let cmd = format!("userinfo \"{}\"", self.userinfo);
            self.reliable.add_command(cmd);
        }
    }

    /// Resend the userinfo if a userinfo cvar changed.
    pub fn update_userinfo(&mut self, cvars: &CvarRegistry) {
        if cvars.take_userinfo_modified() {
            self.set_userinfo(cvars.userinfo());
        }
    }

    /// Set the movement and view input used for the commands of the following frames.
    pub fn set_input(&mut self, cmd: UserCmd, eyes: UserEyes) {
        self.input = (cmd, eyes);
    }

    /// Ask the server for a file. Blocks arrive as `svc_download` messages.
    pub fn start_download<S>(&mut self, name: S) -> Result<(), ClientError>
    where
        S: Into<String>,
    {
        if self.state < ConnectionState::Connected {
            return Err(ClientErrorKind::NotConnected.into());
        }

        let download = Download::new(name);
        self.reliable.add_command(download.request());
        self.download = Some(download);
        Ok(())
    }

    pub fn request_info(&mut self) -> Result<(), ClientError> {
        self.comm.send(&Request::GetInfo.to_bytes())?;
        Ok(())
    }

    pub fn request_status(&mut self) -> Result<(), ClientError> {
        self.comm.send(&Request::GetStatus.to_bytes())?;
        Ok(())
    }

    /// Run one client frame at `real_time`: receive, resend connection requests, advance the
    /// clock, sample input and send a packet if one is due.
    pub fn frame(
        &mut self,
        real_time: Duration,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        self.real_time = real_time;

        let max_time = self.settings.max_process_time;
        self.process(max_time, handler)?;
        self.check_for_resend()?;

        if self.state < ConnectionState::Connected {
            return Ok(());
        }

        self.update_time()?;
        self.create_command();

        if self.ready_to_send() {
            self.write_packet()?;
        }

        Ok(())
    }

    /// Receive and handle datagrams for at most `max_time`, waiting for more as long as
    /// the budget allows.
    pub fn process(
        &mut self,
        max_time: Duration,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        let start = Instant::now();

        loop {
            let elapsed = Duration::from_std(start.elapsed()).unwrap_or(max_time);
            if elapsed >= max_time {
                return Ok(());
            }

            match self.comm.receive()? {
                Some(packet) => self.handle_datagram(&packet, handler)?,
                None => {
                    if !self.comm.wait(max_time - elapsed)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handle one datagram from the server.
    ///
    /// Malformed in-band messages are logged and dropped; the connection carries on.
    pub fn handle_datagram(
        &mut self,
        packet: &[u8],
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        if connect::is_connectionless(packet) {
            return match Response::from_bytes(packet) {
                Ok(response) => self.handle_connectionless(response, handler),
                Err(e) => {
                    warn!("Bad connectionless packet: {}", e);
                    Ok(())
                }
            };
        }

        if self.state < ConnectionState::Connected {
            debug!("In-band packet while not connected");
            return Ok(());
        }

        let message = match self.chan.process(packet) {
            Ok(Some(m)) => m,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Dropped datagram: {}", e);
                return Ok(());
            }
        };

        match self.parse_server_message(message, handler) {
            Err(ref e) if e.kind() == ClientErrorKind::Net => {
                match e.cause() {
                    Some(cause) => warn!("Dropped server message: {}", cause),
                    None => warn!("Dropped server message: {}", e),
                }
                Ok(())
            }
            result => result,
        }
    }

    fn handle_connectionless(
        &mut self,
        response: Response,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        match response {
            Response::Challenge { challenge } => {
                if self.state != ConnectionState::Challenging {
                    debug!("Unexpected challenge response");
                    return Ok(());
                }

                debug!("Challenge {}", challenge);
                self.challenge = challenge;
                self.state = ConnectionState::Connecting;
                self.connect_time = None;
                self.connect_attempts = 0;
                self.check_for_resend()
            }

            Response::Connect => {
                match self.state {
                    ConnectionState::Connecting => (),
                    ConnectionState::Challenging => {
                        self.reset_connection();
                        return Err(ClientErrorKind::InvalidConnectResponse.into());
                    }
                    _ => {
                        debug!("Duplicate connect response");
                        return Ok(());
                    }
                }

                info!("Connected, qport {}", self.settings.qport);
                self.state = ConnectionState::Connected;
                self.chan = Netchan::new(NetSide::Client, self.settings.qport);
                self.encoding = ChannelEncoding::new(self.challenge);
                self.last_packet_sent = None;
                Ok(())
            }

            Response::Print { message } => {
                handler.on_print(&message);
                Ok(())
            }

            Response::DropError { message } => {
                if self.state == ConnectionState::Disconnected {
                    return Ok(());
                }

                handler.on_disconnect(&message);
                self.reset_connection();
                Err(ClientErrorKind::ConnectionRejected { message }.into())
            }

            Response::Info { info } => {
                handler.on_info_response(&info);
                Ok(())
            }

            Response::Status { info, players } => {
                handler.on_status_response(&info, &players);
                Ok(())
            }

            Response::Disconnect => {
                if self.state < ConnectionState::Connected {
                    return Ok(());
                }

                Err(self.drop_connection("Server disconnected".to_owned(), handler))
            }
        }
    }

    fn drop_connection(&mut self, reason: String, handler: &mut dyn ClientHandler) -> ClientError {
        info!("Disconnected: {}", reason);
        handler.on_disconnect(&reason);
        self.reset_connection();
        ClientErrorKind::Disconnected { reason }.into()
    }

    fn check_for_resend(&mut self) -> Result<(), ClientError> {
        match self.state {
            ConnectionState::Challenging | ConnectionState::Connecting => (),
            _ => return Ok(()),
        }

        if let Some(t) = self.connect_time {
            if self.real_time - t < Duration::milliseconds(RETRANSMIT_TIMEOUT) {
                return Ok(());
            }
        }

        if self.connect_attempts >= MAX_CONNECT_ATTEMPTS {
            warn!("No response after {} attempts", self.connect_attempts);
            self.reset_connection();
            return Err(ClientErrorKind::NoResponse.into());
        }

        self.connect_time = Some(self.real_time);
        self.connect_attempts += 1;

        let request = match self.state {
            ConnectionState::Challenging => Request::GetChallenge,
            _ => {
                let mut info = self.userinfo.clone();
                info.set("protocol", self.protocol.version.to_string());
                info.set("qport", self.settings.qport.to_string());
                info.set("challenge", (self.challenge as i32).to_string());
                Request::connect(info)
            }
        };

        debug!(
            "Sending {:?} (attempt {} of {})",
            request, self.connect_attempts, MAX_CONNECT_ATTEMPTS
        );
        self.comm.send(&request.to_bytes())?;
        Ok(())
    }

    fn parse_server_message(
        &mut self,
        mut message: Vec<u8>,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        if message.len() < SEQUENCE_LEN + DECODE_START {
            return Err(NetError::from(NetErrorKind::BadHeader {
                message: format!("{} byte server message", message.len()),
            })
            .into());
        }

        let sequence = LittleEndian::read_u32(&message[0..4]);
        let reliable_ack = LittleEndian::read_u32(&message[4..8]);
        self.encoding.apply_incoming(
            sequence,
            self.reliable.command_at(reliable_ack).as_bytes(),
            &mut message,
            SEQUENCE_LEN + DECODE_START,
        );

        self.server_message_sequence = sequence;
        self.reliable.update_acknowledge(reliable_ack);

        let mut stream = FixedStream::for_reading(&mut message);
        let mut msg = Msg::new(&mut stream);
        msg.read_long()?;
        msg.read_long()?;

        loop {
            let code = msg.read_byte()?;
            let op = ServerOp::from_u8(code)
                .ok_or_else(|| NetError::from(NetErrorKind::BadOpcode { code }))?;

            if self.settings.show_net {
                debug!("{:5}: {:?}", msg.byte_position(), op);
            }

            match op {
                ServerOp::Eof => break,
                ServerOp::Nop => (),

                ServerOp::GameState => self.parse_gamestate(&mut msg, handler)?,

                ServerOp::ServerCommand => {
                    let seq = msg.read_long()? as u32;
                    let text = self.protocol.string.read_string(&mut msg, MAX_STRING_CHARS)?;
                    self.server_commands.store(seq, text);
                }

                ServerOp::Snapshot => self.parse_snapshot(&mut msg, handler)?,

                ServerOp::Download => self.parse_download(&mut msg, handler)?,

                ServerOp::CenterPrint => {
                    let text = self.protocol.string.read_string(&mut msg, MAX_STRING_CHARS)?;
                    handler.on_center_print(&text);
                }

                ServerOp::LocPrint => {
                    let x = msg.read_short()?;
                    let y = msg.read_short()?;
                    let text = self.protocol.string.read_string(&mut msg, MAX_STRING_CHARS)?;
                    handler.on_location_print(x, y, &text);
                }

                ServerOp::CgameMessage => handler.parse_cgame_message(&mut msg)?,

                // only valid inside a game state
                ServerOp::ConfigString | ServerOp::Baseline | ServerOp::Bad => {
                    return Err(NetError::from(NetErrorKind::BadOpcode { code }).into());
                }
            }
        }

        self.execute_server_commands(handler)
    }

    fn parse_gamestate(
        &mut self,
        msg: &mut Msg,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        let gamestate = GameState::parse(msg, &self.protocol)?;

        self.snapshots.reset();
        self.new_snapshots = false;
        self.server_commands.reset(gamestate.server_command_sequence);
        self.big_config_string = BigConfigString::new();
        self.gamestate = gamestate;

        handler.on_gamestate(&self.gamestate);
        for (index, value) in self.gamestate.non_empty() {
            handler.on_config_string_modified(index, value);
        }

        self.system_info_changed(handler);

        if self.state >= ConnectionState::Connected {
            self.state = ConnectionState::Primed;
        }

        Ok(())
    }

    fn system_info_changed(&mut self, handler: &mut dyn ClientHandler) {
        let server_id = self.gamestate.server_id().unwrap_or(0);
        if server_id == self.server_id {
            return;
        }

        debug!("Server id {} -> {}", self.server_id, server_id);
        if self.server_id != 0 {
            handler.on_server_id_changed(self.server_id, server_id);
            self.snapshots.reset();
            self.new_snapshots = false;
        }

        self.server_id = server_id;
    }

    fn parse_snapshot(
        &mut self,
        msg: &mut Msg,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        let valid = self.snapshots.parse_snapshot(
            msg,
            &self.protocol,
            &self.gamestate,
            self.server_message_sequence,
            self.server_commands.sequence(),
        )?;

        if !valid {
            return Ok(());
        }

        let command_time = match self.snapshots.current() {
            Some(s) => s.ps.command_time,
            None => return Ok(()),
        };

        // round trip to the newest packet whose commands the server has already run
        let mut ping = 999;
        for i in 0..PACKET_BACKUP as u32 {
            let n = self.chan.outgoing_sequence().wrapping_sub(1 + i) as usize & PACKET_MASK;
            if let Some(p) = self.out_packets[n] {
                if command_time >= p.server_time {
                    ping = self.real_ms() - p.real_time;
                    break;
                }
            }
        }
        self.snapshots.set_ping(ping);
        self.new_snapshots = true;

        if self.snapshots.state() == SnapshotState::Restarted {
            handler.on_server_restart();
        }

        if let Some(snapshot) = self.snapshots.get_snapshot(self.snapshots.current_number()) {
            handler.on_snapshot(&snapshot);
        }

        Ok(())
    }

    fn parse_download(
        &mut self,
        msg: &mut Msg,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        let mut download = match self.download.take() {
            Some(d) => d,
            None => {
                warn!("Server sent a download that was not requested");
                self.reliable.add_command("stopdl");
                return match Download::new("").receive_block(msg) {
                    Ok(_) => Ok(()),
                    Err(e) => match e.kind() {
                        NetErrorKind::DownloadBlock { .. } => Ok(()),
                        _ => Err(e.into()),
                    },
                };
            }
        };

        match download.receive_block(msg) {
            Ok(DownloadEvent::Progress { ack }) => {
                self.reliable.add_command(ack);
                self.download = Some(download);
            }

            Ok(DownloadEvent::Complete { ack, data }) => {
                self.reliable.add_command(ack);
                handler.on_download_complete(download.name(), &data);
            }

            Ok(DownloadEvent::Failed { reason }) => {
                warn!("Download of {} failed: {}", download.name(), reason);
                handler.on_download_failed(download.name(), &reason);
            }

            Err(e) => {
                let kind = e.kind();
                self.download = Some(download);
                match kind {
                    NetErrorKind::DownloadBlock { .. } => warn!("{}", e),
                    _ => return Err(e.into()),
                }
            }
        }

        Ok(())
    }

    fn execute_server_commands(&mut self, handler: &mut dyn ClientHandler) -> Result<(), ClientError> {
        while let Some((seq, cmd)) = self.server_commands.next_pending() {
            trace!("server command {}: {}", seq, cmd);
            self.execute_server_command(&cmd, handler)?;
        }

        Ok(())
    }

    fn execute_server_command(
        &mut self,
        text: &str,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        let args = util::tokenize(text);
        let name = match args.first() {
            Some(n) => n.as_str(),
            None => return Ok(()),
        };

        let index = args.get(1).and_then(|a| a.parse::<usize>().ok());
        let rest = || args.get(2..).map(|a| a.join(" ")).unwrap_or_default();

        match name {
            "disconnect" => {
                let reason = match args.len() {
                    1 => "Server disconnected".to_owned(),
                    _ => args[1..].join(" "),
                };
                return Err(self.drop_connection(reason, handler));
            }

            "cs" | "bcs0" | "bcs1" | "bcs2" if index.is_none() => {
                warn!("Malformed server command: {}", text);
            }

            "cs" => self.config_string_modified(index.unwrap_or(0), rest(), handler)?,

            "bcs0" => self.big_config_string.begin(index.unwrap_or(0), &rest()),
            "bcs1" => self.big_config_string.append(index.unwrap_or(0), &rest()),
            "bcs2" => {
                let index = index.unwrap_or(0);
                if let Some(value) = self.big_config_string.finish(index, &rest()) {
                    self.config_string_modified(index, value, handler)?;
                }
            }

            "stufftext" => handler.on_stufftext(&args[1..].join(" ")),

            _ => handler.on_server_command(&args),
        }

        Ok(())
    }

    fn config_string_modified(
        &mut self,
        net_index: usize,
        value: String,
        handler: &mut dyn ClientHandler,
    ) -> Result<(), ClientError> {
        let index = self.protocol.header.config_string_from_net(net_index);
        if self.gamestate.config_string(index) == Some(value.as_str()) {
            return Ok(());
        }

        self.gamestate.set_config_string(index, value)?;
        handler.on_config_string_modified(index, self.gamestate.config_string(index).unwrap_or(""));

        if index == CS_SYSTEMINFO {
            self.system_info_changed(handler);
        }

        Ok(())
    }

    fn update_time(&mut self) -> Result<(), ClientError> {
        let snap_server_time = match self.snapshots.current() {
            Some(s) => s.server_time,
            None => return Ok(()),
        };

        match self.state {
            ConnectionState::Primed => {
                if !self.new_snapshots {
                    return Ok(());
                }

                self.new_snapshots = false;
                self.time.first_snapshot(self.real_time, snap_server_time);
                self.state = ConnectionState::Active;
                info!("Session active at server time {}", snap_server_time);
                Ok(())
            }

            ConnectionState::Active => {
                let new_snapshot = self.new_snapshots;
                self.new_snapshots = false;
                self.time.advance(
                    self.real_time,
                    snap_server_time,
                    new_snapshot,
                    self.settings.time_nudge,
                )
            }

            _ => Ok(()),
        }
    }

    fn create_command(&mut self) {
        if self.state < ConnectionState::Primed {
            return;
        }

        self.cmd_number = self.cmd_number.wrapping_add(1);
        let slot = self.cmd_number as usize & CMD_MASK;
        self.cmds[slot] = UserCmd {
            server_time: self.time.server_time(),
            ..self.input.0
        };
        self.eyes[slot] = self.input.1;
    }

    fn ready_to_send(&self) -> bool {
        if self.state < ConnectionState::Connected {
            return false;
        }

        let now = self.real_ms();
        if self.state < ConnectionState::Primed && self.download.is_none() {
            return match self.last_packet_sent {
                Some(t) => now - millis(t) >= HEARTBEAT_TIME,
                None => true,
            };
        }

        let last = self.chan.outgoing_sequence().wrapping_sub(1) as usize & PACKET_MASK;
        match self.out_packets[last] {
            Some(p) => now - p.real_time >= 1000 / self.settings.max_packets.max(1) as i32,
            None => true,
        }
    }

    fn write_packet(&mut self) -> Result<(), ClientError> {
        let mut stream = DynamicStream::new();
        let mut last_server_time = 0;

        {
            let mut msg = Msg::new(&mut stream);
            msg.write_long(self.server_id as i32)?;
            msg.write_long(self.server_message_sequence as i32)?;
            msg.write_long(self.server_commands.sequence() as i32)?;

            for (seq, cmd) in self.reliable.pending() {
                msg.write_byte(ClientOp::ClientCommand as u8)?;
                msg.write_long(seq as i32)?;
                msg.write_string(cmd)?;
            }

            let last = self.chan.outgoing_sequence().wrapping_sub(1) as usize & PACKET_MASK;
            let old_cmd_number = self.out_packets[last].map(|p| p.cmd_number).unwrap_or(0);
            let mut count = self.cmd_number.wrapping_sub(old_cmd_number) as usize;
            if count > MAX_PACKET_USERCMDS {
                warn!("Too many user commands ({}), sending {}", count, MAX_PACKET_USERCMDS);
                count = MAX_PACKET_USERCMDS;
            }

            if count > 0 && self.state >= ConnectionState::Primed {
                let delta = match self.snapshots.current() {
                    Some(s) => s.valid && s.message_num == self.server_message_sequence,
                    None => false,
                };
                msg.write_byte(match delta {
                    true => ClientOp::Move as u8,
                    false => ClientOp::MoveNoDelta as u8,
                })?;
                msg.write_byte(count as u8)?;

                let command = self.server_commands.raw_command_at(self.server_commands.sequence());
                let key = self.gamestate.checksum_feed as u32
                    ^ self.server_message_sequence
                    ^ self.protocol.hash.hash_key(command.as_bytes());

                let mut old_cmd = UserCmd::default();
                let mut old_eyes = UserEyes::default();
                for i in 0..count as u32 {
                    let j = self.cmd_number.wrapping_sub(count as u32 - 1 - i) as usize & CMD_MASK;
                    self.protocol
                        .input
                        .write_usercmd(&mut msg, key, &old_cmd, &self.cmds[j])?;
                    self.protocol
                        .input
                        .write_eyes(&mut msg, &old_eyes, &self.eyes[j])?;
                    old_cmd = self.cmds[j];
                    old_eyes = self.eyes[j];
                }

                last_server_time = old_cmd.server_time;
            }

            msg.write_byte(ClientOp::Eof as u8)?;
            msg.flush()?;
        }

        let mut data = stream.into_inner();
        self.encoding.apply_outgoing(
            self.server_id,
            self.server_message_sequence,
            self.server_commands
                .raw_command_at(self.server_commands.sequence())
                .as_bytes(),
            &mut data,
            ENCODE_START,
        );

        let packet_num = self.chan.outgoing_sequence() as usize & PACKET_MASK;
        self.out_packets[packet_num] = Some(OutPacket {
            real_time: self.real_ms(),
            server_time: last_server_time,
            cmd_number: self.cmd_number,
        });
        self.last_packet_sent = Some(self.real_time);

        for packet in self.chan.transmit(&data)? {
            self.comm.send(&packet)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{
        client::{comm::Loopback, download::write_block},
        common::net::{
            configstring::{CS_MODELS, CS_SERVERINFO, CS_SOUNDS},
            entity::EntityState,
            player::PlayerState,
            snapshot::{write_snapshot, Frame},
        },
    };

    const CHALLENGE: u32 = 0x8234_5678;

    #[derive(Default)]
    struct Recorder {
        gamestates: usize,
        config_strings: Vec<(usize, String)>,
        snapshots: Vec<Snapshot>,
        stufftext: Vec<String>,
        commands: Vec<Vec<String>>,
        downloads: Vec<(String, Vec<u8>)>,
        disconnect: Option<String>,
    }

    impl ClientHandler for Recorder {
        fn on_gamestate(&mut self, _gamestate: &GameState) {
            self.gamestates += 1;
        }

        fn on_config_string_modified(&mut self, index: usize, value: &str) {
            self.config_strings.push((index, value.to_owned()));
        }

        fn on_snapshot(&mut self, snapshot: &Snapshot) {
            self.snapshots.push(snapshot.clone());
        }

        fn on_server_command(&mut self, args: &[String]) {
            self.commands.push(args.to_vec());
        }

        fn on_stufftext(&mut self, text: &str) {
            self.stufftext.push(text.to_owned());
        }

        fn on_download_complete(&mut self, name: &str, data: &[u8]) {
            self.downloads.push((name.to_owned(), data.to_vec()));
        }

        fn on_disconnect(&mut self, reason: &str) {
            self.disconnect = Some(reason.to_owned());
        }
    }

    /// What the test server decoded from one client packet.
    #[derive(Debug, Default)]
    struct ClientPacket {
        server_id: u32,
        message_ack: u32,
        command_ack: u32,
        commands: Vec<(u32, String)>,
        delta: bool,
        usercmds: Vec<UserCmd>,
    }

    /// The server end of a loopback connection.
    struct TestServer {
        comm: Loopback,
        protocol: Protocol,
        chan: Netchan,
        encoding: ChannelEncoding,
        commands: ReliableSequence,
        client_commands: CommandSequence,
        gamestate: GameState,
    }

    impl TestServer {
        fn new(comm: Loopback, protocol: Protocol, qport: u16) -> TestServer {
            let mut gamestate = GameState::new(protocol.limits());
            gamestate.client_num = 2;
            gamestate.checksum_feed = 77;
            gamestate.server_frame_time = if protocol.version >= 15 { Some(0.05) } else { None };
            gamestate
                .set_config_string(CS_SERVERINFO, "\\mapname\\obj/obj_team2\\g_gametype\\4")
                .unwrap();
            gamestate
                .set_config_string(CS_SYSTEMINFO, "\\sv_serverid\\1234")
                .unwrap();
            gamestate.set_config_string(CS_MODELS + 1, "*1").unwrap();
            gamestate
                .set_config_string(CS_MODELS + 2, "models/player/allied_airborne.tik")
                .unwrap();
            gamestate
                .set_config_string(CS_SOUNDS + 1, "sound/weapons/fire/KarFire1.wav")
                .unwrap();
            gamestate.set_baseline(entity(3, 64.0)).unwrap();

            TestServer {
                comm,
                protocol,
                chan: Netchan::new(NetSide::Server, qport),
                encoding: ChannelEncoding::new(CHALLENGE),
                commands: ReliableSequence::new(MAX_RELIABLE_COMMANDS),
                client_commands: CommandSequence::new(MAX_RELIABLE_COMMANDS),
                gamestate,
            }
        }

        fn receive_request(&mut self) -> Request {
            let packet = self.comm.receive().unwrap().unwrap();
            Request::from_bytes(&packet).unwrap()
        }

        fn respond(&mut self, response: Response) {
            self.comm.send(&response.to_bytes()).unwrap();
        }

        fn receive_packet(&mut self) -> Option<ClientPacket> {
            let packet = self.comm.receive().unwrap()?;
            let mut message = self.chan.process(&packet).unwrap()?;
            let mut payload = message.split_off(SEQUENCE_LEN);

            let server_id = LittleEndian::read_u32(&payload[0..4]);
            let message_ack = LittleEndian::read_u32(&payload[4..8]);
            let command_ack = LittleEndian::read_u32(&payload[8..12]);
            let command = self.commands.command_at(command_ack).to_owned();
            self.encoding.apply_outgoing(
                server_id,
                message_ack,
                command.as_bytes(),
                &mut payload,
                ENCODE_START,
            );
            self.commands.update_acknowledge(command_ack);

            let mut out = ClientPacket {
                server_id,
                message_ack,
                command_ack,
                ..Default::default()
            };

            let mut stream = FixedStream::for_reading(&mut payload);
            let mut msg = Msg::new(&mut stream);
            for _ in 0..3 {
                msg.read_long().unwrap();
            }

            loop {
                match ClientOp::from_u8(msg.read_byte().unwrap()).unwrap() {
                    ClientOp::Eof => break,
                    ClientOp::ClientCommand => {
                        let seq = msg.read_long().unwrap() as u32;
                        let cmd = msg.read_string().unwrap();
                        self.client_commands.store(seq, cmd.clone());
                        out.commands.push((seq, cmd));
                    }
                    op => {
                        out.delta = op == ClientOp::Move;
                        let count = msg.read_byte().unwrap();
                        let key = self.gamestate.checksum_feed as u32
                            ^ message_ack
                            ^ self.protocol.hash.hash_key(command.as_bytes());
                        let mut old_cmd = UserCmd::default();
                        let mut old_eyes = UserEyes::default();
                        for _ in 0..count {
                            old_cmd = self
                                .protocol
                                .input
                                .read_usercmd(&mut msg, key, &old_cmd)
                                .unwrap();
                            old_eyes = self.protocol.input.read_eyes(&mut msg, &old_eyes).unwrap();
                            out.usercmds.push(old_cmd);
                        }
                    }
                }
            }

            while self.client_commands.next_pending().is_some() {}
            Some(out)
        }

        /// Send one in-band message whose body is written by `body`.
        fn send<F>(&mut self, body: F)
        where
            F: FnOnce(&mut Msg, &Protocol, &GameState),
        {
            let ack = self.client_commands.sequence();
            let mut stream = DynamicStream::new();
            {
                let mut msg = Msg::new(&mut stream);
                msg.write_long(ack as i32).unwrap();
                for (seq, cmd) in self.commands.pending() {
                    msg.write_byte(ServerOp::ServerCommand as u8).unwrap();
                    msg.write_long(seq as i32).unwrap();
                    self.protocol
                        .string
                        .write_string(&mut msg, cmd, MAX_STRING_CHARS)
                        .unwrap();
                }
                body(&mut msg, &self.protocol, &self.gamestate);
                msg.write_byte(ServerOp::Eof as u8).unwrap();
                msg.flush().unwrap();
            }

            let sequence = self.chan.outgoing_sequence();
            let mut message = vec![0; SEQUENCE_LEN];
            LittleEndian::write_u32(&mut message, sequence);
            message.extend(stream.into_inner());

            let command = self.client_commands.raw_command_at(ack).to_owned();
            self.encoding.apply_incoming(
                sequence,
                command.as_bytes(),
                &mut message,
                SEQUENCE_LEN + DECODE_START,
            );

            for packet in self.chan.transmit(&message[SEQUENCE_LEN..]).unwrap() {
                self.comm.send(&packet).unwrap();
            }
        }

        fn send_gamestate(&mut self) {
            self.send(|msg, protocol, gamestate| {
                msg.write_byte(ServerOp::GameState as u8).unwrap();
                gamestate.write(msg, protocol).unwrap();
            });
        }

        fn send_snapshot(&mut self, from: Option<(&Frame, u8)>, to: &Frame) {
            self.send(|msg, protocol, gamestate| {
                msg.write_byte(ServerOp::Snapshot as u8).unwrap();
                write_snapshot(msg, protocol, gamestate, from, to).unwrap();
            });
        }
    }

    fn entity(number: i32, x: f32) -> EntityState {
        EntityState {
            number,
            model_index: 2,
            net_origin: [x, 0.0, 0.0],
            ..Default::default()
        }
    }

    fn frame(server_time: i32, origin: [f32; 3], entities: Vec<EntityState>) -> Frame {
        Frame {
            server_time,
            areamask: vec![0xFF],
            ps: PlayerState {
                command_time: server_time,
                client_num: 2,
                origin,
                ..Default::default()
            },
            entities,
            ..Default::default()
        }
    }

    fn ms(t: i64) -> Duration {
        Duration::milliseconds(t)
    }

    fn settings(version: u32) -> ClientSettings {
        ClientSettings {
            protocol: version,
            qport: 4242,
            ..Default::default()
        }
    }

    fn userinfo() -> InfoString {
        let mut info = InfoString::new();
        info.set("name", "Pvt. Test");
        info.set("rate", "25000");
        info
    }

    /// Run the handshake up to the first in-band packet from the client.
    fn connect(
        version: u32,
        handler: &mut Recorder,
    ) -> (ClientSession<Loopback>, TestServer) {
        let (client_end, server_end) = Loopback::pair();
        let mut session = ClientSession::new(client_end, settings(version), userinfo()).unwrap();
        let mut server =
            TestServer::new(server_end, Protocol::for_version(version).unwrap(), 4242);

        session.connect();
        session.frame(ms(0), handler).unwrap();
        assert_eq!(session.state(), ConnectionState::Challenging);
        assert_eq!(server.receive_request(), Request::GetChallenge);
        server.respond(Response::Challenge {
            challenge: CHALLENGE,
        });

        session.frame(ms(10), handler).unwrap();
        assert_eq!(session.state(), ConnectionState::Connecting);
        match server.receive_request() {
            Request::Connect { userinfo } => {
                assert_eq!(userinfo.get("name"), Some("Pvt. Test"));
                assert_eq!(userinfo.get("qport"), Some("4242"));
                assert_eq!(userinfo.get("protocol"), Some(version.to_string().as_str()));
                assert_eq!(
                    userinfo.get("challenge"),
                    Some((CHALLENGE as i32).to_string().as_str())
                );
            }
            r => panic!("expected connect, got {:?}", r),
        }
        server.respond(Response::Connect);

        (session, server)
    }

    #[test]
    fn test_session_loopback() {
        let _ = env_logger::try_init();

        for version in [8, 17].iter() {
            let mut handler = Recorder::default();
            let (mut session, mut server) = connect(*version, &mut handler);

            session.add_reliable_command("say hi");
            session.frame(ms(20), &mut handler).unwrap();
            assert_eq!(session.state(), ConnectionState::Connected);

            let packet = server.receive_packet().unwrap();
            assert_eq!(packet.commands, vec![(1, "say hi".to_owned())]);
            assert!(packet.usercmds.is_empty());

            server.send_gamestate();
            session.frame(ms(30), &mut handler).unwrap();
            assert_eq!(session.state(), ConnectionState::Primed);
            assert_eq!(handler.gamestates, 1);
            assert_eq!(handler.config_strings.len(), 5);
            assert_eq!(session.server_id(), 1234);
            assert_eq!(session.client_num(), 2);
            assert_eq!(session.reliable().acknowledge(), 1);
            assert_eq!(
                session.gamestate().config_string(CS_MODELS + 2),
                Some("models/player/allied_airborne.tik")
            );

            let first = frame(1000, [100.0, 200.0, 32.0], vec![entity(3, 64.0)]);
            server.send_snapshot(None, &first);
            session.frame(ms(60), &mut handler).unwrap();
            assert_eq!(session.state(), ConnectionState::Active);
            assert_eq!(session.server_time(), 1000);
            assert_eq!(handler.snapshots.len(), 1);
            assert_eq!(handler.snapshots[0].ping, 40);

            let packet = server.receive_packet().unwrap();
            assert_eq!(packet.server_id, 1234);
            assert_eq!(packet.message_ack, 2);
            assert!(packet.commands.is_empty());
            assert!(packet.delta);
            assert_eq!(
                packet.usercmds.iter().map(|c| c.server_time).collect::<Vec<_>>(),
                vec![0, 1000]
            );

            server.commands.add_command("stufftext \"say hello\"");
            server.commands.add_command("print \"welcome\"");
            let second = frame(
                1050,
                [110.0, 200.0, 32.0],
                vec![entity(3, 80.0), entity(9, 16.0)],
            );
            server.send_snapshot(Some((&first, 1)), &second);
            session.frame(ms(110), &mut handler).unwrap();

            assert_eq!(handler.stufftext, vec!["say hello".to_owned()]);
            assert_eq!(handler.commands, vec![vec!["print".to_owned(), "welcome".to_owned()]]);

            let snap = session.current_snapshot().unwrap();
            assert_eq!(snap.message_num, 3);
            assert_eq!(snap.delta_num, Some(2));
            assert_eq!(snap.ping, 50);
            assert_eq!(snap.frame, second);

            let packet = server.receive_packet().unwrap();
            assert_eq!(packet.message_ack, 3);
            assert_eq!(packet.command_ack, 2);
            assert_eq!(packet.usercmds.last().map(|c| c.server_time), Some(1050));
        }
    }

    #[test]
    fn test_session_drops_bad_message() {
        let mut handler = Recorder::default();
        let (mut session, mut server) = connect(17, &mut handler);
        session.frame(ms(20), &mut handler).unwrap();
        server.receive_packet().unwrap();

        server.send(|msg, _, _| msg.write_byte(0x63).unwrap());
        session.frame(ms(30), &mut handler).unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);

        // the channel survives
        server.send_gamestate();
        session.frame(ms(40), &mut handler).unwrap();
        assert_eq!(session.state(), ConnectionState::Primed);
    }

    #[test]
    fn test_session_config_string_update() {
        let mut handler = Recorder::default();
        let (mut session, mut server) = connect(17, &mut handler);
        session.frame(ms(20), &mut handler).unwrap();
        server.send_gamestate();
        session.frame(ms(30), &mut handler).unwrap();
        handler.config_strings.clear();

        let net_index = server
            .protocol
            .header
            .config_string_to_net(CS_MODELS + 3)
            .unwrap();
        server
            .commands
            .add_command(format!("cs {} \"models/weapons/m1_garand.tik\"", net_index));
        // an unchanged value is not reported again
        server.commands.add_command(format!("cs {} \"*1\"", net_index - 2));
        server.send(|_, _, _| ());
        session.frame(ms(40), &mut handler).unwrap();

        assert_eq!(
            handler.config_strings,
            vec![(CS_MODELS + 3, "models/weapons/m1_garand.tik".to_owned())]
        );
    }

    #[test]
    fn test_session_download() {
        let mut handler = Recorder::default();
        let (mut session, mut server) = connect(17, &mut handler);
        session.frame(ms(20), &mut handler).unwrap();
        server.receive_packet().unwrap();

        session.start_download("main/pak5.pk3").unwrap();
        session.frame(ms(60), &mut handler).unwrap();
        let packet = server.receive_packet().unwrap();
        assert_eq!(packet.commands, vec![(1, "download main/pak5.pk3".to_owned())]);

        server.send(|msg, _, _| {
            for (block, chunk) in [&b"PK\x03"[..], &b"\x04"[..], &[][..]].iter().enumerate() {
                msg.write_byte(ServerOp::Download as u8).unwrap();
                write_block(msg, block as u16, 4, chunk, None).unwrap();
            }
        });
        session.frame(ms(70), &mut handler).unwrap();
        assert_eq!(
            handler.downloads,
            vec![("main/pak5.pk3".to_owned(), b"PK\x03\x04".to_vec())]
        );

        // back to heartbeat pacing once the transfer is over
        session.frame(ms(100), &mut handler).unwrap();
        assert!(server.receive_packet().is_none());
        session.frame(ms(1100), &mut handler).unwrap();
        let packet = server.receive_packet().unwrap();
        assert_eq!(
            packet.commands,
            vec![
                (2, "nextdl 1".to_owned()),
                (3, "nextdl 2".to_owned()),
                (4, "nextdl 3".to_owned()),
            ]
        );
    }

    #[test]
    fn test_session_server_disconnect() {
        let mut handler = Recorder::default();
        let (mut session, mut server) = connect(17, &mut handler);
        session.frame(ms(20), &mut handler).unwrap();

        server.commands.add_command("disconnect \"Server shutting down\"");
        server.send(|_, _, _| ());
        let err = session.frame(ms(30), &mut handler).unwrap_err();

        assert_eq!(
            err.kind(),
            ClientErrorKind::Disconnected {
                reason: "Server shutting down".to_owned()
            }
        );
        assert_eq!(handler.disconnect, Some("Server shutting down".to_owned()));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_session_rejected() {
        let (client_end, mut server_end) = Loopback::pair();
        let mut handler = Recorder::default();
        let mut session = ClientSession::new(client_end, settings(17), userinfo()).unwrap();

        session.connect();
        session.frame(ms(0), &mut handler).unwrap();
        server_end
            .send(
                &Response::DropError {
                    message: "Server is full.".to_owned(),
                }
                .to_bytes(),
            )
            .unwrap();

        let err = session.frame(ms(10), &mut handler).unwrap_err();
        assert_eq!(
            err.kind(),
            ClientErrorKind::ConnectionRejected {
                message: "Server is full.".to_owned()
            }
        );
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_session_connect_before_challenge() {
        let (client_end, mut server_end) = Loopback::pair();
        let mut handler = Recorder::default();
        let mut session = ClientSession::new(client_end, settings(17), userinfo()).unwrap();

        assert_eq!(
            session.start_download("maps/obj/obj_team2.bsp").unwrap_err().kind(),
            ClientErrorKind::NotConnected
        );

        session.connect();
        session.frame(ms(0), &mut handler).unwrap();
        server_end.send(&Response::Connect.to_bytes()).unwrap();

        let err = session.frame(ms(10), &mut handler).unwrap_err();
        assert_eq!(err.kind(), ClientErrorKind::InvalidConnectResponse);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_session_no_response() {
        let (client_end, server_end) = Loopback::pair();
        let mut handler = Recorder::default();
        let mut session = ClientSession::new(client_end, settings(17), userinfo()).unwrap();

        session.connect();
        for i in 0..MAX_CONNECT_ATTEMPTS as i64 {
            session.frame(ms(i * RETRANSMIT_TIMEOUT), &mut handler).unwrap();
            // nothing resent before the timeout
            session
                .frame(ms(i * RETRANSMIT_TIMEOUT + 100), &mut handler)
                .unwrap();
        }
        assert_eq!(server_end.pending(), MAX_CONNECT_ATTEMPTS as usize);

        let err = session
            .frame(ms(MAX_CONNECT_ATTEMPTS as i64 * RETRANSMIT_TIMEOUT), &mut handler)
            .unwrap_err();
        assert_eq!(err.kind(), ClientErrorKind::NoResponse);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
