//! Scripted protocol engine.
//!
//! [`ScriptedEngine`] implements [`ProtocolEngine`] in memory. Every outbound
//! call is appended to a log of [`EngineCall`]s; inbound traffic is scripted
//! by pushing [`ProtocolEvent`]s and connection errors, which the next
//! `recv` delivers in order.
//!
//! `recv` blocks on a condition variable until something is queued, the
//! engine is disconnected, or the timeout expires. Nothing here sleeps.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use snapz_session::{
    ChatHandle, ConnectionError, ConnectionState, DataForm, EngineError, Jid, JoinOptions,
    MessageEventKind, ProtocolEngine, ProtocolEvent, RoomHandle, RoomOperation,
};
use tracing::trace;

/// Outbound call recorded by the [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `certificate_verdict`
    CertificateVerdict {
        /// Whether the certificate was accepted
        accepted: bool,
    },
    /// `open_chat`
    OpenChat {
        /// Peer the session was opened for
        peer: Jid,
        /// Handle handed out
        handle: ChatHandle,
    },
    /// `close_chat`
    CloseChat(ChatHandle),
    /// `send_chat`
    SendChat {
        /// Session
        chat: ChatHandle,
        /// Body
        body: String,
        /// Subject
        subject: String,
    },
    /// `raise_chat_event`
    RaiseChatEvent {
        /// Session
        chat: ChatHandle,
        /// Event raised
        kind: MessageEventKind,
    },
    /// `open_room`
    OpenRoom {
        /// Occupant address
        occupant: Jid,
        /// Handle handed out
        handle: RoomHandle,
    },
    /// `close_room`
    CloseRoom(RoomHandle),
    /// `join_room`
    JoinRoom {
        /// Room
        room: RoomHandle,
        /// Join parameters
        options: JoinOptions,
    },
    /// `leave_room`
    LeaveRoom {
        /// Room
        room: RoomHandle,
        /// Reason
        reason: String,
    },
    /// `destroy_room`
    DestroyRoom {
        /// Room
        room: RoomHandle,
        /// Reason
        reason: String,
    },
    /// `acknowledge_instant_room`
    AcknowledgeInstantRoom(RoomHandle),
    /// `cancel_room_creation`
    CancelRoomCreation(RoomHandle),
    /// `request_room_config`
    RequestRoomConfig(RoomHandle),
    /// `submit_room_config`
    SubmitRoomConfig {
        /// Room
        room: RoomHandle,
        /// Submitted form
        form: DataForm,
    },
    /// `set_room_subject`
    SetRoomSubject {
        /// Room
        room: RoomHandle,
        /// Subject
        subject: String,
    },
    /// `send_room_message`
    SendRoomMessage {
        /// Room
        room: RoomHandle,
        /// Body
        body: String,
    },
    /// `invite`
    Invite {
        /// Room
        room: RoomHandle,
        /// Invitee
        invitee: Jid,
        /// Reason
        reason: String,
    },
    /// `kick`
    Kick {
        /// Room
        room: RoomHandle,
        /// Occupant nick
        nick: String,
        /// Reason
        reason: String,
    },
    /// `ban`
    Ban {
        /// Room
        room: RoomHandle,
        /// Occupant nick
        nick: String,
        /// Reason
        reason: String,
    },
    /// `unban`
    Unban {
        /// Room
        room: RoomHandle,
        /// Occupant nick
        nick: String,
    },
    /// `request_room_items`
    RequestRoomItems(RoomHandle),
    /// `decline_invitation`
    DeclineInvitation {
        /// Room address
        room: Jid,
        /// Inviter address
        inviter: Jid,
        /// Reason
        reason: String,
    },
}

enum Inbound {
    Event(ProtocolEvent),
    Error(ConnectionError),
}

struct Script {
    state: ConnectionState,
    inbound: VecDeque<Inbound>,
    calls: Vec<EngineCall>,
    next_handle: u64,
    live_chats: HashSet<ChatHandle>,
    live_rooms: HashMap<RoomHandle, String>,
    connect_error: Option<EngineError>,
    refuse_sessions: bool,
    auto_ack_instant_rooms: bool,
    delivering: bool,
}

/// In-memory [`ProtocolEngine`] driven by a test script.
pub struct ScriptedEngine {
    script: Mutex<Script>,
    changed: Condvar,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    /// Disconnected engine with an empty script.
    ///
    /// Instant-room acknowledgements are answered with a successful
    /// `CreateInstantRoom` result, as a server would.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                state: ConnectionState::Disconnected,
                inbound: VecDeque::new(),
                calls: Vec::new(),
                next_handle: 1,
                live_chats: HashSet::new(),
                live_rooms: HashMap::new(),
                connect_error: None,
                refuse_sessions: false,
                auto_ack_instant_rooms: true,
                delivering: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Make `connect` fail with `error`.
    #[must_use]
    pub fn failing_connect(self, error: EngineError) -> Self {
        self.script.lock().connect_error = Some(error);
        self
    }

    /// Refuse to open chat sessions and rooms.
    pub fn refuse_sessions(&self, refuse: bool) {
        self.script.lock().refuse_sessions = refuse;
    }

    /// Answer instant-room acknowledgements automatically.
    pub fn auto_ack_instant_rooms(&self, enabled: bool) {
        self.script.lock().auto_ack_instant_rooms = enabled;
    }

    /// Queue an inbound event.
    pub fn push(&self, event: ProtocolEvent) {
        self.enqueue(Inbound::Event(event));
    }

    /// Queue a connection error for the next receive.
    pub fn push_error(&self, error: ConnectionError) {
        self.enqueue(Inbound::Error(error));
    }

    /// Force the reported connection state.
    pub fn set_state(&self, state: ConnectionState) {
        self.script.lock().state = state;
        self.changed.notify_all();
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.script.lock().calls.clone()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.script.lock().calls)
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Chat handles opened and not yet closed.
    pub fn live_chats(&self) -> usize {
        self.script.lock().live_chats.len()
    }

    /// Room handles opened and not yet closed.
    pub fn live_rooms(&self) -> usize {
        self.script.lock().live_rooms.len()
    }

    /// Handle of the live room called `name`.
    pub fn room_handle(&self, name: &str) -> Option<RoomHandle> {
        self.script
            .lock()
            .live_rooms
            .iter()
            .find_map(|(handle, room)| (room == name).then_some(*handle))
    }

    /// Wait until every queued inbound item has been delivered and no
    /// receive is dispatching. Returns false on timeout.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut script = self.script.lock();
        while !script.inbound.is_empty() || script.delivering {
            if self.changed.wait_until(&mut script, deadline).timed_out() {
                return false;
            }
        }
        true
    }

    fn enqueue(&self, inbound: Inbound) {
        self.script.lock().inbound.push_back(inbound);
        self.changed.notify_all();
    }

    fn record(&self, call: EngineCall) {
        trace!(?call, "engine call");
        self.script.lock().calls.push(call);
    }

    fn next_handle(script: &mut Script) -> u64 {
        let handle = script.next_handle;
        script.next_handle += 1;
        handle
    }
}

impl ProtocolEngine for ScriptedEngine {
    fn connect(&self) -> Result<(), EngineError> {
        let mut script = self.script.lock();
        script.calls.push(EngineCall::Connect);
        if let Some(error) = script.connect_error.clone() {
            return Err(error);
        }
        script.state = ConnectionState::Connected;
        script.inbound.push_back(Inbound::Event(ProtocolEvent::Connect));
        drop(script);
        self.changed.notify_all();
        Ok(())
    }

    fn disconnect(&self) {
        let mut script = self.script.lock();
        script.calls.push(EngineCall::Disconnect);
        script.state = ConnectionState::Disconnected;
        script.inbound.clear();
        drop(script);
        self.changed.notify_all();
    }

    fn state(&self) -> ConnectionState {
        self.script.lock().state
    }

    fn certificate_verdict(&self, accepted: bool) {
        let mut script = self.script.lock();
        script.calls.push(EngineCall::CertificateVerdict { accepted });
        if !accepted {
            // Handshake aborted: the next receive reports the TLS failure.
            script.inbound.push_back(Inbound::Event(ProtocolEvent::Disconnect(
                ConnectionError::Tls("certificate rejected".to_string()),
            )));
            script.inbound.push_back(Inbound::Error(ConnectionError::NotConnected));
        }
        drop(script);
        self.changed.notify_all();
    }

    fn recv(
        &self,
        timeout: Option<Duration>,
        sink: &mut dyn FnMut(ProtocolEvent),
    ) -> Result<(), ConnectionError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut script = self.script.lock();

        while script.inbound.is_empty() {
            if script.state == ConnectionState::Disconnected {
                return Err(ConnectionError::NotConnected);
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut script, deadline).timed_out() {
                        return Ok(());
                    }
                },
                None => self.changed.wait(&mut script),
            }
        }

        let mut events = Vec::new();
        let mut outcome = Ok(());
        while let Some(inbound) = script.inbound.pop_front() {
            match inbound {
                Inbound::Event(event) => events.push(event),
                Inbound::Error(error) => {
                    outcome = Err(error);
                    break;
                },
            }
        }
        script.delivering = true;
        drop(script);

        // Sink runs unlocked: dispatch calls back into the engine.
        for event in events {
            sink(event);
        }

        self.script.lock().delivering = false;
        self.changed.notify_all();
        outcome
    }

    fn open_chat(&self, peer: &Jid) -> Result<ChatHandle, EngineError> {
        let mut script = self.script.lock();
        if script.refuse_sessions {
            return Err(EngineError::Session(format!("refused chat with {peer}")));
        }
        let handle = ChatHandle(Self::next_handle(&mut script));
        script.live_chats.insert(handle);
        script.calls.push(EngineCall::OpenChat { peer: peer.clone(), handle });
        Ok(handle)
    }

    fn close_chat(&self, chat: ChatHandle) {
        let mut script = self.script.lock();
        script.live_chats.remove(&chat);
        script.calls.push(EngineCall::CloseChat(chat));
    }

    fn send_chat(&self, chat: ChatHandle, body: &str, subject: &str) {
        self.record(EngineCall::SendChat {
            chat,
            body: body.to_string(),
            subject: subject.to_string(),
        });
    }

    fn raise_chat_event(&self, chat: ChatHandle, kind: MessageEventKind) {
        self.record(EngineCall::RaiseChatEvent { chat, kind });
    }

    fn open_room(&self, occupant: &Jid) -> Result<RoomHandle, EngineError> {
        let mut script = self.script.lock();
        if script.refuse_sessions {
            return Err(EngineError::Session(format!("refused room {occupant}")));
        }
        let handle = RoomHandle(Self::next_handle(&mut script));
        script.live_rooms.insert(handle, occupant.user().to_string());
        script.calls.push(EngineCall::OpenRoom { occupant: occupant.clone(), handle });
        Ok(handle)
    }

    fn close_room(&self, room: RoomHandle) {
        let mut script = self.script.lock();
        script.live_rooms.remove(&room);
        script.calls.push(EngineCall::CloseRoom(room));
    }

    fn join_room(&self, room: RoomHandle, options: &JoinOptions) {
        self.record(EngineCall::JoinRoom { room, options: options.clone() });
    }

    fn leave_room(&self, room: RoomHandle, reason: &str) {
        self.record(EngineCall::LeaveRoom { room, reason: reason.to_string() });
    }

    fn destroy_room(&self, room: RoomHandle, reason: &str) {
        self.record(EngineCall::DestroyRoom { room, reason: reason.to_string() });
    }

    fn acknowledge_instant_room(&self, room: RoomHandle) {
        let mut script = self.script.lock();
        script.calls.push(EngineCall::AcknowledgeInstantRoom(room));
        if script.auto_ack_instant_rooms {
            if let Some(name) = script.live_rooms.get(&room).cloned() {
                script.inbound.push_back(Inbound::Event(ProtocolEvent::RoomConfigResult {
                    room: name,
                    success: true,
                    operation: RoomOperation::CreateInstantRoom,
                }));
            }
        }
        drop(script);
        self.changed.notify_all();
    }

    fn cancel_room_creation(&self, room: RoomHandle) {
        self.record(EngineCall::CancelRoomCreation(room));
    }

    fn request_room_config(&self, room: RoomHandle) {
        self.record(EngineCall::RequestRoomConfig(room));
    }

    fn submit_room_config(&self, room: RoomHandle, form: DataForm) {
        self.record(EngineCall::SubmitRoomConfig { room, form });
    }

    fn set_room_subject(&self, room: RoomHandle, subject: &str) {
        self.record(EngineCall::SetRoomSubject { room, subject: subject.to_string() });
    }

    fn send_room_message(&self, room: RoomHandle, body: &str) {
        self.record(EngineCall::SendRoomMessage { room, body: body.to_string() });
    }

    fn invite(&self, room: RoomHandle, invitee: &Jid, reason: &str) {
        self.record(EngineCall::Invite {
            room,
            invitee: invitee.clone(),
            reason: reason.to_string(),
        });
    }

    fn kick(&self, room: RoomHandle, nick: &str, reason: &str) {
        self.record(EngineCall::Kick { room, nick: nick.to_string(), reason: reason.to_string() });
    }

    fn ban(&self, room: RoomHandle, nick: &str, reason: &str) {
        self.record(EngineCall::Ban { room, nick: nick.to_string(), reason: reason.to_string() });
    }

    fn unban(&self, room: RoomHandle, nick: &str) {
        self.record(EngineCall::Unban { room, nick: nick.to_string() });
    }

    fn request_room_items(&self, room: RoomHandle) {
        self.record(EngineCall::RequestRoomItems(room));
    }

    fn decline_invitation(&self, room: &Jid, inviter: &Jid, reason: &str) {
        self.record(EngineCall::DeclineInvitation {
            room: room.clone(),
            inviter: inviter.clone(),
            reason: reason.to_string(),
        });
    }
}
