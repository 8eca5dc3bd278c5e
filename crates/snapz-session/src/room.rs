//! Group-chat rooms and their creation lifecycle.
//!
//! Each room the client joins is tracked by a [`GroupChatSession`] keyed by
//! room name. Creation progress only moves forward:
//!
//! ```text
//! None ──(we created it, app accepts defaults)──────────────► Complete
//!   │                                                            ▲
//!   └──(we created it, app defers)──► Pending ──(form / ack)─────┘
//! ```
//!
//! Room commands are only valid while the session exists and is joined;
//! otherwise they return false without touching the engine.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    engine::{JoinOptions, ProtocolEngine, RoomHandle},
    form::{DataForm, GroupChatConfig, build_config_submission},
    identity::{Jid, RoomJid},
    registry::SessionRegistry,
};

/// Room creation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum CreationState {
    /// No creation observed
    #[default]
    None,
    /// We created the room; waiting for the application's configuration
    Pending,
    /// Room usable with default or custom configuration
    Complete,
}

/// A room the client has attempted to join.
///
/// Dropping the session leaves the room if still joined, then closes the
/// engine-side room object.
#[derive(Debug)]
pub struct GroupChatSession<E: ProtocolEngine> {
    name: String,
    is_joined: bool,
    creation_state: CreationState,
    pending_config: Option<GroupChatConfig>,
    handle: RoomHandle,
    engine: Arc<E>,
}

impl<E: ProtocolEngine> GroupChatSession<E> {
    /// Room name (registry key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the client is currently joined.
    pub fn is_joined(&self) -> bool {
        self.is_joined
    }

    /// Creation progress.
    pub fn creation_state(&self) -> CreationState {
        self.creation_state
    }

    /// Engine-side handle.
    pub fn handle(&self) -> RoomHandle {
        self.handle
    }

    fn advance(&mut self, next: CreationState) {
        if next > self.creation_state {
            info!(room = %self.name, from = ?self.creation_state, to = ?next, "room creation state");
            self.creation_state = next;
        }
    }
}

impl<E: ProtocolEngine> Drop for GroupChatSession<E> {
    fn drop(&mut self) {
        if self.is_joined {
            self.is_joined = false;
            self.engine.leave_room(self.handle, "");
        }
        debug!(room = %self.name, "closing room");
        self.engine.close_room(self.handle);
    }
}

/// Outcome of a configuration form arriving for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    /// No session for the room
    UnknownRoom,
    /// Form handled; creation was not pending
    Handled {
        /// Whether a complete submission was sent
        submitted: bool,
    },
    /// Form handled and pending creation moved to complete
    Created {
        /// Whether a complete submission was sent
        submitted: bool,
    },
}

/// Registry of group-chat sessions.
pub struct RoomSessions<E: ProtocolEngine> {
    registry: SessionRegistry<GroupChatSession<E>>,
    engine: Arc<E>,
    service: String,
    nick: String,
    domain: String,
}

impl<E: ProtocolEngine> RoomSessions<E> {
    /// Rooms on conference `service`, joined as `nick`. Invitees are
    /// addressed on the account's `domain`.
    pub fn new(
        engine: Arc<E>,
        service: impl Into<String>,
        nick: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            engine,
            service: service.into(),
            nick: nick.into(),
            domain: domain.into(),
        }
    }

    /// Conference service hosting the rooms.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Join `room`, creating its session.
    ///
    /// If a session already exists nothing is sent and its joined flag is
    /// returned.
    pub fn begin(&self, room: &str, options: &JoinOptions) -> bool {
        let mut rooms = self.registry.lock();
        if let Some(session) = rooms.find(room) {
            return session.is_joined;
        }

        let address = match RoomJid::new(room, &self.service) {
            Ok(address) => address,
            Err(err) => {
                warn!(room, error = %err, "invalid room name");
                return false;
            },
        };
        let handle = match self.engine.open_room(&address.occupant(&self.nick)) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(room = %address, error = %err, "failed to open room");
                return false;
            },
        };

        let session = rooms.insert(room, GroupChatSession {
            name: room.to_string(),
            is_joined: false,
            creation_state: CreationState::None,
            pending_config: None,
            handle,
            engine: Arc::clone(&self.engine),
        });
        self.engine.join_room(handle, options);
        session.is_joined = true;
        info!(room = %address, nick = %self.nick, "joining room");
        true
    }

    /// Leave `room` if joined, then drop its session.
    ///
    /// Returns false if there was no session.
    pub fn end(&self, room: &str, reason: &str) -> bool {
        let mut rooms = self.registry.lock();
        let Some(mut session) = rooms.take(room) else {
            return false;
        };
        if session.is_joined {
            session.is_joined = false;
            self.engine.leave_room(session.handle, reason);
        }
        info!(room, "left room");
        true
    }

    /// Destroy `room` on the server. The session stays registered, no
    /// longer joined.
    pub fn destroy(&self, room: &str, reason: &str) -> bool {
        self.with_joined(room, |engine, session| {
            session.is_joined = false;
            engine.destroy_room(session.handle, reason);
        })
    }

    /// Configure `room`.
    ///
    /// Without a config, a pending creation is acknowledged as an instant
    /// room (false if creation is not pending). With a config, it is stored
    /// for this room and the configuration form is requested.
    pub fn configure(&self, room: &str, config: Option<GroupChatConfig>) -> bool {
        let mut rooms = self.registry.lock();
        let Some(session) = rooms.find_mut(room).filter(|s| s.is_joined) else {
            return false;
        };
        match config {
            None if session.creation_state == CreationState::Pending => {
                self.engine.acknowledge_instant_room(session.handle);
                true
            },
            None => false,
            Some(config) => {
                session.pending_config = Some(config);
                self.engine.request_room_config(session.handle);
                true
            },
        }
    }

    /// Cancel creation of a locked room.
    pub fn cancel_creation(&self, room: &str) -> bool {
        self.with_joined(room, |engine, session| engine.cancel_room_creation(session.handle))
    }

    /// Change the room subject.
    pub fn set_subject(&self, room: &str, subject: &str) -> bool {
        self.with_joined(room, |engine, session| engine.set_room_subject(session.handle, subject))
    }

    /// Send a message to the room. An empty body is not sent and reports
    /// success.
    pub fn send_message(&self, room: &str, body: &str) -> bool {
        if body.is_empty() {
            return true;
        }
        self.with_joined(room, |engine, session| engine.send_room_message(session.handle, body))
    }

    /// Invite `user` of our own domain to the room.
    pub fn invite(&self, room: &str, user: &str, reason: &str) -> bool {
        let invitee = Jid::peer(user, &self.domain, None);
        self.with_joined(room, |engine, session| engine.invite(session.handle, &invitee, reason))
    }

    /// Kick an occupant.
    pub fn kick(&self, room: &str, nick: &str, reason: &str) -> bool {
        self.with_joined(room, |engine, session| engine.kick(session.handle, nick, reason))
    }

    /// Ban an occupant.
    pub fn ban(&self, room: &str, nick: &str, reason: &str) -> bool {
        self.with_joined(room, |engine, session| engine.ban(session.handle, nick, reason))
    }

    /// Reset an occupant's affiliation to none.
    pub fn unban(&self, room: &str, nick: &str) -> bool {
        self.with_joined(room, |engine, session| engine.unban(session.handle, nick))
    }

    /// Request the occupant list.
    pub fn list_members(&self, room: &str) -> bool {
        self.with_joined(room, |engine, session| engine.request_room_items(session.handle))
    }

    /// Send a decline for an invitation to `room` from `user`.
    pub fn decline_invitation(&self, room: &str, user: &str, reason: &str) -> bool {
        let room = Jid::peer(room, &self.service, None);
        let inviter = Jid::peer(user, &self.domain, None);
        self.engine.decline_invitation(&room, &inviter, reason);
        true
    }

    /// Whether a session exists for `room`.
    pub fn contains(&self, room: &str) -> bool {
        self.registry.lock().contains(room)
    }

    /// Whether the client is joined to `room`.
    pub fn is_joined(&self, room: &str) -> bool {
        self.registry.lock().find(room).is_some_and(|s| s.is_joined)
    }

    /// Creation progress of `room`.
    pub fn creation_state(&self, room: &str) -> Option<CreationState> {
        self.registry.lock().find(room).map(|s| s.creation_state)
    }

    /// Number of tracked rooms.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no room is tracked.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Leave and close every room.
    pub fn dispose_all(&self) -> usize {
        self.registry.dispose_all()
    }

    /// The server reports we created `room`.
    ///
    /// With `accepted` the room is acknowledged as an instant room and
    /// marked complete; otherwise creation becomes pending. Returns false
    /// for an unknown room.
    pub(crate) fn record_creation(&self, room: &str, accepted: bool) -> bool {
        let mut rooms = self.registry.lock();
        let Some(session) = rooms.find_mut(room) else {
            return false;
        };
        if accepted {
            session.advance(CreationState::Complete);
            self.engine.acknowledge_instant_room(session.handle);
        } else {
            session.advance(CreationState::Pending);
        }
        true
    }

    /// The instant-room acknowledgement completed. Returns false for an
    /// unknown room.
    pub(crate) fn complete_creation(&self, room: &str) -> bool {
        let mut rooms = self.registry.lock();
        match rooms.find_mut(room) {
            Some(session) => {
                session.advance(CreationState::Complete);
                true
            },
            None => false,
        }
    }

    /// Fill and submit the configuration form the server sent for `room`.
    ///
    /// The stored config is consumed; a form arriving without one is filled
    /// from defaults. Only a complete submission is sent. A pending creation
    /// completes either way.
    pub(crate) fn apply_config_form(&self, room: &str, advertised: &DataForm) -> FormOutcome {
        let mut rooms = self.registry.lock();
        let Some(session) = rooms.find_mut(room) else {
            return FormOutcome::UnknownRoom;
        };

        let config = session.pending_config.take().unwrap_or_default();
        let submission = build_config_submission(&config, advertised);
        let submitted = submission.complete;
        match submission.into_complete() {
            Some(form) => self.engine.submit_room_config(session.handle, form),
            None => warn!(room, "server form lacks configuration fields; not submitting"),
        }

        if session.creation_state == CreationState::Pending {
            session.advance(CreationState::Complete);
            FormOutcome::Created { submitted }
        } else {
            FormOutcome::Handled { submitted }
        }
    }

    fn with_joined(&self, room: &str, action: impl FnOnce(&E, &mut GroupChatSession<E>)) -> bool {
        let mut rooms = self.registry.lock();
        match rooms.find_mut(room) {
            Some(session) if session.is_joined => {
                action(self.engine.as_ref(), session);
                true
            },
            _ => false,
        }
    }
}
