//! Protocol event dispatch.
//!
//! [`Dispatcher::dispatch`] is the single entry point for raw engine events.
//! Each event either mutates session state, produces an outward
//! [`SessionEvent`], or both. When both, state is updated first and the
//! handler is notified after, with no registry lock held.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info, warn};

use crate::{
    chat::ChatSessions,
    engine::{MessageEventKind, PresenceKind, ProtocolEngine, RoomOperation},
    error::ConnectionError,
    event::{EventHandler, Invite, ProtocolEvent, SessionEvent},
    room::{FormOutcome, RoomSessions},
};

/// Owns both session registries and routes engine events through them.
pub struct Dispatcher<E: ProtocolEngine, H: EventHandler> {
    engine: Arc<E>,
    chats: ChatSessions<E>,
    rooms: RoomSessions<E>,
    handler: H,
    decline_invitations: bool,
    // Set once Disconnected has been delivered for the current connection.
    disconnect_reported: AtomicBool,
}

impl<E: ProtocolEngine, H: EventHandler> Dispatcher<E, H> {
    /// Dispatcher over fresh registries.
    ///
    /// With `decline_invitations`, invitations the handler refuses are
    /// answered with a decline automatically.
    pub fn new(
        engine: Arc<E>,
        chats: ChatSessions<E>,
        rooms: RoomSessions<E>,
        handler: H,
        decline_invitations: bool,
    ) -> Self {
        Self {
            engine,
            chats,
            rooms,
            handler,
            decline_invitations,
            disconnect_reported: AtomicBool::new(false),
        }
    }

    /// Direct-chat registry.
    pub fn chats(&self) -> &ChatSessions<E> {
        &self.chats
    }

    /// Room registry.
    pub fn rooms(&self) -> &RoomSessions<E> {
        &self.rooms
    }

    /// Application handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Protocol engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Dispose every room, then every chat session.
    pub fn dispose_sessions(&self) {
        let rooms = self.rooms.dispose_all();
        let chats = self.chats.dispose_all();
        debug!(rooms, chats, "disposed sessions");
    }

    /// Deliver `Disconnected` with `error` unless the engine already
    /// reported a disconnect since the last connect. Returns whether it was
    /// delivered.
    pub fn report_disconnect(&self, error: ConnectionError) -> bool {
        if self.disconnect_reported.load(Ordering::Acquire) {
            return false;
        }
        self.dispatch(ProtocolEvent::Disconnect(error));
        true
    }

    /// Route one engine event.
    pub fn dispatch(&self, event: ProtocolEvent) {
        debug!(event = event.name(), "dispatching protocol event");

        match event {
            ProtocolEvent::Connect => {
                info!("connected");
                self.disconnect_reported.store(false, Ordering::Release);
                self.notify(SessionEvent::Connected);
            },

            ProtocolEvent::Disconnect(error) => {
                info!(%error, "disconnected");
                self.disconnect_reported.store(true, Ordering::Release);
                self.notify(SessionEvent::Disconnected { error });
            },

            ProtocolEvent::TlsConnect { info } => {
                let accepted = self.handler.accept_certificate(&info);
                if accepted {
                    info!(server = %info.server, issuer = %info.issuer, "certificate accepted");
                } else {
                    warn!(server = %info.server, status = info.status, "certificate rejected");
                }
                self.engine.certificate_verdict(accepted);
            },

            ProtocolEvent::ChatSession { peer, handle } => {
                self.chats.accept_inbound(&peer, handle);
            },

            ProtocolEvent::ChatMessage { from, body, subject, stamp } => {
                if body.is_empty() {
                    return;
                }
                self.notify(SessionEvent::ChatMessage {
                    peer: from.user().to_string(),
                    resource: from.resource_or_empty().to_string(),
                    body,
                    subject,
                    timestamp: stamp,
                });
            },

            ProtocolEvent::ChatEvent { from, kind } => {
                let peer = from.user().to_string();
                let resource = from.resource_or_empty().to_string();
                match kind {
                    MessageEventKind::Delivered => {
                        self.notify(SessionEvent::ChatDelivered { peer, resource });
                    },
                    MessageEventKind::Composing => {
                        self.notify(SessionEvent::ChatComposing { peer, resource });
                    },
                    MessageEventKind::Offline
                    | MessageEventKind::Displayed
                    | MessageEventKind::Cancel => {},
                }
            },

            ProtocolEvent::RoomPresence { room, participant, presence } => {
                let online = match presence {
                    PresenceKind::Available | PresenceKind::Chat => true,
                    PresenceKind::Away
                    | PresenceKind::Dnd
                    | PresenceKind::Xa
                    | PresenceKind::Unavailable => false,
                    PresenceKind::Probe | PresenceKind::Error | PresenceKind::Invalid => return,
                };
                let reason = if participant.reason.is_empty() {
                    participant.status
                } else {
                    participant.reason
                };
                self.notify(SessionEvent::GroupPresence {
                    room,
                    user: participant.nick.resource_or_empty().to_string(),
                    online,
                    reason,
                    flags: participant.flags,
                });
            },

            ProtocolEvent::RoomMessage { room, from, body, stamp, private } => {
                if body.is_empty() {
                    return;
                }
                let user = from.resource_or_empty().to_string();
                if private {
                    self.private_message(room, user, body, stamp);
                } else {
                    self.notify(SessionEvent::GroupMessage { room, user, body, timestamp: stamp });
                }
            },

            ProtocolEvent::RoomCreation { room } => self.room_created(&room),

            ProtocolEvent::RoomSubject { room, nick, subject } => {
                // Empty nick is the server replaying the current subject on join.
                if !nick.is_empty() {
                    self.notify(SessionEvent::GroupSubject { room, user: nick, subject });
                }
            },

            ProtocolEvent::RoomInvite { room, from, reason, password } => {
                let invite = Invite {
                    room: room.user().to_string(),
                    inviter: from.user().to_string(),
                    reason,
                    password,
                };
                if self.handler.accept_invite(&invite) {
                    return;
                }
                if self.decline_invitations {
                    info!(room = %room, inviter = %from, "declining invitation");
                    self.engine.decline_invitation(&room, &from, "");
                }
            },

            ProtocolEvent::RoomInviteDecline { room, invitee, reason } => {
                self.notify(SessionEvent::GroupInviteDeclined {
                    room,
                    user: invitee.user().to_string(),
                    reason,
                });
            },

            ProtocolEvent::RoomError { room, error } => {
                warn!(%room, ?error, "room error");
                self.notify(SessionEvent::GroupError { room, error });
            },

            ProtocolEvent::RoomInfo { room, features, name, form } => {
                debug!(%room, features, %name, has_form = form.is_some(), "room info");
            },

            ProtocolEvent::RoomItems { room, items } => {
                let members = items.into_iter().map(|item| item.name).collect();
                self.notify(SessionEvent::GroupMembers { room, members });
            },

            ProtocolEvent::RoomConfigList { room, items, operation } => {
                debug!(%room, ?operation, entries = items.len(), "room list");
            },

            ProtocolEvent::RoomConfigForm { room, form } => {
                match self.rooms.apply_config_form(&room, &form) {
                    FormOutcome::Created { submitted } => {
                        self.notify(SessionEvent::GroupCreated { room, success: submitted });
                    },
                    FormOutcome::Handled { .. } => {},
                    FormOutcome::UnknownRoom => warn!(%room, "configuration form for unknown room"),
                }
            },

            ProtocolEvent::RoomConfigResult { room, success, operation } => {
                self.config_result(room, success, operation);
            },

            ProtocolEvent::RoomRequest { room, form } => {
                debug!(%room, title = %form.title, "room request");
            },
        }
    }

    fn notify(&self, event: SessionEvent) {
        self.handler.handle(event);
    }

    fn private_message(&self, room: String, user: String, body: String, stamp: Option<String>) {
        if user.is_empty() {
            warn!(%room, "private room message without sender nick");
            return;
        }
        self.chats.ensure(&user);
        self.notify(SessionEvent::ChatMessage {
            peer: user,
            resource: room,
            body,
            subject: String::new(),
            timestamp: stamp,
        });
    }

    fn room_created(&self, room: &str) {
        if !self.rooms.contains(room) {
            warn!(%room, "creation notice for unknown room");
            return;
        }
        // Ask outside the registry lock so the handler may issue room commands.
        let accepted = self.handler.accept_default_room_config(room);
        info!(%room, accepted, "created room");
        if !self.rooms.record_creation(room, accepted) {
            warn!(%room, "room ended before creation was recorded");
        }
    }

    fn config_result(&self, room: String, success: bool, operation: RoomOperation) {
        debug!(%room, success, ?operation, "room operation result");
        match operation {
            RoomOperation::Kick => self.notify(SessionEvent::GroupKickResult { room, success }),
            RoomOperation::Ban => self.notify(SessionEvent::GroupBanResult { room, success }),
            RoomOperation::Unban => self.notify(SessionEvent::GroupUnbanResult { room, success }),
            RoomOperation::CreateInstantRoom => {
                if self.rooms.complete_creation(&room) {
                    self.notify(SessionEvent::GroupCreated { room, success });
                }
            },
            RoomOperation::DestroyRoom => {
                self.notify(SessionEvent::GroupDestroyed { room, success });
            },
            RoomOperation::CancelRoomCreation
            | RoomOperation::RequestRoomConfig
            | RoomOperation::SendRoomConfig
            | RoomOperation::Other => {},
        }
    }
}
