//! Protocol events in, session events out.
//!
//! The engine reports everything it observes as a [`ProtocolEvent`] and the
//! dispatcher turns each one into registry mutations and/or a
//! [`SessionEvent`] delivered to the application's [`EventHandler`].
//!
//! # Threading contract
//!
//! Handler methods are invoked on the network thread (or on the owner thread
//! when it pumps manually with `Client::update`). Implementations must be
//! thread-safe or hop to their own thread. Handlers must not call back into
//! the client's disconnect from inside a callback: the network thread cannot
//! join itself.

use crate::{
    engine::{
        CertInfo, ChatHandle, ConnectionState, DiscoItem, MessageEventKind, Participant,
        PresenceKind, RoomListItem, RoomOperation, StanzaError,
    },
    error::ConnectionError,
    form::DataForm,
    identity::Jid,
};

/// Raw event produced by the protocol engine.
///
/// Rooms are identified by name; the conference service is implied by the
/// client configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// Stream established and authenticated.
    Connect,

    /// Stream closed.
    Disconnect(ConnectionError),

    /// Server presented its certificate. The engine waits for
    /// [`crate::ProtocolEngine::certificate_verdict`] before continuing.
    TlsConnect {
        /// Certificate and negotiated parameters
        info: CertInfo,
    },

    /// Peer opened a message session with us.
    ///
    /// Ownership of `handle` passes to the session layer.
    ChatSession {
        /// Full address of the peer
        peer: Jid,
        /// Engine-side session created for the peer
        handle: ChatHandle,
    },

    /// Direct message within a session.
    ChatMessage {
        /// Session target
        from: Jid,
        /// Message body
        body: String,
        /// Message subject
        subject: String,
        /// Delayed-delivery timestamp, if the message was stored
        stamp: Option<String>,
    },

    /// Message event (composing, delivered, ...) from a peer.
    ChatEvent {
        /// Peer address
        from: Jid,
        /// Event raised by the peer
        kind: MessageEventKind,
    },

    /// Presence of a room participant changed.
    RoomPresence {
        /// Room name
        room: String,
        /// Participant the presence is about
        participant: Participant,
        /// Presence show value
        presence: PresenceKind,
    },

    /// Message inside a room, public or private.
    RoomMessage {
        /// Room name
        room: String,
        /// Occupant address (`room@service/nick`)
        from: Jid,
        /// Message body
        body: String,
        /// Delayed-delivery timestamp (room history)
        stamp: Option<String>,
        /// Sent privately to us rather than to the room
        private: bool,
    },

    /// The server created the room on our join; we are its owner.
    RoomCreation {
        /// Room name
        room: String,
    },

    /// Room subject changed.
    RoomSubject {
        /// Room name
        room: String,
        /// Nick that changed it; empty for the initial subject
        nick: String,
        /// New subject
        subject: String,
    },

    /// Invitation to a room.
    RoomInvite {
        /// Room address
        room: Jid,
        /// Inviter address
        from: Jid,
        /// Invitation reason
        reason: String,
        /// Room password, if the inviter supplied one
        password: String,
    },

    /// An invitee declined our invitation.
    RoomInviteDecline {
        /// Room name
        room: String,
        /// Invitee address
        invitee: Jid,
        /// Decline reason
        reason: String,
    },

    /// Room-level stanza error.
    RoomError {
        /// Room name
        room: String,
        /// Error condition
        error: StanzaError,
    },

    /// Disco info for a room.
    RoomInfo {
        /// Room name
        room: String,
        /// Feature bitmask
        features: u32,
        /// Natural-language room name
        name: String,
        /// Extended info form
        form: Option<DataForm>,
    },

    /// Disco items for a room (occupants).
    RoomItems {
        /// Room name
        room: String,
        /// Items in server order
        items: Vec<DiscoItem>,
    },

    /// Affiliation or role list for a room.
    RoomConfigList {
        /// Room name
        room: String,
        /// List entries
        items: Vec<RoomListItem>,
        /// Operation the list belongs to
        operation: RoomOperation,
    },

    /// Room configuration form requested earlier.
    RoomConfigForm {
        /// Room name
        room: String,
        /// Form as advertised by the server
        form: DataForm,
    },

    /// Outcome of a room operation.
    RoomConfigResult {
        /// Room name
        room: String,
        /// Whether the server accepted it
        success: bool,
        /// Operation that completed
        operation: RoomOperation,
    },

    /// Voice request or similar form relayed by the room.
    RoomRequest {
        /// Room name
        room: String,
        /// Request form
        form: DataForm,
    },
}

impl ProtocolEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect(_) => "disconnect",
            Self::TlsConnect { .. } => "tls_connect",
            Self::ChatSession { .. } => "chat_session",
            Self::ChatMessage { .. } => "chat_message",
            Self::ChatEvent { .. } => "chat_event",
            Self::RoomPresence { .. } => "room_presence",
            Self::RoomMessage { .. } => "room_message",
            Self::RoomCreation { .. } => "room_creation",
            Self::RoomSubject { .. } => "room_subject",
            Self::RoomInvite { .. } => "room_invite",
            Self::RoomInviteDecline { .. } => "room_invite_decline",
            Self::RoomError { .. } => "room_error",
            Self::RoomInfo { .. } => "room_info",
            Self::RoomItems { .. } => "room_items",
            Self::RoomConfigList { .. } => "room_config_list",
            Self::RoomConfigForm { .. } => "room_config_form",
            Self::RoomConfigResult { .. } => "room_config_result",
            Self::RoomRequest { .. } => "room_request",
        }
    }
}

/// Event delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connected to the server.
    Connected,

    /// Disconnected from the server.
    Disconnected {
        /// Reason reported by the engine
        error: ConnectionError,
    },

    /// Direct message, including private messages sent from inside a room.
    ChatMessage {
        /// Sender user name (or nick for private room messages)
        peer: String,
        /// Sender resource (or room name for private room messages)
        resource: String,
        /// Message body, never empty
        body: String,
        /// Message subject
        subject: String,
        /// Delayed-delivery timestamp
        timestamp: Option<String>,
    },

    /// Peer is composing.
    ChatComposing {
        /// Peer user name
        peer: String,
        /// Peer resource
        resource: String,
    },

    /// Peer received our message.
    ChatDelivered {
        /// Peer user name
        peer: String,
        /// Peer resource
        resource: String,
    },

    /// Room creation finished.
    GroupCreated {
        /// Room name
        room: String,
        /// Whether the configuration was applied
        success: bool,
    },

    /// Room destruction finished.
    GroupDestroyed {
        /// Room name
        room: String,
        /// Whether the server destroyed it
        success: bool,
    },

    /// Room subject changed by an occupant.
    GroupSubject {
        /// Room name
        room: String,
        /// Occupant nick
        user: String,
        /// New subject
        subject: String,
    },

    /// Public room message.
    GroupMessage {
        /// Room name
        room: String,
        /// Occupant nick
        user: String,
        /// Message body, never empty
        body: String,
        /// Delayed-delivery timestamp (history)
        timestamp: Option<String>,
    },

    /// Result of a kick.
    GroupKickResult {
        /// Room name
        room: String,
        /// Whether the server accepted it
        success: bool,
    },

    /// Result of a ban.
    GroupBanResult {
        /// Room name
        room: String,
        /// Whether the server accepted it
        success: bool,
    },

    /// Result of an unban.
    GroupUnbanResult {
        /// Room name
        room: String,
        /// Whether the server accepted it
        success: bool,
    },

    /// Occupant came online or went offline.
    GroupPresence {
        /// Room name
        room: String,
        /// Occupant nick
        user: String,
        /// Available/chat versus away/dnd/xa/unavailable
        online: bool,
        /// Explicit reason if present, else status text
        reason: String,
        /// Engine-defined participant flags
        flags: u32,
    },

    /// Room stanza error.
    GroupError {
        /// Room name
        room: String,
        /// Error condition
        error: StanzaError,
    },

    /// Invitee declined our invitation.
    GroupInviteDeclined {
        /// Room name
        room: String,
        /// Invitee user name
        user: String,
        /// Decline reason
        reason: String,
    },

    /// Room member list.
    GroupMembers {
        /// Room name
        room: String,
        /// Display names in server order
        members: Vec<String>,
    },
}

/// Invitation offered to [`EventHandler::accept_invite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    /// Room name
    pub room: String,
    /// Inviter user name
    pub inviter: String,
    /// Invitation reason
    pub reason: String,
    /// Room password; empty if none was supplied
    pub password: String,
}

/// Application callback surface.
///
/// Only [`EventHandler::handle`] is required. Decision hooks default to the
/// library's conservative choices.
pub trait EventHandler: Send + Sync + 'static {
    /// Receive an outward event.
    fn handle(&self, event: SessionEvent);

    /// We created `room`. Return true to accept the server's default
    /// configuration (instant room); false leaves creation pending until
    /// `configure_group_chat` is called.
    fn accept_default_room_config(&self, _room: &str) -> bool {
        true
    }

    /// Server certificate received during TLS negotiation. Return true to
    /// continue; every certificate is rejected by default.
    fn accept_certificate(&self, _info: &CertInfo) -> bool {
        false
    }

    /// Invitation received. Return false to decline.
    fn accept_invite(&self, _invite: &Invite) -> bool {
        false
    }

    /// A non-terminal receive error occurred while the stream is still up.
    /// Return true to keep the network loop running.
    fn recover(&self, _state: ConnectionState, _error: &ConnectionError) -> bool {
        true
    }

    /// Network loop started (network thread).
    fn network_started(&self) {}

    /// Network loop stopped (network thread).
    fn network_stopped(&self) {}
}
