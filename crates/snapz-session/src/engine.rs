//! Protocol engine interface.
//!
//! The [`ProtocolEngine`] trait is the narrow seam between this session layer
//! and the external XMPP implementation that owns stanza parsing, TLS and the
//! XML stream. The session layer never touches the wire; it drives the engine
//! through these calls and receives raw [`ProtocolEvent`]s from
//! [`ProtocolEngine::recv`].
//!
//! Message sessions and room objects live inside the engine and are referred
//! to by opaque handles. Whoever opens a handle owns it and must close it
//! exactly once.
//!
//! # Threading
//!
//! `recv` runs on the network thread while commands run on the owner thread,
//! so implementations must be `Send + Sync`. Send primitives enqueue or write
//! and must not block on I/O completion: the session registries call them
//! while holding their lock.

use std::time::Duration;

use serde::Deserialize;

use crate::{
    error::{ConnectionError, EngineError},
    event::ProtocolEvent,
    form::DataForm,
    identity::Jid,
};

/// Opaque handle to an engine-side message session (and its event notifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatHandle(pub u64);

/// Opaque handle to an engine-side room object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomHandle(pub u64);

/// Connection state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No stream
    Disconnected,
    /// Stream negotiation in progress
    Connecting,
    /// Stream established and authenticated
    Connected,
}

/// TLS requirement for the client-to-server stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsPolicy {
    /// Never negotiate TLS
    Disabled,
    /// Use TLS if the server offers it
    #[default]
    Optional,
    /// Abort if TLS cannot be negotiated
    Required,
}

/// Chat-state notifications exchanged within a message session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEventKind {
    /// Message stored offline by the server
    Offline,
    /// Message delivered to the peer's client
    Delivered,
    /// Message displayed to the peer
    Displayed,
    /// Peer is composing a reply
    Composing,
    /// Peer stopped composing
    Cancel,
}

/// Discussion history requested when joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum History {
    /// At most this many stanzas
    MaxStanzas(u32),
    /// Everything since this timestamp (XEP-0082 date-time)
    Since(String),
}

/// Parameters for joining a room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOptions {
    /// Room password, if the room is protected
    pub password: Option<String>,
    /// History to request from the room
    pub history: Option<History>,
}

impl JoinOptions {
    /// Join with a room password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Request the given history on join.
    #[must_use]
    pub fn with_history(mut self, history: History) -> Self {
        self.history = Some(history);
        self
    }
}

/// Room operations whose outcome the engine reports asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomOperation {
    /// Kick (role set to none)
    Kick,
    /// Ban (affiliation set to outcast)
    Ban,
    /// Unban (affiliation set to none)
    Unban,
    /// Accept the server's default configuration for a new room
    CreateInstantRoom,
    /// Cancel creation of a locked room
    CancelRoomCreation,
    /// Configuration form request
    RequestRoomConfig,
    /// Configuration form submission
    SendRoomConfig,
    /// Room destruction
    DestroyRoom,
    /// Any other list/affiliation operation
    Other,
}

/// Stanza-level error conditions reported for a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StanzaError {
    /// `bad-request`
    BadRequest,
    /// `conflict` (nick already in use)
    Conflict,
    /// `feature-not-implemented`
    FeatureNotImplemented,
    /// `forbidden` (banned)
    Forbidden,
    /// `gone`
    Gone,
    /// `internal-server-error`
    InternalServerError,
    /// `item-not-found` (room locked or missing)
    ItemNotFound,
    /// `jid-malformed`
    JidMalformed,
    /// `not-acceptable`
    NotAcceptable,
    /// `not-allowed` (room creation restricted)
    NotAllowed,
    /// `not-authorized` (password required)
    NotAuthorized,
    /// `registration-required` (members-only room)
    RegistrationRequired,
    /// `remote-server-not-found`
    RemoteServerNotFound,
    /// `remote-server-timeout`
    RemoteServerTimeout,
    /// `resource-constraint`
    ResourceConstraint,
    /// `service-unavailable` (room full)
    ServiceUnavailable,
    /// `undefined-condition`
    UndefinedCondition,
    /// `unexpected-request`
    UnexpectedRequest,
    /// Condition not known to the engine
    Other(String),
}

/// Presence show values as reported for room participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceKind {
    /// Online
    Available,
    /// Free to chat
    Chat,
    /// Away
    Away,
    /// Do not disturb
    Dnd,
    /// Extended away
    Xa,
    /// Offline / left
    Unavailable,
    /// Presence probe
    Probe,
    /// Presence error
    Error,
    /// Unparseable presence
    Invalid,
}

/// Room participant attached to a presence update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Occupant address (`room@service/nick`)
    pub nick: Jid,
    /// Real address, if the room discloses it
    pub jid: Option<Jid>,
    /// Reason attached to a kick/ban/role change
    pub reason: String,
    /// Free-text presence status
    pub status: String,
    /// Engine-defined participant flags
    pub flags: u32,
}

/// Service discovery item returned for a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoItem {
    /// Item address
    pub jid: Jid,
    /// Display name
    pub name: String,
    /// Node, if any
    pub node: String,
}

/// Entry of a room affiliation/role list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomListItem {
    /// Member address
    pub jid: Option<Jid>,
    /// Member nick
    pub nick: String,
    /// Reason recorded with the entry
    pub reason: String,
}

/// Server certificate presented during TLS negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertInfo {
    /// Engine-defined verification flags; zero when the certificate verified
    pub status: u32,
    /// Whether the certificate chain verified against the trusted CAs
    pub chain: bool,
    /// Issuer name
    pub issuer: String,
    /// Server name the certificate was issued for
    pub server: String,
    /// Start of validity, seconds since the Unix epoch
    pub valid_from: i64,
    /// End of validity, seconds since the Unix epoch
    pub valid_to: i64,
    /// Negotiated protocol version
    pub protocol: String,
    /// Negotiated cipher
    pub cipher: String,
    /// Negotiated MAC
    pub mac: String,
    /// Negotiated compression
    pub compression: String,
}

/// Operations the session layer needs from an XMPP protocol engine.
pub trait ProtocolEngine: Send + Sync + 'static {
    /// Open the stream to the server using the TLS policy and trusted CAs the
    /// engine was built with. Does not block on stream negotiation.
    fn connect(&self) -> Result<(), EngineError>;

    /// Close the stream. Must wake a blocked [`ProtocolEngine::recv`].
    ///
    /// The engine need not report this closure: the driver delivers
    /// `Disconnected` itself when no [`ProtocolEvent::Disconnect`] followed
    /// the last connect.
    fn disconnect(&self);

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Answer the last [`ProtocolEvent::TlsConnect`]. A rejected certificate
    /// must abort the stream.
    fn certificate_verdict(&self, accepted: bool);

    /// Wait up to `timeout` for incoming data (forever when `None`) and feed
    /// every raw event it produces to `sink`, in arrival order.
    ///
    /// Returns the connection error observed by this receive, if any.
    fn recv(
        &self,
        timeout: Option<Duration>,
        sink: &mut dyn FnMut(ProtocolEvent),
    ) -> Result<(), ConnectionError>;

    /// Create a message session to `peer` with composing/delivered events
    /// enabled.
    fn open_chat(&self, peer: &Jid) -> Result<ChatHandle, EngineError>;

    /// Dispose a message session.
    fn close_chat(&self, chat: ChatHandle);

    /// Send a chat message within a session.
    fn send_chat(&self, chat: ChatHandle, body: &str, subject: &str);

    /// Raise a message event (composing/delivered) within a session.
    fn raise_chat_event(&self, chat: ChatHandle, kind: MessageEventKind);

    /// Create a room object for `occupant` (`room@service/nick`).
    fn open_room(&self, occupant: &Jid) -> Result<RoomHandle, EngineError>;

    /// Dispose a room object. Does not send a leave.
    fn close_room(&self, room: RoomHandle);

    /// Join the room.
    fn join_room(&self, room: RoomHandle, options: &JoinOptions);

    /// Leave the room.
    fn leave_room(&self, room: RoomHandle, reason: &str);

    /// Destroy the room on the server.
    fn destroy_room(&self, room: RoomHandle, reason: &str);

    /// Accept the server's default configuration for a newly created room.
    fn acknowledge_instant_room(&self, room: RoomHandle);

    /// Cancel creation of a locked room.
    fn cancel_room_creation(&self, room: RoomHandle);

    /// Request the room configuration form.
    fn request_room_config(&self, room: RoomHandle);

    /// Submit a filled room configuration form.
    fn submit_room_config(&self, room: RoomHandle, form: DataForm);

    /// Change the room subject.
    fn set_room_subject(&self, room: RoomHandle, subject: &str);

    /// Send a message to all occupants.
    fn send_room_message(&self, room: RoomHandle, body: &str);

    /// Invite `invitee` (bare address) to the room.
    fn invite(&self, room: RoomHandle, invitee: &Jid, reason: &str);

    /// Kick an occupant by nick.
    fn kick(&self, room: RoomHandle, nick: &str, reason: &str);

    /// Ban an occupant by nick.
    fn ban(&self, room: RoomHandle, nick: &str, reason: &str);

    /// Reset an occupant's affiliation to none.
    fn unban(&self, room: RoomHandle, nick: &str);

    /// Request the room's disco items (occupant list).
    fn request_room_items(&self, room: RoomHandle);

    /// Send a decline for an invitation to `room` back to `inviter`.
    fn decline_invitation(&self, room: &Jid, inviter: &Jid, reason: &str);
}
