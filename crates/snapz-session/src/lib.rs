//! Session layer
//!
//! Client-side session layer over an XMPP protocol engine. Turns the
//! engine's per-stanza callbacks into a small set of application events and
//! exposes a synchronous command API for direct and group chat.
//!
//! # Architecture
//!
//! The wire protocol lives behind the [`ProtocolEngine`] trait. The engine
//! reports everything it sees as a [`ProtocolEvent`]; the [`Dispatcher`]
//! routes each one through the session registries and notifies the
//! application's [`EventHandler`] with a [`SessionEvent`].
//!
//! ```text
//! network thread: Driver ─► engine.recv ─► Dispatcher ─► registries ─► EventHandler
//! owner thread:   Client ─► registries ─► engine send primitives
//! ```
//!
//! # Components
//!
//! - [`Client`]: Owner-thread handle with connection control and commands
//! - [`ChatSessions`]: One message session per peer, resource-affine
//! - [`RoomSessions`]: Joined rooms and their [`CreationState`]
//! - [`Dispatcher`]: Single entry point for engine events
//! - [`Driver`]: Network thread, manual pumping, suspend/resume
//! - [`ClientConfig`]: Account and connection options, loadable from TOML

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chat;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod engine;
pub mod error;
pub mod event;
pub mod form;
pub mod identity;
pub mod registry;
pub mod room;

pub use chat::{ChatSession, ChatSessions};
pub use client::Client;
pub use config::ClientConfig;
pub use dispatcher::Dispatcher;
pub use driver::Driver;
pub use engine::{
    CertInfo, ChatHandle, ConnectionState, DiscoItem, History, JoinOptions, MessageEventKind,
    Participant, PresenceKind, ProtocolEngine, RoomHandle, RoomListItem, RoomOperation,
    StanzaError, TlsPolicy,
};
pub use error::{ClientError, ConfigError, ConnectionError, EngineError, IdentityError};
pub use event::{EventHandler, Invite, ProtocolEvent, SessionEvent};
pub use form::{DataForm, FieldType, FormField, FormKind, GroupChatConfig};
pub use identity::{Jid, RoomJid};
pub use registry::SessionRegistry;
pub use room::{CreationState, GroupChatSession, RoomSessions};
