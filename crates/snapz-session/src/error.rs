//! Error types for the session layer.
//!
//! Strongly-typed errors per concern: identity parsing, configuration,
//! protocol engine failures, connection errors reported by the engine, and
//! client construction/connect failures.
//!
//! Command rejection (not connected, not joined) is not an error here. It is
//! reported as a `false` return from the command.

use std::io;

use thiserror::Error;

use crate::engine::ConnectionState;

/// Errors from parsing or composing identities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Input was empty
    #[error("identity is empty")]
    Empty,

    /// `@` present with an empty local part
    #[error("identity has an empty user part")]
    EmptyUser,

    /// Domain part is empty
    #[error("identity has an empty domain")]
    EmptyDomain,

    /// `/` present with an empty resource
    #[error("identity has an empty resource")]
    EmptyResource,

    /// Character not allowed in the user or domain part
    #[error("invalid character {0:?} in identity")]
    InvalidCharacter(char),
}

/// Errors from loading or validating client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Account identity is malformed
    #[error("invalid account identity {jid:?}: {source}")]
    InvalidJid {
        /// Raw identity from the configuration
        jid: String,
        /// Parse failure
        #[source]
        source: IdentityError,
    },

    /// Account identity has no user part
    #[error("account identity {0:?} has no user part")]
    MissingUser(String),

    /// Port outside the valid range
    #[error("invalid port {0}")]
    InvalidPort(u16),

    /// TOML syntax or schema error
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),
}

/// Failures reported by the protocol engine for a single operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Engine could not be set up from the configuration
    #[error("engine setup failed: {0}")]
    Setup(String),

    /// Connection attempt failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Message session or room object could not be created
    #[error("session creation failed: {0}")]
    Session(String),
}

/// Connection-level errors reported by the engine's receive primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Stream is not connected
    #[error("not connected")]
    NotConnected,

    /// Connection was closed on request
    #[error("disconnected by user")]
    UserDisconnected,

    /// Stream-level protocol error from the server
    #[error("stream error: {0}")]
    Stream(String),

    /// TLS negotiation or certificate failure
    #[error("TLS failure: {0}")]
    Tls(String),

    /// SASL or legacy authentication failed
    #[error("authentication failed")]
    Authentication,

    /// Socket-level failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Error code the engine could not classify
    #[error("unknown connection error {0}")]
    Unknown(i32),
}

impl ConnectionError {
    /// Returns true if this error always ends the receive loop.
    ///
    /// Other errors end the loop only if the engine reports
    /// [`ConnectionState::Disconnected`]; otherwise the application decides.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NotConnected | Self::UserDisconnected)
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors surfaced to the owner of a [`crate::Client`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration rejected at construction
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Protocol engine setup or connect failure
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Network thread could not be started
    #[error("failed to start network thread: {0}")]
    Spawn(#[source] io::Error),

    /// Operation invalid in the current connection state
    #[error("invalid state: cannot {operation} while {state:?}")]
    InvalidState {
        /// Engine connection state
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}
