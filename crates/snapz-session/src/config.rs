//! Client configuration.
//!
//! A [`ClientConfig`] is built in code with [`ClientConfig::new`] or loaded
//! from TOML:
//!
//! ```toml
//! jid = "alice@jabber.example.com"
//! password = "secret"
//! port = 5222
//! tls_policy = "required"
//! recv_timeout_ms = 500
//! ```
//!
//! Only `jid` and `password` are required. The conference service defaults
//! to `conference.` + the account domain without its first label.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    engine::TlsPolicy,
    error::ConfigError,
    identity::{Jid, conference_service},
};

/// Default client-to-server port.
pub const DEFAULT_PORT: u16 = 5222;

/// Account, server and connection options supplied at construction.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// Account identity (`user@domain[/resource]`)
    pub jid: String,
    /// Account password
    pub password: String,
    /// Server host; defaults to the account domain
    #[serde(default)]
    pub server: Option<String>,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// TLS requirement
    #[serde(default)]
    pub tls_policy: TlsPolicy,
    /// Trusted CA certificate files
    #[serde(default)]
    pub ca_certs: Vec<PathBuf>,
    /// Conference service; defaults to one derived from the account domain
    #[serde(default)]
    pub groupchat_server: Option<String>,
    /// Receive timeout in milliseconds; unset blocks until data arrives
    #[serde(default)]
    pub recv_timeout_ms: Option<u64>,
    /// Answer refused invitations with a decline
    #[serde(default = "default_decline_invitations")]
    pub decline_invitations: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_decline_invitations() -> bool {
    true
}

impl ClientConfig {
    /// Configuration with library defaults for everything but credentials.
    pub fn new(jid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            password: password.into(),
            server: None,
            port: DEFAULT_PORT,
            tls_policy: TlsPolicy::default(),
            ca_certs: Vec::new(),
            groupchat_server: None,
            recv_timeout_ms: None,
            decline_invitations: true,
        }
    }

    /// Parse from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check the configuration and return the parsed account identity.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidJid` if `jid` does not parse
    /// - `ConfigError::MissingUser` if `jid` has no user part
    /// - `ConfigError::InvalidPort` for port 0
    pub fn validate(&self) -> Result<Jid, ConfigError> {
        let account = Jid::parse(&self.jid)
            .map_err(|source| ConfigError::InvalidJid { jid: self.jid.clone(), source })?;
        if account.user().is_empty() {
            return Err(ConfigError::MissingUser(self.jid.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        Ok(account)
    }

    /// Host to connect to: `server` if set, else the account domain.
    pub fn server_host(&self, account: &Jid) -> String {
        match &self.server {
            Some(server) if !server.is_empty() => server.clone(),
            _ => account.domain().to_string(),
        }
    }

    /// Conference service hosting group chats.
    pub fn groupchat_service(&self, account: &Jid) -> String {
        match &self.groupchat_server {
            Some(service) if !service.is_empty() => service.clone(),
            _ => conference_service(account.domain()),
        }
    }

    /// Receive timeout; `None` blocks until data arrives.
    pub fn recv_timeout(&self) -> Option<Duration> {
        self.recv_timeout_ms.map(Duration::from_millis)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("jid", &self.jid)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("tls_policy", &self.tls_policy)
            .field("ca_certs", &self.ca_certs)
            .field("groupchat_server", &self.groupchat_server)
            .field("recv_timeout_ms", &self.recv_timeout_ms)
            .field("decline_invitations", &self.decline_invitations)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let config = ClientConfig::new("alice@jabber.example.com", "secret");
        let account = config.validate().unwrap();

        assert_eq!(config.port, 5222);
        assert_eq!(config.tls_policy, TlsPolicy::Optional);
        assert!(config.ca_certs.is_empty());
        assert_eq!(config.recv_timeout(), None);
        assert!(config.decline_invitations);
        assert_eq!(config.server_host(&account), "jabber.example.com");
        assert_eq!(config.groupchat_service(&account), "conference.example.com");
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let config =
            ClientConfig::from_toml_str("jid = \"bob@example.com\"\npassword = \"pw\"\n").unwrap();

        assert_eq!(config.jid, "bob@example.com");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.tls_policy, TlsPolicy::Optional);
        assert!(config.decline_invitations);
    }

    #[test]
    fn full_toml_overrides_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            jid = "bob@example.com/laptop"
            password = "pw"
            server = "xmpp.example.net"
            port = 5223
            tls_policy = "required"
            ca_certs = ["/etc/ssl/ca.pem"]
            groupchat_server = "muc.example.com"
            recv_timeout_ms = 250
            decline_invitations = false
            "#,
        )
        .unwrap();
        let account = config.validate().unwrap();

        assert_eq!(config.server_host(&account), "xmpp.example.net");
        assert_eq!(config.groupchat_service(&account), "muc.example.com");
        assert_eq!(config.tls_policy, TlsPolicy::Required);
        assert_eq!(config.ca_certs, vec![PathBuf::from("/etc/ssl/ca.pem")]);
        assert_eq!(config.recv_timeout(), Some(Duration::from_millis(250)));
        assert!(!config.decline_invitations);
    }

    #[test]
    fn missing_password_is_a_parse_error() {
        let err = ClientConfig::from_toml_str("jid = \"bob@example.com\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_rejects_bad_accounts() {
        let err = ClientConfig::new("@example.com", "pw").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJid { .. }));

        let err = ClientConfig::new("example.com", "pw").validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingUser(_)));

        let mut config = ClientConfig::new("bob@example.com", "pw");
        config.port = 0;
        assert!(matches!(config.validate().unwrap_err(), ConfigError::InvalidPort(0)));
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", ClientConfig::new("bob@example.com", "hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
