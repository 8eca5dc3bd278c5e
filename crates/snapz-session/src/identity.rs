//! Addressable identities.
//!
//! A [`Jid`] is the `user@domain/resource` triple used for accounts and
//! peers; a bare identity has no resource. A [`RoomJid`] names a multi-user
//! chat room on a conference service.
//!
//! Parsing is checked: malformed input is rejected with an
//! [`IdentityError`] instead of producing a partial identity.

use std::{fmt, str::FromStr};

use crate::error::IdentityError;

/// Label prepended to the account's parent domain to form the default
/// conference service.
pub const CONFERENCE_LABEL: &str = "conference";

/// Account or peer identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    user: String,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// Parse `[user@]domain[/resource]`.
    ///
    /// # Errors
    ///
    /// - `IdentityError::Empty` for empty input
    /// - `IdentityError::EmptyUser` if `@` is present with nothing before it
    /// - `IdentityError::EmptyDomain` if the domain part is empty
    /// - `IdentityError::EmptyResource` if `/` is present with nothing after it
    /// - `IdentityError::InvalidCharacter` for whitespace or a second `@`
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }

        let (address, resource) = match raw.split_once('/') {
            Some((_, "")) => return Err(IdentityError::EmptyResource),
            Some((address, resource)) => (address, Some(resource)),
            None => (raw, None),
        };

        let (user, domain) = match address.split_once('@') {
            Some(("", _)) => return Err(IdentityError::EmptyUser),
            Some((user, domain)) => (user, domain),
            None => ("", address),
        };

        if domain.is_empty() {
            return Err(IdentityError::EmptyDomain);
        }

        if let Some(c) = user.chars().chain(domain.chars()).find(|c| c.is_whitespace() || *c == '@')
        {
            return Err(IdentityError::InvalidCharacter(c));
        }

        Ok(Self {
            user: user.to_string(),
            domain: domain.to_ascii_lowercase(),
            resource: resource.map(str::to_string),
        })
    }

    /// Compose a peer identity on the given domain.
    ///
    /// An empty resource yields a bare identity.
    pub fn peer(user: &str, domain: &str, resource: Option<&str>) -> Self {
        Self {
            user: user.to_string(),
            domain: domain.to_string(),
            resource: resource.filter(|r| !r.is_empty()).map(str::to_string),
        }
    }

    /// Local part. Empty for domain-only identities.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Domain part.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resource part, if bound.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Resource part, or an empty string when bare.
    pub fn resource_or_empty(&self) -> &str {
        self.resource.as_deref().unwrap_or("")
    }

    /// Whether this identity carries no resource.
    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    /// Same identity without the resource.
    pub fn to_bare(&self) -> Self {
        Self { user: self.user.clone(), domain: self.domain.clone(), resource: None }
    }

    /// Same identity bound to `resource`.
    pub fn with_resource(&self, resource: &str) -> Self {
        Self::peer(&self.user, &self.domain, Some(resource))
    }

    /// Default conference service for this account's domain.
    pub fn conference_service(&self) -> String {
        conference_service(&self.domain)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.user.is_empty() {
            write!(f, "{}@", self.user)?;
        }
        f.write_str(&self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

impl FromStr for Jid {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Multi-user chat room identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomJid {
    name: String,
    service: String,
}

impl RoomJid {
    /// Room `name` hosted on conference `service`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::EmptyUser` for an empty room name and
    /// `IdentityError::EmptyDomain` for an empty service.
    pub fn new(name: &str, service: &str) -> Result<Self, IdentityError> {
        if name.is_empty() {
            return Err(IdentityError::EmptyUser);
        }
        if service.is_empty() {
            return Err(IdentityError::EmptyDomain);
        }
        if let Some(c) = name.chars().find(|c| c.is_whitespace() || matches!(c, '@' | '/')) {
            return Err(IdentityError::InvalidCharacter(c));
        }
        Ok(Self { name: name.to_string(), service: service.to_string() })
    }

    /// Room name, the registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Conference service domain.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Bare room address.
    pub fn to_jid(&self) -> Jid {
        Jid::peer(&self.name, &self.service, None)
    }

    /// Occupant address for `nick` inside this room.
    pub fn occupant(&self, nick: &str) -> Jid {
        Jid::peer(&self.name, &self.service, Some(nick))
    }
}

impl fmt::Display for RoomJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.service)
    }
}

/// Strip the first label off a domain (`jabber.example.com` → `example.com`).
///
/// Single-label domains are returned unchanged.
pub fn parent_domain(domain: &str) -> &str {
    match domain.split_once('.') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => domain,
    }
}

/// `conference.` + parent domain of the account's domain.
pub fn conference_service(domain: &str) -> String {
    format!("{CONFERENCE_LABEL}.{}", parent_domain(domain))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_identity() {
        let jid = Jid::parse("alice@jabber.example.com/phone").unwrap();
        assert_eq!(jid.user(), "alice");
        assert_eq!(jid.domain(), "jabber.example.com");
        assert_eq!(jid.resource(), Some("phone"));
        assert!(!jid.is_bare());
    }

    #[test]
    fn parses_bare_and_domain_only() {
        let bare = Jid::parse("bob@example.com").unwrap();
        assert!(bare.is_bare());
        assert_eq!(bare.resource_or_empty(), "");

        let domain = Jid::parse("example.com").unwrap();
        assert_eq!(domain.user(), "");
        assert_eq!(domain.to_string(), "example.com");
    }

    #[test]
    fn resource_may_contain_slashes_and_at() {
        let jid = Jid::parse("carol@example.com/desk/top@home").unwrap();
        assert_eq!(jid.resource(), Some("desk/top@home"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Jid::parse(""), Err(IdentityError::Empty));
        assert_eq!(Jid::parse("@example.com"), Err(IdentityError::EmptyUser));
        assert_eq!(Jid::parse("alice@"), Err(IdentityError::EmptyDomain));
        assert_eq!(Jid::parse("alice@example.com/"), Err(IdentityError::EmptyResource));
        assert_eq!(Jid::parse("a b@example.com"), Err(IdentityError::InvalidCharacter(' ')));
        assert_eq!(Jid::parse("a@b@example.com"), Err(IdentityError::InvalidCharacter('@')));
    }

    #[test]
    fn domain_is_case_folded() {
        let jid = Jid::parse("Dave@Example.COM").unwrap();
        assert_eq!(jid.domain(), "example.com");
        assert_eq!(jid.user(), "Dave");
    }

    #[test]
    fn display_round_trips_full_identity() {
        let raw = "alice@example.com/phone";
        assert_eq!(Jid::parse(raw).unwrap().to_string(), raw);
    }

    #[test]
    fn peer_with_empty_resource_is_bare() {
        let jid = Jid::peer("bob", "example.com", Some(""));
        assert!(jid.is_bare());
    }

    #[test]
    fn conference_service_strips_first_label() {
        assert_eq!(conference_service("jabber.example.com"), "conference.example.com");
        assert_eq!(conference_service("example.com"), "conference.com");
        assert_eq!(conference_service("localhost"), "conference.localhost");
    }

    #[test]
    fn room_occupant_address() {
        let room = RoomJid::new("lobby", "conference.example.com").unwrap();
        assert_eq!(room.to_string(), "lobby@conference.example.com");
        assert_eq!(room.occupant("alice").to_string(), "lobby@conference.example.com/alice");
    }

    #[test]
    fn room_rejects_bad_names() {
        assert_eq!(RoomJid::new("", "conference.example.com"), Err(IdentityError::EmptyUser));
        assert_eq!(RoomJid::new("lobby", ""), Err(IdentityError::EmptyDomain));
        assert_eq!(
            RoomJid::new("a/b", "conference.example.com"),
            Err(IdentityError::InvalidCharacter('/'))
        );
    }
}
