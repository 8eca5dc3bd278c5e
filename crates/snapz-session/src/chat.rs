//! Direct-chat sessions.
//!
//! One [`ChatSession`] per peer user name, bound to at most one resource.
//! An operation that names a different resource than the session on record
//! tears the old session down and opens a new one; an operation without a
//! resource reuses whatever session is current.
//!
//! Every lookup-or-create runs under the registry lock together with the
//! engine call that follows it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    engine::{ChatHandle, MessageEventKind, ProtocolEngine},
    identity::Jid,
    registry::{RegistryGuard, SessionRegistry},
};

/// Live message session with one peer.
///
/// Dropping the session closes the engine-side handle.
#[derive(Debug)]
pub struct ChatSession<E: ProtocolEngine> {
    peer: String,
    resource: String,
    handle: ChatHandle,
    engine: Arc<E>,
}

impl<E: ProtocolEngine> ChatSession<E> {
    /// Peer user name (registry key).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Bound resource; empty when the session accepts any resource.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Engine-side handle.
    pub fn handle(&self) -> ChatHandle {
        self.handle
    }
}

impl<E: ProtocolEngine> Drop for ChatSession<E> {
    fn drop(&mut self) {
        debug!(peer = %self.peer, resource = %self.resource, "closing chat session");
        self.engine.close_chat(self.handle);
    }
}

/// Registry of direct-chat sessions.
pub struct ChatSessions<E: ProtocolEngine> {
    registry: SessionRegistry<ChatSession<E>>,
    engine: Arc<E>,
    domain: String,
}

impl<E: ProtocolEngine> ChatSessions<E> {
    /// Sessions for peers on `domain` (the account's own domain).
    pub fn new(engine: Arc<E>, domain: impl Into<String>) -> Self {
        Self { registry: SessionRegistry::new(), engine, domain: domain.into() }
    }

    /// Send a message to `user`, creating or rebinding the session as needed.
    ///
    /// An empty body is not sent and reports success. Returns false only if
    /// the engine could not open a session.
    pub fn send_message(&self, user: &str, body: &str, subject: &str, resource: Option<&str>) -> bool {
        if body.is_empty() {
            return true;
        }

        let mut sessions = self.registry.lock();
        let Some(session) = self.acquire(&mut sessions, user, resource) else {
            return false;
        };
        self.engine.send_chat(session.handle, body, subject);
        true
    }

    /// Raise a composing notification towards `user`.
    pub fn send_composing(&self, user: &str, resource: Option<&str>) -> bool {
        self.raise(user, resource, MessageEventKind::Composing)
    }

    /// Raise a delivered notification towards `user`.
    pub fn send_delivered(&self, user: &str, resource: Option<&str>) -> bool {
        self.raise(user, resource, MessageEventKind::Delivered)
    }

    /// Without a resource an existing session is required; with one the
    /// session is created or rebound first.
    fn raise(&self, user: &str, resource: Option<&str>, kind: MessageEventKind) -> bool {
        let mut sessions = self.registry.lock();
        let session = match resource.filter(|r| !r.is_empty()) {
            None => sessions.find(user),
            Some(_) => self.acquire(&mut sessions, user, resource).map(|s| &*s),
        };
        match session {
            Some(session) => {
                self.engine.raise_chat_event(session.handle, kind);
                true
            },
            None => false,
        }
    }

    /// Adopt a session the peer opened.
    ///
    /// Replaces any session on record for the peer's user name. A peer
    /// without a resource is refused and its handle closed.
    pub fn accept_inbound(&self, peer: &Jid, handle: ChatHandle) -> bool {
        let Some(resource) = peer.resource() else {
            warn!(peer = %peer, "refusing inbound chat session without resource");
            self.engine.close_chat(handle);
            return false;
        };

        let session = ChatSession {
            peer: peer.user().to_string(),
            resource: resource.to_string(),
            handle,
            engine: Arc::clone(&self.engine),
        };
        debug!(peer = %peer, "adopting inbound chat session");
        self.registry.lock().insert(peer.user(), session);
        true
    }

    /// Make sure a session exists for `user`, creating an unbound one if
    /// not. Used for private messages received inside a room.
    pub fn ensure(&self, user: &str) -> bool {
        let mut sessions = self.registry.lock();
        if sessions.contains(user) {
            return true;
        }
        self.open(&mut sessions, user, None).is_some()
    }

    /// Resource bound to the session for `user`.
    pub fn resource_of(&self, user: &str) -> Option<String> {
        self.registry.lock().find(user).map(|s| s.resource.clone())
    }

    /// Whether a session exists for `user`.
    pub fn contains(&self, user: &str) -> bool {
        self.registry.lock().contains(user)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Close every session.
    pub fn dispose_all(&self) -> usize {
        self.registry.dispose_all()
    }

    fn acquire<'g>(
        &self,
        sessions: &'g mut RegistryGuard<'_, ChatSession<E>>,
        user: &str,
        resource: Option<&str>,
    ) -> Option<&'g mut ChatSession<E>> {
        let resource = resource.filter(|r| !r.is_empty());

        let stale = match (sessions.find(user), resource) {
            (Some(existing), Some(wanted)) => existing.resource != wanted,
            _ => false,
        };
        if stale {
            debug!(peer = user, resource, "rebinding chat session to new resource");
            sessions.remove(user);
        }

        if sessions.contains(user) {
            return sessions.find_mut(user);
        }
        self.open(sessions, user, resource)
    }

    fn open<'g>(
        &self,
        sessions: &'g mut RegistryGuard<'_, ChatSession<E>>,
        user: &str,
        resource: Option<&str>,
    ) -> Option<&'g mut ChatSession<E>> {
        let peer = Jid::peer(user, &self.domain, resource);
        match self.engine.open_chat(&peer) {
            Ok(handle) => {
                let session = ChatSession {
                    peer: user.to_string(),
                    resource: peer.resource_or_empty().to_string(),
                    handle,
                    engine: Arc::clone(&self.engine),
                };
                Some(sessions.insert(user, session))
            },
            Err(err) => {
                warn!(peer = %peer, error = %err, "failed to open chat session");
                None
            },
        }
    }
}
