//! Client handle.
//!
//! [`Client`] is the owner-thread API: connection control plus the direct
//! and group chat commands. Commands return `false` when rejected (not
//! connected, room not joined, engine refused a session) and never panic.
//!
//! # Threading contract
//!
//! All methods are meant to be called from the single owner thread.
//! [`EventHandler`] callbacks run on the network thread; see
//! [`crate::event`].

use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::{
    chat::ChatSessions,
    config::ClientConfig,
    dispatcher::Dispatcher,
    driver::Driver,
    engine::{JoinOptions, ProtocolEngine},
    error::{ClientError, EngineError},
    event::EventHandler,
    form::GroupChatConfig,
    identity::Jid,
    room::{CreationState, RoomSessions},
};

/// Session-layer client over a protocol engine `E`, reporting to `H`.
pub struct Client<E: ProtocolEngine, H: EventHandler> {
    config: ClientConfig,
    account: Jid,
    dispatcher: Arc<Dispatcher<E, H>>,
    driver: Driver<E, H>,
}

impl<E: ProtocolEngine, H: EventHandler> Client<E, H> {
    /// Validate `config` and build the engine with `setup`.
    ///
    /// # Errors
    ///
    /// - `ClientError::Config` if the configuration is invalid
    /// - `ClientError::Engine` if `setup` fails
    pub fn new<F>(config: ClientConfig, handler: H, setup: F) -> Result<Self, ClientError>
    where
        F: FnOnce(&ClientConfig) -> Result<E, EngineError>,
    {
        let account = config.validate()?;
        let engine = Arc::new(setup(&config)?);
        let service = config.groupchat_service(&account);

        let chats = ChatSessions::new(Arc::clone(&engine), account.domain());
        let rooms = RoomSessions::new(Arc::clone(&engine), service, account.user(), account.domain());
        let dispatcher =
            Arc::new(Dispatcher::new(engine, chats, rooms, handler, config.decline_invitations));
        let driver = Driver::new(Arc::clone(&dispatcher), config.recv_timeout());

        info!(?config, "client created");
        Ok(Self { config, account, dispatcher, driver })
    }

    /// Build over an already constructed engine.
    pub fn with_engine(config: ClientConfig, engine: E, handler: H) -> Result<Self, ClientError> {
        Self::new(config, handler, |_| Ok(engine))
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Parsed account identity.
    pub fn account(&self) -> &Jid {
        &self.account
    }

    /// Protocol engine.
    pub fn engine(&self) -> &E {
        self.dispatcher.engine()
    }

    /// Application handler.
    pub fn handler(&self) -> &H {
        self.dispatcher.handler()
    }

    // Connection

    /// Connect. With `start_thread` a network thread pumps the engine;
    /// otherwise call [`Client::update`] periodically.
    pub fn connect(&self, start_thread: bool) -> Result<(), ClientError> {
        self.driver.connect(start_thread)
    }

    /// Disconnect, wait for the network thread to exit and dispose every
    /// session. `Disconnected` is delivered once if the engine did not
    /// report it; no handler callback runs after this returns.
    pub fn disconnect(&self) {
        self.driver.disconnect();
    }

    /// Pump the engine once when no network thread runs. Returns false once
    /// the connection is gone.
    pub fn update(&self, timeout: Option<Duration>) -> bool {
        self.driver.update(timeout)
    }

    /// Pause the network loop (application moved to background).
    pub fn suspend(&self) {
        self.driver.suspend();
    }

    /// Resume the network loop (application back in foreground).
    pub fn resume(&self) {
        self.driver.resume();
    }

    /// Whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    /// Whether the network thread is running.
    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    // Direct chat

    /// Send a message to `user` on our domain, optionally bound to
    /// `resource`. An empty body sends nothing and reports success.
    pub fn send_chat_message(
        &self,
        user: &str,
        body: &str,
        subject: &str,
        resource: Option<&str>,
    ) -> bool {
        self.is_connected() && self.dispatcher.chats().send_message(user, body, subject, resource)
    }

    /// Tell `user` we are composing. Without a resource an existing session
    /// is required.
    pub fn send_chat_composing(&self, user: &str, resource: Option<&str>) -> bool {
        self.is_connected() && self.dispatcher.chats().send_composing(user, resource)
    }

    /// Tell `user` their message was delivered. Without a resource an
    /// existing session is required.
    pub fn send_chat_delivered(&self, user: &str, resource: Option<&str>) -> bool {
        self.is_connected() && self.dispatcher.chats().send_delivered(user, resource)
    }

    /// Resource bound to the chat session with `user`; empty if unbound.
    pub fn chat_session_resource(&self, user: &str) -> Option<String> {
        self.dispatcher.chats().resource_of(user)
    }

    // Group chat

    /// Join `room`. Returns the joined flag of an existing session without
    /// sending anything.
    pub fn begin_group_chat(&self, room: &str, options: &JoinOptions) -> bool {
        self.is_connected() && self.dispatcher.rooms().begin(room, options)
    }

    /// Leave `room` and forget it. False if the room was not tracked.
    pub fn end_group_chat(&self, room: &str, reason: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().end(room, reason)
    }

    /// Destroy `room` on the server.
    pub fn destroy_group_chat(&self, room: &str, reason: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().destroy(room, reason)
    }

    /// Accept default configuration for a pending room (`None`), or apply
    /// `config` through the configuration form.
    pub fn configure_group_chat(&self, room: &str, config: Option<GroupChatConfig>) -> bool {
        self.is_connected() && self.dispatcher.rooms().configure(room, config)
    }

    /// Cancel creation of a room we created.
    pub fn cancel_group_chat_creation(&self, room: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().cancel_creation(room)
    }

    /// Change the subject of `room`.
    pub fn set_group_chat_subject(&self, room: &str, subject: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().set_subject(room, subject)
    }

    /// Send a message to `room`. An empty body sends nothing and reports
    /// success.
    pub fn send_group_chat_message(&self, room: &str, body: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().send_message(room, body)
    }

    /// Invite `user` of our domain to `room`.
    pub fn invite_to_group_chat(&self, room: &str, user: &str, reason: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().invite(room, user, reason)
    }

    /// Kick `nick` from `room`.
    pub fn kick_from_group_chat(&self, room: &str, nick: &str, reason: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().kick(room, nick, reason)
    }

    /// Ban `nick` from `room`.
    pub fn ban_from_group_chat(&self, room: &str, nick: &str, reason: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().ban(room, nick, reason)
    }

    /// Lift a ban on `nick` in `room`.
    pub fn unban_from_group_chat(&self, room: &str, nick: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().unban(room, nick)
    }

    /// Request the member list of `room`.
    pub fn list_group_chat_users(&self, room: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().list_members(room)
    }

    /// Decline an invitation to `room` from `user`.
    pub fn decline_group_chat_invitation(&self, room: &str, user: &str, reason: &str) -> bool {
        self.is_connected() && self.dispatcher.rooms().decline_invitation(room, user, reason)
    }

    /// Creation progress of `room`, if tracked.
    pub fn group_chat_creation_state(&self, room: &str) -> Option<CreationState> {
        self.dispatcher.rooms().creation_state(room)
    }

    /// Whether the client is joined to `room`.
    pub fn is_group_chat_joined(&self, room: &str) -> bool {
        self.dispatcher.rooms().is_joined(room)
    }
}

impl<E: ProtocolEngine, H: EventHandler> Drop for Client<E, H> {
    fn drop(&mut self) {
        if self.driver.is_running() || self.driver.is_connected() {
            self.driver.disconnect();
        } else {
            self.dispatcher.dispose_sessions();
        }
    }
}
