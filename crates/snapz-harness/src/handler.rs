//! Recording event handler.
//!
//! [`RecordingHandler`] stores every [`SessionEvent`] and every decision it
//! was asked for, so tests can assert on exactly what the application saw.
//! Decisions are configurable with the builder methods.

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use snapz_session::{
    CertInfo, ConnectionError, ConnectionState, EventHandler, Invite, SessionEvent,
};

/// [`EventHandler`] that records everything.
pub struct RecordingHandler {
    events: Mutex<Vec<SessionEvent>>,
    recorded: Condvar,
    invites: Mutex<Vec<Invite>>,
    creation_requests: Mutex<Vec<String>>,
    recover_requests: Mutex<Vec<ConnectionError>>,
    certificates: Mutex<Vec<CertInfo>>,
    accept_certificates: AtomicBool,
    accept_rooms: AtomicBool,
    accept_invites: AtomicBool,
    recover: AtomicBool,
    started: AtomicUsize,
    stopped: AtomicUsize,
    gate: Mutex<Option<Arc<Barrier>>>,
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHandler {
    /// Handler with the library's default decisions: reject certificates,
    /// accept default room configuration, decline invitations, recover from
    /// receive errors.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            recorded: Condvar::new(),
            invites: Mutex::new(Vec::new()),
            creation_requests: Mutex::new(Vec::new()),
            recover_requests: Mutex::new(Vec::new()),
            certificates: Mutex::new(Vec::new()),
            accept_certificates: AtomicBool::new(false),
            accept_rooms: AtomicBool::new(true),
            accept_invites: AtomicBool::new(false),
            recover: AtomicBool::new(true),
            started: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Answer server certificates with `accept`.
    #[must_use]
    pub fn accepting_certificates(self, accept: bool) -> Self {
        self.accept_certificates.store(accept, Ordering::SeqCst);
        self
    }

    /// Answer room-creation notices with `accept`.
    #[must_use]
    pub fn accepting_default_room_config(self, accept: bool) -> Self {
        self.accept_rooms.store(accept, Ordering::SeqCst);
        self
    }

    /// Answer invitations with `accept`.
    #[must_use]
    pub fn accepting_invites(self, accept: bool) -> Self {
        self.accept_invites.store(accept, Ordering::SeqCst);
        self
    }

    /// Answer non-terminal receive errors with `recover`.
    #[must_use]
    pub fn recovering(self, recover: bool) -> Self {
        self.recover.store(recover, Ordering::SeqCst);
        self
    }

    /// Block the first `handle` call on `barrier` before recording it.
    #[must_use]
    pub fn gated(self, barrier: Arc<Barrier>) -> Self {
        *self.gate.lock() = Some(barrier);
        self
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    /// Invitations offered so far.
    pub fn invites(&self) -> Vec<Invite> {
        self.invites.lock().clone()
    }

    /// Rooms for which the default-configuration question was asked.
    pub fn creation_requests(&self) -> Vec<String> {
        self.creation_requests.lock().clone()
    }

    /// Certificates offered so far.
    pub fn certificates(&self) -> Vec<CertInfo> {
        self.certificates.lock().clone()
    }

    /// Errors offered to `recover`.
    pub fn recover_requests(&self) -> Vec<ConnectionError> {
        self.recover_requests.lock().clone()
    }

    /// Times the network loop started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Times the network loop stopped.
    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait until an event matching `pred` is recorded. Returns false on
    /// timeout.
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&SessionEvent) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        while !events.iter().any(&pred) {
            if self.recorded.wait_until(&mut events, deadline).timed_out() {
                return false;
            }
        }
        true
    }

    /// Wait until the network loop has stopped at least once. Returns false
    /// on timeout.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        while self.stopped() == 0 {
            if self.recorded.wait_until(&mut events, deadline).timed_out() {
                return false;
            }
        }
        true
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&self, event: SessionEvent) {
        let gate = self.gate.lock().take();
        if let Some(barrier) = gate {
            barrier.wait();
        }
        self.events.lock().push(event);
        self.recorded.notify_all();
    }

    fn accept_certificate(&self, info: &CertInfo) -> bool {
        self.certificates.lock().push(info.clone());
        self.accept_certificates.load(Ordering::SeqCst)
    }

    fn accept_default_room_config(&self, room: &str) -> bool {
        self.creation_requests.lock().push(room.to_string());
        self.accept_rooms.load(Ordering::SeqCst)
    }

    fn accept_invite(&self, invite: &Invite) -> bool {
        self.invites.lock().push(invite.clone());
        self.accept_invites.load(Ordering::SeqCst)
    }

    fn recover(&self, _state: ConnectionState, error: &ConnectionError) -> bool {
        self.recover_requests.lock().push(error.clone());
        self.recover.load(Ordering::SeqCst)
    }

    fn network_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn network_stopped(&self) {
        let _events = self.events.lock();
        self.stopped.fetch_add(1, Ordering::SeqCst);
        self.recorded.notify_all();
    }
}
