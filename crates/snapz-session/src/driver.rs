//! Network pump.
//!
//! The [`Driver`] owns the loop that feeds engine receives into the
//! dispatcher. It runs either on a dedicated network thread started by
//! [`Driver::connect`] or step by step from the owner via [`Driver::update`].
//!
//! # Lifecycle
//!
//! ```text
//! connect(true) ──► network thread: network_started
//!                     loop { wait while suspended; recv; classify }
//!                     fatal receive ──► dispose sessions
//!                   network_stopped
//! disconnect() ──► engine.disconnect ──► join ──► Disconnected ──► dispose sessions
//! ```
//!
//! `disconnect` returns only after the network thread has exited, so no
//! handler callback runs after it returns. If the engine did not report the
//! disconnect itself, `disconnect` delivers `Disconnected` with
//! `UserDisconnected` on the calling thread.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    dispatcher::Dispatcher,
    engine::{ConnectionState, ProtocolEngine},
    error::{ClientError, ConnectionError},
    event::EventHandler,
};

const NETWORK_THREAD_NAME: &str = "snapz-network";

/// Flags shared between the owner and the network thread.
#[derive(Debug, Default)]
struct Control {
    connected: AtomicBool,
    running: AtomicBool,
    suspended: Mutex<bool>,
    resumed: Condvar,
}

impl Control {
    fn wait_while_suspended(&self) {
        let mut suspended = self.suspended.lock();
        while *suspended && self.running.load(Ordering::Acquire) {
            self.resumed.wait(&mut suspended);
        }
    }

    fn set_suspended(&self, value: bool) {
        *self.suspended.lock() = value;
        self.resumed.notify_all();
    }

    /// Clear `running` under the suspend lock so a suspended loop cannot
    /// miss the wakeup.
    fn stop(&self) {
        let _suspended = self.suspended.lock();
        self.running.store(false, Ordering::Release);
        self.resumed.notify_all();
    }
}

struct NetworkThread {
    handle: JoinHandle<()>,
    id: ThreadId,
}

/// Drives the protocol engine and owns the network thread.
pub struct Driver<E: ProtocolEngine, H: EventHandler> {
    dispatcher: Arc<Dispatcher<E, H>>,
    control: Arc<Control>,
    thread: Mutex<Option<NetworkThread>>,
    recv_timeout: Option<Duration>,
}

impl<E: ProtocolEngine, H: EventHandler> Driver<E, H> {
    /// Driver pumping `dispatcher`'s engine with the given receive timeout
    /// (`None` blocks until data arrives).
    pub fn new(dispatcher: Arc<Dispatcher<E, H>>, recv_timeout: Option<Duration>) -> Self {
        Self {
            dispatcher,
            control: Arc::new(Control::default()),
            thread: Mutex::new(None),
            recv_timeout,
        }
    }

    /// Whether the client considers itself connected.
    pub fn is_connected(&self) -> bool {
        self.control.connected.load(Ordering::Acquire)
    }

    /// Whether the network thread is running.
    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::Acquire)
    }

    /// Connect the engine and, with `start_thread`, start the network
    /// thread. Without it the owner must pump with [`Driver::update`].
    ///
    /// Already connected (or already running when a thread is requested)
    /// is a no-op. This includes a handler calling `connect(true)` from its
    /// `Disconnected` callback: the loop delivering it is still running, so
    /// nothing reconnects.
    ///
    /// # Errors
    ///
    /// - `ClientError::Engine` if the engine refuses to connect
    /// - `ClientError::Spawn` if the network thread cannot be started; the
    ///   engine is disconnected again
    pub fn connect(&self, start_thread: bool) -> Result<(), ClientError> {
        if (start_thread && self.is_running()) || self.is_connected() {
            return Ok(());
        }
        // A loop that stopped on its own may still be disposing sessions.
        self.join_network_thread();

        self.dispatcher.engine().connect()?;
        self.control.connected.store(true, Ordering::Release);
        info!(threaded = start_thread, "engine connected");

        if start_thread {
            self.spawn()?;
        }
        Ok(())
    }

    fn join_network_thread(&self) {
        let network = self.thread.lock().take();
        if let Some(network) = network {
            if network.id == thread::current().id() {
                warn!("called from the network thread; not joining");
            } else if network.handle.join().is_err() {
                error!("network thread panicked");
            }
        }
    }

    fn spawn(&self) -> Result<(), ClientError> {
        self.control.running.store(true, Ordering::Release);

        let dispatcher = Arc::clone(&self.dispatcher);
        let control = Arc::clone(&self.control);
        let timeout = self.recv_timeout;

        let spawned = thread::Builder::new()
            .name(NETWORK_THREAD_NAME.to_string())
            .spawn(move || network_loop(&dispatcher, &control, timeout));

        match spawned {
            Ok(handle) => {
                let id = handle.thread().id();
                *self.thread.lock() = Some(NetworkThread { handle, id });
                Ok(())
            },
            Err(err) => {
                error!(error = %err, "failed to start network thread");
                self.dispatcher.engine().disconnect();
                self.control.connected.store(false, Ordering::Release);
                self.control.running.store(false, Ordering::Release);
                Err(ClientError::Spawn(err))
            },
        }
    }

    /// Pump the engine once from the owner thread.
    ///
    /// A no-op returning true while the network thread runs. Returns false
    /// once the connection is gone; sessions are disposed at that point.
    pub fn update(&self, timeout: Option<Duration>) -> bool {
        if self.is_running() {
            return true;
        }
        let alive = pump_once(&self.dispatcher, &self.control, timeout, false);
        if !alive {
            self.dispatcher.dispose_sessions();
        }
        alive
    }

    /// Pause the network loop between receives. Sessions are kept.
    pub fn suspend(&self) {
        debug!("suspending network loop");
        self.control.set_suspended(true);
    }

    /// Resume a suspended network loop.
    pub fn resume(&self) {
        debug!("resuming network loop");
        self.control.set_suspended(false);
    }

    /// Disconnect the engine, wait for the network thread to exit, report
    /// `Disconnected` once, and dispose every session.
    pub fn disconnect(&self) {
        let was_connected = self.is_connected() || self.is_running();
        self.dispatcher.engine().disconnect();
        self.control.stop();
        self.join_network_thread();

        if was_connected {
            self.dispatcher.report_disconnect(ConnectionError::UserDisconnected);
        }
        self.dispatcher.dispose_sessions();
        self.control.connected.store(false, Ordering::Release);
        info!("disconnected");
    }
}

fn network_loop<E: ProtocolEngine, H: EventHandler>(
    dispatcher: &Dispatcher<E, H>,
    control: &Control,
    timeout: Option<Duration>,
) {
    dispatcher.handler().network_started();
    debug!("network loop started");

    while control.running.load(Ordering::Acquire) {
        control.wait_while_suspended();
        if !control.running.load(Ordering::Acquire) {
            break;
        }
        if !pump_once(dispatcher, control, timeout, true) {
            if control.running.swap(false, Ordering::AcqRel) {
                // Connection lost on its own, not through disconnect().
                dispatcher.dispose_sessions();
            }
            break;
        }
        thread::yield_now();
    }

    debug!("network loop stopped");
    dispatcher.handler().network_stopped();
}

/// One receive and its classification. Returns whether to keep pumping.
fn pump_once<E: ProtocolEngine, H: EventHandler>(
    dispatcher: &Dispatcher<E, H>,
    control: &Control,
    timeout: Option<Duration>,
    threaded: bool,
) -> bool {
    let engine = dispatcher.engine();
    let received = engine.recv(timeout, &mut |event| dispatcher.dispatch(event));
    let state = engine.state();

    let alive = match received {
        Ok(()) => state != ConnectionState::Disconnected
            && (!threaded || control.running.load(Ordering::Acquire)),
        Err(err) if err.is_terminal() => {
            debug!(error = %err, "receive loop ended");
            false
        },
        Err(err) if state == ConnectionState::Disconnected => {
            warn!(error = %err, "connection lost");
            false
        },
        Err(err) => {
            let recovered = dispatcher.handler().recover(state, &err);
            warn!(error = %err, ?state, recovered, "receive error");
            recovered
        },
    };

    if !alive {
        control.connected.store(false, Ordering::Release);
    }
    alive
}
