//! Network loop tests.
//!
//! Cover both pumping modes against the scripted engine:
//! - threaded: start/stop hooks, disconnect joins before returning
//! - manual: `update` classification of terminal and recoverable errors
//! - session disposal whenever the connection ends

use std::{
    sync::{Arc, Barrier},
    thread,
    time::Duration,
};

use snapz_harness::{EngineCall, RecordingHandler, ScriptedEngine, fixtures};
use snapz_session::{
    Client, ClientConfig, ClientError, ConnectionError, ConnectionState, CreationState, EngineError,
    JoinOptions, ProtocolEvent, SessionEvent,
};

const WAIT: Duration = Duration::from_secs(5);

type TestClient = Client<ScriptedEngine, RecordingHandler>;

fn build(engine: ScriptedEngine, handler: RecordingHandler) -> TestClient {
    Client::with_engine(ClientConfig::new(fixtures::ACCOUNT, "secret"), engine, handler).unwrap()
}

fn manual(handler: RecordingHandler) -> TestClient {
    let client = build(ScriptedEngine::new(), handler);
    client.connect(false).unwrap();
    assert!(client.update(Some(Duration::ZERO)));
    client
}

fn threaded(handler: RecordingHandler) -> TestClient {
    let client = build(ScriptedEngine::new(), handler);
    client.connect(true).unwrap();
    assert!(client.handler().wait_for(WAIT, |e| *e == SessionEvent::Connected));
    client
}

fn chat_message(body: &str) -> ProtocolEvent {
    ProtocolEvent::ChatMessage {
        from: fixtures::peer("bob", Some("phone")),
        body: body.to_string(),
        subject: String::new(),
        stamp: None,
    }
}

fn has_message(body: &'static str) -> impl Fn(&SessionEvent) -> bool {
    move |e| matches!(e, SessionEvent::ChatMessage { body: b, .. } if b == body)
}

fn disconnects(client: &TestClient) -> Vec<ConnectionError> {
    client
        .handler()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Disconnected { error } => Some(error),
            _ => None,
        })
        .collect()
}

/// Threaded connect runs the loop and reports the connection
#[test]
fn threaded_connect_starts_network_loop() {
    let client = threaded(RecordingHandler::new());

    assert!(client.is_running());
    assert!(client.is_connected());
    assert_eq!(client.handler().started(), 1);

    client.engine().push(chat_message("hi"));
    assert!(client.handler().wait_for(WAIT, has_message("hi")));

    client.disconnect();

    assert!(!client.is_running());
    assert!(!client.is_connected());
    assert_eq!(client.handler().stopped(), 1);
}

/// Disconnect returns only after an in-flight callback has finished
#[test]
fn disconnect_waits_for_inflight_callback() {
    let gate = Arc::new(Barrier::new(2));
    let client = build(ScriptedEngine::new(), RecordingHandler::new().gated(Arc::clone(&gate)));
    client.connect(true).unwrap();

    thread::scope(|s| {
        let disconnecting = s.spawn(|| {
            client.disconnect();
            (client.handler().count(|e| *e == SessionEvent::Connected), client.handler().stopped())
        });

        // Release the Connected callback the network thread is parked in.
        gate.wait();

        assert_eq!(disconnecting.join().unwrap(), (1, 1));
    });

    assert!(!client.is_running());
    assert!(!client.is_connected());
}

/// Owner disconnect from the threaded loop reports exactly one disconnect
#[test]
fn threaded_disconnect_reports_disconnected() {
    let client = threaded(RecordingHandler::new());

    client.disconnect();
    client.disconnect();

    assert_eq!(disconnects(&client), vec![ConnectionError::UserDisconnected]);
    assert_eq!(client.handler().stopped(), 1);
}

/// Owner disconnect while pumping manually reports exactly one disconnect
#[test]
fn manual_disconnect_reports_disconnected() {
    let client = manual(RecordingHandler::new());

    client.disconnect();
    client.disconnect();

    assert_eq!(disconnects(&client), vec![ConnectionError::UserDisconnected]);
    assert_eq!(client.handler().events().first(), Some(&SessionEvent::Connected));
}

/// A disconnect the engine already reported is not repeated
#[test]
fn engine_reported_disconnect_is_not_repeated() {
    let client = manual(RecordingHandler::new());
    client.engine().push(ProtocolEvent::Disconnect(ConnectionError::Stream("reset".to_string())));
    assert!(client.update(Some(Duration::ZERO)));

    client.disconnect();

    assert_eq!(disconnects(&client), vec![ConnectionError::Stream("reset".to_string())]);
}

/// Rejected server certificate closes the connection with a TLS error
#[test]
fn rejected_certificate_ends_threaded_connection() {
    let client = threaded(RecordingHandler::new());
    assert!(client.begin_group_chat("lobby", &JoinOptions::default()));

    client.engine().push(ProtocolEvent::TlsConnect { info: fixtures::certificate() });

    assert!(client.handler().wait_stopped(WAIT));
    assert_eq!(client.handler().certificates(), vec![fixtures::certificate()]);
    assert_eq!(
        client.engine().count(|c| *c == EngineCall::CertificateVerdict { accepted: false }),
        1
    );
    assert_eq!(disconnects(&client), vec![ConnectionError::Tls(
        "certificate rejected".to_string()
    )]);
    assert!(!client.is_connected());
    assert_eq!(client.engine().live_rooms(), 0);
}

/// Accepted server certificate keeps the connection up
#[test]
fn accepted_certificate_keeps_connection() {
    let client = manual(RecordingHandler::new().accepting_certificates(true));

    client.engine().push(ProtocolEvent::TlsConnect { info: fixtures::certificate() });
    assert!(client.update(Some(Duration::ZERO)));
    assert!(client.update(Some(Duration::ZERO)));

    assert!(client.is_connected());
    assert!(disconnects(&client).is_empty());
}

/// Reconnecting after a lost connection starts a fresh loop that keeps the
/// sessions opened since
#[test]
fn reconnect_after_connection_loss() {
    let client = threaded(RecordingHandler::new());
    client.engine().push(ProtocolEvent::Disconnect(ConnectionError::Stream(
        "reset".to_string(),
    )));
    client.engine().push_error(ConnectionError::NotConnected);
    assert!(client.handler().wait_stopped(WAIT));
    client.handler().take_events();

    client.connect(true).unwrap();
    assert!(client.handler().wait_for(WAIT, |e| *e == SessionEvent::Connected));
    assert!(client.begin_group_chat("lobby", &JoinOptions::default()));

    assert!(client.is_running());
    assert_eq!(client.handler().started(), 2);
    assert_eq!(client.handler().stopped(), 1);
    assert_eq!(client.engine().live_rooms(), 1);
    assert_eq!(client.group_chat_creation_state("lobby"), Some(CreationState::None));

    client.disconnect();

    assert_eq!(disconnects(&client), vec![ConnectionError::UserDisconnected]);
    assert_eq!(client.engine().live_rooms(), 0);
}

/// Disconnect tears down every session
#[test]
fn disconnect_disposes_sessions() {
    let client = threaded(RecordingHandler::new());
    assert!(client.begin_group_chat("lobby", &JoinOptions::default()));
    assert!(client.send_chat_message("bob", "hi", "", Some("phone")));

    client.disconnect();

    assert_eq!(client.engine().live_rooms(), 0);
    assert_eq!(client.engine().live_chats(), 0);
    assert_eq!(client.group_chat_creation_state("lobby"), None);
    assert_eq!(client.engine().count(|c| matches!(c, EngineCall::LeaveRoom { .. })), 1);
}

/// Connection lost under the network thread disposes sessions on its own
#[test]
fn threaded_connection_loss_disposes_sessions() {
    let client = threaded(RecordingHandler::new());
    assert!(client.begin_group_chat("lobby", &JoinOptions::default()));

    client.engine().push(ProtocolEvent::Disconnect(ConnectionError::Stream(
        "reset".to_string(),
    )));
    client.engine().push_error(ConnectionError::NotConnected);

    assert!(client.handler().wait_stopped(WAIT));
    assert!(!client.is_running());
    assert!(!client.is_connected());
    assert_eq!(client.engine().live_rooms(), 0);
    assert_eq!(client.handler().count(|e| matches!(e, SessionEvent::Disconnected { .. })), 1);
}

/// Recoverable error keeps the threaded loop alive
#[test]
fn threaded_recoverable_error_keeps_running() {
    let client = threaded(RecordingHandler::new());

    client.engine().push_error(ConnectionError::Io("timeout".to_string()));
    client.engine().push(chat_message("after"));

    assert!(client.handler().wait_for(WAIT, has_message("after")));
    assert!(client.is_running());
    assert_eq!(client.handler().recover_requests(), vec![ConnectionError::Io(
        "timeout".to_string()
    )]);

    client.disconnect();
}

/// Manual update is a no-op while the network thread runs
#[test]
fn update_defers_to_running_thread() {
    let client = threaded(RecordingHandler::new());

    assert!(client.update(Some(Duration::ZERO)));

    client.disconnect();
}

/// Terminal receive error ends manual pumping and disposes sessions
#[test]
fn manual_terminal_error_stops() {
    let client = manual(RecordingHandler::new());
    assert!(client.begin_group_chat("lobby", &JoinOptions::default()));

    client.engine().push_error(ConnectionError::NotConnected);

    assert!(!client.update(Some(Duration::ZERO)));
    assert!(!client.is_connected());
    assert_eq!(client.engine().live_rooms(), 0);
    assert!(client.handler().recover_requests().is_empty());
    assert!(!client.begin_group_chat("lobby", &JoinOptions::default()));
}

/// Recoverable error asks the application and honours its answer
#[test]
fn manual_recoverable_error_asks_handler() {
    let keep = manual(RecordingHandler::new());
    keep.engine().push_error(ConnectionError::Stream("hiccup".to_string()));
    assert!(keep.update(Some(Duration::ZERO)));
    assert!(keep.is_connected());
    assert_eq!(keep.handler().recover_requests().len(), 1);

    let give_up = manual(RecordingHandler::new().recovering(false));
    assert!(give_up.begin_group_chat("lobby", &JoinOptions::default()));
    give_up.engine().push_error(ConnectionError::Stream("hiccup".to_string()));
    assert!(!give_up.update(Some(Duration::ZERO)));
    assert!(!give_up.is_connected());
    assert_eq!(give_up.engine().live_rooms(), 0);
}

/// Error after the engine dropped the stream stops without asking
#[test]
fn error_while_disconnected_stops_without_asking() {
    let client = manual(RecordingHandler::new());

    client.engine().set_state(ConnectionState::Disconnected);
    client.engine().push_error(ConnectionError::Authentication);

    assert!(!client.update(Some(Duration::ZERO)));
    assert!(client.handler().recover_requests().is_empty());
    assert!(!client.is_connected());
}

/// Idle receive keeps manual pumping alive
#[test]
fn manual_idle_update_stays_connected() {
    let client = manual(RecordingHandler::new());

    assert!(client.update(Some(Duration::ZERO)));
    assert!(client.update(Some(Duration::from_millis(1))));
    assert!(client.is_connected());
}

/// Engine refusing to connect surfaces as an engine error
#[test]
fn connect_failure_is_reported() {
    let engine = ScriptedEngine::new().failing_connect(EngineError::Connect("refused".to_string()));
    let client = build(engine, RecordingHandler::new());

    let result = client.connect(true);

    assert!(matches!(result, Err(ClientError::Engine(EngineError::Connect(_)))));
    assert!(!client.is_connected());
    assert!(!client.is_running());
    assert_eq!(client.handler().started(), 0);
}

/// Connecting again while connected does nothing
#[test]
fn connect_twice_is_noop() {
    let client = manual(RecordingHandler::new());

    client.connect(false).unwrap();

    assert_eq!(client.engine().count(|c| *c == EngineCall::Connect), 1);
}

/// Suspended loop still shuts down cleanly and resumes on request
#[test]
fn suspend_and_resume() {
    let client = threaded(RecordingHandler::new());

    client.suspend();
    client.resume();
    client.engine().push(chat_message("back"));
    assert!(client.handler().wait_for(WAIT, has_message("back")));

    client.suspend();
    client.disconnect();

    assert!(!client.is_running());
    assert_eq!(client.handler().stopped(), 1);
}

/// Invalid account is rejected at construction
#[test]
fn invalid_account_is_rejected() {
    let result = Client::with_engine(
        ClientConfig::new("example.com", "secret"),
        ScriptedEngine::new(),
        RecordingHandler::new(),
    );

    assert!(matches!(result, Err(ClientError::Config(_))));
}
