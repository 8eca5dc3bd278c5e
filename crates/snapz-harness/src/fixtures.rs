//! Builders for inbound events used across tests.

use snapz_session::{
    CertInfo, DataForm, DiscoItem, FieldType, FormKind, Jid, Participant, PresenceKind, ProtocolEvent,
    form::fields,
};

/// Fixture account. Its conference service is [`SERVICE`].
pub const ACCOUNT: &str = "alice@example.com";

/// Conference service derived from [`ACCOUNT`].
pub const SERVICE: &str = "conference.com";

/// The nine configuration field groups in submission order, as a server
/// advertising every option would list them.
pub const CONFIG_FIELDS: [&str; 10] = [
    fields::ROOM_NAME,
    fields::ROOM_DESC,
    fields::PERSISTENT,
    fields::PASSWORD_PROTECTED,
    fields::ROOM_SECRET,
    fields::MAX_USERS,
    fields::MEMBERS_ONLY,
    fields::CHANGE_SUBJECT,
    fields::ALLOW_INVITES,
    fields::ALLOW_VOICE_REQUESTS,
];

/// Verified certificate for the fixture account's server.
pub fn certificate() -> CertInfo {
    CertInfo {
        status: 0,
        chain: true,
        issuer: "Example CA".to_string(),
        server: "example.com".to_string(),
        valid_from: 1_700_000_000,
        valid_to: 1_800_000_000,
        protocol: "TLSv1.3".to_string(),
        cipher: "AES-256-GCM".to_string(),
        mac: "AEAD".to_string(),
        compression: "NULL".to_string(),
    }
}

/// Configuration form advertising `names`.
pub fn config_form(names: &[&str]) -> DataForm {
    let mut form = DataForm::new(FormKind::Form, "Room configuration", vec![
        "Complete this form to configure the room".to_string(),
    ]);
    for name in names {
        form.add_field(FieldType::TextSingle, name, "");
    }
    form
}

/// Configuration form advertising every field except `missing`.
pub fn config_form_without(missing: &str) -> DataForm {
    let names: Vec<&str> = CONFIG_FIELDS.iter().copied().filter(|f| *f != missing).collect();
    config_form(&names)
}

/// Occupant address `room@SERVICE/nick`.
pub fn occupant(room: &str, nick: &str) -> Jid {
    Jid::peer(room, SERVICE, Some(nick))
}

/// Peer address `user@example.com[/resource]`.
pub fn peer(user: &str, resource: Option<&str>) -> Jid {
    Jid::peer(user, "example.com", resource)
}

/// Presence update for `nick` in `room`.
pub fn presence(room: &str, nick: &str, kind: PresenceKind, reason: &str, status: &str) -> ProtocolEvent {
    ProtocolEvent::RoomPresence {
        room: room.to_string(),
        participant: Participant {
            nick: occupant(room, nick),
            jid: None,
            reason: reason.to_string(),
            status: status.to_string(),
            flags: 0,
        },
        presence: kind,
    }
}

/// Public or private message from `nick` in `room`.
pub fn room_message(room: &str, nick: &str, body: &str, private: bool) -> ProtocolEvent {
    ProtocolEvent::RoomMessage {
        room: room.to_string(),
        from: occupant(room, nick),
        body: body.to_string(),
        stamp: None,
        private,
    }
}

/// Disco items listing `names` as occupants of `room`.
pub fn room_items(room: &str, names: &[&str]) -> ProtocolEvent {
    ProtocolEvent::RoomItems {
        room: room.to_string(),
        items: names
            .iter()
            .map(|name| DiscoItem {
                jid: occupant(room, name),
                name: (*name).to_string(),
                node: String::new(),
            })
            .collect(),
    }
}
