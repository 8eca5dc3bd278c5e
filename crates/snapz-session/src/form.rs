//! Room configuration forms.
//!
//! The server describes the configuration options it supports as a data form.
//! [`build_config_submission`] fills a submit form from a [`GroupChatConfig`]
//! using only the fields the server advertised: a field the server did not
//! offer is never sent.
//!
//! Fields are matched in a fixed order and matching stops at the first field
//! group the server does not advertise. Everything after that point is left
//! out even if the server offers it, and the submission is reported as
//! incomplete.

/// Form type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// Form to be filled
    Form,
    /// Filled form being submitted
    Submit,
    /// Cancelled form
    Cancel,
    /// Result set
    Result,
}

/// Data form field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Boolean (`"0"`/`"1"`)
    Boolean,
    /// Single line of text
    TextSingle,
    /// Multiple lines of text
    TextMulti,
    /// Obscured text (passwords)
    TextPrivate,
    /// Single choice from a list
    ListSingle,
    /// Multiple choices from a list
    ListMulti,
    /// Read-only text
    Fixed,
    /// Hidden value
    Hidden,
}

/// A single data form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Variable name (`var`)
    pub name: String,
    /// Field type
    pub kind: FieldType,
    /// Field values
    pub values: Vec<String>,
    /// Human-readable label
    pub label: String,
    /// Whether the field is required
    pub required: bool,
}

impl FormField {
    /// Field with a single value and no label.
    pub fn new(kind: FieldType, name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            values: vec![value.to_string()],
            label: String::new(),
            required: false,
        }
    }

    /// First value, or an empty string.
    pub fn value(&self) -> &str {
        self.values.first().map_or("", String::as_str)
    }
}

/// Data form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataForm {
    /// Form type
    pub kind: FormKind,
    /// Form title
    pub title: String,
    /// Natural-language instructions
    pub instructions: Vec<String>,
    /// Fields in document order
    pub fields: Vec<FormField>,
}

impl DataForm {
    /// Empty form of the given kind.
    pub fn new(kind: FormKind, title: &str, instructions: Vec<String>) -> Self {
        Self { kind, title: title.to_string(), instructions, fields: Vec::new() }
    }

    /// Whether a field with this name is present.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Field by name.
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Append a single-valued field.
    pub fn add_field(&mut self, kind: FieldType, name: &str, value: &str) {
        self.fields.push(FormField::new(kind, name, value));
    }
}

/// Room configuration field names (XEP-0045 `muc#roomconfig`).
pub mod fields {
    /// Natural-language room name
    pub const ROOM_NAME: &str = "muc#roomconfig_roomname";
    /// Room description
    pub const ROOM_DESC: &str = "muc#roomconfig_roomdesc";
    /// Room survives the last occupant leaving
    pub const PERSISTENT: &str = "muc#roomconfig_persistentroom";
    /// Room requires a password
    pub const PASSWORD_PROTECTED: &str = "muc#roomconfig_passwordprotectedroom";
    /// Room password
    pub const ROOM_SECRET: &str = "muc#roomconfig_roomsecret";
    /// Maximum number of occupants
    pub const MAX_USERS: &str = "muc#roomconfig_maxusers";
    /// Only members may enter
    pub const MEMBERS_ONLY: &str = "muc#roomconfig_membersonly";
    /// Occupants may change the subject
    pub const CHANGE_SUBJECT: &str = "muc#roomconfig_changesubject";
    /// Occupants may invite others
    pub const ALLOW_INVITES: &str = "muc#roomconfig_allowinvites";
    /// Visitors may request voice
    pub const ALLOW_VOICE_REQUESTS: &str = "muc#roomconfig_allowvoicerequests";
}

/// Configuration applied to a room the client created.
///
/// Stored per room when `configure_group_chat` is called and consumed when the
/// server's configuration form arrives. A new call replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChatConfig {
    /// Room title
    pub title: String,
    /// Room description
    pub description: String,
    /// Keep the room after the last occupant leaves
    pub is_persistent: bool,
    /// Room password; empty means unprotected
    pub password: String,
    /// Maximum occupants, as offered by the server's list
    pub max_users: String,
    /// Restrict entry to members
    pub members_only: bool,
    /// Let occupants change the subject
    pub subject_change_allowed: bool,
    /// Let occupants send invitations
    pub invite_allowed: bool,
    /// Let visitors request voice
    pub voice_request_allowed: bool,
}

impl Default for GroupChatConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            is_persistent: false,
            password: String::new(),
            max_users: "200".to_string(),
            members_only: false,
            subject_change_allowed: true,
            invite_allowed: false,
            voice_request_allowed: true,
        }
    }
}

/// Outcome of filling a configuration form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSubmission {
    /// Submit form holding the fields matched before the first gap
    pub form: DataForm,
    /// Whether every configuration field was matched
    pub complete: bool,
}

impl ConfigSubmission {
    /// The form to send, only if every field was matched.
    pub fn into_complete(self) -> Option<DataForm> {
        self.complete.then_some(self.form)
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Fill a submit form for `advertised` from `config`.
pub fn build_config_submission(config: &GroupChatConfig, advertised: &DataForm) -> ConfigSubmission {
    use fields::{
        ALLOW_INVITES, ALLOW_VOICE_REQUESTS, CHANGE_SUBJECT, MAX_USERS, MEMBERS_ONLY,
        PASSWORD_PROTECTED, PERSISTENT, ROOM_DESC, ROOM_NAME, ROOM_SECRET,
    };

    let groups: [&[(FieldType, &str, &str)]; 9] = [
        &[(FieldType::TextSingle, ROOM_NAME, &config.title)],
        &[(FieldType::TextSingle, ROOM_DESC, &config.description)],
        &[(FieldType::Boolean, PERSISTENT, flag(config.is_persistent))],
        &[
            (FieldType::Boolean, PASSWORD_PROTECTED, flag(!config.password.is_empty())),
            (FieldType::TextPrivate, ROOM_SECRET, &config.password),
        ],
        &[(FieldType::ListSingle, MAX_USERS, &config.max_users)],
        &[(FieldType::Boolean, MEMBERS_ONLY, flag(config.members_only))],
        &[(FieldType::Boolean, CHANGE_SUBJECT, flag(config.subject_change_allowed))],
        &[(FieldType::Boolean, ALLOW_INVITES, flag(config.invite_allowed))],
        &[(FieldType::Boolean, ALLOW_VOICE_REQUESTS, flag(config.voice_request_allowed))],
    ];

    let mut form =
        DataForm::new(FormKind::Submit, &advertised.title, advertised.instructions.clone());

    for group in groups {
        if !group.iter().all(|(_, name, _)| advertised.has_field(name)) {
            return ConfigSubmission { form, complete: false };
        }
        for (kind, name, value) in group {
            form.add_field(*kind, name, value);
        }
    }

    ConfigSubmission { form, complete: true }
}

#[cfg(test)]
mod tests {
    use super::{
        fields::{
            ALLOW_INVITES, ALLOW_VOICE_REQUESTS, CHANGE_SUBJECT, MAX_USERS, MEMBERS_ONLY,
            PASSWORD_PROTECTED, PERSISTENT, ROOM_DESC, ROOM_NAME, ROOM_SECRET,
        },
        *,
    };

    const ALL_FIELDS: [&str; 10] = [
        ROOM_NAME,
        ROOM_DESC,
        PERSISTENT,
        PASSWORD_PROTECTED,
        ROOM_SECRET,
        MAX_USERS,
        MEMBERS_ONLY,
        CHANGE_SUBJECT,
        ALLOW_INVITES,
        ALLOW_VOICE_REQUESTS,
    ];

    fn advertised(names: &[&str]) -> DataForm {
        let mut form = DataForm::new(FormKind::Form, "Configuration", vec!["Fill it".into()]);
        for name in names {
            form.add_field(FieldType::TextSingle, name, "");
        }
        form
    }

    fn names(form: &DataForm) -> Vec<&str> {
        form.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn full_form_is_complete() {
        let config = GroupChatConfig {
            title: "Lobby".into(),
            password: "hunter2".into(),
            ..GroupChatConfig::default()
        };
        let submission = build_config_submission(&config, &advertised(&ALL_FIELDS));

        assert!(submission.complete);
        assert_eq!(names(&submission.form), ALL_FIELDS.to_vec());
        assert_eq!(submission.form.kind, FormKind::Submit);
        assert_eq!(submission.form.title, "Configuration");
        assert_eq!(submission.form.field(ROOM_NAME).map(FormField::value), Some("Lobby"));
        assert_eq!(submission.form.field(PASSWORD_PROTECTED).map(FormField::value), Some("1"));
        assert_eq!(submission.form.field(ROOM_SECRET).map(FormField::value), Some("hunter2"));
        assert_eq!(submission.form.field(MAX_USERS).map(FormField::value), Some("200"));
    }

    #[test]
    fn missing_max_users_halts_at_that_field() {
        let offered: Vec<&str> = ALL_FIELDS.iter().copied().filter(|f| *f != MAX_USERS).collect();
        assert_eq!(offered.len(), 9);

        let submission = build_config_submission(&GroupChatConfig::default(), &advertised(&offered));

        assert!(!submission.complete);
        assert_eq!(names(&submission.form), vec![
            ROOM_NAME,
            ROOM_DESC,
            PERSISTENT,
            PASSWORD_PROTECTED,
            ROOM_SECRET
        ]);
        assert!(!submission.form.has_field(MAX_USERS));
        assert!(!submission.form.has_field(MEMBERS_ONLY));
        assert!(submission.into_complete().is_none());
    }

    #[test]
    fn password_pair_requires_both_fields() {
        let offered = [ROOM_NAME, ROOM_DESC, PERSISTENT, PASSWORD_PROTECTED, MAX_USERS];
        let submission = build_config_submission(&GroupChatConfig::default(), &advertised(&offered));

        assert!(!submission.complete);
        assert_eq!(names(&submission.form), vec![ROOM_NAME, ROOM_DESC, PERSISTENT]);
    }

    #[test]
    fn empty_password_is_not_protected() {
        let submission =
            build_config_submission(&GroupChatConfig::default(), &advertised(&ALL_FIELDS));
        assert_eq!(submission.form.field(PASSWORD_PROTECTED).map(FormField::value), Some("0"));
    }

    #[test]
    fn default_config_matches_library_defaults() {
        let config = GroupChatConfig::default();
        assert_eq!(config.max_users, "200");
        assert!(!config.is_persistent);
        assert!(!config.members_only);
        assert!(config.subject_change_allowed);
        assert!(!config.invite_allowed);
        assert!(config.voice_request_allowed);
    }

    #[test]
    fn nothing_advertised_yields_empty_incomplete_form() {
        let submission = build_config_submission(&GroupChatConfig::default(), &advertised(&[]));
        assert!(!submission.complete);
        assert!(submission.form.fields.is_empty());
    }
}
