//! Online meetings

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{defaults, ClientValueType, PropertyDefault};
use crate::{client_value_type, entity_type};

static ONLINE_MEETING_DEFAULTS: &[PropertyDefault] = &[
    PropertyDefault::new("allowedPresenters", defaults::strings),
    PropertyDefault::new("participants", defaults::value::<MeetingParticipants>),
    PropertyDefault::new("startDateTime", defaults::timestamp),
    PropertyDefault::new("endDateTime", defaults::timestamp),
    PropertyDefault::new("joinInformation", defaults::value::<ItemBody>),
];

entity_type! {
    /// A meeting with its join URL, participants and description.
    pub struct OnlineMeeting => "microsoft.graph.onlineMeeting", defaults = ONLINE_MEETING_DEFAULTS;
}

client_value_type! {
    /// Organizer and attendees of a meeting
    pub struct MeetingParticipants => "microsoft.graph.meetingParticipants";
}

client_value_type! {
    /// Body of an item, `text` or `html`
    pub struct ItemBody => "microsoft.graph.itemBody";
}

impl OnlineMeeting {
    pub fn subject(&self) -> Option<String> {
        self.get_string("subject")
    }

    pub fn set_subject(&self, subject: &str) -> &Self {
        self.set_property("subject", subject, true);
        self
    }

    /// Start time in UTC, `DateTime::<Utc>::MIN_UTC` when unknown.
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.get_timestamp("startDateTime")
    }

    pub fn set_start_datetime(&self, start: DateTime<Utc>) -> &Self {
        self.set_property("startDateTime", start, true);
        self
    }

    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.get_timestamp("endDateTime")
    }

    pub fn set_end_datetime(&self, end: DateTime<Utc>) -> &Self {
        self.set_property("endDateTime", end, true);
        self
    }

    pub fn allowed_presenters(&self) -> Vec<String> {
        self.get_strings("allowedPresenters")
    }

    pub fn allow_attendee_to_enable_camera(&self) -> Option<bool> {
        self.get_bool("allowAttendeeToEnableCamera")
    }

    pub fn allow_attendee_to_enable_mic(&self) -> Option<bool> {
        self.get_bool("allowAttendeeToEnableMic")
    }

    pub fn allow_meeting_chat(&self) -> Option<String> {
        self.get_string("allowMeetingChat")
    }

    pub fn allow_participants_to_change_name(&self) -> Option<bool> {
        self.get_bool("allowParticipantsToChangeName")
    }

    /// Content stream of the attendee report, if one was generated
    pub fn attendee_report(&self) -> Option<String> {
        self.get_string("attendeeReport")
    }

    pub fn participants(&self) -> MeetingParticipants {
        self.get_value("participants")
    }

    pub fn join_information(&self) -> ItemBody {
        self.get_value("joinInformation")
    }

    pub fn join_web_url(&self) -> Option<String> {
        self.get_string("joinWebUrl")
    }

    pub fn video_teleconference_id(&self) -> Option<String> {
        self.get_string("videoTeleconferenceId")
    }
}

impl MeetingParticipants {
    /// Organizer's `meetingParticipantInfo`, `null` when unknown.
    pub fn organizer(&self) -> Value {
        self.get("organizer")
    }

    pub fn attendees(&self) -> Vec<Value> {
        match self.get("attendees") {
            Value::Array(items) => items,
            _ => Vec::new(),
        }
    }
}

impl ItemBody {
    pub fn new(content: &str, content_type: &str) -> Self {
        let mut body = Self::empty();
        body.set("content", content).set("contentType", content_type);
        body
    }

    pub fn content(&self) -> Option<&str> {
        self.get_str("content")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_str("contentType")
    }
}
