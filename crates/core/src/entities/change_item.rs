//! Change log entries for list items

use chrono::{DateTime, Utc};

use crate::model::{defaults, ClientValueCollection, PropertyDefault};
use crate::{client_value_type, entity_type};

static CHANGE_ITEM_DEFAULTS: &[PropertyDefault] = &[
    PropertyDefault::new("ContentTypeId", defaults::value::<ContentTypeId>),
    PropertyDefault::new("SharedByUser", defaults::value::<SharedWithUser>),
    PropertyDefault::new("SharedWithUsers", defaults::values::<SharedWithUser>),
    PropertyDefault::new("Time", defaults::timestamp),
];

entity_type! {
    /// A change to a list item, as returned by change queries
    pub struct ChangeItem => "SP.ChangeItem", defaults = CHANGE_ITEM_DEFAULTS;
}

client_value_type! {
    pub struct ContentTypeId => "SP.ContentTypeId";
}

client_value_type! {
    /// A user an item was shared with (or by)
    pub struct SharedWithUser => "SP.Sharing.SharedWithUser";
}

impl ChangeItem {
    /// Activity type, one of the `ChangeActivityType` names
    pub fn activity_type(&self) -> Option<String> {
        self.get_string("ActivityType")
    }

    /// Numeric `ChangeType` of the change
    pub fn change_type(&self) -> Option<i64> {
        self.get_i64("ChangeType")
    }

    pub fn change_time(&self) -> DateTime<Utc> {
        self.get_timestamp("Time")
    }

    pub fn site_id(&self) -> Option<String> {
        self.get_string("SiteId")
    }

    pub fn content_type_id(&self) -> ContentTypeId {
        self.get_value("ContentTypeId")
    }

    pub fn shared_by_user(&self) -> SharedWithUser {
        self.get_value("SharedByUser")
    }

    pub fn shared_with_users(&self) -> ClientValueCollection<SharedWithUser> {
        self.get_values("SharedWithUsers")
    }
}

impl ContentTypeId {
    /// Hex identifier, e.g. `0x0101`
    pub fn string_value(&self) -> Option<&str> {
        self.get_str("StringValue")
    }
}

impl SharedWithUser {
    pub fn email(&self) -> Option<&str> {
        self.get_str("Email")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("Name")
    }
}
