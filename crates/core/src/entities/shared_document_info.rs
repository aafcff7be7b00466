//! Sharing details of documents

use crate::model::{defaults, PropertyDefault};
use crate::{client_value_type, entity_type};

static SHARED_DOCUMENT_INFO_DEFAULTS: &[PropertyDefault] =
    &[PropertyDefault::new("Author", defaults::value::<Principal>)];

entity_type! {
    pub struct SharedDocumentInfo => "SP.Sharing.SharedDocumentInfo",
        defaults = SHARED_DOCUMENT_INFO_DEFAULTS;
}

client_value_type! {
    /// A user or group in a sharing context
    pub struct Principal => "SP.Sharing.Principal";
}

impl SharedDocumentInfo {
    /// Recent sharing activity on the document, as returned by the server
    pub fn activity(&self) -> serde_json::Value {
        self.get_json("Activity")
    }

    pub fn author(&self) -> Principal {
        self.get_value("Author")
    }
}

impl Principal {
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
    }

    pub fn login_name(&self) -> Option<&str> {
        self.get_str("loginName")
    }
}
