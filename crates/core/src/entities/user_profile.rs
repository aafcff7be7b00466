//! User profiles

use serde_json::{json, Value};

use crate::entity_type;
use crate::model::{defaults, PropertyDefault};
use crate::runtime::ClientResult;

static USER_PROFILE_DEFAULTS: &[PropertyDefault] = &[
    PropertyDefault::new("FollowedContent", defaults::entity::<FollowedContent>),
    PropertyDefault::new("PersonalSite", defaults::entity::<Site>),
];

entity_type! {
    /// Profile of an individual user: account name, preferred name and
    /// personal site.
    pub struct UserProfile => "SP.UserProfiles.UserProfile", defaults = USER_PROFILE_DEFAULTS;
}

entity_type! {
    /// Documents and sites the user follows
    pub struct FollowedContent => "SP.UserProfiles.FollowedContent";
}

entity_type! {
    pub struct Site => "SP.Site";
}

impl UserProfile {
    pub fn account_name(&self) -> Option<String> {
        self.get_string("AccountName")
    }

    pub fn display_name(&self) -> Option<String> {
        self.get_string("DisplayName")
    }

    /// URL of the host of the user's personal site.
    pub fn my_site_host_url(&self) -> Option<String> {
        self.get_string("MySiteHostUrl")
    }

    pub fn public_url(&self) -> Option<String> {
        self.get_string("PublicUrl")
    }

    pub fn url_to_create_personal_site(&self) -> Option<String> {
        self.get_string("UrlToCreatePersonalSite")
    }

    pub fn followed_content(&self) -> FollowedContent {
        self.get_entity("FollowedContent")
    }

    pub fn personal_site(&self) -> Site {
        self.get_entity("PersonalSite")
    }

    /// Enqueue creation of the user's personal site for locale `lcid`.
    pub fn create_personal_site(&self, lcid: u32) -> &Self {
        self.invoke("CreatePersonalSite", Some(json!({ "lcid": lcid })));
        self
    }

    /// Enqueue a queued (asynchronous) personal site creation.
    /// `is_interactive` is true for requests made from a browser.
    pub fn create_personal_site_enque(&self, is_interactive: bool) -> &Self {
        self.invoke("CreatePersonalSiteEnque", Some(json!({ "isInteractive": is_interactive })));
        self
    }

    pub fn set_my_site_first_run_experience(&self, value: &str) -> &Self {
        self.invoke("SetMySiteFirstRunExperience", Some(json!({ "value": value })));
        self
    }

    /// Enqueue a change to whether the user's social data is shared.
    pub fn share_all_social_data(&self, share_all: bool) -> ClientResult<Value> {
        self.invoke_for("ShareAllSocialData", Some(json!({ "shareAll": share_all })), Value::Null)
    }
}

impl Site {
    pub fn url(&self) -> Option<String> {
        self.get_string("Url")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::EntityType;
    use crate::runtime::{ClientContext, HttpMethod};
    use crate::testing::ScriptedTransport;

    fn profile() -> (Arc<ScriptedTransport>, UserProfile) {
        let transport = Arc::new(ScriptedTransport::new());
        let context = ClientContext::new(transport.clone());
        let profile = context.resource::<UserProfile>("SP.UserProfiles.PeopleManager/me");
        (transport, profile)
    }

    #[test]
    fn test_unset_navigation_defaults_to_child_path() {
        let (_, profile) = profile();

        let followed = profile.followed_content();
        assert_eq!(followed.path().render(), "SP.UserProfiles.PeopleManager/me/FollowedContent");
        assert_eq!(followed.type_name(), FollowedContent::TYPE_NAME);
        assert_eq!(profile.personal_site().path().segment(), "PersonalSite");
        assert!(!profile.is_property_available("FollowedContent"));
    }

    #[test]
    fn test_default_reads_are_equal_but_independent() {
        let (_, profile) = profile();

        let first = profile.personal_site();
        let second = profile.personal_site();
        assert_eq!(first, second);
        assert!(!first.same_instance(&second));

        first.set_property("Url", "https://contoso.sharepoint.com/personal/jdoe", false);
        assert!(second.url().is_none());
        assert!(profile.personal_site().url().is_none());
    }

    #[tokio::test]
    async fn test_service_operations_post_their_parameters() {
        let (transport, profile) = profile();
        profile.create_personal_site(1033).create_personal_site_enque(false);
        let shared = profile.share_all_social_data(true);
        transport.respond_json(vec![
            serde_json::json!(null),
            serde_json::json!(null),
            serde_json::json!({"value": true}),
        ]);

        profile.execute_query().await.unwrap();

        let batch = transport.last_batch().unwrap();
        assert!(batch.iter().all(|r| r.method == HttpMethod::Post));
        assert_eq!(batch[0].address, "SP.UserProfiles.PeopleManager/me/CreatePersonalSite");
        assert_eq!(batch[0].body_text().as_deref(), Some(r#"{"lcid":1033}"#));
        assert_eq!(batch[1].body_text().as_deref(), Some(r#"{"isInteractive":false}"#));
        assert_eq!(batch[2].body_text().as_deref(), Some(r#"{"shareAll":true}"#));
        assert_eq!(shared.value(), serde_json::json!({"value": true}));
    }

    #[tokio::test]
    async fn test_get_populates_scalar_accessors() {
        let (transport, profile) = profile();
        transport.respond_json(vec![serde_json::json!({
            "AccountName": "i:0#.f|membership|jdoe@contoso.com",
            "DisplayName": "Jane Doe",
            "PublicUrl": "https://contoso-my.sharepoint.com/person.aspx"
        })]);

        profile.get().execute_query().await.unwrap();

        assert_eq!(profile.display_name().as_deref(), Some("Jane Doe"));
        assert_eq!(profile.account_name().as_deref(), Some("i:0#.f|membership|jdoe@contoso.com"));
        assert!(profile.my_site_host_url().is_none());
    }
}
