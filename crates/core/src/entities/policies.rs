//! Directory policies

use crate::entity_type;
use crate::model::{defaults, EntityCollection, PropertyDefault};

static POLICY_ROOT_DEFAULTS: &[PropertyDefault] = &[
    PropertyDefault::new(
        "authenticationMethodsPolicy",
        defaults::entity::<AuthenticationMethodsPolicy>,
    ),
    PropertyDefault::new("authorizationPolicy", defaults::entity::<AuthorizationPolicy>),
    PropertyDefault::new(
        "conditionalAccessPolicies",
        defaults::collection::<ConditionalAccessPolicy>,
    ),
];

entity_type! {
    /// Entry point to the tenant's policies
    pub struct PolicyRoot => "microsoft.graph.policyRoot", defaults = POLICY_ROOT_DEFAULTS;
}

entity_type! {
    /// Tenant-wide authorization settings. Always exists for the tenant.
    pub struct AuthorizationPolicy => "microsoft.graph.authorizationPolicy";
}

entity_type! {
    /// Authentication methods users may sign in and perform MFA with
    pub struct AuthenticationMethodsPolicy => "microsoft.graph.authenticationMethodsPolicy";
}

entity_type! {
    pub struct ConditionalAccessPolicy => "microsoft.graph.conditionalAccessPolicy";
}

impl PolicyRoot {
    pub fn authentication_methods_policy(&self) -> AuthenticationMethodsPolicy {
        self.get_entity("authenticationMethodsPolicy")
    }

    pub fn authorization_policy(&self) -> AuthorizationPolicy {
        self.get_entity("authorizationPolicy")
    }

    pub fn conditional_access_policies(&self) -> EntityCollection<ConditionalAccessPolicy> {
        self.get_collection("conditionalAccessPolicies")
    }
}

impl AuthorizationPolicy {
    /// Whether users can join the tenant by email validation.
    pub fn allowed_to_sign_up_email_based_subscriptions(&self) -> Option<bool> {
        self.get_bool("allowedToSignUpEmailBasedSubscriptions")
    }

    pub fn display_name(&self) -> Option<String> {
        self.get_string("displayName")
    }
}

impl AuthenticationMethodsPolicy {
    pub fn display_name(&self) -> Option<String> {
        self.get_string("displayName")
    }
}

impl ConditionalAccessPolicy {
    pub fn display_name(&self) -> Option<String> {
        self.get_string("displayName")
    }

    /// `enabled`, `disabled` or `enabledForReportingButNotEnforced`
    pub fn state(&self) -> Option<String> {
        self.get_string("state")
    }
}
