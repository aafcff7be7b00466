//! Representative entity and value types
//!
//! Each type is a thin newtype over [`Entity`](crate::model::Entity) or
//! [`ClientValue`](crate::model::ClientValue) with typed accessors, a static
//! default table and the service operations the server exposes for it.

pub mod campaign_publication;
pub mod change_item;
pub mod online_meeting;
pub mod policies;
pub mod shared_document_info;
pub mod user_profile;

pub use campaign_publication::{CampaignPublication, HighlightsInfo};
pub use change_item::{ChangeItem, ContentTypeId, SharedWithUser};
pub use online_meeting::{ItemBody, MeetingParticipants, OnlineMeeting};
pub use policies::{
    AuthenticationMethodsPolicy, AuthorizationPolicy, ConditionalAccessPolicy, PolicyRoot,
};
pub use shared_document_info::{Principal, SharedDocumentInfo};
pub use user_profile::{FollowedContent, Site, UserProfile};
