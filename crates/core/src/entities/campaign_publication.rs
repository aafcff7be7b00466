//! Campaign publications

use crate::entity_type;

entity_type! {
    /// A publishing page sent as an email campaign
    pub struct CampaignPublication => "SP.Publishing.CampaignPublication";
}

entity_type! {
    pub struct HighlightsInfo => "SP.Publishing.HighlightsInfo";
}

impl CampaignPublication {
    pub fn email_endpoint(&self) -> Option<String> {
        self.get_string("EmailEndpoint")
    }

    pub fn title(&self) -> Option<String> {
        self.get_string("Title")
    }

    /// Enqueue retrieval of the campaign's highlights. The returned entity is
    /// populated once the query runs.
    pub fn get_highlights_info(&self) -> HighlightsInfo {
        self.invoke_for_entity("GetHighlightsInfo", None)
    }
}
