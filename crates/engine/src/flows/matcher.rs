//! Keyword trigger matching for inbound messages.

use std::sync::Arc;

use tracing::debug;

use autoflow_core::{ChannelId, Flow, InboundMessage};

use crate::collaborators::Persistence;
use crate::error::CollaboratorError;

/// Pick the flow an inbound message triggers, if any.
///
/// Only active flows bound to `channel` are considered. Keywords match as
/// case-insensitive substrings of `body`; blank keywords never match. The
/// first flow in stored order wins.
pub fn select_flow<'a>(flows: &'a [Flow], channel: &ChannelId, body: &str) -> Option<&'a Flow> {
    let body = body.to_lowercase();
    flows
        .iter()
        .filter(|f| f.is_active && &f.target_channel_id == channel)
        .find(|f| {
            f.trigger_keywords.iter().any(|kw| {
                let kw = kw.trim().to_lowercase();
                !kw.is_empty() && body.contains(&kw)
            })
        })
}

#[derive(Clone)]
pub struct FlowTriggerMatcher {
    persistence: Arc<dyn Persistence>,
}

impl FlowTriggerMatcher {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    pub async fn find_match(&self, message: &InboundMessage) -> Result<Option<Flow>, CollaboratorError> {
        let flows = self.persistence.flows_for_channel(&message.channel_id).await?;
        let matched = select_flow(&flows, &message.channel_id, &message.body).cloned();
        debug!(
            channel_id = %message.channel_id,
            candidates = flows.len(),
            flow_id = ?matched.as_ref().map(|f| f.id),
            "flow trigger evaluated"
        );
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use autoflow_core::{FlowStep, UserId};
    use proptest::prelude::*;

    use super::*;
    use crate::collaborators::in_memory::InMemoryPersistence;

    fn flow(name: &str, channel: &str, keywords: &[&str]) -> Flow {
        Flow::new(
            name,
            UserId::new(),
            ChannelId::new(channel),
            keywords.iter().copied(),
            vec![FlowStep::Message { content: format!("from {name}") }],
        )
    }

    #[test]
    fn matches_case_insensitive_substring() {
        let flows = vec![flow("pricing", "wa-1", &["Price", "cost"])];
        let channel = ChannelId::new("wa-1");

        assert_eq!(select_flow(&flows, &channel, "WHAT is the COST?").unwrap().name, "pricing");
        assert_eq!(select_flow(&flows, &channel, "priceless").unwrap().name, "pricing");
        assert!(select_flow(&flows, &channel, "opening hours?").is_none());
    }

    #[test]
    fn earlier_flow_wins_when_several_match() {
        let flows = vec![flow("first", "wa-1", &["hello"]), flow("second", "wa-1", &["hello", "hi"])];
        let matched = select_flow(&flows, &ChannelId::new("wa-1"), "hello there").unwrap();
        assert_eq!(matched.name, "first");
    }

    #[test]
    fn skips_inactive_flows_and_other_channels() {
        let flows = vec![
            flow("paused", "wa-1", &["hello"]).inactive(),
            flow("elsewhere", "ig-1", &["hello"]),
            flow("live", "wa-1", &["hello"]),
        ];
        let matched = select_flow(&flows, &ChannelId::new("wa-1"), "hello").unwrap();
        assert_eq!(matched.name, "live");
    }

    #[test]
    fn blank_keywords_never_match() {
        let flows = vec![flow("catch-all", "wa-1", &["", "   "])];
        assert!(select_flow(&flows, &ChannelId::new("wa-1"), "anything").is_none());
    }

    #[tokio::test]
    async fn find_match_reads_flows_from_persistence() {
        let persistence = InMemoryPersistence::arc();
        persistence.add_flow(flow("first", "wa-1", &["hello"]));
        persistence.add_flow(flow("second", "wa-1", &["hello"]));
        let matcher = FlowTriggerMatcher::new(persistence.clone());

        let hit = matcher
            .find_match(&InboundMessage::new(ChannelId::new("wa-1"), "+1", "Hello!"))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().name, "first");

        let miss = matcher
            .find_match(&InboundMessage::new(ChannelId::new("wa-2"), "+1", "Hello!"))
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    proptest! {
        #[test]
        fn keyword_embedded_anywhere_matches(
            prefix in "[a-z ]{0,12}",
            keyword in "[a-zA-Z]{1,8}",
            suffix in "[a-z ]{0,12}",
        ) {
            let flows = vec![flow("f", "wa-1", &[keyword.as_str()])];
            let body = format!("{prefix}{}{suffix}", keyword.to_uppercase());
            prop_assert!(select_flow(&flows, &ChannelId::new("wa-1"), &body).is_some());
        }
    }
}
