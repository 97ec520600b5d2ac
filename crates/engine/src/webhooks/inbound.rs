//! Inbound channel messages: record, match a flow, run it in the background.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use autoflow_core::{FlowId, InboundMessage};

use crate::collaborators::Persistence;
use crate::flows::{FlowInterpreter, FlowRun, FlowTriggerMatcher};

/// Acknowledgement returned to the webhook caller. `received` is always true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_flow: Option<FlowId>,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self {
            received: true,
            matched_flow: None,
        }
    }
}

/// Result of accepting an inbound message. The flow run (if any) continues
/// after the ack is returned; `run` lets callers await it.
#[derive(Debug)]
pub struct InboundDispatch {
    pub ack: WebhookAck,
    pub run: Option<JoinHandle<FlowRun>>,
}

#[derive(Clone)]
pub struct InboundGateway {
    persistence: Arc<dyn Persistence>,
    matcher: FlowTriggerMatcher,
    interpreter: FlowInterpreter,
}

impl InboundGateway {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        matcher: FlowTriggerMatcher,
        interpreter: FlowInterpreter,
    ) -> Self {
        Self {
            persistence,
            matcher,
            interpreter,
        }
    }

    pub async fn handle_message(&self, message: InboundMessage) -> InboundDispatch {
        if let Err(e) = self.persistence.record_inbound_message(&message).await {
            error!(channel_id = %message.channel_id, error = %e, "failed to record inbound message");
        }

        let flow = match self.matcher.find_match(&message).await {
            Ok(Some(flow)) => flow,
            Ok(None) => {
                return InboundDispatch {
                    ack: WebhookAck::received(),
                    run: None,
                };
            }
            Err(e) => {
                error!(channel_id = %message.channel_id, error = %e, "flow lookup failed");
                return InboundDispatch {
                    ack: WebhookAck::received(),
                    run: None,
                };
            }
        };

        info!(flow_id = %flow.id, channel_id = %message.channel_id, "flow triggered");
        let ack = WebhookAck {
            received: true,
            matched_flow: Some(flow.id),
        };
        let interpreter = self.interpreter.clone();
        let run = tokio::spawn(async move { interpreter.run(&flow, &message).await });

        InboundDispatch { ack, run: Some(run) }
    }

    /// Decode a raw webhook body. Undecodable bodies are acknowledged and dropped.
    pub async fn handle_raw(&self, body: serde_json::Value) -> InboundDispatch {
        match serde_json::from_value::<InboundMessage>(body) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!(error = %e, "ignoring malformed inbound message");
                InboundDispatch {
                    ack: WebhookAck::received(),
                    run: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use autoflow_core::{ChannelId, Flow, FlowStep, UserId};
    use serde_json::json;

    use super::*;
    use crate::collaborators::in_memory::InMemoryPersistence;
    use crate::error::CollaboratorError;
    use crate::jobs::JobQueue;

    fn gateway() -> (InboundGateway, JobQueue, Arc<InMemoryPersistence>) {
        let queue = JobQueue::default();
        let persistence = InMemoryPersistence::arc();
        let gateway = InboundGateway::new(
            persistence.clone(),
            FlowTriggerMatcher::new(persistence.clone()),
            FlowInterpreter::new(Arc::new(queue.clone()), persistence.clone()),
        );
        (gateway, queue, persistence)
    }

    fn greeting(name: &str) -> Flow {
        Flow::new(
            name,
            UserId::new(),
            ChannelId::new("wa-1"),
            ["hello"],
            vec![FlowStep::Message { content: format!("hi from {name}") }],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_earliest_matching_flow_runs() {
        let (gateway, queue, persistence) = gateway();
        let first = greeting("first");
        persistence.add_flow(first.clone());
        persistence.add_flow(greeting("second"));

        let dispatch = gateway
            .handle_message(InboundMessage::new(ChannelId::new("wa-1"), "+1", "hello"))
            .await;
        assert_eq!(dispatch.ack.matched_flow, Some(first.id));

        let run = dispatch.run.unwrap().await.unwrap();
        assert_eq!(run.flow_id, first.id);
        assert_eq!(persistence.inbound_messages().len(), 1);

        let jobs = queue.snapshot();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].owner_id, first.owner_id);
    }

    #[tokio::test(start_paused = true)]
    async fn ack_returns_before_the_flow_finishes() {
        let (gateway, queue, persistence) = gateway();
        persistence.add_flow(Flow::new(
            "slow",
            UserId::new(),
            ChannelId::new("wa-1"),
            ["price"],
            vec![
                FlowStep::Delay { seconds: 30 },
                FlowStep::Message { content: "Our price is $10".to_string() },
            ],
        ));

        let dispatch = gateway
            .handle_message(InboundMessage::new(ChannelId::new("wa-1"), "+1", "price?"))
            .await;
        assert!(dispatch.ack.received);
        assert!(queue.is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        dispatch.run.unwrap().await.unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn unmatched_message_is_still_recorded() {
        let (gateway, queue, persistence) = gateway();
        persistence.add_flow(greeting("first"));

        let dispatch = gateway
            .handle_message(InboundMessage::new(ChannelId::new("wa-1"), "+1", "opening hours?"))
            .await;

        assert_eq!(dispatch.ack, WebhookAck::received());
        assert!(dispatch.run.is_none());
        assert_eq!(persistence.inbound_messages().len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn recording_failure_still_matches_and_acks() {
        let (gateway, queue, persistence) = gateway();
        let flow = greeting("first");
        persistence.add_flow(flow.clone());
        persistence.fail_inbound_with(CollaboratorError::unavailable("db", "connection reset"));

        let dispatch = gateway
            .handle_message(InboundMessage::new(ChannelId::new("wa-1"), "+1", "hello"))
            .await;

        assert!(dispatch.ack.received);
        assert_eq!(dispatch.ack.matched_flow, Some(flow.id));
        dispatch.run.unwrap().await.unwrap();
        assert!(persistence.inbound_messages().is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_acknowledged() {
        let (gateway, _, persistence) = gateway();

        let dispatch = gateway.handle_raw(json!({"body": "no channel"})).await;

        assert!(dispatch.ack.received);
        assert!(dispatch.run.is_none());
        assert!(persistence.inbound_messages().is_empty());
    }
}
