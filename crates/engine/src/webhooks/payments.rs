//! Payment and subscription events from the billing provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use autoflow_core::UserId;

use super::inbound::WebhookAck;
use crate::collaborators::{ActivityEvent, ActivityKind, EntityKind, Persistence};
use crate::error::CollaboratorError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    CheckoutCompleted {
        owner_id: UserId,
        plan: String,
        #[serde(default)]
        credits: u64,
    },
    SubscriptionUpdated {
        owner_id: UserId,
        plan: String,
        status: SubscriptionStatus,
    },
    SubscriptionCancelled {
        owner_id: UserId,
    },
    PaymentFailed {
        owner_id: UserId,
    },
}

impl PaymentEvent {
    pub fn owner_id(&self) -> UserId {
        match self {
            PaymentEvent::CheckoutCompleted { owner_id, .. }
            | PaymentEvent::SubscriptionUpdated { owner_id, .. }
            | PaymentEvent::SubscriptionCancelled { owner_id }
            | PaymentEvent::PaymentFailed { owner_id } => *owner_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PaymentEvent::CheckoutCompleted { .. } => "checkout_completed",
            PaymentEvent::SubscriptionUpdated { .. } => "subscription_updated",
            PaymentEvent::SubscriptionCancelled { .. } => "subscription_cancelled",
            PaymentEvent::PaymentFailed { .. } => "payment_failed",
        }
    }
}

#[derive(Clone)]
pub struct PaymentGateway {
    persistence: Arc<dyn Persistence>,
}

impl PaymentGateway {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    /// Apply `event`. Failures are logged; the sender always gets an ack.
    pub async fn handle_event(&self, event: PaymentEvent) -> WebhookAck {
        let owner_id = event.owner_id();
        match self.apply(&event).await {
            Ok(()) => info!(owner_id = %owner_id, event = event.kind(), "payment event applied"),
            Err(e) => error!(owner_id = %owner_id, event = event.kind(), error = %e, "payment event failed"),
        }
        WebhookAck::received()
    }

    pub async fn handle_raw(&self, body: serde_json::Value) -> WebhookAck {
        match serde_json::from_value::<PaymentEvent>(body) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                warn!(error = %e, "ignoring malformed payment event");
                WebhookAck::received()
            }
        }
    }

    async fn apply(&self, event: &PaymentEvent) -> Result<(), CollaboratorError> {
        let owner_id = event.owner_id();
        // Unknown owners are rejected before any write.
        self.persistence.get_user(owner_id).await?;
        let user_key = owner_id.to_string();

        let activity = match event {
            PaymentEvent::CheckoutCompleted { plan, credits, .. } => {
                self.persistence
                    .update_entity(
                        EntityKind::User,
                        &user_key,
                        json!({ "plan": plan, "subscription_status": SubscriptionStatus::Active }),
                    )
                    .await?;
                let balance = self.persistence.grant_credits(owner_id, *credits).await?;
                ActivityEvent::new(
                    owner_id,
                    ActivityKind::CreditsGranted,
                    format!("Subscribed to {plan}; {credits} credits added"),
                )
                .with_details(json!({ "plan": plan, "credits": credits, "balance": balance }))
            }
            PaymentEvent::SubscriptionUpdated { plan, status, .. } => {
                self.persistence
                    .update_entity(
                        EntityKind::User,
                        &user_key,
                        json!({ "plan": plan, "subscription_status": status }),
                    )
                    .await?;
                ActivityEvent::new(
                    owner_id,
                    ActivityKind::SubscriptionChanged,
                    format!("Subscription {} on {plan}", status.as_str()),
                )
                .with_details(json!({ "plan": plan, "status": status }))
            }
            PaymentEvent::SubscriptionCancelled { .. } => {
                self.persistence
                    .update_entity(
                        EntityKind::User,
                        &user_key,
                        json!({ "plan": null, "subscription_status": SubscriptionStatus::Cancelled }),
                    )
                    .await?;
                ActivityEvent::new(owner_id, ActivityKind::SubscriptionChanged, "Subscription cancelled")
                    .with_details(json!({ "status": SubscriptionStatus::Cancelled }))
            }
            PaymentEvent::PaymentFailed { .. } => {
                self.persistence
                    .update_entity(
                        EntityKind::User,
                        &user_key,
                        json!({ "subscription_status": SubscriptionStatus::PastDue }),
                    )
                    .await?;
                ActivityEvent::new(owner_id, ActivityKind::PaymentFailed, "Payment failed")
                    .with_details(json!({ "status": SubscriptionStatus::PastDue }))
            }
        };

        self.persistence.log_activity(activity).await
    }
}
