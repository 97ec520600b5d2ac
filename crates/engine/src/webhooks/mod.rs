//! Webhook entry points. Both always acknowledge; failures stay internal.

pub mod inbound;
pub mod payments;

pub use inbound::{InboundDispatch, InboundGateway, WebhookAck};
pub use payments::{PaymentEvent, PaymentGateway, SubscriptionStatus};
