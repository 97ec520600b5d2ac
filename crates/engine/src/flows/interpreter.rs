//! Step-by-step execution of a triggered flow.
//!
//! Steps run strictly in order. A failing step is logged and recorded on the
//! [`FlowRun`]; the next step still runs. Flows have no overall status.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use autoflow_core::{
    ContactFields, EntityId, Flow, FlowId, FlowStep, InboundMessage, JobId, JobPayload,
    MessageDeliveryPayload,
};

use crate::collaborators::{NewContact, Persistence};
use crate::error::FlowStepError;
use crate::jobs::JobSink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub index: usize,
    pub kind: &'static str,
    pub error: String,
}

/// What one execution of a flow did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowRun {
    pub flow_id: FlowId,
    pub steps_total: usize,
    pub steps_succeeded: usize,
    pub failures: Vec<StepFailure>,
    pub enqueued_jobs: Vec<JobId>,
    pub contacts_created: Vec<EntityId>,
}

impl FlowRun {
    fn start(flow: &Flow) -> Self {
        Self {
            flow_id: flow.id,
            steps_total: flow.steps.len(),
            steps_succeeded: 0,
            failures: Vec::new(),
            enqueued_jobs: Vec::new(),
            contacts_created: Vec::new(),
        }
    }
}

enum StepEffect {
    None,
    Enqueued(JobId),
    ContactCreated(EntityId),
}

#[derive(Clone)]
pub struct FlowInterpreter {
    jobs: Arc<dyn JobSink>,
    persistence: Arc<dyn Persistence>,
}

impl FlowInterpreter {
    pub fn new(jobs: Arc<dyn JobSink>, persistence: Arc<dyn Persistence>) -> Self {
        Self { jobs, persistence }
    }

    /// Execute every step of `flow` in response to `trigger`.
    pub async fn run(&self, flow: &Flow, trigger: &InboundMessage) -> FlowRun {
        let mut run = FlowRun::start(flow);

        for (index, step) in flow.steps.iter().enumerate() {
            match self.execute_step(flow, trigger, step).await {
                Ok(effect) => {
                    run.steps_succeeded += 1;
                    match effect {
                        StepEffect::None => {}
                        StepEffect::Enqueued(id) => run.enqueued_jobs.push(id),
                        StepEffect::ContactCreated(id) => run.contacts_created.push(id),
                    }
                }
                Err(err) => {
                    warn!(
                        flow_id = %flow.id,
                        step = index,
                        kind = step.kind(),
                        error = %err,
                        "flow step failed; continuing"
                    );
                    run.failures.push(StepFailure {
                        index,
                        kind: step.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            flow_id = %flow.id,
            steps = run.steps_total,
            failed = run.failures.len(),
            "flow run finished"
        );
        run
    }

    async fn execute_step(
        &self,
        flow: &Flow,
        trigger: &InboundMessage,
        step: &FlowStep,
    ) -> Result<StepEffect, FlowStepError> {
        match step {
            FlowStep::Delay { seconds } => {
                tokio::time::sleep(Duration::from_secs(*seconds)).await;
                Ok(StepEffect::None)
            }
            FlowStep::Message { content } => {
                let payload = JobPayload::MessageDelivery(MessageDeliveryPayload {
                    channel_id: trigger.channel_id.clone(),
                    recipient: trigger.sender.clone(),
                    content: content.clone(),
                    flow_id: Some(flow.id),
                });
                let id = self.jobs.submit(flow.owner_id, payload)?;
                Ok(StepEffect::Enqueued(id))
            }
            FlowStep::AddContact { fields } => {
                let contact = NewContact {
                    owner_id: flow.owner_id,
                    channel_id: trigger.channel_id.clone(),
                    fields: ContactFields {
                        phone: fields.phone.clone().or_else(|| Some(trigger.sender.clone())),
                        ..fields.clone()
                    },
                    source: flow.name.clone(),
                };
                let id = self.persistence.create_contact(contact).await?;
                Ok(StepEffect::ContactCreated(id))
            }
        }
    }
}
