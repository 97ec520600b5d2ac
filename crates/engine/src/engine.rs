//! Wiring: one queue, one processing loop, and the gateways that feed it.

use std::sync::Arc;

use tracing::info;

use crate::collaborators::Collaborators;
use crate::config::{ConfigError, EngineConfig};
use crate::flows::{FlowInterpreter, FlowTriggerMatcher};
use crate::jobs::{JobExecutor, JobQueue, ProcessingLoop, RetryController};
use crate::webhooks::{InboundGateway, PaymentGateway};

/// Handles to a fully wired engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    pub jobs: ProcessingLoop,
    pub inbound: InboundGateway,
    pub payments: PaymentGateway,
    config: EngineConfig,
}

impl Engine {
    /// Wire the engine. Fails on a config that would stall or panic the worker.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let persistence = collaborators.persistence.clone();
        let executor = JobExecutor::new(collaborators, &config);

        let jobs = ProcessingLoop::new(
            JobQueue::new(config.max_attempts),
            Arc::new(executor),
            RetryController::new(config.backoff_base()),
            persistence.clone(),
        );

        let interpreter = FlowInterpreter::new(Arc::new(jobs.clone()), persistence.clone());
        let inbound = InboundGateway::new(
            persistence.clone(),
            FlowTriggerMatcher::new(persistence.clone()),
            interpreter,
        );
        let payments = PaymentGateway::new(persistence);

        info!(
            max_attempts = config.max_attempts,
            backoff_base_ms = config.backoff_base_ms,
            "engine ready"
        );

        Ok(Self {
            jobs,
            inbound,
            payments,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
