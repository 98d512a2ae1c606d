//! Request handling: validate, authenticate, run the pipeline, notify

use crate::error::ServiceError;
use crate::notify::{Message, Notifier};
use crate::pipeline::{PipelineOrchestrator, PipelineResult, ReportPayload};
use crate::request::{BenchmarkRequest, SecretVerifier};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a successful request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Nothing changed; nobody was notified
    NoChange,
    /// First baseline or a detected change; recipients were notified
    Reported(ReportPayload),
}

pub struct BenchmarkService {
    orchestrator: Arc<PipelineOrchestrator>,
    notifier: Arc<dyn Notifier>,
    verifier: SecretVerifier,
    sender: String,
}

impl std::fmt::Debug for BenchmarkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkService")
            .field("orchestrator", &self.orchestrator)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl BenchmarkService {
    pub fn new(
        orchestrator: Arc<PipelineOrchestrator>,
        notifier: Arc<dyn Notifier>,
        verifier: SecretVerifier,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            notifier,
            verifier,
            sender: sender.into(),
        }
    }

    pub async fn handle(
        &self,
        request: BenchmarkRequest,
        cancel: &CancellationToken,
    ) -> Result<ServiceOutcome, ServiceError> {
        request.validate()?;
        let repository = request.repository();

        if !self.verifier.verify(repository, &request.secret) {
            tracing::warn!(repository, "Rejected benchmark request with bad secret");
            return Err(ServiceError::Unauthorized {
                repository: repository.to_string(),
            });
        }

        let result = self
            .orchestrator
            .run(repository, request.visibility(), cancel)
            .await?;

        let payload = match result.payload() {
            Some(payload) => payload,
            None => return Ok(ServiceOutcome::NoChange),
        };

        if let PipelineResult::FirstRun { .. } = result {
            tracing::info!(repository, "First baseline recorded");
        }

        let message = Message::for_report(
            self.sender.clone(),
            request.recipients(),
            repository,
            &payload,
        );
        if let Err(source) = self.notifier.send(&message).await {
            tracing::error!(repository, error = %source, "Failed to send notification");
            return Err(ServiceError::Notification { payload, source });
        }

        Ok(ServiceOutcome::Reported(payload))
    }
}
