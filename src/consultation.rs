//! Consultation controller: one request/response cycle against the webhook.
//!
//! Flow for a valid query:
//! 1. Stage 0 completes immediately, then a short pause and stage 1.
//! 2. The POST is issued and awaited.
//! 3. Stages 2-4 advance on fixed pauses around the status check, the
//!    failure-envelope check and shape normalization.
//! 4. The tracker is cleared and exactly one notice is reported.
//!
//! The pauses are purely cosmetic and not tied to real I/O progress.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::errors::{ConsultationError, NormalizationError};
use crate::models::{ArchetypeQuery, ArchetypeReport, ConsultQuery, ProfileRecord};
use crate::normalizer;
use crate::notifier::{NoticeKind, Notifier};
use crate::progress::ProgressTracker;
use crate::webhook_client::ProfileGateway;
use crate::webhook_models::WebhookRequest;

/// Stage labels for consult-by-identifier.
pub const CLIENT_STAGES: [&str; 5] = [
    "Consulting client...",
    "Analyzing financial profile...",
    "Generating archetype...",
    "Creating value proposition...",
    "Defining communication strategy...",
];

/// Stage labels for consult-by-archetype.
pub const ARCHETYPE_STAGES: [&str; 5] = [
    "Loading archetype...",
    "Matching product to profile...",
    "Building value proposition...",
    "Planning communication strategy...",
    "Preparing objection handling...",
];

/// Synthetic delays between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePacing {
    /// Before stage 1, ahead of the POST.
    pub warmup: Duration,
    /// Before stages 2, 3 and 4, after the POST resolved.
    pub step: Duration,
    /// Before the success is emitted.
    pub settle: Duration,
}

impl StagePacing {
    pub fn standard() -> Self {
        Self {
            warmup: Duration::from_millis(800),
            step: Duration::from_millis(600),
            settle: Duration::from_millis(400),
        }
    }

    /// No pauses at all.
    pub fn immediate() -> Self {
        Self {
            warmup: Duration::ZERO,
            step: Duration::ZERO,
            settle: Duration::ZERO,
        }
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for StagePacing {
    fn default() -> Self {
        Self::standard()
    }
}

/// Final stage of a cycle: the decoded reply to the mode's result type.
type Normalize<T> = fn(&Value) -> Result<T, NormalizationError>;

/// Drives consultations through the webhook, the tracker and the normalizer.
#[derive(Clone)]
pub struct ConsultationController {
    gateway: Arc<dyn ProfileGateway>,
    pacing: StagePacing,
}

impl ConsultationController {
    pub fn new(gateway: Arc<dyn ProfileGateway>, pacing: StagePacing) -> Self {
        Self { gateway, pacing }
    }

    pub fn pacing(&self) -> StagePacing {
        self.pacing
    }

    /// Profile by client ID number (`opcion` "1").
    pub async fn consult_client(
        &self,
        query: ConsultQuery,
        notifier: &dyn Notifier,
    ) -> Result<ProfileRecord, ConsultationError> {
        let query = match query.validated() {
            Ok(query) => query,
            Err(err) => return Err(reject(err, notifier)),
        };
        tracing::info!("Consulting client profile for product '{}'", query.producto);

        self.submit(
            WebhookRequest::from(query),
            &CLIENT_STAGES,
            normalizer::normalize,
            notifier,
        )
        .await
    }

    /// Sales strategy by archetype (`opcion` "3").
    pub async fn consult_archetype(
        &self,
        query: ArchetypeQuery,
        notifier: &dyn Notifier,
    ) -> Result<ArchetypeReport, ConsultationError> {
        let query = match query.validated() {
            Ok(query) => query,
            Err(err) => return Err(reject(err, notifier)),
        };
        tracing::info!(
            "Consulting archetype '{}' for product '{}'",
            query.arquetipo,
            query.producto
        );

        self.submit(
            WebhookRequest::from(query),
            &ARCHETYPE_STAGES,
            normalizer::normalize_archetype,
            notifier,
        )
        .await
    }

    async fn submit<T>(
        &self,
        request: WebhookRequest,
        stages: &[&str],
        normalize: Normalize<T>,
        notifier: &dyn Notifier,
    ) -> Result<T, ConsultationError> {
        let mut tracker = ProgressTracker::start(stages.iter().copied());
        notifier.progress(tracker.steps());

        let outcome = self.drive(&request, &mut tracker, normalize, notifier).await;

        tracker.clear();
        notifier.progress(tracker.steps());

        match &outcome {
            Ok(_) => notifier.report(
                NoticeKind::Success,
                "The profile has been generated successfully.",
            ),
            Err(err) => {
                tracing::warn!(
                    "Consultation (opcion {}) failed [{}]: {}",
                    request.opcion(),
                    err.kind(),
                    err
                );
                notifier.report(NoticeKind::Error, &err.to_string());
            }
        }

        outcome
    }

    async fn drive<T>(
        &self,
        request: &WebhookRequest,
        tracker: &mut ProgressTracker,
        normalize: Normalize<T>,
        notifier: &dyn Notifier,
    ) -> Result<T, ConsultationError> {
        let mut mark = |index: usize| {
            tracker.advance(index);
            notifier.progress(tracker.steps());
        };

        mark(0);
        StagePacing::pause(self.pacing.warmup).await;
        mark(1);

        let reply = self.gateway.consult(request).await?;

        StagePacing::pause(self.pacing.step).await;
        mark(2);
        reply.ensure_success()?;

        StagePacing::pause(self.pacing.step).await;
        mark(3);
        let raw = reply.json()?;
        tracing::debug!("Webhook reply: {}", raw);
        if let Some(err) = normalizer::failure_envelope(&raw) {
            return Err(err.into());
        }

        StagePacing::pause(self.pacing.step).await;
        mark(4);
        let record = normalize(&raw).map_err(|err| {
            tracing::error!("Could not normalize webhook reply ({}): {}", err, raw);
            ConsultationError::from(err)
        })?;

        StagePacing::pause(self.pacing.settle).await;
        Ok(record)
    }
}

fn reject(err: ConsultationError, notifier: &dyn Notifier) -> ConsultationError {
    tracing::debug!("Rejected consultation input: {}", err);
    notifier.report(NoticeKind::Error, &err.to_string());
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pacing_matches_dashboard_timing() {
        let pacing = StagePacing::default();
        assert_eq!(pacing.warmup, Duration::from_millis(800));
        assert_eq!(pacing.step, Duration::from_millis(600));
        assert_eq!(pacing.settle, Duration::from_millis(400));
    }

    #[test]
    fn both_modes_have_five_stages() {
        assert_eq!(CLIENT_STAGES.len(), 5);
        assert_eq!(ARCHETYPE_STAGES.len(), 5);
    }

    #[tokio::test]
    async fn immediate_pacing_does_not_sleep() {
        let started = std::time::Instant::now();
        StagePacing::pause(StagePacing::immediate().warmup).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
