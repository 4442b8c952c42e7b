use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ConsultationError, NormalizationError};
use crate::models::ClusterUpload;
use crate::normalizer;
use crate::notifier::{NoticeKind, Notifier};
use crate::webhook_client::ProfileGateway;

const PROGRESS_STEP: u8 = 10;
const PROGRESS_CEILING: u8 = 90;

/// Sends client spreadsheets to the clustering flow of the webhook.
///
/// While the upload is in flight a percentage indicator climbs by 10 per tick
/// up to 90, jumps to 100 once the reply arrives and returns to 0 at the end.
#[derive(Clone)]
pub struct ClusterService {
    gateway: Arc<dyn ProfileGateway>,
    tick: Duration,
}

impl ClusterService {
    pub fn new(gateway: Arc<dyn ProfileGateway>, tick: Duration) -> Self {
        Self { gateway, tick }
    }

    pub fn with_default_tick(gateway: Arc<dyn ProfileGateway>) -> Self {
        Self::new(gateway, Duration::from_millis(300))
    }

    /// Uploads the file and returns the service's success message.
    pub async fn upload(
        &self,
        upload: ClusterUpload,
        notifier: &dyn Notifier,
    ) -> Result<String, ConsultationError> {
        if let Err(err) = upload.validate() {
            notifier.report(NoticeKind::Error, &err.to_string());
            return Err(err);
        }

        notifier.upload_progress(0);
        let outcome = self.send(&upload, notifier).await;
        notifier.upload_progress(0);

        match &outcome {
            Ok(message) => {
                tracing::info!("Clustering finished for '{}': {}", upload.file_name, message);
                notifier.report(NoticeKind::Success, message);
            }
            Err(err) => {
                tracing::warn!(
                    "Clustering failed for '{}' [{}]: {}",
                    upload.file_name,
                    err.kind(),
                    err
                );
                notifier.report(NoticeKind::Error, &err.to_string());
            }
        }

        outcome
    }

    async fn send(
        &self,
        upload: &ClusterUpload,
        notifier: &dyn Notifier,
    ) -> Result<String, ConsultationError> {
        let request = self.gateway.upload(upload);
        tokio::pin!(request);

        let mut ticker = tokio::time::interval(self.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut percent = 0u8;
        let reply = loop {
            tokio::select! {
                reply = &mut request => break reply?,
                _ = ticker.tick(), if percent < PROGRESS_CEILING => {
                    percent += PROGRESS_STEP;
                    notifier.upload_progress(percent);
                }
            }
        };
        notifier.upload_progress(100);

        reply.ensure_success()?;
        let raw = reply.json()?;
        normalizer::cluster_outcome(&raw).map_err(|err| {
            if !matches!(err, NormalizationError::UpstreamError(_)) {
                tracing::error!("Unexpected cluster reply: {}", raw);
            }
            ConsultationError::from(err)
        })
    }
}
