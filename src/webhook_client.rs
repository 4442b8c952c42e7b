use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use url::Url;

use crate::errors::{AppError, ConsultationError};
use crate::models::ClusterUpload;
use crate::webhook_models::{GatewayReply, WebhookRequest};

/// Outbound calls to the automation webhook.
///
/// Implementations return the raw reply; status and body are interpreted by
/// the caller so the progress stages can be paced around each check.
#[async_trait]
pub trait ProfileGateway: Send + Sync {
    /// Posts a JSON consultation (`opcion` "1" or "3").
    async fn consult(&self, request: &WebhookRequest) -> Result<GatewayReply, ConsultationError>;

    /// Posts a multipart cluster upload (`opcion` "2").
    async fn upload(&self, upload: &ClusterUpload) -> Result<GatewayReply, ConsultationError>;
}

/// reqwest client for the single webhook URL shared by all flows.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: Url,
}

impl WebhookClient {
    /// Creates a new `WebhookClient`.
    ///
    /// # Arguments
    ///
    /// * `url` - The webhook URL.
    /// * `timeout` - Upper bound for one request, upload included.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create webhook client: {}", e)))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn into_reply(response: reqwest::Response) -> Result<GatewayReply, ConsultationError> {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("Unknown Status").to_string();
        let body = response.text().await.map_err(ConsultationError::network)?;

        tracing::debug!("Webhook replied {} ({} bytes)", status, body.len());
        Ok(GatewayReply::new(status.as_u16(), reason, body))
    }
}

#[async_trait]
impl ProfileGateway for WebhookClient {
    async fn consult(&self, request: &WebhookRequest) -> Result<GatewayReply, ConsultationError> {
        tracing::info!("Posting consultation (opcion {}) to webhook", request.opcion());

        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Webhook request failed: {}", e);
                ConsultationError::network(e)
            })?;

        Self::into_reply(response).await
    }

    async fn upload(&self, upload: &ClusterUpload) -> Result<GatewayReply, ConsultationError> {
        tracing::info!(
            "Uploading '{}' ({} bytes) for clustering",
            upload.file_name,
            upload.bytes.len()
        );

        let part = file_part(upload);

        // No explicit Content-Type: reqwest sets the multipart boundary itself.
        let form = Form::new().part("file", part).text("opcion", "2");

        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Cluster upload failed: {}", e);
                ConsultationError::network(e)
            })?;

        Self::into_reply(response).await
    }
}

const FALLBACK_MIME: &str = "application/octet-stream";

/// The `file` part, labelled with the declared content type when it parses.
fn file_part(upload: &ClusterUpload) -> Part {
    let part = || Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());

    match part().mime_str(upload.mime()) {
        Ok(part) => part,
        Err(e) => {
            tracing::warn!(
                "Ignoring content type '{}' of '{}': {}",
                upload.mime(),
                upload.file_name,
                e
            );
            part().mime_str(FALLBACK_MIME).unwrap_or_else(|_| part())
        }
    }
}
