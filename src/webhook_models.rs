use serde::Serialize;
use serde_json::Value;

use crate::errors::ConsultationError;
use crate::models::{ArchetypeQuery, ConsultQuery};

/// JSON body posted to the automation webhook.
///
/// The `opcion` discriminant selects the backend mode. Mode "2" (cluster
/// upload) travels as multipart and is not represented here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "opcion")]
pub enum WebhookRequest {
    #[serde(rename = "1")]
    ConsultById { cedula: String, producto: String },
    #[serde(rename = "3")]
    ConsultByArchetype { arquetipo: String, producto: String },
}

impl WebhookRequest {
    /// Value of the `opcion` field.
    pub fn opcion(&self) -> &'static str {
        match self {
            WebhookRequest::ConsultById { .. } => "1",
            WebhookRequest::ConsultByArchetype { .. } => "3",
        }
    }
}

impl From<ConsultQuery> for WebhookRequest {
    fn from(query: ConsultQuery) -> Self {
        WebhookRequest::ConsultById {
            cedula: query.cedula,
            producto: query.producto,
        }
    }
}

impl From<ArchetypeQuery> for WebhookRequest {
    fn from(query: ArchetypeQuery) -> Self {
        WebhookRequest::ConsultByArchetype {
            arquetipo: query.arquetipo,
            producto: query.producto,
        }
    }
}

/// Raw reply from the webhook before any interpretation.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl GatewayReply {
    pub fn new(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails with the status code and reason phrase on a non-2xx reply.
    pub fn ensure_success(&self) -> Result<(), ConsultationError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ConsultationError::from_status(self.status, &self.reason))
        }
    }

    /// Decodes the body as untyped JSON.
    pub fn json(&self) -> Result<Value, ConsultationError> {
        serde_json::from_str(&self.body).map_err(|e| ConsultationError::Transport {
            status: Some(self.status),
            message: format!("The consultation service returned an invalid body: {}", e),
        })
    }
}
