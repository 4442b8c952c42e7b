use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Reasons a decoded webhook body could not be turned into a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// The upstream service answered with an explicit `success: false` envelope.
    #[error("{0}")]
    UpstreamError(String),
    /// None of the recognized response shapes matched.
    #[error("Could not process the structure of the response")]
    UnrecognizedShape,
    /// A shape matched but a required field is absent or empty.
    #[error("The response is missing the required field '{0}'")]
    MissingField(&'static str),
    /// A required section is present but does not have the expected structure.
    #[error("The response field '{0}' has an unexpected structure")]
    MalformedField(&'static str),
    /// The cluster reply carried neither `success: true` nor `success: false`.
    #[error("Unexpected server response")]
    UnexpectedReply,
}

/// Failure of one consultation or upload cycle.
///
/// Every variant terminates the cycle; none is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsultationError {
    /// Required input missing. Raised before any network call.
    #[error("{0}")]
    Validation(String),
    /// Non-2xx status, network failure or an undecodable body.
    #[error("{message}")]
    Transport {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// User-facing description ("Error 500: Internal Server Error").
        message: String,
    },
    /// Explicit failure envelope returned by the upstream service.
    #[error("{0}")]
    Upstream(String),
    /// Well-formed JSON that does not match what the flow expects.
    #[error(transparent)]
    Normalization(NormalizationError),
}

impl ConsultationError {
    /// Builds the transport error for a non-2xx reply.
    pub fn from_status(status: u16, reason: &str) -> Self {
        ConsultationError::Transport {
            status: Some(status),
            message: format!("Error {}: {}", status, reason),
        }
    }

    /// Builds the transport error for a request that never produced a reply.
    pub fn network(detail: impl std::fmt::Display) -> Self {
        ConsultationError::Transport {
            status: None,
            message: format!("Could not reach the consultation service: {}", detail),
        }
    }

    /// Short machine-readable label used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ConsultationError::Validation(_) => "validation",
            ConsultationError::Transport { .. } => "transport",
            ConsultationError::Upstream(_) => "upstream",
            ConsultationError::Normalization(_) => "normalization",
        }
    }
}

impl From<NormalizationError> for ConsultationError {
    /// An upstream envelope keeps its own category; everything else is a normalization failure.
    fn from(err: NormalizationError) -> Self {
        match err {
            NormalizationError::UpstreamError(message) => ConsultationError::Upstream(message),
            other => ConsultationError::Normalization(other),
        }
    }
}

/// Application-specific error types returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request error (malformed body or form).
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// A consultation or upload cycle failed.
    #[error(transparent)]
    Consultation(#[from] ConsultationError),
    /// Internal server error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    fn status_and_body(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            AppError::Consultation(err) => {
                let status = match err {
                    ConsultationError::Validation(_) => StatusCode::BAD_REQUEST,
                    ConsultationError::Transport { .. } => StatusCode::BAD_GATEWAY,
                    ConsultationError::Upstream(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ConsultationError::Normalization(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.kind(), err.to_string())
            }
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status and a JSON body the dashboard shows in its error dialog.
    fn into_response(self) -> Response {
        match &self {
            AppError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
            AppError::Consultation(ConsultationError::Transport { message, .. }) => {
                tracing::error!("Webhook transport error: {}", message)
            }
            AppError::BadRequest(msg) => tracing::debug!("Rejected request: {}", msg),
            AppError::Consultation(err) => tracing::warn!("Consultation failed: {}", err),
        }

        let (status, kind, message) = self.status_and_body();
        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_normalization_error_keeps_its_category() {
        let err: ConsultationError = NormalizationError::UpstreamError("bad cedula".into()).into();
        assert_eq!(err, ConsultationError::Upstream("bad cedula".into()));
        assert_eq!(err.kind(), "upstream");
        assert_eq!(err.to_string(), "bad cedula");
    }

    #[test]
    fn shape_errors_map_to_normalization() {
        let err: ConsultationError = NormalizationError::MissingField("idea").into();
        assert_eq!(err.kind(), "normalization");
        assert!(err.to_string().contains("'idea'"));
    }

    #[test]
    fn status_error_carries_code_and_reason() {
        let err = ConsultationError::from_status(503, "Service Unavailable");
        assert_eq!(err.to_string(), "Error 503: Service Unavailable");
        assert!(matches!(err, ConsultationError::Transport { status: Some(503), .. }));
    }

    #[test]
    fn http_status_mapping() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::Consultation(ConsultationError::Validation("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Consultation(ConsultationError::from_status(500, "Internal Server Error")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Consultation(ConsultationError::Upstream("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::Consultation(ConsultationError::Normalization(
                    NormalizationError::UnrecognizedShape,
                )),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let (_, kind, message) = AppError::InternalError("join error".into()).status_and_body();
        assert_eq!(kind, "internal");
        assert_eq!(message, "Internal server error");
    }
}
