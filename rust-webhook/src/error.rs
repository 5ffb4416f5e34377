//! Error types.
//!
//! [`WebhookError`] covers everything rejected synchronously, before any
//! coordinator state changes. [`JobError`] covers failures that happen after
//! the request was acknowledged; those only ever reach the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::site::SiteId;

/// Synchronous rejection of an inbound notification.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("signature header missing")]
    SignatureMissing,

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("site {site} not found")]
    SiteUnresolvable { site: String },

    #[error("domain for site {site} not found")]
    DomainUnresolvable { site: SiteId },

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureMissing | WebhookError::SignatureInvalid => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::SiteUnresolvable { .. } | WebhookError::DomainUnresolvable { .. } => {
                StatusCode::NOT_FOUND
            }
            WebhookError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn status_label(&self) -> &'static str {
        match self {
            WebhookError::SignatureMissing | WebhookError::SignatureInvalid => "unauthorized",
            WebhookError::SiteUnresolvable { .. } | WebhookError::DomainUnresolvable { .. } => {
                "not_found"
            }
            WebhookError::Infrastructure(_) => "error",
        }
    }
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: self.status_label(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Failure reported by a JobRunner after the request was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The build itself failed.
    #[error("build failed: {0}")]
    Failure(String),

    /// A step after a successful build failed. The build still counts.
    #[error("auxiliary step {step} failed: {reason}")]
    AuxiliaryStepFailure { step: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WebhookError::SignatureMissing.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::SignatureInvalid.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::SiteUnresolvable {
                site: "x".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebhookError::DomainUnresolvable {
                site: SiteId::parse("x").unwrap()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebhookError::Infrastructure("disk".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_job_error_display() {
        let err = JobError::AuxiliaryStepFailure {
            step: "publish".to_string(),
            reason: "exit status 1".to_string(),
        };
        assert_eq!(err.to_string(), "auxiliary step publish failed: exit status 1");
    }
}
