//! Webhook endpoint handlers.
//!
//! The notify handler only verifies, resolves and hands the request to the
//! coordinator. It answers as soon as the coordinator has decided; the build
//! itself runs in the background and never delays the response.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::coordinator::{Decision, GenerationCoordinator};
use crate::directory::SiteDirectory;
use crate::error::WebhookError;
use crate::site::SiteId;
use crate::web::signature::{verify_notification, SIGNATURE_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<dyn SiteDirectory>,
    pub coordinator: GenerationCoordinator,
}

impl AppState {
    pub fn new(
        config: Config,
        directory: Arc<dyn SiteDirectory>,
        coordinator: GenerationCoordinator,
    ) -> Self {
        Self {
            config: Arc::new(config),
            directory,
            coordinator,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Site Notification
// =============================================================================

/// Response for an accepted notification.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub status: &'static str,
    pub decision: Decision,
    pub site: String,
    pub domain: String,
}

/// Site update notification endpoint.
///
/// This endpoint:
/// 1. Verifies the HMAC signature over the raw body
/// 2. Resolves the site's publish domain
/// 3. Prepares the output location
/// 4. Asks the coordinator to start or queue a build
/// 5. Returns 202 Accepted
pub async fn notify(
    State(state): State<AppState>,
    Path(raw_site): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<NotifyResponse>), WebhookError> {
    info!(
        site = %raw_site,
        body_length = body.len(),
        has_signature = headers.contains_key(SIGNATURE_HEADER),
        "notification_received"
    );

    let signature = match headers.get(SIGNATURE_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| {
            warn!(site = %raw_site, "signature_header_not_ascii");
            WebhookError::SignatureInvalid
        })?),
        None => None,
    };

    if let Err(e) = verify_notification(
        &state.config.webhook_secret,
        &body,
        signature,
        state.config.signature_max_age,
    ) {
        warn!(site = %raw_site, reason = %e, "notification_signature_rejected");
        return Err(e.into());
    }

    let site = SiteId::parse(&raw_site).ok_or_else(|| {
        warn!(site = %raw_site, "notification_site_invalid");
        WebhookError::SiteUnresolvable {
            site: raw_site.clone(),
        }
    })?;

    let domain = state.directory.resolve(&site).await?;

    state.coordinator.runner().prepare(&site, &domain).await?;

    let decision = state.coordinator.request_generation(&site, &domain);

    info!(site = %site, domain = %domain, decision = ?decision, "notification_accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(NotifyResponse {
            status: "accepted",
            decision,
            site: site.to_string(),
            domain,
        }),
    ))
}
