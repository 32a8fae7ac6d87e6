//! Provider delivery event webhooks.
//!
//! Status codes: `200` for an applied update or an acknowledged no-op
//! (including payloads that cannot be parsed), `404` when the referenced
//! record or mapping is missing, `500` on store failures.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use tracing::warn;

use crate::Error;
use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::confirmation::{ConfirmationNormalizer, ConfirmationOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/email", post(email_event))
        .route("/sms", post(sms_event))
        .route("/whatsapp", post(whatsapp_event))
}

async fn email_event(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<ConfirmationOutcome>> {
    handle_event(&state.email_events, &body).await
}

async fn sms_event(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<ConfirmationOutcome>> {
    handle_event(&state.sms_events, &body).await
}

async fn whatsapp_event(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<ConfirmationOutcome>> {
    handle_event(&state.whatsapp_events, &body).await
}

/// The body is read as text: SNS posts JSON as `text/plain`.
async fn handle_event(
    normalizer: &Arc<dyn ConfirmationNormalizer>,
    body: &str,
) -> ApiResult<Json<ConfirmationOutcome>> {
    let channel = normalizer.channel();
    let result = match serde_json::from_str(body) {
        Ok(event) => normalizer.handle(event).await,
        Err(e) => Err(Error::malformed(format!("body is not JSON: {e}"))),
    };

    match result {
        Ok(outcome) => Ok(Json(outcome)),
        Err(Error::MalformedEvent(reason)) => {
            warn!(%channel, "Dropping malformed delivery event: {}", reason);
            Ok(Json(ConfirmationOutcome::Ignored { reason }))
        }
        Err(e) => {
            if e.is_not_found() {
                warn!(%channel, "Delivery event for unknown message: {}", e);
            }
            Err(e.into())
        }
    }
}
