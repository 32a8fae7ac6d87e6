//! Logging API routes.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::logging::available_modules;

pub fn router() -> Router<AppState> {
    Router::new().route("/filter", get(get_filter).put(update_filter))
}

#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub available_modules: Vec<ModuleInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

fn response(filter: String) -> LoggingConfigResponse {
    LoggingConfigResponse {
        filter,
        available_modules: available_modules()
            .into_iter()
            .map(|(name, desc)| ModuleInfo {
                name: name.to_string(),
                description: desc.to_string(),
            })
            .collect(),
    }
}

async fn get_filter(State(state): State<AppState>) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging_config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))?;

    Ok(Json(response(logging_config.get_filter())))
}

async fn update_filter(
    State(state): State<AppState>,
    Json(request): Json<UpdateLogFilterRequest>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging_config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))?;

    logging_config
        .set_filter(&request.filter)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(response(logging_config.get_filter())))
}
