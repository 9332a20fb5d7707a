//! Processor endpoints: process an event, describe the processor, and
//! report aggregated timings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::ServingState;
use crate::service::{ProcessRequest, ProcessResponse, ProcessingError, ProcessorInfo};
use crate::timing::TimingSummary;

/// Failures surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown processor: {0}")]
    UnknownProcessor(String),
    #[error("server is not accepting requests")]
    Unavailable,
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    #[error("timing summary unavailable: {0}")]
    Timing(#[source] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::UnknownProcessor(_) => StatusCode::NOT_FOUND,
            Self::Unavailable | Self::Timing(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Processing(ProcessingError::EventsClient(_)) => StatusCode::BAD_GATEWAY,
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn check_processor(state: &AppState, id: &str) -> Result<(), ApiError> {
    if state.service.identity().id == id {
        Ok(())
    } else {
        Err(ApiError::UnknownProcessor(id.to_string()))
    }
}

/// `POST /v1/processors/{id}/process`
///
/// # Errors
///
/// 404 for an id other than the hosted processor's, 503 while the server is
/// not ready, and the mapped [`ProcessingError`] otherwise.
pub async fn process_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    check_processor(&state, &id)?;
    if state.shutdown.state() != ServingState::Ready {
        return Err(ApiError::Unavailable);
    }
    let _in_flight = state.shutdown.in_flight_guard();
    let response = state.service.process(request).await?;
    Ok(Json(response))
}

/// `GET /v1/processors/{id}/info`
///
/// # Errors
///
/// 404 for an unknown processor id.
pub async fn info_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessorInfo>, ApiError> {
    check_processor(&state, &id)?;
    Ok(Json(state.service.info()))
}

/// `GET /v1/processors/{id}/stats`
///
/// # Errors
///
/// 404 for an unknown processor id, 503 once timing collection has stopped.
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TimingSummary>, ApiError> {
    check_processor(&state, &id)?;
    let summary = state
        .service
        .timing_summary()
        .await
        .map_err(ApiError::Timing)?;
    Ok(Json(summary))
}
