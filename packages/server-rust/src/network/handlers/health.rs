//! Health, liveness, and readiness endpoint handlers.
//!
//! These handlers expose server health information for orchestrators
//! (Kubernetes, load balancers) and operational monitoring.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use docproc_core::HealthStatus;
use serde_json::json;

use super::AppState;
use crate::lifecycle::SERVER_HEALTH;
use crate::network::ServingState;

/// Returns detailed health information as JSON.
///
/// Always returns 200; the `state` field tells a draining server apart from
/// a healthy one.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let lifecycle = state.service.lifecycle();
    let processor = &state.service.identity().id;

    Json(json!({
        "state": state.shutdown.state().as_str(),
        "server": lifecycle.health(SERVER_HEALTH).as_str(),
        "processor": {
            "id": processor,
            "status": lifecycle.health(processor).as_str(),
        },
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Health of one named service as recorded by the lifecycle.
///
/// 200 when the service is serving, 503 otherwise.
pub async fn service_health_handler(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let status = state.service.lifecycle().health(&service);
    let code = if status == HealthStatus::Serving {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(json!({ "service": service, "status": status.as_str() })))
}

/// Kubernetes liveness check -- always returns 200 OK.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness check -- returns 200 when ready, 503 otherwise.
///
/// Ready means the transport is serving and the hosted processor has been
/// marked serving by its lifecycle.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    let processor = state
        .service
        .lifecycle()
        .health(&state.service.identity().id);
    if state.shutdown.state() == ServingState::Ready && processor == HealthStatus::Serving {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use docproc_core::ServiceLifecycle;

    use super::*;
    use crate::network::handlers::test_state::app_state;

    #[tokio::test]
    async fn health_handler_returns_json_with_all_fields() {
        let (state, lifecycle) = app_state();
        state.shutdown.set_ready();
        lifecycle.set_health("sleepy", HealthStatus::Serving);

        let json = health_handler(State(state)).await.0;

        assert_eq!(json["state"], "ready");
        assert_eq!(json["server"], "unknown");
        assert_eq!(json["processor"]["id"], "sleepy");
        assert_eq!(json["processor"]["status"], "serving");
        assert_eq!(json["in_flight"], 0);
        assert!(json["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_requires_ready_state_and_serving_processor() {
        let (state, lifecycle) = app_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        lifecycle.set_health("sleepy", HealthStatus::Serving);
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn service_health_reports_lifecycle_status() {
        let (state, lifecycle) = app_state();
        lifecycle.set_health("sleepy", HealthStatus::Serving);

        let (code, body) =
            service_health_handler(State(state.clone()), Path("sleepy".to_string())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.0["status"], "serving");

        let (code, body) =
            service_health_handler(State(state), Path("missing".to_string())).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.0["status"], "unknown");
    }
}
