//! REST API handlers.
//!
//! Each handler reads/writes via `StateStore` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use craft_core::MetricName;
use craftgrid_dns::{DnsUpdateError, TaskStateChange};
use craftgrid_state::{epoch_secs, SeriesKey, StateError, WorldRecord};

use crate::ApiState;

const METRIC_WINDOW_SECS: u64 = 3600;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal_error(e: impl std::fmt::Display) -> axum::response::Response {
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

/// Look up a world, or the response to return instead.
fn find_world(state: &ApiState, name: &str) -> Result<WorldRecord, axum::response::Response> {
    match state.store.get_world(name) {
        Ok(Some(world)) => Ok(world),
        Ok(None) => Err(error_response("world not found", StatusCode::NOT_FOUND).into_response()),
        Err(e) => Err(internal_error(e)),
    }
}

// ── Worlds ─────────────────────────────────────────────────────

/// GET /api/v1/worlds
pub async fn list_worlds(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_worlds() {
        Ok(worlds) => ApiResponse::ok(worlds).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/v1/worlds/{name}
pub async fn get_world(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match find_world(&state, &name) {
        Ok(world) => ApiResponse::ok(world).into_response(),
        Err(resp) => resp,
    }
}

// ── Capacity ───────────────────────────────────────────────────

/// Capacity request body.
#[derive(Debug, Deserialize)]
pub struct CapacityRequest {
    pub capacity: u32,
}

/// POST /api/v1/worlds/{name}/capacity
///
/// The external scale-up signal. Also accepts 0 for a manual stop.
pub async fn set_capacity(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<CapacityRequest>,
) -> impl IntoResponse {
    if req.capacity > 1 {
        return error_response(
            &format!("capacity must be 0 or 1, got {}", req.capacity),
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    }

    match state.store.set_desired_capacity(&name, req.capacity, epoch_secs()) {
        Ok(world) => {
            info!(world = %name, capacity = req.capacity, "desired capacity set by operator");
            ApiResponse::ok(world).into_response()
        }
        Err(StateError::NotFound(_)) => {
            error_response("world not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Metrics and alarms ─────────────────────────────────────────

/// Per-period maxima of one series.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricWindow {
    pub metric: MetricName,
    pub start: u64,
    pub period_secs: u64,
    /// Oldest first; `null` where the period has no points.
    pub maxima: Vec<Option<f64>>,
}

/// GET /api/v1/worlds/{name}/metrics/{metric}
///
/// Maxima for each period of the last hour, including the current one.
pub async fn get_metric(
    State(state): State<ApiState>,
    Path((name, metric)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(metric) = MetricName::parse(&metric) else {
        return error_response(&format!("unknown metric {metric}"), StatusCode::BAD_REQUEST)
            .into_response();
    };
    let world = match find_world(&state, &name) {
        Ok(world) => world,
        Err(resp) => return resp,
    };

    let period = state.evaluator.period().as_secs().max(1);
    let count = (METRIC_WINDOW_SECS / period).max(1);
    let end = epoch_secs() / period * period + period;
    let start = end.saturating_sub(count * period);

    let series = SeriesKey::new(metric, world.dimensions());
    match state.store.max_per_period(&series, start, period, count as u32) {
        Ok(maxima) => ApiResponse::ok(MetricWindow {
            metric,
            start,
            period_secs: period,
            maxima,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/v1/worlds/{name}/alarm
pub async fn get_alarm(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match find_world(&state, &name) {
        Ok(world) => ApiResponse::ok(state.evaluator.evaluate(&world, epoch_secs())).into_response(),
        Err(resp) => resp,
    }
}

// ── DNS ────────────────────────────────────────────────────────

/// POST /api/v1/worlds/{name}/task-events
pub async fn task_event(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(event): Json<TaskStateChange>,
) -> impl IntoResponse {
    let world = match find_world(&state, &name) {
        Ok(world) => world,
        Err(resp) => return resp,
    };
    let Some(target) = world.dns else {
        return error_response("world has no DNS target", StatusCode::BAD_REQUEST).into_response();
    };

    match state.dns.handle(&event, &target).await {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => {
            warn!(world = %name, task = %event.task_arn, error = %e, "DNS update failed");
            let status = match &e {
                DnsUpdateError::MissingNetworkInterface { .. }
                | DnsUpdateError::MissingPublicIp { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DnsUpdateError::Lookup { .. } | DnsUpdateError::Upsert { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            error_response(&e.to_string(), status).into_response()
        }
    }
}

/// Interface association body.
#[derive(Debug, Deserialize)]
pub struct InterfaceRequest {
    #[serde(default)]
    pub public_ip: Option<String>,
}

/// PUT /api/v1/interfaces/{id}
pub async fn put_interface(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<InterfaceRequest>,
) -> impl IntoResponse {
    state.interfaces.associate(&id, req.public_ip.clone());
    ApiResponse::ok(serde_json::json!({
        "interface": id,
        "public_ip": req.public_ip,
    }))
}

/// GET /api/v1/dns
pub async fn list_dns(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.records.list())
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshots = match craftgrid_metrics::collect_snapshots(&state.store) {
        Ok(snapshots) => snapshots,
        Err(e) => {
            warn!(error = %e, "failed to collect world snapshots");
            Vec::new()
        }
    };

    let body = craftgrid_metrics::render_prometheus(&snapshots);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
