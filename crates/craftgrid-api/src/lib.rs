//! craftgrid-api: operator REST API.
//!
//! Exposes world records, the external scale-up signal, metric windows,
//! alarm state, and the DNS updater's task-event hook.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/worlds` | List all worlds |
//! | GET | `/api/v1/worlds/{name}` | Get one world |
//! | POST | `/api/v1/worlds/{name}/capacity` | Set desired capacity (0 or 1) |
//! | GET | `/api/v1/worlds/{name}/metrics/{metric}` | Per-period maxima for the last hour |
//! | GET | `/api/v1/worlds/{name}/alarm` | Current idle alarm evaluation |
//! | POST | `/api/v1/worlds/{name}/task-events` | Task state change, updates DNS |
//! | PUT | `/api/v1/interfaces/{id}` | Record a network interface's public IP |
//! | GET | `/api/v1/dns` | List address records |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};

use craftgrid_autoscale::AlarmEvaluator;
use craftgrid_dns::{DnsUpdater, InterfaceTable, RecordTable};
use craftgrid_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub evaluator: AlarmEvaluator,
    pub dns: Arc<DnsUpdater>,
    pub interfaces: InterfaceTable,
    pub records: RecordTable,
}

impl ApiState {
    /// State with in-memory interface and record tables behind the DNS updater.
    pub fn new(store: StateStore, evaluator: AlarmEvaluator) -> Self {
        let interfaces = InterfaceTable::new();
        let records = RecordTable::new();
        let dns = Arc::new(DnsUpdater::new(
            Arc::new(interfaces.clone()),
            Arc::new(records.clone()),
        ));
        Self {
            store,
            evaluator,
            dns,
            interfaces,
            records,
        }
    }
}

/// Build the complete API router (REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/worlds", get(handlers::list_worlds))
        .route("/worlds/{name}", get(handlers::get_world))
        .route("/worlds/{name}/capacity", post(handlers::set_capacity))
        .route("/worlds/{name}/metrics/{metric}", get(handlers::get_metric))
        .route("/worlds/{name}/alarm", get(handlers::get_alarm))
        .route("/worlds/{name}/task-events", post(handlers::task_event))
        .route("/interfaces/{id}", put(handlers::put_interface))
        .route("/dns", get(handlers::list_dns))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
