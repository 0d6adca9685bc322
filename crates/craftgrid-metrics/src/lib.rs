//! craftgrid-metrics: status sampling and metric exposition.
//!
//! # Architecture
//!
//! ```text
//! MetricPublisher
//!   ├── publish(target) ← one scheduled tick for one world
//!   │     query status ─► status_points() ─► MetricStore::put_points
//!   └── run() → samples every target concurrently each interval
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for the /metrics endpoint
//! ```
//!
//! A failed query writes nothing and a failed write is only logged: the
//! sampler never surfaces an error to its scheduler.

pub mod prometheus;
pub mod publisher;

pub use prometheus::{collect_snapshots, render_prometheus, WorldSnapshot};
pub use publisher::{status_points, MetricPublisher, PublishOutcome};
