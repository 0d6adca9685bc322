//! craftgrid-state: embedded store for metric series and world records.
//!
//! Backed by [redb](https://docs.rs/redb). Values are JSON; metric keys are
//! ordered by series and then by zero-padded timestamp, so windowed queries
//! are single range scans.
//!
//! `StateStore` is `Clone + Send + Sync` (an `Arc<Database>`) and is shared
//! by the sampler, the autoscaler and the API. Consumers that only read or
//! write metrics depend on the [`MetricStore`] trait instead.

pub mod error;
pub mod metric_store;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use metric_store::MetricStore;
pub use store::StateStore;
pub use types::*;
