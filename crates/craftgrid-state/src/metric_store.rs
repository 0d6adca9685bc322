//! The metric sink/source seen by the sampler and the alarm evaluator.

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::{MetricPoint, SeriesKey};

/// Append-only time series store with a windowed max query.
///
/// Implemented by [`StateStore`]; tests substitute failing or recording
/// implementations.
pub trait MetricStore: Send + Sync {
    /// Write a batch atomically: all points land or none do.
    fn put_points(&self, points: &[MetricPoint]) -> StateResult<()>;

    /// Per-period maxima over `count` periods starting at `start`.
    fn max_per_period(
        &self,
        series: &SeriesKey,
        start: u64,
        period_secs: u64,
        count: u32,
    ) -> StateResult<Vec<Option<f64>>>;

    fn latest_point(&self, series: &SeriesKey) -> StateResult<Option<MetricPoint>>;
}

impl MetricStore for StateStore {
    fn put_points(&self, points: &[MetricPoint]) -> StateResult<()> {
        StateStore::put_points(self, points)
    }

    fn max_per_period(
        &self,
        series: &SeriesKey,
        start: u64,
        period_secs: u64,
        count: u32,
    ) -> StateResult<Vec<Option<f64>>> {
        StateStore::max_per_period(self, series, start, period_secs, count)
    }

    fn latest_point(&self, series: &SeriesKey) -> StateResult<Option<MetricPoint>> {
        StateStore::latest_point(self, series)
    }
}
