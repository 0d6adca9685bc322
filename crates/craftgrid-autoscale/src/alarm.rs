//! Idle alarm evaluation over the `PlayersOnline` series.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use craft_core::{AlarmDefinition, Comparison};
use craftgrid_state::{MetricStore, SeriesKey, WorldRecord};

/// Derived alarm state. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
}

/// One evaluation of a world's alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub state: AlarmState,
    /// Consecutive breaching periods at the end of the window.
    pub streak: u32,
    /// Breaching periods needed to alarm.
    pub required: u32,
    /// Start of the first evaluated period (unix seconds).
    pub window_start: u64,
    pub period_secs: u64,
    /// Per-period maxima, oldest first.
    pub maxima: Vec<Option<f64>>,
    /// Set when the store could not be read.
    pub error: Option<String>,
}

/// Fold per-period maxima into an alarm state and the final streak.
///
/// Periods without data neither advance nor reset the streak.
pub fn evaluate_periods(
    maxima: &[Option<f64>],
    threshold: f64,
    comparison: Comparison,
    required: u32,
) -> (AlarmState, u32) {
    let mut streak = 0u32;
    let mut any_data = false;
    for value in maxima.iter().flatten() {
        any_data = true;
        if comparison.breaches(*value, threshold) {
            streak += 1;
        } else {
            streak = 0;
        }
    }

    let state = if !any_data {
        AlarmState::InsufficientData
    } else if streak >= required {
        AlarmState::Alarm
    } else {
        AlarmState::Ok
    };
    (state, streak)
}

/// Evaluates the scale-down alarm of each world against the metric store.
#[derive(Clone)]
pub struct AlarmEvaluator {
    store: Arc<dyn MetricStore>,
    period: Duration,
    lookback_factor: u32,
}

impl AlarmEvaluator {
    pub fn new(store: Arc<dyn MetricStore>, period: Duration, lookback_factor: u32) -> Self {
        Self {
            store,
            period,
            lookback_factor: lookback_factor.max(1),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn lookback_factor(&self) -> u32 {
        self.lookback_factor
    }

    /// The scale-down alarm for `world`.
    pub fn definition(&self, world: &WorldRecord) -> AlarmDefinition {
        AlarmDefinition::scale_down(world.dimensions(), world.idle_delay(), self.period)
    }

    /// Evaluate `world`'s alarm as of `now` (unix seconds).
    pub fn evaluate(&self, world: &WorldRecord, now: u64) -> Evaluation {
        let alarm = self.definition(world);
        let period = alarm.period_secs;
        let required = alarm.datapoints_to_alarm;
        let lookback = required.saturating_mul(self.lookback_factor) as u64;

        // A period is closed once it ended at least one period ago.
        let end = (now / period * period).saturating_sub(period);
        let earliest = world.capacity_updated_at.div_ceil(period) * period;
        let start = end.saturating_sub(lookback * period).max(earliest);
        let count = if end > start { ((end - start) / period) as u32 } else { 0 };

        let mut evaluation = Evaluation {
            state: AlarmState::InsufficientData,
            streak: 0,
            required,
            window_start: start,
            period_secs: period,
            maxima: Vec::new(),
            error: None,
        };
        if count == 0 {
            debug!(world = %world.name, "no closed periods since last capacity change");
            return evaluation;
        }

        let series = SeriesKey::new(alarm.metric, alarm.dimensions.clone());
        match self.store.max_per_period(&series, start, period, count) {
            Ok(maxima) => {
                let (state, streak) =
                    evaluate_periods(&maxima, alarm.threshold, alarm.comparison, required);
                evaluation.state = state;
                evaluation.streak = streak;
                evaluation.maxima = maxima;
            }
            Err(e) => {
                warn!(world = %world.name, error = %e, "metric read failed; alarm has insufficient data");
                evaluation.error = Some(e.to_string());
            }
        }

        debug!(
            world = %world.name,
            state = ?evaluation.state,
            streak = evaluation.streak,
            required,
            periods = count,
            "alarm evaluated"
        );
        evaluation
    }
}
