//! craftgrid-autoscale: scale idle worlds to zero.
//!
//! Reads the `PlayersOnline` series from the metric store, folds per-period
//! maxima into an alarm state, and sets a running world's desired capacity
//! to zero once it has been idle for its whole idle delay.
//!
//! # Alarm algorithm
//!
//! ```text
//! N      = ceil(idle_delay / period)
//! window = last lookback_factor * N closed periods,
//!          never starting before the last capacity change
//!
//! for each period, oldest first:
//!     max < 1   → streak += 1
//!     max ≥ 1   → streak  = 0
//!     no data  → streak unchanged
//!
//! ALARM             if streak ≥ N
//! INSUFFICIENT_DATA if the window has no data or the store failed
//! OK                otherwise
//! ```
//!
//! Only `Running → ScaleTo(0)` is driven here. Scaling back up is an
//! external signal (the capacity endpoint of the API).

pub mod alarm;
pub mod scaler;

pub use alarm::{evaluate_periods, AlarmEvaluator, AlarmState, Evaluation};
pub use scaler::{Autoscaler, ScaleCallback, ScaleDecision, ScaleFuture, WorldState};
