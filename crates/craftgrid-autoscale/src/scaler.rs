//! Autoscaler: scale-to-zero for idle worlds.
//!
//! Reads every world record from the store, evaluates its idle alarm, and
//! emits scaling decisions. The scaling itself is either a callback (for
//! an external capacity API) or a direct write of the desired capacity.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use craftgrid_state::{epoch_secs, MetricStore, StateStore, WorldRecord};

use crate::alarm::{AlarmEvaluator, AlarmState, Evaluation};

/// A scaling decision for a single world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Set the world's desired capacity to exactly this value.
    ScaleTo(u32),
    /// No change needed.
    NoChange,
}

/// Controller state of a world, read from its desired capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldState {
    Running,
    IdleConfirmed,
}

impl WorldState {
    pub fn of(world: &WorldRecord) -> Self {
        if world.is_running() {
            WorldState::Running
        } else {
            WorldState::IdleConfirmed
        }
    }
}

/// Callback type for performing scaling actions.
///
/// The autoscaler calls this with (world name, target capacity).
pub type ScaleCallback = Box<dyn Fn(&str, u32) -> ScaleFuture + Send + Sync>;

pub type ScaleFuture = std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>;

pub struct Autoscaler {
    state: StateStore,
    evaluator: AlarmEvaluator,
    /// Overrides the default capacity write.
    scale_fn: Option<ScaleCallback>,
}

impl Autoscaler {
    /// Create an autoscaler reading worlds and metrics from `state`.
    pub fn new(state: StateStore, period: Duration, lookback_factor: u32) -> Self {
        let evaluator = AlarmEvaluator::new(Arc::new(state.clone()), period, lookback_factor);
        Self {
            state,
            evaluator,
            scale_fn: None,
        }
    }

    /// Read metrics from a different store.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricStore>) -> Self {
        self.evaluator = AlarmEvaluator::new(
            metrics,
            self.evaluator.period(),
            self.evaluator.lookback_factor(),
        );
        self
    }

    /// Set the callback used to perform scaling.
    pub fn with_scale_fn(mut self, f: ScaleCallback) -> Self {
        self.scale_fn = Some(f);
        self
    }

    pub fn evaluator(&self) -> &AlarmEvaluator {
        &self.evaluator
    }

    /// Decide what to do with one world.
    ///
    /// Only a running world with an alarming idle series scales, and only
    /// to zero. An already-idle world is left alone.
    pub fn evaluate(&self, world: &WorldRecord, now: u64) -> (Evaluation, ScaleDecision) {
        let evaluation = self.evaluator.evaluate(world, now);
        let decision = match (WorldState::of(world), evaluation.state) {
            (WorldState::Running, AlarmState::Alarm) => ScaleDecision::ScaleTo(0),
            _ => ScaleDecision::NoChange,
        };
        (evaluation, decision)
    }

    pub async fn evaluate_all(&self) -> anyhow::Result<Vec<(String, ScaleDecision)>> {
        self.evaluate_all_at(epoch_secs()).await
    }

    /// Evaluate all worlds with autoscaling enabled as of `now`.
    pub async fn evaluate_all_at(&self, now: u64) -> anyhow::Result<Vec<(String, ScaleDecision)>> {
        let worlds = self.state.list_worlds()?;
        let mut decisions = Vec::new();

        for world in &worlds {
            if !world.autoscaling_enabled {
                continue;
            }

            let (evaluation, decision) = self.evaluate(world, now);

            if let ScaleDecision::ScaleTo(target) = decision {
                info!(
                    world = %world.name,
                    streak = evaluation.streak,
                    required = evaluation.required,
                    target,
                    "world idle, scaling down"
                );
                if let Err(e) = self.scale(&world.name, target, now).await {
                    warn!(
                        world = %world.name,
                        target,
                        error = %e,
                        "scaling action failed"
                    );
                }
            } else {
                debug!(world = %world.name, state = ?evaluation.state, "no scaling change");
            }

            decisions.push((world.name.clone(), decision));
        }

        Ok(decisions)
    }

    async fn scale(&self, world: &str, target: u32, now: u64) -> anyhow::Result<()> {
        match &self.scale_fn {
            Some(scale_fn) => scale_fn(world, target).await,
            None => {
                self.state.set_desired_capacity(world, target, now)?;
                Ok(())
            }
        }
    }

    /// Run the autoscaler loop.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "autoscaler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.evaluate_all().await {
                        tracing::error!(error = %e, "autoscaler evaluation failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}
