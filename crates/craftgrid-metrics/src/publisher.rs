//! Status sampler: one query per world per tick, projected into metric points.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use craft_core::{Edition, MetricName, PublishTarget};
use craftgrid_state::{epoch_secs, MetricPoint, MetricStore};
use craftgrid_status::{default_clients, ServerStatus, StatusQuery};

/// What one publish tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// The batch was written.
    Published(Vec<MetricPoint>),
    /// The status query failed; nothing was written.
    NoSample(String),
    /// The batch could not be written.
    WriteFailed(String),
}

impl PublishOutcome {
    pub fn points_written(&self) -> usize {
        match self {
            PublishOutcome::Published(points) => points.len(),
            _ => 0,
        }
    }
}

/// Project one status reading into its metric batch.
///
/// `Ping` is always present; `PlayersOnline` and `PlayersMax` are added
/// together, and only when the server reported players.
pub fn status_points(target: &PublishTarget, status: &ServerStatus, now: u64) -> Vec<MetricPoint> {
    let dimensions = target.dimensions();
    let mut points = vec![MetricPoint::new(
        MetricName::Ping,
        dimensions.clone(),
        now,
        status.ping_ms as f64,
    )];
    if let Some(players) = status.players {
        points.push(MetricPoint::new(
            MetricName::PlayersOnline,
            dimensions.clone(),
            now,
            players.online as f64,
        ));
        points.push(MetricPoint::new(
            MetricName::PlayersMax,
            dimensions,
            now,
            players.max as f64,
        ));
    }
    points
}

/// Samples worlds and publishes their status into the metric store.
pub struct MetricPublisher {
    store: Arc<dyn MetricStore>,
    clients: HashMap<Edition, Arc<dyn StatusQuery>>,
    timeout: Duration,
}

impl MetricPublisher {
    /// Create a publisher using the network clients for both editions.
    pub fn new(store: Arc<dyn MetricStore>, timeout: Duration) -> Self {
        Self {
            store,
            clients: default_clients(),
            timeout,
        }
    }

    /// Replace the status client used for one edition.
    pub fn with_client(mut self, edition: Edition, client: Arc<dyn StatusQuery>) -> Self {
        self.clients.insert(edition, client);
        self
    }

    pub async fn publish(&self, target: &PublishTarget) -> PublishOutcome {
        self.publish_at(target, epoch_secs()).await
    }

    /// Run one tick for `target`, stamping points with `now`.
    pub async fn publish_at(&self, target: &PublishTarget, now: u64) -> PublishOutcome {
        let Some(client) = self.clients.get(&target.edition) else {
            warn!(edition = %target.edition, host = %target.host_name, "no status client for edition");
            return PublishOutcome::NoSample(format!("no client for {}", target.edition));
        };

        let query = client.query(&target.host_name, self.timeout);
        let status = match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(
                    host = %target.host_name,
                    service = %target.service_name,
                    error = %e,
                    "status query failed"
                );
                return PublishOutcome::NoSample(e.to_string());
            }
            Err(_) => {
                warn!(
                    host = %target.host_name,
                    service = %target.service_name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "status query timed out"
                );
                return PublishOutcome::NoSample("timed out".to_string());
            }
        };

        let points = status_points(target, &status, now);
        match self.store.put_points(&points) {
            Ok(()) => {
                debug!(
                    host = %target.host_name,
                    ping_ms = status.ping_ms,
                    players = ?status.players.map(|p| p.online),
                    points = points.len(),
                    "status published"
                );
                PublishOutcome::Published(points)
            }
            Err(e) => {
                error!(
                    host = %target.host_name,
                    service = %target.service_name,
                    error = %e,
                    "metric write failed"
                );
                PublishOutcome::WriteFailed(e.to_string())
            }
        }
    }

    /// Sample every target once, concurrently.
    pub async fn publish_all(self: &Arc<Self>, targets: &[PublishTarget]) -> Vec<PublishOutcome> {
        let mut tasks = JoinSet::new();
        for target in targets {
            let publisher = Arc::clone(self);
            let target = target.clone();
            tasks.spawn(async move { publisher.publish(&target).await });
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "publish task panicked"),
            }
        }
        outcomes
    }

    /// Run the sampling loop until shutdown.
    pub async fn run(
        self: Arc<Self>,
        targets: Vec<PublishTarget>,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            worlds = targets.len(),
            interval_secs = interval.as_secs(),
            "status sampler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let outcomes = self.publish_all(&targets).await;
                    let written: usize = outcomes.iter().map(PublishOutcome::points_written).sum();
                    debug!(worlds = outcomes.len(), points = written, "sampler tick complete");
                }
                _ = shutdown.changed() => {
                    info!("status sampler shutting down");
                    break;
                }
            }
        }
    }
}
