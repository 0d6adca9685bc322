//! Persisted types: metric points and world records.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use craft_core::{
    Dimensions, DnsTarget, Edition, MetricName, PublishTarget, Unit, WorldSpec, METRIC_NAMESPACE,
};

/// Seconds since the unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Series ─────────────────────────────────────────────────────────

/// Address of one time series: (namespace, metric, dimensions).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub namespace: String,
    pub metric: MetricName,
    pub dimensions: Dimensions,
}

impl SeriesKey {
    /// A series in the `Minecraft` namespace.
    pub fn new(metric: MetricName, dimensions: Dimensions) -> Self {
        Self {
            namespace: METRIC_NAMESPACE.to_string(),
            metric,
            dimensions,
        }
    }

    /// `{namespace}/{metric}/{cluster}/{service}` without a trailing slash.
    pub fn base(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.namespace, self.metric, self.dimensions.cluster_name, self.dimensions.service_name
        )
    }

    pub fn point_key(&self, timestamp: u64) -> String {
        format!("{}/{timestamp:020}", self.base())
    }
}

// ── Metric points ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub namespace: String,
    pub metric: MetricName,
    pub dimensions: Dimensions,
    /// Unix timestamp (seconds) the sample was taken.
    pub timestamp: u64,
    pub unit: Unit,
    pub value: f64,
}

impl MetricPoint {
    /// A point in the `Minecraft` namespace with the metric's own unit.
    pub fn new(metric: MetricName, dimensions: Dimensions, timestamp: u64, value: f64) -> Self {
        Self {
            namespace: METRIC_NAMESPACE.to_string(),
            metric,
            dimensions,
            timestamp,
            unit: metric.unit(),
            value,
        }
    }

    pub fn series(&self) -> SeriesKey {
        SeriesKey {
            namespace: self.namespace.clone(),
            metric: self.metric,
            dimensions: self.dimensions.clone(),
        }
    }

    pub fn table_key(&self) -> String {
        self.series().point_key(self.timestamp)
    }
}

// ── Worlds ─────────────────────────────────────────────────────────

/// Runtime record of one world: identity plus its capacity target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRecord {
    pub name: String,
    pub edition: Edition,
    pub cluster_name: String,
    pub service_name: String,
    pub host_name: String,
    pub port: u16,
    /// 0 (stopped) or 1 (running).
    pub desired_capacity: u32,
    pub autoscaling_enabled: bool,
    pub idle_delay_secs: u64,
    pub dns: Option<DnsTarget>,
    /// Unix timestamp of the last capacity change.
    pub capacity_updated_at: u64,
    pub created_at: u64,
}

impl WorldRecord {
    /// Record for a freshly declared world at its initial capacity.
    pub fn declared(spec: &WorldSpec, now: u64) -> Self {
        Self {
            name: spec.name.clone(),
            edition: spec.edition(),
            cluster_name: spec.cluster_name(),
            service_name: spec.service_name(),
            host_name: spec.host_name.clone(),
            port: spec.game_port(),
            desired_capacity: spec.initial_capacity(),
            autoscaling_enabled: spec.autoscaling_enabled(),
            idle_delay_secs: spec.idle_delay().as_secs(),
            dns: spec.dns_target(),
            capacity_updated_at: now,
            created_at: now,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(&self.cluster_name, &self.service_name)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_secs(self.idle_delay_secs)
    }

    pub fn is_running(&self) -> bool {
        self.desired_capacity > 0
    }

    /// Trigger payload for this world's sampler tick.
    pub fn publish_target(&self) -> PublishTarget {
        let host_name = if self.port == self.edition.default_port() {
            self.host_name.clone()
        } else {
            format!("{}:{}", self.host_name, self.port)
        };
        PublishTarget {
            cluster_name: self.cluster_name.clone(),
            host_name,
            service_name: self.service_name.clone(),
            edition: self.edition,
        }
    }
}
