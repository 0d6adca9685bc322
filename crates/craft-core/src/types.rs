//! Shared types: editions, the metric schema, trigger payloads, and alarm
//! definitions used by both the resource graph and the control loop.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Namespace every craftgrid metric is published under.
pub const METRIC_NAMESPACE: &str = "Minecraft";

pub const DEFAULT_JAVA_PORT: u16 = 25565;
pub const DEFAULT_RCON_PORT: u16 = 25575;
pub const DEFAULT_BEDROCK_IPV4_PORT: u16 = 19132;
pub const DEFAULT_BEDROCK_IPV6_PORT: u16 = 19133;

/// Threshold below which a period counts as idle.
pub const IDLE_PLAYER_THRESHOLD: f64 = 1.0;

// ── Editions ───────────────────────────────────────────────────────

/// Minecraft server family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Edition {
    #[default]
    Java,
    Bedrock,
}

impl Edition {
    /// Port the server listens on when none is configured.
    pub fn default_port(self) -> u16 {
        match self {
            Edition::Java => DEFAULT_JAVA_PORT,
            Edition::Bedrock => DEFAULT_BEDROCK_IPV4_PORT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Edition::Java => "java",
            Edition::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Metric schema ──────────────────────────────────────────────────

/// Names of the series the status sampler publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricName {
    Ping,
    PlayersOnline,
    PlayersMax,
}

impl MetricName {
    pub const ALL: [MetricName; 3] = [
        MetricName::Ping,
        MetricName::PlayersOnline,
        MetricName::PlayersMax,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::Ping => "Ping",
            MetricName::PlayersOnline => "PlayersOnline",
            MetricName::PlayersMax => "PlayersMax",
        }
    }

    /// The unit a datapoint of this metric is recorded in.
    pub fn unit(self) -> Unit {
        match self {
            MetricName::Ping => Unit::Milliseconds,
            MetricName::PlayersOnline | MetricName::PlayersMax => Unit::Count,
        }
    }

    /// Parse a metric name as it appears on the wire (`PlayersOnline`).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Milliseconds,
    Count,
}

/// The `{ClusterName, ServiceName}` pair that scopes a series to one world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimensions {
    pub cluster_name: String,
    pub service_name: String,
}

impl Dimensions {
    pub fn new(cluster_name: &str, service_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            service_name: service_name.to_string(),
        }
    }
}

// ── Trigger payloads ───────────────────────────────────────────────

/// Event detail carried by a world's scheduled sampling trigger.
///
/// One target is the unit of work for one sampler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishTarget {
    pub cluster_name: String,
    pub host_name: String,
    pub service_name: String,
    #[serde(default)]
    pub edition: Edition,
}

impl PublishTarget {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(&self.cluster_name, &self.service_name)
    }
}

/// Where the DNS updater writes a world's address record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsTarget {
    pub host_name: String,
    pub hosted_zone_id: String,
    pub ttl: u32,
}

// ── Alarms ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    LessThanThreshold,
    LessThanOrEqualToThreshold,
    GreaterThanThreshold,
    GreaterThanOrEqualToThreshold,
}

impl Comparison {
    /// Whether `value` breaches `threshold` under this comparison.
    pub fn breaches(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::LessThanThreshold => value < threshold,
            Comparison::LessThanOrEqualToThreshold => value <= threshold,
            Comparison::GreaterThanThreshold => value > threshold,
            Comparison::GreaterThanOrEqualToThreshold => value >= threshold,
        }
    }
}

/// A threshold alarm over the per-period maximum of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub namespace: String,
    pub metric: MetricName,
    pub dimensions: Dimensions,
    pub period_secs: u64,
    pub threshold: f64,
    pub comparison: Comparison,
    /// Consecutive breaching periods required to alarm.
    pub datapoints_to_alarm: u32,
}

impl AlarmDefinition {
    /// The scale-down alarm: `PlayersOnline` max below one player for
    /// `ceil(idle_delay / period)` periods.
    pub fn scale_down(dimensions: Dimensions, idle_delay: Duration, period: Duration) -> Self {
        Self {
            namespace: METRIC_NAMESPACE.to_string(),
            metric: MetricName::PlayersOnline,
            dimensions,
            period_secs: period.as_secs().max(1),
            threshold: IDLE_PLAYER_THRESHOLD,
            comparison: Comparison::LessThanThreshold,
            datapoints_to_alarm: evaluation_periods(idle_delay, period),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Number of sampling periods covering `idle_delay`, rounded up, at least one.
pub fn evaluation_periods(idle_delay: Duration, period: Duration) -> u32 {
    let period_ms = period.as_millis().max(1);
    let periods = idle_delay.as_millis().div_ceil(period_ms);
    periods.clamp(1, u32::MAX as u128) as u32
}

// ── Durations ──────────────────────────────────────────────────────

/// Parse a duration string like "500ms", "5s", "15m", "1h".
///
/// Plain numbers are seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
