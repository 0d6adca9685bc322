//! Prometheus text exposition format.
//!
//! Renders each world's latest samples and capacity target for scraping by
//! a Prometheus server or compatible agent.

use craft_core::MetricName;
use craftgrid_state::{MetricPoint, SeriesKey, StateResult, StateStore};

/// The latest view of one world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub world: String,
    pub cluster: String,
    pub service: String,
    pub desired_capacity: u32,
    /// Most recent point per metric, where one exists.
    pub latest: Vec<MetricPoint>,
}

impl WorldSnapshot {
    fn labels(&self) -> String {
        format!(
            "world=\"{}\",cluster=\"{}\",service=\"{}\"",
            escape_label(&self.world),
            escape_label(&self.cluster),
            escape_label(&self.service)
        )
    }

    fn value(&self, metric: MetricName) -> Option<f64> {
        self.latest.iter().find(|p| p.metric == metric).map(|p| p.value)
    }
}

/// Escape a label value: backslash, double quote and line feed.
fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Read every world's record and latest points from the store.
pub fn collect_snapshots(store: &StateStore) -> StateResult<Vec<WorldSnapshot>> {
    let mut snapshots = Vec::new();
    for world in store.list_worlds()? {
        let mut latest = Vec::new();
        for metric in MetricName::ALL {
            if let Some(point) = store.latest_point(&SeriesKey::new(metric, world.dimensions()))? {
                latest.push(point);
            }
        }
        snapshots.push(WorldSnapshot {
            world: world.name.clone(),
            cluster: world.cluster_name.clone(),
            service: world.service_name.clone(),
            desired_capacity: world.desired_capacity,
            latest,
        });
    }
    Ok(snapshots)
}

const GAUGES: [(MetricName, &str, &str); 3] = [
    (MetricName::Ping, "craftgrid_ping_ms", "Last status query round trip in milliseconds."),
    (MetricName::PlayersOnline, "craftgrid_players_online", "Players online at the last sample."),
    (MetricName::PlayersMax, "craftgrid_players_max", "Player slots at the last sample."),
];

/// Render world snapshots into Prometheus text format.
///
/// Worlds without a sample for a metric are omitted from that gauge.
pub fn render_prometheus(snapshots: &[WorldSnapshot]) -> String {
    let mut out = String::new();

    for (metric, name, help) in GAUGES {
        out.push_str(&format!("# HELP {name} {help}\n"));
        out.push_str(&format!("# TYPE {name} gauge\n"));
        for s in snapshots {
            if let Some(value) = s.value(metric) {
                out.push_str(&format!("{name}{{{}}} {value}\n", s.labels()));
            }
        }
    }

    out.push_str("# HELP craftgrid_desired_capacity Desired task count (0 or 1).\n");
    out.push_str("# TYPE craftgrid_desired_capacity gauge\n");
    for s in snapshots {
        out.push_str(&format!(
            "craftgrid_desired_capacity{{{}}} {}\n",
            s.labels(),
            s.desired_capacity
        ));
    }

    out
}
