//! StateStore: redb-backed persistence for worlds and metric points.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use craft_core::WorldSpec;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(WORLDS).map_err(map_err!(Table))?;
        txn.open_table(POINTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Worlds ─────────────────────────────────────────────────────

    /// Insert or replace a world record.
    pub fn put_world(&self, world: &WorldRecord) -> StateResult<()> {
        let value = serde_json::to_vec(world).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORLDS).map_err(map_err!(Table))?;
            table
                .insert(world.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(world = %world.name, "world stored");
        Ok(())
    }

    pub fn get_world(&self, name: &str) -> StateResult<Option<WorldRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORLDS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let world: WorldRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(world))
            }
            None => Ok(None),
        }
    }

    /// List all worlds, ordered by name.
    pub fn list_worlds(&self) -> StateResult<Vec<WorldRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORLDS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let world: WorldRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(world);
        }
        Ok(results)
    }

    /// Delete a world by name. Returns true if it existed.
    pub fn delete_world(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(WORLDS).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(world = %name, existed, "world deleted");
        Ok(existed)
    }

    /// Store a world declared in the fleet config.
    ///
    /// A new world starts at its initial capacity. An existing one takes the
    /// declared settings but keeps its capacity and when it last changed.
    pub fn register_world(&self, spec: &WorldSpec, now: u64) -> StateResult<WorldRecord> {
        let declared = WorldRecord::declared(spec, now);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record;
        {
            let mut table = txn.open_table(WORLDS).map_err(map_err!(Table))?;
            let existing: Option<WorldRecord> = match table.get(spec.name.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                }
                None => None,
            };
            record = match existing {
                Some(current) => WorldRecord {
                    desired_capacity: current.desired_capacity,
                    capacity_updated_at: current.capacity_updated_at,
                    created_at: current.created_at,
                    ..declared
                },
                None => declared,
            };
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(record.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(world = %record.name, capacity = record.desired_capacity, "world registered");
        Ok(record)
    }

    /// Set a world's desired capacity.
    ///
    /// `capacity_updated_at` only moves when the value changes, so repeating
    /// the same target is a no-op. Returns the stored record.
    pub fn set_desired_capacity(
        &self,
        name: &str,
        capacity: u32,
        now: u64,
    ) -> StateResult<WorldRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record;
        {
            let mut table = txn.open_table(WORLDS).map_err(map_err!(Table))?;
            let mut world: WorldRecord = match table.get(name).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(format!("world {name}"))),
            };
            if world.desired_capacity != capacity {
                world.desired_capacity = capacity;
                world.capacity_updated_at = now;
                let value = serde_json::to_vec(&world).map_err(map_err!(Serialize))?;
                table
                    .insert(name, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            record = world;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(world = %name, capacity, "desired capacity set");
        Ok(record)
    }

    // ── Metric points ──────────────────────────────────────────────

    /// Write a batch of points in one transaction.
    ///
    /// A point with the same series and timestamp as an existing one
    /// replaces it.
    pub fn put_points(&self, points: &[MetricPoint]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(POINTS).map_err(map_err!(Table))?;
            for point in points {
                let key = point.table_key();
                let value = serde_json::to_vec(point).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = points.len(), "metric points stored");
        Ok(())
    }

    /// Points of one series with `from <= timestamp < to`, oldest first.
    pub fn points_between(
        &self,
        series: &SeriesKey,
        from: u64,
        to: u64,
    ) -> StateResult<Vec<MetricPoint>> {
        if to <= from {
            return Ok(Vec::new());
        }
        let start = series.point_key(from);
        let end = series.point_key(to);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POINTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let point: MetricPoint =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(point);
        }
        Ok(results)
    }

    /// Maximum per period for `count` periods of `period_secs` starting at
    /// `start`. Periods without points are `None`.
    pub fn max_per_period(
        &self,
        series: &SeriesKey,
        start: u64,
        period_secs: u64,
        count: u32,
    ) -> StateResult<Vec<Option<f64>>> {
        let mut maxima: Vec<Option<f64>> = vec![None; count as usize];
        if period_secs == 0 || count == 0 {
            return Ok(maxima);
        }
        let end = start.saturating_add(period_secs.saturating_mul(count as u64));
        for point in self.points_between(series, start, end)? {
            let index = ((point.timestamp - start) / period_secs) as usize;
            if let Some(slot) = maxima.get_mut(index) {
                *slot = Some(slot.map_or(point.value, |max| max.max(point.value)));
            }
        }
        Ok(maxima)
    }

    /// Most recent point of a series.
    pub fn latest_point(&self, series: &SeriesKey) -> StateResult<Option<MetricPoint>> {
        let base = series.base();
        // '0' is the byte after '/', so this bounds exactly the series' keys.
        let start = format!("{base}/");
        let end = format!("{base}0");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POINTS).map_err(map_err!(Table))?;
        let last = table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
            .next_back();
        match last {
            Some(entry) => {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let point: MetricPoint =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(point))
            }
            None => Ok(None),
        }
    }

    /// Delete every point older than `cutoff`. Returns the number removed.
    pub fn prune_points_before(&self, cutoff: u64) -> StateResult<u64> {
        // Collect keys in a read transaction first.
        let keys: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(POINTS).map_err(map_err!(Table))?;
            table
                .iter()
                .map_err(map_err!(Read))?
                .filter_map(|entry| {
                    let (key, _) = entry.ok()?;
                    let k = key.value().to_string();
                    let timestamp: u64 = k.rsplit('/').next()?.parse().ok()?;
                    (timestamp < cutoff).then_some(k)
                })
                .collect()
        };
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u64;
        {
            let mut table = txn.open_table(POINTS).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count, cutoff, "metric points pruned");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craft_core::{Dimensions, Edition, MetricName};

    fn test_world(name: &str) -> WorldRecord {
        WorldRecord {
            name: name.to_string(),
            edition: Edition::Java,
            cluster_name: "mc".to_string(),
            service_name: name.to_string(),
            host_name: format!("{name}.example.com"),
            port: 25565,
            desired_capacity: 1,
            autoscaling_enabled: true,
            idle_delay_secs: 900,
            dns: None,
            capacity_updated_at: 1000,
            created_at: 1000,
        }
    }

    fn online(service: &str, timestamp: u64, value: f64) -> MetricPoint {
        MetricPoint::new(
            MetricName::PlayersOnline,
            Dimensions::new("mc", service),
            timestamp,
            value,
        )
    }

    fn series(service: &str) -> SeriesKey {
        SeriesKey::new(MetricName::PlayersOnline, Dimensions::new("mc", service))
    }

    // ── World CRUD ─────────────────────────────────────────────────

    #[test]
    fn world_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let world = test_world("survival");

        store.put_world(&world).unwrap();
        assert_eq!(store.get_world("survival").unwrap(), Some(world));
        assert!(store.get_world("creative").unwrap().is_none());
    }

    #[test]
    fn world_list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_world(&test_world("b")).unwrap();
        store.put_world(&test_world("a")).unwrap();

        let names: Vec<String> = store
            .list_worlds()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        assert!(store.delete_world("a").unwrap());
        assert!(!store.delete_world("a").unwrap());
        assert_eq!(store.list_worlds().unwrap().len(), 1);
    }

    #[test]
    fn set_capacity_moves_timestamp_only_on_change() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_world(&test_world("survival")).unwrap();

        let record = store.set_desired_capacity("survival", 0, 2000).unwrap();
        assert_eq!(record.desired_capacity, 0);
        assert_eq!(record.capacity_updated_at, 2000);

        let record = store.set_desired_capacity("survival", 0, 3000).unwrap();
        assert_eq!(record.capacity_updated_at, 2000);
        assert_eq!(
            store.get_world("survival").unwrap().unwrap().capacity_updated_at,
            2000
        );
    }

    #[test]
    fn register_keeps_capacity_of_known_world() {
        let store = StateStore::open_in_memory().unwrap();
        let mut spec = craft_core::WorldSpec {
            name: "survival".to_string(),
            host_name: "survival.example.com".to_string(),
            cluster: Some("mc".to_string()),
            service: None,
            server: craft_core::ServerVariant::Java(Default::default()),
            resources: Default::default(),
            storage: Default::default(),
            logging: Default::default(),
            dns: None,
            sftp: None,
        };

        let first = store.register_world(&spec, 100).unwrap();
        assert_eq!(first.desired_capacity, 0);
        store.set_desired_capacity("survival", 1, 200).unwrap();

        spec.host_name = "play.example.com".to_string();
        let second = store.register_world(&spec, 300).unwrap();
        assert_eq!(second.host_name, "play.example.com");
        assert_eq!(second.desired_capacity, 1);
        assert_eq!(second.capacity_updated_at, 200);
        assert_eq!(second.created_at, 100);
        assert_eq!(store.get_world("survival").unwrap(), Some(second));
    }

    #[test]
    fn set_capacity_unknown_world() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.set_desired_capacity("nope", 1, 10).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    // ── Metric points ──────────────────────────────────────────────

    #[test]
    fn max_per_period_with_gaps() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_points(&[
                online("survival", 600, 0.0),
                online("survival", 630, 2.0),
                online("survival", 660, 0.0),
                // period starting at 720 has no data
                online("survival", 780, 0.0),
                online("creative", 600, 9.0),
            ])
            .unwrap();

        let maxima = store.max_per_period(&series("survival"), 600, 60, 4).unwrap();
        assert_eq!(maxima, vec![Some(2.0), Some(0.0), None, Some(0.0)]);
    }

    #[test]
    fn same_timestamp_is_last_write_wins() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_points(&[online("survival", 600, 3.0)]).unwrap();
        store.put_points(&[online("survival", 600, 1.0)]).unwrap();

        let points = store.points_between(&series("survival"), 0, 10_000).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 1.0);
    }

    #[test]
    fn latest_point_stays_within_series() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.latest_point(&series("survival")).unwrap().is_none());

        store
            .put_points(&[
                online("survival", 600, 0.0),
                online("survival", 660, 4.0),
                online("survival2", 900, 7.0),
            ])
            .unwrap();
        let latest = store.latest_point(&series("survival")).unwrap().unwrap();
        assert_eq!(latest.timestamp, 660);
        assert_eq!(latest.value, 4.0);
    }

    #[test]
    fn prune_removes_old_points() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_points(&[
                online("survival", 100, 0.0),
                online("survival", 200, 0.0),
                online("survival", 300, 0.0),
            ])
            .unwrap();

        assert_eq!(store.prune_points_before(250).unwrap(), 2);
        let points = store.points_between(&series("survival"), 0, 1_000).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp, 300);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("craftgrid.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_world(&test_world("survival")).unwrap();
            store.put_points(&[online("survival", 600, 1.0)]).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        assert!(store.get_world("survival").unwrap().is_some());
        assert!(store.latest_point(&series("survival")).unwrap().is_some());
    }
}
