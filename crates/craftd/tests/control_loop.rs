//! Sampler → store → autoscaler, end to end on an on-disk store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use craft_core::{Edition, FleetConfig, MetricName};
use craftgrid_autoscale::{AlarmState, Autoscaler, ScaleDecision};
use craftgrid_metrics::{MetricPublisher, PublishOutcome};
use craftgrid_state::*;
use craftgrid_status::{Players, QueryError, QueryFuture, ServerStatus, StatusQuery};

const MINUTE: u64 = 60;

const FLEET: &str = r#"
[sampler]
interval = "1m"
timeout = "1s"

[autoscale]
evaluation_interval = "1m"
lookback_factor = 2

[[worlds]]
name = "survival"
host_name = "survival.example.com"
cluster = "mc"
[worlds.server]
edition = "java"
eula = true
[worlds.resources]
autoscale_delay = "15m"
initial_capacity = 1
"#;

/// A server whose player count the test controls. `None` means unreachable.
struct FakeServer(Mutex<Option<u32>>);

impl FakeServer {
    fn set(&self, online: Option<u32>) {
        *self.0.lock().unwrap() = online;
    }
}

impl StatusQuery for FakeServer {
    fn query<'a>(&'a self, _host: &'a str, _timeout: Duration) -> QueryFuture<'a> {
        let result = match *self.0.lock().unwrap() {
            Some(online) => Ok(ServerStatus {
                ping_ms: 13,
                players: Some(Players { online, max: 20 }),
                version: None,
                motd: None,
            }),
            None => Err(QueryError::Protocol("connection refused".to_string())),
        };
        Box::pin(async move { result })
    }
}

struct Fleet {
    _dir: tempfile::TempDir,
    store: StateStore,
    server: Arc<FakeServer>,
    publisher: MetricPublisher,
    autoscaler: Autoscaler,
    targets: Vec<craft_core::PublishTarget>,
}

fn fleet() -> Fleet {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(&dir.path().join("craftgrid.redb")).unwrap();
    let config = FleetConfig::from_toml_str(FLEET).unwrap();
    let targets = config
        .worlds
        .iter()
        .map(|spec| store.register_world(spec, 0).unwrap().publish_target())
        .collect();

    let server = Arc::new(FakeServer(Mutex::new(Some(0))));
    let publisher = MetricPublisher::new(Arc::new(store.clone()), config.sampling_timeout().unwrap())
        .with_client(Edition::Java, server.clone());
    let autoscaler = Autoscaler::new(
        store.clone(),
        config.sampling_interval().unwrap(),
        config.autoscale.lookback_factor,
    );

    Fleet {
        _dir: dir,
        store,
        server,
        publisher,
        autoscaler,
        targets,
    }
}

impl Fleet {
    /// One sampler tick per minute in `minutes`.
    async fn sample(&self, minutes: std::ops::Range<u64>) {
        for minute in minutes {
            for target in &self.targets {
                self.publisher.publish_at(target, minute * MINUTE).await;
            }
        }
    }

    async fn evaluate_at(&self, now: u64) -> ScaleDecision {
        let decisions = self.autoscaler.evaluate_all_at(now).await.unwrap();
        assert_eq!(decisions.len(), 1);
        decisions[0].1.clone()
    }

    fn capacity(&self) -> u32 {
        self.store.get_world("survival").unwrap().unwrap().desired_capacity
    }
}

#[tokio::test]
async fn idle_world_is_stopped_after_its_delay() {
    let fleet = fleet();
    fleet.sample(0..20).await;

    assert_eq!(fleet.evaluate_at(15 * MINUTE).await, ScaleDecision::NoChange);
    assert_eq!(fleet.capacity(), 1);

    assert_eq!(fleet.evaluate_at(16 * MINUTE).await, ScaleDecision::ScaleTo(0));
    assert_eq!(fleet.capacity(), 0);

    // Already stopped: no second action.
    assert_eq!(fleet.evaluate_at(17 * MINUTE).await, ScaleDecision::NoChange);
    assert_eq!(fleet.capacity(), 0);
}

#[tokio::test]
async fn player_resets_the_idle_streak() {
    let fleet = fleet();
    fleet.sample(0..10).await;
    fleet.server.set(Some(1));
    fleet.sample(10..11).await;
    fleet.server.set(Some(0));
    fleet.sample(11..40).await;

    assert_eq!(fleet.evaluate_at(26 * MINUTE).await, ScaleDecision::NoChange);
    assert_eq!(fleet.evaluate_at(27 * MINUTE).await, ScaleDecision::ScaleTo(0));
}

#[tokio::test]
async fn unreachable_server_never_scales() {
    let fleet = fleet();
    fleet.server.set(None);
    fleet.sample(0..40).await;

    let evaluation = fleet
        .autoscaler
        .evaluator()
        .evaluate(&fleet.store.get_world("survival").unwrap().unwrap(), 40 * MINUTE);
    assert_eq!(evaluation.state, AlarmState::InsufficientData);
    assert_eq!(fleet.evaluate_at(40 * MINUTE).await, ScaleDecision::NoChange);
    assert_eq!(fleet.capacity(), 1);
}

#[tokio::test]
async fn scale_up_restarts_the_idle_window() {
    let fleet = fleet();
    fleet.sample(0..20).await;
    assert_eq!(fleet.evaluate_at(16 * MINUTE).await, ScaleDecision::ScaleTo(0));

    // A player asks for the world back.
    fleet
        .store
        .set_desired_capacity("survival", 1, 20 * MINUTE + 30)
        .unwrap();
    fleet.sample(20..60).await;

    // Idle history from before the scale-up does not count.
    assert_eq!(fleet.evaluate_at(22 * MINUTE).await, ScaleDecision::NoChange);
    assert_eq!(fleet.evaluate_at(36 * MINUTE).await, ScaleDecision::NoChange);
    assert_eq!(fleet.capacity(), 1);

    assert_eq!(fleet.evaluate_at(37 * MINUTE).await, ScaleDecision::ScaleTo(0));
    assert_eq!(fleet.capacity(), 0);
}

#[tokio::test]
async fn sampler_writes_players_series() {
    let fleet = fleet();
    fleet.server.set(Some(3));
    let outcome = fleet.publisher.publish_at(&fleet.targets[0], 5 * MINUTE).await;
    assert_eq!(outcome.points_written(), 3);

    let world = fleet.store.get_world("survival").unwrap().unwrap();
    let latest = fleet
        .store
        .latest_point(&SeriesKey::new(MetricName::PlayersOnline, world.dimensions()))
        .unwrap()
        .unwrap();
    assert_eq!((latest.timestamp, latest.value), (5 * MINUTE, 3.0));

    fleet.server.set(None);
    let outcome = fleet.publisher.publish_at(&fleet.targets[0], 6 * MINUTE).await;
    assert!(matches!(outcome, PublishOutcome::NoSample(_)));
}

#[tokio::test]
async fn loops_stop_on_shutdown() {
    let Fleet {
        _dir,
        publisher,
        autoscaler,
        targets,
        ..
    } = fleet();
    let (tx, rx) = tokio::sync::watch::channel(false);

    let sampler_rx = rx.clone();
    let sampler = tokio::spawn(async move {
        Arc::new(publisher)
            .run(targets, Duration::from_secs(3600), sampler_rx)
            .await
    });
    let scaler = tokio::spawn(async move { autoscaler.run(Duration::from_secs(3600), rx).await });

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), async {
        sampler.await.unwrap();
        scaler.await.unwrap();
    })
    .await
    .unwrap();
}
