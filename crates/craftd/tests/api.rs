//! Operator API regression tests.
//!
//! Drives the full router: world listing, the scale-up signal, metric
//! windows, alarm state, the DNS task-event hook, and Prometheus output.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use craft_core::{FleetConfig, MetricName};
use craftgrid_api::{build_router, ApiState};
use craftgrid_autoscale::AlarmEvaluator;
use craftgrid_state::*;

const FLEET: &str = r#"
[[worlds]]
name = "survival"
host_name = "survival.example.com"
cluster = "mc"
[worlds.server]
edition = "java"
eula = true
[worlds.dns]
hosted_zone_id = "Z123"
"#;

fn test_router() -> (Router, StateStore) {
    let store = StateStore::open_in_memory().unwrap();
    let config = FleetConfig::from_toml_str(FLEET).unwrap();
    for spec in &config.worlds {
        store.register_world(spec, 1000).unwrap();
    }
    let evaluator = AlarmEvaluator::new(Arc::new(store.clone()), Duration::from_secs(60), 2);
    (build_router(ApiState::new(store.clone(), evaluator)), store)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn api_lists_registered_worlds() {
    let (router, _) = test_router();

    let resp = router.clone().oneshot(get("/api/v1/worlds")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["name"], "survival");
    assert_eq!(body["data"][0]["desired_capacity"], 0);

    let resp = router.oneshot(get("/api/v1/worlds/creative")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_capacity_is_the_scale_up_signal() {
    let (router, store) = test_router();

    let resp = router
        .clone()
        .oneshot(json("POST", "/api/v1/worlds/survival/capacity", r#"{"capacity":1}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let world = store.get_world("survival").unwrap().unwrap();
    assert_eq!(world.desired_capacity, 1);
    assert!(world.capacity_updated_at > 1000);

    let resp = router
        .clone()
        .oneshot(json("POST", "/api/v1/worlds/survival/capacity", r#"{"capacity":3}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = router
        .oneshot(json("POST", "/api/v1/worlds/creative/capacity", r#"{"capacity":1}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_metric_window_and_alarm() {
    let (router, store) = test_router();
    let world = store.get_world("survival").unwrap().unwrap();
    store
        .put_points(&[MetricPoint::new(
            MetricName::PlayersOnline,
            world.dimensions(),
            epoch_secs(),
            2.0,
        )])
        .unwrap();

    let resp = router
        .clone()
        .oneshot(get("/api/v1/worlds/survival/metrics/PlayersOnline"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["metric"], "PlayersOnline");
    assert_eq!(body["data"]["maxima"].as_array().unwrap().len(), 60);

    let resp = router
        .oneshot(get("/api/v1/worlds/survival/alarm"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["required"], 15);
    assert_ne!(body["data"]["state"], "ALARM");
}

#[tokio::test]
async fn api_task_event_updates_dns() {
    let (router, _) = test_router();

    let resp = router
        .clone()
        .oneshot(json("PUT", "/api/v1/interfaces/eni-9", r#"{"public_ip":"198.51.100.4"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let event = r#"{
        "clusterArn": "arn:cluster/mc",
        "taskArn": "arn:task/mc/1",
        "lastStatus": "RUNNING",
        "desiredStatus": "RUNNING",
        "attachments": [{"type": "eni", "details": [{"name": "networkInterfaceId", "value": "eni-9"}]}]
    }"#;
    let resp = router
        .clone()
        .oneshot(json("POST", "/api/v1/worlds/survival/task-events", event))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router.oneshot(get("/api/v1/dns")).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"][0]["name"], "survival.example.com.");
    assert_eq!(body["data"][0]["values"][0], "198.51.100.4");
    assert_eq!(body["data"][0]["ttl"], 60);
}

#[tokio::test]
async fn api_task_event_without_interface() {
    let (router, _) = test_router();

    let event = r#"{
        "clusterArn": "arn:cluster/mc",
        "taskArn": "arn:task/mc/1",
        "lastStatus": "RUNNING",
        "desiredStatus": "RUNNING"
    }"#;
    let resp = router
        .oneshot(json("POST", "/api/v1/worlds/survival/task-events", event))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("arn:task/mc/1"));
}

#[tokio::test]
async fn api_metrics_endpoint() {
    let (router, _) = test_router();

    let resp = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("craftgrid_desired_capacity{world=\"survival\""));
}
