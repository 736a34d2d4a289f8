// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /disaster-tweets (accept, reject incomplete, reject bad timestamps)
// - GET /disaster-tweets  (defaults, filters, lenient query parsing)
// - GET /map/config       (defaults, explicit coordinates, geocoder wiring)

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use disaster_signal_aggregator::api;
use disaster_signal_aggregator::geocode::ReverseGeocoder;
use disaster_signal_aggregator::store::TweetStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

/// Geocoder answering every lookup with a fixed name, recording nothing.
struct FixedGeocoder(&'static str);

#[async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn location_name(&self, _lat: f64, _lon: f64) -> String {
        self.0.to_string()
    }
}

/// Same Router shape the binary uses, with an injected geocoder.
fn test_router() -> Router {
    api::create_router_with(
        Arc::new(TweetStore::new()),
        Arc::new(FixedGeocoder("Testville")),
    )
}

fn tweet_body(text: &str, confidence: f32, created_at: &str) -> String {
    json!({
        "text": text,
        "author": "NWS",
        "created_at": created_at,
        "disaster_confidence": confidence,
    })
    .to_string()
}

async fn post_tweet(app: &Router, body: String) -> StatusCode {
    let req = Request::builder()
        .method("POST")
        .uri("/disaster-tweets")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("build POST /disaster-tweets");
    app.clone()
        .oneshot(req)
        .await
        .expect("oneshot POST /disaster-tweets")
        .status()
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.clone().oneshot(req).await.expect("oneshot GET");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "ok");
}

#[tokio::test]
async fn api_post_then_get_round_trips() {
    let app = test_router();
    let now = chrono::Utc::now().to_rfc3339();

    let status = post_tweet(&app, tweet_body("flood warning downtown", 0.8, &now)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, v) = get_json(&app, "/disaster-tweets").await;
    assert_eq!(status, StatusCode::OK);
    let arr = v.as_array().expect("array response");
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["text"], "flood warning downtown");
    assert_eq!(arr[0]["author"], "NWS");
    assert!((arr[0]["disaster_confidence"].as_f64().unwrap() - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn api_post_rejects_incomplete_payload() {
    let app = test_router();

    let body = json!({ "text": "no author here", "disaster_confidence": 0.9 }).to_string();
    let status = post_tweet(&app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing should have been stored.
    let (_, v) = get_json(&app, "/disaster-tweets?min_confidence=0").await;
    assert!(v.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn api_post_rejects_unparseable_timestamp() {
    let app = test_router();
    let status = post_tweet(&app, tweet_body("storm surge", 0.9, "sometime last week")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_post_accepts_space_separated_timestamp() {
    // Publishers that stringify datetimes emit this shape.
    let app = test_router();
    let status = post_tweet(&app, tweet_body("storm surge", 0.9, "2099-03-01 12:30:00+00:00")).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn api_get_applies_confidence_floor_and_limit() {
    let app = test_router();
    let now = chrono::Utc::now().to_rfc3339();

    for (text, conf) in [("low", 0.3), ("mid", 0.6), ("high", 0.9)] {
        let status = post_tweet(&app, tweet_body(text, conf, &now)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Default floor of 0.5 hides the low-confidence row.
    let (_, v) = get_json(&app, "/disaster-tweets").await;
    let texts: Vec<_> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["high", "mid"]);

    // Explicit floor and limit.
    let (_, v) = get_json(&app, "/disaster-tweets?min_confidence=0&limit=1").await;
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["text"], "high");
}

#[tokio::test]
async fn api_get_ignores_garbage_query_params() {
    let app = test_router();
    let now = chrono::Utc::now().to_rfc3339();
    let status = post_tweet(&app, tweet_body("flood", 0.8, &now)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, v) = get_json(&app, "/disaster-tweets?limit=ten&min_confidence=high").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn api_map_config_defaults_to_new_york() {
    let app = test_router();

    let (status, v) = get_json(&app, "/map/config").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        v["tileServer"],
        "https://tile.openstreetmap.org/{z}/{x}/{y}.png"
    );
    let region = &v["initialRegion"];
    assert!((region["latitude"].as_f64().unwrap() - 40.7128).abs() < 1e-9);
    assert!((region["longitude"].as_f64().unwrap() - (-74.0060)).abs() < 1e-9);
    assert!((region["latitudeDelta"].as_f64().unwrap() - 0.0922).abs() < 1e-9);
    assert!((region["longitudeDelta"].as_f64().unwrap() - 0.0421).abs() < 1e-9);
    assert_eq!(v["locationName"], "Testville");
}

#[tokio::test]
async fn api_map_config_uses_explicit_coordinates() {
    let app = test_router();

    let (_, v) = get_json(&app, "/map/config?lat=35.6762&lng=139.6503").await;
    let region = &v["initialRegion"];
    assert!((region["latitude"].as_f64().unwrap() - 35.6762).abs() < 1e-9);
    assert!((region["longitude"].as_f64().unwrap() - 139.6503).abs() < 1e-9);
}

#[tokio::test]
async fn api_map_config_falls_back_on_malformed_coordinates() {
    let app = test_router();

    let (status, v) = get_json(&app, "/map/config?lat=north&lng=west").await;
    assert_eq!(status, StatusCode::OK);
    let region = &v["initialRegion"];
    assert!((region["latitude"].as_f64().unwrap() - 40.7128).abs() < 1e-9);
    assert!((region["longitude"].as_f64().unwrap() - (-74.0060)).abs() < 1e-9);
}
