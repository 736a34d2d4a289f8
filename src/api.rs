//! HTTP surface: tweet submission and retrieval plus the map bootstrap
//! config for the client. Query parameters parse leniently, anything
//! malformed falls back to its default instead of rejecting the request.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::geocode::{NominatimGeocoder, ReverseGeocoder};
use crate::store::{StoredTweet, TweetStore, DEFAULT_LIMIT, DEFAULT_MIN_CONFIDENCE};

pub const DEFAULT_LATITUDE: f64 = 40.7128;
pub const DEFAULT_LONGITUDE: f64 = -74.0060;
const TILE_SERVER_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
const LATITUDE_DELTA: f64 = 0.0922;
const LONGITUDE_DELTA: f64 = 0.0421;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TweetStore>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
}

/// Router with production wiring: a fresh store and the Nominatim geocoder.
pub fn create_router() -> Router {
    create_router_with(
        Arc::new(TweetStore::new()),
        Arc::new(NominatimGeocoder::new()),
    )
}

/// Router over caller-supplied collaborators. Tests inject fakes here; the
/// binary shares the store with the aggregator loop.
pub fn create_router_with(store: Arc<TweetStore>, geocoder: Arc<dyn ReverseGeocoder>) -> Router {
    let state = AppState { store, geocoder };
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/disaster-tweets", post(add_tweet).get(list_tweets))
        .route("/map/config", get(map_config))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct IncomingTweet {
    text: Option<String>,
    author: Option<String>,
    created_at: Option<String>,
    disaster_confidence: Option<f32>,
}

#[derive(serde::Serialize)]
struct StatusMsg {
    status: &'static str,
    message: String,
}

fn status_msg(status: &'static str, message: impl Into<String>) -> Json<StatusMsg> {
    Json(StatusMsg {
        status,
        message: message.into(),
    })
}

/// Accept timestamps in RFC 3339 and the common near-ISO shapes publishers
/// emit: a space instead of `T`, with or without an offset. Naive stamps are
/// taken as UTC.
pub fn parse_created_at(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    anyhow::bail!("unrecognized timestamp: {raw}")
}

async fn add_tweet(
    State(state): State<AppState>,
    Json(body): Json<IncomingTweet>,
) -> (StatusCode, Json<StatusMsg>) {
    let (Some(text), Some(author), Some(created_at), Some(confidence)) =
        (body.text, body.author, body.created_at, body.disaster_confidence)
    else {
        return (
            StatusCode::BAD_REQUEST,
            status_msg("error", "Missing required fields"),
        );
    };

    let created_at = match parse_created_at(&created_at) {
        Ok(ts) => ts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                status_msg("error", format!("Invalid timestamp format: {e}")),
            )
        }
    };

    state.store.push(StoredTweet {
        text,
        author: author.clone(),
        created_at,
        disaster_confidence: confidence,
    });
    counter!("store_tweets_added_total").increment(1);
    tracing::info!(target: "api", %author, confidence, "tweet added");

    (StatusCode::CREATED, status_msg("success", "Tweet added"))
}

#[derive(serde::Serialize)]
struct TweetOut {
    text: String,
    author: String,
    created_at: String,
    disaster_confidence: f32,
}

async fn list_tweets(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Vec<TweetOut>> {
    let limit = q
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LIMIT);
    let min_confidence = q
        .get("min_confidence")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MIN_CONFIDENCE);

    let rows = state.store.recent(Utc::now(), limit, min_confidence);
    let out = rows
        .into_iter()
        .map(|t| TweetOut {
            text: t.text,
            author: t.author,
            created_at: t.created_at.to_rfc3339(),
            disaster_confidence: t.disaster_confidence,
        })
        .collect();
    Json(out)
}

#[derive(serde::Serialize)]
struct MapConfig {
    #[serde(rename = "tileServer")]
    tile_server: &'static str,
    #[serde(rename = "initialRegion")]
    initial_region: InitialRegion,
    #[serde(rename = "locationName")]
    location_name: String,
}

#[derive(serde::Serialize)]
struct InitialRegion {
    latitude: f64,
    longitude: f64,
    #[serde(rename = "latitudeDelta")]
    latitude_delta: f64,
    #[serde(rename = "longitudeDelta")]
    longitude_delta: f64,
}

async fn map_config(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<MapConfig> {
    let lat = q
        .get("lat")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LATITUDE);
    let lng = q
        .get("lng")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LONGITUDE);

    let location_name = state.geocoder.location_name(lat, lng).await;

    Json(MapConfig {
        tile_server: TILE_SERVER_URL,
        initial_region: InitialRegion {
            latitude: lat,
            longitude: lng,
            latitude_delta: LATITUDE_DELTA,
            longitude_delta: LONGITUDE_DELTA,
        },
        location_name,
    })
}
