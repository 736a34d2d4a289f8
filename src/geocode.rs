//! Reverse geocoding for the map config endpoint.
//!
//! Resolution is infallible at the trait boundary: network trouble, odd
//! responses or missing fields all degrade to [`UNKNOWN_LOCATION`]. The
//! production implementation talks to Nominatim; tests drop in fixed fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";
// Nominatim's usage policy requires an identifying User-Agent.
const USER_AGENT: &str = "disaster-signal-aggregator/0.1";
const GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Deserialize)]
pub struct PlaceAddress {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub suburb: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NominatimPlace {
    pub address: Option<PlaceAddress>,
    pub display_name: Option<String>,
}

/// Most specific usable name for a place: city, then progressively coarser
/// address parts, then the first comma segment of the display name.
pub fn pick_place_name(place: &NominatimPlace) -> String {
    if let Some(addr) = &place.address {
        for candidate in [
            &addr.city,
            &addr.town,
            &addr.village,
            &addr.suburb,
            &addr.county,
            &addr.state,
        ] {
            if let Some(name) = candidate {
                return name.clone();
            }
        }
    }
    if let Some(display) = &place.display_name {
        if let Some(first) = display.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    UNKNOWN_LOCATION.to_string()
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Human-readable name for the coordinates, never failing.
    async fn location_name(&self, lat: f64, lon: f64) -> String;
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NominatimGeocoder {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(GEOCODE_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self { client }
    }

    async fn lookup(&self, lat: f64, lon: f64) -> anyhow::Result<NominatimPlace> {
        let place = self
            .client
            .get(NOMINATIM_URL)
            .query(&[
                ("format", "json"),
                ("lat", &lat.to_string()),
                ("lon", &lon.to_string()),
                ("zoom", "18"),
                ("addressdetails", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(place)
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn location_name(&self, lat: f64, lon: f64) -> String {
        match self.lookup(lat, lon).await {
            Ok(place) => pick_place_name(&place),
            Err(e) => {
                tracing::warn!(error = ?e, lat, lon, "reverse geocoding failed");
                UNKNOWN_LOCATION.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(json: &str) -> NominatimPlace {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn city_wins_over_coarser_parts() {
        let p = place(r#"{"address": {"city": "Osaka", "state": "Osaka Prefecture"}}"#);
        assert_eq!(pick_place_name(&p), "Osaka");
    }

    #[test]
    fn preference_chain_falls_through() {
        let p = place(r#"{"address": {"county": "Kings County", "state": "New York"}}"#);
        assert_eq!(pick_place_name(&p), "Kings County");

        let p = place(r#"{"address": {"state": "New York"}}"#);
        assert_eq!(pick_place_name(&p), "New York");
    }

    #[test]
    fn display_name_first_segment_as_fallback() {
        let p = place(r#"{"display_name": "Brooklyn Bridge, New York, USA"}"#);
        assert_eq!(pick_place_name(&p), "Brooklyn Bridge");
    }

    #[test]
    fn empty_payload_is_unknown() {
        let p = place("{}");
        assert_eq!(pick_place_name(&p), UNKNOWN_LOCATION);
    }

    #[test]
    fn empty_address_falls_back_to_display_name() {
        let p = place(r#"{"address": {}, "display_name": "Somewhere, Earth"}"#);
        assert_eq!(pick_place_name(&p), "Somewhere");
    }
}
