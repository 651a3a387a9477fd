use crate::geo::{BoundingBox, Coordinate};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://flightaware.com";

static VICINITY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"VICINITY_TOKEN":"([a-z0-9]+)""#).expect("vicinity token pattern is valid")
});

#[derive(Error, Debug)]
pub enum FlightAwareError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("no vicinity token found on airport page for {0}")]
    TokenNotFound(String),
}

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of the vicinity endpoint, a GeoJSON feature collection.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VicinityResponse {
    #[serde(rename = "features", default, deserialize_with = "null_as_default")]
    pub aircraft: Vec<Aircraft>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Aircraft {
    #[serde(default, deserialize_with = "null_as_default")]
    pub geometry: Geometry,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: AircraftProperties,
}

/// GeoJSON point; `coordinates` is `[longitude, latitude]`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Geometry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub coordinates: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AircraftProperties {
    pub flight_id: Option<String>,
    #[serde(rename = "direction")]
    pub heading: Option<i32>,
    #[serde(rename = "type")]
    pub model: Option<String>,
    #[serde(rename = "ident")]
    pub flight_number: Option<String>,
    pub icon: Option<String>,
    pub origin: Option<Airport>,
    pub destination: Option<Airport>,
    #[serde(rename = "flightType", deserialize_with = "null_as_default")]
    pub flight_type: FlightType,
    pub altitude: Option<i32>,
    pub groundspeed: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Airport {
    #[serde(rename = "iata", default)]
    pub code: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlightType {
    Airline,
    Cargo,
    #[default]
    #[serde(other)]
    Other,
}

impl FlightType {
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Airline | Self::Cargo)
    }
}

impl Aircraft {
    /// Current position, if the feature carries exactly one `[lon, lat]` pair.
    pub fn position(&self) -> Option<Coordinate> {
        match self.geometry.coordinates.as_slice() {
            [lon, lat] => Some(Coordinate::new(*lat, *lon)),
            _ => None,
        }
    }

    pub fn ident(&self) -> Option<&str> {
        self.properties
            .flight_number
            .as_deref()
            .filter(|ident| !ident.is_empty())
    }

    pub fn origin_code(&self) -> Option<&str> {
        self.properties
            .origin
            .as_ref()
            .and_then(|a| a.code.as_deref())
    }
}

/// Source of candidate aircraft for a watch cycle.
pub trait AircraftSource {
    fn fetch_token(
        &self,
        airport_code: &str,
    ) -> impl Future<Output = Result<String, FlightAwareError>> + Send;

    fn fetch_aircraft(
        &self,
        bbox: &BoundingBox,
        token: &str,
    ) -> impl Future<Output = Result<Vec<Aircraft>, FlightAwareError>> + Send;
}

pub fn extract_vicinity_token(page: &str) -> Option<&str> {
    VICINITY_TOKEN
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn airport_url(base_url: &str, airport_code: &str) -> String {
    format!("{base_url}/live/airport/{airport_code}")
}

pub fn vicinity_url(base_url: &str, bbox: &BoundingBox, token: &str) -> String {
    format!(
        "{base_url}/ajax/vicinity_aircraft.rvt?minLon={:.6}&minLat={:.6}&maxLon={:.6}&maxLat={:.6}&token={token}",
        bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
    )
}

#[derive(Clone)]
pub struct FlightAwareClient {
    client: Client,
    base_url: String,
}

impl FlightAwareClient {
    pub fn new_with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }
}

impl AircraftSource for FlightAwareClient {
    #[instrument(skip(self))]
    async fn fetch_token(&self, airport_code: &str) -> Result<String, FlightAwareError> {
        let page = self
            .client
            .get(airport_url(&self.base_url, airport_code))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        extract_vicinity_token(&page)
            .map(str::to_string)
            .ok_or_else(|| FlightAwareError::TokenNotFound(airport_code.to_string()))
    }

    #[instrument(skip(self, token))]
    async fn fetch_aircraft(
        &self,
        bbox: &BoundingBox,
        token: &str,
    ) -> Result<Vec<Aircraft>, FlightAwareError> {
        let resp = self
            .client
            .get(vicinity_url(&self.base_url, bbox, token))
            .send()
            .await?
            .error_for_status()?
            .json::<VicinityResponse>()
            .await?;

        debug!(count = resp.aircraft.len(), "fetched vicinity aircraft");
        Ok(resp.aircraft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_token_in_airport_page() {
        let page = r#"<script>var trackpollGlobals = {"TOKEN":"x","VICINITY_TOKEN":"3f9a0c77e1","LANG":"en"};</script>"#;
        assert_eq!(extract_vicinity_token(page), Some("3f9a0c77e1"));
    }

    #[test]
    fn missing_or_malformed_token() {
        assert_eq!(extract_vicinity_token("<html></html>"), None);
        assert_eq!(extract_vicinity_token(r#""VICINITY_TOKEN":"ABC""#), None);
    }

    #[test]
    fn vicinity_url_uses_six_decimals() {
        let bbox = BoundingBox {
            max_lat: 47.7,
            min_lat: 47.4,
            max_lon: -122.2,
            min_lon: -122.45,
        };
        assert_eq!(
            vicinity_url("https://flightaware.com", &bbox, "abc123"),
            "https://flightaware.com/ajax/vicinity_aircraft.rvt?minLon=-122.450000&minLat=47.400000&maxLon=-122.200000&maxLat=47.700000&token=abc123"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = FlightAwareClient::new_with_client(Client::new(), "http://localhost:8080/");
        assert_eq!(
            airport_url(&client.base_url, "KSEA"),
            "http://localhost:8080/live/airport/KSEA"
        );
    }

    #[test]
    fn position_is_lat_lon_from_lon_lat_pair() {
        let aircraft = Aircraft {
            geometry: Geometry {
                coordinates: vec![-122.3, 47.5],
            },
            ..Aircraft::default()
        };
        assert_eq!(aircraft.position(), Some(Coordinate::new(47.5, -122.3)));

        let bad = Aircraft {
            geometry: Geometry {
                coordinates: vec![-122.3],
            },
            ..Aircraft::default()
        };
        assert_eq!(bad.position(), None);
    }

    #[test]
    fn unknown_flight_type_is_not_eligible() {
        let props: AircraftProperties =
            serde_json::from_str(r#"{"ident":"N123AB","flightType":"ga"}"#).unwrap();
        assert_eq!(props.flight_type, FlightType::Other);
        assert!(!props.flight_type.is_eligible());
        assert!(FlightType::Airline.is_eligible());
        assert!(FlightType::Cargo.is_eligible());
    }

    #[test]
    fn null_flight_type_falls_back_to_other() {
        let props: AircraftProperties =
            serde_json::from_str(r#"{"ident":"N123AB","flightType":null}"#).unwrap();
        assert_eq!(props.flight_type, FlightType::Other);
    }
}
