use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{describe_http_error, http_error_kind};
use crate::config::FoursquareConfig;
use crate::model::Venue;
use crate::{AppError, Coordinate, ErrorKind};

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum NearbyError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("places API returned HTTP {0}")]
    Status(u16),

    #[error("places API error {code}: {detail}")]
    Api { code: u16, detail: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for NearbyError {
    fn from(e: reqwest::Error) -> Self {
        match http_error_kind(&e) {
            ErrorKind::Timeout => NearbyError::Timeout,
            ErrorKind::Deserialization => NearbyError::InvalidResponse(e.to_string()),
            ErrorKind::Configuration => NearbyError::Configuration(e.to_string()),
            _ => NearbyError::Network(e.to_string()),
        }
    }
}

impl From<NearbyError> for AppError {
    fn from(e: NearbyError) -> Self {
        let kind = match e {
            NearbyError::Network(_) | NearbyError::Status(_) | NearbyError::Api { .. } => {
                ErrorKind::Network
            }
            NearbyError::Timeout => ErrorKind::Timeout,
            NearbyError::InvalidResponse(_) => ErrorKind::Deserialization,
            NearbyError::Configuration(_) => ErrorKind::Configuration,
        };
        AppError::new(kind, "Nearby places lookup failed").with_internal(e.to_string())
    }
}

#[async_trait::async_trait]
pub trait NearbyPlaces: Send + Sync {
    async fn fetch_nearby(&self, coordinate: Coordinate) -> Result<Vec<Venue>, NearbyError>;
}

// --- Foursquare venues/search wire shape ---

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    meta: Meta,
    #[serde(default)]
    response: Option<SearchResponse>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    code: u16,
    #[serde(rename = "errorDetail", default)]
    error_detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    venues: Vec<RawVenue>,
}

#[derive(Debug, Deserialize)]
struct RawVenue {
    name: String,
    location: RawLocation,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lng: f64,
}

/// Extracts venues from a venues/search body. Venues with unusable
/// coordinates are skipped.
pub fn parse_venues(body: &str) -> Result<Vec<Venue>, NearbyError> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|e| NearbyError::InvalidResponse(e.to_string()))?;

    if envelope.meta.code != 200 {
        return Err(NearbyError::Api {
            code: envelope.meta.code,
            detail: envelope.meta.error_detail.unwrap_or_default(),
        });
    }

    let raw = envelope.response.map(|r| r.venues).unwrap_or_default();
    let mut venues = Vec::with_capacity(raw.len());
    for venue in raw {
        match Coordinate::new(venue.location.lat, venue.location.lng) {
            Ok(coordinate) => venues.push(Venue {
                name: venue.name,
                coordinate,
            }),
            Err(e) => debug!(name = %venue.name, error = %e, "skipping venue"),
        }
    }
    Ok(venues)
}

pub struct FoursquareClient {
    client: reqwest::Client,
    endpoint: Url,
    config: FoursquareConfig,
}

impl FoursquareClient {
    pub fn new(config: FoursquareConfig) -> Result<Self, NearbyError> {
        let mut endpoint = Url::parse(&config.base_url)
            .map_err(|e| NearbyError::Configuration(format!("{}: {e}", config.base_url)))?;
        endpoint
            .path_segments_mut()
            .map_err(|()| NearbyError::Configuration(config.base_url.clone()))?
            .pop_if_empty()
            .push("venues")
            .push("search");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Full request URL for a search around `coordinate`, credentials included.
    #[must_use]
    pub fn search_url(&self, coordinate: Coordinate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("ll", &format!("{},{}", coordinate.lat(), coordinate.lon()))
            .append_pair("client_id", &self.config.client_id)
            .append_pair("client_secret", self.config.client_secret.expose_secret())
            .append_pair("v", &self.config.api_version)
            .append_pair("intent", "browse")
            .append_pair("radius", &self.config.radius_m.to_string())
            .append_pair("limit", &self.config.limit.to_string());
        url
    }
}

#[async_trait::async_trait]
impl NearbyPlaces for FoursquareClient {
    #[instrument(skip(self), fields(lat = coordinate.lat(), lon = coordinate.lon()))]
    async fn fetch_nearby(&self, coordinate: Coordinate) -> Result<Vec<Venue>, NearbyError> {
        let response = self
            .client
            .get(self.search_url(coordinate))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %describe_http_error(&e), "venue search failed");
                NearbyError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        match parse_venues(&body) {
            Ok(venues) => {
                debug!(count = venues.len(), "venues fetched");
                Ok(venues)
            }
            Err(NearbyError::InvalidResponse(_)) if !status.is_success() => {
                Err(NearbyError::Status(status.as_u16()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> FoursquareConfig {
        FoursquareConfig {
            base_url: "https://api.foursquare.com/v2/".into(),
            client_id: "id".into(),
            client_secret: SecretString::new("secret".into()),
            ..FoursquareConfig::default()
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parses_venues() {
            let body = r#"{
                "meta": {"code": 200},
                "response": {"venues": [
                    {"name": "Cafe", "location": {"lat": 50.45, "lng": 30.52, "address": "x"}},
                    {"name": "Park", "location": {"lat": 50.46, "lng": 30.53}}
                ]}
            }"#;
            let venues = parse_venues(body).unwrap();
            assert_eq!(venues.len(), 2);
            assert_eq!(venues[0].name, "Cafe");
            assert_eq!(venues[1].coordinate.lon(), 30.53);
        }

        #[test]
        fn test_skips_invalid_coordinates() {
            let body = r#"{"meta":{"code":200},"response":{"venues":[
                {"name":"Bad","location":{"lat":95.0,"lng":0.0}},
                {"name":"Good","location":{"lat":1.0,"lng":2.0}}
            ]}}"#;
            let venues = parse_venues(body).unwrap();
            assert_eq!(venues.len(), 1);
            assert_eq!(venues[0].name, "Good");
        }

        #[test]
        fn test_api_error_carries_detail() {
            let body = r#"{"meta":{"code":400,"errorDetail":"Missing access credentials"}}"#;
            assert_eq!(
                parse_venues(body),
                Err(NearbyError::Api {
                    code: 400,
                    detail: "Missing access credentials".into()
                })
            );
        }

        #[test]
        fn test_missing_response_is_empty() {
            assert_eq!(parse_venues(r#"{"meta":{"code":200}}"#), Ok(vec![]));
        }

        #[test]
        fn test_garbage_is_invalid_response() {
            assert!(matches!(
                parse_venues("<html>"),
                Err(NearbyError::InvalidResponse(_))
            ));
        }
    }

    mod client_tests {
        use super::*;

        #[test]
        fn test_search_url_has_query_pairs() {
            let client = FoursquareClient::new(config()).unwrap();
            let url = client.search_url(Coordinate::new(50.5, 30.25).unwrap());
            assert_eq!(url.path(), "/v2/venues/search");

            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            assert!(pairs.contains(&("ll".into(), "50.5,30.25".into())));
            assert!(pairs.contains(&("client_id".into(), "id".into())));
            assert!(pairs.contains(&("client_secret".into(), "secret".into())));
            assert!(pairs.contains(&("intent".into(), "browse".into())));
        }

        #[test]
        fn test_rejects_unparseable_base_url() {
            let mut cfg = config();
            cfg.base_url = "not a url".into();
            assert!(matches!(
                FoursquareClient::new(cfg),
                Err(NearbyError::Configuration(_))
            ));
        }
    }
}
