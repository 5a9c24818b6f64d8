use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{describe_http_error, http_error_kind};
use crate::config::OsrmConfig;
use crate::model::{Polyline, RouteResult, TransportType};
use crate::{AppError, Coordinate, ErrorKind};

pub const NO_ROUTE_MESSAGE: &str = "No route found";

/// Route build failure. The display text is what the user is shown.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum RouteError {
    #[error("{0}")]
    NoRoute(String),

    #[error("{0}")]
    Service(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("The route request timed out")]
    Timeout,

    #[error("Invalid route response: {0}")]
    InvalidResponse(String),

    #[error("Invalid routing configuration: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for RouteError {
    fn from(e: reqwest::Error) -> Self {
        match http_error_kind(&e) {
            ErrorKind::Timeout => RouteError::Timeout,
            ErrorKind::Deserialization => RouteError::InvalidResponse(e.to_string()),
            ErrorKind::Configuration => RouteError::Configuration(e.to_string()),
            _ => RouteError::Network(e.to_string()),
        }
    }
}

impl From<RouteError> for AppError {
    fn from(e: RouteError) -> Self {
        let kind = match e {
            RouteError::NoRoute(_) | RouteError::Service(_) => ErrorKind::RouteUnavailable,
            RouteError::Network(_) => ErrorKind::Network,
            RouteError::Timeout => ErrorKind::Timeout,
            RouteError::InvalidResponse(_) => ErrorKind::Deserialization,
            RouteError::Configuration(_) => ErrorKind::Configuration,
        };
        AppError::new(kind, e.to_string())
    }
}

#[async_trait::async_trait]
pub trait RouteService: Send + Sync {
    async fn build_route(
        &self,
        from: Coordinate,
        to: Coordinate,
        transport: TransportType,
    ) -> Result<RouteResult, RouteError>;
}

// --- OSRM route/v1 wire shape ---

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    geometry: geojson::Geometry,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

fn to_polyline(route: RawRoute) -> Result<Polyline, RouteError> {
    let geojson::Value::LineString(positions) = route.geometry.value else {
        return Err(RouteError::InvalidResponse(
            "route geometry is not a LineString".into(),
        ));
    };

    let points = positions
        .iter()
        .map(|position| match position.as_slice() {
            [lon, lat, ..] => Coordinate::new(*lat, *lon)
                .map_err(|e| RouteError::InvalidResponse(e.to_string())),
            _ => Err(RouteError::InvalidResponse(format!(
                "position has {} components",
                position.len()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Polyline {
        points,
        distance_m: route.distance.filter(|d| d.is_finite()),
        duration_s: route.duration.filter(|d| d.is_finite()),
    })
}

/// Converts an OSRM route response body into polylines, primary route first.
pub fn parse_routes(body: &str) -> Result<RouteResult, RouteError> {
    let response: RouteResponse =
        serde_json::from_str(body).map_err(|e| RouteError::InvalidResponse(e.to_string()))?;

    match response.code.as_str() {
        "Ok" => {}
        "NoRoute" | "NoSegment" => {
            return Err(RouteError::NoRoute(
                response
                    .message
                    .unwrap_or_else(|| NO_ROUTE_MESSAGE.to_string()),
            ))
        }
        other => {
            return Err(RouteError::Service(
                response.message.unwrap_or_else(|| other.to_string()),
            ))
        }
    }

    if response.routes.is_empty() {
        return Err(RouteError::NoRoute(NO_ROUTE_MESSAGE.to_string()));
    }

    let polylines = response
        .routes
        .into_iter()
        .map(to_polyline)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RouteResult { polylines })
}

pub struct OsrmRouteService {
    client: reqwest::Client,
    base: Url,
    config: OsrmConfig,
}

impl OsrmRouteService {
    pub fn new(config: OsrmConfig) -> Result<Self, RouteError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| RouteError::Configuration(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(RouteError::Configuration(config.base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base,
            config,
        })
    }

    fn profile(&self, transport: TransportType) -> &str {
        match transport {
            TransportType::Walking => &self.config.walking_profile,
            TransportType::Driving => &self.config.driving_profile,
        }
    }

    #[must_use]
    pub fn route_url(&self, from: Coordinate, to: Coordinate, transport: TransportType) -> Url {
        let waypoints = format!("{},{};{},{}", from.lon(), from.lat(), to.lon(), to.lat());
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("route")
                .push("v1")
                .push(self.profile(transport))
                .push(&waypoints);
        }
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson")
            .append_pair("alternatives", if self.config.alternatives { "true" } else { "false" })
            .append_pair("steps", "false");
        url
    }
}

#[async_trait::async_trait]
impl RouteService for OsrmRouteService {
    #[instrument(skip(self))]
    async fn build_route(
        &self,
        from: Coordinate,
        to: Coordinate,
        transport: TransportType,
    ) -> Result<RouteResult, RouteError> {
        let response = self
            .client
            .get(self.route_url(from, to, transport))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %describe_http_error(&e), "route request failed");
                RouteError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        match parse_routes(&body) {
            Ok(result) => {
                debug!(routes = result.polylines.len(), "route built");
                Ok(result)
            }
            Err(RouteError::InvalidResponse(_)) if !status.is_success() => Err(
                RouteError::Service(format!("Routing service returned HTTP {}", status.as_u16())),
            ),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parses_geojson_routes() {
            let body = r#"{
                "code": "Ok",
                "routes": [
                    {"geometry": {"type": "LineString", "coordinates": [[30.52, 50.45], [30.53, 50.46]]},
                     "distance": 1520.4, "duration": 1100.0},
                    {"geometry": {"type": "LineString", "coordinates": [[30.52, 50.45], [30.54, 50.46]]},
                     "distance": 1800.0, "duration": 1300.0}
                ],
                "waypoints": []
            }"#;
            let result = parse_routes(body).unwrap();
            assert_eq!(result.polylines.len(), 2);

            let primary = result.primary().unwrap();
            assert_eq!(primary.points[0], coord(50.45, 30.52));
            assert_eq!(primary.distance_m, Some(1520.4));
        }

        #[test]
        fn test_no_route_uses_service_message() {
            let body = r#"{"code":"NoRoute","message":"Impossible route between points"}"#;
            let err = parse_routes(body).unwrap_err();
            assert_eq!(err.to_string(), "Impossible route between points");
        }

        #[test]
        fn test_no_route_without_message() {
            let err = parse_routes(r#"{"code":"NoRoute"}"#).unwrap_err();
            assert_eq!(err, RouteError::NoRoute(NO_ROUTE_MESSAGE.into()));
        }

        #[test]
        fn test_empty_routes_is_no_route() {
            let err = parse_routes(r#"{"code":"Ok","routes":[]}"#).unwrap_err();
            assert_eq!(err.to_string(), NO_ROUTE_MESSAGE);
        }

        #[test]
        fn test_other_codes_are_service_errors() {
            let err = parse_routes(r#"{"code":"InvalidQuery","message":"Query string malformed"}"#)
                .unwrap_err();
            assert_eq!(err, RouteError::Service("Query string malformed".into()));
        }

        #[test]
        fn test_rejects_non_linestring_geometry() {
            let body = r#"{"code":"Ok","routes":[{"geometry":{"type":"Point","coordinates":[1.0,2.0]}}]}"#;
            assert!(matches!(
                parse_routes(body),
                Err(RouteError::InvalidResponse(_))
            ));
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_route_url_layout() {
            let service = OsrmRouteService::new(OsrmConfig {
                base_url: "https://router.example.org/".into(),
                ..OsrmConfig::default()
            })
            .unwrap();
            let url = service.route_url(coord(50.0, 30.0), coord(51.5, 31.25), TransportType::Driving);
            assert_eq!(url.path(), "/route/v1/driving/30,50;31.25,51.5");
            assert!(url.query().unwrap().contains("geometries=geojson"));
            assert!(url.query().unwrap().contains("overview=full"));

            let walking = service.route_url(coord(50.0, 30.0), coord(51.5, 31.25), TransportType::Walking);
            assert!(walking.path().starts_with("/route/v1/foot/"));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_route_error_maps_to_route_unavailable() {
            let err: AppError = RouteError::NoRoute(NO_ROUTE_MESSAGE.into()).into();
            assert_eq!(err.kind, ErrorKind::RouteUnavailable);
            assert_eq!(err.user_facing_message(), NO_ROUTE_MESSAGE);
        }
    }
}
