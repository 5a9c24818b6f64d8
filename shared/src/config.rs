use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config document: {0}")]
    Parse(String),

    #[error("invalid url for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("invalid log filter: {0}")]
    LogFilter(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FoursquareConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Foursquare `v` parameter (YYYYMMDD).
    pub api_version: String,
    pub radius_m: u32,
    pub limit: u32,
    pub timeout_ms: u64,
}

impl Default for FoursquareConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.foursquare.com/v2/".to_string(),
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            api_version: "20161016".to_string(),
            radius_m: 500,
            limit: 30,
            timeout_ms: u64::try_from(crate::NEARBY_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub walking_profile: String,
    pub driving_profile: String,
    pub alternatives: bool,
    pub timeout_ms: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org/".to_string(),
            walking_profile: "foot".to_string(),
            driving_profile: "driving".to_string(),
            alternatives: true,
            timeout_ms: u64::try_from(crate::ROUTE_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file for places; `None` keeps them in memory.
    pub database_path: Option<PathBuf>,
    pub log_filter: String,
    pub foursquare: FoursquareConfig,
    pub routing: OsrmConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: "info".to_string(),
            foursquare: FoursquareConfig::default(),
            routing: OsrmConfig::default(),
        }
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}

fn check_non_zero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { field });
    }
    Ok(())
}

fn check_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty { field });
    }
    Ok(())
}

impl CoreConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fsq = &self.foursquare;
        check_url("foursquare.base_url", &fsq.base_url)?;
        check_non_empty("foursquare.api_version", &fsq.api_version)?;
        check_non_zero("foursquare.radius_m", u64::from(fsq.radius_m))?;
        check_non_zero("foursquare.limit", u64::from(fsq.limit))?;
        check_non_zero("foursquare.timeout_ms", fsq.timeout_ms)?;

        let osrm = &self.routing;
        check_url("routing.base_url", &osrm.base_url)?;
        check_non_empty("routing.walking_profile", &osrm.walking_profile)?;
        check_non_empty("routing.driving_profile", &osrm.driving_profile)?;
        check_non_zero("routing.timeout_ms", osrm.timeout_ms)?;

        check_non_empty("log_filter", &self.log_filter)?;
        crate::telemetry::parse_filter(&self.log_filter)
            .map_err(|e| ConfigError::LogFilter(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = CoreConfig::from_json(
            br#"{"foursquare": {"client_id": "abc", "client_secret": "shh"}, "database_path": "/tmp/p.db"}"#,
        )
        .unwrap();
        assert_eq!(config.foursquare.client_id, "abc");
        assert_eq!(config.foursquare.client_secret.expose_secret(), "shh");
        assert_eq!(config.foursquare.limit, 30);
        assert_eq!(config.routing, OsrmConfig::default());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/p.db")));
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = CoreConfig::from_json(br#"{"foursquare": {"client_secret": "hunter2"}}"#)
            .unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_rejects_bad_urls() {
        let err = CoreConfig::from_json(br#"{"routing": {"base_url": "ftp://osrm.local"}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                field: "routing.base_url",
                ..
            }
        ));

        let err = CoreConfig::from_json(br#"{"foursquare": {"base_url": "nope"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_rejects_zero_limits_and_empty_profiles() {
        let err = CoreConfig::from_json(br#"{"foursquare": {"limit": 0}}"#).unwrap_err();
        assert_eq!(err, ConfigError::Zero { field: "foursquare.limit" });

        let err =
            CoreConfig::from_json(br#"{"routing": {"driving_profile": " "}}"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Empty {
                field: "routing.driving_profile"
            }
        );
    }

    #[test]
    fn test_rejects_unparsable_log_filter() {
        let err = CoreConfig::from_json(br#"{"log_filter": "shared=loud"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::LogFilter(_)));

        let config = CoreConfig::from_json(br#"{"log_filter": "warn,shared=debug"}"#).unwrap();
        assert_eq!(config.log_filter, "warn,shared=debug");
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            CoreConfig::from_json(b"{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_error_maps_to_configuration_kind() {
        let err: AppError = ConfigError::Zero { field: "x" }.into();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
