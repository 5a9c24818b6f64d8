//! Collaborators the runtime executes effect requests against.

pub mod foursquare;
pub mod osrm;
pub mod place_store;

pub use self::foursquare::{FoursquareClient, NearbyError, NearbyPlaces};
pub use self::osrm::{OsrmRouteService, RouteError, RouteService};
pub use self::place_store::{MemoryPlaceStore, PlaceStore, StoreError};

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use self::place_store::SqlitePlaceStore;

use crate::{AppError, ErrorKind};

/// Maps a `reqwest` failure onto the shared error taxonomy.
pub(crate) fn http_error_kind(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_decode() {
        ErrorKind::Deserialization
    } else if err.is_builder() {
        ErrorKind::Configuration
    } else {
        ErrorKind::Network
    }
}

pub(crate) fn describe_http_error(err: &reqwest::Error) -> AppError {
    let kind = http_error_kind(err);
    let mut app_err = AppError::new(kind, kind.code()).with_internal(err.to_string());
    if let Some(status) = err.status() {
        app_err = app_err.with_context("status", status.as_u16().to_string());
    }
    app_err
}
