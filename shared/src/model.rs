use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{
    Coordinate, UnixTimeMs, CLEAR_ROUTE_BUTTON_LABEL, DEFAULT_PLACE_TITLE,
    MAX_PLACE_TITLE_LENGTH, ROUTE_BUTTON_LABEL,
};

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(PlaceId);

impl PlaceId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    #[error("title cannot be empty")]
    Empty,
    #[error("title too long ({len} > {max})")]
    TooLong { len: usize, max: usize },
}

/// A user-created pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub title: String,
    pub coordinate: Coordinate,
    pub created_at: UnixTimeMs,
}

impl Place {
    #[must_use]
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            id: PlaceId::generate(),
            title: DEFAULT_PLACE_TITLE.to_string(),
            coordinate,
            created_at: UnixTimeMs::now(),
        }
    }

    /// Trims and stores `title`, leaving the place untouched on error.
    pub fn rename(&mut self, title: &str) -> Result<(), TitleError> {
        self.title = Self::validate_title(title)?;
        Ok(())
    }

    pub fn validate_title(title: &str) -> Result<String, TitleError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(TitleError::Empty);
        }
        let len = trimmed.chars().count();
        if len > MAX_PLACE_TITLE_LENGTH {
            return Err(TitleError::TooLong {
                len,
                max: MAX_PLACE_TITLE_LENGTH,
            });
        }
        Ok(trimmed.to_string())
    }
}

/// A point of interest returned by the nearby-places API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    #[default]
    Walking,
    Driving,
}

impl TransportType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Driving => "driving",
        }
    }

    /// The other transport type, for a two-state picker.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Walking => Self::Driving,
            Self::Driving => Self::Walking,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<Coordinate>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
}

impl Polyline {
    #[must_use]
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self {
            points,
            distance_m: None,
            duration_s: None,
        }
    }
}

/// Polylines produced by one Route Service call, primary route first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RouteResult {
    pub polylines: Vec<Polyline>,
}

impl RouteResult {
    #[must_use]
    pub fn primary(&self) -> Option<&Polyline> {
        self.polylines.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    #[default]
    Browsing,
    Routing,
}

impl AppMode {
    #[must_use]
    pub const fn route_button_label(self) -> &'static str {
        match self {
            Self::Browsing => ROUTE_BUTTON_LABEL,
            Self::Routing => CLEAR_ROUTE_BUTTON_LABEL,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::Routing => "routing",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequencing token stamped on asynchronous requests. A completion whose
/// token differs from the model's current one is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct RequestGeneration(pub u64);

impl RequestGeneration {
    /// Advances to the next token and returns it.
    pub fn bump(&mut self) -> Self {
        self.0 = self.0.wrapping_add(1);
        *self
    }

    #[must_use]
    pub fn is_current(self, other: Self) -> bool {
        self == other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Map,
    RoutePicker,
    PlacesList,
    PlaceDetails {
        place_id: PlaceId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCamera {
    pub center: Coordinate,
    pub span_deg: f64,
    /// Incremented on every camera command so the shell re-applies a
    /// repeated target.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub mode: AppMode,
    pub places: Vec<Place>,
    /// Bumped by every place fetch and every local create, delete or rename.
    pub places_generation: RequestGeneration,
    /// Generation the most recent fetch was issued under.
    pub places_requested: RequestGeneration,
    pub route_target: Option<PlaceId>,
    pub route: Option<RouteResult>,
    pub is_building_route: bool,
    pub route_generation: RequestGeneration,
    pub transport: TransportType,

    pub user_location: Option<Coordinate>,
    pub camera: Option<MapCamera>,
    pub screen: Screen,
    pub search_query: String,

    pub venues: Vec<Venue>,
    pub venues_for: Option<PlaceId>,
    pub is_loading_venues: bool,
    pub nearby_generation: RequestGeneration,

    pub alert: Option<Alert>,
}

impl Model {
    #[must_use]
    pub fn place(&self, id: &PlaceId) -> Option<&Place> {
        self.places.iter().find(|p| &p.id == id)
    }

    pub fn place_mut(&mut self, id: &PlaceId) -> Option<&mut Place> {
        self.places.iter_mut().find(|p| &p.id == id)
    }

    pub fn remove_place(&mut self, id: &PlaceId) -> Option<Place> {
        let index = self.places.iter().position(|p| &p.id == id)?;
        Some(self.places.remove(index))
    }

    #[must_use]
    pub fn route_target_place(&self) -> Option<&Place> {
        self.route_target.as_ref().and_then(|id| self.place(id))
    }

    #[must_use]
    pub fn is_route_target(&self, id: &PlaceId) -> bool {
        self.mode == AppMode::Routing && self.route_target.as_ref() == Some(id)
    }

    pub fn move_camera(&mut self, center: Coordinate, span_deg: f64) {
        let revision = self.camera.map_or(1, |c| c.revision.wrapping_add(1));
        self.camera = Some(MapCamera {
            center,
            span_deg,
            revision,
        });
    }

    /// Invalidates place fetches already in flight.
    pub fn mark_places_changed(&mut self) {
        self.places_generation.bump();
    }

    /// Whether a fetch has been issued since the last local change.
    #[must_use]
    pub fn places_fetch_pending(&self) -> bool {
        self.places_requested.is_current(self.places_generation)
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.alert = Some(Alert {
            title: crate::ERROR_ALERT_TITLE.to_string(),
            message: message.into(),
        });
    }

    pub fn clear_venues(&mut self) {
        self.venues.clear();
        self.venues_for = None;
        self.is_loading_venues = false;
    }
}
