use serde::{Deserialize, Serialize};

use crate::model::{Place, PlaceId, RequestGeneration, RouteResult, TransportType, Venue};
use crate::services::{NearbyError, RouteError, StoreError};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Noop,
    AppStarted,
    MapAppeared,

    // Map
    UserLocationUpdated {
        lat: f64,
        lng: f64,
    },
    MapLongPressed {
        lat: f64,
        lng: f64,
    },
    PinCalloutTapped {
        place_id: PlaceId,
    },
    RouteButtonTapped,

    // Mode controller
    BuildRouteRequested {
        place_id: PlaceId,
    },
    ClearRouteRequested,
    CenterOnMapRequested {
        place_id: PlaceId,
    },
    DeletePlaceRequested {
        place_id: PlaceId,
    },
    TransportChanged {
        transport: TransportType,
    },

    // Places list
    PlacesListRequested,
    SearchQueryChanged {
        query: String,
    },

    // Place details
    NearbyVenuesRequested {
        place_id: PlaceId,
    },
    VenueSelected {
        place_id: PlaceId,
        venue_index: usize,
    },
    PlaceRenamed {
        place_id: PlaceId,
        title: String,
    },

    ScreenDismissed,
    DismissAlert,

    // Collaborator completions
    PlacesLoaded {
        generation: RequestGeneration,
        result: Result<Vec<Place>, StoreError>,
    },
    PlaceStored {
        place_id: PlaceId,
        result: Result<(), StoreError>,
    },
    PlaceRemoved {
        place_id: PlaceId,
        result: Result<(), StoreError>,
    },
    NearbyVenuesFetched {
        place_id: PlaceId,
        generation: RequestGeneration,
        result: Result<Vec<Venue>, NearbyError>,
    },
    RouteBuilt {
        generation: RequestGeneration,
        result: Box<Result<RouteResult, RouteError>>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted => "app_started",
            Self::MapAppeared => "map_appeared",
            Self::UserLocationUpdated { .. } => "user_location_updated",
            Self::MapLongPressed { .. } => "map_long_pressed",
            Self::PinCalloutTapped { .. } => "pin_callout_tapped",
            Self::RouteButtonTapped => "route_button_tapped",
            Self::BuildRouteRequested { .. } => "build_route_requested",
            Self::ClearRouteRequested => "clear_route_requested",
            Self::CenterOnMapRequested { .. } => "center_on_map_requested",
            Self::DeletePlaceRequested { .. } => "delete_place_requested",
            Self::TransportChanged { .. } => "transport_changed",
            Self::PlacesListRequested => "places_list_requested",
            Self::SearchQueryChanged { .. } => "search_query_changed",
            Self::NearbyVenuesRequested { .. } => "nearby_venues_requested",
            Self::VenueSelected { .. } => "venue_selected",
            Self::PlaceRenamed { .. } => "place_renamed",
            Self::ScreenDismissed => "screen_dismissed",
            Self::DismissAlert => "dismiss_alert",
            Self::PlacesLoaded { .. } => "places_loaded",
            Self::PlaceStored { .. } => "place_stored",
            Self::PlaceRemoved { .. } => "place_removed",
            Self::NearbyVenuesFetched { .. } => "nearby_venues_fetched",
            Self::RouteBuilt { .. } => "route_built",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::MapLongPressed { .. }
                | Self::PinCalloutTapped { .. }
                | Self::RouteButtonTapped
                | Self::BuildRouteRequested { .. }
                | Self::ClearRouteRequested
                | Self::CenterOnMapRequested { .. }
                | Self::DeletePlaceRequested { .. }
                | Self::TransportChanged { .. }
                | Self::PlacesListRequested
                | Self::SearchQueryChanged { .. }
                | Self::NearbyVenuesRequested { .. }
                | Self::VenueSelected { .. }
                | Self::PlaceRenamed { .. }
                | Self::ScreenDismissed
                | Self::DismissAlert
        )
    }

    /// Events produced by collaborator completions rather than the shell.
    #[must_use]
    pub const fn is_completion(&self) -> bool {
        matches!(
            self,
            Self::PlacesLoaded { .. }
                | Self::PlaceStored { .. }
                | Self::PlaceRemoved { .. }
                | Self::NearbyVenuesFetched { .. }
                | Self::RouteBuilt { .. }
        )
    }
}
