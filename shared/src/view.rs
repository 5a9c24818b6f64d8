use serde::{Deserialize, Serialize};

use crate::model::{Alert, AppMode, MapCamera, Model, Place, PlaceId, Polyline, Screen, TransportType};
use crate::{format_distance, Coordinate, ROUTE_EDGE_PADDING};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PinView {
    pub id: PlaceId,
    pub title: String,
    pub coordinate: Coordinate,
    pub is_route_target: bool,
}

/// Smallest lat/lon rectangle containing a set of points.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            let (lat, lon) = (p.lat(), p.lon());
            Some(match acc {
                None => Self {
                    min_lat: lat,
                    min_lon: lon,
                    max_lat: lat,
                    max_lon: lon,
                },
                Some(b) => Self {
                    min_lat: b.min_lat.min(lat),
                    min_lon: b.min_lon.min(lon),
                    max_lat: b.max_lat.max(lat),
                    max_lon: b.max_lon.max(lon),
                },
            })
        })
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RouteOverlay {
    pub polylines: Vec<Polyline>,
    /// Union of all polylines; the shell fits the map to it.
    pub bounding_box: Option<BoundingBox>,
    pub edge_padding: f64,
    pub distance_text: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlaceRow {
    pub id: PlaceId,
    pub title: String,
    pub distance_text: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VenueRow {
    pub index: usize,
    pub name: String,
    pub distance_text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlaceDetailsView {
    pub id: PlaceId,
    pub title: String,
    pub coordinate: Coordinate,
    pub venues: Vec<VenueRow>,
    pub is_loading_venues: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreenView {
    Map,
    RoutePicker { rows: Vec<PlaceRow> },
    PlacesList { query: String, rows: Vec<PlaceRow> },
    PlaceDetails(Box<PlaceDetailsView>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub mode: AppMode,
    pub route_button_label: String,
    pub pins: Vec<PinView>,
    pub route_overlay: Option<RouteOverlay>,
    pub is_building_route: bool,
    pub transport: TransportType,
    pub camera: Option<MapCamera>,
    pub user_location: Option<Coordinate>,
    pub screen: ScreenView,
    pub alert: Option<Alert>,
}

impl Default for ViewModel {
    fn default() -> Self {
        build(&Model::default())
    }
}

fn pin(place: &Place, is_route_target: bool) -> PinView {
    PinView {
        id: place.id.clone(),
        title: place.title.clone(),
        coordinate: place.coordinate,
        is_route_target,
    }
}

/// Browsing shows every place. Routing shows only the target, once its
/// route has arrived.
fn pins(model: &Model) -> Vec<PinView> {
    match model.mode {
        AppMode::Browsing => model.places.iter().map(|p| pin(p, false)).collect(),
        AppMode::Routing => match (&model.route, model.route_target_place()) {
            (Some(_), Some(target)) => vec![pin(target, true)],
            _ => Vec::new(),
        },
    }
}

fn route_overlay(model: &Model) -> Option<RouteOverlay> {
    if model.mode != AppMode::Routing {
        return None;
    }
    let route = model.route.as_ref()?;
    Some(RouteOverlay {
        polylines: route.polylines.clone(),
        bounding_box: BoundingBox::enclosing(route.polylines.iter().flat_map(|p| p.points.iter())),
        edge_padding: ROUTE_EDGE_PADDING,
        distance_text: route
            .primary()
            .and_then(|p| p.distance_m)
            .map(format_distance),
    })
}

fn place_rows<'a>(model: &Model, places: impl Iterator<Item = &'a Place>) -> Vec<PlaceRow> {
    places
        .map(|place| PlaceRow {
            id: place.id.clone(),
            title: place.title.clone(),
            distance_text: model
                .user_location
                .map(|here| format_distance(here.distance_to(place.coordinate))),
        })
        .collect()
}

/// Case-sensitive substring match on titles; an empty query keeps all.
#[must_use]
pub fn filter_places<'a>(places: &'a [Place], query: &'a str) -> impl Iterator<Item = &'a Place> {
    places
        .iter()
        .filter(move |p| query.is_empty() || p.title.contains(query))
}

fn details(model: &Model, place_id: &PlaceId) -> Option<PlaceDetailsView> {
    let place = model.place(place_id)?;
    let venues = if model.venues_for.as_ref() == Some(place_id) {
        model
            .venues
            .iter()
            .enumerate()
            .map(|(index, venue)| VenueRow {
                index,
                name: venue.name.clone(),
                distance_text: format_distance(place.coordinate.distance_to(venue.coordinate)),
            })
            .collect()
    } else {
        Vec::new()
    };
    Some(PlaceDetailsView {
        id: place.id.clone(),
        title: place.title.clone(),
        coordinate: place.coordinate,
        venues,
        is_loading_venues: model.is_loading_venues && model.venues_for.as_ref() == Some(place_id),
    })
}

fn screen(model: &Model) -> ScreenView {
    match &model.screen {
        Screen::Map => ScreenView::Map,
        Screen::RoutePicker => ScreenView::RoutePicker {
            rows: place_rows(model, model.places.iter()),
        },
        Screen::PlacesList => ScreenView::PlacesList {
            query: model.search_query.clone(),
            rows: place_rows(model, filter_places(&model.places, &model.search_query)),
        },
        Screen::PlaceDetails { place_id } => details(model, place_id)
            .map_or(ScreenView::Map, |d| ScreenView::PlaceDetails(Box::new(d))),
    }
}

#[must_use]
pub fn build(model: &Model) -> ViewModel {
    ViewModel {
        mode: model.mode,
        route_button_label: model.mode.route_button_label().to_string(),
        pins: pins(model),
        route_overlay: route_overlay(model),
        is_building_route: model.is_building_route,
        transport: model.transport,
        camera: model.camera,
        user_location: model.user_location,
        screen: screen(model),
        alert: model.alert.clone(),
    }
}
