//! Mode controller: the single `update` every event flows through.

use tracing::{debug, info, warn};

use crate::capabilities::Capabilities;
use crate::event::Event;
use crate::model::{AppMode, Model, Place, PlaceId, Screen};
use crate::view::{self, ViewModel};
use crate::{AppError, Coordinate, DEFAULT_MAP_SPAN_DEG, USER_LOCATION_SPAN_DEG};

#[derive(Default)]
pub struct App;

impl App {
    fn validate_coordinates(lat: f64, lng: f64) -> Result<Coordinate, AppError> {
        Coordinate::new(lat, lng).map_err(|e| {
            AppError::from(e)
                .with_context("lat", lat.to_string())
                .with_context("lng", lng.to_string())
        })
    }

    fn set_mode(model: &mut Model, mode: AppMode) {
        if model.mode != mode {
            info!(from = %model.mode, to = %mode, "mode transition");
            model.mode = mode;
        }
    }

    /// Fetches every stored place. Results of earlier fetches, and of
    /// fetches overtaken by a local change, are dropped on arrival.
    fn refresh_places(model: &mut Model, caps: &Capabilities) {
        let generation = model.places_generation.bump();
        model.places_requested = generation;
        caps.store
            .fetch_all(move |result| Event::PlacesLoaded { generation, result });
    }

    /// Browsing → Routing (or a restart while Routing).
    fn start_route(model: &mut Model, caps: &Capabilities, place_id: PlaceId) {
        let Some(target) = model.place(&place_id).map(|p| p.coordinate) else {
            warn!(%place_id, "build route requested for unknown place");
            return;
        };
        let Some(origin) = model.user_location else {
            warn!(%place_id, "build route requested before user location is known");
            return;
        };

        let generation = model.route_generation.bump();
        Self::set_mode(model, AppMode::Routing);
        model.route_target = Some(place_id);
        model.route = None;
        model.is_building_route = true;
        model.screen = Screen::Map;
        model.clear_venues();

        debug!(generation = generation.0, transport = %model.transport, "requesting route");
        caps.routing
            .build_route(origin, target, model.transport, move |result| Event::RouteBuilt {
                generation,
                result: Box::new(result),
            });
        caps.render.render();
    }

    /// Routing → Browsing. Does nothing at all when already Browsing.
    fn clear_route(model: &mut Model, caps: &Capabilities) {
        if model.mode == AppMode::Browsing {
            return;
        }

        Self::set_mode(model, AppMode::Browsing);
        model.route = None;
        model.route_target = None;
        model.is_building_route = false;
        model.route_generation.bump();

        Self::refresh_places(model, caps);
        caps.render.render();
    }

    fn persist_place(place: &Place, caps: &Capabilities) {
        let place_id = place.id.clone();
        caps.store
            .save(place.clone(), move |result| Event::PlaceStored { place_id, result });
    }

    fn report_store_failure(model: &mut Model, caps: &Capabilities, err: crate::services::StoreError) {
        warn!(error = %err, "place store failure");
        model.show_error(AppError::from(err).user_facing_message());
        caps.render.render();
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();
        if event.is_user_initiated() {
            debug!(event = event_name, mode = %model.mode, "user action");
        } else {
            debug!(event = event_name, mode = %model.mode, "event");
        }

        match event {
            Event::Noop => {}

            Event::AppStarted => {
                Self::refresh_places(model, caps);
                caps.render.render();
            }

            Event::MapAppeared => {
                if model.mode == AppMode::Browsing {
                    Self::refresh_places(model, caps);
                }
            }

            Event::UserLocationUpdated { lat, lng } => {
                let location = match Self::validate_coordinates(lat, lng) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "ignoring invalid user location");
                        return;
                    }
                };
                model.user_location = Some(location);
                model.move_camera(location, USER_LOCATION_SPAN_DEG);
                caps.render.render();
            }

            Event::MapLongPressed { lat, lng } => {
                let coordinate = match Self::validate_coordinates(lat, lng) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "ignoring long press at invalid coordinate");
                        return;
                    }
                };
                let place = Place::new(coordinate);
                let place_id = place.id.clone();
                info!(%place_id, "place dropped");

                model.places.push(place.clone());
                model.mark_places_changed();
                caps.store
                    .create(place, move |result| Event::PlaceStored { place_id, result });
                caps.render.render();
            }

            Event::PinCalloutTapped { place_id } => {
                if model.place(&place_id).is_none() {
                    warn!(%place_id, "callout tapped for unknown place");
                    return;
                }
                model.clear_venues();
                model.screen = Screen::PlaceDetails { place_id };
                caps.render.render();
            }

            Event::RouteButtonTapped => match model.mode {
                AppMode::Browsing => {
                    model.screen = Screen::RoutePicker;
                    caps.render.render();
                }
                AppMode::Routing => Self::clear_route(model, caps),
            },

            Event::BuildRouteRequested { place_id } => {
                Self::start_route(model, caps, place_id);
            }

            Event::ClearRouteRequested => Self::clear_route(model, caps),

            Event::CenterOnMapRequested { place_id } => {
                Self::clear_route(model, caps);
                let Some(center) = model.place(&place_id).map(|p| p.coordinate) else {
                    warn!(%place_id, "center requested for unknown place");
                    return;
                };

                let span = model.camera.map_or(DEFAULT_MAP_SPAN_DEG, |c| c.span_deg);
                model.move_camera(center, span);
                model.screen = Screen::Map;
                model.clear_venues();
                caps.render.render();
            }

            Event::DeletePlaceRequested { place_id } => {
                if model.remove_place(&place_id).is_none() {
                    warn!(%place_id, "delete requested for unknown place");
                    return;
                }
                info!(%place_id, "place deleted");
                model.mark_places_changed();

                let was_target = model.is_route_target(&place_id);
                let id_for_event = place_id.clone();
                caps.store.delete(place_id.clone(), move |result| Event::PlaceRemoved {
                    place_id: id_for_event,
                    result,
                });

                if was_target {
                    Self::clear_route(model, caps);
                }
                if model.screen == (Screen::PlaceDetails { place_id }) {
                    model.screen = Screen::Map;
                    model.clear_venues();
                }
                caps.render.render();
            }

            Event::TransportChanged { transport } => {
                if model.transport == transport {
                    return;
                }
                model.transport = transport;
                match (model.mode, model.route_target.clone()) {
                    (AppMode::Routing, Some(target)) => Self::start_route(model, caps, target),
                    _ => caps.render.render(),
                }
            }

            Event::PlacesListRequested => {
                model.screen = Screen::PlacesList;
                model.search_query.clear();
                Self::refresh_places(model, caps);
                caps.render.render();
            }

            Event::SearchQueryChanged { query } => {
                if query.is_empty() {
                    Self::refresh_places(model, caps);
                }
                model.search_query = query;
                caps.render.render();
            }

            Event::NearbyVenuesRequested { place_id } => {
                let Some(coordinate) = model.place(&place_id).map(|p| p.coordinate) else {
                    warn!(%place_id, "nearby venues requested for unknown place");
                    return;
                };
                let generation = model.nearby_generation.bump();
                model.venues.clear();
                model.venues_for = Some(place_id.clone());
                model.is_loading_venues = true;

                caps.nearby.fetch(coordinate, move |result| Event::NearbyVenuesFetched {
                    place_id,
                    generation,
                    result,
                });
                caps.render.render();
            }

            Event::VenueSelected {
                place_id,
                venue_index,
            } => {
                if model.venues_for.as_ref() != Some(&place_id) {
                    warn!(%place_id, "venue selected for a place whose venues are not loaded");
                    return;
                }
                let Some(name) = model.venues.get(venue_index).map(|v| v.name.clone()) else {
                    warn!(%place_id, venue_index, "venue index out of range");
                    return;
                };
                let Some(place) = model.place_mut(&place_id) else {
                    warn!(%place_id, "venue selected for unknown place");
                    return;
                };
                if let Err(e) = place.rename(&name) {
                    warn!(%place_id, error = %e, "venue name is not a usable title");
                    return;
                }
                let place = place.clone();
                model.mark_places_changed();
                Self::persist_place(&place, caps);
                caps.render.render();
            }

            Event::PlaceRenamed { place_id, title } => {
                let Some(place) = model.place_mut(&place_id) else {
                    warn!(%place_id, "rename requested for unknown place");
                    return;
                };
                if let Err(e) = place.rename(&title) {
                    warn!(%place_id, error = %e, "ignoring invalid title");
                    return;
                }
                let place = place.clone();
                model.mark_places_changed();
                Self::persist_place(&place, caps);
                caps.render.render();
            }

            Event::ScreenDismissed => {
                match std::mem::take(&mut model.screen) {
                    Screen::Map => return,
                    Screen::PlaceDetails { .. } => model.clear_venues(),
                    Screen::PlacesList => model.search_query.clear(),
                    Screen::RoutePicker => {}
                }
                caps.render.render();
            }

            Event::DismissAlert => {
                if model.alert.take().is_some() {
                    caps.render.render();
                }
            }

            Event::PlacesLoaded { generation, result } => {
                if !model.places_generation.is_current(generation) {
                    debug!(
                        generation = generation.0,
                        current = model.places_generation.0,
                        "dropping stale place list"
                    );
                    // No fetch has been issued since the local change.
                    if !model.places_fetch_pending() {
                        Self::refresh_places(model, caps);
                    }
                    return;
                }
                match result {
                    Ok(places) => {
                        debug!(count = places.len(), "places loaded");
                        model.places = places;
                        caps.render.render();
                    }
                    Err(e) => Self::report_store_failure(model, caps, e),
                }
            }

            Event::PlaceStored { place_id, result } => match result {
                Ok(()) => debug!(%place_id, "place stored"),
                Err(e) if model.place(&place_id).is_some() => {
                    Self::report_store_failure(model, caps, e);
                }
                Err(e) => debug!(%place_id, error = %e, "store failure for a place no longer shown"),
            },

            Event::PlaceRemoved { place_id, result } => match result {
                Ok(()) => debug!(%place_id, "place removed"),
                Err(e) => Self::report_store_failure(model, caps, e),
            },

            Event::NearbyVenuesFetched {
                place_id,
                generation,
                result,
            } => {
                if !model.nearby_generation.is_current(generation)
                    || model.venues_for.as_ref() != Some(&place_id)
                {
                    debug!(%place_id, generation = generation.0, "dropping stale venues");
                    return;
                }
                model.is_loading_venues = false;
                model.venues = result.unwrap_or_else(|e| {
                    warn!(%place_id, error = %e, "nearby venues unavailable");
                    Vec::new()
                });
                caps.render.render();
            }

            Event::RouteBuilt { generation, result } => {
                if model.mode != AppMode::Routing || !model.route_generation.is_current(generation)
                {
                    debug!(
                        generation = generation.0,
                        current = model.route_generation.0,
                        "dropping stale route result"
                    );
                    return;
                }
                model.is_building_route = false;
                match *result {
                    Ok(route) => {
                        info!(polylines = route.polylines.len(), "route ready");
                        model.route = Some(route);
                    }
                    Err(e) => {
                        warn!(error = %e, "route build failed");
                        model.show_error(e.to_string());
                    }
                }
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::build(model)
    }
}
