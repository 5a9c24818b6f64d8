use crux_core::testing::AppTester;
use shared::capabilities::StoreOperation;
use shared::services::RouteError;
use shared::testing::{AppTesterExt, UpdateExt};
use shared::view::ScreenView;
use shared::{
    App, AppMode, Coordinate, Effect, Event, Model, Place, Polyline, RouteResult, Screen, CLEAR_ROUTE_BUTTON_LABEL,
    ROUTE_BUTTON_LABEL,
};

fn coord(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).unwrap()
}

fn place(title: &str, lat: f64, lon: f64) -> Place {
    let mut place = Place::new(coord(lat, lon));
    place.title = title.to_string();
    place
}

fn located_model(places: Vec<Place>) -> Model {
    let tester = AppTester::<App, Effect>::default();
    let mut model = Model {
        places,
        ..Model::default()
    };
    tester.update(Event::UserLocationUpdated { lat: 50.4501, lng: 30.5234 }, &mut model);
    model
}

fn single_route() -> RouteResult {
    RouteResult {
        polylines: vec![Polyline::new(vec![coord(50.4501, 30.5234), coord(50.4547, 30.5238)])],
    }
}

#[test]
fn test_build_then_success_shows_route() {
    let app = AppTester::<App, Effect>::default();
    let target = place("Golden Gate", 50.4547, 30.5238);
    let mut model = located_model(vec![target.clone(), place("Other", 50.44, 30.51)]);

    // 1. Build route
    let mut update = app.update(
        Event::BuildRouteRequested {
            place_id: target.id.clone(),
        },
        &mut model,
    );
    assert_eq!(model.mode, AppMode::Routing);
    let view = app.view(&model);
    assert_eq!(view.route_button_label, CLEAR_ROUTE_BUTTON_LABEL);
    assert!(view.is_building_route);
    assert!(view.pins.is_empty());

    // 2. Route arrives
    let mut request = update.take_route_request().unwrap();
    let update = app.settle(&mut request, Ok(single_route()), &mut model).unwrap();
    assert!(update.has_render());

    let view = app.view(&model);
    let overlay = view.route_overlay.unwrap();
    assert_eq!(overlay.polylines, single_route().polylines);
    assert_eq!(view.mode, AppMode::Routing);
    assert_eq!(view.route_button_label, CLEAR_ROUTE_BUTTON_LABEL);
    assert_eq!(view.pins.len(), 1);
    assert_eq!(view.pins[0].id, target.id);
}

#[test]
fn test_failure_keeps_routing_and_shows_message() {
    let app = AppTester::<App, Effect>::default();
    let target = place("Island", 50.4547, 30.5238);
    let mut model = located_model(vec![target.clone()]);

    let mut update = app.update(Event::BuildRouteRequested { place_id: target.id }, &mut model);
    let mut request = update.take_route_request().unwrap();
    app.settle(
        &mut request,
        Err(RouteError::NoRoute("No route found".into())),
        &mut model,
    )
    .unwrap();

    let view = app.view(&model);
    assert_eq!(view.mode, AppMode::Routing);
    assert!(view.route_overlay.is_none());
    assert!(!view.is_building_route);
    let alert = view.alert.unwrap();
    assert_eq!(alert.title, "Error");
    assert_eq!(alert.message, "No route found");

    // The user has to clear explicitly
    app.update(Event::DismissAlert, &mut model);
    assert_eq!(model.mode, AppMode::Routing);
    app.update(Event::RouteButtonTapped, &mut model);
    assert_eq!(model.mode, AppMode::Browsing);
}

#[test]
fn test_late_result_for_superseded_target_is_ignored() {
    let app = AppTester::<App, Effect>::default();
    let a = place("A", 50.4547, 30.5238);
    let b = place("B", 50.4400, 30.5100);
    let mut model = located_model(vec![a.clone(), b.clone()]);

    let mut request_a = app
        .update(Event::BuildRouteRequested { place_id: a.id }, &mut model)
        .take_route_request()
        .unwrap();
    let mut request_b = app
        .update(Event::BuildRouteRequested { place_id: b.id.clone() }, &mut model)
        .take_route_request()
        .unwrap();

    app.settle(&mut request_b, Ok(single_route()), &mut model).unwrap();
    let before = app.view(&model);

    let other = RouteResult {
        polylines: vec![Polyline::new(vec![coord(1.0, 1.0), coord(2.0, 2.0)])],
    };
    let update = app.settle(&mut request_a, Ok(other), &mut model).unwrap();

    assert!(update.effects.is_empty());
    assert_eq!(app.view(&model), before);
    assert_eq!(model.route_target, Some(b.id));
}

#[test]
fn test_deleting_target_returns_to_browsing() {
    let app = AppTester::<App, Effect>::default();
    let target = place("Target", 50.4547, 30.5238);
    let other = place("Other", 50.44, 30.51);
    let mut model = located_model(vec![target.clone(), other.clone()]);

    let mut request = app
        .update(Event::BuildRouteRequested { place_id: target.id.clone() }, &mut model)
        .take_route_request()
        .unwrap();
    app.settle(&mut request, Ok(single_route()), &mut model).unwrap();

    let update = app.update(
        Event::DeletePlaceRequested {
            place_id: target.id.clone(),
        },
        &mut model,
    );

    assert_eq!(model.mode, AppMode::Browsing);
    let view = app.view(&model);
    assert!(view.route_overlay.is_none());
    assert_eq!(view.route_button_label, ROUTE_BUTTON_LABEL);
    assert_eq!(
        update.store_operations(),
        vec![&StoreOperation::Delete(target.id), &StoreOperation::FetchAll]
    );
}

#[test]
fn test_center_while_routing_recenters_in_browsing() {
    let app = AppTester::<App, Effect>::default();
    let target = place("Target", 50.4547, 30.5238);
    let x = place("X", 50.4000, 30.6000);
    let mut model = located_model(vec![target.clone(), x.clone()]);

    let mut request = app
        .update(Event::BuildRouteRequested { place_id: target.id }, &mut model)
        .take_route_request()
        .unwrap();
    app.settle(&mut request, Ok(single_route()), &mut model).unwrap();

    app.update(Event::PinCalloutTapped { place_id: x.id.clone() }, &mut model);
    app.update(Event::CenterOnMapRequested { place_id: x.id }, &mut model);

    let view = app.view(&model);
    assert_eq!(view.mode, AppMode::Browsing);
    assert!(view.route_overlay.is_none());
    assert_eq!(view.camera.unwrap().center, x.coordinate);
    assert_eq!(view.screen, ScreenView::Map);
    assert_eq!(model.screen, Screen::Map);
}

#[test]
fn test_route_picker_flow() {
    let app = AppTester::<App, Effect>::default();
    let a = place("A", 50.4547, 30.5238);
    let mut model = located_model(vec![a.clone()]);

    // 1. Toggle opens the picker listing every place
    app.update(Event::RouteButtonTapped, &mut model);
    let ScreenView::RoutePicker { rows } = app.view(&model).screen else {
        panic!("expected route picker");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, a.id);
    assert!(rows[0].distance_text.is_some());

    // 2. Selecting a row builds the route and closes the picker
    let mut update = app.update(Event::BuildRouteRequested { place_id: a.id }, &mut model);
    assert!(update.take_route_request().is_some());
    assert_eq!(model.screen, Screen::Map);
}

#[test]
fn test_places_list_search() {
    let app = AppTester::<App, Effect>::default();
    let mut model = located_model(vec![
        place("Cafe Central", 50.45, 30.52),
        place("cafe corner", 50.45, 30.52),
        place("Park", 50.45, 30.52),
    ]);

    app.update(Event::PlacesListRequested, &mut model);
    app.update(
        Event::SearchQueryChanged {
            query: "Cafe".into(),
        },
        &mut model,
    );

    let ScreenView::PlacesList { query, rows } = app.view(&model).screen else {
        panic!("expected places list");
    };
    assert_eq!(query, "Cafe");
    let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Cafe Central"]);
}
