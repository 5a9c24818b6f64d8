//! Helpers for tests that drive the app through `crux_core::testing::AppTester`,
//! plus collaborator doubles for the runtime.

use crux_core::capability::Operation;
use crux_core::testing::{AppTester, Update};
use crux_core::Request;

use crate::app::App;
use crate::capabilities::{Effect, NearbyOperation, RouteOperation, StoreOperation};
use crate::event::Event;
use crate::model::{Model, RouteResult, TransportType, Venue};
use crate::services::{NearbyError, NearbyPlaces, RouteError, RouteService};
use crate::{AppError, Coordinate, ErrorKind};

pub type AppUpdate = Update<Effect, Event>;

/// Effect lookups on an [`Update`].
pub trait UpdateExt {
    fn has_render(&self) -> bool;

    fn store_operations(&self) -> Vec<&StoreOperation>;

    /// Removes and returns the first route request, if any.
    fn take_route_request(&mut self) -> Option<Request<RouteOperation>>;

    /// Removes and returns the first nearby-venues request, if any.
    fn take_nearby_request(&mut self) -> Option<Request<NearbyOperation>>;

    /// Removes and returns every store request, in order.
    fn take_store_requests(&mut self) -> Vec<Request<StoreOperation>>;
}

impl UpdateExt for AppUpdate {
    fn has_render(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, Effect::Render(_)))
    }

    fn store_operations(&self) -> Vec<&StoreOperation> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Store(request) => Some(&request.operation),
                _ => None,
            })
            .collect()
    }

    fn take_route_request(&mut self) -> Option<Request<RouteOperation>> {
        let index = self
            .effects
            .iter()
            .position(|e| matches!(e, Effect::Routing(_)))?;
        match self.effects.remove(index) {
            Effect::Routing(request) => Some(request),
            _ => None,
        }
    }

    fn take_nearby_request(&mut self) -> Option<Request<NearbyOperation>> {
        let index = self
            .effects
            .iter()
            .position(|e| matches!(e, Effect::Nearby(_)))?;
        match self.effects.remove(index) {
            Effect::Nearby(request) => Some(request),
            _ => None,
        }
    }

    fn take_store_requests(&mut self) -> Vec<Request<StoreOperation>> {
        let mut taken = Vec::new();
        let mut rest = Vec::with_capacity(self.effects.len());
        for effect in self.effects.drain(..) {
            match effect {
                Effect::Store(request) => taken.push(request),
                other => rest.push(other),
            }
        }
        self.effects = rest;
        taken
    }
}

/// Resolution that also feeds the completion events back into `update`.
pub trait AppTesterExt {
    /// Resolves `request` with `output`, then applies the events it
    /// produced to `model`. The returned update carries the effects of
    /// those events.
    fn settle<Op: Operation>(
        &self,
        request: &mut Request<Op>,
        output: Op::Output,
        model: &mut Model,
    ) -> Result<AppUpdate, AppError>;
}

impl AppTesterExt for AppTester<App, Effect> {
    fn settle<Op: Operation>(
        &self,
        request: &mut Request<Op>,
        output: Op::Output,
        model: &mut Model,
    ) -> Result<AppUpdate, AppError> {
        let resolved = self
            .resolve(request, output)
            .map_err(|e| AppError::new(ErrorKind::InvalidState, e.to_string()))?;

        let mut events = resolved.events.into_iter();
        let first = events.next().ok_or_else(|| {
            AppError::new(ErrorKind::InvalidState, "request resolved without an event")
        })?;
        let mut update = self.update(first, model);
        for event in events {
            let next = self.update(event, model);
            update.effects.extend(next.effects);
            update.events.extend(next.events);
        }
        Ok(update)
    }
}

/// Nearby-places collaborator that never finds anything.
pub struct NoNearby;

#[async_trait::async_trait]
impl NearbyPlaces for NoNearby {
    async fn fetch_nearby(&self, _coordinate: Coordinate) -> Result<Vec<Venue>, NearbyError> {
        Ok(Vec::new())
    }
}

/// Route collaborator that always reports no route.
pub struct NoRoutes;

#[async_trait::async_trait]
impl RouteService for NoRoutes {
    async fn build_route(
        &self,
        _from: Coordinate,
        _to: Coordinate,
        _transport: TransportType,
    ) -> Result<RouteResult, RouteError> {
        Err(RouteError::NoRoute(
            crate::services::osrm::NO_ROUTE_MESSAGE.to_string(),
        ))
    }
}
