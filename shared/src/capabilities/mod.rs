//! Collaborator capabilities used by `App::update`.
//!
//! Render comes from Crux; the Place Store, nearby-places lookup and
//! Route Service are capabilities of this crate. Each request resolves to
//! an `Event` through the callback it was issued with.

mod nearby;
mod routing;
mod store;

pub use crux_core::render::Render;

pub use self::nearby::{Nearby, NearbyOperation, NearbyResult};
pub use self::routing::{RouteOperation, RouteResultOutput, Routing};
pub use self::store::{Store, StoreOperation, StoreOutput, StoreResult};

use crate::app::App;
use crate::event::Event;

pub type AppRender = Render<Event>;
pub type AppStore = Store<Event>;
pub type AppNearby = Nearby<Event>;
pub type AppRouting = Routing<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: AppRender,
    pub store: AppStore,
    pub nearby: AppNearby,
    pub routing: AppRouting,
}
