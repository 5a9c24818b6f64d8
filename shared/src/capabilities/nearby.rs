use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};

use crate::model::Venue;
use crate::services::NearbyError;
use crate::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NearbyOperation {
    pub coordinate: Coordinate,
}

pub type NearbyResult = Result<Vec<Venue>, NearbyError>;

impl Operation for NearbyOperation {
    type Output = NearbyResult;
}

/// Nearby-places lookups.
#[derive(Capability)]
pub struct Nearby<Ev> {
    context: CapabilityContext<NearbyOperation, Ev>,
}

impl<Ev> Nearby<Ev> {
    pub fn new(context: CapabilityContext<NearbyOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Nearby<Ev>
where
    Ev: Send + 'static,
{
    pub fn fetch<F>(&self, coordinate: Coordinate, callback: F)
    where
        F: FnOnce(NearbyResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(NearbyOperation { coordinate }).await;
            ctx.update_app(callback(result));
        });
    }
}
