use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};

use crate::model::{RouteResult, TransportType};
use crate::services::RouteError;
use crate::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RouteOperation {
    pub from: Coordinate,
    pub to: Coordinate,
    pub transport: TransportType,
}

pub type RouteResultOutput = Result<RouteResult, RouteError>;

impl Operation for RouteOperation {
    type Output = RouteResultOutput;
}

/// Route Service requests.
#[derive(Capability)]
pub struct Routing<Ev> {
    context: CapabilityContext<RouteOperation, Ev>,
}

impl<Ev> Routing<Ev> {
    pub fn new(context: CapabilityContext<RouteOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Routing<Ev>
where
    Ev: Send + 'static,
{
    pub fn build_route<F>(
        &self,
        from: Coordinate,
        to: Coordinate,
        transport: TransportType,
        callback: F,
    ) where
        F: FnOnce(RouteResultOutput) -> Ev + Send + 'static,
    {
        let operation = RouteOperation {
            from,
            to,
            transport,
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(callback(result));
        });
    }
}
