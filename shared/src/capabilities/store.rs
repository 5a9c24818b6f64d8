use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};

use crate::model::{Place, PlaceId};
use crate::services::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StoreOperation {
    FetchAll,
    Create(Place),
    Delete(PlaceId),
    Save(Place),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StoreOutput {
    Places(Vec<Place>),
    Done,
}

pub type StoreResult = Result<StoreOutput, StoreError>;

impl Operation for StoreOperation {
    type Output = StoreResult;
}

/// Place Store requests.
#[derive(Capability)]
pub struct Store<Ev> {
    context: CapabilityContext<StoreOperation, Ev>,
}

impl<Ev> Store<Ev> {
    pub fn new(context: CapabilityContext<StoreOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Store<Ev>
where
    Ev: Send + 'static,
{
    pub fn fetch_all<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<Place>, StoreError>) -> Ev + Send + 'static,
    {
        self.request(StoreOperation::FetchAll, move |result| {
            callback(result.and_then(|output| match output {
                StoreOutput::Places(places) => Ok(places),
                StoreOutput::Done => Err(StoreError::UnexpectedOutput),
            }))
        });
    }

    pub fn create<F>(&self, place: Place, callback: F)
    where
        F: FnOnce(Result<(), StoreError>) -> Ev + Send + 'static,
    {
        self.request(StoreOperation::Create(place), move |result| {
            callback(expect_done(result))
        });
    }

    pub fn delete<F>(&self, place_id: PlaceId, callback: F)
    where
        F: FnOnce(Result<(), StoreError>) -> Ev + Send + 'static,
    {
        self.request(StoreOperation::Delete(place_id), move |result| {
            callback(expect_done(result))
        });
    }

    /// Commits in-memory mutations of `place`.
    pub fn save<F>(&self, place: Place, callback: F)
    where
        F: FnOnce(Result<(), StoreError>) -> Ev + Send + 'static,
    {
        self.request(StoreOperation::Save(place), move |result| {
            callback(expect_done(result))
        });
    }

    fn request<F>(&self, operation: StoreOperation, callback: F)
    where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(callback(result));
        });
    }
}

fn expect_done(result: StoreResult) -> Result<(), StoreError> {
    match result? {
        StoreOutput::Done => Ok(()),
        StoreOutput::Places(_) => Err(StoreError::UnexpectedOutput),
    }
}

#[cfg(test)]
mod tests {
    use crux_core::testing::AppTester;

    use super::*;
    use crate::capabilities::Effect;
    use crate::event::Event;
    use crate::model::Model;
    use crate::App;

    #[test]
    fn test_unexpected_output_becomes_error() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();

        let update = app.update(Event::AppStarted, &mut model);
        let mut request = update
            .effects
            .into_iter()
            .find_map(|effect| match effect {
                Effect::Store(request) => Some(request),
                _ => None,
            })
            .expect("expected store effect");
        assert_eq!(request.operation, StoreOperation::FetchAll);

        let resolved = app.resolve(&mut request, Ok(StoreOutput::Done)).unwrap();
        let generation = model.places_generation;
        assert_eq!(
            resolved.events,
            vec![Event::PlacesLoaded {
                generation,
                result: Err(StoreError::UnexpectedOutput),
            }]
        );
    }

    #[test]
    fn test_delete_passes_store_error_through() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        let place = crate::model::Place::new(crate::Coordinate::new(1.0, 2.0).unwrap());
        model.places.push(place.clone());

        let update = app.update(
            Event::DeletePlaceRequested {
                place_id: place.id.clone(),
            },
            &mut model,
        );
        let mut request = update
            .effects
            .into_iter()
            .find_map(|effect| match effect {
                Effect::Store(request) => Some(request),
                _ => None,
            })
            .expect("expected store effect");
        assert_eq!(request.operation, StoreOperation::Delete(place.id.clone()));

        let resolved = app
            .resolve(&mut request, Err(StoreError::Database("locked".into())))
            .unwrap();
        assert_eq!(
            resolved.events,
            vec![Event::PlaceRemoved {
                place_id: place.id,
                result: Err(StoreError::Database("locked".into())),
            }]
        );
    }
}
