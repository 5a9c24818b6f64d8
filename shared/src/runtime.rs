//! Drives a `crux_core::Core` on one tokio task and executes the effects
//! it requests against the injected collaborators.

use std::sync::Arc;

use crux_core::{Core as CruxCore, Request};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::app::App;
use crate::capabilities::{
    Effect, NearbyOperation, NearbyResult, RouteOperation, RouteResultOutput, StoreOperation,
    StoreResult,
};
use crate::config::CoreConfig;
use crate::event::Event;
use crate::services::place_store::{self, MemoryPlaceStore, PlaceStore};
use crate::services::{FoursquareClient, NearbyPlaces, OsrmRouteService, RouteService};
use crate::view::ViewModel;
use crate::{AppError, ErrorKind};

/// Collaborators the core talks to.
#[derive(Clone)]
pub struct Services {
    pub places: Arc<dyn PlaceStore>,
    pub nearby: Arc<dyn NearbyPlaces>,
    pub routes: Arc<dyn RouteService>,
}

impl Services {
    /// SQLite place store (file or in-memory), Foursquare, OSRM.
    pub fn from_config(config: &CoreConfig) -> Result<Self, AppError> {
        config.validate()?;

        #[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
        let places: Arc<dyn PlaceStore> = {
            use crate::services::SqlitePlaceStore;
            match &config.database_path {
                Some(path) => Arc::new(SqlitePlaceStore::open(path)?),
                None => Arc::new(SqlitePlaceStore::open_in_memory()?),
            }
        };

        #[cfg(not(all(feature = "sqlite", not(target_arch = "wasm32"))))]
        let places: Arc<dyn PlaceStore> = {
            if config.database_path.is_some() {
                warn!("database_path ignored without the sqlite feature");
            }
            Arc::new(MemoryPlaceStore::new())
        };

        Ok(Self {
            places,
            nearby: Arc::new(FoursquareClient::new(config.foursquare.clone())?),
            routes: Arc::new(OsrmRouteService::new(config.routing.clone())?),
        })
    }

    /// In-memory places with the given network collaborators.
    #[must_use]
    pub fn in_memory(nearby: Arc<dyn NearbyPlaces>, routes: Arc<dyn RouteService>) -> Self {
        Self {
            places: Arc::new(MemoryPlaceStore::new()),
            nearby,
            routes,
        }
    }
}

/// Shell-side handle: sends events, observes the view model.
#[derive(Clone)]
pub struct CoreHandle {
    messages: mpsc::UnboundedSender<Message>,
    view: watch::Receiver<ViewModel>,
}

impl CoreHandle {
    pub fn dispatch(&self, event: Event) -> Result<(), AppError> {
        let name = event.name();
        self.messages.send(Message::Event(event)).map_err(|_| {
            AppError::new(ErrorKind::InvalidState, "core is not running").with_context("event", name)
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view.clone()
    }

    /// Latest published view model.
    #[must_use]
    pub fn view(&self) -> ViewModel {
        self.view.borrow().clone()
    }
}

/// A collaborator's answer to an effect, paired with the request it resolves.
enum Resolution {
    Store(Request<StoreOperation>, StoreResult),
    Nearby(Request<NearbyOperation>, NearbyResult),
    Routing(Request<RouteOperation>, RouteResultOutput),
}

impl Resolution {
    const fn name(&self) -> &'static str {
        match self {
            Self::Store(..) => "store",
            Self::Nearby(..) => "nearby",
            Self::Routing(..) => "routing",
        }
    }
}

enum Message {
    Event(Event),
    Resolved(Resolution),
}

pub struct Core {
    core: CruxCore<Effect, App>,
    services: Services,
    messages_tx: mpsc::WeakUnboundedSender<Message>,
    messages_rx: mpsc::UnboundedReceiver<Message>,
    store_tx: mpsc::UnboundedSender<Request<StoreOperation>>,
    store_rx: Option<mpsc::UnboundedReceiver<Request<StoreOperation>>>,
    view_tx: watch::Sender<ViewModel>,
}

impl Core {
    #[must_use]
    pub fn new(services: Services) -> (Self, CoreHandle) {
        let core = CruxCore::<Effect, App>::new();
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (store_tx, store_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(core.view());

        let core = Self {
            core,
            services,
            messages_tx: messages_tx.downgrade(),
            messages_rx,
            store_tx,
            store_rx: Some(store_rx),
            view_tx,
        };
        let handle = CoreHandle {
            messages: messages_tx,
            view: view_rx,
        };
        (core, handle)
    }

    /// Builds the configured collaborators and installs the fmt subscriber
    /// with `config.log_filter`, unless the shell already set one.
    pub fn from_config(config: &CoreConfig) -> Result<(Self, CoreHandle), AppError> {
        let services = Services::from_config(config)?;
        if let Err(e) = crate::telemetry::init(&config.log_filter) {
            debug!(error = %e, "keeping the existing tracing subscriber");
        }
        Ok(Self::new(services))
    }

    /// Applies events until every `CoreHandle` has been dropped.
    pub async fn run(mut self) {
        if let Some(store_rx) = self.store_rx.take() {
            tokio::spawn(store_worker(
                Arc::clone(&self.services.places),
                store_rx,
                self.messages_tx.clone(),
            ));
        }

        info!("core started");
        while let Some(message) = self.messages_rx.recv().await {
            match message {
                Message::Event(event) => self.process_event(event),
                Message::Resolved(resolution) => self.resolve(resolution),
            }
        }
        info!("core stopped");
    }

    #[instrument(skip_all, fields(event = event.name()))]
    fn process_event(&self, event: Event) {
        let effects = self.core.process_event(event);
        self.handle_effects(effects);
    }

    #[instrument(skip_all, fields(effect = resolution.name()))]
    fn resolve(&self, resolution: Resolution) {
        let effects = match resolution {
            Resolution::Store(mut request, output) => self.core.resolve(&mut request, output),
            Resolution::Nearby(mut request, output) => self.core.resolve(&mut request, output),
            Resolution::Routing(mut request, output) => self.core.resolve(&mut request, output),
        };
        self.handle_effects(effects);
    }

    /// Dispatches every effect, then publishes at most one view.
    fn handle_effects(&self, effects: Vec<Effect>) {
        let mut render = false;
        for effect in effects {
            match effect {
                Effect::Render(_) => render = true,
                Effect::Store(request) => {
                    if self.store_tx.send(request).is_err() {
                        warn!("store worker is gone; dropping store request");
                    }
                }
                Effect::Nearby(request) => self.spawn_nearby(request),
                Effect::Routing(request) => self.spawn_route(request),
            }
        }

        if render {
            self.view_tx.send_replace(self.core.view());
        }
    }

    fn spawn_nearby(&self, request: Request<NearbyOperation>) {
        let nearby = Arc::clone(&self.services.nearby);
        let messages = self.messages_tx.clone();
        tokio::spawn(async move {
            let coordinate = request.operation.coordinate;
            let output = nearby.fetch_nearby(coordinate).await;
            deliver(&messages, Resolution::Nearby(request, output));
        });
    }

    fn spawn_route(&self, request: Request<RouteOperation>) {
        let routes = Arc::clone(&self.services.routes);
        let messages = self.messages_tx.clone();
        tokio::spawn(async move {
            let RouteOperation {
                from,
                to,
                transport,
            } = request.operation;
            let output = routes.build_route(from, to, transport).await;
            deliver(&messages, Resolution::Routing(request, output));
        });
    }
}

/// Executes store requests one at a time, in request order, so a refresh
/// issued after a write observes it.
async fn store_worker(
    store: Arc<dyn PlaceStore>,
    mut requests: mpsc::UnboundedReceiver<Request<StoreOperation>>,
    messages: mpsc::WeakUnboundedSender<Message>,
) {
    while let Some(request) = requests.recv().await {
        let output = place_store::execute(store.as_ref(), &request.operation).await;
        if !deliver(&messages, Resolution::Store(request, output)) {
            break;
        }
    }
    debug!("store worker stopped");
}

fn deliver(messages: &mpsc::WeakUnboundedSender<Message>, resolution: Resolution) -> bool {
    let name = resolution.name();
    let delivered = messages
        .upgrade()
        .is_some_and(|tx| tx.send(Message::Resolved(resolution)).is_ok());
    if !delivered {
        debug!(effect = name, "core stopped; dropping completion");
    }
    delivered
}
