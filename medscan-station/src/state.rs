//! Shared application state
//!
//! One catalog, one live session, one record store, one event bus —
//! wired once at startup and cloned into every handler.

use crate::inference::InferenceClient;
use crate::intake::ImageIntake;
use crate::session::Session;
use crate::store::{CommentStore, ObjectStore};
use medscan_common::catalog::ModelCatalog;
use medscan_common::config::StationConfig;
use medscan_common::events::EventBus;
use medscan_common::Result;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;

/// Event bus buffer: SSE consumers drain quickly, station events are small
const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StationConfig>,
    pub catalog: Arc<ModelCatalog>,
    pub intake: Arc<ImageIntake>,
    pub session: Arc<Session>,
    pub inference: Arc<InferenceClient>,
    pub store: Arc<CommentStore>,
    pub events: EventBus,
}

impl AppState {
    /// Wire the full component graph over an initialized database pool
    pub fn new(config: StationConfig, pool: Pool<Sqlite>) -> Result<Self> {
        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let catalog = Arc::new(ModelCatalog::builtin());
        let intake = Arc::new(ImageIntake::new(&config.upload));
        let inference = Arc::new(InferenceClient::new(&config.inference)?);
        let session = Arc::new(Session::new(catalog.clone(), events.clone()));

        let objects = ObjectStore::new(config.objects_dir(), config.public_base());
        objects.ensure_dir()?;
        let store = Arc::new(CommentStore::new(pool, objects, events.clone()));

        Ok(Self {
            config: Arc::new(config),
            catalog,
            intake,
            session,
            inference,
            store,
            events,
        })
    }
}
