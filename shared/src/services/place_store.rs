use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::capabilities::{StoreOperation, StoreOutput, StoreResult};
use crate::model::{Place, PlaceId};
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("place not found: {0}")]
    NotFound(String),

    #[error("place already exists: {0}")]
    AlreadyExists(String),

    #[error("corrupted entry: {place_id}, reason: {reason}")]
    CorruptedEntry { place_id: String, reason: String },

    #[error("store task failed: {0}")]
    TaskFailed(String),

    #[error("unexpected store output")]
    UnexpectedOutput,
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        let kind = match e {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::CorruptedEntry { .. } => ErrorKind::Deserialization,
            StoreError::UnexpectedOutput | StoreError::TaskFailed(_) => ErrorKind::Internal,
            StoreError::Database(_) | StoreError::AlreadyExists(_) => ErrorKind::Storage,
        };
        AppError::new(kind, "Place store failure").with_internal(e.to_string())
    }
}

#[async_trait::async_trait]
pub trait PlaceStore: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Place>, StoreError>;
    async fn create(&self, place: &Place) -> Result<(), StoreError>;
    async fn delete(&self, place_id: &PlaceId) -> Result<(), StoreError>;
    /// Commits in-memory mutations of an existing place.
    async fn save(&self, place: &Place) -> Result<(), StoreError>;
}

/// Runs one queued store request against `store`.
#[instrument(skip(store))]
pub async fn execute(store: &dyn PlaceStore, operation: &StoreOperation) -> StoreResult {
    match operation {
        StoreOperation::FetchAll => store.fetch_all().await.map(StoreOutput::Places),
        StoreOperation::Create(place) => store.create(place).await.map(|()| StoreOutput::Done),
        StoreOperation::Delete(id) => store.delete(id).await.map(|()| StoreOutput::Done),
        StoreOperation::Save(place) => store.save(place).await.map(|()| StoreOutput::Done),
    }
}

/// Process-local store, insertion ordered.
#[derive(Default)]
pub struct MemoryPlaceStore {
    places: RwLock<Vec<Place>>,
}

impl MemoryPlaceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_places(places: Vec<Place>) -> Self {
        Self {
            places: RwLock::new(places),
        }
    }
}

#[async_trait::async_trait]
impl PlaceStore for MemoryPlaceStore {
    async fn fetch_all(&self) -> Result<Vec<Place>, StoreError> {
        Ok(self.places.read().await.clone())
    }

    async fn create(&self, place: &Place) -> Result<(), StoreError> {
        let mut places = self.places.write().await;
        if places.iter().any(|p| p.id == place.id) {
            return Err(StoreError::AlreadyExists(place.id.to_string()));
        }
        places.push(place.clone());
        Ok(())
    }

    async fn delete(&self, place_id: &PlaceId) -> Result<(), StoreError> {
        self.places.write().await.retain(|p| &p.id != place_id);
        Ok(())
    }

    async fn save(&self, place: &Place) -> Result<(), StoreError> {
        let mut places = self.places.write().await;
        let existing = places
            .iter_mut()
            .find(|p| p.id == place.id)
            .ok_or_else(|| StoreError::NotFound(place.id.to_string()))?;
        *existing = place.clone();
        debug!(place_id = %place.id, "place saved");
        Ok(())
    }
}

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use self::sqlite::SqlitePlaceStore;

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
mod sqlite {
    use std::path::Path;
    use std::sync::{Arc, Mutex, PoisonError};

    use rusqlite::{params, Connection};
    use tracing::{instrument, warn};

    use super::{PlaceStore, StoreError};
    use crate::model::{Place, PlaceId};
    use crate::{Coordinate, UnixTimeMs};

    impl From<rusqlite::Error> for StoreError {
        fn from(e: rusqlite::Error) -> Self {
            StoreError::Database(e.to_string())
        }
    }

    const SCHEMA: &str = r"
        CREATE TABLE IF NOT EXISTS places (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            created_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_places_created ON places(created_at_ms);
    ";

    type PlaceRow = (String, String, f64, f64, i64);

    /// SQLite-backed place store. Blocking calls run on tokio's blocking pool.
    #[derive(Clone)]
    pub struct SqlitePlaceStore {
        conn: Arc<Mutex<Connection>>,
    }

    impl SqlitePlaceStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
            Self::init(Connection::open(path)?)
        }

        pub fn open_in_memory() -> Result<Self, StoreError> {
            Self::init(Connection::open_in_memory()?)
        }

        fn init(conn: Connection) -> Result<Self, StoreError> {
            conn.execute_batch(SCHEMA)?;
            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
        where
            F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
            T: Send + 'static,
        {
            let conn = Arc::clone(&self.conn);
            tokio::task::spawn_blocking(move || {
                let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
                f(&guard)
            })
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
        }
    }

    fn row_to_place((id, title, lat, lon, created_at_ms): PlaceRow) -> Result<Place, StoreError> {
        let coordinate = Coordinate::new(lat, lon).map_err(|e| StoreError::CorruptedEntry {
            place_id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Place {
            id: PlaceId::new(id),
            title,
            coordinate,
            created_at: UnixTimeMs(u64::try_from(created_at_ms).unwrap_or(0)),
        })
    }

    fn millis(place: &Place) -> i64 {
        i64::try_from(place.created_at.as_millis()).unwrap_or(i64::MAX)
    }

    #[async_trait::async_trait]
    impl PlaceStore for SqlitePlaceStore {
        #[instrument(skip(self))]
        async fn fetch_all(&self) -> Result<Vec<Place>, StoreError> {
            let rows = self
                .with_conn(|conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, title, latitude, longitude, created_at_ms
                         FROM places ORDER BY created_at_ms ASC, rowid ASC",
                    )?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                        })?
                        .collect::<Result<Vec<PlaceRow>, _>>()?;
                    Ok(rows)
                })
                .await?;

            let mut places = Vec::with_capacity(rows.len());
            for row in rows {
                match row_to_place(row) {
                    Ok(place) => places.push(place),
                    Err(e) => warn!(error = %e, "skipping corrupted place row"),
                }
            }
            Ok(places)
        }

        #[instrument(skip(self, place), fields(place_id = %place.id))]
        async fn create(&self, place: &Place) -> Result<(), StoreError> {
            let place = place.clone();
            self.with_conn(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO places (id, title, latitude, longitude, created_at_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        place.id.as_str(),
                        place.title,
                        place.coordinate.lat(),
                        place.coordinate.lon(),
                        millis(&place)
                    ],
                )?;
                if inserted == 0 {
                    return Err(StoreError::AlreadyExists(place.id.to_string()));
                }
                Ok(())
            })
            .await
        }

        #[instrument(skip(self), fields(place_id = %place_id))]
        async fn delete(&self, place_id: &PlaceId) -> Result<(), StoreError> {
            let id = place_id.clone();
            self.with_conn(move |conn| {
                conn.execute("DELETE FROM places WHERE id = ?1", params![id.as_str()])?;
                Ok(())
            })
            .await
        }

        #[instrument(skip(self, place), fields(place_id = %place.id))]
        async fn save(&self, place: &Place) -> Result<(), StoreError> {
            let place = place.clone();
            self.with_conn(move |conn| {
                let updated = conn.execute(
                    "UPDATE places SET title = ?2, latitude = ?3, longitude = ?4 WHERE id = ?1",
                    params![
                        place.id.as_str(),
                        place.title,
                        place.coordinate.lat(),
                        place.coordinate.lon()
                    ],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound(place.id.to_string()));
                }
                Ok(())
            })
            .await
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn place(lat: f64, lon: f64, title: &str, created: u64) -> Place {
            let mut place = Place::new(Coordinate::new(lat, lon).unwrap());
            place.title = title.to_string();
            place.created_at = UnixTimeMs(created);
            place
        }

        #[tokio::test]
        async fn test_create_fetch_delete() {
            let store = SqlitePlaceStore::open_in_memory().unwrap();
            let a = place(50.45, 30.52, "A", 1);
            let b = place(49.84, 24.03, "B", 2);
            store.create(&b).await.unwrap();
            store.create(&a).await.unwrap();

            let all = store.fetch_all().await.unwrap();
            assert_eq!(all, vec![a.clone(), b.clone()]);

            store.delete(&a.id).await.unwrap();
            store.delete(&a.id).await.unwrap();
            assert_eq!(store.fetch_all().await.unwrap(), vec![b]);
        }

        #[tokio::test]
        async fn test_duplicate_create_is_rejected() {
            let store = SqlitePlaceStore::open_in_memory().unwrap();
            let a = place(1.0, 1.0, "A", 1);
            store.create(&a).await.unwrap();
            assert!(matches!(
                store.create(&a).await,
                Err(StoreError::AlreadyExists(_))
            ));
        }

        #[tokio::test]
        async fn test_save_updates_title() {
            let store = SqlitePlaceStore::open_in_memory().unwrap();
            let mut a = place(1.0, 1.0, "A", 1);
            store.create(&a).await.unwrap();
            a.title = "Renamed".into();
            store.save(&a).await.unwrap();
            assert_eq!(store.fetch_all().await.unwrap()[0].title, "Renamed");

            let missing = place(2.0, 2.0, "Missing", 2);
            assert!(matches!(
                store.save(&missing).await,
                Err(StoreError::NotFound(_))
            ));
        }

        #[tokio::test]
        async fn test_corrupted_rows_are_skipped() {
            let store = SqlitePlaceStore::open_in_memory().unwrap();
            store.create(&place(1.0, 1.0, "ok", 1)).await.unwrap();
            store
                .with_conn(|conn| {
                    conn.execute(
                        "INSERT INTO places VALUES ('bad', 'bad', 123.0, 0.0, 2)",
                        [],
                    )?;
                    Ok(())
                })
                .await
                .unwrap();

            let all = store.fetch_all().await.unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].title, "ok");
        }

        #[tokio::test]
        async fn test_file_store_survives_reopen() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("places.db");
            let a = place(10.0, 20.0, "Persisted", 5);
            {
                let store = SqlitePlaceStore::open(&path).unwrap();
                store.create(&a).await.unwrap();
            }
            let reopened = SqlitePlaceStore::open(&path).unwrap();
            assert_eq!(reopened.fetch_all().await.unwrap(), vec![a]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinate;

    fn place(title: &str) -> Place {
        let mut place = Place::new(Coordinate::new(1.0, 1.0).unwrap());
        place.title = title.to_string();
        place
    }

    mod memory_store_tests {
        use super::*;

        #[tokio::test]
        async fn test_preserves_insertion_order() {
            let store = MemoryPlaceStore::new();
            let a = place("A");
            let b = place("B");
            store.create(&a).await.unwrap();
            store.create(&b).await.unwrap();
            assert_eq!(store.fetch_all().await.unwrap(), vec![a, b]);
        }

        #[tokio::test]
        async fn test_save_missing_place_fails() {
            let store = MemoryPlaceStore::new();
            assert!(matches!(
                store.save(&place("A")).await,
                Err(StoreError::NotFound(_))
            ));
        }

        #[tokio::test]
        async fn test_execute_maps_operations() {
            let store = MemoryPlaceStore::new();
            let a = place("A");
            let out = execute(&store, &StoreOperation::Create(a.clone())).await;
            assert_eq!(out, Ok(StoreOutput::Done));
            let out = execute(&store, &StoreOperation::FetchAll).await;
            assert_eq!(out, Ok(StoreOutput::Places(vec![a])));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_store_error_maps_to_app_error() {
            let err: AppError = StoreError::Database("disk I/O".into()).into();
            assert_eq!(err.kind, ErrorKind::Storage);
            assert!(err.is_retryable());

            let err: AppError = StoreError::NotFound("x".into()).into();
            assert_eq!(err.kind, ErrorKind::NotFound);
        }
    }
}
