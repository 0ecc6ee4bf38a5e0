use crate::config::CatalogConfig;
use crate::db::{KeyValueStore, MemoryStore, SqliteStore};
use crate::error::CatalogResult;
use crate::models::BookRecord;

pub const DEFAULT_STORAGE_KEY: &str = "books";

pub type DynStore = Box<dyn KeyValueStore>;

/// Result of reading the record slot before the fail-open policy applies.
#[derive(Debug)]
pub enum StoredCollection {
    Present(Vec<BookRecord>),
    Unset,
    Unreadable(String),
}

impl StoredCollection {
    pub fn into_books(self) -> Vec<BookRecord> {
        match self {
            StoredCollection::Present(books) => books,
            StoredCollection::Unset | StoredCollection::Unreadable(_) => Vec::new(),
        }
    }
}

/// Maps one storage key to the whole serialized book collection.
pub struct RecordStore<S> {
    kv: S,
    key: String,
}

impl<S: KeyValueStore> RecordStore<S> {
    pub fn new(kv: S, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn read(&self) -> StoredCollection {
        let raw = match self.kv.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return StoredCollection::Unset,
            Err(err) => {
                log::warn!("reading '{}' failed, using an empty catalog: {err:#}", self.key);
                return StoredCollection::Unreadable(err.to_string());
            }
        };

        let parsed = serde_json::from_str::<Vec<serde_json::Value>>(&raw).and_then(|values| {
            values
                .into_iter()
                .map(BookRecord::from_stored)
                .collect::<serde_json::Result<Vec<_>>>()
        });
        match parsed {
            Ok(books) => StoredCollection::Present(books),
            Err(err) => {
                log::warn!("stored value under '{}' is malformed, using an empty catalog: {err}", self.key);
                StoredCollection::Unreadable(err.to_string())
            }
        }
    }

    pub fn load(&self) -> Vec<BookRecord> {
        self.read().into_books()
    }

    /// Overwrites the whole stored collection.
    pub fn save(&self, books: &[BookRecord]) -> CatalogResult<()> {
        let values = books
            .iter()
            .map(BookRecord::to_stored)
            .collect::<serde_json::Result<Vec<_>>>()?;
        let raw = serde_json::to_string(&values)?;
        self.kv.set(&self.key, &raw)?;
        log::debug!("wrote {} records ({} bytes) to '{}'", books.len(), raw.len(), self.key);
        Ok(())
    }
}

/// Opens the configured SQLite file, falling back to an in-memory store so
/// the window still comes up when the data directory is unusable.
pub fn open_configured(config: &CatalogConfig) -> RecordStore<DynStore> {
    let (kv, location): (DynStore, String) = match SqliteStore::open(&config.database_path) {
        Ok(store) => {
            let location = store.path().display().to_string();
            (Box::new(store), location)
        }
        Err(err) => {
            log::error!(
                "could not open {}, changes will not be kept: {err:#}",
                config.database_path.display()
            );
            (Box::new(MemoryStore::new()), "memory".to_string())
        }
    };
    let records = RecordStore::new(kv, config.storage_key.clone());
    log::info!("catalog records under '{}' in {location}", records.key());
    records
}
