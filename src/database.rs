//! File-backed document store.
//!
//! The whole store lives in one JSON file shaped as
//! `{ "<collection>": [ {document}, ... ] }`. Reads are served from memory;
//! writes are serialized behind one lock and only become visible after the
//! file has been rewritten, so a failed write leaves the store untouched.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::document::{has_id, Document, ID_FIELD};

const RANDOM_ID_LEN: usize = 7;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    collections: BTreeMap<String, Vec<Document>>,
    // Top-level entries that are not arrays of objects; kept so they survive rewrites
    other: Map<String, Value>,
}

impl StoreState {
    fn collection(&self, name: &str) -> Result<&Vec<Document>, StoreError> {
        self.collections
            .get(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Vec<Document>, StoreError> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }
}

#[derive(Clone)]
pub struct Database {
    path: Arc<PathBuf>,
    state: Arc<RwLock<StoreState>>,
}

impl Database {
    /// Opens the store file, creating it when missing and adding any of the
    /// `required` collections it lacks.
    pub async fn open(path: impl Into<PathBuf>, required: &[&str]) -> Result<Self, StoreError> {
        let path = path.into();

        let (mut state, mut dirty) = match tokio::fs::read(&path).await {
            Ok(bytes) => (parse_state(&bytes)?, false),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Store file {} not found, creating it", path.display());
                (StoreState::default(), true)
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        for name in required {
            if !state.collections.contains_key(*name) {
                state.collections.insert((*name).to_string(), Vec::new());
                dirty = true;
            }
        }

        if dirty {
            persist(&path, &state).await?;
        }

        info!(
            "Store opened at {} with collections {:?}",
            path.display(),
            state.collections.keys().collect::<Vec<_>>()
        );

        Ok(Database {
            path: Arc::new(path),
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn has_collection(&self, collection: &str) -> bool {
        self.state.read().await.collections.contains_key(collection)
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.state.read().await.collection(collection)?.clone())
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .collection(collection)?
            .iter()
            .find(|doc| has_id(doc, id))
            .cloned())
    }

    /// Stores a new document under a freshly assigned id and returns it.
    /// Any `id` supplied by the caller is discarded.
    pub async fn insert(&self, collection: &str, mut document: Document) -> Result<Document, StoreError> {
        let stored = self
            .write(|state| {
                let documents = state.collection_mut(collection)?;
                document.insert(ID_FIELD.to_string(), next_id(documents));
                documents.push(document);
                Ok(documents.last().cloned())
            })
            .await?;

        // write() only returns None when the closure does
        stored.ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    /// Shallow-merges `changes` into the document with `id`. The id itself never changes.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.write(|state| {
            let Some(document) = state
                .collection_mut(collection)?
                .iter_mut()
                .find(|doc| has_id(doc, id))
            else {
                return Ok(None);
            };

            for (key, value) in changes {
                if key != ID_FIELD {
                    document.insert(key, value);
                }
            }
            Ok(Some(document.clone()))
        })
        .await
    }

    /// Swaps the whole document with `id` for `replacement`, keeping the stored id.
    pub async fn replace(
        &self,
        collection: &str,
        id: &str,
        mut replacement: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.write(|state| {
            let Some(document) = state
                .collection_mut(collection)?
                .iter_mut()
                .find(|doc| has_id(doc, id))
            else {
                return Ok(None);
            };

            if let Some(stored_id) = document.get(ID_FIELD) {
                replacement.insert(ID_FIELD.to_string(), stored_id.clone());
            }
            *document = replacement;
            Ok(Some(document.clone()))
        })
        .await
    }

    pub async fn remove(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.write(|state| {
            let documents = state.collection_mut(collection)?;
            Ok(documents
                .iter()
                .position(|doc| has_id(doc, id))
                .map(|index| documents.remove(index)))
        })
        .await
    }

    // Applies a mutation to a copy of the state, persists it, then publishes it.
    // A `None` result means nothing changed and nothing is written.
    async fn write<T, F>(&self, apply: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut StoreState) -> Result<Option<T>, StoreError>,
    {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();

        let Some(result) = apply(&mut next)? else {
            return Ok(None);
        };

        persist(&self.path, &next).await?;
        *guard = next;
        Ok(Some(result))
    }
}

fn parse_state(bytes: &[u8]) -> Result<StoreState, StoreError> {
    let root: Map<String, Value> = serde_json::from_slice(bytes)?;
    let mut state = StoreState::default();

    for (name, value) in root {
        match value {
            Value::Array(items) if items.iter().all(Value::is_object) => {
                let documents = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(doc) => Some(doc),
                        _ => None,
                    })
                    .collect();
                state.collections.insert(name, documents);
            }
            other => {
                warn!("Store entry {:?} is not a collection of objects, leaving it untouched", name);
                state.other.insert(name, other);
            }
        }
    }

    Ok(state)
}

async fn persist(path: &Path, state: &StoreState) -> Result<(), StoreError> {
    let mut root = state.other.clone();
    for (name, documents) in &state.collections {
        root.insert(
            name.clone(),
            Value::Array(documents.iter().cloned().map(Value::Object).collect()),
        );
    }
    let bytes = serde_json::to_vec_pretty(&Value::Object(root))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;

    debug!("Store written to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

// Numeric ids continue from the current maximum; any non-numeric id switches
// the collection to short random string ids.
fn next_id(documents: &[Document]) -> Value {
    let numeric: Option<Vec<u64>> = documents
        .iter()
        .filter_map(|doc| doc.get(ID_FIELD))
        .map(Value::as_u64)
        .collect();

    match numeric {
        Some(ids) => Value::from(ids.into_iter().max().unwrap_or(0).saturating_add(1)),
        None => loop {
            let candidate: String = Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(RANDOM_ID_LEN)
                .collect();
            if !documents.iter().any(|doc| has_id(doc, &candidate)) {
                break Value::String(candidate);
            }
        },
    }
}
