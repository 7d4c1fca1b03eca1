//! Typed access to the replicated document store.
//!
//! The store only offers point `get`/`put`/`query`/`delete` calls with
//! last-write-wins semantics. Nothing here adds business rules; callers own
//! read-modify-write sequencing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Query field that matches every document of a collection.
pub const QUERY_ALL: &str = "all";
/// Delete scope that removes every document of a collection.
pub const DELETE_ALL: &str = "all";
pub const DEFAULT_COLLECTION_PREFIX: &str = "rps_";

const KEY_FIELD: &str = "_id";

#[derive(Debug, Error)]
pub enum LedgerStoreError {
    #[error("store lock poisoned")]
    LockPoisoned,
    #[error("store unavailable: {0}")]
    Transient(String),
    #[error("malformed document in {collection}: {source}")]
    Serialization {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("document in {collection} has no string _id")]
    MissingKey { collection: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Accounts,
    Matches,
    Items,
    Wallets,
    Transactions,
}

impl Collection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accounts => "account",
            Self::Matches => "challenge",
            Self::Items => "item",
            Self::Wallets => "wallet",
            Self::Transactions => "transaction",
        }
    }
}

/// Raw client of the document store. Payloads are JSON documents keyed by `_id`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerStoreError>;

    async fn put(&self, collection: &str, document: &[u8]) -> Result<(), LedgerStoreError>;

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Vec<u8>>, LedgerStoreError>;

    async fn delete(&self, collection: &str, scope: &str) -> Result<(), LedgerStoreError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerStoreError> {
        (**self).get(collection, key).await
    }

    async fn put(&self, collection: &str, document: &[u8]) -> Result<(), LedgerStoreError> {
        (**self).put(collection, document).await
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Vec<u8>>, LedgerStoreError> {
        (**self).query(collection, field, value).await
    }

    async fn delete(&self, collection: &str, scope: &str) -> Result<(), LedgerStoreError> {
        (**self).delete(collection, scope).await
    }
}

/// Typed view over a [`DocumentStore`], namespacing collections with a prefix.
#[derive(Debug, Clone)]
pub struct LedgerStore<S> {
    store: S,
    prefix: String,
}

impl<S> LedgerStore<S>
where
    S: DocumentStore,
{
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, DEFAULT_COLLECTION_PREFIX)
    }

    #[must_use]
    pub fn with_prefix(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn collection_name(&self, collection: Collection) -> String {
        format!("{}{}", self.prefix, collection.as_str())
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, LedgerStoreError> {
        let name = self.collection_name(collection);
        let Some(raw) = self.store.get(&name, key).await? else {
            return Ok(None);
        };
        if is_blank(&raw) {
            return Ok(None);
        }
        decode(&name, &raw).map(Some)
    }

    pub async fn put<T: Serialize>(
        &self,
        collection: Collection,
        document: &T,
    ) -> Result<(), LedgerStoreError> {
        let name = self.collection_name(collection);
        let raw = serde_json::to_vec(document).map_err(|source| LedgerStoreError::Serialization {
            collection: name.clone(),
            source,
        })?;
        debug!(collection = %name, bytes = raw.len(), "document put");
        self.store.put(&name, &raw).await
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, LedgerStoreError> {
        let name = self.collection_name(collection);
        let rows = self.store.query(&name, field, value).await?;
        debug!(collection = %name, field, value, rows = rows.len(), "documents queried");
        rows.iter()
            .filter(|raw| !is_blank(raw))
            .map(|raw| decode(&name, raw))
            .collect()
    }

    /// Like [`Self::query`], but a row that fails to decode is logged and
    /// skipped instead of failing the whole read.
    pub async fn query_lenient<T: DeserializeOwned>(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, LedgerStoreError> {
        let name = self.collection_name(collection);
        let rows = self.store.query(&name, field, value).await?;
        debug!(collection = %name, field, value, rows = rows.len(), "documents queried");
        Ok(rows
            .iter()
            .filter(|raw| !is_blank(raw))
            .filter_map(|raw| match decode(&name, raw) {
                Ok(document) => Some(document),
                Err(err) => {
                    warn!(collection = %name, error = %err, "skipping undecodable document");
                    None
                }
            })
            .collect())
    }

    pub async fn query_all<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, LedgerStoreError> {
        self.query(collection, QUERY_ALL, "").await
    }

    pub async fn delete(&self, collection: Collection, scope: &str) -> Result<(), LedgerStoreError> {
        let name = self.collection_name(collection);
        debug!(collection = %name, scope, "documents deleted");
        self.store.delete(&name, scope).await
    }
}

fn is_blank(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == "null"
}

fn decode<T: DeserializeOwned>(collection: &str, raw: &[u8]) -> Result<T, LedgerStoreError> {
    serde_json::from_slice(raw).map_err(|source| LedgerStoreError::Serialization {
        collection: collection.to_string(),
        source,
    })
}

/// Process-local store with the same point-operation contract as the
/// replicated one. Reads see every completed write.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>,
    unavailable: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call against `collection` fail with a transient error.
    pub fn set_unavailable(&self, collection: &str, unavailable: bool) {
        if let Ok(mut guard) = self.unavailable.lock() {
            if unavailable {
                guard.insert(collection.to_string());
            } else {
                guard.remove(collection);
            }
        }
    }

    #[must_use]
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|guard| guard.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or_default()
    }

    fn ensure_available(&self, collection: &str) -> Result<(), LedgerStoreError> {
        let guard = self
            .unavailable
            .lock()
            .map_err(|_| LedgerStoreError::LockPoisoned)?;
        if guard.contains(collection) {
            return Err(LedgerStoreError::Transient(format!(
                "collection {collection} unreachable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerStoreError> {
        self.ensure_available(collection)?;
        let guard = self
            .collections
            .lock()
            .map_err(|_| LedgerStoreError::LockPoisoned)?;
        Ok(guard.get(collection).and_then(|docs| docs.get(key)).cloned())
    }

    async fn put(&self, collection: &str, document: &[u8]) -> Result<(), LedgerStoreError> {
        self.ensure_available(collection)?;
        let value: Value =
            serde_json::from_slice(document).map_err(|source| LedgerStoreError::Serialization {
                collection: collection.to_string(),
                source,
            })?;
        let key = value
            .get(KEY_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerStoreError::MissingKey {
                collection: collection.to_string(),
            })?
            .to_string();
        self.collections
            .lock()
            .map_err(|_| LedgerStoreError::LockPoisoned)?
            .entry(collection.to_string())
            .or_default()
            .insert(key, document.to_vec());
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Vec<u8>>, LedgerStoreError> {
        self.ensure_available(collection)?;
        let guard = self
            .collections
            .lock()
            .map_err(|_| LedgerStoreError::LockPoisoned)?;
        let Some(docs) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        if field == QUERY_ALL {
            return Ok(docs.values().cloned().collect());
        }
        let pointer = format!("/{}", field.replace('.', "/"));
        Ok(docs
            .values()
            .filter(|raw| {
                serde_json::from_slice::<Value>(raw)
                    .ok()
                    .and_then(|doc| doc.pointer(&pointer).map(|v| field_matches(v, value)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, collection: &str, scope: &str) -> Result<(), LedgerStoreError> {
        self.ensure_available(collection)?;
        let mut guard = self
            .collections
            .lock()
            .map_err(|_| LedgerStoreError::LockPoisoned)?;
        if scope == DELETE_ALL {
            guard.remove(collection);
        } else if let Some(docs) = guard.get_mut(collection) {
            docs.remove(scope);
        }
        Ok(())
    }
}

fn field_matches(field: &Value, expected: &str) -> bool {
    match field {
        Value::String(text) => text == expected,
        other => other.to_string() == expected,
    }
}
