//! Collaborators the engine talks to between and during turns
//!
//! The engine never owns storage, translations or network access. It reaches
//! them through the traits in this module, bundled per deployment into a
//! [`Sandbox`].

pub mod translation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::{InteractionError, InteractionResult};
use crate::http::{HttpApi, HttpTransport};

pub use translation::{StaticTranslations, Translation, TranslationSource};

/// Outcome of a key-value write as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReply {
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl SetReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Key-value storage for user records
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any
    async fn get(&self, key: &str) -> InteractionResult<Option<serde_json::Value>>;

    /// Store `value` under `key`
    ///
    /// A store that is reachable but refuses the write reports it through the
    /// returned [`SetReply`] rather than an error.
    async fn set(&self, key: &str, value: serde_json::Value) -> InteractionResult<SetReply>;
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }

    pub async fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.values.write().await.remove(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> InteractionResult<Option<serde_json::Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> InteractionResult<SetReply> {
        debug!(key, "Storing value");
        self.values.write().await.insert(key.to_string(), value);
        Ok(SetReply::ok())
    }
}

/// The set of collaborators available to a deployment
#[derive(Clone)]
pub struct Sandbox {
    kv: Arc<dyn KeyValueStore>,
    translations: Arc<dyn TranslationSource>,
    http: Option<Arc<dyn HttpTransport>>,
}

impl Sandbox {
    pub fn new(kv: Arc<dyn KeyValueStore>, translations: Arc<dyn TranslationSource>) -> Self {
        Self {
            kv,
            translations,
            http: None,
        }
    }

    /// A sandbox backed by an in-memory store and no translations
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticTranslations::new()),
        )
    }

    pub fn with_http(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(transport);
        self
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub fn translations(&self) -> &Arc<dyn TranslationSource> {
        &self.translations
    }

    /// Plain HTTP access for state logic that consults remote services
    pub fn http(&self) -> InteractionResult<HttpApi> {
        self.http_transport().map(HttpApi::new)
    }

    /// JSON HTTP access for state logic that consults remote services
    pub fn json_api(&self) -> InteractionResult<HttpApi> {
        self.http_transport().map(HttpApi::json)
    }

    fn http_transport(&self) -> InteractionResult<Arc<dyn HttpTransport>> {
        self.http.clone().ok_or_else(|| {
            InteractionError::configuration("no http transport configured for this sandbox")
        })
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("http", &self.http.is_some())
            .finish_non_exhaustive()
    }
}
