use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::StorageKeys;
use crate::error::Result;
use crate::models::{NormalizedPayload, ResourceKind};
use crate::storage::KeyValueStore;

/// Stored form of a cached payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    payload: NormalizedPayload,
}

/// Last successfully normalized payload per resource kind.
///
/// Entries are keyed by kind only, not by session: a new session shows the previous
/// session's data until a fetch overwrites it.
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    fn key(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::Diagnosis => &self.keys.diagnosis,
            ResourceKind::Summary => &self.keys.summary,
        }
    }

    /// A missing, unreadable or mismatched entry is a miss.
    pub async fn get(&self, kind: ResourceKind) -> Option<NormalizedPayload> {
        let text = match self.store.get(self.key(kind)).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("Cache miss for {}", kind);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cached {}: {}", kind, e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&text) {
            Ok(entry) if entry.payload.kind() == kind => {
                debug!("Using cached {} data stored at {}", kind, entry.stored_at);
                Some(entry.payload)
            }
            Ok(_) => {
                warn!("Cached {} entry holds a different resource, ignoring", kind);
                None
            }
            Err(e) => {
                warn!("Error parsing cached {}: {}", kind, e);
                None
            }
        }
    }

    pub async fn put(&self, payload: &NormalizedPayload) -> Result<()> {
        let entry = CacheEntry {
            stored_at: Utc::now(),
            payload: payload.clone(),
        };
        let text = serde_json::to_string(&entry)?;
        self.store.set(self.key(payload.kind()), text).await
    }
}
