//! Store-backed authentication state.
//!
//! [`AuthState::initialize`] loads the credentials record (or generates a
//! fresh one) and exposes it, together with a store-backed key store, in the
//! shape the messaging client is constructed with. Every mutation the client
//! signals is written back with [`AuthState::persist_credentials`].
//!
//! Store failures never escape: reads degrade to absent and writes to
//! skipped, per [`GuardedStore`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthCreds, KeyBatch, KeyCategory, KeyMap, SignalKey};
use crate::client::{AuthenticationState, SignalKeyStore};
use crate::codec;
use crate::config::StoreKeys;
use crate::store::GuardedStore;

/// Where the in-memory credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredsOrigin {
    /// Loaded from the store.
    Loaded,
    /// Generated because nothing usable was stored.
    Fresh,
}

pub struct AuthState {
    store: GuardedStore,
    creds_key: String,
    creds: Arc<RwLock<AuthCreds>>,
    keys: Arc<StoreKeyStore>,
    origin: CredsOrigin,
}

impl AuthState {
    /// Load credentials from the store, falling back to fresh ones.
    ///
    /// Absence is the normal first-run case; an unreadable or undecodable
    /// record is logged and treated the same way.
    pub async fn initialize(store: GuardedStore, layout: &StoreKeys) -> Self {
        let loaded = match store.read(&layout.creds).await {
            Some(stored) => match codec::decode::<AuthCreds>(&stored) {
                Ok(creds) => Some(creds),
                Err(e) => {
                    error!(key = %layout.creds, error = %e, "stored credentials are corrupt, generating fresh ones");
                    None
                }
            },
            None => None,
        };

        let (creds, origin) = match loaded {
            Some(creds) => (creds, CredsOrigin::Loaded),
            None => (AuthCreds::init(), CredsOrigin::Fresh),
        };
        info!(
            origin = ?origin,
            paired = creds.is_paired(),
            history = creds.processed_history_messages.len(),
            "credentials ready"
        );

        Self {
            keys: Arc::new(StoreKeyStore::new(store.clone(), layout.key_prefix.clone())),
            store,
            creds_key: layout.creds.clone(),
            creds: Arc::new(RwLock::new(creds)),
            origin,
        }
    }

    pub fn origin(&self) -> CredsOrigin {
        self.origin
    }

    /// Shared handle to the in-memory credentials.
    pub fn creds(&self) -> Arc<RwLock<AuthCreds>> {
        self.creds.clone()
    }

    pub fn keys(&self) -> Arc<dyn SignalKeyStore> {
        self.keys.clone()
    }

    /// The `{creds, keys}` pair the messaging client is built from.
    pub fn state(&self) -> AuthenticationState {
        AuthenticationState {
            creds: self.creds(),
            keys: self.keys(),
        }
    }

    /// Write the current credentials over the stored record.
    ///
    /// Returns `false` when the write was skipped; there is no retry queue
    /// beyond the store's own write attempts.
    pub async fn persist_credentials(&self) -> bool {
        let encoded = {
            let creds = self.creds.read().await;
            codec::encode(&*creds)
        };
        match encoded {
            Ok(stored) => {
                let written = self.store.write(&self.creds_key, &stored).await;
                if written {
                    debug!(key = %self.creds_key, "credentials persisted");
                } else {
                    warn!(key = %self.creds_key, "credentials not persisted this round");
                }
                written
            }
            Err(e) => {
                error!(error = %e, "failed to encode credentials");
                false
            }
        }
    }

    /// Delete the stored credentials so the next start pairs from scratch.
    pub async fn clear_credentials(&self) -> bool {
        self.store.remove(&self.creds_key).await
    }
}

/// [`SignalKeyStore`] over a key-value store, one key per entry:
/// `<prefix>:<category>:<id>`.
pub struct StoreKeyStore {
    store: GuardedStore,
    prefix: String,
}

impl StoreKeyStore {
    pub fn new(store: GuardedStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn entry_key(&self, category: KeyCategory, id: &str) -> String {
        format!("{}:{}:{}", self.prefix, category, id)
    }

    async fn load(&self, category: KeyCategory, id: &str) -> Option<SignalKey> {
        let key = self.entry_key(category, id);
        let stored = self.store.read(&key).await?;
        match SignalKey::decode(category, &stored) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "undecodable key entry, treating as absent");
                None
            }
        }
    }

    /// Run every write and delete in `batch` concurrently. Returns how many
    /// were applied; the rest were skipped.
    pub async fn apply_batch(&self, batch: &KeyBatch) -> usize {
        let operations = batch
            .iter()
            .map(|(category, id, value)| self.apply(category, id, value));
        let results = join_all(operations).await;
        let applied = results.iter().filter(|ok| **ok).count();
        if applied < results.len() {
            warn!(total = results.len(), skipped = results.len() - applied, "keys set partially applied");
        } else {
            debug!(total = results.len(), "keys set");
        }
        applied
    }

    async fn apply(&self, category: KeyCategory, id: &str, value: Option<&SignalKey>) -> bool {
        let key = self.entry_key(category, id);
        match value {
            Some(value) => match value.encode() {
                Ok(stored) => self.store.write(&key, &stored).await,
                Err(e) => {
                    error!(key = %key, error = %e, "failed to encode key entry");
                    false
                }
            },
            None => self.store.remove(&key).await,
        }
    }
}

#[async_trait]
impl SignalKeyStore for StoreKeyStore {
    async fn get(&self, category: KeyCategory, ids: &[String]) -> KeyMap {
        let lookups = ids.iter().map(|id| async move {
            self.load(category, id).await.map(|value| (id.clone(), value))
        });
        let found: KeyMap = join_all(lookups).await.into_iter().flatten().collect();
        debug!(%category, requested = ids.len(), found = found.len(), "keys get");
        found
    }

    async fn set(&self, batch: &KeyBatch) {
        self.apply_batch(batch).await;
    }
}
