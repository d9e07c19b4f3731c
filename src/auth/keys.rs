//! Session key categories and their stored shapes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::{self, Buffer, CodecError};
use crate::crypto::KeyPair;
use crate::proto::{AppStateSyncKeyData, AppStateSyncKeyRecord};

/// Kinds of session key entries the protocol keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCategory {
    PreKey,
    Session,
    SenderKey,
    SenderKeyMemory,
    AppStateSyncKey,
    AppStateSyncVersion,
}

impl KeyCategory {
    pub const ALL: [KeyCategory; 6] = [
        KeyCategory::PreKey,
        KeyCategory::Session,
        KeyCategory::SenderKey,
        KeyCategory::SenderKeyMemory,
        KeyCategory::AppStateSyncKey,
        KeyCategory::AppStateSyncVersion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KeyCategory::PreKey => "pre-key",
            KeyCategory::Session => "session",
            KeyCategory::SenderKey => "sender-key",
            KeyCategory::SenderKeyMemory => "sender-key-memory",
            KeyCategory::AppStateSyncKey => "app-state-sync-key",
            KeyCategory::AppStateSyncVersion => "app-state-sync-version",
        }
    }
}

impl fmt::Display for KeyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for KeyCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Value MAC kept per index in an app-state version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMac {
    pub value_mac: Buffer,
}

/// LT-hash state of one app-state collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateVersion {
    pub version: u64,
    pub hash: Buffer,
    #[serde(default)]
    pub index_value_map: BTreeMap<String, ValueMac>,
}

/// One session key entry, typed by its category.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalKey {
    PreKey(KeyPair),
    Session(Buffer),
    SenderKey(Buffer),
    /// Which devices already received our sender key, by JID.
    SenderKeyMemory(BTreeMap<String, bool>),
    AppStateSyncKey(AppStateSyncKeyData),
    AppStateSyncVersion(AppStateVersion),
}

impl SignalKey {
    pub fn category(&self) -> KeyCategory {
        match self {
            SignalKey::PreKey(_) => KeyCategory::PreKey,
            SignalKey::Session(_) => KeyCategory::Session,
            SignalKey::SenderKey(_) => KeyCategory::SenderKey,
            SignalKey::SenderKeyMemory(_) => KeyCategory::SenderKeyMemory,
            SignalKey::AppStateSyncKey(_) => KeyCategory::AppStateSyncKey,
            SignalKey::AppStateSyncVersion(_) => KeyCategory::AppStateSyncVersion,
        }
    }

    /// Encode the entry payload; the category lives in the store key.
    pub fn encode(&self) -> Result<String, CodecError> {
        match self {
            SignalKey::PreKey(pair) => codec::encode(pair),
            SignalKey::Session(record) | SignalKey::SenderKey(record) => codec::encode(record),
            SignalKey::SenderKeyMemory(memory) => codec::encode(memory),
            SignalKey::AppStateSyncKey(data) => codec::encode(&AppStateSyncKeyRecord::from(data)),
            SignalKey::AppStateSyncVersion(version) => codec::encode(version),
        }
    }

    /// Decode a stored payload for `category`.
    ///
    /// App-state sync keys come back as a plain record and are materialized
    /// into the protobuf shape. A record without key data is still returned,
    /// with `key_data` left empty.
    pub fn decode(category: KeyCategory, stored: &str) -> Result<Self, CodecError> {
        Ok(match category {
            KeyCategory::PreKey => SignalKey::PreKey(codec::decode(stored)?),
            KeyCategory::Session => SignalKey::Session(codec::decode(stored)?),
            KeyCategory::SenderKey => SignalKey::SenderKey(codec::decode(stored)?),
            KeyCategory::SenderKeyMemory => SignalKey::SenderKeyMemory(codec::decode(stored)?),
            KeyCategory::AppStateSyncKey => {
                let record: AppStateSyncKeyRecord = codec::decode(stored)?;
                SignalKey::AppStateSyncKey(record.materialize())
            }
            KeyCategory::AppStateSyncVersion => {
                SignalKey::AppStateSyncVersion(codec::decode(stored)?)
            }
        })
    }
}

/// Batch of key writes and deletes, grouped by category.
///
/// `None` marks the id for removal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyBatch {
    entries: BTreeMap<KeyCategory, BTreeMap<String, Option<SignalKey>>>,
}

impl KeyBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert `key` under `id` in its own category.
    pub fn put(&mut self, id: impl Into<String>, key: SignalKey) -> &mut Self {
        self.entries
            .entry(key.category())
            .or_default()
            .insert(id.into(), Some(key));
        self
    }

    /// Remove `id` from `category`.
    pub fn remove(&mut self, category: KeyCategory, id: impl Into<String>) -> &mut Self {
        self.entries
            .entry(category)
            .or_default()
            .insert(id.into(), None);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (category, id, value) triple in the batch.
    pub fn iter(&self) -> impl Iterator<Item = (KeyCategory, &str, Option<&SignalKey>)> {
        self.entries.iter().flat_map(|(category, ids)| {
            ids.iter()
                .map(move |(id, value)| (*category, id.as_str(), value.as_ref()))
        })
    }
}

/// Result of a key lookup; ids never written are simply missing.
pub type KeyMap = HashMap<String, SignalKey>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::AppStateSyncKeyFingerprint;

    #[test]
    fn test_category_names_round_trip() {
        for category in KeyCategory::ALL {
            assert_eq!(category.as_str().parse::<KeyCategory>().unwrap(), category);
        }
        assert!("identity-key".parse::<KeyCategory>().is_err());
    }

    #[test]
    fn test_sync_key_is_materialized() {
        let data = AppStateSyncKeyData {
            key_data: Some(vec![5; 32]),
            fingerprint: Some(AppStateSyncKeyFingerprint {
                raw_id: Some(1),
                current_index: Some(0),
                device_indexes: vec![0],
            }),
            timestamp: Some(10),
        };
        let stored = SignalKey::AppStateSyncKey(data.clone()).encode().unwrap();
        let decoded = SignalKey::decode(KeyCategory::AppStateSyncKey, &stored).unwrap();
        assert_eq!(decoded, SignalKey::AppStateSyncKey(data));
    }

    #[test]
    fn test_sync_key_without_data_is_kept() {
        let decoded = SignalKey::decode(KeyCategory::AppStateSyncKey, r#"{"timestamp":1}"#).unwrap();
        assert_eq!(
            decoded,
            SignalKey::AppStateSyncKey(AppStateSyncKeyData {
                key_data: None,
                fingerprint: None,
                timestamp: Some(1),
            })
        );
    }

    #[test]
    fn test_decode_with_wrong_category_fails() {
        let stored = SignalKey::Session(Buffer::new(vec![1, 2])).encode().unwrap();
        assert!(SignalKey::decode(KeyCategory::PreKey, &stored).is_err());
    }

    #[test]
    fn test_batch_groups_by_category() {
        let mut batch = KeyBatch::new();
        batch
            .put("1", SignalKey::PreKey(KeyPair::generate()))
            .put("5511.0", SignalKey::Session(Buffer::new(vec![1])))
            .remove(KeyCategory::PreKey, "2");

        assert_eq!(batch.len(), 3);
        let removed: Vec<_> = batch.iter().filter(|(_, _, v)| v.is_none()).collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, KeyCategory::PreKey);
        assert_eq!(removed[0].1, "2");
    }
}
