//! Stored JSON shapes for protobuf-backed key entries.
//!
//! A store round-trip yields these plain records; `materialize` turns one into
//! the protobuf message the protocol engine works with.

use serde::{Deserialize, Deserializer, Serialize};

use super::wa::{AppStateSyncKeyData, AppStateSyncKeyFingerprint};
use crate::codec::Buffer;

/// Generic decoded form of an `app-state-sync-key` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateSyncKeyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_data: Option<Buffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<FingerprintRecord>,
    #[serde(
        default,
        deserialize_with = "long_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_index: Option<u32>,
    #[serde(default)]
    pub device_indexes: Vec<u32>,
}

impl AppStateSyncKeyRecord {
    /// Build the protobuf message from the decoded record.
    pub fn materialize(self) -> AppStateSyncKeyData {
        AppStateSyncKeyData {
            key_data: self.key_data.map(Buffer::into_inner),
            fingerprint: self.fingerprint.map(|fp| AppStateSyncKeyFingerprint {
                raw_id: fp.raw_id,
                current_index: fp.current_index,
                device_indexes: fp.device_indexes,
            }),
            timestamp: self.timestamp,
        }
    }
}

impl From<&AppStateSyncKeyData> for AppStateSyncKeyRecord {
    fn from(data: &AppStateSyncKeyData) -> Self {
        Self {
            key_data: data.key_data.clone().map(Buffer::from),
            fingerprint: data.fingerprint.as_ref().map(|fp| FingerprintRecord {
                raw_id: fp.raw_id,
                current_index: fp.current_index,
                device_indexes: fp.device_indexes.clone(),
            }),
            timestamp: data.timestamp,
        }
    }
}

// 64-bit timestamps written by other clients may arrive as decimal strings.
fn long_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Long {
        Number(i64),
        Text(String),
    }

    match Option::<Long>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Long::Number(n)) => Ok(Some(n)),
        Some(Long::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
