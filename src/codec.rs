//! Binary-safe JSON codec for credentials and session keys.
//!
//! Binary fields are written as an explicitly tagged object,
//! `{"type":"Buffer","data":"<base64>"}`, so they can never be confused with
//! plain arrays or maps that merely look similar. Decoding a binary field
//! without that tag is an error, never a guess.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag value written alongside every encoded buffer.
pub const BUFFER_TAG: &str = "Buffer";

/// Error raised when a stored value cannot be encoded or decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a value into its storable textual form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Decode a storable textual form back into a value.
pub fn decode<T: DeserializeOwned>(stored: &str) -> Result<T, CodecError> {
    serde_json::from_str(stored).map_err(CodecError::Decode)
}

#[derive(Serialize)]
struct TaggedRef<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Tagged {
    #[serde(rename = "type")]
    kind: String,
    data: String,
}

fn serialize_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    TaggedRef {
        kind: BUFFER_TAG,
        data: STANDARD.encode(bytes),
    }
    .serialize(serializer)
}

fn deserialize_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let tagged = Tagged::deserialize(deserializer)?;
    if tagged.kind != BUFFER_TAG {
        return Err(de::Error::custom(format!(
            "expected buffer tag `{BUFFER_TAG}`, found `{}`",
            tagged.kind
        )));
    }
    STANDARD
        .decode(tagged.data.as_bytes())
        .map_err(|e| de::Error::custom(format!("malformed buffer data: {e}")))
}

/// Owned binary buffer that always round-trips through the tagged form.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Buffer(pub Vec<u8>);

impl Buffer {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({} bytes)", self.0.len())
    }
}

impl Serialize for Buffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_bytes(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Buffer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_bytes(deserializer).map(Buffer)
    }
}

/// `#[serde(with = "crate::codec::tagged")]` for fixed-size byte arrays.
///
/// Lengths are checked on decode; a 31-byte buffer will not silently land in
/// a 32-byte key.
pub mod tagged {
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;

    pub fn serialize<S, B>(bytes: &B, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        B: AsRef<[u8]>,
    {
        super::serialize_bytes(bytes.as_ref(), serializer)
    }

    pub fn deserialize<'de, D, B>(deserializer: D) -> Result<B, D::Error>
    where
        D: Deserializer<'de>,
        B: TryFrom<Vec<u8>>,
    {
        let raw = super::deserialize_bytes(deserializer)?;
        let len = raw.len();
        B::try_from(raw).map_err(|_| de::Error::custom(format!("unexpected buffer length {len}")))
    }
}
