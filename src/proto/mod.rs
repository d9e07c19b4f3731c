//! Protobuf shapes the messaging client expects for stored key material.

mod json;
mod wa;

pub use json::{AppStateSyncKeyRecord, FingerprintRecord};
pub use wa::{AppStateSyncKeyData, AppStateSyncKeyFingerprint};
