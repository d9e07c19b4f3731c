//! WhatsApp protobuf message definitions for app-state sync keys.

use prost::Message;

/// Key material used to decrypt app-state (chat settings) patches.
#[derive(Clone, PartialEq, Message)]
pub struct AppStateSyncKeyData {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub key_data: Option<Vec<u8>>,
    #[prost(message, optional, tag = "2")]
    pub fingerprint: Option<AppStateSyncKeyFingerprint>,
    #[prost(int64, optional, tag = "3")]
    pub timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AppStateSyncKeyFingerprint {
    #[prost(uint32, optional, tag = "1")]
    pub raw_id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub current_index: Option<u32>,
    #[prost(uint32, repeated, packed = "true", tag = "3")]
    pub device_indexes: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_key_wire_round_trip() {
        let data = AppStateSyncKeyData {
            key_data: Some(vec![9; 32]),
            fingerprint: Some(AppStateSyncKeyFingerprint {
                raw_id: Some(7),
                current_index: Some(1),
                device_indexes: vec![0, 2],
            }),
            timestamp: Some(1_700_000_000_000),
        };
        let bytes = data.encode_to_vec();
        assert_eq!(AppStateSyncKeyData::decode(bytes.as_slice()).unwrap(), data);
    }
}
