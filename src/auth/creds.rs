//! Long-lived identity credentials for one bot account.
//!
//! The record is generated once on first run and mutated by the messaging
//! client as pairing and re-keying happen. Binary material is stored as
//! tagged buffers through the codec.

use serde::{Deserialize, Serialize};

use crate::codec::Buffer;
use crate::crypto::{KeyPair, SignedKeyPair};

/// Contact identity of the paired account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Device JID of this session, e.g. `5511999990000:12@s.whatsapp.net`.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<String>,
}

/// Device identity signed by the primary phone during pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedDeviceIdentity {
    pub details: Buffer,
    pub account_signature_key: Buffer,
    pub account_signature: Buffer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_signature: Option<Buffer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKeyRecord {
    pub remote_jid: String,
    pub from_me: bool,
    pub id: String,
}

/// History sync message already applied by this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedHistoryMessage {
    pub key: MessageKeyRecord,
    pub message_timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSettings {
    pub unarchive_chats: bool,
}

/// The credentials record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCreds {
    /// Noise protocol static key
    pub noise_key: KeyPair,
    pub pairing_ephemeral_key_pair: KeyPair,
    /// Signal identity key
    pub signed_identity_key: KeyPair,
    pub signed_pre_key: SignedKeyPair,
    /// 14-bit registration id
    pub registration_id: u16,
    pub adv_secret_key: Buffer,
    #[serde(default)]
    pub processed_history_messages: Vec<ProcessedHistoryMessage>,
    pub next_pre_key_id: u32,
    pub first_unuploaded_pre_key_id: u32,
    #[serde(default)]
    pub account_sync_counter: u32,
    #[serde(default)]
    pub account_settings: AccountSettings,
    #[serde(default)]
    pub registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_prop_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_info: Option<Buffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<SignedDeviceIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl AuthCreds {
    /// Fresh, unpaired credentials with newly generated keys.
    pub fn init() -> Self {
        let identity = KeyPair::generate();
        let signed_pre_key = SignedKeyPair::generate(&identity, 1);
        let adv_secret: [u8; 32] = rand::random();

        Self {
            noise_key: KeyPair::generate(),
            pairing_ephemeral_key_pair: KeyPair::generate(),
            signed_identity_key: identity,
            signed_pre_key,
            registration_id: rand::random::<u16>() & 0x3FFF,
            adv_secret_key: Buffer::new(adv_secret.to_vec()),
            processed_history_messages: Vec::new(),
            next_pre_key_id: 1,
            first_unuploaded_pre_key_id: 1,
            account_sync_counter: 0,
            account_settings: AccountSettings::default(),
            registered: false,
            pairing_code: None,
            last_prop_hash: None,
            routing_info: None,
            me: None,
            account: None,
            platform: None,
        }
    }

    /// Whether a phone has linked this device.
    pub fn is_paired(&self) -> bool {
        self.me.is_some()
    }
}
