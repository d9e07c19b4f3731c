//! Session state adapter: credentials and session keys kept in a
//! key-value store.

mod creds;
mod keys;
mod state;

pub use creds::{
    AccountSettings, AuthCreds, Contact, MessageKeyRecord, ProcessedHistoryMessage,
    SignedDeviceIdentity,
};
pub use keys::{AppStateVersion, KeyBatch, KeyCategory, KeyMap, SignalKey, UnknownCategory, ValueMac};
pub use state::{AuthState, CredsOrigin, StoreKeyStore};
