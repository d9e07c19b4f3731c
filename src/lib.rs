//! wa-giveaway: a WhatsApp giveaway bot with durable session state.
//!
//! ## Modules
//!
//! - `codec` - JSON codec that keeps binary buffers byte-exact
//! - `store` - key-value store backends and the failure-absorbing guard
//! - `auth` - credentials, session keys and the store-backed auth state
//! - `client` - the messaging client contract
//! - `console` - a simulated client driven by text input
//! - `giveaway` - join/draw commands and the participant pool
//! - `bot` - event loop and reconnect supervisor
//! - `config` - configuration management

pub mod auth;
pub mod bot;
pub mod client;
pub mod codec;
pub mod config;
pub mod console;
pub mod crypto;
pub mod giveaway;
pub mod proto;
pub mod store;
pub mod types;

pub use auth::{AuthCreds, AuthState, CredsOrigin, KeyBatch, KeyCategory, SignalKey};
pub use bot::{Bot, BotError, Shutdown};
pub use client::{AuthenticationState, ClientError, Connector, MessagingClient, SignalKeyStore};
pub use config::{BotConfig, ConfigError, StoreBackend, StoreKeys};
pub use console::ConsoleConnector;
pub use giveaway::GiveawayController;
pub use store::{GuardedStore, KeyValueStore, StoreError};
pub use types::{MessageID, JID};
