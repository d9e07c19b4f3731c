//! Contract between the bot and the messaging client.
//!
//! The protocol engine lives behind these traits. It is handed an
//! [`AuthenticationState`] at construction, reads and writes key material
//! through [`SignalKeyStore`], raises [`Event`]s, and sends replies through
//! [`MessagingClient`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::auth::{AuthCreds, KeyBatch, KeyCategory, KeyMap};
use crate::types::{Event, MessageID, JID};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Key access the protocol engine uses for session key entries.
#[async_trait]
pub trait SignalKeyStore: Send + Sync {
    /// Look up `ids` in `category`. Ids with no stored entry are omitted.
    async fn get(&self, category: KeyCategory, ids: &[String]) -> KeyMap;

    /// Apply every write and delete in `batch`.
    async fn set(&self, batch: &KeyBatch);
}

/// State handed to the client constructor: credentials plus key access.
#[derive(Clone)]
pub struct AuthenticationState {
    pub creds: Arc<RwLock<AuthCreds>>,
    pub keys: Arc<dyn SignalKeyStore>,
}

/// Outbound text with the JIDs it mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingText {
    pub text: String,
    pub mentions: Vec<JID>,
}

impl OutgoingText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mentions: Vec::new(),
        }
    }

    pub fn mentioning(mut self, mentions: impl IntoIterator<Item = JID>) -> Self {
        self.mentions.extend(mentions);
        self
    }
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Address of the logged-in device, once paired.
    async fn own_jid(&self) -> Option<JID>;

    async fn send_message(&self, chat: &JID, message: OutgoingText)
        -> Result<MessageID, ClientError>;
}

/// Builds a connected client from persisted authentication state.
///
/// Each call is one connection attempt; the returned receiver yields that
/// connection's events until it closes.
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: MessagingClient + 'static;

    async fn connect(
        &self,
        auth: AuthenticationState,
    ) -> Result<(Arc<Self::Client>, mpsc::Receiver<Event>), ClientError>;
}
