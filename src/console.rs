//! Simulated messaging client over a line-oriented text stream.
//!
//! Each input line `<number>: <text>` arrives as a message from `<number>`.
//! `/drop`, `/logout` and `/replace` close the connection with a transient,
//! permanent or superseded reason; end of input ends the session. Replies
//! are printed to stdout.
//!
//! The first connection with unpaired credentials goes through a simulated
//! pairing: a QR payload is emitted, the configured number is linked, an
//! initial pre-key batch is uploaded through the key store and the
//! credentials are flagged as changed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::auth::{AuthCreds, Contact, KeyBatch, KeyCategory, SignalKey};
use crate::client::{
    AuthenticationState, ClientError, Connector, MessagingClient, OutgoingText, SignalKeyStore,
};
use crate::codec::Buffer;
use crate::crypto::KeyPair;
use crate::types::{
    ConnectionUpdate, DisconnectReason, Event, Message, MessageContent, MessageID, MessageInfo,
    JID,
};

/// Pre-keys uploaded right after pairing.
const INITIAL_PRE_KEYS: u32 = 5;
const DEVICE_ID: u16 = 1;

pub struct ConsoleConnector<R> {
    self_number: String,
    device_name: String,
    lines: Arc<Mutex<Lines<R>>>,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl ConsoleConnector<BufReader<Stdin>> {
    pub fn stdin(self_number: impl Into<String>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), self_number)
    }
}

impl<R> ConsoleConnector<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(input: R, self_number: impl Into<String>) -> Self {
        Self {
            self_number: self_number.into(),
            device_name: "wa-giveaway".into(),
            lines: Arc::new(Mutex::new(input.lines())),
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    async fn pair(&self, auth: &AuthenticationState, tx: &mpsc::Sender<Event>) {
        let payload = {
            let creds = auth.creds.read().await;
            qr_payload(&creds)
        };
        let _ = tx.send(Event::Connection(ConnectionUpdate::QrCode(payload))).await;

        let (first_id, batch) = {
            let mut creds = auth.creds.write().await;
            creds.me = Some(Contact {
                id: JID::user(self.self_number.clone())
                    .with_device(DEVICE_ID)
                    .to_string(),
                name: Some(self.device_name.clone()),
                lid: None,
            });
            creds.platform = Some("console".into());
            creds.registered = true;

            let first_id = creds.next_pre_key_id;
            let mut batch = KeyBatch::new();
            for id in first_id..first_id + INITIAL_PRE_KEYS {
                batch.put(id.to_string(), SignalKey::PreKey(KeyPair::generate()));
            }
            creds.next_pre_key_id = first_id + INITIAL_PRE_KEYS;
            creds.first_unuploaded_pre_key_id = creds.next_pre_key_id;
            (first_id, batch)
        };

        auth.keys.set(&batch).await;
        info!(number = %self.self_number, pre_keys = batch.len(), first_id, "device paired");
        let _ = tx.send(Event::CredsUpdate).await;
    }
}

#[async_trait]
impl<R> Connector for ConsoleConnector<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    type Client = ConsoleClient;

    async fn connect(
        &self,
        auth: AuthenticationState,
    ) -> Result<(Arc<ConsoleClient>, mpsc::Receiver<Event>), ClientError> {
        let (tx, rx) = mpsc::channel(64);
        let _ = tx.send(Event::Connection(ConnectionUpdate::Connecting)).await;

        let paired = auth.creds.read().await.is_paired();
        if !paired {
            self.pair(&auth, &tx).await;
        }

        let client = Arc::new(ConsoleClient {
            creds: auth.creds.clone(),
            connected: Arc::new(AtomicBool::new(true)),
        });
        let _ = tx.send(Event::Connection(ConnectionUpdate::Open)).await;

        let reader = Reader {
            lines: self.lines.clone(),
            seen: self.seen.clone(),
            keys: auth.keys.clone(),
            connected: client.connected.clone(),
            tx,
        };
        tokio::spawn(reader.run());

        Ok((client, rx))
    }
}

/// Reads input lines for one connection.
struct Reader<R> {
    lines: Arc<Mutex<Lines<R>>>,
    seen: Arc<Mutex<HashSet<String>>>,
    keys: Arc<dyn SignalKeyStore>,
    connected: Arc<AtomicBool>,
    tx: mpsc::Sender<Event>,
}

impl<R> Reader<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn run(self) {
        let mut lines = self.lines.lock().await;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("console input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "console read failed");
                    break;
                }
            };

            let event = match line.trim() {
                "" => continue,
                "/drop" => close(DisconnectReason::NetworkError("connection dropped".into())),
                "/logout" => close(DisconnectReason::LoggedOut),
                "/replace" => close(DisconnectReason::Replaced),
                line => match parse_line(line) {
                    Some((sender, text)) => {
                        self.ensure_session(&sender).await;
                        Event::MessagesUpsert(vec![inbound(sender, text)])
                    }
                    None => {
                        warn!(line, "expected `<number>: <text>`");
                        continue;
                    }
                },
            };

            let closing = matches!(event, Event::Connection(ConnectionUpdate::Close(_)));
            if closing {
                self.connected.store(false, Ordering::SeqCst);
            }
            if self.tx.send(event).await.is_err() || closing {
                break;
            }
        }
    }

    /// Store a session record the first time a sender is seen.
    async fn ensure_session(&self, sender: &JID) {
        let address = format!("{}.{}", sender.user, sender.device);
        if !self.seen.lock().await.insert(address.clone()) {
            return;
        }
        let existing = self.keys.get(KeyCategory::Session, &[address.clone()]).await;
        if existing.contains_key(&address) {
            return;
        }
        let record: [u8; 32] = rand::random();
        let mut batch = KeyBatch::new();
        batch.put(address.clone(), SignalKey::Session(Buffer::new(record.to_vec())));
        self.keys.set(&batch).await;
        debug!(%address, "session established");
    }
}

/// Client half handed to the bot; prints replies to stdout.
pub struct ConsoleClient {
    creds: Arc<RwLock<AuthCreds>>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl MessagingClient for ConsoleClient {
    async fn own_jid(&self) -> Option<JID> {
        let creds = self.creds.read().await;
        creds.me.as_ref().and_then(|me| me.id.parse().ok())
    }

    async fn send_message(
        &self,
        chat: &JID,
        message: OutgoingText,
    ) -> Result<MessageID, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        if self.own_jid().await.is_none() {
            return Err(ClientError::NotLoggedIn);
        }

        let id = format!("3EB0{:016X}", rand::random::<u64>());
        if message.mentions.is_empty() {
            println!("[{chat}] {}", message.text);
        } else {
            let mentions: Vec<String> = message.mentions.iter().map(JID::to_string).collect();
            println!("[{chat}] {} (mentions: {})", message.text, mentions.join(", "));
        }
        Ok(id)
    }
}

fn close(reason: DisconnectReason) -> Event {
    Event::Connection(ConnectionUpdate::Close(reason))
}

/// Split `<number>: <text>` into a sender address and the text.
fn parse_line(line: &str) -> Option<(JID, &str)> {
    let (number, text) = line.split_once(':')?;
    let number = number.trim();
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((JID::user(number), text.trim_start()))
}

fn inbound(sender: JID, text: &str) -> Message {
    Message {
        info: MessageInfo {
            id: format!("{:016X}", rand::random::<u64>()),
            chat: sender,
            participant: None,
            is_from_me: false,
            timestamp: chrono::Utc::now().timestamp(),
            push_name: None,
        },
        content: Some(MessageContent::Conversation(text.to_string())),
    }
}

/// Pairing payload: `ref,noisePublic,identityPublic,advSecret`.
fn qr_payload(creds: &AuthCreds) -> String {
    let reference = format!("{:X}", rand::random::<u64>());
    format!(
        "{},{},{},{}",
        reference,
        STANDARD.encode(creds.noise_key.public),
        STANDARD.encode(creds.signed_identity_key.public),
        STANDARD.encode(creds.adv_secret_key.as_bytes()),
    )
}
