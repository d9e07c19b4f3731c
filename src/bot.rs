//! Event loop and reconnect supervisor.
//!
//! One connection at a time; its events are handled strictly in arrival
//! order. Transient disconnects and failed connection attempts are retried
//! with bounded exponential backoff. A logout or a session replaced
//! elsewhere stops the bot.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthState, CredsOrigin};
use crate::client::Connector;
use crate::config::BotConfig;
use crate::giveaway::GiveawayController;
use crate::store::GuardedStore;
use crate::types::{ConnectionUpdate, DisconnectClass, Event, Message};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("gave up after {0} consecutive failed connection attempts")]
    ReconnectExhausted(u32),
}

/// Why [`Bot::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The account unlinked this device; pairing again is required.
    LoggedOut,
    /// Another session took over.
    Replaced,
    /// The client stopped producing events.
    StreamEnded,
}

enum SessionEnd {
    Stop(Shutdown),
    Reconnect,
}

pub struct Bot<C: Connector> {
    config: BotConfig,
    connector: C,
    store: GuardedStore,
    auth: AuthState,
    giveaway: GiveawayController,
}

impl<C: Connector> Bot<C> {
    /// Load credentials and participants from `store`.
    pub async fn start(config: BotConfig, connector: C, store: GuardedStore) -> Self {
        let auth = AuthState::initialize(store.clone(), &config.keys).await;
        if auth.origin() == CredsOrigin::Fresh {
            info!("no stored session, the device will be paired on connect");
        }
        let giveaway = GiveawayController::from_config(store.clone(), &config);
        giveaway.load().await;

        Self {
            config,
            connector,
            store,
            auth,
            giveaway,
        }
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn giveaway(&self) -> &GiveawayController {
        &self.giveaway
    }

    /// Connect and handle events until a terminal disconnect.
    pub async fn run(&self) -> Result<Shutdown, BotError> {
        let policy = self.config.reconnect;
        let mut failures: u32 = 0;

        loop {
            match self.connector.connect(self.auth.state()).await {
                Ok((client, events)) => match self.drive(client, events, &mut failures).await {
                    SessionEnd::Stop(shutdown) => return Ok(shutdown),
                    SessionEnd::Reconnect => failures += 1,
                },
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, attempt = failures, "connection attempt failed");
                }
            }

            if failures >= policy.max_attempts {
                error!(failures, "giving up on reconnecting");
                return Err(BotError::ReconnectExhausted(failures));
            }
            let delay = policy.delay(failures);
            info!(?delay, attempt = failures, "reconnecting");
            tokio::time::sleep(delay).await;
        }
    }

    async fn drive(
        &self,
        client: Arc<C::Client>,
        mut events: mpsc::Receiver<Event>,
        failures: &mut u32,
    ) -> SessionEnd {
        while let Some(event) = events.recv().await {
            match event {
                Event::Connection(ConnectionUpdate::Connecting) => debug!("connecting"),
                Event::Connection(ConnectionUpdate::QrCode(payload)) => {
                    info!(%payload, "link this device by scanning the pairing code");
                }
                Event::Connection(ConnectionUpdate::Open) => {
                    *failures = 0;
                    info!("connection open");
                }
                Event::Connection(ConnectionUpdate::Close(reason)) => match reason.class() {
                    DisconnectClass::Permanent => {
                        error!(?reason, "logged out, run `reset-session` and pair again");
                        return SessionEnd::Stop(Shutdown::LoggedOut);
                    }
                    DisconnectClass::Superseded => {
                        warn!(?reason, "session replaced by another connection");
                        return SessionEnd::Stop(Shutdown::Replaced);
                    }
                    DisconnectClass::Transient => {
                        warn!(?reason, "connection closed");
                        return SessionEnd::Reconnect;
                    }
                },
                Event::CredsUpdate => {
                    if !self.auth.persist_credentials().await && self.store.is_degraded() {
                        warn!(
                            failures = self.store.consecutive_failures(),
                            "credentials are only held in memory while the store is degraded"
                        );
                    }
                }
                Event::MessagesUpsert(messages) => {
                    for message in &messages {
                        self.handle_message(client.as_ref(), message).await;
                    }
                }
            }
        }

        info!("event stream ended");
        SessionEnd::Stop(Shutdown::StreamEnded)
    }

    async fn handle_message(&self, client: &C::Client, message: &Message) {
        if message.content.is_none() || message.info.is_from_me {
            return;
        }
        if let Err(e) = self.giveaway.handle_message(client, message).await {
            error!(id = %message.info.id, error = %e, "failed to reply");
        }
    }
}
