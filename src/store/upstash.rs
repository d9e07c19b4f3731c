//! Upstash Redis store over its REST API.
//!
//! Commands are posted as JSON arrays (`["SET", key, value]`) to the database
//! URL with a bearer token; replies are `{"result": ...}` or `{"error": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::store::{KeyValueStore, StoreError, StoreResult};

pub const URL_ENV: &str = "UPSTASH_REDIS_REST_URL";
pub const TOKEN_ENV: &str = "UPSTASH_REDIS_REST_TOKEN";

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct UpstashStore {
    agent: ureq::Agent,
    url: String,
    token: String,
}

impl UpstashStore {
    pub fn new(url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let url: String = url.into();
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Build from `UPSTASH_REDIS_REST_URL` / `UPSTASH_REDIS_REST_TOKEN`.
    pub fn from_env(timeout: Duration) -> StoreResult<Self> {
        let url = std::env::var(URL_ENV)
            .map_err(|_| StoreError::Unavailable(format!("{URL_ENV} is not set")))?;
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| StoreError::Unavailable(format!("{TOKEN_ENV} is not set")))?;
        Ok(Self::new(url, token, timeout))
    }

    async fn command(&self, command: Value) -> StoreResult<Option<Value>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.command_blocking(&command))
            .await
            .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }

    fn command_blocking(&self, command: &Value) -> StoreResult<Option<Value>> {
        debug!(command = %command[0], "upstash request");
        let response = self
            .agent
            .post(&self.url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .send_json(command);

        let reply: Reply = match response {
            Ok(response) => response.into_json()?,
            Err(ureq::Error::Status(code, response)) => {
                return Err(match response.into_json::<Reply>() {
                    Ok(Reply {
                        error: Some(message),
                        ..
                    }) => StoreError::Backend(message),
                    _ => StoreError::Status(code),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(StoreError::Unavailable(transport.to_string()));
            }
        };

        match reply.error {
            Some(message) => Err(StoreError::Backend(message)),
            None => Ok(reply.result.filter(|v| !v.is_null())),
        }
    }
}

#[async_trait]
impl KeyValueStore for UpstashStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.command(json!(["GET", key])).await? {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(StoreError::Backend(format!(
                "unexpected GET reply for {key}: {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.command(json!(["SET", key, value])).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.command(json!(["DEL", key])).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "upstash"
    }
}
