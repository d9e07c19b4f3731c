//! WhatsApp JID (Jabber ID) addresses.
//!
//! Chat, sender and self addresses all travel as JIDs:
//! `user@server` for accounts and groups, `user:device@server` for a
//! specific linked device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Known JID servers.
pub mod servers {
    pub const DEFAULT_USER: &str = "s.whatsapp.net";
    pub const GROUP: &str = "g.us";
    pub const LEGACY_USER: &str = "c.us";
    pub const HIDDEN_USER: &str = "lid";
}

/// MessageID is the internal ID of a WhatsApp message.
pub type MessageID = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JID {
    pub user: String,
    pub device: u16,
    pub server: String,
}

impl JID {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device: 0,
            server: server.into(),
        }
    }

    /// Account JID on the default user server.
    pub fn user(number: impl Into<String>) -> Self {
        Self::new(number, servers::DEFAULT_USER)
    }

    pub fn with_device(mut self, device: u16) -> Self {
        self.device = device;
        self
    }

    /// The JID without its device component.
    pub fn to_non_ad(&self) -> Self {
        Self::new(self.user.clone(), self.server.clone())
    }

    pub fn is_group(&self) -> bool {
        self.server == servers::GROUP
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
    }
}

impl fmt::Display for JID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}", self.server)
        } else if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else {
            write!(f, "{}@{}", self.user, self.server)
        }
    }
}

/// Error type for JID parsing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to parse JID: {0}")]
pub struct ParseJIDError(pub String);

impl FromStr for JID {
    type Err = ParseJIDError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((user_part, server)) = s.split_once('@') else {
            return Ok(JID::new("", s));
        };
        if server.contains('@') {
            return Err(ParseJIDError(format!("unexpected `@` in {s:?}")));
        }

        let (user, device) = match user_part.split_once(':') {
            Some((user, device)) => {
                let device = device
                    .parse()
                    .map_err(|_| ParseJIDError(format!("bad device in {s:?}")))?;
                (user, device)
            }
            None => (user_part, 0),
        };
        // Agent suffixes (`user.0:1`) carry no meaning for addressing here.
        let user = user.split_once('.').map_or(user, |(user, _)| user);
        Ok(JID::new(user, server).with_device(device))
    }
}

impl Serialize for JID {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JID {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
