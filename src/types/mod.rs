//! Core types shared by the client seam and the bot: JIDs and events.

mod events;
mod jid;

pub use events::*;
pub use jid::*;
