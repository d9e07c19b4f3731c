//! The giveaway game: join with `@<name>`, draw with `!sortear [N]`.

mod commands;
mod controller;
mod participants;
mod permission;

pub use commands::{Command, CommandParser};
pub use controller::GiveawayController;
pub use participants::{DrawError, JoinOutcome, Participant, ParticipantPool};
pub use permission::{AdminAllowlist, DrawPermission};
