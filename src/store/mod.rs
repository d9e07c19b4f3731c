//! Storage for durable bot state.
//!
//! [`KeyValueStore`] is the backend seam; [`GuardedStore`] wraps any backend
//! with timeouts and the swallow-and-log failure policy used by the session
//! adapter and the giveaway controller.

mod file;
mod guarded;
mod memory;
mod traits;
mod upstash;

pub use file::FileStore;
pub use guarded::{GuardPolicy, GuardedStore};
pub use memory::MemoryStore;
pub use traits::{KeyValueStore, StoreError, StoreResult};
pub use upstash::UpstashStore;

#[cfg(test)]
pub(crate) use guarded::testing;
