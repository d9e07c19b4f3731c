//! Key material generated for fresh credentials.
//!
//! Only key generation lives here; the Noise and Signal protocol machinery
//! belongs to the messaging client.

mod keypair;

pub use keypair::{KeyPair, SignedKeyPair};
