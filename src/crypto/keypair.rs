//! Curve25519 key pairs and signed pre-keys.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::codec::tagged;

/// A Curve25519 key pair, stored with both halves as tagged buffers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(with = "tagged")]
    pub public: [u8; 32],
    #[serde(with = "tagged")]
    pub private: [u8; 32],
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut private = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut private);

        // Curve25519 clamping
        private[0] &= 248;
        private[31] &= 127;
        private[31] |= 64;

        Self::from_private_key(private)
    }

    /// Rebuild a key pair from its private half.
    pub fn from_private_key(private: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret);
        Self {
            public: *public.as_bytes(),
            private,
        }
    }

    /// Sign another key pair's public key (`0x05 || public`).
    pub fn sign(&self, key_to_sign: &KeyPair) -> [u8; 64] {
        use ed25519_dalek::{Signer, SigningKey};

        let mut message = [0u8; 33];
        message[0] = 0x05;
        message[1..].copy_from_slice(&key_to_sign.public);

        let signing_key = SigningKey::from_bytes(&self.private);
        signing_key.sign(&message).to_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Pre-key signed by the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedKeyPair {
    pub key_pair: KeyPair,
    #[serde(with = "tagged")]
    pub signature: [u8; 64],
    pub key_id: u32,
}

impl SignedKeyPair {
    pub fn generate(identity: &KeyPair, key_id: u32) -> Self {
        let key_pair = KeyPair::generate();
        let signature = identity.sign(&key_pair);
        Self {
            key_pair,
            signature,
            key_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert_ne!(kp.public, [0u8; 32]);
        assert_eq!(KeyPair::from_private_key(kp.private), kp);
    }

    #[test]
    fn test_debug_redacts_private_half() {
        let rendered = format!("{:?}", KeyPair::generate());
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_signed_key_pair_survives_codec() {
        let identity = KeyPair::generate();
        let signed = SignedKeyPair::generate(&identity, 1);
        let decoded: SignedKeyPair = codec::decode(&codec::encode(&signed).unwrap()).unwrap();
        assert_eq!(decoded, signed);
    }
}
