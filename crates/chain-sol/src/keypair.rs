//! Ed25519 signing keypairs.
//!
//! Custodial wallets hand their secret over as the Base58 encoding of the
//! 64-byte `seed || public key` layout that the Solana CLI writes. The
//! decoded bytes are wiped as soon as the signing key has been built.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroize;

use crate::address::bytes_to_address;
use crate::error::SolError;

/// A Solana signing keypair. The secret half is zeroed on drop by
/// `ed25519-dalek`.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Decode a Base58 secret key.
    ///
    /// Accepts the 64-byte keypair layout (the trailing public key must match
    /// the seed) or a bare 32-byte seed.
    pub fn from_base58_secret(secret: &str) -> Result<Self, SolError> {
        let mut bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| SolError::InvalidSecretKey(format!("base58 decode failed: {e}")))?;

        let result = match bytes.len() {
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(&bytes);
                let key = SigningKey::from_keypair_bytes(&keypair).map_err(|_| {
                    SolError::InvalidSecretKey("public half does not match secret".into())
                });
                keypair.zeroize();
                key.map(|signing_key| Self { signing_key })
            }
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                let keypair = Self::from_seed(&seed);
                seed.zeroize();
                Ok(keypair)
            }
            n => Err(SolError::InvalidSecretKey(format!(
                "expected 64 or 32 bytes, got {n}"
            ))),
        };

        bytes.zeroize();
        result
    }

    /// The raw 32-byte public key.
    pub fn pubkey(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The public key as a Base58 address.
    pub fn address(&self) -> String {
        bytes_to_address(&self.pubkey())
    }

    /// Produce a detached Ed25519 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Base58 encoding of the 64-byte `seed || public key` layout.
    pub fn to_base58_secret(&self) -> String {
        let mut bytes = self.signing_key.to_keypair_bytes();
        let encoded = bs58::encode(&bytes).into_string();
        bytes.zeroize();
        encoded
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
