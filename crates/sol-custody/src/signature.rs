//! Detached Ed25519 signature checks for caller-supplied messages.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::CustodyError;

/// Check that `signature_base64` is `public_key`'s signature over the UTF-8
/// bytes of `message`.
///
/// Every failure, whether malformed input or a signature that does not
/// verify, is reported as the same [`CustodyError::InvalidSignature`].
pub fn validate_signature(
    message: &str,
    public_key: &str,
    signature_base64: &str,
) -> Result<(), CustodyError> {
    verify(message.as_bytes(), public_key, signature_base64).map_err(|reason| {
        tracing::debug!(reason, "signature rejected");
        CustodyError::InvalidSignature
    })
}

fn verify(message: &[u8], public_key: &str, signature_base64: &str) -> Result<(), &'static str> {
    let signature = STANDARD
        .decode(signature_base64.trim())
        .map_err(|_| "signature is not base64")?;
    let signature = Signature::from_slice(&signature).map_err(|_| "signature is not 64 bytes")?;

    let key = chain_sol::address_to_bytes(public_key).map_err(|_| "public key is not an address")?;
    let key = VerifyingKey::from_bytes(&key).map_err(|_| "public key is not a curve point")?;

    key.verify_strict(message, &signature)
        .map_err(|_| "verification failed")
}
