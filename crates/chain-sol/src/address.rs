//! Solana address encoding and comparison.
//!
//! A Solana address is the Base58 encoding of a raw 32-byte Ed25519 public
//! key or program-derived address. Callers of the custody service pass
//! addresses around as text, so this module is the single place where text
//! is turned into bytes and back.

use crate::error::SolError;

/// Encode 32 bytes as a Solana address (Base58 string).
pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode a Solana address string to its 32-byte representation.
///
/// Returns an error if the address is not valid Base58 or does not decode
/// to exactly 32 bytes.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], SolError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| SolError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        SolError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
    })?;

    Ok(arr)
}

/// Validate a Solana address string.
pub fn validate_address(address: &str) -> Result<(), SolError> {
    address_to_bytes(address).map(|_| ())
}

/// Compare two addresses the way ledger records are reconciled: on their
/// textual form, ignoring ASCII case.
///
/// Base58 is case-sensitive, so this is looser than byte equality. Records
/// handed back by RPC nodes and addresses stored by callers are not always
/// normalised the same way, and every reconciliation path uses this one rule.
pub fn addresses_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
