//! Domain types passed across the service boundary.

use std::fmt;

use chain_sol::{is_native_mint, NATIVE_MINT, SYSTEM_PROGRAM_ADDRESS};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

/// A fungible asset. Amounts for it are always in its smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Mint address, or [`NATIVE_MINT`] for the native coin.
    #[serde(rename = "mintId")]
    pub mint: String,
    pub decimals: u8,
    /// Owning token program (classic SPL or Token-2022).
    pub program_id: String,
}

impl Token {
    pub fn new(mint: impl Into<String>, decimals: u8, program_id: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            decimals,
            program_id: program_id.into(),
        }
    }

    /// The native coin, identified by the sentinel mint.
    pub fn native() -> Self {
        Self::new(NATIVE_MINT, 9, SYSTEM_PROGRAM_ADDRESS)
    }

    pub fn is_native(&self) -> bool {
        is_native_mint(&self.mint)
    }
}

/// One token leg of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: Token,
    pub amount: u64,
}

/// Everything sent to one destination in a withdrawal batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInstruction {
    pub to: String,
    pub tokens_amount: Vec<TokenAmount>,
}

impl TransferInstruction {
    pub fn new(to: impl Into<String>, tokens_amount: Vec<TokenAmount>) -> Self {
        Self {
            to: to.into(),
            tokens_amount,
        }
    }

    /// A single token leg to a single destination.
    pub fn single(to: impl Into<String>, token: Token, amount: u64) -> Self {
        Self::new(to, vec![TokenAmount { token, amount }])
    }
}

/// A custodial wallet: Base58 secret key plus its address.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    #[serde(deserialize_with = "deserialize_secret")]
    pub private_key: SecretString,
    pub public_key: String,
}

impl Wallet {
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            private_key: SecretString::new(private_key.into().into_boxed_str()),
            public_key: public_key.into(),
        }
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| SecretString::new(s.into_boxed_str()))
}

/// Operational fees charged for a withdrawal batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeeSchedule {
    /// Base fee per batch of up to five transfer units.
    pub withdraw: u64,
    /// Surcharge per recipient that still needs a token account.
    pub unavailable_token_account: u64,
}

/// A verified inbound transfer reconstructed from a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFact {
    /// Block time in milliseconds since the epoch; never zero.
    #[serde(rename = "date")]
    pub timestamp_ms: u64,
    /// Amount in the asset's smallest unit.
    pub amount: u64,
    pub from: String,
    pub to: String,
}

/// Result of a submitted and confirmed withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    #[serde(rename = "txHash")]
    pub transaction_hash: String,
}
