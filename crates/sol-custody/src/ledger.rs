//! Confirmed-transaction records as returned by `getTransaction` with
//! `jsonParsed` encoding.
//!
//! Only the fields the deposit parser reads are modelled strictly; parsed
//! instruction payloads stay as JSON because their shape depends on the
//! program and instruction type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The ledger's finalized record of an executed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedTransaction {
    #[serde(default)]
    pub slot: u64,
    /// Unix seconds; absent on some older or pruned records.
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionEnvelope,
}

impl ConfirmedTransaction {
    pub fn instructions(&self) -> &[ParsedInstruction] {
        &self.transaction.message.instructions
    }

    /// Block time in milliseconds. A missing or zero block time maps to 1 ms
    /// so downstream consumers never see a zero timestamp.
    pub fn timestamp_ms(&self) -> u64 {
        match self.block_time {
            Some(secs) if secs > 0 => (secs as u64).saturating_mul(1000),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    /// Non-null when the transaction executed but failed.
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub pre_token_balances: Vec<TokenBalance>,
    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,
}

/// A token account balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: u64,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

impl TokenBalance {
    /// Raw balance in the token's smallest unit.
    pub fn raw_amount(&self) -> Option<u64> {
        self.ui_token_amount.amount.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount: Option<f64>,
    #[serde(default)]
    pub ui_amount_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: ParsedMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    #[serde(default)]
    pub account_keys: Vec<ParsedAccountKey>,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
    #[serde(default)]
    pub recent_blockhash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAccountKey {
    pub pubkey: String,
    #[serde(default)]
    pub signer: bool,
    #[serde(default)]
    pub writable: bool,
}

/// One top-level instruction. Programs the node knows how to decode carry a
/// `parsed` payload of the form `{"type": ..., "info": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    pub program_id: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub parsed: Option<Value>,
}

impl ParsedInstruction {
    /// The `parsed.type` tag, e.g. `"transfer"` or `"transferChecked"`.
    pub fn parsed_type(&self) -> Option<&str> {
        self.parsed.as_ref()?.get("type")?.as_str()
    }

    /// The `parsed.info` object.
    pub fn info(&self) -> Option<&Map<String, Value>> {
        self.parsed.as_ref()?.get("info")?.as_object()
    }

    pub fn info_str(&self, key: &str) -> Option<&str> {
        self.info()?.get(key)?.as_str()
    }

    pub fn info_u64(&self, key: &str) -> Option<u64> {
        self.info()?.get(key).and_then(value_as_u64)
    }

    /// Raw token amount of a token-program transfer.
    ///
    /// `transferChecked` reports it under `tokenAmount.amount`, plain
    /// `transfer` under `amount`; both arrive as decimal strings.
    pub fn token_amount_raw(&self) -> Option<u64> {
        let info = self.info()?;
        info.get("tokenAmount")
            .and_then(|t| t.get("amount"))
            .or_else(|| info.get("amount"))
            .and_then(value_as_u64)
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
