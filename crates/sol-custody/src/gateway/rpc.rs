//! JSON-RPC 2.0 implementation of [`LedgerGateway`] over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AccountInfo, GatewayError, GatewayResult, LatestBlockhash, LedgerGateway, PendingTransaction};
use crate::ledger::{ConfirmedTransaction, UiTokenAmount};

/// How far along the cluster's voting a result must be before it is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    fn parse(status: &str) -> Option<Self> {
        match status {
            "processed" => Some(Commitment::Processed),
            "confirmed" => Some(Commitment::Confirmed),
            "finalized" => Some(Commitment::Finalized),
            _ => None,
        }
    }

    /// `getTransaction` does not serve `processed` records.
    fn for_transaction_lookup(self) -> Self {
        self.max(Commitment::Confirmed)
    }
}

/// A ledger gateway backed by a Solana JSON-RPC endpoint.
///
/// One `reqwest::Client` (and its connection pool) is reused for every call
/// made through this instance.
#[derive(Debug)]
pub struct RpcGateway {
    http: reqwest::Client,
    url: String,
    commitment: Commitment,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl RpcGateway {
    pub fn new(url: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            commitment,
            poll_interval: Duration::from_millis(500),
            next_id: AtomicU64::new(1),
        }
    }

    /// Pause between signature-status polls while confirming.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> GatewayResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::trace!(method, id, "rpc request");
        let envelope: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decode_envelope(envelope)
    }

    async fn confirm(&self, signature: &str, last_valid_block_height: u64) -> GatewayResult<()> {
        loop {
            let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
                .call("getSignatureStatuses", json!([[signature]]))
                .await?;

            if let Some(Some(status)) = statuses.value.first() {
                if let Some(err) = &status.err {
                    return Err(GatewayError::TransactionError {
                        signature: signature.to_string(),
                        reason: err.to_string(),
                    });
                }
                if status.reached(self.commitment) {
                    return Ok(());
                }
            }

            let height: u64 = self
                .call("getBlockHeight", json!([{ "commitment": self.commitment.as_str() }]))
                .await?;
            if height > last_valid_block_height {
                return Err(GatewayError::BlockhashExpired {
                    signature: signature.to_string(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    async fn get_parsed_transaction(&self, signature: &str) -> GatewayResult<Option<ConfirmedTransaction>> {
        self.call(
            "getTransaction",
            json!([
                signature,
                {
                    "encoding": "jsonParsed",
                    "commitment": self.commitment.for_transaction_lookup().as_str(),
                    "maxSupportedTransactionVersion": 0,
                }
            ]),
        )
        .await
    }

    async fn get_account_info(&self, address: &str) -> GatewayResult<Option<AccountInfo>> {
        let response: WithContext<Option<RpcAccount>> = self
            .call(
                "getAccountInfo",
                json!([address, { "encoding": "base64", "commitment": self.commitment.as_str() }]),
            )
            .await?;
        response.value.map(RpcAccount::into_account_info).transpose()
    }

    async fn get_balance(&self, address: &str) -> GatewayResult<u64> {
        let response: WithContext<u64> = self
            .call("getBalance", json!([address, { "commitment": self.commitment.as_str() }]))
            .await?;
        Ok(response.value)
    }

    async fn get_token_account_balance(&self, address: &str) -> GatewayResult<u64> {
        let response: WithContext<UiTokenAmount> = self
            .call(
                "getTokenAccountBalance",
                json!([address, { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        response
            .value
            .amount
            .parse()
            .map_err(|e| GatewayError::Decode(format!("token amount {:?}: {e}", response.value.amount)))
    }

    async fn get_latest_blockhash(&self) -> GatewayResult<LatestBlockhash> {
        let response: WithContext<RpcBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": self.commitment.as_str() }]))
            .await?;
        let blockhash = chain_sol::address_to_bytes(&response.value.blockhash)
            .map_err(|e| GatewayError::Decode(format!("blockhash: {e}")))?;
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    async fn send_and_confirm_transaction(&self, tx: &PendingTransaction) -> GatewayResult<String> {
        let encoded = STANDARD.encode(&tx.signed.wire);
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.commitment.as_str(),
                    }
                ]),
            )
            .await?;

        tracing::debug!(%signature, "transaction submitted, awaiting confirmation");
        self.confirm(&signature, tx.last_valid_block_height).await?;
        Ok(signature)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcAccount {
    lamports: u64,
    owner: String,
    /// `[payload, encoding]`
    data: (String, String),
    #[serde(default)]
    executable: bool,
}

impl RpcAccount {
    fn into_account_info(self) -> GatewayResult<AccountInfo> {
        let (payload, encoding) = self.data;
        if encoding != "base64" {
            return Err(GatewayError::Decode(format!(
                "unexpected account data encoding {encoding:?}"
            )));
        }
        let data = STANDARD
            .decode(payload)
            .map_err(|e| GatewayError::Decode(format!("account data: {e}")))?;
        Ok(AccountInfo {
            lamports: self.lamports,
            owner: self.owner,
            data,
            executable: self.executable,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

impl SignatureStatus {
    fn reached(&self, target: Commitment) -> bool {
        // Nodes omitting the status only report rooted signatures.
        let level = match self.confirmation_status.as_deref() {
            Some(status) => Commitment::parse(status),
            None => Some(Commitment::Finalized),
        };
        level.is_some_and(|level| level >= target)
    }
}

/// Split a JSON-RPC response into its result or its error.
fn decode_envelope<T: DeserializeOwned>(mut envelope: Value) -> GatewayResult<T> {
    if let Some(error) = envelope.get_mut("error").map(Value::take) {
        if !error.is_null() {
            let error: RpcErrorObject = serde_json::from_value(error)
                .map_err(|e| GatewayError::Decode(format!("error object: {e}")))?;
            return Err(GatewayError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
    }

    let result = envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| GatewayError::Decode("response has neither result nor error".into()))?;
    serde_json::from_value(result).map_err(|e| GatewayError::Decode(e.to_string()))
}
