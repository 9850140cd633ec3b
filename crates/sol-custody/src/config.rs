//! Service configuration.
//!
//! Loaded from camelCase JSON:
//!
//! ```json
//! {
//!   "rpcUrl": "https://api.mainnet-beta.solana.com",
//!   "commitment": "confirmed",
//!   "ownerWallet": { "privateKey": "<base58>", "publicKey": "<address>" },
//!   "feeAmount": { "withdraw": 5000, "unavailableTokenAccount": 2039280 },
//!   "priorityFeeMicroLamports": 100000,
//!   "provisionRetry": { "maxAttempts": 10, "delayMs": 2000 },
//!   "fetchRetryDelayMs": 3000,
//!   "confirmPollMs": 500
//! }
//! ```
//!
//! Everything except `rpcUrl` is optional.

use std::time::Duration;

use serde::Deserialize;

use crate::deposit::DEFAULT_FETCH_DELAY;
use crate::error::CustodyError;
use crate::gateway::Commitment;
use crate::retry::{millis, RetryPolicy};
use crate::transfer::DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS;
use crate::types::{FeeSchedule, Wallet};

/// Token account creation attempts before provisioning is reported failed.
pub const DEFAULT_PROVISION_ATTEMPTS: u32 = 10;
pub const DEFAULT_PROVISION_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_CONFIRM_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodyConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub commitment: Commitment,
    /// Signs withdrawals that do not bring their own wallet.
    #[serde(default)]
    pub owner_wallet: Option<Wallet>,
    #[serde(default, rename = "feeAmount")]
    pub fee_schedule: FeeSchedule,
    #[serde(default = "default_priority_fee")]
    pub priority_fee_micro_lamports: u64,
    #[serde(default = "default_provision_retry")]
    pub provision_retry: RetryPolicy,
    #[serde(default = "default_fetch_delay", rename = "fetchRetryDelayMs", deserialize_with = "millis::deserialize")]
    pub fetch_retry_delay: Duration,
    #[serde(default = "default_confirm_poll", rename = "confirmPollMs", deserialize_with = "millis::deserialize")]
    pub confirm_poll: Duration,
}

impl CustodyConfig {
    /// Defaults against `rpc_url`, with no owner wallet.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            commitment: Commitment::default(),
            owner_wallet: None,
            fee_schedule: FeeSchedule::default(),
            priority_fee_micro_lamports: default_priority_fee(),
            provision_retry: default_provision_retry(),
            fetch_retry_delay: default_fetch_delay(),
            confirm_poll: default_confirm_poll(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CustodyError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CustodyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_owner_wallet(mut self, wallet: Wallet) -> Self {
        self.owner_wallet = Some(wallet);
        self
    }

    pub fn with_fee_schedule(mut self, fee_schedule: FeeSchedule) -> Self {
        self.fee_schedule = fee_schedule;
        self
    }

    fn validate(&self) -> Result<(), CustodyError> {
        if self.rpc_url.trim().is_empty() {
            return Err(CustodyError::Config("rpcUrl is empty".into()));
        }
        if let Some(wallet) = &self.owner_wallet {
            chain_sol::validate_address(&wallet.public_key)
                .map_err(|e| CustodyError::Config(format!("ownerWallet.publicKey: {e}")))?;
        }
        Ok(())
    }
}

fn default_priority_fee() -> u64 {
    DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS
}

fn default_provision_retry() -> RetryPolicy {
    RetryPolicy::fixed(DEFAULT_PROVISION_ATTEMPTS, DEFAULT_PROVISION_DELAY)
}

fn default_fetch_delay() -> Duration {
    DEFAULT_FETCH_DELAY
}

fn default_confirm_poll() -> Duration {
    DEFAULT_CONFIRM_POLL
}
