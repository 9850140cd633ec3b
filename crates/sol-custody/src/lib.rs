//! Custodial value movement on Solana.
//!
//! [`SolanaCustody`] moves native SOL and SPL tokens out of a custodial
//! wallet, provisions recipients' associated token accounts on the way,
//! verifies inbound deposits from confirmed ledger records, and quotes the
//! operational fee for a withdrawal batch.
//!
//! All ledger access goes through the [`LedgerGateway`] port. The crate ships
//! [`RpcGateway`] for JSON-RPC nodes; the offline primitives (addresses,
//! instructions, signing) live in `chain-sol`.
//!
//! No state is kept between calls beyond the gateway's connection pool.

pub mod config;
pub mod deposit;
pub mod error;
pub mod fee;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod retry;
pub mod signature;
pub mod token_account;
pub mod transfer;
pub mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use config::CustodyConfig;
pub use deposit::DepositParser;
pub use error::CustodyError;
pub use fee::FeeEstimator;
pub use gateway::{
    AccountInfo, Commitment, GatewayError, GatewayResult, LatestBlockhash, LedgerGateway,
    PendingTransaction, RpcGateway,
};
pub use ledger::ConfirmedTransaction;
pub use logging::{init_logging, LogFormat};
pub use retry::RetryPolicy;
pub use signature::validate_signature;
pub use token_account::TokenAccounts;
pub use transfer::TransferBuilder;
pub use types::{FeeSchedule, Token, TokenAmount, TransferFact, TransferInstruction, TransferReceipt, Wallet};

/// The custody service: one gateway shared by every component.
#[derive(Clone)]
pub struct SolanaCustody {
    accounts: TokenAccounts,
    fees: FeeEstimator,
    transfers: TransferBuilder,
    deposits: DepositParser,
}

impl SolanaCustody {
    /// Connect to the JSON-RPC node named in `config`.
    pub fn from_config(config: CustodyConfig) -> Self {
        let gateway = RpcGateway::new(config.rpc_url.clone(), config.commitment)
            .with_poll_interval(config.confirm_poll);
        tracing::debug!(url = gateway.url(), commitment = config.commitment.as_str(), "custody service configured");
        Self::with_gateway(Arc::new(gateway), config)
    }

    /// Build the service over any gateway. `rpc_url`, `commitment` and
    /// `confirm_poll` in `config` only matter to [`Self::from_config`].
    pub fn with_gateway(gateway: Arc<dyn LedgerGateway>, config: CustodyConfig) -> Self {
        let accounts = TokenAccounts::new(gateway.clone(), config.provision_retry);
        let transfers = TransferBuilder::new(gateway.clone(), accounts.clone())
            .with_owner_wallet(config.owner_wallet.map(Arc::new))
            .with_priority_fee(config.priority_fee_micro_lamports);

        Self {
            fees: FeeEstimator::new(config.fee_schedule, accounts.clone()),
            deposits: DepositParser::new(gateway).with_fetch_delay(config.fetch_retry_delay),
            transfers,
            accounts,
        }
    }

    /// Send a withdrawal batch as one transaction. `signer` overrides the
    /// configured owner wallet.
    pub async fn transfer_tokens(
        &self,
        transfers: &[TransferInstruction],
        signer: Option<&Wallet>,
    ) -> Result<TransferReceipt, CustodyError> {
        self.transfers.transfer_tokens(transfers, signer).await
    }

    pub async fn estimate_withdraw_fee(
        &self,
        recipients: &[String],
        tokens: &[Token],
    ) -> Result<u64, CustodyError> {
        self.fees.estimate_withdraw_fee(recipients, tokens).await
    }

    pub async fn parse_native_transfer(
        &self,
        hash: &str,
        expected_destination: &str,
    ) -> Result<TransferFact, CustodyError> {
        self.deposits.parse_native_transfer(hash, expected_destination).await
    }

    pub async fn parse_token_transfer(
        &self,
        hash: &str,
        token: &Token,
        expected_destination: &str,
    ) -> Result<TransferFact, CustodyError> {
        self.deposits
            .parse_token_transfer(hash, token, expected_destination)
            .await
    }

    /// Native balance when `mint` is `None` or the native sentinel, otherwise
    /// the raw balance of the wallet's associated token account (zero if it
    /// cannot be read).
    pub async fn get_token_balance(&self, wallet: &str, mint: Option<&str>) -> Result<u64, CustodyError> {
        self.accounts.token_balance(wallet, mint).await
    }

    pub async fn wallet_has_associated_token_account(
        &self,
        mint: &str,
        wallet: &str,
    ) -> Result<bool, CustodyError> {
        self.accounts.account_exists(mint, wallet).await
    }

    pub fn validate_signature(
        &self,
        message: &str,
        public_key: &str,
        signature_base64: &str,
    ) -> Result<(), CustodyError> {
        signature::validate_signature(message, public_key, signature_base64)
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        self.fees.schedule()
    }

    pub fn deposits(&self) -> &DepositParser {
        &self.deposits
    }
}
