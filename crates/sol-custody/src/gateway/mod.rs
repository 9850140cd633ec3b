//! Port trait for the ledger node.
//!
//! This trait is the only way the custody service talks to the ledger.
//! [`RpcGateway`] implements it over JSON-RPC; tests substitute an
//! in-memory double.

mod rpc;

use async_trait::async_trait;
use chain_sol::{
    build_create_associated_token_account_idempotent, bytes_to_address, compile_transaction,
    derive_associated_token_address_with_program, sign_transaction, Keypair, SignedTransaction,
    SolError,
};
use thiserror::Error;

use crate::ledger::ConfirmedTransaction;

pub use rpc::{Commitment, RpcGateway};

/// Errors raised by a ledger gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    Decode(String),

    #[error("transaction {signature} failed on-ledger: {reason}")]
    TransactionError { signature: String, reason: String },

    #[error("blockhash expired before {signature} was confirmed")]
    BlockhashExpired { signature: String },

    #[error(transparent)]
    Chain(#[from] SolError),
}

impl GatewayError {
    /// Failures caused by the network or node state rather than by the
    /// request itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Rpc { .. } | GatewayError::BlockhashExpired { .. }
        )
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Account data present at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub lamports: u64,
    /// Owning program, Base58.
    pub owner: String,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// A recent blockhash and the block height after which it stops being
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

/// A signed transaction together with its validity window.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub signed: SignedTransaction,
    pub last_valid_block_height: u64,
}

impl PendingTransaction {
    /// Compile `instructions` for `payer` against `blockhash` and sign.
    pub fn build(
        instructions: &[chain_sol::SolInstruction],
        payer: &Keypair,
        blockhash: LatestBlockhash,
    ) -> Result<Self, SolError> {
        let message = compile_transaction(instructions, &payer.pubkey(), &blockhash.blockhash)?;
        Ok(Self {
            signed: sign_transaction(message, payer)?,
            last_valid_block_height: blockhash.last_valid_block_height,
        })
    }

    pub fn transaction_hash(&self) -> String {
        self.signed.transaction_hash()
    }
}

/// Everything the custody service needs from a ledger node.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Fetch a confirmed transaction by hash; `None` if the node has no
    /// record of it (yet).
    async fn get_parsed_transaction(&self, signature: &str) -> GatewayResult<Option<ConfirmedTransaction>>;

    /// Account data at `address`; `None` if no account exists there.
    async fn get_account_info(&self, address: &str) -> GatewayResult<Option<AccountInfo>>;

    /// Native balance in lamports.
    async fn get_balance(&self, address: &str) -> GatewayResult<u64>;

    /// Raw balance held by a token account.
    async fn get_token_account_balance(&self, address: &str) -> GatewayResult<u64>;

    async fn get_latest_blockhash(&self) -> GatewayResult<LatestBlockhash>;

    /// Submit a signed transaction and wait until the node reports it at the
    /// configured commitment. Returns the transaction hash.
    async fn send_and_confirm_transaction(&self, tx: &PendingTransaction) -> GatewayResult<String>;

    /// Return the associated token account of `owner` for `mint`, creating it
    /// (paid by `payer`) when it does not exist yet.
    async fn get_or_create_associated_token_account(
        &self,
        payer: &Keypair,
        mint: &[u8; 32],
        owner: &[u8; 32],
        token_program: &[u8; 32],
    ) -> GatewayResult<[u8; 32]> {
        let associated = derive_associated_token_address_with_program(owner, mint, token_program)?;
        if self
            .get_account_info(&bytes_to_address(&associated))
            .await?
            .is_some()
        {
            return Ok(associated);
        }

        let create = build_create_associated_token_account_idempotent(
            &payer.pubkey(),
            owner,
            mint,
            token_program,
        )?;
        let blockhash = self.get_latest_blockhash().await?;
        let pending = PendingTransaction::build(&[create], payer, blockhash)?;
        let signature = self.send_and_confirm_transaction(&pending).await?;
        tracing::info!(
            account = %bytes_to_address(&associated),
            owner = %bytes_to_address(owner),
            %signature,
            "created associated token account"
        );
        Ok(associated)
    }
}
