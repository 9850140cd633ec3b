use chain_sol::SolError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced by the custody service.
///
/// Every variant is scoped to the call that produced it. Use
/// [`CustodyError::is_retryable`] to tell "try again later" apart from
/// "reject permanently".
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("no signer: pass a wallet or configure an owner wallet")]
    NoSigner,

    #[error("invalid wallet: {0}")]
    InvalidWallet(String),

    #[error("nothing to transfer: every amount in the batch is zero")]
    NothingToTransfer,

    #[error("failed to provision token account for mint {mint} owner {owner} after {attempts} attempts: {source}")]
    ProvisioningFailed {
        mint: String,
        owner: String,
        attempts: u32,
        #[source]
        source: GatewayError,
    },

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("wrong destination: expected {expected}, balances credited {found:?}")]
    WrongDestination { expected: String, found: Vec<String> },

    #[error("pre-transfer token balance missing for owner {0}")]
    PreBalanceMissing(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(#[from] SolError),

    #[error("ledger gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl CustodyError {
    /// Whether the same call may succeed if repeated later.
    ///
    /// Not-found and provisioning failures come from ledger lag or
    /// congestion. Wrong destinations, failed transfers and bad signatures
    /// are properties of the input and never change.
    pub fn is_retryable(&self) -> bool {
        match self {
            CustodyError::TransactionNotFound(_) | CustodyError::ProvisioningFailed { .. } => true,
            CustodyError::Gateway(e) => e.is_transient(),
            _ => false,
        }
    }
}
