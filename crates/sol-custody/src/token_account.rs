//! Associated token account lookups and provisioning.
//!
//! A wallet can only receive a token once its associated token account for
//! that mint exists. Creation goes through the ledger and can be rejected
//! transiently (stale blockhash, congestion), so it is retried under a
//! [`RetryPolicy`] before giving up.

use std::sync::Arc;

use chain_sol::{
    address_to_bytes, bytes_to_address, derive_associated_token_address_with_program,
    is_native_mint, Keypair, TOKEN_PROGRAM_ID,
};

use crate::error::CustodyError;
use crate::gateway::LedgerGateway;
use crate::retry::RetryPolicy;
use crate::types::Token;

/// Looks up and provisions associated token accounts.
#[derive(Clone)]
pub struct TokenAccounts {
    gateway: Arc<dyn LedgerGateway>,
    retry: RetryPolicy,
}

impl TokenAccounts {
    pub fn new(gateway: Arc<dyn LedgerGateway>, retry: RetryPolicy) -> Self {
        Self { gateway, retry }
    }

    /// Whether `owner` has an associated account for `mint` under the
    /// classic token program. Existence is enough; contents are not checked.
    pub async fn account_exists(&self, mint: &str, owner: &str) -> Result<bool, CustodyError> {
        self.exists_at(&address_to_bytes(mint)?, &address_to_bytes(owner)?, &TOKEN_PROGRAM_ID)
            .await
    }

    /// Like [`Self::account_exists`], under the token's own program.
    pub async fn account_exists_for(&self, token: &Token, owner: &str) -> Result<bool, CustodyError> {
        self.exists_at(
            &address_to_bytes(&token.mint)?,
            &address_to_bytes(owner)?,
            &address_to_bytes(&token.program_id)?,
        )
        .await
    }

    async fn exists_at(
        &self,
        mint: &[u8; 32],
        owner: &[u8; 32],
        program: &[u8; 32],
    ) -> Result<bool, CustodyError> {
        let associated = derive_associated_token_address_with_program(owner, mint, program)?;
        let info = self
            .gateway
            .get_account_info(&bytes_to_address(&associated))
            .await?;
        Ok(info.is_some())
    }

    /// Make sure `owner` has an associated account for `token`, creating it
    /// with `payer` if needed. Returns the account address.
    ///
    /// Fails with [`CustodyError::ProvisioningFailed`] only after every
    /// attempt of the retry budget has failed.
    pub async fn ensure_associated_account(
        &self,
        token: &Token,
        owner: &str,
        payer: &Keypair,
    ) -> Result<[u8; 32], CustodyError> {
        let mint = address_to_bytes(&token.mint)?;
        let owner_key = address_to_bytes(owner)?;
        let program = address_to_bytes(&token.program_id)?;
        let max_attempts = self.retry.max_attempts.max(1);

        let gateway = &self.gateway;
        self.retry
            .run(
                |attempt| {
                    tracing::debug!(attempt, mint = %token.mint, owner, "provisioning token account");
                    gateway.get_or_create_associated_token_account(payer, &mint, &owner_key, &program)
                },
                |attempt, err| {
                    if attempt < max_attempts {
                        tracing::warn!(attempt, mint = %token.mint, owner, error = %err, "token account provisioning failed, retrying");
                    } else {
                        tracing::error!(attempt, mint = %token.mint, owner, error = %err, "token account provisioning exhausted retries");
                    }
                },
            )
            .await
            .map_err(|source| CustodyError::ProvisioningFailed {
                mint: token.mint.clone(),
                owner: owner.to_string(),
                attempts: max_attempts,
                source,
            })
    }

    /// Balance of `wallet` in the smallest unit of `mint`.
    ///
    /// No mint, or the native sentinel, reads the native balance. For tokens
    /// an unreadable or missing associated account counts as zero.
    pub async fn token_balance(&self, wallet: &str, mint: Option<&str>) -> Result<u64, CustodyError> {
        let mint = match mint {
            Some(mint) if !is_native_mint(mint) => mint,
            _ => return Ok(self.gateway.get_balance(wallet).await?),
        };

        let associated = chain_sol::derive_associated_token_address(
            &address_to_bytes(wallet)?,
            &address_to_bytes(mint)?,
        )?;
        match self
            .gateway
            .get_token_account_balance(&bytes_to_address(&associated))
            .await
        {
            Ok(amount) => Ok(amount),
            Err(err) => {
                tracing::debug!(wallet, mint, error = %err, "token balance unavailable, reporting zero");
                Ok(0)
            }
        }
    }
}
