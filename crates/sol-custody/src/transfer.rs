//! Withdrawal transaction construction and submission.
//!
//! A batch of [`TransferInstruction`]s becomes one ledger transaction: a
//! system transfer per native leg, a `TransferChecked` per token leg (after
//! both associated accounts are provisioned), then one compute-unit price
//! instruction. Either the whole batch lands or none of it does.

use std::sync::Arc;

use chain_sol::{
    address_to_bytes, build_transfer_checked, set_compute_unit_price,
    system_transfer_instruction, Keypair, SolInstruction, TransferCheckedAccounts,
};
use secrecy::ExposeSecret;

use crate::error::CustodyError;
use crate::gateway::{LedgerGateway, PendingTransaction};
use crate::token_account::TokenAccounts;
use crate::types::{TransferInstruction, TransferReceipt, Wallet};

/// Priority fee attached to every withdrawal unless configured otherwise.
pub const DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS: u64 = 100_000;

/// Builds, signs and submits withdrawal transactions.
#[derive(Clone)]
pub struct TransferBuilder {
    gateway: Arc<dyn LedgerGateway>,
    accounts: TokenAccounts,
    owner_wallet: Option<Arc<Wallet>>,
    priority_fee_micro_lamports: u64,
}

impl TransferBuilder {
    pub fn new(gateway: Arc<dyn LedgerGateway>, accounts: TokenAccounts) -> Self {
        Self {
            gateway,
            accounts,
            owner_wallet: None,
            priority_fee_micro_lamports: DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS,
        }
    }

    /// Wallet used when a call does not bring its own.
    pub fn with_owner_wallet(mut self, wallet: Option<Arc<Wallet>>) -> Self {
        self.owner_wallet = wallet;
        self
    }

    pub fn with_priority_fee(mut self, micro_lamports: u64) -> Self {
        self.priority_fee_micro_lamports = micro_lamports;
        self
    }

    pub fn priority_fee(&self) -> u64 {
        self.priority_fee_micro_lamports
    }

    /// Send every positive leg of `transfers` in one transaction signed by
    /// `signer`, or by the owner wallet when `signer` is `None`.
    ///
    /// Blocks until the gateway reports the transaction confirmed. Any
    /// failure is logged once here and returned unchanged.
    pub async fn transfer_tokens(
        &self,
        transfers: &[TransferInstruction],
        signer: Option<&Wallet>,
    ) -> Result<TransferReceipt, CustodyError> {
        match self.submit(transfers, signer).await {
            Ok(receipt) => {
                tracing::info!(tx = %receipt.transaction_hash, destinations = transfers.len(), "withdrawal confirmed");
                Ok(receipt)
            }
            Err(err) => {
                tracing::error!(error = %err, destinations = transfers.len(), "withdrawal failed");
                Err(err)
            }
        }
    }

    async fn submit(
        &self,
        transfers: &[TransferInstruction],
        signer: Option<&Wallet>,
    ) -> Result<TransferReceipt, CustodyError> {
        let wallet = signer
            .or(self.owner_wallet.as_deref())
            .ok_or(CustodyError::NoSigner)?;
        let keypair = decode_wallet(wallet)?;

        let mut instructions = self.build_instructions(transfers, &keypair).await?;
        if instructions.is_empty() {
            return Err(CustodyError::NothingToTransfer);
        }
        instructions.push(set_compute_unit_price(self.priority_fee_micro_lamports));

        let blockhash = self.gateway.get_latest_blockhash().await?;
        let pending = PendingTransaction::build(&instructions, &keypair, blockhash)?;
        tracing::debug!(
            tx = %pending.transaction_hash(),
            instructions = instructions.len(),
            last_valid_block_height = blockhash.last_valid_block_height,
            "submitting withdrawal"
        );

        let transaction_hash = self.gateway.send_and_confirm_transaction(&pending).await?;
        Ok(TransferReceipt { transaction_hash })
    }

    /// The transfer instructions for `transfers`, without the priority fee.
    ///
    /// Zero amounts are skipped. Token legs provision the signer's and the
    /// recipient's associated accounts first.
    pub async fn build_instructions(
        &self,
        transfers: &[TransferInstruction],
        signer: &Keypair,
    ) -> Result<Vec<SolInstruction>, CustodyError> {
        let owner = signer.pubkey();
        let owner_address = signer.address();
        let mut instructions = Vec::new();

        for transfer in transfers {
            let to = address_to_bytes(&transfer.to)?;
            for leg in transfer.tokens_amount.iter().filter(|leg| leg.amount > 0) {
                if leg.token.is_native() {
                    instructions.push(system_transfer_instruction(&owner, &to, leg.amount));
                    continue;
                }

                let source = self
                    .accounts
                    .ensure_associated_account(&leg.token, &owner_address, signer)
                    .await?;
                let destination = self
                    .accounts
                    .ensure_associated_account(&leg.token, &transfer.to, signer)
                    .await?;
                let mint = address_to_bytes(&leg.token.mint)?;
                let program = address_to_bytes(&leg.token.program_id)?;

                instructions.push(build_transfer_checked(
                    TransferCheckedAccounts {
                        source: &source,
                        mint: &mint,
                        destination: &destination,
                        owner: &owner,
                    },
                    leg.amount,
                    leg.token.decimals,
                    &program,
                )?);
            }
        }

        Ok(instructions)
    }
}

/// Decode a wallet's secret and check it belongs to the stated address.
pub(crate) fn decode_wallet(wallet: &Wallet) -> Result<Keypair, CustodyError> {
    let keypair = Keypair::from_base58_secret(wallet.private_key.expose_secret())
        .map_err(|e| CustodyError::InvalidWallet(e.to_string()))?;
    if keypair.address() != wallet.public_key {
        return Err(CustodyError::InvalidWallet(format!(
            "secret key belongs to {}, not {}",
            keypair.address(),
            wallet.public_key
        )));
    }
    Ok(keypair)
}
