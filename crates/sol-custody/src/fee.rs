//! Withdrawal fee estimation.

use crate::error::CustodyError;
use crate::token_account::TokenAccounts;
use crate::types::{FeeSchedule, Token};

/// Transfer units amortised by one base withdrawal fee.
const TRANSFERS_PER_BATCH: u64 = 5;

/// Quotes the operational fee owed for a withdrawal batch.
#[derive(Clone)]
pub struct FeeEstimator {
    schedule: FeeSchedule,
    accounts: TokenAccounts,
}

impl FeeEstimator {
    pub fn new(schedule: FeeSchedule, accounts: TokenAccounts) -> Self {
        Self { schedule, accounts }
    }

    pub fn schedule(&self) -> FeeSchedule {
        self.schedule
    }

    /// `withdraw * ceil(recipients * tokens / 5)`, plus the
    /// `unavailable_token_account` surcharge for every (recipient, token)
    /// pair whose recipient has no associated account yet. The native coin
    /// never needs one.
    pub async fn estimate_withdraw_fee(
        &self,
        recipients: &[String],
        tokens: &[Token],
    ) -> Result<u64, CustodyError> {
        let units = (recipients.len() as u64).saturating_mul(tokens.len() as u64);
        let batches = units.div_ceil(TRANSFERS_PER_BATCH);
        let mut fee = self.schedule.withdraw.saturating_mul(batches);

        for recipient in recipients {
            for token in tokens.iter().filter(|t| !t.is_native()) {
                if !self.accounts.account_exists_for(token, recipient).await? {
                    tracing::debug!(recipient = %recipient, mint = %token.mint, "recipient lacks token account");
                    fee = fee.saturating_add(self.schedule.unavailable_token_account);
                }
            }
        }

        Ok(fee)
    }
}
