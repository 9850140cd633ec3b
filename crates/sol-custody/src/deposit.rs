//! Deposit verification from confirmed ledger records.
//!
//! Each parser fetches the confirmed transaction, allowing for propagation
//! lag. It then cross-checks the parsed instructions against the balance
//! snapshots before it reports a [`TransferFact`]. The instruction gives the
//! amount and the balance deltas prove the direction.

use std::sync::Arc;
use std::time::Duration;

use chain_sol::{addresses_match, SYSTEM_PROGRAM_ADDRESS};

use crate::error::CustodyError;
use crate::gateway::LedgerGateway;
use crate::ledger::{ConfirmedTransaction, ParsedInstruction, TokenBalance, TransactionMeta};
use crate::retry::RetryPolicy;
use crate::types::{Token, TransferFact};

/// Lookups made for a token deposit before giving up.
pub const DEFAULT_FETCH_RETRIES: u32 = 3;
/// Native deposits get a longer budget.
pub const NATIVE_FETCH_RETRIES: u32 = 6;
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_secs(3);

/// Reconstructs inbound transfers from confirmed transactions.
#[derive(Clone)]
pub struct DepositParser {
    gateway: Arc<dyn LedgerGateway>,
    fetch_delay: Duration,
}

impl DepositParser {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            gateway,
            fetch_delay: DEFAULT_FETCH_DELAY,
        }
    }

    /// Pause between lookups that miss.
    pub fn with_fetch_delay(mut self, fetch_delay: Duration) -> Self {
        self.fetch_delay = fetch_delay;
        self
    }

    /// Look `hash` up to `retries` times. `None` means the node never
    /// returned a record within that budget.
    pub async fn get_confirmed_transaction(
        &self,
        hash: &str,
        retries: u32,
    ) -> Result<Option<ConfirmedTransaction>, CustodyError> {
        let gateway = &self.gateway;
        let found = RetryPolicy::fixed(retries, self.fetch_delay)
            .poll(|attempt| {
                tracing::debug!(attempt, tx = hash, "fetching confirmed transaction");
                gateway.get_parsed_transaction(hash)
            })
            .await?;

        if found.is_none() {
            tracing::warn!(tx = hash, retries, "transaction not visible on the ledger");
        }
        Ok(found)
    }

    async fn fetch(&self, hash: &str, retries: u32) -> Result<ConfirmedTransaction, CustodyError> {
        self.get_confirmed_transaction(hash, retries)
            .await?
            .ok_or_else(|| CustodyError::TransactionNotFound(hash.to_string()))
    }

    /// Verify a native-coin deposit of `hash` into `expected_destination`.
    pub async fn parse_native_transfer(
        &self,
        hash: &str,
        expected_destination: &str,
    ) -> Result<TransferFact, CustodyError> {
        let tx = self.fetch(hash, NATIVE_FETCH_RETRIES).await?;
        let meta = executed_meta(&tx, hash)?;

        let transfer = tx
            .instructions()
            .iter()
            .find(|ix| {
                (ix.program.as_deref() == Some("system") || ix.program_id == SYSTEM_PROGRAM_ADDRESS)
                    && ix.parsed_type() == Some("transfer")
                    && ix
                        .info_str("destination")
                        .is_some_and(|dest| addresses_match(dest, expected_destination))
            })
            .ok_or_else(|| {
                CustodyError::InvalidTransaction(format!(
                    "{hash} has no system transfer to {expected_destination}"
                ))
            })?;

        // Both parties must show movement.
        let moved = |i: usize| match (meta.pre_balances.get(i), meta.post_balances.get(i)) {
            (Some(pre), Some(post)) => pre != post,
            _ => false,
        };
        if !(moved(0) && moved(1)) {
            return Err(CustodyError::TransactionFailed(format!(
                "{hash} left the transfer balances unchanged"
            )));
        }

        Ok(TransferFact {
            timestamp_ms: tx.timestamp_ms(),
            amount: transfer.info_u64("lamports").unwrap_or(0),
            from: transfer.info_str("source").unwrap_or_default().to_lowercase(),
            to: transfer.info_str("destination").unwrap_or_default().to_string(),
        })
    }

    /// Verify a deposit of `token` made by `hash` into `expected_destination`.
    ///
    /// Only balance entries for the token's mint are considered. Exactly one
    /// owner may be credited, and it must be the expected destination. The
    /// sender is reported only when exactly one owner was debited; otherwise
    /// `from` is empty.
    ///
    /// The amount comes from the first transfer of this mint under the
    /// token's program, and it must equal the destination's balance delta.
    pub async fn parse_token_transfer(
        &self,
        hash: &str,
        token: &Token,
        expected_destination: &str,
    ) -> Result<TransferFact, CustodyError> {
        let tx = self.fetch(hash, DEFAULT_FETCH_RETRIES).await?;
        let meta = executed_meta(&tx, hash)?;

        let deltas = owner_deltas(meta, &token.mint)?;
        let credited: Vec<&OwnerDelta> = deltas.iter().filter(|d| d.post > d.pre).collect();
        let debited: Vec<&OwnerDelta> = deltas.iter().filter(|d| d.post < d.pre).collect();

        let received = match credited.as_slice() {
            [only] if addresses_match(only.owner, expected_destination) => *only,
            _ => {
                return Err(CustodyError::WrongDestination {
                    expected: expected_destination.to_string(),
                    found: credited.iter().map(|d| d.owner.to_string()).collect(),
                })
            }
        };
        let from = match debited.as_slice() {
            [only] => only.owner.to_string(),
            _ => {
                tracing::debug!(tx = hash, debited = debited.len(), "no single sender for deposit");
                String::new()
            }
        };

        let transfer = tx
            .instructions()
            .iter()
            .find(|ix| is_transfer_of(ix, token))
            .ok_or_else(|| CustodyError::InvalidTransaction(format!("invalid transaction hash {hash}")))?;

        let delta = received.post - received.pre;
        let amount = transfer.token_amount_raw();
        if amount != Some(delta) {
            return Err(CustodyError::InvalidTransaction(format!(
                "{hash} moves {amount:?} of {} but the destination gained {delta}",
                token.mint
            )));
        }

        Ok(TransferFact {
            timestamp_ms: tx.timestamp_ms(),
            amount: delta,
            from,
            to: received.owner.to_string(),
        })
    }
}

/// A `transfer` or `transferChecked` under the token's program. Plain
/// `transfer` carries no mint, so only a present mint has to match.
fn is_transfer_of(ix: &ParsedInstruction, token: &Token) -> bool {
    addresses_match(&ix.program_id, &token.program_id)
        && matches!(ix.parsed_type(), Some("transfer" | "transferChecked"))
        && ix.info_str("mint").map_or(true, |mint| addresses_match(mint, &token.mint))
}

/// The transaction's metadata, provided it executed successfully.
fn executed_meta<'a>(tx: &'a ConfirmedTransaction, hash: &str) -> Result<&'a TransactionMeta, CustodyError> {
    let meta = tx
        .meta
        .as_ref()
        .ok_or_else(|| CustodyError::InvalidTransaction(format!("{hash} has no status metadata")))?;
    match &meta.err {
        Some(err) if !err.is_null() => Err(CustodyError::TransactionFailed(format!("{hash}: {err}"))),
        _ => Ok(meta),
    }
}

struct OwnerDelta<'a> {
    owner: &'a str,
    pre: u64,
    post: u64,
}

/// Pair every post-transfer balance of `mint` with the same owner's
/// pre-transfer balance. An owner seen only before the transfer had its
/// account closed and ends at zero.
fn owner_deltas<'a>(meta: &'a TransactionMeta, mint: &str) -> Result<Vec<OwnerDelta<'a>>, CustodyError> {
    let of_mint = |b: &&TokenBalance| addresses_match(&b.mint, mint);
    let owned = |b: &'a TokenBalance| b.owner.as_deref().map(|owner| (owner, b));

    let mut deltas = meta
        .post_token_balances
        .iter()
        .filter(of_mint)
        .filter_map(owned)
        .map(|(owner, post)| {
            let pre = meta
                .pre_token_balances
                .iter()
                .filter(of_mint)
                .find(|pre| pre.owner.as_deref() == Some(owner))
                .ok_or_else(|| CustodyError::PreBalanceMissing(owner.to_string()))?;
            Ok(OwnerDelta {
                owner,
                pre: pre.raw_amount().unwrap_or(0),
                post: post.raw_amount().unwrap_or(0),
            })
        })
        .collect::<Result<Vec<_>, CustodyError>>()?;

    let closed: Vec<OwnerDelta<'a>> = meta
        .pre_token_balances
        .iter()
        .filter(of_mint)
        .filter_map(owned)
        .filter(|(owner, _)| !deltas.iter().any(|d| d.owner == *owner))
        .map(|(owner, pre)| OwnerDelta {
            owner,
            pre: pre.raw_amount().unwrap_or(0),
            post: 0,
        })
        .collect();
    deltas.extend(closed);
    Ok(deltas)
}
