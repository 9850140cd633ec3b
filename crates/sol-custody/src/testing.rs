//! In-memory ledger double shared by the unit tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chain_sol::{bytes_to_address, derive_associated_token_address_with_program, Keypair};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::gateway::{
    AccountInfo, GatewayError, GatewayResult, LatestBlockhash, LedgerGateway, PendingTransaction,
};
use crate::ledger::ConfirmedTransaction;

pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

pub fn usdc() -> crate::Token {
    crate::Token::new(USDC_MINT, 6, TOKEN_PROGRAM)
}

/// A deterministic keypair and its address.
pub fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

pub fn address(seed: u8) -> String {
    keypair(seed).address()
}

pub fn rpc_error(message: &str) -> GatewayError {
    GatewayError::Rpc {
        code: -32002,
        message: message.to_string(),
    }
}

#[derive(Default)]
struct State {
    transactions: HashMap<String, ConfirmedTransaction>,
    /// Lookups that must miss before a transaction becomes visible.
    hidden_lookups: u32,
    lookups: u32,
    accounts: HashSet<String>,
    balances: HashMap<String, u64>,
    token_balances: HashMap<String, u64>,
    account_lookups: u32,
    provision_failures: u32,
    provision_calls: u32,
    sent: Vec<PendingTransaction>,
    fail_send: bool,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<State>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(self, hash: &str, tx: ConfirmedTransaction) -> Self {
        self.state.lock().transactions.insert(hash.to_string(), tx);
        self
    }

    pub fn hide_lookups(self, misses: u32) -> Self {
        self.state.lock().hidden_lookups = misses;
        self
    }

    /// Register the associated token account of `owner` for `mint`.
    pub fn with_token_account(self, mint: &str, owner: &str, balance: u64) -> Self {
        let associated = associated_address(mint, owner, TOKEN_PROGRAM);
        {
            let mut state = self.state.lock();
            state.accounts.insert(associated.clone());
            state.token_balances.insert(associated, balance);
        }
        self
    }

    pub fn with_balance(self, address: &str, lamports: u64) -> Self {
        self.state.lock().balances.insert(address.to_string(), lamports);
        self
    }

    pub fn failing_provisioning(self, failures: u32) -> Self {
        self.state.lock().provision_failures = failures;
        self
    }

    pub fn failing_send(self) -> Self {
        self.state.lock().fail_send = true;
        self
    }

    pub fn lookups(&self) -> u32 {
        self.state.lock().lookups
    }

    pub fn account_lookups(&self) -> u32 {
        self.state.lock().account_lookups
    }

    pub fn provision_calls(&self) -> u32 {
        self.state.lock().provision_calls
    }

    pub fn sent(&self) -> Vec<PendingTransaction> {
        self.state.lock().sent.clone()
    }
}

pub fn associated_address(mint: &str, owner: &str, program: &str) -> String {
    let derived = derive_associated_token_address_with_program(
        &chain_sol::address_to_bytes(owner).unwrap(),
        &chain_sol::address_to_bytes(mint).unwrap(),
        &chain_sol::address_to_bytes(program).unwrap(),
    )
    .unwrap();
    bytes_to_address(&derived)
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn get_parsed_transaction(&self, signature: &str) -> GatewayResult<Option<ConfirmedTransaction>> {
        let mut state = self.state.lock();
        state.lookups += 1;
        if state.hidden_lookups > 0 {
            state.hidden_lookups -= 1;
            return Ok(None);
        }
        Ok(state.transactions.get(signature).cloned())
    }

    async fn get_account_info(&self, address: &str) -> GatewayResult<Option<AccountInfo>> {
        let mut state = self.state.lock();
        state.account_lookups += 1;
        Ok(state.accounts.contains(address).then(|| AccountInfo {
            lamports: 2_039_280,
            owner: TOKEN_PROGRAM.to_string(),
            data: vec![0; 165],
            executable: false,
        }))
    }

    async fn get_balance(&self, address: &str) -> GatewayResult<u64> {
        Ok(self.state.lock().balances.get(address).copied().unwrap_or(0))
    }

    async fn get_token_account_balance(&self, address: &str) -> GatewayResult<u64> {
        self.state
            .lock()
            .token_balances
            .get(address)
            .copied()
            .ok_or_else(|| rpc_error("could not find account"))
    }

    async fn get_latest_blockhash(&self) -> GatewayResult<LatestBlockhash> {
        Ok(LatestBlockhash {
            blockhash: [0x5A; 32],
            last_valid_block_height: 1_000,
        })
    }

    async fn send_and_confirm_transaction(&self, tx: &PendingTransaction) -> GatewayResult<String> {
        let mut state = self.state.lock();
        if state.fail_send {
            return Err(GatewayError::BlockhashExpired {
                signature: tx.transaction_hash(),
            });
        }
        state.sent.push(tx.clone());
        Ok(tx.transaction_hash())
    }

    async fn get_or_create_associated_token_account(
        &self,
        _payer: &Keypair,
        mint: &[u8; 32],
        owner: &[u8; 32],
        token_program: &[u8; 32],
    ) -> GatewayResult<[u8; 32]> {
        let mut state = self.state.lock();
        state.provision_calls += 1;
        if state.provision_failures > 0 {
            state.provision_failures -= 1;
            return Err(rpc_error("blockhash not found"));
        }
        let derived = derive_associated_token_address_with_program(owner, mint, token_program)?;
        state.accounts.insert(bytes_to_address(&derived));
        Ok(derived)
    }
}

// ---------------------------------------------------------------------------
// Confirmed-transaction fixtures
// ---------------------------------------------------------------------------

pub fn system_transfer(source: &str, destination: &str, lamports: u64) -> Value {
    json!({
        "program": "system",
        "programId": "11111111111111111111111111111111",
        "parsed": {
            "type": "transfer",
            "info": {"source": source, "destination": destination, "lamports": lamports}
        }
    })
}

pub fn token_transfer_checked(program_id: &str, amount: u64) -> Value {
    json!({
        "program": "spl-token",
        "programId": program_id,
        "parsed": {
            "type": "transferChecked",
            "info": {
                "tokenAmount": {"amount": amount.to_string(), "decimals": 6}
            }
        }
    })
}

/// A `transferChecked` that names its mint, as RPC nodes report it.
pub fn token_transfer_of_mint(program_id: &str, mint: &str, amount: u64) -> Value {
    json!({
        "program": "spl-token",
        "programId": program_id,
        "parsed": {
            "type": "transferChecked",
            "info": {
                "mint": mint,
                "tokenAmount": {"amount": amount.to_string(), "decimals": 6}
            }
        }
    })
}

pub fn token_balance(index: u64, mint: &str, owner: &str, amount: u64) -> Value {
    json!({
        "accountIndex": index,
        "mint": mint,
        "owner": owner,
        "programId": TOKEN_PROGRAM,
        "uiTokenAmount": {
            "amount": amount.to_string(),
            "decimals": 6,
            "uiAmount": amount as f64 / 1e6,
            "uiAmountString": (amount as f64 / 1e6).to_string()
        }
    })
}

/// Build a confirmed-transaction record from its parts.
pub fn confirmed(
    block_time: Option<i64>,
    instructions: Vec<Value>,
    balances: (Vec<u64>, Vec<u64>),
    token_balances: (Vec<Value>, Vec<Value>),
) -> ConfirmedTransaction {
    serde_json::from_value(json!({
        "slot": 1,
        "blockTime": block_time,
        "meta": {
            "err": null,
            "fee": 5000,
            "preBalances": balances.0,
            "postBalances": balances.1,
            "preTokenBalances": token_balances.0,
            "postTokenBalances": token_balances.1
        },
        "transaction": {
            "signatures": ["Sig"],
            "message": {"accountKeys": [], "instructions": instructions}
        }
    }))
    .unwrap()
}
