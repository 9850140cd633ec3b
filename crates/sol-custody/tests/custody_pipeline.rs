//! Withdraw-then-verify round trips against a simulated ledger.
//!
//! The simulated ledger executes the wire-level instructions it receives
//! (system transfers, associated account creation, `TransferChecked`) and
//! records a `jsonParsed`-shaped confirmed transaction for each submission,
//! so the deposit parser reads back exactly what the transfer builder sent.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chain_sol::{
    bytes_to_address, derive_associated_token_address, Keypair, ASSOCIATED_TOKEN_PROGRAM_ID,
    SYSTEM_PROGRAM_ADDRESS, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sol_custody::{
    AccountInfo, ConfirmedTransaction, CustodyConfig, CustodyError, GatewayError, GatewayResult,
    LatestBlockhash, LedgerGateway, PendingTransaction, SolanaCustody, Token, TokenAmount,
    TransferInstruction, Wallet,
};

const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
const BLOCK_TIME: i64 = 1_717_171_717;
const SIGNATURE_FEE: u64 = 5_000;

struct TokenAccount {
    owner: String,
    mint: String,
    amount: u64,
}

#[derive(Default)]
struct State {
    lamports: HashMap<String, u64>,
    token_accounts: HashMap<String, TokenAccount>,
    confirmed: HashMap<String, ConfirmedTransaction>,
    submissions: u32,
}

#[derive(Default)]
struct SimulatedLedger {
    state: Mutex<State>,
}

impl SimulatedLedger {
    fn fund(&self, address: &str, lamports: u64) {
        self.state.lock().lamports.insert(address.to_string(), lamports);
    }

    fn fund_token(&self, owner: &str, mint: &str, amount: u64) {
        let ata = associated(owner, mint);
        self.state.lock().token_accounts.insert(
            ata,
            TokenAccount {
                owner: owner.to_string(),
                mint: mint.to_string(),
                amount,
            },
        );
    }

    fn submissions(&self) -> u32 {
        self.state.lock().submissions
    }

    fn token_snapshot(state: &State, keys: &[String]) -> Vec<Value> {
        keys.iter()
            .enumerate()
            .filter_map(|(index, key)| {
                state.token_accounts.get(key).map(|account| {
                    json!({
                        "accountIndex": index,
                        "mint": account.mint,
                        "owner": account.owner,
                        "programId": TOKEN_PROGRAM,
                        "uiTokenAmount": {"amount": account.amount.to_string(), "decimals": 6}
                    })
                })
            })
            .collect()
    }

    fn execute(state: &mut State, tx: &PendingTransaction) -> ConfirmedTransaction {
        let message = &tx.signed.message;
        let keys: Vec<String> = message.account_keys.iter().map(bytes_to_address).collect();
        let lamports_of = |state: &State| -> Vec<u64> {
            keys.iter()
                .map(|k| state.lamports.get(k).copied().unwrap_or(0))
                .collect()
        };

        let pre_balances = lamports_of(&*state);
        let pre_tokens = Self::token_snapshot(state, &keys);
        let mut instructions = Vec::new();

        for ix in &message.compiled_instructions {
            let program = message.account_keys[ix.program_id_index as usize];
            let account = |i: usize| keys[ix.account_indices[i] as usize].clone();

            if program == SYSTEM_PROGRAM_ID {
                let lamports = u64::from_le_bytes(ix.data[4..12].try_into().unwrap());
                let (source, destination) = (account(0), account(1));
                *state.lamports.entry(source.clone()).or_default() -= lamports;
                *state.lamports.entry(destination.clone()).or_default() += lamports;
                instructions.push(json!({
                    "program": "system",
                    "programId": SYSTEM_PROGRAM_ADDRESS,
                    "parsed": {
                        "type": "transfer",
                        "info": {"source": source, "destination": destination, "lamports": lamports}
                    }
                }));
            } else if program == ASSOCIATED_TOKEN_PROGRAM_ID {
                let (ata, owner, mint) = (account(1), account(2), account(3));
                state.token_accounts.entry(ata.clone()).or_insert(TokenAccount {
                    owner: owner.clone(),
                    mint: mint.clone(),
                    amount: 0,
                });
                instructions.push(json!({
                    "program": "spl-associated-token-account",
                    "programId": bytes_to_address(&ASSOCIATED_TOKEN_PROGRAM_ID),
                    "parsed": {
                        "type": "createIdempotent",
                        "info": {"account": ata, "wallet": owner, "mint": mint}
                    }
                }));
            } else if program == TOKEN_PROGRAM_ID {
                let amount = u64::from_le_bytes(ix.data[1..9].try_into().unwrap());
                let (source, destination) = (account(0), account(2));
                state.token_accounts.get_mut(&source).unwrap().amount -= amount;
                state.token_accounts.get_mut(&destination).unwrap().amount += amount;
                instructions.push(json!({
                    "program": "spl-token",
                    "programId": TOKEN_PROGRAM,
                    "parsed": {
                        "type": "transferChecked",
                        "info": {
                            "source": source,
                            "destination": destination,
                            "tokenAmount": {"amount": amount.to_string(), "decimals": ix.data[9]}
                        }
                    }
                }));
            } else {
                instructions.push(json!({
                    "programId": bytes_to_address(&program),
                    "accounts": [],
                    "data": ""
                }));
            }
        }

        *state.lamports.entry(keys[0].clone()).or_default() -= SIGNATURE_FEE;

        serde_json::from_value(json!({
            "slot": 300_000_000u64,
            "blockTime": BLOCK_TIME,
            "meta": {
                "err": null,
                "fee": SIGNATURE_FEE,
                "preBalances": pre_balances,
                "postBalances": lamports_of(&*state),
                "preTokenBalances": pre_tokens,
                "postTokenBalances": Self::token_snapshot(state, &keys)
            },
            "transaction": {
                "signatures": [tx.transaction_hash()],
                "message": {"accountKeys": [], "instructions": instructions}
            }
        }))
        .unwrap()
    }
}

#[async_trait]
impl LedgerGateway for SimulatedLedger {
    async fn get_parsed_transaction(&self, signature: &str) -> GatewayResult<Option<ConfirmedTransaction>> {
        Ok(self.state.lock().confirmed.get(signature).cloned())
    }

    async fn get_account_info(&self, address: &str) -> GatewayResult<Option<AccountInfo>> {
        Ok(self.state.lock().token_accounts.get(address).map(|_| AccountInfo {
            lamports: 2_039_280,
            owner: TOKEN_PROGRAM.to_string(),
            data: vec![0; 165],
            executable: false,
        }))
    }

    async fn get_balance(&self, address: &str) -> GatewayResult<u64> {
        Ok(self.state.lock().lamports.get(address).copied().unwrap_or(0))
    }

    async fn get_token_account_balance(&self, address: &str) -> GatewayResult<u64> {
        self.state
            .lock()
            .token_accounts
            .get(address)
            .map(|account| account.amount)
            .ok_or_else(|| GatewayError::Rpc {
                code: -32602,
                message: "could not find account".into(),
            })
    }

    async fn get_latest_blockhash(&self) -> GatewayResult<LatestBlockhash> {
        Ok(LatestBlockhash {
            blockhash: [0x42; 32],
            last_valid_block_height: 5_000,
        })
    }

    async fn send_and_confirm_transaction(&self, tx: &PendingTransaction) -> GatewayResult<String> {
        let mut state = self.state.lock();
        let confirmed = Self::execute(&mut state, tx);
        let hash = tx.transaction_hash();
        state.confirmed.insert(hash.clone(), confirmed);
        state.submissions += 1;
        Ok(hash)
    }
}

fn associated(owner: &str, mint: &str) -> String {
    let ata = derive_associated_token_address(
        &chain_sol::address_to_bytes(owner).unwrap(),
        &chain_sol::address_to_bytes(mint).unwrap(),
    )
    .unwrap();
    bytes_to_address(&ata)
}

fn usdc() -> Token {
    Token::new(USDC, 6, TOKEN_PROGRAM)
}

fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

struct Fixture {
    ledger: Arc<SimulatedLedger>,
    custody: SolanaCustody,
    owner: String,
}

fn fixture() -> Fixture {
    let owner = keypair(1);
    let ledger = Arc::new(SimulatedLedger::default());
    ledger.fund(&owner.address(), 10_000_000_000);
    ledger.fund_token(&owner.address(), USDC, 1_000_000_000);

    let config = CustodyConfig::from_json_str(
        &json!({
            "rpcUrl": "http://127.0.0.1:8899",
            "ownerWallet": {"privateKey": owner.to_base58_secret(), "publicKey": owner.address()},
            "feeAmount": {"withdraw": 1_000, "unavailableTokenAccount": 250},
            "provisionRetry": {"maxAttempts": 3, "delayMs": 0},
            "fetchRetryDelayMs": 0
        })
        .to_string(),
    )
    .unwrap();

    Fixture {
        custody: SolanaCustody::with_gateway(ledger.clone(), config),
        owner: owner.address(),
        ledger,
    }
}

#[tokio::test]
async fn fee_quote_drops_once_recipient_accounts_exist() {
    let f = fixture();
    let recipients = vec![keypair(2).address(), keypair(3).address()];
    let tokens = [Token::native(), usdc()];

    // 4 units fit one batch; both recipients lack a USDC account.
    assert_eq!(
        f.custody.estimate_withdraw_fee(&recipients, &tokens).await.unwrap(),
        1_000 + 2 * 250
    );

    let batch: Vec<_> = recipients
        .iter()
        .map(|to| TransferInstruction::single(to, usdc(), 1))
        .collect();
    f.custody.transfer_tokens(&batch, None).await.unwrap();

    for recipient in &recipients {
        assert!(f
            .custody
            .wallet_has_associated_token_account(USDC, recipient)
            .await
            .unwrap());
    }
    assert_eq!(
        f.custody.estimate_withdraw_fee(&recipients, &tokens).await.unwrap(),
        1_000
    );
}

#[tokio::test]
async fn native_withdrawal_reads_back_as_deposit() {
    let f = fixture();
    let recipient = keypair(2).address();

    let receipt = f
        .custody
        .transfer_tokens(&[TransferInstruction::single(&recipient, Token::native(), 1_500_000)], None)
        .await
        .unwrap();
    assert_eq!(f.ledger.submissions(), 1);
    assert_eq!(
        f.custody.get_token_balance(&recipient, None).await.unwrap(),
        1_500_000
    );

    let fact = f
        .custody
        .parse_native_transfer(&receipt.transaction_hash, &recipient)
        .await
        .unwrap();
    assert_eq!(fact.amount, 1_500_000);
    assert_eq!(fact.to, recipient);
    assert_eq!(fact.from, f.owner.to_lowercase());
    assert_eq!(fact.timestamp_ms, BLOCK_TIME as u64 * 1000);
}

#[tokio::test]
async fn token_withdrawal_reads_back_as_deposit() {
    let f = fixture();
    let recipient = keypair(3).address();

    let receipt = f
        .custody
        .transfer_tokens(&[TransferInstruction::single(&recipient, usdc(), 2_500_000)], None)
        .await
        .unwrap();
    // One account creation, then the transfer itself.
    assert_eq!(f.ledger.submissions(), 2);
    assert_eq!(
        f.custody.get_token_balance(&recipient, Some(USDC)).await.unwrap(),
        2_500_000
    );

    let fact = f
        .custody
        .parse_token_transfer(&receipt.transaction_hash, &usdc(), &recipient)
        .await
        .unwrap();
    assert_eq!(fact.amount, 2_500_000);
    assert_eq!(fact.from, f.owner);
    assert_eq!(fact.to, recipient);
}

#[tokio::test]
async fn mixed_batch_lands_atomically_and_rejects_ambiguous_token_parse() {
    let f = fixture();
    let first = keypair(4).address();
    let second = keypair(5).address();

    let batch = vec![
        TransferInstruction::new(
            &first,
            vec![
                TokenAmount { token: Token::native(), amount: 700 },
                TokenAmount { token: usdc(), amount: 300 },
                TokenAmount { token: usdc(), amount: 0 },
            ],
        ),
        TransferInstruction::single(&second, usdc(), 900),
    ];
    let receipt = f.custody.transfer_tokens(&batch, None).await.unwrap();

    let native = f
        .custody
        .parse_native_transfer(&receipt.transaction_hash, &first)
        .await
        .unwrap();
    assert_eq!(native.amount, 700);

    let err = f
        .custody
        .parse_token_transfer(&receipt.transaction_hash, &usdc(), &first)
        .await
        .unwrap_err();
    match err {
        CustodyError::WrongDestination { found, .. } => {
            assert_eq!(found.len(), 2);
            assert!(found.contains(&first) && found.contains(&second));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn explicit_signer_pays_instead_of_owner() {
    let f = fixture();
    let hot = keypair(9);
    f.ledger.fund(&hot.address(), 1_000_000);
    let wallet = Wallet::new(hot.to_base58_secret(), hot.address());
    let recipient = keypair(2).address();

    let receipt = f
        .custody
        .transfer_tokens(&[TransferInstruction::single(&recipient, Token::native(), 10_000)], Some(&wallet))
        .await
        .unwrap();

    let fact = f
        .custody
        .parse_native_transfer(&receipt.transaction_hash, &recipient)
        .await
        .unwrap();
    assert_eq!(fact.from, hot.address().to_lowercase());
    assert_eq!(
        f.custody.get_token_balance(&hot.address(), None).await.unwrap(),
        1_000_000 - 10_000 - SIGNATURE_FEE
    );
}

#[tokio::test]
async fn unknown_hash_is_retryable_not_found() {
    let f = fixture();
    let err = f
        .custody
        .parse_native_transfer("1111111111111111111111111111111111111111111111111111111111111111", &f.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::TransactionNotFound(_)));
    assert!(err.is_retryable());
}

#[test]
fn signatures_are_checked_through_the_service() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let f = fixture();
    let signer = keypair(1);
    let message = "withdrawal approved";
    let signature = STANDARD.encode(signer.sign(message.as_bytes()));

    f.custody
        .validate_signature(message, &signer.address(), &signature)
        .unwrap();
    assert!(matches!(
        f.custody.validate_signature(message, &keypair(2).address(), &signature),
        Err(CustodyError::InvalidSignature)
    ));
}
