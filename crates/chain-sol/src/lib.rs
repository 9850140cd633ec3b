//! Offline Solana primitives for the custody service.
//!
//! This crate handles address encoding, keypair decoding, the instructions a
//! custodial withdrawal needs (system transfers, SPL `TransferChecked`,
//! associated-token-account creation, compute-unit pricing) and the legacy
//! transaction wire format, all without pulling in `solana-sdk`.
//!
//! Nothing here touches the network; `sol-custody` supplies the RPC side.

pub mod address;
pub mod compute_budget;
pub mod error;
pub mod keypair;
pub mod spl_token;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, addresses_match, bytes_to_address, validate_address};
pub use compute_budget::{set_compute_unit_price, COMPUTE_BUDGET_PROGRAM_ID};
pub use error::SolError;
pub use keypair::Keypair;
pub use spl_token::{
    build_create_associated_token_account_idempotent, build_transfer_checked,
    derive_associated_token_address, derive_associated_token_address_with_program,
    is_native_mint, TransferCheckedAccounts, ASSOCIATED_TOKEN_PROGRAM_ID, NATIVE_MINT,
    TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use transaction::{
    compile_transaction, encode_compact_u16, serialize_message, sign_transaction,
    system_transfer_instruction, CompiledInstruction, SignedTransaction, SolAccountMeta,
    SolInstruction, SolTransaction, SYSTEM_PROGRAM_ADDRESS, SYSTEM_PROGRAM_ID,
};
