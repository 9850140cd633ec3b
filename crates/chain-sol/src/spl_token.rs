//! SPL Token operations for Solana.
//!
//! Implements the `TransferChecked` instruction, the idempotent
//! associated-token-account creation instruction, and associated token
//! account (ATA) address derivation without pulling in the `solana-sdk` or
//! the `spl-token` crates. Both the classic token program and Token-2022
//! are supported; the owning program is always passed in explicitly.

use sha2::{Digest, Sha256};

use crate::address::addresses_match;
use crate::error::SolError;
use crate::transaction::{SolAccountMeta, SolInstruction, SYSTEM_PROGRAM_ID};

// ---------------------------------------------------------------------------
// Well-known program IDs
// ---------------------------------------------------------------------------

/// SPL Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb,
    0x79, 0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85,
    0x7e, 0xff, 0x00, 0xa9,
];

/// Token-2022 Program ID: `TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb`
pub const TOKEN_2022_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xee, 0x75, 0x8f, 0xde, 0x18, 0x42, 0x5d, 0xbc, 0xe4, 0x6c,
    0xcd, 0xda, 0xb6, 0x1a, 0xfc, 0x4d, 0x83, 0xb9, 0x0d, 0x27, 0xfe, 0xbd, 0xf9, 0x28,
    0xd8, 0xa1, 0x8b, 0xfc,
];

/// Associated Token Account Program ID: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: [u8; 32] = [
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e,
    0x0d, 0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8,
    0xdb, 0xe9, 0xf8, 0x59,
];

/// Sentinel mint standing for the native coin (the wrapped-SOL mint).
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// `TransferChecked` instruction index in the token program.
const TRANSFER_CHECKED_IX: u8 = 12;

/// `CreateIdempotent` instruction index in the associated token program.
const CREATE_IDEMPOTENT_IX: u8 = 1;

/// Whether `mint` is the native-coin sentinel (compared case-insensitively).
pub fn is_native_mint(mint: &str) -> bool {
    addresses_match(mint, NATIVE_MINT)
}

// ---------------------------------------------------------------------------
// SPL Token TransferChecked
// ---------------------------------------------------------------------------

/// Accounts taking part in a `TransferChecked`.
#[derive(Debug, Clone, Copy)]
pub struct TransferCheckedAccounts<'a> {
    /// Sender's token account (writable).
    pub source: &'a [u8; 32],
    /// The token mint (read-only); lets the program check `decimals`.
    pub mint: &'a [u8; 32],
    /// Recipient's token account (writable).
    pub destination: &'a [u8; 32],
    /// Owner of `source` (signer).
    pub owner: &'a [u8; 32],
}

/// Build an SPL Token `TransferChecked` instruction.
///
/// The program rejects the transfer when `decimals` disagrees with the
/// mint, which protects against moving 10^n times the intended amount.
///
/// # Wire format
///
/// `[12]` + u64 LE amount + u8 decimals. Total data: 10 bytes.
pub fn build_transfer_checked(
    accounts: TransferCheckedAccounts<'_>,
    amount: u64,
    decimals: u8,
    token_program_id: &[u8; 32],
) -> Result<SolInstruction, SolError> {
    if amount == 0 {
        return Err(SolError::InvalidInstruction(
            "SPL transfer amount must be > 0".into(),
        ));
    }

    let mut data = Vec::with_capacity(10);
    data.push(TRANSFER_CHECKED_IX);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);

    Ok(SolInstruction {
        program_id: *token_program_id,
        accounts: vec![
            SolAccountMeta::writable(*accounts.source, false),
            SolAccountMeta::readonly(*accounts.mint, false),
            SolAccountMeta::writable(*accounts.destination, false),
            SolAccountMeta::readonly(*accounts.owner, true),
        ],
        data,
    })
}

// ---------------------------------------------------------------------------
// Associated Token Account creation
// ---------------------------------------------------------------------------

/// Build an associated-token-account `CreateIdempotent` instruction.
///
/// Succeeds on-ledger even when the account already exists, so a retried
/// submission never fails just because an earlier attempt landed.
pub fn build_create_associated_token_account_idempotent(
    payer: &[u8; 32],
    wallet: &[u8; 32],
    mint: &[u8; 32],
    token_program_id: &[u8; 32],
) -> Result<SolInstruction, SolError> {
    let associated = derive_associated_token_address_with_program(wallet, mint, token_program_id)?;

    Ok(SolInstruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*payer, true),
            SolAccountMeta::writable(associated, false),
            SolAccountMeta::readonly(*wallet, false),
            SolAccountMeta::readonly(*mint, false),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            SolAccountMeta::readonly(*token_program_id, false),
        ],
        data: vec![CREATE_IDEMPOTENT_IX],
    })
}

// ---------------------------------------------------------------------------
// Associated Token Account (PDA) derivation
// ---------------------------------------------------------------------------

/// Derive the classic-token-program associated token account for a wallet +
/// mint pair.
pub fn derive_associated_token_address(
    wallet: &[u8; 32],
    mint: &[u8; 32],
) -> Result<[u8; 32], SolError> {
    derive_associated_token_address_with_program(wallet, mint, &TOKEN_PROGRAM_ID)
}

/// Derive the associated token account for a wallet + mint pair owned by
/// `token_program_id`.
///
/// The ATA is a Program Derived Address (PDA) with seeds
/// `[wallet_address, token_program_id, mint_address]` under the Associated
/// Token Account program.
pub fn derive_associated_token_address_with_program(
    wallet: &[u8; 32],
    mint: &[u8; 32],
    token_program_id: &[u8; 32],
) -> Result<[u8; 32], SolError> {
    find_program_address(
        &[wallet.as_ref(), token_program_id.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Find a valid Program Derived Address (PDA) for the given seeds and program.
///
/// Iterates bump seeds from 255 down to 0 and returns the first
/// `SHA-256(seeds || bump || program_id || "ProgramDerivedAddress")` that is
/// NOT a valid Ed25519 point.
fn find_program_address(
    seeds: &[&[u8]],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), SolError> {
    (0u8..=255)
        .rev()
        .find_map(|bump| {
            try_create_program_address(seeds, &[bump], program_id).map(|address| (address, bump))
        })
        .ok_or(SolError::NoProgramAddress)
}

fn try_create_program_address(
    seeds: &[&[u8]],
    bump_seed: &[u8],
    program_id: &[u8; 32],
) -> Option<[u8; 32]> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(bump_seed);
    hasher.update(program_id);
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return None;
    }
    Some(hash)
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
