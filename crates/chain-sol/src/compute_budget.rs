//! Compute Budget program instructions.
//!
//! Only the unit-price instruction is needed: it attaches a priority fee,
//! paid per compute unit, so withdrawals keep landing when the cluster is
//! congested.

use crate::transaction::SolInstruction;

/// Compute Budget Program ID: `ComputeBudget111111111111111111111111111111`
pub const COMPUTE_BUDGET_PROGRAM_ID: [u8; 32] = [
    0x03, 0x06, 0x46, 0x6f, 0xe5, 0x21, 0x17, 0x32, 0xff, 0xec, 0xad, 0xba, 0x72, 0xc3,
    0x9b, 0xe7, 0xbc, 0x8c, 0xe5, 0xbb, 0xc5, 0xf7, 0x12, 0x6b, 0x2c, 0x43, 0x9b, 0x3a,
    0x40, 0x00, 0x00, 0x00,
];

/// `SetComputeUnitPrice` discriminator.
const SET_COMPUTE_UNIT_PRICE_IX: u8 = 3;

/// Build a `SetComputeUnitPrice` instruction.
///
/// Data: `[3]` followed by the price in micro-lamports per compute unit as
/// u64 LE. The instruction touches no accounts.
pub fn set_compute_unit_price(micro_lamports: u64) -> SolInstruction {
    let mut data = Vec::with_capacity(9);
    data.push(SET_COMPUTE_UNIT_PRICE_IX);
    data.extend_from_slice(&micro_lamports.to_le_bytes());

    SolInstruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: Vec::new(),
        data,
    }
}
