use thiserror::Error;

/// Failures of the offline Solana primitives. None of these involve the
/// network; they mean the input itself is unusable.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Every bump seed hashed onto the curve.
    #[error("no program-derived address exists for these seeds")]
    NoProgramAddress,

    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("invalid transaction message: {0}")]
    InvalidMessage(String),

    #[error("wire encoding failed: {0}")]
    Encoding(String),
}
