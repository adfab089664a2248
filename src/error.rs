//! Error types for the escrow client
//!
//! Every operation on the ledger surfaces one of these kinds. Local checks
//! produce `Validation`/`Precondition` before any network round-trip; once an
//! operation has been submitted, the ledger's verdict (`LedgerRejection`) is
//! authoritative over anything checked locally.

use thiserror::Error;

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Bad local input, rejected before any ledger call
    #[error("Validation error: {0}")]
    Validation(String),

    /// The last-read state snapshot says the operation is currently illegal
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Referenced escrow does not exist
    #[error("Escrow {0} not found")]
    NotFound(u64),

    /// A confirmed receipt did not contain the expected event
    #[error("Receipt extraction error: {0}")]
    Extraction(String),

    /// The ledger refused or reverted the operation
    #[error("Ledger rejected operation: {0}")]
    LedgerRejection(String),

    /// External integration errors (gateway plumbing, fee oracle, signer)
    #[error("Integration error: {0}")]
    Integration(String),

    /// Transport failures talking to the ledger gateway
    #[error("Gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EscrowError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a precondition error
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create an extraction error
    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a ledger rejection error
    pub fn rejection<S: Into<String>>(msg: S) -> Self {
        Self::LedgerRejection(msg.into())
    }

    /// Create an integration error
    pub fn integration<S: Into<String>>(msg: S) -> Self {
        Self::Integration(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors produced locally, before anything reached the ledger
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Precondition(_) | Self::NotFound(_)
        )
    }
}
