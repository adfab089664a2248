//! Chain escrow client core for the Agora batch marketplace
//!
//! This crate coordinates buyer-seller payments held in escrow on an
//! external, authoritative ledger:
//! - A state-machine-aware command client that validates preconditions
//!   locally, submits operations, and awaits ledger confirmation
//! - Read-only state queries and dispute aggregation
//! - Typed decoding of receipt events
//! - Fee/cost computation with an explicit degraded-estimate path
//! - Display formatting of ledger-native encodings
//!
//! Signing, broadcasting, and canonical state live behind the ledger
//! gateway; evidence is consumed as an opaque content hash.

pub mod config;
pub mod display;
pub mod error;
pub mod escrow_client;
pub mod fee_calculator;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod receipt_decoder;
pub mod sim_ledger;
pub mod state_reader;

use error::EscrowError;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
