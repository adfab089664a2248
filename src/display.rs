//! Display formatting for escrow records
//!
//! Pure, side-effect-free conversion of ledger-native encodings into
//! human-usable units: fixed-point amounts to decimals, ledger timestamps to
//! calendar strings, and derived action flags. The flags mirror the ledger's
//! legality checks for UI convenience only — the command client re-validates
//! and the ledger remains the final arbiter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{EscrowStatus, EscrowTransaction};

/// Display-ready form of one escrow record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowDisplay {
    pub escrow_id: u64,
    pub buyer: String,
    pub seller: String,
    pub batch_id: String,
    /// Amount in whole currency units
    pub amount: Decimal,
    pub status: EscrowStatus,
    pub created_at: String,
    pub confirm_deadline: String,
    pub is_expired: bool,
    pub can_confirm: bool,
    pub can_dispute: bool,
    pub can_claim_expired: bool,
}

/// Formatter for ledger-native amounts and times
#[derive(Debug, Clone, Copy)]
pub struct DisplayFormatter {
    /// Fixed-point scale of the ledger's smallest currency unit
    pub decimals: u32,
}

impl Default for DisplayFormatter {
    fn default() -> Self {
        Self { decimals: 8 }
    }
}

impl DisplayFormatter {
    pub fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    /// Convert a smallest-unit amount into whole currency units
    pub fn amount_to_decimal(&self, amount: u64) -> Decimal {
        Decimal::from_i128_with_scale(amount as i128, self.decimals)
    }

    /// Render a ledger timestamp as a calendar string
    pub fn format_timestamp(&self, ts: DateTime<Utc>) -> String {
        ts.format("%Y-%m-%d %H:%M UTC").to_string()
    }

    /// Format an escrow against the current wall clock
    pub fn format_escrow(&self, escrow: &EscrowTransaction) -> EscrowDisplay {
        self.format_escrow_at(escrow, Utc::now())
    }

    /// Format an escrow against an explicit `now`
    ///
    /// The derived flags depend only on `status` and `now` versus
    /// `confirm_deadline`; there is no hidden state.
    pub fn format_escrow_at(&self, escrow: &EscrowTransaction, now: DateTime<Utc>) -> EscrowDisplay {
        let pending = escrow.status == EscrowStatus::Pending;
        let past_deadline = now > escrow.confirm_deadline;

        EscrowDisplay {
            escrow_id: escrow.escrow_id,
            buyer: escrow.buyer.clone(),
            seller: escrow.seller.clone(),
            batch_id: escrow.batch_id.clone(),
            amount: self.amount_to_decimal(escrow.amount),
            status: escrow.status,
            created_at: self.format_timestamp(escrow.created_at),
            confirm_deadline: self.format_timestamp(escrow.confirm_deadline),
            is_expired: pending && past_deadline,
            can_confirm: pending && !past_deadline,
            can_dispute: pending && !past_deadline,
            can_claim_expired: pending && past_deadline,
        }
    }
}
