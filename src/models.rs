//! Core data models for the escrow client
//!
//! This module contains the escrow record and vote models mirrored from the
//! ledger, the status state machine, and the receipt/event types returned by
//! confirmed transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Escrow state machine enum
///
/// Transitions are requested through ledger operations and never set
/// directly; this type only mirrors what the ledger reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    /// Funds locked, awaiting buyer confirmation or a dispute
    Pending,
    /// Delivery confirmed, funds released to the seller
    Confirmed,
    /// Under arbitration
    Disputed,
    /// Dispute resolved, funds released to the winner
    Resolved,
    /// Funds returned to the buyer
    Refunded,
}

impl EscrowStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Resolved | Self::Refunded)
    }

    /// Check if this state allows the buyer to confirm delivery
    pub fn can_confirm(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if this state allows a party to open a dispute
    pub fn can_dispute(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if this state allows arbitrators to vote
    pub fn can_vote(&self) -> bool {
        matches!(self, Self::Disputed)
    }

    /// Check if this state allows an expiry claim once the deadline passed
    pub fn can_claim_expired(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// One escrow record as stored on the ledger
///
/// All fields except `status` and `disputed` are immutable once the escrow
/// has been created. Amounts are in the ledger's smallest currency unit and
/// exclude fees, which are accounted separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransaction {
    /// Ledger-assigned identifier, unique across all escrows
    pub escrow_id: u64,
    pub buyer: String,
    pub seller: String,
    /// Opaque reference to the traded batch
    pub batch_id: String,
    pub amount: u64,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    /// After this instant the confirmation window has lapsed and an expiry
    /// claim becomes legal
    pub confirm_deadline: DateTime<Utc>,
    /// Arbitrators selected for potential dispute resolution
    pub arbitrators: Vec<String>,
    pub disputed: bool,
}

impl EscrowTransaction {
    /// Check whether `address` is a party (buyer or seller) to this escrow
    pub fn is_party(&self, address: &str) -> bool {
        self.buyer == address || self.seller == address
    }

    /// Check whether `address` sits on this escrow's arbitration panel
    pub fn is_arbitrator(&self, address: &str) -> bool {
        self.arbitrators.iter().any(|a| a == address)
    }
}

/// Side an arbitrator rules in favor of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteChoice {
    Buyer,
    Seller,
}

/// One arbitrator's ballot
///
/// Ballots are append-only on the ledger; one ballot per arbitrator per
/// escrow is a ledger invariant this client surfaces but does not re-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeVote {
    pub arbitrator: String,
    pub vote: VoteChoice,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated view of a dispute, derived from the escrow record and its
/// ballots; never persisted by this client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub escrow_id: u64,
    /// Winning party's address once resolved
    pub winner: Option<String>,
    pub buyer_votes: u32,
    pub seller_votes: u32,
    pub votes: Vec<DisputeVote>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Handle for a submitted, not-yet-confirmed ledger operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxHandle {
    pub hash: String,
}

/// One event emitted by a confirmed transaction, in the ledger's native
/// encoding: an event name plus an uninterpreted payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLedgerEvent {
    pub name: String,
    pub data: serde_json::Value,
}

/// Durable confirmation record for an accepted operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub confirmed_at: DateTime<Utc>,
    pub events: Vec<RawLedgerEvent>,
}

/// Result of a confirmed `create_escrow` operation
#[derive(Debug, Clone)]
pub struct EscrowCreation {
    /// Identifier recovered from the receipt's creation event
    pub escrow_id: u64,
    pub tx_hash: String,
    pub receipt: TransactionReceipt,
}
