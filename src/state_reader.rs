//! Read-only escrow state queries
//!
//! Thin query layer over the ledger connector. The command client uses it to
//! snapshot state for its optimistic precondition checks; UI callers use it
//! directly. Queries that find nothing return empty/absent results — only
//! [`EscrowStateReader::require_escrow`] turns absence into an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    EscrowResult,
    error::EscrowError,
    ledger::LedgerConnector,
    models::{DisputeResolution, DisputeVote, EscrowStatus, EscrowTransaction, VoteChoice},
};

/// Read-only view over ledger escrow state
#[derive(Clone)]
pub struct EscrowStateReader {
    ledger: Arc<dyn LedgerConnector>,
}

impl EscrowStateReader {
    /// Create a new reader over the given ledger connector
    pub fn new(ledger: Arc<dyn LedgerConnector>) -> Self {
        Self { ledger }
    }

    /// Fetch one escrow's full record, `None` if it does not exist
    pub async fn get_escrow(&self, escrow_id: u64) -> EscrowResult<Option<EscrowTransaction>> {
        self.ledger.get_escrow(escrow_id).await
    }

    /// Fetch one escrow's full record, failing when it does not exist
    pub async fn require_escrow(&self, escrow_id: u64) -> EscrowResult<EscrowTransaction> {
        self.ledger
            .get_escrow(escrow_id)
            .await?
            .ok_or(EscrowError::NotFound(escrow_id))
    }

    /// Ids of every escrow where `buyer` is the recorded buyer
    pub async fn escrows_by_buyer(&self, buyer: &str) -> EscrowResult<Vec<u64>> {
        self.ledger.escrows_by_buyer(buyer).await
    }

    /// Ids of every escrow where `seller` is the recorded seller
    pub async fn escrows_by_seller(&self, seller: &str) -> EscrowResult<Vec<u64>> {
        self.ledger.escrows_by_seller(seller).await
    }

    /// Ballots cast so far on an escrow's dispute
    pub async fn dispute_votes(&self, escrow_id: u64) -> EscrowResult<Vec<DisputeVote>> {
        self.ledger.dispute_votes(escrow_id).await
    }

    /// Aggregated dispute view for an escrow
    pub async fn dispute_summary(&self, escrow_id: u64) -> EscrowResult<DisputeResolution> {
        let escrow = self.require_escrow(escrow_id).await?;
        let votes = self.ledger.dispute_votes(escrow_id).await?;

        Ok(summarize_dispute(&escrow, votes))
    }

    /// Whether opening a dispute is currently legal, per the ledger's own
    /// window check
    pub async fn can_initiate_dispute(&self, escrow_id: u64) -> EscrowResult<bool> {
        self.ledger.can_initiate_dispute(escrow_id).await
    }

    /// Whether an expiry claim is currently legal, per the ledger
    pub async fn can_claim_expired_funds(&self, escrow_id: u64) -> EscrowResult<bool> {
        self.ledger.can_claim_expired_funds(escrow_id).await
    }

    /// Current arbitration fee
    pub async fn arbitration_fee(&self) -> EscrowResult<u64> {
        self.ledger.arbitration_fee().await
    }

    /// Total number of escrows ever created on the ledger
    pub async fn total_escrows(&self) -> EscrowResult<u64> {
        self.ledger.total_escrows().await
    }
}

/// Fold an escrow record and its ballots into the derived dispute view
///
/// The winner is reported only for resolved escrows with a strict ballot
/// majority; the actual threshold rule lives in the ledger and is not
/// second-guessed here.
fn summarize_dispute(escrow: &EscrowTransaction, votes: Vec<DisputeVote>) -> DisputeResolution {
    let buyer_votes = votes.iter().filter(|v| v.vote == VoteChoice::Buyer).count() as u32;
    let seller_votes = votes.iter().filter(|v| v.vote == VoteChoice::Seller).count() as u32;
    let resolved = escrow.status == EscrowStatus::Resolved;

    let winner = if resolved {
        if buyer_votes > seller_votes {
            Some(escrow.buyer.clone())
        } else if seller_votes > buyer_votes {
            Some(escrow.seller.clone())
        } else {
            None
        }
    } else {
        None
    };

    let resolved_at: Option<DateTime<Utc>> = if resolved {
        votes.iter().map(|v| v.timestamp).max()
    } else {
        None
    };

    DisputeResolution {
        escrow_id: escrow.escrow_id,
        winner,
        buyer_votes,
        seller_votes,
        votes,
        resolved,
        resolved_at,
    }
}
