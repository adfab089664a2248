//! Ledger connector interface
//!
//! The ledger is the authoritative system of record: every state-mutating
//! operation returns a [`TxHandle`] and becomes real only once
//! [`LedgerConnector::await_receipt`] yields its confirmation. Read-only
//! queries that legitimately find nothing return an empty/absent result
//! rather than erroring. Implementations: [`crate::gateway::GatewayConnector`]
//! for the HTTP gateway, [`crate::sim_ledger::SimLedger`] for tests and local
//! development.

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    EscrowResult,
    models::{DisputeVote, EscrowTransaction, TransactionReceipt, TxHandle, VoteChoice},
};

/// Interface to the external ledger and its wallet-signing service
///
/// `from` on the mutating calls is the identity the operation is authorized
/// as; actual signing happens behind the connector. Submissions are not
/// idempotent: resubmitting `submit_create_escrow` locks a second escrow, and
/// resubmitting a transition against an already-transitioned escrow is
/// rejected by the ledger.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    // --- state-mutating operations ---

    async fn submit_create_escrow(
        &self,
        from: &str,
        seller: &str,
        batch_id: &str,
        amount: u64,
        confirmation_period: Duration,
    ) -> EscrowResult<TxHandle>;

    async fn submit_confirm_delivery(&self, from: &str, escrow_id: u64) -> EscrowResult<TxHandle>;

    async fn submit_initiate_dispute(
        &self,
        from: &str,
        escrow_id: u64,
        evidence: &str,
    ) -> EscrowResult<TxHandle>;

    async fn submit_vote(
        &self,
        from: &str,
        escrow_id: u64,
        vote: VoteChoice,
    ) -> EscrowResult<TxHandle>;

    async fn submit_resolve_dispute(&self, from: &str, escrow_id: u64) -> EscrowResult<TxHandle>;

    async fn submit_claim_expired(&self, from: &str, escrow_id: u64) -> EscrowResult<TxHandle>;

    /// Block until the ledger has durably accepted or rejected the operation
    /// behind `handle`. No internal timeout: the caller's own cancellation
    /// policy applies, and retrying a non-idempotent submission on timeout
    /// risks duplicate effects.
    async fn await_receipt(&self, handle: &TxHandle) -> EscrowResult<TransactionReceipt>;

    // --- read-only queries ---

    async fn get_escrow(&self, escrow_id: u64) -> EscrowResult<Option<EscrowTransaction>>;

    async fn escrows_by_buyer(&self, buyer: &str) -> EscrowResult<Vec<u64>>;

    async fn escrows_by_seller(&self, seller: &str) -> EscrowResult<Vec<u64>>;

    async fn dispute_votes(&self, escrow_id: u64) -> EscrowResult<Vec<DisputeVote>>;

    /// Whether opening a dispute is currently legal; ledger time is
    /// authoritative for the window check
    async fn can_initiate_dispute(&self, escrow_id: u64) -> EscrowResult<bool>;

    /// Whether an expiry claim is currently legal (deadline passed, no
    /// confirmation or dispute occurred)
    async fn can_claim_expired_funds(&self, escrow_id: u64) -> EscrowResult<bool>;

    /// Current arbitration fee in the ledger's smallest currency unit
    async fn arbitration_fee(&self) -> EscrowResult<u64>;

    async fn total_escrows(&self) -> EscrowResult<u64>;
}
