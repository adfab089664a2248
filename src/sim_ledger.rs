//! Simulated ledger for tests and local development
//!
//! In-process implementation of [`LedgerConnector`] that executes the escrow
//! state machine against in-memory maps and a controllable clock. Submissions
//! confirm instantly and their receipts carry the same event set the real
//! ledger emits, so the decoding and orchestration paths are exercised end to
//! end. Party/status rules are enforced here as ledger rejections, which lets
//! tests reproduce the races where an optimistic local check goes stale.
//!
//! The production transport is [`crate::gateway::GatewayConnector`]; nothing
//! outside tests and local tooling should construct this type.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{
    EscrowResult,
    error::EscrowError,
    ledger::LedgerConnector,
    models::{
        DisputeVote, EscrowStatus, EscrowTransaction, RawLedgerEvent, TransactionReceipt,
        TxHandle, VoteChoice,
    },
};

/// What the ledger does with an expiry claim on an unconfirmed escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// Buyer inaction is treated as acceptance: funds go to the seller and
    /// the escrow terminates as `Confirmed`
    ReleaseToSeller,
    /// Funds return to the buyer and the escrow terminates as `Refunded`
    RefundToBuyer,
}

/// Configuration for the simulated ledger
#[derive(Debug, Clone)]
pub struct SimLedgerConfig {
    /// Panel assigned to every new escrow; the real selection algorithm is
    /// ledger-side and opaque to this client
    pub arbitrators: Vec<String>,
    /// Quoted arbitration fee in smallest currency units
    pub arbitration_fee: u64,
    pub expiry_outcome: ExpiryOutcome,
    /// When set, fee reads fail as if the oracle were unreachable
    pub fee_oracle_down: bool,
}

impl Default for SimLedgerConfig {
    fn default() -> Self {
        Self {
            arbitrators: vec![
                "arb-alpha".to_string(),
                "arb-beta".to_string(),
                "arb-gamma".to_string(),
            ],
            arbitration_fee: 1_500_000,
            expiry_outcome: ExpiryOutcome::ReleaseToSeller,
            fee_oracle_down: false,
        }
    }
}

/// In-memory ledger executing the escrow state machine
pub struct SimLedger {
    config: RwLock<SimLedgerConfig>,
    escrows: RwLock<HashMap<u64, EscrowTransaction>>,
    votes: RwLock<HashMap<u64, Vec<DisputeVote>>>,
    receipts: RwLock<HashMap<String, TransactionReceipt>>,
    next_id: RwLock<u64>,
    clock: RwLock<DateTime<Utc>>,
}

impl SimLedger {
    /// Create a simulated ledger with default configuration
    pub fn new() -> Self {
        Self::with_config(SimLedgerConfig::default())
    }

    /// Create a simulated ledger with explicit configuration
    pub fn with_config(config: SimLedgerConfig) -> Self {
        Self {
            config: RwLock::new(config),
            escrows: RwLock::new(HashMap::new()),
            votes: RwLock::new(HashMap::new()),
            receipts: RwLock::new(HashMap::new()),
            next_id: RwLock::new(1),
            clock: RwLock::new(Utc::now()),
        }
    }

    /// Current ledger time
    pub async fn now(&self) -> DateTime<Utc> {
        *self.clock.read().await
    }

    /// Move ledger time forward
    pub async fn advance_time(&self, by: Duration) {
        let mut clock = self.clock.write().await;
        *clock = *clock + by;
        info!("Sim ledger clock advanced to {}", *clock);
    }

    /// Toggle the simulated fee oracle outage
    pub async fn set_fee_oracle_down(&self, down: bool) {
        self.config.write().await.fee_oracle_down = down;
    }

    /// Switch what an expiry claim does with the locked funds
    pub async fn set_expiry_outcome(&self, outcome: ExpiryOutcome) {
        self.config.write().await.expiry_outcome = outcome;
    }

    async fn record_receipt(&self, events: Vec<RawLedgerEvent>) -> TxHandle {
        let hash = format!("0x{}", Uuid::new_v4().simple());
        let receipt = TransactionReceipt {
            tx_hash: hash.clone(),
            confirmed_at: self.now().await,
            events,
        };
        self.receipts.write().await.insert(hash.clone(), receipt);

        TxHandle { hash }
    }

    async fn escrow_or_reject(&self, escrow_id: u64) -> EscrowResult<EscrowTransaction> {
        self.escrows
            .read()
            .await
            .get(&escrow_id)
            .cloned()
            .ok_or_else(|| EscrowError::rejection(format!("unknown escrow {}", escrow_id)))
    }
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerConnector for SimLedger {
    async fn submit_create_escrow(
        &self,
        from: &str,
        seller: &str,
        batch_id: &str,
        amount: u64,
        confirmation_period: Duration,
    ) -> EscrowResult<TxHandle> {
        if amount == 0 {
            return Err(EscrowError::rejection("amount must be positive"));
        }
        if seller.trim().is_empty() || batch_id.trim().is_empty() {
            return Err(EscrowError::rejection("seller and batch id are required"));
        }
        if confirmation_period <= Duration::zero() {
            return Err(EscrowError::rejection("confirmation period must be positive"));
        }

        let (arbitrators, fee) = {
            let config = self.config.read().await;
            (config.arbitrators.clone(), config.arbitration_fee)
        };

        let escrow_id = {
            let mut next = self.next_id.write().await;
            let id = *next;
            *next += 1;
            id
        };

        let now = self.now().await;
        let escrow = EscrowTransaction {
            escrow_id,
            buyer: from.to_string(),
            seller: seller.to_string(),
            batch_id: batch_id.to_string(),
            amount,
            status: EscrowStatus::Pending,
            created_at: now,
            confirm_deadline: now + confirmation_period,
            arbitrators: arbitrators.clone(),
            disputed: false,
        };
        self.escrows.write().await.insert(escrow_id, escrow);

        let events = vec![
            RawLedgerEvent {
                name: "EscrowCreated".to_string(),
                data: json!({
                    "escrowId": escrow_id,
                    "buyer": from,
                    "seller": seller,
                    "batchId": batch_id,
                    "amount": amount,
                }),
            },
            RawLedgerEvent {
                name: "ArbitrationFeePaid".to_string(),
                data: json!({
                    "escrowId": escrow_id,
                    "feeAmount": fee,
                    "arbitrators": arbitrators,
                }),
            },
        ];

        Ok(self.record_receipt(events).await)
    }

    async fn submit_confirm_delivery(&self, from: &str, escrow_id: u64) -> EscrowResult<TxHandle> {
        let escrow = self.escrow_or_reject(escrow_id).await?;

        if escrow.buyer != from {
            return Err(EscrowError::rejection("caller is not the recorded buyer"));
        }
        if escrow.status != EscrowStatus::Pending {
            return Err(EscrowError::rejection(format!(
                "escrow {} is not pending",
                escrow_id
            )));
        }

        {
            let mut escrows = self.escrows.write().await;
            let entry = escrows.get_mut(&escrow_id).expect("checked above");
            entry.status = EscrowStatus::Confirmed;
        }

        let events = vec![
            RawLedgerEvent {
                name: "EscrowConfirmed".to_string(),
                data: json!({ "escrowId": escrow_id, "buyer": from }),
            },
            RawLedgerEvent {
                name: "FundsReleased".to_string(),
                data: json!({
                    "escrowId": escrow_id,
                    "recipient": escrow.seller,
                    "amount": escrow.amount,
                }),
            },
        ];

        Ok(self.record_receipt(events).await)
    }

    async fn submit_initiate_dispute(
        &self,
        from: &str,
        escrow_id: u64,
        evidence: &str,
    ) -> EscrowResult<TxHandle> {
        let escrow = self.escrow_or_reject(escrow_id).await?;

        if !escrow.is_party(from) {
            return Err(EscrowError::rejection("caller is not a party to the escrow"));
        }
        if escrow.status != EscrowStatus::Pending {
            return Err(EscrowError::rejection(format!(
                "escrow {} is not pending",
                escrow_id
            )));
        }
        if self.now().await > escrow.confirm_deadline {
            return Err(EscrowError::rejection("dispute window has closed"));
        }
        if evidence.trim().is_empty() {
            return Err(EscrowError::rejection("evidence reference is required"));
        }

        {
            let mut escrows = self.escrows.write().await;
            let entry = escrows.get_mut(&escrow_id).expect("checked above");
            entry.status = EscrowStatus::Disputed;
            entry.disputed = true;
        }

        let events = vec![RawLedgerEvent {
            name: "EscrowDisputed".to_string(),
            data: json!({
                "escrowId": escrow_id,
                "initiator": from,
                "arbitrators": escrow.arbitrators,
            }),
        }];

        Ok(self.record_receipt(events).await)
    }

    async fn submit_vote(
        &self,
        from: &str,
        escrow_id: u64,
        vote: VoteChoice,
    ) -> EscrowResult<TxHandle> {
        let escrow = self.escrow_or_reject(escrow_id).await?;

        if escrow.status != EscrowStatus::Disputed {
            return Err(EscrowError::rejection(format!(
                "escrow {} is not under dispute",
                escrow_id
            )));
        }
        if !escrow.is_arbitrator(from) {
            return Err(EscrowError::rejection(
                "caller is not on the arbitration panel",
            ));
        }

        let timestamp = self.now().await;
        {
            let mut votes = self.votes.write().await;
            let ballots = votes.entry(escrow_id).or_default();
            if ballots.iter().any(|b| b.arbitrator == from) {
                return Err(EscrowError::rejection("arbitrator has already voted"));
            }
            ballots.push(DisputeVote {
                arbitrator: from.to_string(),
                vote,
                timestamp,
            });
        }

        // ballot events are ledger chatter this client has no decoder for
        let events = vec![RawLedgerEvent {
            name: "ArbitrationVoteCast".to_string(),
            data: json!({
                "escrowId": escrow_id,
                "arbitrator": from,
                "vote": vote,
            }),
        }];

        Ok(self.record_receipt(events).await)
    }

    async fn submit_resolve_dispute(&self, _from: &str, escrow_id: u64) -> EscrowResult<TxHandle> {
        let escrow = self.escrow_or_reject(escrow_id).await?;

        if escrow.status != EscrowStatus::Disputed {
            return Err(EscrowError::rejection(format!(
                "escrow {} is not under dispute",
                escrow_id
            )));
        }

        let ballots = self
            .votes
            .read()
            .await
            .get(&escrow_id)
            .cloned()
            .unwrap_or_default();
        if ballots.is_empty() {
            return Err(EscrowError::rejection("no ballots cast"));
        }

        let buyer_votes = ballots.iter().filter(|b| b.vote == VoteChoice::Buyer).count() as u32;
        let seller_votes = ballots.len() as u32 - buyer_votes;
        let (winner, winner_votes) = if buyer_votes > seller_votes {
            (escrow.buyer.clone(), buyer_votes)
        } else if seller_votes > buyer_votes {
            (escrow.seller.clone(), seller_votes)
        } else {
            return Err(EscrowError::rejection("ballots are tied"));
        };

        {
            let mut escrows = self.escrows.write().await;
            let entry = escrows.get_mut(&escrow_id).expect("checked above");
            entry.status = EscrowStatus::Resolved;
        }

        let events = vec![
            RawLedgerEvent {
                name: "DisputeResolved".to_string(),
                data: json!({
                    "escrowId": escrow_id,
                    "winner": winner,
                    "winnerVotes": winner_votes,
                }),
            },
            RawLedgerEvent {
                name: "FundsReleased".to_string(),
                data: json!({
                    "escrowId": escrow_id,
                    "recipient": winner,
                    "amount": escrow.amount,
                }),
            },
        ];

        Ok(self.record_receipt(events).await)
    }

    async fn submit_claim_expired(&self, _from: &str, escrow_id: u64) -> EscrowResult<TxHandle> {
        let escrow = self.escrow_or_reject(escrow_id).await?;

        if escrow.status != EscrowStatus::Pending {
            return Err(EscrowError::rejection(format!(
                "escrow {} is not pending",
                escrow_id
            )));
        }
        if self.now().await <= escrow.confirm_deadline {
            return Err(EscrowError::rejection("confirmation window has not lapsed"));
        }

        let outcome = self.config.read().await.expiry_outcome;
        let (status, recipient) = match outcome {
            ExpiryOutcome::ReleaseToSeller => (EscrowStatus::Confirmed, escrow.seller.clone()),
            ExpiryOutcome::RefundToBuyer => (EscrowStatus::Refunded, escrow.buyer.clone()),
        };

        {
            let mut escrows = self.escrows.write().await;
            let entry = escrows.get_mut(&escrow_id).expect("checked above");
            entry.status = status;
        }

        let events = vec![RawLedgerEvent {
            name: "FundsReleased".to_string(),
            data: json!({
                "escrowId": escrow_id,
                "recipient": recipient,
                "amount": escrow.amount,
            }),
        }];

        Ok(self.record_receipt(events).await)
    }

    async fn await_receipt(&self, handle: &TxHandle) -> EscrowResult<TransactionReceipt> {
        self.receipts
            .read()
            .await
            .get(&handle.hash)
            .cloned()
            .ok_or_else(|| {
                EscrowError::integration(format!("unknown transaction hash {}", handle.hash))
            })
    }

    async fn get_escrow(&self, escrow_id: u64) -> EscrowResult<Option<EscrowTransaction>> {
        Ok(self.escrows.read().await.get(&escrow_id).cloned())
    }

    async fn escrows_by_buyer(&self, buyer: &str) -> EscrowResult<Vec<u64>> {
        let mut ids: Vec<u64> = self
            .escrows
            .read()
            .await
            .values()
            .filter(|e| e.buyer == buyer)
            .map(|e| e.escrow_id)
            .collect();
        ids.sort_unstable();

        Ok(ids)
    }

    async fn escrows_by_seller(&self, seller: &str) -> EscrowResult<Vec<u64>> {
        let mut ids: Vec<u64> = self
            .escrows
            .read()
            .await
            .values()
            .filter(|e| e.seller == seller)
            .map(|e| e.escrow_id)
            .collect();
        ids.sort_unstable();

        Ok(ids)
    }

    async fn dispute_votes(&self, escrow_id: u64) -> EscrowResult<Vec<DisputeVote>> {
        Ok(self
            .votes
            .read()
            .await
            .get(&escrow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn can_initiate_dispute(&self, escrow_id: u64) -> EscrowResult<bool> {
        let escrow = match self.escrows.read().await.get(&escrow_id).cloned() {
            Some(e) => e,
            None => return Ok(false),
        };

        Ok(escrow.status == EscrowStatus::Pending
            && !escrow.disputed
            && self.now().await <= escrow.confirm_deadline)
    }

    async fn can_claim_expired_funds(&self, escrow_id: u64) -> EscrowResult<bool> {
        let escrow = match self.escrows.read().await.get(&escrow_id).cloned() {
            Some(e) => e,
            None => return Ok(false),
        };

        Ok(escrow.status == EscrowStatus::Pending && self.now().await > escrow.confirm_deadline)
    }

    async fn arbitration_fee(&self) -> EscrowResult<u64> {
        let config = self.config.read().await;
        if config.fee_oracle_down {
            return Err(EscrowError::integration("fee oracle unreachable"));
        }

        Ok(config.arbitration_fee)
    }

    async fn total_escrows(&self) -> EscrowResult<u64> {
        Ok(self.escrows.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn created(ledger: &SimLedger) -> u64 {
        let handle = ledger
            .submit_create_escrow("buyer-1", "seller-1", "batch-1", 10_000, Duration::days(30))
            .await
            .unwrap();
        let receipt = ledger.await_receipt(&handle).await.unwrap();
        crate::receipt_decoder::escrow_id_from_creation(&receipt).unwrap()
    }

    #[tokio::test]
    async fn creation_assigns_sequential_ids_and_emits_events() {
        let ledger = SimLedger::new();

        let first = created(&ledger).await;
        let second = created(&ledger).await;

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(ledger.total_escrows().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn non_buyer_confirmation_is_rejected_ledger_side() {
        let ledger = SimLedger::new();
        let id = created(&ledger).await;

        let result = ledger.submit_confirm_delivery("seller-1", id).await;
        match result {
            Err(EscrowError::LedgerRejection(msg)) => assert!(msg.contains("buyer")),
            other => panic!("expected ledger rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn duplicate_ballot_is_rejected() {
        let ledger = SimLedger::new();
        let id = created(&ledger).await;
        ledger
            .submit_initiate_dispute("buyer-1", id, "QmEvidence")
            .await
            .unwrap();

        ledger
            .submit_vote("arb-alpha", id, VoteChoice::Seller)
            .await
            .unwrap();
        let result = ledger.submit_vote("arb-alpha", id, VoteChoice::Buyer).await;

        match result {
            Err(EscrowError::LedgerRejection(msg)) => assert!(msg.contains("already voted")),
            other => panic!("expected ledger rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn tied_resolution_is_rejected() {
        let ledger = SimLedger::new();
        let id = created(&ledger).await;
        ledger
            .submit_initiate_dispute("seller-1", id, "QmEvidence")
            .await
            .unwrap();
        ledger
            .submit_vote("arb-alpha", id, VoteChoice::Buyer)
            .await
            .unwrap();
        ledger
            .submit_vote("arb-beta", id, VoteChoice::Seller)
            .await
            .unwrap();

        assert!(ledger.submit_resolve_dispute("anyone", id).await.is_err());
    }

    #[tokio::test]
    async fn expiry_claim_honors_the_clock() {
        let ledger = SimLedger::new();
        let id = created(&ledger).await;

        assert!(!ledger.can_claim_expired_funds(id).await.unwrap());
        assert!(ledger.submit_claim_expired("seller-1", id).await.is_err());

        ledger.advance_time(Duration::days(31)).await;

        assert!(ledger.can_claim_expired_funds(id).await.unwrap());
        let handle = ledger.submit_claim_expired("seller-1", id).await.unwrap();
        ledger.await_receipt(&handle).await.unwrap();

        let escrow = ledger.get_escrow(id).await.unwrap().unwrap();
        assert_eq!(escrow.status, EscrowStatus::Confirmed);
    }
}
