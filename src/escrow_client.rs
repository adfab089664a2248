//! Escrow command client - validates and submits ledger operations
//!
//! This is the state-machine-aware orchestrator: every operation runs in two
//! phases. Phase one validates local input and the most recently read escrow
//! state, failing fast with a typed error before any network round-trip.
//! Phase two submits the operation and blocks until the ledger has durably
//! accepted it. The local checks are advisory only — a check that passes here
//! can still be rejected by the ledger when another party acted first, and
//! callers must treat the ledger's verdict as the source of truth.

use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use crate::{
    EscrowResult,
    error::EscrowError,
    ledger::LedgerConnector,
    models::{EscrowCreation, EscrowTransaction, VoteChoice},
    receipt_decoder,
    state_reader::EscrowStateReader,
};

/// Configuration for the escrow command client
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EscrowClientConfig {
    /// Shortest accepted confirmation window, in days
    pub min_confirmation_period_days: i64,
    /// Longest accepted confirmation window, in days
    pub max_confirmation_period_days: i64,
}

impl Default for EscrowClientConfig {
    fn default() -> Self {
        Self {
            min_confirmation_period_days: 1,
            max_confirmation_period_days: 365,
        }
    }
}

/// Escrow command client bound to one signer identity and one ledger
///
/// Constructed explicitly and passed where needed; holds no process-wide
/// state. Operations for different escrows may be issued concurrently with no
/// ordering guarantee between them; conflicting operations on the same escrow
/// are serialized by the ledger, not here.
pub struct EscrowClient {
    /// Address every submission is authorized as
    signer: String,
    ledger: Arc<dyn LedgerConnector>,
    reader: EscrowStateReader,
    config: EscrowClientConfig,
}

impl EscrowClient {
    /// Create a client with default configuration
    pub fn new(ledger: Arc<dyn LedgerConnector>, signer: impl Into<String>) -> Self {
        Self::with_config(ledger, signer, EscrowClientConfig::default())
    }

    /// Create a client with explicit configuration
    pub fn with_config(
        ledger: Arc<dyn LedgerConnector>,
        signer: impl Into<String>,
        config: EscrowClientConfig,
    ) -> Self {
        let reader = EscrowStateReader::new(Arc::clone(&ledger));
        Self {
            signer: signer.into(),
            ledger,
            reader,
            config,
        }
    }

    /// The bound signer address
    pub fn signer(&self) -> &str {
        &self.signer
    }

    /// Read-only state access over the same connector
    pub fn reader(&self) -> &EscrowStateReader {
        &self.reader
    }

    /// Create a new escrow, locking `amount` for `seller`'s batch
    ///
    /// The caller becomes the recorded buyer. The escrow identifier is
    /// recovered from the confirmed receipt's creation event; a receipt
    /// without that event fails with an extraction error, distinct from a
    /// ledger rejection.
    pub async fn create_escrow(
        &self,
        seller: &str,
        batch_id: &str,
        amount: u64,
        confirmation_period_days: i64,
    ) -> EscrowResult<EscrowCreation> {
        if seller.trim().is_empty() {
            return Err(EscrowError::validation("Seller address cannot be empty"));
        }
        if batch_id.trim().is_empty() {
            return Err(EscrowError::validation("Batch id cannot be empty"));
        }
        if amount == 0 {
            return Err(EscrowError::validation("Amount must be greater than 0"));
        }
        if confirmation_period_days < self.config.min_confirmation_period_days
            || confirmation_period_days > self.config.max_confirmation_period_days
        {
            return Err(EscrowError::validation(format!(
                "Confirmation period {} days outside allowed range {}..={}",
                confirmation_period_days,
                self.config.min_confirmation_period_days,
                self.config.max_confirmation_period_days
            )));
        }

        info!(
            "Creating escrow: batch {} for {} units, {} day window",
            batch_id, amount, confirmation_period_days
        );

        let handle = self
            .ledger
            .submit_create_escrow(
                &self.signer,
                seller,
                batch_id,
                amount,
                Duration::days(confirmation_period_days),
            )
            .await?;
        let receipt = self.ledger.await_receipt(&handle).await?;
        let escrow_id = receipt_decoder::escrow_id_from_creation(&receipt)?;

        info!("Created escrow {} in tx {}", escrow_id, handle.hash);

        Ok(EscrowCreation {
            escrow_id,
            tx_hash: handle.hash,
            receipt,
        })
    }

    /// Confirm delivery as the buyer, releasing funds to the seller
    pub async fn confirm_delivery(&self, escrow_id: u64) -> EscrowResult<String> {
        let escrow = self.reader.require_escrow(escrow_id).await?;

        if escrow.buyer != self.signer {
            return Err(EscrowError::precondition(format!(
                "Only the recorded buyer can confirm delivery of escrow {}",
                escrow_id
            )));
        }
        self.check_status_allows(&escrow, escrow.status.can_confirm(), "confirmed")?;

        info!("Confirming delivery for escrow {}", escrow_id);

        let handle = self
            .ledger
            .submit_confirm_delivery(&self.signer, escrow_id)
            .await?;
        self.ledger.await_receipt(&handle).await?;

        info!("Confirmed delivery for escrow {} in tx {}", escrow_id, handle.hash);

        Ok(handle.hash)
    }

    /// Open a dispute as buyer or seller, attaching opaque evidence
    ///
    /// `evidence` is typically a content hash; it is not interpreted beyond
    /// non-emptiness. The dispute window is checked against the ledger, whose
    /// clock is authoritative, not against local time.
    pub async fn initiate_dispute(&self, escrow_id: u64, evidence: &str) -> EscrowResult<String> {
        if evidence.trim().is_empty() {
            return Err(EscrowError::validation("Dispute evidence cannot be empty"));
        }

        let escrow = self.reader.require_escrow(escrow_id).await?;

        if !escrow.is_party(&self.signer) {
            return Err(EscrowError::precondition(format!(
                "Only the buyer or seller can dispute escrow {}",
                escrow_id
            )));
        }
        self.check_status_allows(&escrow, escrow.status.can_dispute(), "disputed")?;

        if !self.ledger.can_initiate_dispute(escrow_id).await? {
            return Err(EscrowError::precondition(format!(
                "Dispute window has lapsed for escrow {}",
                escrow_id
            )));
        }

        info!("Initiating dispute on escrow {}", escrow_id);

        let handle = self
            .ledger
            .submit_initiate_dispute(&self.signer, escrow_id, evidence)
            .await?;
        self.ledger.await_receipt(&handle).await?;

        info!("Disputed escrow {} in tx {}", escrow_id, handle.hash);

        Ok(handle.hash)
    }

    /// Cast an arbitration ballot on a disputed escrow
    pub async fn vote_on_dispute(&self, escrow_id: u64, vote: VoteChoice) -> EscrowResult<String> {
        let escrow = self.reader.require_escrow(escrow_id).await?;

        self.check_status_allows(&escrow, escrow.status.can_vote(), "voted on")?;
        if !escrow.is_arbitrator(&self.signer) {
            return Err(EscrowError::precondition(format!(
                "{} is not on the arbitration panel of escrow {}",
                self.signer, escrow_id
            )));
        }

        info!("Casting {:?} ballot on escrow {}", vote, escrow_id);

        let handle = self.ledger.submit_vote(&self.signer, escrow_id, vote).await?;
        self.ledger.await_receipt(&handle).await?;

        Ok(handle.hash)
    }

    /// Request resolution of a disputed escrow
    ///
    /// Timing and quorum legality are enforced entirely by the ledger; the
    /// only local check is existence.
    pub async fn resolve_dispute(&self, escrow_id: u64) -> EscrowResult<String> {
        self.reader.require_escrow(escrow_id).await?;

        info!("Requesting resolution of escrow {}", escrow_id);

        let handle = self
            .ledger
            .submit_resolve_dispute(&self.signer, escrow_id)
            .await?;
        self.ledger.await_receipt(&handle).await?;

        info!("Resolved escrow {} in tx {}", escrow_id, handle.hash);

        Ok(handle.hash)
    }

    /// Claim funds of an escrow whose confirmation window has lapsed
    pub async fn claim_expired_funds(&self, escrow_id: u64) -> EscrowResult<String> {
        self.reader.require_escrow(escrow_id).await?;

        if !self.ledger.can_claim_expired_funds(escrow_id).await? {
            return Err(EscrowError::precondition(format!(
                "Expiry claim is not currently legal for escrow {}",
                escrow_id
            )));
        }

        info!("Claiming expired funds of escrow {}", escrow_id);

        let handle = self
            .ledger
            .submit_claim_expired(&self.signer, escrow_id)
            .await?;
        self.ledger.await_receipt(&handle).await?;

        info!("Claimed expired escrow {} in tx {}", escrow_id, handle.hash);

        Ok(handle.hash)
    }

    fn check_status_allows(
        &self,
        escrow: &EscrowTransaction,
        allowed: bool,
        action: &str,
    ) -> EscrowResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(EscrowError::precondition(format!(
                "Escrow {} cannot be {} in status {:?}",
                escrow.escrow_id, action, escrow.status
            )))
        }
    }
}
