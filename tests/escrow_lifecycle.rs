//! End-to-end escrow lifecycle scenarios against the simulated ledger

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;

use agora_escrow::{
    error::EscrowError,
    escrow_client::EscrowClient,
    fee_calculator::{DEFAULT_ARBITRATION_FEE, FeeCalculator, FeeSource},
    ledger::LedgerConnector,
    models::{EscrowStatus, VoteChoice},
    sim_ledger::{ExpiryOutcome, SimLedger},
    state_reader::EscrowStateReader,
};

const BUYER: &str = "buyer-wallet";
const SELLER: &str = "seller-wallet";

fn conn(ledger: &Arc<SimLedger>) -> Arc<dyn LedgerConnector> {
    Arc::clone(ledger) as Arc<dyn LedgerConnector>
}

fn setup() -> (Arc<SimLedger>, EscrowClient, EscrowClient) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let ledger = Arc::new(SimLedger::new());
    let buyer = EscrowClient::new(conn(&ledger), BUYER);
    let seller = EscrowClient::new(conn(&ledger), SELLER);

    (ledger, buyer, seller)
}

fn arbitrator(ledger: &Arc<SimLedger>, address: &str) -> EscrowClient {
    EscrowClient::new(conn(ledger), address)
}

#[tokio::test]
async fn local_validation_fails_before_any_ledger_interaction() -> Result<()> {
    let (ledger, buyer, _) = setup();

    for result in [
        buyer.create_escrow(SELLER, "batch-1", 0, 30).await,
        buyer.create_escrow(SELLER, "", 100, 30).await,
        buyer.create_escrow("", "batch-1", 100, 30).await,
        buyer.create_escrow(SELLER, "batch-1", 100, 0).await,
        buyer.create_escrow(SELLER, "batch-1", 100, 366).await,
    ] {
        match result {
            Err(EscrowError::Validation(_)) => {}
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    // nothing reached the ledger
    assert_eq!(ledger.total_escrows().await?, 0);

    Ok(())
}

#[tokio::test]
async fn confirmation_lifecycle() -> Result<()> {
    let (ledger, buyer, _) = setup();

    let creation = buyer.create_escrow(SELLER, "batch-7", 100, 30).await?;
    assert_eq!(creation.escrow_id, 1);
    assert!(!creation.tx_hash.is_empty());

    let reader = EscrowStateReader::new(conn(&ledger));
    let escrow = reader.require_escrow(creation.escrow_id).await?;
    assert_eq!(escrow.status, EscrowStatus::Pending);
    assert_eq!(escrow.amount, 100);
    assert_eq!(escrow.confirm_deadline, escrow.created_at + Duration::days(30));
    assert_eq!(reader.escrows_by_buyer(BUYER).await?, vec![1]);
    assert_eq!(reader.escrows_by_seller(SELLER).await?, vec![1]);

    buyer.confirm_delivery(creation.escrow_id).await?;
    let escrow = reader.require_escrow(creation.escrow_id).await?;
    assert_eq!(escrow.status, EscrowStatus::Confirmed);

    // the window is spent; a second confirmation is illegal
    match buyer.confirm_delivery(creation.escrow_id).await {
        Err(EscrowError::Precondition(msg)) => assert!(msg.contains("Confirmed")),
        other => panic!("expected precondition error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn only_the_recorded_buyer_may_confirm() -> Result<()> {
    let (_ledger, buyer, seller) = setup();
    let creation = buyer.create_escrow(SELLER, "batch-7", 500, 10).await?;

    match seller.confirm_delivery(creation.escrow_id).await {
        Err(EscrowError::Precondition(msg)) => assert!(msg.contains("buyer")),
        other => panic!("expected precondition error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn missing_escrow_is_not_found() -> Result<()> {
    let (ledger, buyer, _) = setup();

    let reader = EscrowStateReader::new(conn(&ledger));
    assert!(reader.get_escrow(99).await?.is_none());

    match buyer.confirm_delivery(99).await {
        Err(EscrowError::NotFound(99)) => {}
        other => panic!("expected not-found error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn expiry_claim_respects_the_deadline() -> Result<()> {
    let (ledger, buyer, seller) = setup();
    let creation = buyer.create_escrow(SELLER, "batch-9", 1_000, 30).await?;

    // window still open
    match seller.claim_expired_funds(creation.escrow_id).await {
        Err(EscrowError::Precondition(_)) => {}
        other => panic!("expected precondition error, got {:?}", other),
    }

    ledger.advance_time(Duration::days(31)).await;

    assert!(ledger.can_claim_expired_funds(creation.escrow_id).await?);
    seller.claim_expired_funds(creation.escrow_id).await?;

    let reader = EscrowStateReader::new(conn(&ledger));
    let escrow = reader.require_escrow(creation.escrow_id).await?;
    assert_eq!(escrow.status, EscrowStatus::Confirmed);

    // terminal now; a second claim is illegal
    match seller.claim_expired_funds(creation.escrow_id).await {
        Err(EscrowError::Precondition(_)) => {}
        other => panic!("expected precondition error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn expiry_claim_can_refund_the_buyer_when_the_ledger_says_so() -> Result<()> {
    let (ledger, buyer, _) = setup();
    ledger.set_expiry_outcome(ExpiryOutcome::RefundToBuyer).await;

    let creation = buyer.create_escrow(SELLER, "batch-11", 1_000, 5).await?;
    ledger.advance_time(Duration::days(6)).await;
    buyer.claim_expired_funds(creation.escrow_id).await?;

    let reader = EscrowStateReader::new(conn(&ledger));
    assert_eq!(
        reader.require_escrow(creation.escrow_id).await?.status,
        EscrowStatus::Refunded
    );

    Ok(())
}

#[tokio::test]
async fn dispute_lifecycle_with_arbitration() -> Result<()> {
    let (ledger, buyer, seller) = setup();
    let creation = buyer.create_escrow(SELLER, "batch-13", 2_000, 30).await?;
    let id = creation.escrow_id;

    match seller.initiate_dispute(id, "  ").await {
        Err(EscrowError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other),
    }

    seller.initiate_dispute(id, "QmSellerEvidence").await?;

    let reader = EscrowStateReader::new(conn(&ledger));
    let escrow = reader.require_escrow(id).await?;
    assert_eq!(escrow.status, EscrowStatus::Disputed);
    assert!(escrow.disputed);

    // no longer pending, so a second dispute is illegal
    match buyer.initiate_dispute(id, "QmBuyerEvidence").await {
        Err(EscrowError::Precondition(_)) => {}
        other => panic!("expected precondition error, got {:?}", other),
    }

    // outsiders hold no ballot
    match arbitrator(&ledger, "stranger")
        .vote_on_dispute(id, VoteChoice::Buyer)
        .await
    {
        Err(EscrowError::Precondition(msg)) => assert!(msg.contains("panel")),
        other => panic!("expected precondition error, got {:?}", other),
    }

    arbitrator(&ledger, "arb-alpha")
        .vote_on_dispute(id, VoteChoice::Seller)
        .await?;
    arbitrator(&ledger, "arb-beta")
        .vote_on_dispute(id, VoteChoice::Seller)
        .await?;
    arbitrator(&ledger, "arb-gamma")
        .vote_on_dispute(id, VoteChoice::Buyer)
        .await?;

    seller.resolve_dispute(id).await?;

    let summary = reader.dispute_summary(id).await?;
    assert!(summary.resolved);
    assert_eq!(summary.winner.as_deref(), Some(SELLER));
    assert_eq!(summary.seller_votes, 2);
    assert_eq!(summary.buyer_votes, 1);
    assert_eq!(reader.require_escrow(id).await?.status, EscrowStatus::Resolved);

    Ok(())
}

#[tokio::test]
async fn non_arbitrator_vote_fails_regardless_of_status() -> Result<()> {
    let (ledger, buyer, _) = setup();
    let creation = buyer.create_escrow(SELLER, "batch-17", 700, 30).await?;

    // still pending: voting is illegal for anyone, panel member or not
    match arbitrator(&ledger, "stranger")
        .vote_on_dispute(creation.escrow_id, VoteChoice::Seller)
        .await
    {
        Err(EscrowError::Precondition(_)) => {}
        other => panic!("expected precondition error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn dispute_window_closes_with_the_ledger_clock() -> Result<()> {
    let (ledger, buyer, _) = setup();
    let creation = buyer.create_escrow(SELLER, "batch-19", 900, 7).await?;

    ledger.advance_time(Duration::days(8)).await;

    // status is still pending, so the local snapshot allows it; the
    // ledger-side window query is what forbids it
    match buyer.initiate_dispute(creation.escrow_id, "QmLate").await {
        Err(EscrowError::Precondition(msg)) => assert!(msg.contains("window")),
        other => panic!("expected precondition error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn ledger_rejection_surfaces_through_the_client() -> Result<()> {
    let (_ledger, buyer, _) = setup();
    let creation = buyer.create_escrow(SELLER, "batch-23", 800, 30).await?;

    // resolve has no local status precondition; the ledger refuses it
    match buyer.resolve_dispute(creation.escrow_id).await {
        Err(EscrowError::LedgerRejection(msg)) => assert!(msg.contains("dispute")),
        other => panic!("expected ledger rejection, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn fee_estimate_survives_oracle_outage() -> Result<()> {
    let (ledger, _, _) = setup();
    let calculator = FeeCalculator::new(conn(&ledger));

    let quoted = calculator.transaction_cost(10_000).await;
    assert_eq!(quoted.source, FeeSource::Ledger);
    assert_eq!(quoted.arbitration_fee, 1_500_000);
    assert_eq!(quoted.total_cost, 1_510_000);
    assert!(!quoted.is_estimate());

    ledger.set_fee_oracle_down(true).await;

    let estimated = calculator.transaction_cost(10_000).await;
    assert_eq!(estimated.source, FeeSource::DefaultEstimate);
    assert_eq!(estimated.arbitration_fee, DEFAULT_ARBITRATION_FEE);
    assert_eq!(estimated.total_cost, 10_000 + DEFAULT_ARBITRATION_FEE);
    assert!(estimated.is_estimate());

    Ok(())
}
