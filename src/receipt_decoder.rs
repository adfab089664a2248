//! Receipt event decoding
//!
//! Confirmed transactions carry their emitted events in the ledger's native
//! encoding (name + uninterpreted payload). This module maps each known event
//! name onto a typed variant, with an explicit `Unknown` fallback for names
//! this client does not recognize. A known event whose payload does not
//! deserialize is a malformed receipt and fails with an extraction error —
//! it is never silently defaulted.

use serde::{Deserialize, Serialize};

use crate::{
    EscrowResult,
    error::EscrowError,
    models::{RawLedgerEvent, TransactionReceipt},
};

/// Typed view of one ledger event
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    EscrowCreated {
        escrow_id: u64,
        buyer: String,
        seller: String,
        batch_id: String,
        amount: u64,
    },
    EscrowConfirmed {
        escrow_id: u64,
        buyer: String,
    },
    EscrowDisputed {
        escrow_id: u64,
        initiator: String,
        arbitrators: Vec<String>,
    },
    DisputeResolved {
        escrow_id: u64,
        winner: String,
        winner_votes: u32,
    },
    FundsReleased {
        escrow_id: u64,
        recipient: String,
        amount: u64,
    },
    ArbitrationFeePaid {
        escrow_id: u64,
        fee_amount: u64,
        arbitrators: Vec<String>,
    },
    /// Event name not known to this client; payload kept verbatim
    Unknown {
        name: String,
        data: serde_json::Value,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EscrowCreatedPayload {
    escrow_id: u64,
    buyer: String,
    seller: String,
    batch_id: String,
    amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EscrowConfirmedPayload {
    escrow_id: u64,
    buyer: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EscrowDisputedPayload {
    escrow_id: u64,
    initiator: String,
    arbitrators: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisputeResolvedPayload {
    escrow_id: u64,
    winner: String,
    winner_votes: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundsReleasedPayload {
    escrow_id: u64,
    recipient: String,
    amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArbitrationFeePaidPayload {
    escrow_id: u64,
    fee_amount: u64,
    arbitrators: Vec<String>,
}

fn payload<T: serde::de::DeserializeOwned>(raw: &RawLedgerEvent) -> EscrowResult<T> {
    serde_json::from_value(raw.data.clone()).map_err(|e| {
        EscrowError::extraction(format!("malformed {} payload: {}", raw.name, e))
    })
}

/// Decode one raw event into its typed form
pub fn decode_event(raw: &RawLedgerEvent) -> EscrowResult<LedgerEvent> {
    let event = match raw.name.as_str() {
        "EscrowCreated" => {
            let p: EscrowCreatedPayload = payload(raw)?;
            LedgerEvent::EscrowCreated {
                escrow_id: p.escrow_id,
                buyer: p.buyer,
                seller: p.seller,
                batch_id: p.batch_id,
                amount: p.amount,
            }
        }
        "EscrowConfirmed" => {
            let p: EscrowConfirmedPayload = payload(raw)?;
            LedgerEvent::EscrowConfirmed {
                escrow_id: p.escrow_id,
                buyer: p.buyer,
            }
        }
        "EscrowDisputed" => {
            let p: EscrowDisputedPayload = payload(raw)?;
            LedgerEvent::EscrowDisputed {
                escrow_id: p.escrow_id,
                initiator: p.initiator,
                arbitrators: p.arbitrators,
            }
        }
        "DisputeResolved" => {
            let p: DisputeResolvedPayload = payload(raw)?;
            LedgerEvent::DisputeResolved {
                escrow_id: p.escrow_id,
                winner: p.winner,
                winner_votes: p.winner_votes,
            }
        }
        "FundsReleased" => {
            let p: FundsReleasedPayload = payload(raw)?;
            LedgerEvent::FundsReleased {
                escrow_id: p.escrow_id,
                recipient: p.recipient,
                amount: p.amount,
            }
        }
        "ArbitrationFeePaid" => {
            let p: ArbitrationFeePaidPayload = payload(raw)?;
            LedgerEvent::ArbitrationFeePaid {
                escrow_id: p.escrow_id,
                fee_amount: p.fee_amount,
                arbitrators: p.arbitrators,
            }
        }
        _ => LedgerEvent::Unknown {
            name: raw.name.clone(),
            data: raw.data.clone(),
        },
    };

    Ok(event)
}

/// Decode every event a receipt carries
pub fn decode_events(receipt: &TransactionReceipt) -> EscrowResult<Vec<LedgerEvent>> {
    receipt.events.iter().map(decode_event).collect()
}

/// Recover the ledger-assigned escrow id from a creation receipt
///
/// The absence of `EscrowCreated` in a confirmed creation receipt means a
/// ledger-side behavioral change or a malformed receipt, which is distinct
/// from the ledger rejecting the operation.
pub fn escrow_id_from_creation(receipt: &TransactionReceipt) -> EscrowResult<u64> {
    for raw in &receipt.events {
        if let LedgerEvent::EscrowCreated { escrow_id, .. } = decode_event(raw)? {
            return Ok(escrow_id);
        }
    }

    Err(EscrowError::extraction(format!(
        "EscrowCreated event not found in receipt {}",
        receipt.tx_hash
    )))
}

/// Outcome carried by a `DisputeResolved` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub winner: String,
    pub winner_votes: u32,
}

/// Recover the dispute outcome from a resolution receipt
pub fn outcome_from_resolution(receipt: &TransactionReceipt) -> EscrowResult<ResolutionOutcome> {
    for raw in &receipt.events {
        if let LedgerEvent::DisputeResolved {
            winner,
            winner_votes,
            ..
        } = decode_event(raw)?
        {
            return Ok(ResolutionOutcome {
                winner,
                winner_votes,
            });
        }
    }

    Err(EscrowError::extraction(format!(
        "DisputeResolved event not found in receipt {}",
        receipt.tx_hash
    )))
}

/// Fund-release details, when the receipt carries them
///
/// Not every confirmed operation moves funds (a ballot does not), so absence
/// here is a legitimate empty result rather than an error.
pub fn funds_released(
    receipt: &TransactionReceipt,
) -> EscrowResult<Option<(String, u64)>> {
    for raw in &receipt.events {
        if let LedgerEvent::FundsReleased {
            recipient, amount, ..
        } = decode_event(raw)?
        {
            return Ok(Some((recipient, amount)));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn receipt_with(events: Vec<RawLedgerEvent>) -> TransactionReceipt {
        TransactionReceipt {
            tx_hash: "0xabc".to_string(),
            confirmed_at: Utc::now(),
            events,
        }
    }

    #[test]
    fn decodes_creation_event() {
        let raw = RawLedgerEvent {
            name: "EscrowCreated".to_string(),
            data: json!({
                "escrowId": 7,
                "buyer": "addr_buyer",
                "seller": "addr_seller",
                "batchId": "batch-42",
                "amount": 100_000
            }),
        };

        let event = decode_event(&raw).unwrap();
        assert_eq!(
            event,
            LedgerEvent::EscrowCreated {
                escrow_id: 7,
                buyer: "addr_buyer".to_string(),
                seller: "addr_seller".to_string(),
                batch_id: "batch-42".to_string(),
                amount: 100_000,
            }
        );
    }

    #[test]
    fn unknown_event_name_falls_back_without_error() {
        let raw = RawLedgerEvent {
            name: "FeeScheduleUpdated".to_string(),
            data: json!({ "newFee": 12 }),
        };

        match decode_event(&raw).unwrap() {
            LedgerEvent::Unknown { name, .. } => assert_eq!(name, "FeeScheduleUpdated"),
            other => panic!("expected unknown fallback, got {:?}", other),
        }
    }

    #[test]
    fn malformed_known_payload_is_extraction_error() {
        let raw = RawLedgerEvent {
            name: "EscrowConfirmed".to_string(),
            data: json!({ "escrowId": "not-a-number" }),
        };

        match decode_event(&raw) {
            Err(EscrowError::Extraction(msg)) => assert!(msg.contains("EscrowConfirmed")),
            other => panic!("expected extraction error, got {:?}", other),
        }
    }

    #[test]
    fn escrow_id_recovered_from_creation_receipt() {
        let receipt = receipt_with(vec![
            RawLedgerEvent {
                name: "ArbitrationFeePaid".to_string(),
                data: json!({ "escrowId": 3, "feeAmount": 500, "arbitrators": [] }),
            },
            RawLedgerEvent {
                name: "EscrowCreated".to_string(),
                data: json!({
                    "escrowId": 3,
                    "buyer": "b",
                    "seller": "s",
                    "batchId": "x",
                    "amount": 1
                }),
            },
        ]);

        assert_eq!(escrow_id_from_creation(&receipt).unwrap(), 3);
    }

    #[test]
    fn missing_creation_event_is_extraction_error() {
        let receipt = receipt_with(vec![RawLedgerEvent {
            name: "FundsReleased".to_string(),
            data: json!({ "escrowId": 3, "recipient": "s", "amount": 1 }),
        }]);

        match escrow_id_from_creation(&receipt) {
            Err(EscrowError::Extraction(msg)) => assert!(msg.contains("EscrowCreated")),
            other => panic!("expected extraction error, got {:?}", other),
        }
    }
}
