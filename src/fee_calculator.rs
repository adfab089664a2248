//! Transaction cost computation
//!
//! Converts a product price plus the ledger-quoted arbitration fee into the
//! total payable amount. When the fee read fails the calculator falls back to
//! the configured default so a cost estimate is always available; the
//! authoritative cost is whatever the ledger charges at submission time, and
//! the degraded path is explicit in [`FeeSource`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ledger::LedgerConnector;

/// Documented fallback arbitration fee, in the ledger's smallest unit
pub const DEFAULT_ARBITRATION_FEE: u64 = 2_500_000;

/// Where the arbitration fee in a [`TransactionCost`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeSource {
    /// Quoted by the ledger; authoritative as of the read
    Ledger,
    /// Fee oracle unreachable; configured default used, estimate only
    DefaultEstimate,
}

/// Total payable amount for one escrow purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCost {
    pub product_price: u64,
    pub arbitration_fee: u64,
    pub total_cost: u64,
    pub source: FeeSource,
}

impl TransactionCost {
    /// True when the fee came from the fallback default rather than the ledger
    pub fn is_estimate(&self) -> bool {
        self.source == FeeSource::DefaultEstimate
    }
}

/// Fee calculator bound to one ledger connector
#[derive(Clone)]
pub struct FeeCalculator {
    ledger: Arc<dyn LedgerConnector>,
    default_fee: u64,
}

impl FeeCalculator {
    /// Create a calculator using [`DEFAULT_ARBITRATION_FEE`] as the fallback
    pub fn new(ledger: Arc<dyn LedgerConnector>) -> Self {
        Self::with_default_fee(ledger, DEFAULT_ARBITRATION_FEE)
    }

    /// Create a calculator with an explicit fallback fee
    pub fn with_default_fee(ledger: Arc<dyn LedgerConnector>, default_fee: u64) -> Self {
        Self {
            ledger,
            default_fee,
        }
    }

    /// Compute the total cost for a product price
    ///
    /// Never fails: a fee-oracle outage only affects an estimate, not a
    /// commitment, so it degrades to the default instead of propagating.
    pub async fn transaction_cost(&self, product_price: u64) -> TransactionCost {
        let (arbitration_fee, source) = match self.ledger.arbitration_fee().await {
            Ok(fee) => (fee, FeeSource::Ledger),
            Err(e) => {
                warn!(
                    "arbitration fee read failed, using default {}: {}",
                    self.default_fee, e
                );
                (self.default_fee, FeeSource::DefaultEstimate)
            }
        };

        TransactionCost {
            product_price,
            arbitration_fee,
            total_cost: product_price.saturating_add(arbitration_fee),
            source,
        }
    }
}
