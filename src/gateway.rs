//! Ledger gateway connector
//!
//! HTTP implementation of [`LedgerConnector`] against the marketplace's
//! ledger gateway, which fronts the chain node and the wallet-signing
//! service. Mutating operations are POSTed and come back as transaction
//! handles; confirmation is obtained by polling the receipt endpoint.
//! Client-error responses are surfaced as ledger rejections, transport
//! failures as transport errors.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use crate::{
    EscrowResult,
    error::EscrowError,
    ledger::LedgerConnector,
    models::{DisputeVote, EscrowTransaction, TransactionReceipt, TxHandle, VoteChoice},
};

/// Configuration for the gateway connector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway base URL
    pub base_url: String,
    /// Bearer token for the gateway, when it requires one
    pub auth_token: Option<String>,
    /// How often to poll for a pending transaction's receipt
    pub receipt_poll_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8899".to_string(),
            auth_token: None,
            receipt_poll_interval_ms: 500,
        }
    }
}

/// HTTP connector to the ledger gateway
pub struct GatewayConnector {
    http: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Debug, Serialize)]
struct CreateEscrowRequest<'a> {
    from: &'a str,
    seller: &'a str,
    batch_id: &'a str,
    amount: u64,
    confirmation_period_secs: i64,
}

#[derive(Debug, Serialize)]
struct EscrowOpRequest<'a> {
    from: &'a str,
    escrow_id: u64,
}

#[derive(Debug, Serialize)]
struct InitiateDisputeRequest<'a> {
    from: &'a str,
    escrow_id: u64,
    evidence: &'a str,
}

#[derive(Debug, Serialize)]
struct VoteRequest<'a> {
    from: &'a str,
    escrow_id: u64,
    vote: VoteChoice,
}

impl GatewayConnector {
    /// Create a connector with the given configuration
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn error_from(response: reqwest::Response) -> EscrowError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            // the gateway relays the ledger's refusal verbatim
            EscrowError::rejection(format!("{}: {}", status, body))
        } else {
            EscrowError::integration(format!("gateway returned {}: {}", status, body))
        }
    }

    async fn submit<T: Serialize>(&self, operation: &str, body: &T) -> EscrowResult<TxHandle> {
        let url = self.url(&format!("/v1/operations/{}", operation));
        debug!("Submitting {} via {}", operation, url);

        let response = self
            .authorize(self.http.post(url))
            .header("x-request-id", Uuid::new_v4().to_string())
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<TxHandle>().await?)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> EscrowResult<T> {
        let response = self
            .authorize(self.http.get(self.url(path)))
            .query(query)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

#[async_trait]
impl LedgerConnector for GatewayConnector {
    async fn submit_create_escrow(
        &self,
        from: &str,
        seller: &str,
        batch_id: &str,
        amount: u64,
        confirmation_period: Duration,
    ) -> EscrowResult<TxHandle> {
        self.submit(
            "create-escrow",
            &CreateEscrowRequest {
                from,
                seller,
                batch_id,
                amount,
                confirmation_period_secs: confirmation_period.num_seconds(),
            },
        )
        .await
    }

    async fn submit_confirm_delivery(&self, from: &str, escrow_id: u64) -> EscrowResult<TxHandle> {
        self.submit("confirm-delivery", &EscrowOpRequest { from, escrow_id })
            .await
    }

    async fn submit_initiate_dispute(
        &self,
        from: &str,
        escrow_id: u64,
        evidence: &str,
    ) -> EscrowResult<TxHandle> {
        self.submit(
            "initiate-dispute",
            &InitiateDisputeRequest {
                from,
                escrow_id,
                evidence,
            },
        )
        .await
    }

    async fn submit_vote(
        &self,
        from: &str,
        escrow_id: u64,
        vote: VoteChoice,
    ) -> EscrowResult<TxHandle> {
        self.submit(
            "vote-on-dispute",
            &VoteRequest {
                from,
                escrow_id,
                vote,
            },
        )
        .await
    }

    async fn submit_resolve_dispute(&self, from: &str, escrow_id: u64) -> EscrowResult<TxHandle> {
        self.submit("resolve-dispute", &EscrowOpRequest { from, escrow_id })
            .await
    }

    async fn submit_claim_expired(&self, from: &str, escrow_id: u64) -> EscrowResult<TxHandle> {
        self.submit("claim-expired-funds", &EscrowOpRequest { from, escrow_id })
            .await
    }

    /// Poll until the receipt exists. No internal timeout: retrying a
    /// non-idempotent submission is worse than letting the caller's own
    /// cancellation policy cut the wait.
    async fn await_receipt(&self, handle: &TxHandle) -> EscrowResult<TransactionReceipt> {
        let path = format!("/v1/transactions/{}/receipt", handle.hash);
        let interval = StdDuration::from_millis(self.config.receipt_poll_interval_ms);

        loop {
            let response = self.authorize(self.http.get(self.url(&path))).send().await?;

            match response.status() {
                status if status.is_success() => {
                    return Ok(response.json::<TransactionReceipt>().await?);
                }
                StatusCode::NOT_FOUND => sleep(interval).await,
                _ => return Err(Self::error_from(response).await),
            }
        }
    }

    async fn get_escrow(&self, escrow_id: u64) -> EscrowResult<Option<EscrowTransaction>> {
        let response = self
            .authorize(self.http.get(self.url(&format!("/v1/escrows/{}", escrow_id))))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json::<EscrowTransaction>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn escrows_by_buyer(&self, buyer: &str) -> EscrowResult<Vec<u64>> {
        self.fetch("/v1/escrows", &[("buyer", buyer)]).await
    }

    async fn escrows_by_seller(&self, seller: &str) -> EscrowResult<Vec<u64>> {
        self.fetch("/v1/escrows", &[("seller", seller)]).await
    }

    async fn dispute_votes(&self, escrow_id: u64) -> EscrowResult<Vec<DisputeVote>> {
        self.fetch(&format!("/v1/escrows/{}/votes", escrow_id), &[])
            .await
    }

    async fn can_initiate_dispute(&self, escrow_id: u64) -> EscrowResult<bool> {
        self.fetch(&format!("/v1/escrows/{}/can-dispute", escrow_id), &[])
            .await
    }

    async fn can_claim_expired_funds(&self, escrow_id: u64) -> EscrowResult<bool> {
        self.fetch(&format!("/v1/escrows/{}/can-claim-expired", escrow_id), &[])
            .await
    }

    async fn arbitration_fee(&self) -> EscrowResult<u64> {
        self.fetch("/v1/fees/arbitration", &[]).await
    }

    async fn total_escrows(&self) -> EscrowResult<u64> {
        self.fetch("/v1/escrows/count", &[]).await
    }
}
