//! Typed HTTP client for talking to other nodes.

use std::time::Duration;

use serde::Deserialize;

use certchain_ledger::{Block, Transaction};

use crate::error::NetworkError;
use crate::peer_manager::PeerEntry;

/// What a peer's health endpoint reports, reduced to the fields callers
/// act on.
#[derive(Clone, Debug, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    #[serde(default)]
    pub network_flag: Option<String>,
    #[serde(default)]
    pub blockchain: HealthChain,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HealthChain {
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub latest_hash: String,
}

/// Outbound node-to-node HTTP client.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client with static configuration");
        Self { http }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        addr: &str,
        path: &str,
    ) -> Result<T, NetworkError> {
        let url = format!("http://{addr}{path}");
        let response = self.http.get(&url).send().await.map_err(|e| {
            NetworkError::Http {
                addr: addr.to_string(),
                reason: e.to_string(),
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                addr: addr.to_string(),
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(|e| NetworkError::Decode {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn latest_block(&self, addr: &str) -> Result<Block, NetworkError> {
        self.get_json(addr, "/api/v1/blocks/latest").await
    }

    pub async fn block_at(&self, addr: &str, height: u64) -> Result<Block, NetworkError> {
        self.get_json(addr, &format!("/api/v1/blocks/{height}")).await
    }

    pub async fn peers(&self, addr: &str) -> Result<Vec<PeerEntry>, NetworkError> {
        self.get_json(addr, "/api/v1/peers").await
    }

    pub async fn health(&self, addr: &str) -> Result<HealthSummary, NetworkError> {
        self.get_json(addr, "/api/v1/health").await
    }

    /// Forward a certification submission to a peer.
    pub async fn submit_certification(
        &self,
        addr: &str,
        tx: &Transaction,
    ) -> Result<(), NetworkError> {
        let url = format!("http://{addr}/api/v1/certifications");
        let body = serde_json::json!({
            "public_key": tx.public_key,
            "name": tx.name,
            "surname": tx.surname,
            "inquiry_id": tx.inquiry_id,
            "datetime": tx.datetime,
            "signature": tx.signature,
        });
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NetworkError::Http {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                addr: addr.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Gossip a submission to every peer, concurrently. Returns how many
    /// accepted it; duplicates on the receiving side are expected and
    /// counted as failures without consequence.
    pub async fn broadcast_certification(&self, peers: &[String], tx: &Transaction) -> usize {
        let sends = peers.iter().map(|addr| {
            let addr = addr.clone();
            async move {
                match self.submit_certification(&addr, tx).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(peer = %addr, error = %e, "gossip send failed");
                        false
                    }
                }
            }
        });
        futures::future::join_all(sends)
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count()
    }
}
