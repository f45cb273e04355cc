//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use certchain_ledger::{Block, Transaction};
use certchain_types::CertRecord;

use crate::error::ApiError;
use crate::server::ApiState;

// ── Request / response shapes ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub inquiry_id: String,
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signature: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub transaction_id: String,
    pub message: &'static str,
}

#[derive(Deserialize)]
pub struct IdentityQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
}

#[derive(Deserialize)]
pub struct AddPeerRequest {
    pub address: String,
}

#[derive(Serialize)]
pub struct AddPeerResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct LegacyPeersResponse {
    pub peers: Vec<String>,
    pub network_id: String,
    pub timestamp: i64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub network_flag: String,
    pub blockchain: HealthChain,
    pub network: HealthNetwork,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct HealthChain {
    pub height: u64,
    pub latest_hash: String,
}

#[derive(Serialize)]
pub struct HealthNetwork {
    pub peer_count: usize,
    pub network_id: String,
}

// ── Certifications ──────────────────────────────────────────────────────

/// Submission pipeline: decode, default the datetime, static checks,
/// freshness, signature, external identity verification, then the
/// mempool. A forged signature never reaches the verifier.
pub async fn submit_certification(
    State(state): State<ApiState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        ApiError::Chain(certchain_chain::ChainError::MalformedPayload(e.to_string()))
    })?;

    let datetime = req.datetime.unwrap_or_else(Utc::now);
    let tx = Transaction::new(
        req.public_key,
        req.name,
        req.surname,
        req.inquiry_id,
        datetime,
        req.signature,
    );

    tx.validate_static().map_err(certchain_chain::ChainError::from)?;
    tx.validate_freshness(Utc::now())
        .map_err(certchain_chain::ChainError::from)?;
    tx.verify().map_err(certchain_chain::ChainError::from)?;

    let verification = state
        .verifier
        .verify_identity(&tx.inquiry_id, &tx.name, &tx.surname)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    if !verification.verified {
        return Err(ApiError::IdentityUnverified(format!(
            "inquiry status '{}'",
            verification.status
        )));
    }

    let transaction_id = state.chain.add_transaction(tx.clone()).await?;

    // Gossip the accepted submission to every known peer. Receivers that
    // already pooled or mined it answer 409 and the fan-out stops there.
    let peer_addresses = state.peers.read().await.addresses();
    if !peer_addresses.is_empty() {
        let client = state.client.clone();
        tokio::spawn(async move {
            let delivered = client.broadcast_certification(&peer_addresses, &tx).await;
            tracing::debug!(delivered, tx = %tx.id, "gossiped submission to peers");
        });
    }

    Ok(Json(SubmitResponse {
        success: true,
        transaction_id,
        message: "Certification submitted successfully",
    }))
}

pub async fn cert_by_public_key(
    State(state): State<ApiState>,
    Path(public_key): Path<String>,
) -> Result<Json<CertRecord>, ApiError> {
    match state.chain.cert_by_public_key(&public_key).await {
        Ok(record) => Ok(Json(record)),
        Err(certchain_chain::ChainError::NotFound) => Err(ApiError::NotFound),
        Err(e) => Err(e.into()),
    }
}

pub async fn cert_by_identity(
    State(state): State<ApiState>,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<CertRecord>, ApiError> {
    if query.name.is_empty() {
        return Err(certchain_chain::ChainError::MissingField("name".into()).into());
    }
    if query.surname.is_empty() {
        return Err(certchain_chain::ChainError::MissingField("surname".into()).into());
    }
    match state.chain.cert_by_identity(&query.name, &query.surname).await {
        Ok(record) => Ok(Json(record)),
        Err(certchain_chain::ChainError::NotFound) => Err(ApiError::NotFound),
        Err(e) => Err(e.into()),
    }
}

// ── Blocks ──────────────────────────────────────────────────────────────

pub async fn all_blocks(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.chain.all_blocks().await)
}

pub async fn latest_block(State(state): State<ApiState>) -> Json<Block> {
    Json(state.chain.tip().await)
}

pub async fn block_at(
    State(state): State<ApiState>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    state
        .chain
        .block_at(height)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

// ── Peers ───────────────────────────────────────────────────────────────

pub async fn list_peers(State(state): State<ApiState>) -> Json<Vec<certchain_network::PeerEntry>> {
    Json(state.peers.read().await.peers())
}

pub async fn add_peer(
    State(state): State<ApiState>,
    payload: Result<Json<AddPeerRequest>, JsonRejection>,
) -> Result<Json<AddPeerResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        ApiError::Chain(certchain_chain::ChainError::MalformedPayload(e.to_string()))
    })?;
    state.peers.write().await.add_peer(&req.address);
    Ok(Json(AddPeerResponse {
        success: true,
        message: "Peer added successfully",
    }))
}

/// Old clients expect a flat address list wrapped with the network id.
pub async fn legacy_peers(State(state): State<ApiState>) -> Json<LegacyPeersResponse> {
    let peers = state.peers.read().await.addresses();
    Json(LegacyPeersResponse {
        peers,
        network_id: state.network_id.clone(),
        timestamp: Utc::now().timestamp(),
    })
}

// ── Health ──────────────────────────────────────────────────────────────

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let tip = state.chain.tip().await;
    let peer_count = state.peers.read().await.len();
    Json(HealthResponse {
        status: "healthy",
        network_flag: state.network_flag.clone(),
        blockchain: HealthChain {
            height: tip.header.height,
            latest_hash: tip.hash(),
        },
        network: HealthNetwork {
            peer_count,
            network_id: state.network_id.clone(),
        },
        timestamp: Utc::now(),
    })
}
