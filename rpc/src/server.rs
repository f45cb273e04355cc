//! Router construction and the HTTP serving loop.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use certchain_chain::ChainManager;
use certchain_network::{NodeClient, PeerManager};
use certchain_verifier::IdentityVerifier;

use crate::handlers;

/// Timeout for gossip fan-out requests.
const GOSSIP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state behind every handler.
#[derive(Clone)]
pub struct ApiState {
    pub chain: Arc<ChainManager>,
    pub peers: Arc<RwLock<PeerManager>>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub client: NodeClient,
    pub network_id: String,
    pub network_flag: String,
}

impl ApiState {
    pub fn new(
        chain: Arc<ChainManager>,
        peers: Arc<RwLock<PeerManager>>,
        verifier: Arc<dyn IdentityVerifier>,
        network_id: impl Into<String>,
        network_flag: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            peers,
            verifier,
            client: NodeClient::new(GOSSIP_TIMEOUT),
            network_id: network_id.into(),
            network_flag: network_flag.into(),
        }
    }
}

/// Build the full route table. CORS is permissive; this is a public
/// query surface.
pub fn router(state: ApiState) -> Router {
    Router::new()
        // legacy endpoints kept for old clients
        .route("/peers", get(handlers::legacy_peers))
        .route("/api/certifications", post(handlers::submit_certification))
        // current API
        .route("/api/v1/certifications", post(handlers::submit_certification))
        .route(
            "/api/v1/certifications/by-public-key/{public_key}",
            get(handlers::cert_by_public_key),
        )
        .route(
            "/api/v1/certifications/by-identity",
            get(handlers::cert_by_identity),
        )
        .route("/api/v1/blocks", get(handlers::all_blocks))
        .route("/api/v1/blocks/latest", get(handlers::latest_block))
        .route("/api/v1/blocks/{height}", get(handlers::block_at))
        .route(
            "/api/v1/peers",
            get(handlers::list_peers).post(handlers::add_peer),
        )
        .route("/api/v1/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until shutdown, draining in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let app = router(state);
    tracing::info!(addr = %listener.local_addr()?, "HTTP API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server draining");
        })
        .await
}
