//! The running node: wires the store, chain manager, verifier, HTTP API
//! and the P2P subsystems together.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use certchain_chain::{mining_loop, ChainManager, MINING_INTERVAL};
use certchain_network::{
    peer_maintenance_loop, CascadeDiscovery, Discovery, DiscoveryConfig, PeerManager, Synchronizer,
};
use certchain_rpc::{serve, ApiState};
use certchain_store::{BlockStore, CertStore, ChainStore};
use certchain_store_lmdb::{environment::DEFAULT_MAP_SIZE, LmdbStore};
use certchain_verifier::{IdentityVerifier, MockVerifier, PersonaClient};

use crate::config::{load_seed_file, Config};
use crate::error::NodeError;
use crate::shutdown::ShutdownController;

/// Timeout for joining background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Interval between cascade-discovery rounds (the cascade itself holds a
/// single-flight guard and cooldown).
const CASCADE_INTERVAL: Duration = Duration::from_secs(300);
/// Interval between certification-index expiry sweeps.
const CERT_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// A certchain node.
pub struct CertNode {
    pub config: Config,
    pub store: Arc<LmdbStore>,
    pub chain: Arc<ChainManager>,
    pub peers: Arc<RwLock<PeerManager>>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub shutdown: Arc<ShutdownController>,
    /// Set when no Persona API key is configured, so tests and keyless
    /// deployments can seed inquiries.
    pub mock_verifier: Option<Arc<MockVerifier>>,
}

impl CertNode {
    /// Open storage and assemble all subsystems. Nothing is spawned
    /// until [`run`](Self::run).
    pub fn new(config: Config) -> Result<Self, NodeError> {
        config.validate()?;

        let store = LmdbStore::open(&config.storage.data_dir, DEFAULT_MAP_SIZE)
            .map_err(|e| NodeError::Storage(e.to_string()))?;
        let store = Arc::new(store);
        tracing::info!(
            blocks = store.block_count().unwrap_or(0),
            certifications = store.cert_count().unwrap_or(0),
            data_dir = %config.storage.data_dir.display(),
            "storage opened"
        );

        let chain = Arc::new(ChainManager::new(
            Arc::clone(&store) as Arc<dyn ChainStore>,
            config.chain_config(),
        )?);

        let mut peer_table = PeerManager::new(config.network.max_peers);
        for address in &config.network.trusted_nodes {
            if peer_table.add_peer(address) {
                tracing::info!(address, "added trusted node");
            }
        }
        for address in load_seed_file(&config.network.seed_file)? {
            if peer_table.add_peer(&address) {
                tracing::info!(address, "added seed node");
            }
        }
        let peers = Arc::new(RwLock::new(peer_table));

        let (verifier, mock_verifier): (Arc<dyn IdentityVerifier>, Option<Arc<MockVerifier>>) =
            if config.api.persona_api_key.is_empty() {
                tracing::warn!("no Persona API key configured, using the mock verifier");
                let mock = Arc::new(MockVerifier::new());
                (Arc::clone(&mock) as Arc<dyn IdentityVerifier>, Some(mock))
            } else {
                let client = PersonaClient::new(
                    config.api.persona_base_url.clone(),
                    config.api.persona_api_key.clone(),
                    config.security.max_inquiry_age.as_secs(),
                );
                (Arc::new(client), None)
            };

        Ok(Self {
            config,
            store,
            chain,
            peers,
            verifier,
            shutdown: Arc::new(ShutdownController::new()),
            mock_verifier,
        })
    }

    /// Bind the sockets, spawn every subsystem task and block until
    /// shutdown, then drain.
    pub async fn run(&self) -> Result<(), NodeError> {
        let http_addr = (self.config.network.host.as_str(), self.config.network.port);
        let listener = TcpListener::bind(http_addr)
            .await
            .map_err(|e| NodeError::Bind(format!("HTTP {}:{}: {e}", http_addr.0, http_addr.1)))?;

        let discovery = Discovery::bind(DiscoveryConfig {
            flag: self.config.network.flag.clone(),
            host: self.config.network.host.clone(),
            http_port: self.config.network.port,
            discovery_port: self.config.network.discovery_port,
        })
        .await
        .map_err(|e| NodeError::Bind(format!("UDP discovery: {e}")))?;
        let discovery = Arc::new(discovery);

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        // HTTP API
        let state = ApiState::new(
            Arc::clone(&self.chain),
            Arc::clone(&self.peers),
            Arc::clone(&self.verifier),
            self.config.network.network_id.clone(),
            self.config.network.flag.clone(),
        );
        let http_shutdown = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = serve(listener, state, http_shutdown).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }));

        // UDP discovery: inbound listener + outbound announcer
        tasks.push(tokio::spawn(Arc::clone(&discovery).run_listener(
            Arc::clone(&self.peers),
            self.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(discovery.run_broadcaster(
            Arc::clone(&self.peers),
            self.shutdown.subscribe(),
        )));

        // Peer liveness sweep
        tasks.push(tokio::spawn(peer_maintenance_loop(
            Arc::clone(&self.peers),
            self.shutdown.subscribe(),
        )));

        // Cascade discovery: once at startup, then periodically
        let cascade = Arc::new(CascadeDiscovery::new(
            Arc::clone(&self.peers),
            self.config.network.flag.clone(),
        ));
        tasks.push(tokio::spawn(cascade_loop(
            cascade,
            self.shutdown.subscribe(),
        )));

        // Chain synchronizer
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&self.chain),
            Arc::clone(&self.peers),
        ));
        tasks.push(tokio::spawn(
            synchronizer.run(self.shutdown.subscribe()),
        ));

        // Mining
        if self.config.mining.enabled {
            tasks.push(tokio::spawn(mining_loop(
                Arc::clone(&self.chain),
                self.shutdown.subscribe(),
                MINING_INTERVAL,
            )));
        } else {
            tracing::info!("mining disabled by configuration");
        }

        // Certification-index expiry sweeper
        tasks.push(tokio::spawn(cert_expiry_loop(
            Arc::clone(&self.store),
            self.config.blockchain.cert_expiry,
            self.shutdown.subscribe(),
        )));

        let height = self.chain.height().await;
        tracing::info!(
            port = self.config.network.port,
            discovery_port = self.config.network.discovery_port,
            network_id = %self.config.network.network_id,
            height = height,
            "node started"
        );

        // Block until an OS signal or a programmatic shutdown.
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::select! {
            _ = self.shutdown.wait_for_signal() => {}
            _ = shutdown_rx.recv() => {}
        }

        tracing::info!("draining background tasks");
        for task in tasks {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!("task did not stop within the shutdown timeout");
            }
        }
        if let Err(e) = self.store.force_sync() {
            tracing::warn!(error = %e, "final store sync failed");
        }
        tracing::info!("node stopped");
        Ok(())
    }

    /// Trigger a programmatic shutdown of a running node.
    pub fn stop(&self) {
        self.shutdown.shutdown();
    }
}

async fn cascade_loop(cascade: Arc<CascadeDiscovery>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(CASCADE_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("cascade discovery shutting down");
                return;
            }
            _ = ticker.tick() => {}
        }
        let added = cascade.run().await;
        if added > 0 {
            tracing::info!(added, "cascade discovery found new peers");
        }
    }
}

async fn cert_expiry_loop(
    store: Arc<LmdbStore>,
    cert_expiry: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(CERT_EXPIRY_SWEEP_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("certification expiry sweeper shutting down");
                return;
            }
            _ = ticker.tick() => {}
        }
        let cutoff = Utc::now() - chrono::Duration::seconds(cert_expiry.as_secs() as i64);
        match store.expire_certs(cutoff) {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "expired certification index rows"),
            Err(e) => tracing::warn!(error = %e, "certification expiry sweep failed"),
        }
    }
}
