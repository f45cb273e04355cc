//! UDP discovery: one socket, two inbound dialects, periodic broadcast.
//!
//! Structured JSON messages are the current protocol; the bare flag
//! string is kept for old clients. Anything not carrying the configured
//! flag is dropped without a reply: the flag is the network's admission
//! filter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, RwLock};

use crate::error::NetworkError;
use crate::peer_manager::PeerManager;

/// UDP read deadline so the listener observes shutdown promptly.
const READ_TIMEOUT: Duration = Duration::from_secs(1);
/// How often the outbound announce round runs.
const BROADCAST_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Admission flag; datagrams without it are dropped.
    pub flag: String,
    /// Host advertised in legacy `NODE:` replies.
    pub host: String,
    /// HTTP port advertised in announces.
    pub http_port: u16,
    /// UDP port the discovery socket binds.
    pub discovery_port: u16,
}

#[derive(Serialize, Deserialize)]
struct DiscoveryMessage {
    flag: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(default)]
    timestamp: Option<i64>,
}

pub struct Discovery {
    socket: Arc<UdpSocket>,
    config: DiscoveryConfig,
    node_id: String,
}

impl Discovery {
    /// Bind the discovery socket and enable broadcast.
    pub async fn bind(config: DiscoveryConfig) -> Result<Self, NetworkError> {
        let socket = UdpSocket::bind(("0.0.0.0", config.discovery_port)).await?;
        socket.set_broadcast(true)?;
        tracing::info!(port = config.discovery_port, "UDP discovery listening");
        Ok(Self {
            socket: Arc::new(socket),
            config,
            node_id: format!("node-{:08x}", rand::random::<u32>()),
        })
    }

    /// Inbound loop: answer client discoveries, learn node announces.
    pub async fn run_listener(
        self: Arc<Self>,
        peers: Arc<RwLock<PeerManager>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut buf = [0u8; 1024];
        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("UDP listener shutting down");
                    return;
                }
                result = tokio::time::timeout(READ_TIMEOUT, self.socket.recv_from(&mut buf)) => result,
            };

            let (len, from) = match received {
                Err(_) => continue, // read deadline, loop to observe shutdown
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "UDP read error");
                    continue;
                }
                Ok(Ok(pair)) => pair,
            };

            self.handle_datagram(&buf[..len], from, &peers).await;
        }
    }

    async fn handle_datagram(
        &self,
        data: &[u8],
        from: SocketAddr,
        peers: &Arc<RwLock<PeerManager>>,
    ) {
        if let Ok(msg) = serde_json::from_slice::<DiscoveryMessage>(data) {
            if msg.flag != self.config.flag {
                tracing::trace!(%from, "dropping datagram with wrong flag");
                return;
            }
            match msg.kind.as_str() {
                "client_discovery" => {
                    tracing::info!(
                        %from,
                        client = msg.client_id.as_deref().unwrap_or("unknown"),
                        "discovery request"
                    );
                    self.send_announce(from).await;
                }
                "node_announce" => {
                    if msg.client_id.as_deref() == Some(self.node_id.as_str()) {
                        // our own announce reflected back through the
                        // broadcast segment
                        return;
                    }
                    let Some(port) = msg.port else {
                        return;
                    };
                    let address = format!("{}:{}", from.ip(), port);
                    peers.write().await.add_peer(&address);
                }
                other => {
                    tracing::trace!(%from, kind = other, "ignoring unknown discovery type");
                }
            }
            return;
        }

        // Legacy dialect: the bare flag string.
        let text = String::from_utf8_lossy(data);
        if text.trim() == self.config.flag {
            tracing::info!(%from, "legacy discovery request");
            let reply = format!("NODE:{}:{}", self.config.host, self.config.http_port);
            if let Err(e) = self.socket.send_to(reply.as_bytes(), from).await {
                tracing::warn!(error = %e, %from, "failed to answer legacy discovery");
            }
        }
    }

    async fn send_announce(&self, to: SocketAddr) {
        let announce = DiscoveryMessage {
            flag: self.config.flag.clone(),
            version: Some("1.0".into()),
            kind: "node_announce".into(),
            client_id: Some(self.node_id.clone()),
            port: Some(self.config.http_port),
            timestamp: Some(Utc::now().timestamp()),
        };
        let bytes = serde_json::to_vec(&announce).expect("static message shape");
        if let Err(e) = self.socket.send_to(&bytes, to).await {
            tracing::warn!(error = %e, %to, "failed to send node announce");
        }
    }

    /// Outbound loop: periodic broadcast to the local segment plus
    /// unicast probes to every known peer's discovery port.
    pub async fn run_broadcaster(
        self: Arc<Self>,
        peers: Arc<RwLock<PeerManager>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(BROADCAST_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("UDP broadcaster shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let probe = DiscoveryMessage {
                flag: self.config.flag.clone(),
                version: Some("1.0".into()),
                kind: "client_discovery".into(),
                client_id: Some(self.node_id.clone()),
                port: Some(self.config.http_port),
                timestamp: Some(Utc::now().timestamp()),
            };
            let bytes = serde_json::to_vec(&probe).expect("static message shape");

            let broadcast_addr = ("255.255.255.255", self.config.discovery_port);
            if let Err(e) = self.socket.send_to(&bytes, broadcast_addr).await {
                tracing::debug!(error = %e, "discovery broadcast failed");
            }

            let known = peers.read().await.addresses();
            for address in known {
                let Some((host, _)) = address.rsplit_once(':') else {
                    continue;
                };
                let target = (host.to_string(), self.config.discovery_port);
                if let Err(e) = self.socket.send_to(&bytes, target).await {
                    tracing::trace!(error = %e, peer = %address, "unicast probe failed");
                }
            }
        }
    }
}
