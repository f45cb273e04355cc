//! Node configuration: YAML file with per-section defaults, plus the
//! seed-node file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use certchain_chain::ChainConfig;

use crate::error::NodeError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Opaque network identifier echoed in responses.
    #[serde(default = "default_network_id")]
    pub network_id: String,
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// UDP admission token; datagrams without it are dropped.
    #[serde(default = "default_flag")]
    pub flag: String,
    #[serde(default)]
    pub trusted_nodes: Vec<String>,
    /// Seed-node list, one `host:port` per line.
    #[serde(default = "default_seed_file")]
    pub seed_file: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockchainConfig {
    /// Target block interval, drives the difficulty retarget.
    #[serde(default = "default_block_time", with = "duration_str")]
    pub block_time: Duration,
    /// Certification index rows older than this are swept.
    #[serde(default = "default_cert_expiry", with = "duration_str")]
    pub cert_expiry: Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_persona_base_url")]
    pub persona_base_url: String,
    /// Empty selects the mock verifier.
    #[serde(default)]
    pub persona_api_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MiningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_initial_difficulty")]
    pub initial_difficulty: u32,
    #[serde(default = "default_difficulty_adjust")]
    pub difficulty_adjust: u64,
    #[serde(default = "default_max_trans_per_block")]
    pub max_trans_per_block: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub require_signature: bool,
    #[serde(default = "default_max_inquiry_age", with = "duration_str")]
    pub max_inquiry_age: Duration,
}

// ── Serde default helpers ───────────────────────────────────────────────

fn default_port() -> u16 {
    8333
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_network_id() -> String {
    "certchain".to_string()
}

fn default_max_peers() -> usize {
    50
}

fn default_discovery_port() -> u16 {
    45678
}

fn default_flag() -> String {
    "CERTCHAIN-NET".to_string()
}

fn default_seed_file() -> PathBuf {
    PathBuf::from("nodes_ip.txt")
}

fn default_block_time() -> Duration {
    Duration::from_secs(600)
}

fn default_cert_expiry() -> Duration {
    Duration::from_secs(8760 * 3600)
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_persona_base_url() -> String {
    "https://api.withpersona.com/api/v1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_initial_difficulty() -> u32 {
    16
}

fn default_difficulty_adjust() -> u64 {
    2016
}

fn default_max_trans_per_block() -> usize {
    1000
}

fn default_max_inquiry_age() -> Duration {
    Duration::from_secs(86_400)
}

impl Default for NetworkConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("defaults always deserialize")
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("defaults always deserialize")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("defaults always deserialize")
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("defaults always deserialize")
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("defaults always deserialize")
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("defaults always deserialize")
    }
}

// ── Durations as "10m" / "24h" strings ──────────────────────────────────

mod duration_str {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_duration(&raw).map_err(de::Error::custom)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (number, unit) = s.split_at(s.len().saturating_sub(1));
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;
    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        _ => return Err(format!("invalid duration unit in '{s}' (expected s, m or h)")),
    };
    Ok(Duration::from_secs(secs))
}

// ── Loading & validation ────────────────────────────────────────────────

impl Config {
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self =
            serde_yaml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.network.port == 0 {
            return Err(NodeError::Config("network.port must be non-zero".into()));
        }
        if self.network.discovery_port == 0 {
            return Err(NodeError::Config(
                "network.discovery_port must be non-zero".into(),
            ));
        }
        if self.network.network_id.is_empty() {
            return Err(NodeError::Config("network.network_id cannot be empty".into()));
        }
        if self.network.flag.is_empty() {
            return Err(NodeError::Config("network.flag cannot be empty".into()));
        }
        if self.network.max_peers == 0 {
            return Err(NodeError::Config("network.max_peers must be positive".into()));
        }
        if !(1..=32).contains(&self.mining.initial_difficulty) {
            return Err(NodeError::Config(
                "mining.initial_difficulty must be between 1 and 32".into(),
            ));
        }
        if self.mining.difficulty_adjust == 0 {
            return Err(NodeError::Config(
                "mining.difficulty_adjust must be positive".into(),
            ));
        }
        if self.mining.max_trans_per_block == 0 {
            return Err(NodeError::Config(
                "mining.max_trans_per_block must be positive".into(),
            ));
        }
        if self.blockchain.block_time.is_zero() {
            return Err(NodeError::Config("blockchain.block_time must be positive".into()));
        }
        Ok(())
    }

    /// Chain-level view of this configuration.
    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            initial_difficulty: self.mining.initial_difficulty,
            difficulty_adjust: self.mining.difficulty_adjust,
            max_trans_per_block: self.mining.max_trans_per_block,
            target_block_time_secs: self.blockchain.block_time.as_secs(),
            require_signature: self.security.require_signature,
        }
    }
}

/// Parse the seed-node list: UTF-8 text, `#` comments, blank lines
/// ignored, one `host:port` per line. A missing file is an empty list.
pub fn load_seed_file(path: &Path) -> std::io::Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
