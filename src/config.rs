use crate::error::{HaError, Result};
use crate::peers::PeerAddress;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_TRIES: u32 = 360;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 10000;
pub const DEFAULT_THREAD_POOL_SIZE: usize = 4;
pub const DEFAULT_NUM_STRIPED_LOCKS: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_CLUSTER_NAME: &str = "HASync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub peer_info: PeerInfoConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub event: EventConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerInfoStrategy {
    #[default]
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerInfoConfig {
    #[serde(default)]
    pub strategy: PeerInfoStrategy,
    #[serde(default)]
    pub static_urls: Vec<String>,
    #[serde(default)]
    pub dynamic: DynamicPeerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicPeerConfig {
    /// URL this node advertises to the membership group; excluded from peers.
    #[serde(default)]
    pub my_url: Option<String>,
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
}

impl Default for DynamicPeerConfig {
    fn default() -> Self {
        DynamicPeerConfig {
            my_url: None,
            cluster_name: default_cluster_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub socket_timeout_ms: u64,
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            user: String::new(),
            password: String::new(),
            connection_timeout_ms: DEFAULT_TIMEOUT_MS,
            socket_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_tries: DEFAULT_MAX_TRIES,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl HttpConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub synchronize: bool,
    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Added to the built-in cache allow-list.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            synchronize: true,
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            patterns: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    #[serde(default = "default_true")]
    pub synchronize: bool,
    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Event types to forward; empty forwards every project-scoped event.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for EventConfig {
    fn default() -> Self {
        EventConfig {
            synchronize: true,
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            patterns: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_true")]
    pub synchronize: bool,
    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_num_striped_locks")]
    pub num_striped_locks: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            synchronize: true,
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            num_striped_locks: DEFAULT_NUM_STRIPED_LOCKS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        HealthCheckConfig { enable: true }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:7800".to_string()
}

fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_tries() -> u32 {
    DEFAULT_MAX_TRIES
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

fn default_thread_pool_size() -> usize {
    DEFAULT_THREAD_POOL_SIZE
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_num_striped_locks() -> usize {
    DEFAULT_NUM_STRIPED_LOCKS
}

fn default_true() -> bool {
    true
}

impl NodeConfig {
    /// Standalone configuration: static strategy with no peers.
    pub fn standalone(node_id: impl Into<String>) -> Self {
        NodeConfig {
            node_id: node_id.into(),
            bind_addr: default_bind_addr(),
            peer_info: PeerInfoConfig::default(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            event: EventConfig::default(),
            index: IndexConfig::default(),
            health_check: HealthCheckConfig::default(),
        }
    }

    /// Parse and validate a `node.json` document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: NodeConfig = serde_json::from_str(content)?;
        config.validate()
    }

    /// Load node configuration from {data_dir}/node.json or return standalone default
    pub fn load_or_default(data_dir: &Path) -> Self {
        let node_json = data_dir.join("node.json");

        let loaded = if node_json.exists() {
            match std::fs::read_to_string(&node_json) {
                Ok(content) => match Self::from_json_str(&content) {
                    Ok(config) => {
                        tracing::info!(
                            "Loaded node config: node_id={}, strategy={:?}, static_peers={}",
                            config.node_id,
                            config.peer_info.strategy,
                            config.peer_info.static_urls.len()
                        );
                        Some(config)
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse node.json: {}, using defaults", e);
                        None
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read node.json: {}, using defaults", e);
                    None
                }
            }
        } else {
            None
        };

        let mut config = loaded.unwrap_or_else(|| {
            let node_id = std::env::var("HASYNC_NODE_ID").unwrap_or_else(|_| {
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "unknown".to_string())
            });
            tracing::info!(
                "No usable node.json found, running in standalone mode: node_id={}",
                node_id
            );
            Self::standalone(node_id)
        });

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(node_id) = std::env::var("HASYNC_NODE_ID") {
            if !node_id.is_empty() {
                self.node_id = node_id;
            }
        }
        if let Ok(bind_addr) = std::env::var("HASYNC_BIND_ADDR") {
            if !bind_addr.is_empty() {
                self.bind_addr = bind_addr;
            }
        }
        if let Ok(user) = std::env::var("HASYNC_HTTP_USER") {
            self.http.user = user;
        }
        if let Ok(password) = std::env::var("HASYNC_HTTP_PASSWORD") {
            self.http.password = password;
        }
    }

    /// Canonicalise peer URLs and clamp sizes that must be at least one.
    pub fn validate(mut self) -> Result<Self> {
        if self.node_id.trim().is_empty() {
            return Err(HaError::Config("node_id must not be empty".into()));
        }

        let mut urls = Vec::with_capacity(self.peer_info.static_urls.len());
        for raw in &self.peer_info.static_urls {
            if raw.trim().is_empty() {
                continue;
            }
            let url = PeerAddress::parse(raw)?.url().to_string();
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        self.peer_info.static_urls = urls;

        if let Some(my_url) = self.peer_info.dynamic.my_url.take() {
            if !my_url.trim().is_empty() {
                self.peer_info.dynamic.my_url = Some(PeerAddress::parse(&my_url)?.url().to_string());
            }
        }

        if self.http.max_tries == 0 {
            tracing::warn!("invalid value for http.max_tries; using 1");
            self.http.max_tries = 1;
        }
        clamp_min_one("cache.thread_pool_size", &mut self.cache.thread_pool_size);
        clamp_min_one("cache.queue_capacity", &mut self.cache.queue_capacity);
        clamp_min_one("event.thread_pool_size", &mut self.event.thread_pool_size);
        clamp_min_one("event.queue_capacity", &mut self.event.queue_capacity);
        clamp_min_one("index.thread_pool_size", &mut self.index.thread_pool_size);
        clamp_min_one("index.queue_capacity", &mut self.index.queue_capacity);
        clamp_min_one("index.num_striped_locks", &mut self.index.num_striped_locks);

        Ok(self)
    }
}

fn clamp_min_one(name: &str, value: &mut usize) {
    if *value == 0 {
        tracing::warn!("invalid value for {}; using 1", name);
        *value = 1;
    }
}
