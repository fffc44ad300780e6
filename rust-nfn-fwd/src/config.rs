//! Node configuration.
//!
//! Settings come from an optional config file plus `NFN_`-prefixed
//! environment variables; the CLI maps its flags onto the same structs.

use rust_nfn_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

fn default_listen_addr() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_queue_capacity() -> usize {
    crate::stack::DEFAULT_QUEUE_CAPACITY
}

fn default_pit_lifetime_ms() -> u64 {
    rust_nfn_common::types::DEFAULT_PIT_LIFETIME_MS
}

fn default_pit_ageing_interval_ms() -> u64 {
    1000
}

fn default_cs_capacity() -> usize {
    rust_nfn_common::types::DEFAULT_CS_CAPACITY
}

fn default_cs_ttl_ms() -> u64 {
    10_000
}

fn default_rib_ageing_interval_ms() -> u64 {
    5000
}

fn default_solicitation_timeout_ms() -> u64 {
    3000
}

fn default_solicitation_max_retry() -> u32 {
    3
}

fn default_max_computations() -> usize {
    32
}

/// Settings for a forwarder node.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    pub listen_addr: String,
    /// Management TCP endpoint; absent disables the management channel.
    pub mgmt_addr: Option<String>,
    pub queue_capacity: usize,
    pub pit_lifetime_ms: u64,
    pub pit_ageing_interval_ms: u64,
    pub cs_capacity: usize,
    pub cs_ttl_ms: u64,
    pub rib_ageing_interval_ms: u64,
    /// Prefixes repositories may register under.
    pub registration_prefixes: Vec<String>,
    /// Addresses solicited for routes; enables the routing layer.
    pub broadcast_addrs: Vec<String>,
    /// Routes advertised to soliciting routing nodes instead of the
    /// repository registration payload.
    pub advertised_routes: Vec<(String, i64)>,
    /// Run the NFN computation layer on top of the ICN layer.
    pub enable_nfn: bool,
    pub max_computations: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            mgmt_addr: None,
            queue_capacity: default_queue_capacity(),
            pit_lifetime_ms: default_pit_lifetime_ms(),
            pit_ageing_interval_ms: default_pit_ageing_interval_ms(),
            cs_capacity: default_cs_capacity(),
            cs_ttl_ms: default_cs_ttl_ms(),
            rib_ageing_interval_ms: default_rib_ageing_interval_ms(),
            registration_prefixes: Vec::new(),
            broadcast_addrs: Vec::new(),
            advertised_routes: Vec::new(),
            enable_nfn: false,
            max_computations: default_max_computations(),
        }
    }
}

impl ForwarderConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        load_from(path)
    }

    pub fn pit_lifetime(&self) -> Duration {
        Duration::from_millis(self.pit_lifetime_ms)
    }

    pub fn pit_ageing_interval(&self) -> Duration {
        Duration::from_millis(self.pit_ageing_interval_ms)
    }

    pub fn cs_ttl(&self) -> Duration {
        Duration::from_millis(self.cs_ttl_ms)
    }

    pub fn rib_ageing_interval(&self) -> Duration {
        Duration::from_millis(self.rib_ageing_interval_ms)
    }
}

/// Settings for a repository node.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub listen_addr: String,
    pub mgmt_addr: Option<String>,
    pub queue_capacity: usize,
    /// Name under which the repository registers its service.
    pub service_name: String,
    /// Address announced in the registration Interest; defaults to the
    /// bound socket address.
    pub announced_addr: Option<String>,
    /// Where forwarders are solicited.
    pub broadcast_addr: String,
    pub solicitation_timeout_ms: u64,
    pub solicitation_max_retry: u32,
    /// Storage location reported on `getrepopath`.
    pub repo_path: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:0".to_string(),
            mgmt_addr: None,
            queue_capacity: default_queue_capacity(),
            service_name: "repo".to_string(),
            announced_addr: None,
            broadcast_addr: "255.255.255.255:9000".to_string(),
            solicitation_timeout_ms: default_solicitation_timeout_ms(),
            solicitation_max_retry: default_solicitation_max_retry(),
            repo_path: ":memory:".to_string(),
        }
    }
}

impl RepoConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        load_from(path)
    }

    pub fn solicitation_timeout(&self) -> Duration {
        Duration::from_millis(self.solicitation_timeout_ms)
    }
}

fn load_from<T: serde::de::DeserializeOwned>(path: Option<&str>) -> Result<T> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }
    builder
        .add_source(config::Environment::with_prefix("NFN"))
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(|e| Error::Other(format!("configuration error: {}", e)))
}
