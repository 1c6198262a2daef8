//! Daemon configuration file.
//!
//! ```json
//! {
//!     "engine": { "name": "cachetd", "enable_remote_shutdown": true },
//!     "listen": "tcp://0.0.0.0:7000",
//!     "providers": [
//!         {
//!             "provider_id": 42,
//!             "token": "s3cret",
//!             "caches": [{ "type": "dummy", "config": { "path": "mydb" } }]
//!         }
//!     ]
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use cachet::CacheConfig;
use cachet::EngineConfig;
use cachet::ProviderConfig;
use cachet::ProviderId;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default = "default_engine")]
    pub engine: EngineConfig,
    /// `tcp://host:port`. Without it the daemon only serves its local address.
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEntry {
    pub provider_id: ProviderId,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub caches: Vec<CacheConfig>,
}

fn default_engine() -> EngineConfig {
    EngineConfig::new("cachetd")
}

impl ProviderEntry {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            token: self.token.clone(),
            caches: self.caches.clone(),
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;

        let mut seen = std::collections::HashSet::new();
        for provider in &config.providers {
            if !seen.insert(provider.provider_id) {
                anyhow::bail!("provider id {} is configured twice", provider.provider_id);
            }
        }
        Ok(config)
    }
}
