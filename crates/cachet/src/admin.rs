//! # Admin
//!
//! Remote lifecycle management: creates, opens, closes and destroys caches on a
//! provider, and asks a whole server to shut down.
//!
//! Every failure a provider reports comes back as the matching [`Error`]
//! variant, so callers can tell an authorization failure from an unknown type
//! or a missing cache.

use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

use cachetrpc::ProviderId;

use crate::engine::Engine;
use crate::error::Result;
use crate::error::decode_reply;
use crate::id::CacheId;
use crate::procedures;

#[derive(Clone)]
pub struct Admin {
    engine: Engine,
}

impl Admin {
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Creates a cache of type `type_name` from JSON configuration text.
    pub async fn create_cache(
        &self,
        address: &str,
        provider_id: ProviderId,
        type_name: &str,
        config: &str,
        token: &str,
    ) -> Result<CacheId> {
        self.invoke(address, provider_id, procedures::CREATE_CACHE, json!([token, type_name, config]))
            .await
    }

    /// Like [`create_cache`](Self::create_cache), with an already-built configuration.
    pub async fn create_cache_with(
        &self,
        address: &str,
        provider_id: ProviderId,
        type_name: &str,
        config: &Value,
        token: &str,
    ) -> Result<CacheId> {
        self.create_cache(address, provider_id, type_name, &config.to_string(), token)
            .await
    }

    /// Attaches a cache of type `type_name` to existing backend state.
    ///
    /// The provider registers it under a freshly generated id.
    pub async fn open_cache(
        &self,
        address: &str,
        provider_id: ProviderId,
        type_name: &str,
        config: &str,
        token: &str,
    ) -> Result<CacheId> {
        self.invoke(address, provider_id, procedures::OPEN_CACHE, json!([token, type_name, config]))
            .await
    }

    pub async fn open_cache_with(
        &self,
        address: &str,
        provider_id: ProviderId,
        type_name: &str,
        config: &Value,
        token: &str,
    ) -> Result<CacheId> {
        self.open_cache(address, provider_id, type_name, &config.to_string(), token)
            .await
    }

    /// Removes a cache from the provider without tearing it down.
    pub async fn close_cache(
        &self,
        address: &str,
        provider_id: ProviderId,
        id: CacheId,
        token: &str,
    ) -> Result<bool> {
        self.invoke(address, provider_id, procedures::CLOSE_CACHE, json!([token, id]))
            .await
    }

    /// Removes a cache from the provider and tears down its backend.
    pub async fn destroy_cache(
        &self,
        address: &str,
        provider_id: ProviderId,
        id: CacheId,
        token: &str,
    ) -> Result<bool> {
        self.invoke(address, provider_id, procedures::DESTROY_CACHE, json!([token, id]))
            .await
    }

    /// Asks the server at `address` to stop. Fire-and-forget: no reply is
    /// expected, and a server that disallows remote shutdown ignores it.
    pub async fn shutdown_server(&self, address: &str) -> Result<()> {
        tracing::debug!(%address, "requesting server shutdown");
        self.engine.shutdown_remote(address).await?;
        Ok(())
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        address: &str,
        provider_id: ProviderId,
        method: &str,
        args: Value,
    ) -> Result<T> {
        let peer = self.engine.lookup(address).await?;
        let reply = peer.call(provider_id, method, args).await?;
        decode_reply(reply).inspect_err(|e| {
            tracing::debug!(%address, provider = provider_id, method, error = %e, "admin request failed");
        })
    }
}
