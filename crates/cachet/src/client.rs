//! # Client
//!
//! Entry point for code that uses caches hosted by a provider, local or remote.
//! A client only mints [`CacheHandle`]s; every operation goes through them.

use std::sync::Arc;

use serde_json::json;

use cachetrpc::ProviderId;

use crate::engine::Engine;
use crate::error::Error;
use crate::error::Result;
use crate::error::decode_reply;
use crate::handle::CacheHandle;
use crate::id::CacheId;
use crate::procedures;

/// Cheap to clone; handles keep a clone of the client that made them.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    engine: Engine,
}

impl Client {
    pub fn new(engine: &Engine) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                engine: engine.clone(),
            }),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// The client carries no settings of its own.
    pub fn config(&self) -> String {
        "{}".to_string()
    }

    /// Builds a handle to cache `id` on `(address, provider_id)`.
    ///
    /// With `check`, the provider is asked first whether `id` exists and a
    /// missing cache is reported as [`Error::ResourceNotFound`]. Without it no
    /// request is made beyond resolving the address.
    pub async fn make_cache_handle(
        &self,
        address: &str,
        provider_id: ProviderId,
        id: CacheId,
        check: bool,
    ) -> Result<CacheHandle> {
        let peer = self.inner.engine.lookup(address).await?;

        if check {
            let reply = peer
                .call(provider_id, procedures::CHECK_CACHE, json!([id]))
                .await?;
            if !decode_reply::<bool>(reply)? {
                tracing::debug!(%address, provider = provider_id, cache = %id, "cache not found on provider");
                return Err(Error::ResourceNotFound(id));
            }
        }

        Ok(CacheHandle::new(self.clone(), peer, provider_id, id))
    }
}
