//! # Provider
//!
//! The server side of cachet. A provider owns the caches created through it and
//! answers the lifecycle and operation procedures for its provider id.
//!
//! ## Invariants
//!
//! - The registry lock guards map shape only (lookup, insert, erase); no backend
//!   code runs while it is held.
//! - The token is checked before any other work, without taking the lock.
//! - Every handler replies exactly once with a `RequestResult`.
//! - A cache leaves the registry exactly once, by `close` or by `destroy`; only
//!   `destroy` runs the backend's teardown, after the removal.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde_json::Value;
use serde_json::json;
use tokio::sync::Mutex;

use cachetrpc::ProviderId;

use crate::backend::Backend;
use crate::backend::BackendFactory;
use crate::config::ProviderConfig;
use crate::engine::Engine;
use crate::error::Error;
use crate::error::RequestResult;
use crate::error::Result;
use crate::id::CacheId;
use crate::procedures;

/// A registered cache.
struct Entry {
    type_name: String,
    backend: Arc<dyn Backend>,
}

/// Holds its provider id on the engine until it is deregistered or dropped.
pub struct Provider {
    inner: Arc<ProviderInner>,
    registered: AtomicBool,
}

struct ProviderInner {
    engine: Engine,
    provider_id: ProviderId,
    token: String,
    factory: Arc<BackendFactory>,
    caches: Mutex<HashMap<CacheId, Entry>>,
}

impl Provider {
    /// Registers a provider with no caches under `provider_id`.
    ///
    /// Fails with [`Error::ProviderIdInUse`] while another provider holds the id
    /// on this engine.
    pub fn new(
        engine: &Engine,
        provider_id: ProviderId,
        token: impl Into<String>,
        factory: Arc<BackendFactory>,
    ) -> Result<Self> {
        if !engine.claim_provider(provider_id) {
            tracing::error!(provider = provider_id, "provider id already in use");
            return Err(Error::ProviderIdInUse(provider_id));
        }

        let inner = Arc::new(ProviderInner {
            engine: engine.clone(),
            provider_id,
            token: token.into(),
            factory,
            caches: Mutex::new(HashMap::new()),
        });
        ProviderInner::register(&inner);
        tracing::trace!(provider = provider_id, "registered provider");
        Ok(Self {
            inner,
            registered: AtomicBool::new(true),
        })
    }

    /// Registers a provider and creates the caches listed in `config`.
    pub async fn start(
        engine: &Engine,
        provider_id: ProviderId,
        config: ProviderConfig,
        factory: Arc<BackendFactory>,
    ) -> Result<Self> {
        let provider = Self::new(engine, provider_id, config.token.clone(), factory)?;
        for cache in &config.caches {
            let id = provider
                .inner
                .create_cache(&config.token, &cache.type_name, &cache.config.to_string())
                .await?;
            tracing::info!(provider = provider_id, cache = %id, backend = %cache.type_name, "created configured cache");
        }
        Ok(provider)
    }

    pub fn provider_id(&self) -> ProviderId {
        self.inner.provider_id
    }

    /// Number of caches currently registered.
    pub async fn cache_count(&self) -> usize {
        self.inner.caches.lock().await.len()
    }

    /// Whether `id` is currently registered.
    pub async fn contains(&self, id: &CacheId) -> bool {
        self.inner.caches.lock().await.contains_key(id)
    }

    /// Stops answering calls and frees the provider id. Registered caches stay
    /// until the provider is dropped. Only the first call has an effect.
    pub fn deregister(&self) {
        if !self.registered.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(provider = self.inner.provider_id, "deregistering provider");
        for name in procedures::PROVIDER_PROCEDURES {
            self.inner.engine.deregister(self.inner.provider_id, name);
        }
        self.inner.engine.release_provider(self.inner.provider_id);
    }

    /// Describes the provider: id, whether a token is set, known backend types,
    /// and each registered cache with its type.
    pub async fn config(&self) -> Value {
        let caches: serde_json::Map<String, Value> = self
            .inner
            .caches
            .lock()
            .await
            .iter()
            .map(|(id, entry)| (id.to_string(), json!({ "type": entry.type_name })))
            .collect();

        json!({
            "provider_id": self.inner.provider_id,
            "token_protected": !self.inner.token.is_empty(),
            "backend_types": self.inner.factory.type_names(),
            "caches": caches,
        })
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.deregister();
    }
}

impl ProviderInner {
    fn register(this: &Arc<Self>) {
        let engine = &this.engine;
        let id = this.provider_id;

        let provider = this.clone();
        engine.define(id, procedures::CREATE_CACHE, move |(token, type_name, config): (String, String, String)| {
            let provider = provider.clone();
            async move { provider.create_cache(&token, &type_name, &config).await }
        });

        let provider = this.clone();
        engine.define(id, procedures::OPEN_CACHE, move |(token, type_name, config): (String, String, String)| {
            let provider = provider.clone();
            async move { provider.open_cache(&token, &type_name, &config).await }
        });

        let provider = this.clone();
        engine.define(id, procedures::CLOSE_CACHE, move |(token, cache_id): (String, CacheId)| {
            let provider = provider.clone();
            async move { provider.close_cache(&token, cache_id).await }
        });

        let provider = this.clone();
        engine.define(id, procedures::DESTROY_CACHE, move |(token, cache_id): (String, CacheId)| {
            let provider = provider.clone();
            async move { provider.destroy_cache(&token, cache_id).await }
        });

        let provider = this.clone();
        engine.define(id, procedures::CHECK_CACHE, move |(cache_id,): (CacheId,)| {
            let provider = provider.clone();
            async move { provider.check_cache(cache_id).await }
        });

        let provider = this.clone();
        engine.define(id, procedures::SAY_HELLO, move |(cache_id,): (CacheId,)| {
            let provider = provider.clone();
            async move { provider.say_hello(cache_id).await }
        });

        let provider = this.clone();
        engine.define(id, procedures::COMPUTE_SUM, move |(cache_id, x, y): (CacheId, i32, i32)| {
            let provider = provider.clone();
            async move { provider.compute_sum(cache_id, x, y).await }
        });
    }

    /// Lock-free token check; an empty provider token admits everyone.
    fn authorize(&self, token: &str) -> Result<()> {
        if !self.token.is_empty() && self.token != token {
            tracing::error!(provider = self.provider_id, "invalid security token");
            return Err(Error::Authorization);
        }
        Ok(())
    }

    /// Looks a cache up, releasing the lock before the caller uses it.
    async fn find_cache(&self, id: CacheId) -> Result<Arc<dyn Backend>> {
        let caches = self.caches.lock().await;
        match caches.get(&id) {
            Some(entry) => Ok(entry.backend.clone()),
            None => {
                tracing::error!(provider = self.provider_id, cache = %id, "cache not found");
                Err(Error::ResourceNotFound(id))
            }
        }
    }

    async fn create_cache(&self, token: &str, type_name: &str, config: &str) -> RequestResult<CacheId> {
        tracing::trace!(provider = self.provider_id, backend = type_name, config, "received create request");
        self.add_cache("create", token, type_name, config, |config| {
            self.factory.instantiate_for_create(type_name, &self.engine, config)
        })
        .await
    }

    async fn open_cache(&self, token: &str, type_name: &str, config: &str) -> RequestResult<CacheId> {
        tracing::trace!(provider = self.provider_id, backend = type_name, config, "received open request");
        self.add_cache("open", token, type_name, config, |config| {
            self.factory.instantiate_for_open(type_name, &self.engine, config)
        })
        .await
    }

    /// The flow shared by create and open; `construct` picks the factory path.
    async fn add_cache<F>(
        &self,
        verb: &'static str,
        token: &str,
        type_name: &str,
        config: &str,
        construct: F,
    ) -> RequestResult<CacheId>
    where
        F: FnOnce(&Value) -> Result<Box<dyn Backend>>,
    {
        self.authorize(token)?;

        let config = parse_config(config).inspect_err(|e| {
            tracing::error!(provider = self.provider_id, error = %e, "could not parse cache configuration");
        })?;

        let id = CacheId::generate();
        let backend = construct(&config).inspect_err(|e| {
            tracing::error!(provider = self.provider_id, cache = %id, backend = type_name, error = %e, "could not {} cache", verb);
        })?;

        self.caches.lock().await.insert(
            id,
            Entry {
                type_name: type_name.to_string(),
                backend: Arc::from(backend),
            },
        );
        tracing::debug!(provider = self.provider_id, cache = %id, backend = type_name, "cache {}d", verb);
        Ok(id)
    }

    async fn close_cache(&self, token: &str, id: CacheId) -> RequestResult<bool> {
        tracing::trace!(provider = self.provider_id, cache = %id, "received close request");
        self.authorize(token)?;

        if self.caches.lock().await.remove(&id).is_none() {
            tracing::error!(provider = self.provider_id, cache = %id, "cache not found");
            return Err(Error::ResourceNotFound(id));
        }
        tracing::debug!(provider = self.provider_id, cache = %id, "cache closed");
        Ok(true)
    }

    async fn destroy_cache(&self, token: &str, id: CacheId) -> RequestResult<bool> {
        tracing::trace!(provider = self.provider_id, cache = %id, "received destroy request");
        self.authorize(token)?;

        let removed = self.caches.lock().await.remove(&id);
        let Some(entry) = removed else {
            tracing::error!(provider = self.provider_id, cache = %id, "cache not found");
            return Err(Error::ResourceNotFound(id));
        };

        let result = entry.backend.destroy().await;
        match &result {
            Ok(_) => tracing::debug!(provider = self.provider_id, cache = %id, "cache destroyed"),
            Err(e) => tracing::error!(provider = self.provider_id, cache = %id, error = %e, "cache teardown failed"),
        }
        result
    }

    /// Existence probe. Absence is `Ok(false)`, never an error.
    async fn check_cache(&self, id: CacheId) -> RequestResult<bool> {
        tracing::trace!(provider = self.provider_id, cache = %id, "received check request");
        Ok(self.caches.lock().await.contains_key(&id))
    }

    /// One-way; a missing cache is only logged since nobody waits for a reply.
    async fn say_hello(&self, id: CacheId) {
        tracing::trace!(provider = self.provider_id, cache = %id, "received say_hello request");
        if let Ok(backend) = self.find_cache(id).await {
            backend.say_hello().await;
        }
    }

    async fn compute_sum(&self, id: CacheId, x: i32, y: i32) -> RequestResult<i32> {
        tracing::trace!(provider = self.provider_id, cache = %id, x, y, "received compute_sum request");
        let backend = self.find_cache(id).await?;
        backend.compute_sum(x, y).await
    }
}

/// Configuration text must be a JSON object, whatever the backend.
fn parse_config(text: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::MalformedConfig(e.to_string()))?;
    if !value.is_object() {
        return Err(Error::MalformedConfig(format!("expected a JSON object, found {}", text)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_must_be_an_object() {
        assert!(parse_config(r#"{ "path" : "mydb" }"#).is_ok());
        assert!(parse_config("{}").is_ok());
        assert!(matches!(parse_config("{ path: mydb"), Err(Error::MalformedConfig(_))));
        assert!(matches!(parse_config("[1, 2]"), Err(Error::MalformedConfig(_))));
        assert!(matches!(parse_config("42"), Err(Error::MalformedConfig(_))));
        assert!(matches!(parse_config(""), Err(Error::MalformedConfig(_))));
    }
}
