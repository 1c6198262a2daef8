//! Client-side reference to one cache.

use std::sync::Arc;

use serde_json::json;

use cachetrpc::ProviderId;

use crate::client::Client;
use crate::error::Result;
use crate::error::decode_reply;
use crate::id::CacheId;
use crate::peer::Peer;
use crate::procedures;
use crate::request::AsyncRequest;

/// Names a cache by `(address, provider id, cache id)`.
///
/// A handle holds no lease: the cache may be destroyed behind its back, after
/// which operations fail with `ResourceNotFound`. Clones share the connection.
#[derive(Clone)]
pub struct CacheHandle {
    client: Client,
    peer: Arc<Peer>,
    provider_id: ProviderId,
    id: CacheId,
}

impl CacheHandle {
    pub(crate) fn new(client: Client, peer: Arc<Peer>, provider_id: ProviderId, id: CacheId) -> Self {
        Self {
            client,
            peer,
            provider_id,
            id,
        }
    }

    pub fn id(&self) -> CacheId {
        self.id
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    pub fn address(&self) -> &str {
        self.peer.address()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Asks the cache to log a greeting. Returns once the request is sent.
    pub async fn say_hello(&self) -> Result<()> {
        self.peer
            .notify(self.provider_id, procedures::SAY_HELLO, json!([self.id]))
            .await?;
        Ok(())
    }

    /// Computes `x + y` on the cache and waits for the result.
    pub async fn compute_sum(&self, x: i32, y: i32) -> Result<i32> {
        self.compute_sum_async(x, y).await?.wait().await
    }

    /// Sends `x + y` to the cache; the result is read with [`AsyncRequest::wait`].
    pub async fn compute_sum_async(&self, x: i32, y: i32) -> Result<AsyncRequest<i32>> {
        let pending = self
            .peer
            .start_call(self.provider_id, procedures::COMPUTE_SUM, json!([self.id, x, y]))
            .await?;
        Ok(AsyncRequest::new(pending, decode_reply::<i32>))
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("address", &self.peer.address())
            .field("provider_id", &self.provider_id)
            .field("id", &self.id)
            .finish()
    }
}
