//! # Engine
//!
//! The RPC substrate shared by providers, clients and admins of one process.
//!
//! - **Procedures**: named, typed handlers registered per provider id. Incoming
//!   calls are dispatched on the tokio worker pool, one task per call.
//! - **Peers**: addresses resolve to cached [`Peer`]s. `local://<name>` is the
//!   engine's own address, served through an in-process duplex link;
//!   `tcp://host:port` opens a framed TCP connection.
//! - **Shutdown**: a watch flag stops every listener and serving loop. Remote
//!   shutdown requests are honored only when the configuration allows it.

use std::future::Future;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use dashmap::DashSet;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use cachetrpc::CallFrame;
use cachetrpc::FailureReason;
use cachetrpc::Frame;
use cachetrpc::ProviderId;
use cachetrpc::ReplyFrame;

use crate::peer;
use crate::peer::Peer;
use crate::transport;
use crate::transport::DuplexTransport;
use crate::transport::TcpTransport;
use crate::transport::Transport;

pub const LOCAL_SCHEME: &str = "local://";
pub const TCP_SCHEME: &str = "tcp://";

/// Engine settings, usually read from the daemon configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Names the engine's own `local://` address.
    pub name: String,
    /// Whether a `Shutdown` frame from a remote peer stops this engine.
    #[serde(default)]
    pub enable_remote_shutdown: bool,
}

impl EngineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enable_remote_shutdown: false,
        }
    }

    pub fn with_remote_shutdown(mut self, enabled: bool) -> Self {
        self.enable_remote_shutdown = enabled;
        self
    }
}

type Procedure =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, FailureReason>> + Send + Sync>;

/// Cheap to clone; all clones share the same procedures, peers and shutdown flag.
///
/// Serving loops and listeners only hold a weak reference: once the last
/// `Engine` handle is dropped they stop, and so do the peers they were feeding.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    self_address: String,
    procedures: DashMap<(ProviderId, String), Procedure>,
    providers: DashSet<ProviderId>,
    peers: DashMap<String, Arc<Peer>>,
    shutdown: watch::Sender<bool>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let self_address = format!("{}{}", LOCAL_SCHEME, config.name);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(EngineInner {
                config,
                self_address,
                procedures: DashMap::new(),
                providers: DashSet::new(),
                peers: DashMap::new(),
                shutdown,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The in-process address of this engine.
    pub fn self_address(&self) -> &str {
        &self.inner.self_address
    }

    /// Registers a procedure under `(provider_id, name)`.
    ///
    /// Arguments arrive as a JSON array and are deserialized into `A` (usually a
    /// tuple); the handler's reply is serialized back. Redefining a name replaces
    /// the previous handler.
    pub fn define<A, R, F, Fut>(&self, provider_id: ProviderId, name: &str, handler: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let procedure: Procedure = Arc::new(move |args: Value| {
            let handler = handler.clone();
            async move {
                let args: A = serde_json::from_value(args)
                    .map_err(|e| FailureReason::BadArguments(e.to_string()))?;
                let reply = handler(args).await;
                serde_json::to_value(reply).map_err(|e| FailureReason::BadReply(e.to_string()))
            }
            .boxed()
        });

        let key = (provider_id, name.to_string());
        if self.inner.procedures.insert(key, procedure).is_some() {
            tracing::warn!(provider = provider_id, method = name, "procedure redefined");
        }
    }

    /// Removes one procedure. Returns whether it was registered.
    pub fn deregister(&self, provider_id: ProviderId, name: &str) -> bool {
        self.inner.procedures.remove(&(provider_id, name.to_string())).is_some()
    }

    /// Reserves `provider_id` for a single provider. Returns false when it is
    /// already held.
    pub fn claim_provider(&self, provider_id: ProviderId) -> bool {
        self.inner.providers.insert(provider_id)
    }

    /// Gives `provider_id` back after its holder has removed its procedures.
    pub fn release_provider(&self, provider_id: ProviderId) {
        self.inner.providers.remove(&provider_id);
    }

    /// Whether `(provider_id, name)` currently has a handler.
    pub fn is_defined(&self, provider_id: ProviderId, name: &str) -> bool {
        self.inner.procedures.contains_key(&(provider_id, name.to_string()))
    }

    /// Runs one call against the local procedure table.
    pub async fn dispatch(&self, call: CallFrame) -> Result<Value, FailureReason> {
        let procedure = self
            .inner
            .procedures
            .get(&(call.provider_id, call.method.clone()))
            .map(|entry| entry.value().clone());

        let Some(procedure) = procedure else {
            tracing::debug!(provider = call.provider_id, method = %call.method, "no such procedure");
            return Err(FailureReason::ProcedureNotFound {
                provider_id: call.provider_id,
                method: call.method,
            });
        };

        // A separate task so that a panicking handler still produces a reply.
        match tokio::spawn(procedure(call.args)).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(provider = call.provider_id, method = %call.method, error = %e, "handler aborted");
                Err(FailureReason::HandlerAborted(e.to_string()))
            }
        }
    }

    /// Serves calls arriving on `transport` until it closes or the engine shuts down.
    pub fn serve(&self, transport: Arc<dyn Transport>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                // Also resolves when the engine is dropped and the sender goes away.
                let msg = tokio::select! {
                    _ = shutdown.wait_for(|stop| *stop) => break,
                    msg = transport.recv() => msg,
                };
                let Some(engine) = Self::upgrade(&weak) else {
                    break;
                };
                match msg {
                    Ok(Some(bytes)) => engine.handle_frame(&bytes, &transport),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "serving loop stopped on transport error");
                        break;
                    }
                }
            }
        })
    }

    fn upgrade(weak: &Weak<EngineInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn handle_frame(&self, bytes: &[u8], transport: &Arc<dyn Transport>) {
        match cachetrpc::decode(bytes) {
            Ok(Frame::Call(call)) => {
                let engine = self.clone();
                let transport = transport.clone();
                tokio::spawn(async move { engine.answer(call, transport).await });
            }
            Ok(Frame::Shutdown) => {
                if self.inner.config.enable_remote_shutdown {
                    tracing::info!(engine = %self.inner.config.name, "remote shutdown requested");
                    self.shutdown();
                } else {
                    tracing::warn!(engine = %self.inner.config.name, "remote shutdown refused: not enabled");
                }
            }
            Ok(Frame::Reply(reply)) => {
                tracing::warn!(seq = reply.seq, "stray reply on a serving connection");
            }
            Err(e) => {
                tracing::warn!(error = %e, "undecodable frame dropped");
            }
        }
    }

    async fn answer(&self, call: CallFrame, transport: Arc<dyn Transport>) {
        let seq = call.seq;
        let expects_reply = call.expects_reply;
        let status = self.dispatch(call).await;

        if !expects_reply {
            if let Err(reason) = status {
                tracing::debug!(seq, %reason, "one-way call failed");
            }
            return;
        }

        let frame = Frame::Reply(ReplyFrame { seq, status });
        let sent = match cachetrpc::encode(&frame) {
            Ok(bytes) => transport.send(&bytes).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = sent {
            tracing::warn!(seq, error = %e, "reply could not be delivered");
        }
    }

    /// Resolves an address into a connected peer, reusing a live cached one.
    pub async fn lookup(&self, address: &str) -> transport::Result<Arc<Peer>> {
        let cached = self.inner.peers.get(address).map(|entry| entry.value().clone());
        if let Some(peer) = cached {
            if !peer.is_closed() {
                return Ok(peer);
            }
            self.inner.peers.remove(address);
        }

        let transport: Arc<dyn Transport> = if address == self.inner.self_address {
            let (client, server) = DuplexTransport::pair();
            self.serve(Arc::new(server));
            Arc::new(client)
        } else if let Some(authority) = address.strip_prefix(TCP_SCHEME) {
            Arc::new(TcpTransport::connect(authority).await?)
        } else {
            return Err(transport::Error::Unresolvable(address.to_string()));
        };

        tracing::debug!(peer = address, "connected");
        let peer = Arc::new(Peer::new(address, transport));
        self.inner.peers.insert(address.to_string(), peer.clone());
        Ok(peer)
    }

    /// Accepts TCP connections on `tcp://host:port` and serves each of them.
    ///
    /// Returns the bound address, which differs from the requested one when
    /// port 0 was asked for.
    pub async fn listen(&self, address: &str) -> transport::Result<String> {
        let authority = address
            .strip_prefix(TCP_SCHEME)
            .ok_or_else(|| transport::Error::Unresolvable(address.to_string()))?;
        let listener = TcpListener::bind(authority).await?;
        let bound = format!("{}{}", TCP_SCHEME, listener.local_addr()?);

        let weak = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        let log_address = bound.clone();
        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = shutdown.wait_for(|stop| *stop) => break,
                    accepted = listener.accept() => accepted,
                };
                let Some(engine) = Self::upgrade(&weak) else {
                    break;
                };
                match accepted {
                    Ok((stream, remote)) => {
                        tracing::debug!(%remote, "accepted connection");
                        engine.serve(Arc::new(TcpTransport::new(stream)));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }
            tracing::info!(address = %log_address, "listener stopped");
        });

        tracing::info!(address = %bound, "listening");
        Ok(bound)
    }

    /// Stops listeners and serving loops of this engine.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Resolves once [`Engine::shutdown`] has been called, locally or remotely.
    pub async fn wait_for_shutdown(&self) {
        let mut shutdown = self.inner.shutdown.subscribe();
        let _ = shutdown.wait_for(|stop| *stop).await;
    }

    /// Asks the engine at `address` to shut down. Nothing is sent back.
    pub async fn shutdown_remote(&self, address: &str) -> peer::Result<()> {
        let peer = self.lookup(address).await?;
        peer.send_shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn dropped_engine_releases_its_loopback() {
        let engine = Engine::new(EngineConfig::new("loopback"));
        engine.define(0, "add", |(x, y): (i32, i32)| async move { x + y });

        let peer = engine.lookup(engine.self_address()).await.unwrap();
        assert_eq!(peer.call(0, "add", json!([1, 1])).await.unwrap(), json!(2));

        let weak = Arc::downgrade(&engine.inner);
        drop(engine);

        // Reply tasks may hold a clone for a moment after answering.
        tokio::time::timeout(Duration::from_secs(5), async {
            while weak.strong_count() > 0 || !peer.is_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("engine kept alive by its own loopback");
    }
}
