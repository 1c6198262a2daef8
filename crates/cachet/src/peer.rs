//! # Peer
//!
//! One connection to a remote engine. Calls carry a sequence number; a pump task
//! reads replies off the transport and completes the matching pending call.
//! Once the pump stops, the peer is closed for good and every waiting caller is
//! failed with the reason.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use cachetrpc::CallFrame;
use cachetrpc::FailureReason;
use cachetrpc::Frame;
use cachetrpc::ProviderId;
use cachetrpc::RpcError;

use crate::transport;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum Error {
    /// The link failed or was closed.
    Transport(transport::Error),
    /// A frame could not be encoded or decoded.
    Codec(RpcError),
    /// The remote engine answered with a failure.
    Remote(FailureReason),
    /// The reply slot went away without an answer.
    ChannelClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Codec(e) => write!(f, "Frame error: {}", e),
            Self::Remote(reason) => write!(f, "Remote failure: {}", reason),
            Self::ChannelClosed => write!(f, "Reply slot dropped"),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

type PendingMap = DashMap<u64, oneshot::Sender<Result<Value>>>;

/// A connection shared through `Arc` by every handle that talks to one address.
///
/// Sequence numbers are scoped to the peer, so a peer never shares its
/// transport.
pub struct Peer {
    address: String,
    transport: Arc<dyn Transport>,
    pending: Arc<PendingMap>,
    seq_gen: AtomicU64,
    closed: Arc<AtomicBool>,
}

impl Peer {
    /// Wraps `transport` and starts its pump. `address` is kept for logs.
    pub fn new(address: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let address = address.into();
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::pump(
            address.clone(),
            transport.clone(),
            pending.clone(),
            closed.clone(),
        ));

        Self {
            address,
            transport,
            pending,
            seq_gen: AtomicU64::new(1),
            closed,
        }
    }

    async fn pump(
        address: String,
        link: Arc<dyn Transport>,
        pending: Arc<PendingMap>,
        closed: Arc<AtomicBool>,
    ) {
        let reason = loop {
            let bytes = match link.recv().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    tracing::debug!(peer = %address, "link closed by remote");
                    break Error::Transport(transport::Error::ConnectionLost(format!(
                        "{} closed the link",
                        address
                    )));
                }
                Err(e) => {
                    tracing::warn!(peer = %address, error = %e, "link failed");
                    break Error::Transport(e);
                }
            };

            if let Err(e) = Self::route_reply(&bytes, &pending) {
                tracing::warn!(peer = %address, error = %e, "undecodable reply, closing peer");
                break e;
            }
        };

        closed.store(true, Ordering::SeqCst);
        Self::fail_all(&pending, reason);
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// True once the pump has stopped; every later call fails.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    fn fail_all(pending: &PendingMap, reason: Error) {
        let waiting: Vec<u64> = pending.iter().map(|slot| *slot.key()).collect();
        for seq in waiting {
            if let Some((_, slot)) = pending.remove(&seq) {
                let _ = slot.send(Err(reason.clone()));
            }
        }
    }

    fn route_reply(bytes: &[u8], pending: &PendingMap) -> Result<()> {
        let reply = match cachetrpc::decode(bytes)? {
            Frame::Reply(reply) => reply,
            other => {
                tracing::warn!(frame = ?other, "ignoring non-reply frame on a client link");
                return Ok(());
            }
        };

        // No slot: the caller dropped its pending call.
        if let Some((_, slot)) = pending.remove(&reply.seq) {
            let _ = slot.send(reply.status.map_err(Error::Remote));
        }
        Ok(())
    }

    /// Registers a pending reply slot for a fresh sequence number.
    fn prepare_call(&self) -> Result<PendingCall> {
        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);

        let call = PendingCall {
            seq,
            rx,
            pending: self.pending.clone(),
        };

        // The pump may have drained the table just before our insert.
        if self.is_closed() {
            return Err(Error::Transport(transport::Error::ConnectionLost(
                format!("peer {} is closed", self.address),
            )));
        }
        Ok(call)
    }

    /// Sends a call and returns as soon as it is on the wire.
    ///
    /// The reply is collected later through [`PendingCall::wait`].
    pub async fn start_call(
        &self,
        provider_id: ProviderId,
        method: &str,
        args: Value,
    ) -> Result<PendingCall> {
        let call = self.prepare_call()?;
        let payload = cachetrpc::encode(&Frame::Call(CallFrame::new(
            call.seq,
            provider_id,
            method,
            args,
        )))?;

        // On failure `call` is dropped, which releases its slot.
        self.transport.send(&payload).await?;
        Ok(call)
    }

    /// Sends a call and awaits its reply.
    pub async fn call(&self, provider_id: ProviderId, method: &str, args: Value) -> Result<Value> {
        self.start_call(provider_id, method, args).await?.wait().await
    }

    /// Sends a call for which the remote side will not reply.
    pub async fn notify(&self, provider_id: ProviderId, method: &str, args: Value) -> Result<()> {
        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let frame = CallFrame::new(seq, provider_id, method, args).one_way();
        let payload = cachetrpc::encode(&Frame::Call(frame))?;
        self.transport.send(&payload).await?;
        Ok(())
    }

    /// Asks the remote process to shut down.
    pub async fn send_shutdown(&self) -> Result<()> {
        let payload = cachetrpc::encode(&Frame::Shutdown)?;
        self.transport.send(&payload).await?;
        Ok(())
    }
}

/// A call that has been sent and whose reply has not been collected yet.
///
/// Dropping it without waiting frees its slot in the peer's pending table.
pub struct PendingCall {
    seq: u64,
    rx: oneshot::Receiver<Result<Value>>,
    pending: Arc<PendingMap>,
}

impl PendingCall {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Waits for the reply. Consumes the call, so it can only be awaited once.
    pub async fn wait(mut self) -> Result<Value> {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(Error::ChannelClosed),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.pending.remove(&self.seq);
    }
}
