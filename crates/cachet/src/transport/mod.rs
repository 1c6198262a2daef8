//! # Transports
//!
//! How engines move bytes. A transport carries whole messages: one `send` is
//! one `recv` on the other side, and it never looks inside them. Frames,
//! sequence numbers and replies are layered on top by [`Peer`](crate::peer::Peer).

pub mod duplex;
pub mod tcp;

pub use duplex::DuplexTransport;
pub use tcp::TcpTransport;

/// Link-level failures.
#[derive(Debug, Clone)]
pub enum Error {
    /// The address could not be resolved to anything this engine can reach.
    Unresolvable(String),
    /// The remote end is unreachable or went away.
    ConnectionLost(String),
    /// The payload exceeds what the transport can frame.
    PayloadTooLarge(usize),
    /// Socket failure.
    Io(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolvable(addr) => write!(f, "Cannot resolve address: {}", addr),
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::PayloadTooLarge(len) => write!(f, "Payload of {} bytes too large for transport", len),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A message pipe between two engines, used as `Arc<dyn Transport>`.
///
/// # Invariants
/// - `send` may be called concurrently from many tasks; messages are never interleaved.
/// - `recv` returns `Ok(None)` once the remote side has closed cleanly.
/// - Should not interpret the payload content.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one message.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next message, or `None` when the stream is closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
