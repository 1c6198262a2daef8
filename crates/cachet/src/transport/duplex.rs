//! In-process duplex transport.
//!
//! Used by the engine to reach its own procedures through its `local://` address,
//! and by tests that need two ends of a link without a socket.

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

use crate::transport;
use crate::transport::Transport;

/// One end of an in-memory link. Dropping it closes the link for the other end.
pub struct DuplexTransport {
    outgoing: UnboundedSender<Vec<u8>>,
    incoming: Mutex<UnboundedReceiver<Vec<u8>>>,
}

impl DuplexTransport {
    /// Two ends wired to each other.
    pub fn pair() -> (Self, Self) {
        let (to_right, from_left) = unbounded_channel();
        let (to_left, from_right) = unbounded_channel();
        let left = Self {
            outgoing: to_right,
            incoming: Mutex::new(from_right),
        };
        let right = Self {
            outgoing: to_left,
            incoming: Mutex::new(from_left),
        };
        (left, right)
    }
}

#[async_trait::async_trait]
impl Transport for DuplexTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        if self.outgoing.send(payload.to_vec()).is_err() {
            return Err(transport::Error::ConnectionLost("other end dropped".into()));
        }
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(self.incoming.lock().await.recv().await)
    }
}
