//! TCP transport with length-prefixed framing.
//!
//! Each message is `[len: u32 big-endian][payload: len bytes]`.

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::transport;
use crate::transport::Transport;

/// Largest payload accepted in either direction.
pub const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// A framed TCP connection.
///
/// Reads and writes are guarded separately so a pending `recv` never blocks `send`.
pub struct TcpTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        // Frames are small and latency-bound.
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Opens a connection to `host:port`.
    pub async fn connect(authority: &str) -> transport::Result<Self> {
        let stream = TcpStream::connect(authority)
            .await
            .map_err(|e| transport::Error::ConnectionLost(format!("{}: {}", authority, e)))?;
        Ok(Self::new(stream))
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        if payload.len() > MAX_FRAME_LENGTH {
            return Err(transport::Error::PayloadTooLarge(payload.len()));
        }

        let mut writer = self.writer.lock().await;
        writer.write_u32(payload.len() as u32).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut reader = self.reader.lock().await;

        // Only a close before the first header byte is a clean end of stream.
        let mut header = [0u8; 4];
        let first = reader.read(&mut header).await?;
        if first == 0 {
            return Ok(None);
        }
        reader.read_exact(&mut header[first..]).await.map_err(|e| {
            transport::Error::ConnectionLost(format!("truncated header: {}", e))
        })?;
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_LENGTH {
            return Err(transport::Error::PayloadTooLarge(len));
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.map_err(|e| {
            transport::Error::ConnectionLost(format!("truncated frame: {}", e))
        })?;
        Ok(Some(payload))
    }
}
