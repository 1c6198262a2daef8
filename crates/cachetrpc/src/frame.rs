//! # Protocol Frames
//!
//! Defines the structure of the RPC envelope (Call vs Reply vs Shutdown).
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on unknown data.
//! - **Forward Compatibility**: Unknown header fields are ignored by the decoder.
//! - **Correlation**: A Reply carries the `seq` of the Call it answers.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::FailureReason;
use crate::error::Result;
use crate::error::RpcError;

/// Identifies a provider inside a remote process.
pub type ProviderId = u16;

/// An outbound or inbound Call frame.
///
/// `args` holds the positional arguments as a JSON array; the procedure that
/// receives them decides their concrete types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFrame {
    pub seq: u64,
    pub provider_id: ProviderId,
    pub method: String,
    pub args: Value,
    /// When false the callee must not send a Reply (fire-and-forget).
    #[serde(default = "default_expects_reply")]
    pub expects_reply: bool,
}

fn default_expects_reply() -> bool {
    true
}

impl CallFrame {
    pub fn new(seq: u64, provider_id: ProviderId, method: impl Into<String>, args: Value) -> Self {
        Self {
            seq,
            provider_id,
            method: method.into(),
            args,
            expects_reply: true,
        }
    }

    /// Marks this call as one-way; no Reply will be produced for it.
    pub fn one_way(mut self) -> Self {
        self.expects_reply = false;
        self
    }
}

/// A Reply frame.
///
/// - `Ok(Value)`: the procedure ran; the value is its serialized reply.
/// - `Err(FailureReason)`: the engine could not run the procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub seq: u64,
    pub status: std::result::Result<Value, FailureReason>,
}

impl ReplyFrame {
    pub fn ok(seq: u64, value: Value) -> Self {
        Self { seq, status: Ok(value) }
    }

    pub fn err(seq: u64, reason: FailureReason) -> Self {
        Self { seq, status: Err(reason) }
    }
}

/// Top-level frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame")]
pub enum Frame {
    Call(CallFrame),
    Reply(ReplyFrame),
    /// Ask the receiving process to stop serving. Never answered.
    Shutdown,
}

/// Encodes a frame into a self-contained byte buffer.
pub fn encode(frame: &Frame) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(frame)?)
}

/// Decodes one frame from a byte buffer produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    if bytes.is_empty() {
        return Err(RpcError::ProtocolViolation("Empty frame".into()));
    }
    Ok(serde_json::from_slice(bytes)?)
}
