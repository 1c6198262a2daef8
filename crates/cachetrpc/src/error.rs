//! Failures of the frame layer.
//!
//! [`RpcError`] stays local: a frame could not be built or read.
//! [`FailureReason`] travels back to the caller inside a reply frame.

use serde::Deserialize;
use serde::Serialize;

/// Local codec failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Frame or value (de)serialization failed.
    Serialization(String),
    /// The message parsed but does not form a valid frame (e.g., empty payload).
    ProtocolViolation(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// Reasons for an RPC failure (the `Err` side of a Reply).
///
/// These are distinct from `RpcError`; these represent the *remote* engine
/// failing to run the call, whereas `RpcError` represents the local codec failing.
/// Failures of the procedure's own logic travel inside the successful reply value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// No procedure with this name is registered for the provider id.
    ProcedureNotFound { provider_id: u16, method: String },
    /// Arguments did not deserialize into the procedure's parameter types.
    BadArguments(String),
    /// The procedure's reply could not be serialized.
    BadReply(String),
    /// The procedure panicked or was cancelled before replying.
    HandlerAborted(String),
    /// The call frame was malformed.
    ProtocolViolation(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProcedureNotFound { provider_id, method } => {
                write!(f, "no procedure '{}' registered for provider {}", method, provider_id)
            }
            Self::BadArguments(msg) => write!(f, "bad arguments: {}", msg),
            Self::BadReply(msg) => write!(f, "reply could not be encoded: {}", msg),
            Self::HandlerAborted(msg) => write!(f, "handler aborted: {}", msg),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
        }
    }
}
