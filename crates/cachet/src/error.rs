//! # Errors
//!
//! Every failure a caller of cachet can observe. The enum is serializable because
//! it is also the error side of [`RequestResult`], the envelope each provider
//! handler replies with.

use serde::Deserialize;
use serde::Serialize;

use cachetrpc::FailureReason;
use cachetrpc::ProviderId;

use crate::id::CacheId;
use crate::peer;
use crate::transport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// A token is configured on the provider and the caller's does not match.
    Authorization,
    /// The configuration text is not a JSON object.
    MalformedConfig(String),
    /// No backend type is registered under this name.
    UnknownBackendType(String),
    /// The backend's constructor failed.
    BackendConstruction(String),
    /// No cache with this id is registered on the provider.
    ResourceNotFound(CacheId),
    /// A backend operation or teardown failed.
    BackendOperation(String),
    /// The address could not be reached or the connection broke.
    Transport(String),
    /// Text is not a canonical cache identifier.
    MalformedIdentifier(String),
    /// The remote engine could not run the call.
    Rpc(FailureReason),
    /// Another provider is already registered under this id on the engine.
    ProviderIdInUse(ProviderId),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authorization => write!(f, "Invalid security token"),
            Self::MalformedConfig(msg) => write!(f, "Could not parse cache configuration: {}", msg),
            Self::UnknownBackendType(name) => write!(f, "Unknown cache type {}", name),
            Self::BackendConstruction(msg) => write!(f, "Cache construction failed: {}", msg),
            Self::ResourceNotFound(id) => write!(f, "Cache {} not found", id),
            Self::BackendOperation(msg) => write!(f, "Cache operation failed: {}", msg),
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::MalformedIdentifier(text) => write!(f, "Malformed cache identifier: {:?}", text),
            Self::Rpc(reason) => write!(f, "Remote failure: {}", reason),
            Self::ProviderIdInUse(id) => write!(f, "Provider id {} is already in use", id),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<peer::Error> for Error {
    fn from(e: peer::Error) -> Self {
        match e {
            peer::Error::Remote(reason) => Self::Rpc(reason),
            other => Self::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The reply envelope of every remote cache operation.
///
/// `Ok` carries the value, `Err` the reason; both survive the RPC boundary.
pub type RequestResult<T> = std::result::Result<T, Error>;

/// Decodes the reply value of a procedure into its `RequestResult`.
pub(crate) fn decode_reply<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    let reply: RequestResult<T> = serde_json::from_value(value)
        .map_err(|e| Error::Rpc(FailureReason::ProtocolViolation(e.to_string())))?;
    reply
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_keeps_error_kind_across_the_wire() {
        let id = CacheId::generate();
        let sent: RequestResult<i32> = Err(Error::ResourceNotFound(id));
        let value = serde_json::to_value(&sent).unwrap();
        assert_eq!(decode_reply::<i32>(value), Err(Error::ResourceNotFound(id)));
    }

    #[test]
    fn envelope_keeps_value() {
        let value = serde_json::to_value(RequestResult::<i32>::Ok(93)).unwrap();
        assert_eq!(value, json!({"Ok": 93}));
        assert_eq!(decode_reply::<i32>(value), Ok(93));
    }

    #[test]
    fn unexpected_reply_shape_is_a_protocol_violation() {
        assert!(matches!(
            decode_reply::<bool>(json!({"Ok": "yes"})),
            Err(Error::Rpc(FailureReason::ProtocolViolation(_)))
        ));
    }

    #[test]
    fn remote_failures_stay_distinct_from_transport_failures() {
        let reason = FailureReason::BadArguments("x".into());
        assert_eq!(Error::from(peer::Error::Remote(reason.clone())), Error::Rpc(reason));
        assert!(matches!(Error::from(peer::Error::ChannelClosed), Error::Transport(_)));
    }
}
