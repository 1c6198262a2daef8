//! # CachetRPC
//!
//! The wire envelope of the cachet engine.
//!
//! ## Architecture
//!
//! A message is exactly one [`Frame`]: a `Call` addressed to a procedure of a
//! provider, the `Reply` correlated to it by sequence number, or a `Shutdown`
//! request addressed to the remote process. Arguments and results travel as
//! self-describing JSON values; the typed view is recovered by whoever owns
//! the procedure signature.

mod error;
mod frame;

#[cfg(test)]
mod tests;

pub use error::FailureReason;
pub use error::Result;
pub use error::RpcError;
pub use frame::decode;
pub use frame::encode;
pub use frame::CallFrame;
pub use frame::Frame;
pub use frame::ProviderId;
pub use frame::ReplyFrame;
