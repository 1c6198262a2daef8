//! # cachet
//!
//! Named, pluggable caches hosted by providers and reached over RPC.
//!
//! A [`Provider`] keeps a registry of caches keyed by [`CacheId`]; each cache is
//! an instance of a backend type built by the [`BackendFactory`]. An [`Admin`]
//! creates and destroys caches remotely, a [`Client`] hands out
//! [`CacheHandle`]s that invoke operations on them. All three sit on an
//! [`Engine`], which routes calls to in-process or TCP peers.

pub mod admin;
pub mod backend;
pub mod client;
pub mod config;
pub mod dummy;
pub mod engine;
pub mod error;
pub mod handle;
pub mod id;
pub mod peer;
pub mod procedures;
pub mod provider;
pub mod request;
pub mod transport;

pub use admin::Admin;
pub use backend::Backend;
pub use backend::BackendFactory;
pub use backend::BackendType;
pub use client::Client;
pub use config::CacheConfig;
pub use config::ProviderConfig;
pub use dummy::DummyCache;
pub use engine::Engine;
pub use engine::EngineConfig;
pub use error::Error;
pub use error::RequestResult;
pub use error::Result;
pub use handle::CacheHandle;
pub use id::CacheId;
pub use provider::Provider;
pub use request::AsyncRequest;

pub use cachetrpc::FailureReason;
pub use cachetrpc::ProviderId;
