//! # Backends and the backend factory
//!
//! A backend is one kind of cache. Each kind is registered in a
//! [`BackendFactory`] under a type name with two constructors: `create` builds a
//! fresh cache, `open` attaches to state described by the configuration.
//!
//! The factory is plain data owned by whoever bootstraps the process. It is
//! filled first and then handed to providers as `Arc<BackendFactory>`; from then
//! on it can no longer change, so every type is known before the first call is
//! served.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::Engine;
use crate::error::Error;
use crate::error::RequestResult;
use crate::error::Result;

/// Operations every cache kind provides.
///
/// Calls may arrive concurrently for the same instance; an implementation that
/// keeps mutable state synchronizes it itself.
#[async_trait::async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Logs a greeting. Used as a liveness probe with no reply.
    async fn say_hello(&self);

    /// Computes `x + y`.
    async fn compute_sum(&self, x: i32, y: i32) -> RequestResult<i32>;

    /// Tears down the underlying cache. Called at most once, after the
    /// instance has left the provider's registry.
    async fn destroy(&self) -> RequestResult<bool>;
}

/// A backend that knows its own type name and constructors.
///
/// `factory.register_type::<MyCache>()` is the usual way to make it available.
pub trait BackendType: Backend + Sized {
    const NAME: &'static str;

    fn create(engine: &Engine, config: &Value) -> anyhow::Result<Self>;

    fn open(engine: &Engine, config: &Value) -> anyhow::Result<Self>;
}

/// A type-erased backend constructor.
pub type Constructor =
    Arc<dyn Fn(&Engine, &Value) -> anyhow::Result<Box<dyn Backend>> + Send + Sync>;

#[derive(Clone)]
struct Constructors {
    create: Constructor,
    open: Constructor,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Create,
    Open,
}

/// Type name to constructors.
#[derive(Clone, Default)]
pub struct BackendFactory {
    types: HashMap<String, Constructors>,
}

impl BackendFactory {
    /// An empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with the backends shipped in this crate (`dummy`).
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register_type::<crate::dummy::DummyCache>();
        factory
    }

    /// Associates `name` with two constructors.
    ///
    /// The last registration for a name wins, silently replacing an earlier one.
    pub fn register<C, O>(&mut self, name: impl Into<String>, create: C, open: O)
    where
        C: Fn(&Engine, &Value) -> anyhow::Result<Box<dyn Backend>> + Send + Sync + 'static,
        O: Fn(&Engine, &Value) -> anyhow::Result<Box<dyn Backend>> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(backend = %name, "registering backend type");
        self.types.insert(
            name,
            Constructors {
                create: Arc::new(create),
                open: Arc::new(open),
            },
        );
    }

    /// Registers `B` under `B::NAME`.
    pub fn register_type<B: BackendType>(&mut self) {
        self.register(
            B::NAME,
            |engine, config| Ok(Box::new(B::create(engine, config)?) as Box<dyn Backend>),
            |engine, config| Ok(Box::new(B::open(engine, config)?) as Box<dyn Backend>),
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds a new cache of type `name`.
    pub fn instantiate_for_create(
        &self,
        name: &str,
        engine: &Engine,
        config: &Value,
    ) -> Result<Box<dyn Backend>> {
        self.instantiate(Mode::Create, name, engine, config)
    }

    /// Attaches a cache of type `name` to existing state.
    pub fn instantiate_for_open(
        &self,
        name: &str,
        engine: &Engine,
        config: &Value,
    ) -> Result<Box<dyn Backend>> {
        self.instantiate(Mode::Open, name, engine, config)
    }

    fn instantiate(
        &self,
        mode: Mode,
        name: &str,
        engine: &Engine,
        config: &Value,
    ) -> Result<Box<dyn Backend>> {
        let constructors = self
            .types
            .get(name)
            .ok_or_else(|| Error::UnknownBackendType(name.to_string()))?;

        let constructor = match mode {
            Mode::Create => &constructors.create,
            Mode::Open => &constructors.open,
        };

        constructor(engine, config).map_err(|e| Error::BackendConstruction(format!("{:#}", e)))
    }
}
