//! The `dummy` backend: keeps its configuration and adds integers.

use serde_json::Value;

use crate::backend::Backend;
use crate::backend::BackendType;
use crate::engine::Engine;
use crate::error::Error;
use crate::error::RequestResult;

#[derive(Debug, Clone)]
pub struct DummyCache {
    config: Value,
}

impl DummyCache {
    pub fn new(config: Value) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Value {
        &self.config
    }
}

#[async_trait::async_trait]
impl Backend for DummyCache {
    async fn say_hello(&self) {
        tracing::info!("Hello World");
    }

    async fn compute_sum(&self, x: i32, y: i32) -> RequestResult<i32> {
        x.checked_add(y)
            .ok_or_else(|| Error::BackendOperation(format!("{} + {} overflows i32", x, y)))
    }

    async fn destroy(&self) -> RequestResult<bool> {
        Ok(true)
    }
}

impl BackendType for DummyCache {
    const NAME: &'static str = "dummy";

    fn create(_engine: &Engine, config: &Value) -> anyhow::Result<Self> {
        Ok(Self::new(config.clone()))
    }

    fn open(_engine: &Engine, config: &Value) -> anyhow::Result<Self> {
        Ok(Self::new(config.clone()))
    }
}
