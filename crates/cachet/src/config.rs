//! Provider configuration.
//!
//! ```json
//! {
//!     "token": "s3cret",
//!     "caches": [
//!         { "type": "dummy", "config": { "path": "mydb" } }
//!     ]
//! }
//! ```
//!
//! Both fields are optional. An empty token disables authorization.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub token: String,
    /// Caches created when the provider starts.
    #[serde(default)]
    pub caches: Vec<CacheConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}
