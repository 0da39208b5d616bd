pub mod config;
pub mod error;

use serde::{Deserialize, Serialize};

pub use config::{Bm25Params, RetrieverConfig};
pub use error::{ConfigError, RetrievalError};

/// Column name to value, in the order the columns were configured or fetched.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(alias = "page_content")]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
