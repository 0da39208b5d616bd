use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "HYBRID_RETRIEVER_";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length-normalization strength.
    pub b: f64,
    /// Fraction of the average IDF used as the floor for very common terms.
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(ConfigError::InvalidBm25Param {
                name: "k1",
                value: self.k1,
            });
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(ConfigError::InvalidBm25Param {
                name: "b",
                value: self.b,
            });
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::InvalidBm25Param {
                name: "epsilon",
                value: self.epsilon,
            });
        }
        Ok(())
    }
}

/// Immutable retrieval settings shared by the lexical and hybrid retrievers.
///
/// Retrievers validate this once at construction; nothing is re-checked per
/// request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrieverConfig {
    pub k: usize,
    pub candidate_limit: usize,
    pub max_tokens_in_query: usize,
    pub alpha: f64,
    pub rrf_constant: f64,
    pub table_name: String,
    pub content_column: String,
    pub metadata_columns: Vec<String>,
    pub bm25: Bm25Params,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            k: 10,
            candidate_limit: 50,
            max_tokens_in_query: 5,
            alpha: 0.5,
            rrf_constant: 60.0,
            table_name: "documents".to_string(),
            content_column: "VEC_TEXT".to_string(),
            metadata_columns: Vec::new(),
            bm25: Bm25Params::default(),
        }
    }
}

impl RetrieverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed parsing config file: {}", path.display()))?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        cfg.apply_overrides(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok())?;
        cfg.validate()
            .with_context(|| format!("invalid retriever config: {}", path.display()))?;
        Ok(cfg)
    }

    /// Applies `HYBRID_RETRIEVER_*` style overrides. `lookup` receives the
    /// suffix after the prefix, e.g. `K` or `ALPHA`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("K") {
            self.k = parse_override("K", &raw)?;
        }
        if let Some(raw) = lookup("CANDIDATE_LIMIT") {
            self.candidate_limit = parse_override("CANDIDATE_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("MAX_TOKENS_IN_QUERY") {
            self.max_tokens_in_query = parse_override("MAX_TOKENS_IN_QUERY", &raw)?;
        }
        if let Some(raw) = lookup("ALPHA") {
            self.alpha = parse_override("ALPHA", &raw)?;
        }
        if let Some(raw) = lookup("RRF_CONSTANT") {
            self.rrf_constant = parse_override("RRF_CONSTANT", &raw)?;
        }
        if let Some(table) = lookup("TABLE") {
            self.table_name = table.trim().to_string();
        }
        if let Some(column) = lookup("CONTENT_COLUMN") {
            self.content_column = column.trim().to_string();
        }
        if let Some(columns) = lookup("METADATA_COLUMNS") {
            self.metadata_columns = columns
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::ZeroK);
        }
        if self.candidate_limit == 0 {
            return Err(ConfigError::ZeroCandidateLimit);
        }
        if self.max_tokens_in_query == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::AlphaOutOfRange(self.alpha));
        }
        if !self.rrf_constant.is_finite() || self.rrf_constant < 0.0 {
            return Err(ConfigError::InvalidRrfConstant(self.rrf_constant));
        }
        self.bm25.validate()?;

        check_identifier("table_name", &self.table_name)?;
        check_identifier("content_column", &self.content_column)?;
        for (idx, column) in self.metadata_columns.iter().enumerate() {
            check_identifier("metadata_columns", column)?;
            if column == &self.content_column || self.metadata_columns[..idx].contains(column) {
                return Err(ConfigError::DuplicateMetadataColumn(column.clone()));
            }
        }
        Ok(())
    }
}

fn parse_override<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value for {ENV_PREFIX}{name}: {raw:?}"))
}

/// Table and column names end up quoted inside SQL text, so only plain
/// identifiers are accepted.
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}
