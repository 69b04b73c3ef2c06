//! Configuration module for docquery.
//!
//! Handles loading, validating, and providing default configuration values.
//! Every component receives the part of this structure it needs at
//! construction; nothing reads configuration from globals.
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::index::DistanceMetric;
use crate::retry::RetryPolicy;

const DEFAULT_CONFIG_PATH: &str = "config.json";

// ── Default value functions ──────────────────────────────────────────

fn default_source_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_chunk_size() -> usize {
    1024
}

fn default_chunk_overlap() -> f32 {
    0.1
}

fn default_top_k() -> usize {
    2
}

fn default_max_prompt_chars() -> usize {
    12_000
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_max_batch_size() -> usize {
    64
}

fn default_concurrency() -> usize {
    4
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

// ── Config structs ───────────────────────────────────────────────────

/// What the query engine does when no chunk is retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRetrievalPolicy {
    /// Fail with `RagError::EmptyRetrieval`.
    #[default]
    Error,
    /// Answer "No relevant context found." without calling the model.
    NoContextAnswer,
    /// Send the bare question to the model.
    ForwardQuestion,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fraction of `chunk_size` repeated between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub distance: DistanceMetric,

    /// Hits scoring below this are discarded before prompting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,

    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    #[serde(default)]
    pub empty_retrieval: EmptyRetrievalPolicy,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub request: RequestConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Only files with these extensions are loaded; empty means all files.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Glob patterns (relative to the source dir) of files to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub include_hidden: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Expected vector length; learned from the first response when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Batches in flight at once while building the index.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RequestConfig {
    /// Deadline for every single provider call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            distance: DistanceMetric::default(),
            min_score: None,
            max_prompt_chars: default_max_prompt_chars(),
            empty_retrieval: EmptyRetrievalPolicy::default(),
            loader: LoaderConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            request: RequestConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            dimensions: None,
            max_batch_size: default_max_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the binary's cwd.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            if path != DEFAULT_CONFIG_PATH {
                anyhow::bail!("config file not found: {path}");
            }
            info!("{path} not found, using defaults");
            let cfg = Self::default();
            match cfg.save(path) {
                Ok(()) => info!("Generated config template: {path}"),
                Err(e) => warn!("Failed to generate config template: {e}"),
            }
            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        let cfg: Config =
            serde_json::from_str(&data).with_context(|| format!("invalid JSON in {path}"))?;

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.chunk_overlap),
            "chunk_overlap must be a fraction in [0, 1)"
        );
        anyhow::ensure!(self.top_k > 0, "top_k must be positive");
        anyhow::ensure!(
            self.max_prompt_chars > 0,
            "max_prompt_chars must be positive"
        );
        anyhow::ensure!(
            !self.embedding.model.trim().is_empty(),
            "embedding.model must not be empty"
        );
        anyhow::ensure!(
            self.embedding.dimensions != Some(0),
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            self.embedding.max_batch_size > 0,
            "embedding.max_batch_size must be positive"
        );
        anyhow::ensure!(
            self.embedding.concurrency > 0,
            "embedding.concurrency must be positive"
        );
        anyhow::ensure!(
            !self.llm.model.trim().is_empty(),
            "llm.model must not be empty"
        );
        check_base_url("embedding.base_url", &self.embedding.base_url)?;
        check_base_url("llm.base_url", &self.llm.base_url)?;
        anyhow::ensure!(
            self.request.timeout_secs > 0,
            "request.timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.request.base_delay_ms <= self.request.max_delay_ms,
            "request.base_delay_ms must not exceed request.max_delay_ms"
        );
        Ok(())
    }

    /// Retry and deadline settings shared by both providers.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.request.max_retries,
            base_delay: Duration::from_millis(self.request.base_delay_ms),
            max_delay: Duration::from_millis(self.request.max_delay_ms),
            timeout: self.request_timeout(),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request.timeout_secs)
    }
}

fn check_base_url(field: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value)
        .with_context(|| format!("{field} is not a valid URL: {value:?}"))?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "{field} must be an http(s) URL, got scheme {:?}",
        url.scheme()
    );
    Ok(())
}

// ── Credentials ──────────────────────────────────────────────────────

/// An API key read from the environment. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Read the key from the named environment variable.
    pub fn from_env(var: &str) -> Result<Self, ProviderError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(ProviderError::MissingCredentials(var.to_string())),
        }
    }

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

// ── Tests ────────────────────────────────────────────────────────────
