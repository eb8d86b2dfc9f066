use crate::search::{SearchParams, DEFAULT_BATCH_SIZE, DEFAULT_TOP_K};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ragval: RagvalConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct RagvalConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RagvalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Which encoder produces the embeddings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAI,
    /// Precomputed vectors from a JSONL file
    Lookup,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub provider: Provider,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    /// Required for openai; checked against the file for lookup when set
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Prefix prepended to query texts (instruction-tuned models)
    #[serde(default)]
    pub query_instruction: Option<String>,
    /// Precomputed vectors for the lookup provider
    #[serde(default)]
    pub lookup_path: Option<PathBuf>,
}

/// Evaluation run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
    #[serde(default)]
    pub queries_path: Option<PathBuf>,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default = "default_metric_ks")]
    pub metric_ks: Vec<usize>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            batch_size: default_batch_size(),
            corpus_path: None,
            queries_path: None,
            output_path: default_output_path(),
            metric_ks: default_metric_ks(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_batch_size() -> usize {
    100
}

fn default_base_url() -> String {
    crate::embeddings::openai::DEFAULT_BASE_URL.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_output_path() -> PathBuf {
    PathBuf::from("eval_results.json")
}

fn default_metric_ks() -> Vec<usize> {
    vec![1, 5, 10, 20]
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RAGVAL_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RAGVAL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(config_path)
    }

    /// Load and validate a specific config file.
    pub fn load_from(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.eval.top_k == 0 {
            anyhow::bail!("eval.top_k must be greater than 0");
        }

        if self.eval.batch_size == 0 {
            anyhow::bail!("eval.batch_size must be greater than 0");
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        if self.embeddings.dimensions == Some(0) {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.eval.metric_ks.contains(&0) {
            anyhow::bail!("eval.metric_ks entries must be greater than 0");
        }

        match self.embeddings.provider {
            // API key is read when the OpenAI encoder is built
            Provider::OpenAI => {
                if self.embeddings.dimensions.is_none() {
                    anyhow::bail!("embeddings.dimensions is required for the openai provider");
                }
            }
            Provider::Lookup => {
                if self.embeddings.lookup_path.is_none() {
                    anyhow::bail!("embeddings.lookup_path is required for the lookup provider");
                }
            }
        }

        Ok(())
    }

    /// Read the API key from the configured environment variable.
    ///
    /// `.env` values count once [`Config::load`] has run.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.embeddings.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your API key.",
                self.embeddings.api_key_env
            )
        })
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams::new(self.eval.top_k, self.eval.batch_size)
    }
}
